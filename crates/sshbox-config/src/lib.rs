//! Configuration for sshbox
//!
//! This crate handles:
//! - The driver configuration file (`.sshbox.toml`) and its computed defaults
//! - Rendering of user-supplied Dockerfile templates against that configuration

mod driver;
mod error;
mod template;

pub use driver::*;
pub use error::*;
pub use template::*;
