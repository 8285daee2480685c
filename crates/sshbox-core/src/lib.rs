//! Core logic for sshbox container lifecycle management
//!
//! This crate provides:
//! - Dockerfile synthesis per platform family, or rendering of a user template
//! - Mapping of driver options onto a container-creation payload
//! - Resolution of the host and port SSH is reachable on
//! - The create/destroy lifecycle over a caller-owned state bag

pub mod container_spec;
pub mod dockerfile;
mod driver;
mod error;
pub mod readiness;
pub mod resolver;
mod state;
pub mod template;

pub use driver::*;
pub use error::*;
pub use readiness::{ReadinessProbe, SshBannerProbe, WaitPolicy};
pub use state::*;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
