//! Container-engine client for sshbox
//!
//! This crate provides a blocking abstraction over the container engine API
//! covering exactly what a single disposable test container needs: build an
//! image, create and start a container, inspect it, and tear it down.

mod docker;
mod endpoint;
mod error;
mod types;

pub use docker::DockerEngine;
pub use endpoint::EngineEndpoint;
pub use error::*;
pub use types::*;

use sshbox_config::DriverConfig;

/// Trait for container engines
///
/// Every call blocks until the engine answers. Implementations hold one
/// connection for their whole lifetime.
pub trait ContainerEngine: Send + Sync {
    /// Build an image from Dockerfile text
    ///
    /// Each build-log chunk is handed to `on_event` as it arrives.
    fn build_image(
        &self,
        dockerfile: &str,
        remove_intermediate: bool,
        on_event: &mut dyn FnMut(&BuildEvent),
    ) -> Result<ImageId>;

    /// Create a container; host configuration travels with the spec
    fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerId>;

    /// Start a created container
    fn start_container(&self, id: &ContainerId) -> Result<()>;

    /// Get detailed information about a container
    fn inspect_container(&self, id: &ContainerId) -> Result<ContainerDetails>;

    /// Stop a container
    fn stop_container(&self, id: &ContainerId) -> Result<()>;

    /// Block until the container's main process has exited
    fn wait_container(&self, id: &ContainerId) -> Result<()>;

    /// Remove a container
    fn remove_container(&self, id: &ContainerId) -> Result<()>;
}

/// Connect to the engine named by the driver configuration
pub fn connect(config: &DriverConfig) -> Result<DockerEngine> {
    let endpoint = EngineEndpoint::parse(&config.socket)?;
    DockerEngine::connect(
        &endpoint,
        config.read_timeout_duration(),
        config.tls_cert_path.as_deref(),
    )
}
