//! Lifecycle orchestration for a single test container
//!
//! `create` walks image, container, host and port in order and fills each one
//! only when the state does not already carry it, so a failed call can simply
//! be repeated. `destroy` stops, waits for and deletes the container.

use crate::container_spec::build_container_spec;
use crate::dockerfile::internal_dockerfile;
use crate::readiness::{wait_for_ssh, ReadinessProbe, SshBannerProbe, WaitPolicy};
use crate::template::render_dockerfile_template;
use crate::{resolver, CoreError, LifecycleStep, Result, State, TeardownStep};
use sshbox_config::{DockerfileSource, DriverConfig};
use sshbox_provider::{
    BuildEvent, ContainerDetails, ContainerEngine, ContainerId, EngineError, ImageId,
};
use tracing::Level;

/// Drives one instance through create and destroy
pub struct Driver {
    config: DriverConfig,
    engine: Box<dyn ContainerEngine>,
    probe: Box<dyn ReadinessProbe>,
    wait_policy: WaitPolicy,
}

impl Driver {
    /// Create a driver around an existing engine connection
    pub fn new(config: DriverConfig, engine: Box<dyn ContainerEngine>) -> Self {
        let wait_policy = WaitPolicy::from_config(&config);
        Self {
            config,
            engine,
            probe: Box::new(SshBannerProbe::default()),
            wait_policy,
        }
    }

    /// Connect to the engine named by the configuration
    ///
    /// A malformed address is a configuration error; any other failure is
    /// classified like the rest of the create path.
    pub fn connect(config: DriverConfig) -> Result<Self> {
        let engine = sshbox_provider::connect(&config).map_err(|e| match e {
            EngineError::InvalidEndpoint(reason) => {
                CoreError::InvalidConfig(format!("socket '{}': {}", config.socket, reason))
            }
            other => CoreError::engine(LifecycleStep::Connect, Some(config.socket.as_str()), other),
        })?;
        tracing::debug!("Using container engine at {}", config.socket);
        Ok(Self::new(config, Box::new(engine)))
    }

    /// Replace the SSH readiness check
    pub fn with_probe(mut self, probe: Box<dyn ReadinessProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Replace the readiness deadline and poll interval
    pub fn with_wait_policy(mut self, policy: WaitPolicy) -> Self {
        self.wait_policy = policy;
        self
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// The build context for this configuration
    pub fn dockerfile(&self) -> Result<String> {
        build_context(&self.config)
    }

    /// Bring the instance up and wait until SSH answers
    ///
    /// Identifiers already present in `state` are reused as-is.
    pub fn create(&self, state: &mut State) -> Result<()> {
        let image_id = State::fill(&mut state.image_id, || self.build_image())?.clone();
        let container_id =
            State::fill(&mut state.container_id, || self.run_container(&image_id))?.clone();
        let hostname = State::fill(&mut state.hostname, || {
            Ok(resolver::resolve_host(&self.config.socket))
        })?
        .clone();
        let port = *State::fill(&mut state.port, || self.ssh_port(&container_id))?;

        tracing::info!(
            "Waiting for SSH on {}:{} (container {})",
            hostname,
            port,
            container_id.short()
        );
        wait_for_ssh(self.probe.as_ref(), &hostname, port, self.wait_policy)
    }

    /// Tear the container down
    ///
    /// Without a container id this makes no engine calls. The first failing
    /// step aborts the sequence; a container the engine no longer knows
    /// counts as already removed.
    pub fn destroy(&self, state: &mut State) -> Result<()> {
        let Some(id) = state.container_id.clone() else {
            tracing::debug!("No container recorded, nothing to destroy");
            return Ok(());
        };

        tracing::info!("Destroying container {}", id.short());
        for step in [TeardownStep::Stop, TeardownStep::Wait, TeardownStep::Delete] {
            let result = match step {
                TeardownStep::Stop => self.engine.stop_container(&id),
                TeardownStep::Wait => self.engine.wait_container(&id),
                TeardownStep::Delete => self.engine.remove_container(&id),
            };

            match result {
                Ok(()) => tracing::debug!("Teardown step {} done for {}", step, id.short()),
                Err(EngineError::NotFound(message)) => {
                    tracing::warn!(
                        "Container {} already gone at {}: {}",
                        id.short(),
                        step,
                        message
                    );
                    break;
                }
                Err(source) => {
                    return Err(CoreError::TeardownFailed {
                        step,
                        container_id: id.to_string(),
                        source,
                    })
                }
            }
        }

        state.clear_container();
        tracing::info!("Container {} destroyed", id.short());
        Ok(())
    }

    /// Inspect the recorded container, if the engine still knows it
    pub fn status(&self, state: &State) -> Result<Option<ContainerDetails>> {
        let Some(id) = &state.container_id else {
            return Ok(None);
        };
        match self.engine.inspect_container(id) {
            Ok(details) => Ok(Some(details)),
            Err(EngineError::NotFound(_)) => Ok(None),
            Err(e) => Err(CoreError::engine(
                LifecycleStep::InspectContainer,
                Some(id.as_ref()),
                e,
            )),
        }
    }

    fn build_image(&self) -> Result<ImageId> {
        let dockerfile = self.dockerfile()?;
        tracing::info!("Building image from {}", self.config.image);
        tracing::debug!("Dockerfile:\n{}", dockerfile);

        let image = self
            .engine
            .build_image(&dockerfile, self.config.remove_images, &mut |event: &BuildEvent| {
                log_build_event(event)
            })
            .map_err(|e| CoreError::engine(LifecycleStep::BuildImage, None, e))?;
        tracing::info!("Built image {}", image);
        Ok(image)
    }

    fn run_container(&self, image: &ImageId) -> Result<ContainerId> {
        let spec = build_container_spec(&self.config, image)?;
        let id = self.engine.create_container(&spec).map_err(|e| {
            CoreError::engine(LifecycleStep::CreateContainer, Some(spec.name.as_str()), e)
        })?;
        tracing::info!("Created container {} ({})", spec.name, id.short());

        if let Err(e) = self.engine.start_container(&id) {
            // An unstarted container would block the next create under the same name
            if let Err(cleanup) = self.engine.remove_container(&id) {
                tracing::warn!(
                    "Failed to remove unstarted container {}: {}",
                    id.short(),
                    cleanup
                );
            }
            return Err(CoreError::engine(
                LifecycleStep::StartContainer,
                Some(id.as_ref()),
                e,
            ));
        }
        tracing::info!("Started container {}", id.short());
        Ok(id)
    }

    fn ssh_port(&self, id: &ContainerId) -> Result<u16> {
        let details = self.engine.inspect_container(id).map_err(|e| {
            CoreError::engine(LifecycleStep::InspectContainer, Some(id.as_ref()), e)
        })?;
        resolver::resolve_port(&details)
    }
}

/// Dockerfile text for a configuration: synthesized, or a rendered template
pub fn build_context(config: &DriverConfig) -> Result<String> {
    match &config.dockerfile {
        DockerfileSource::Internal => internal_dockerfile(config),
        DockerfileSource::Template(location) => render_dockerfile_template(location, config),
    }
}

/// Forward one build-log chunk to the log
///
/// The raw chunk goes out at debug level when that is enabled; otherwise only
/// its human-readable text at info.
fn log_build_event(event: &BuildEvent) {
    if tracing::enabled!(Level::DEBUG) {
        tracing::debug!("{}", event.raw);
        return;
    }
    for text in [&event.stream, &event.status].into_iter().flatten() {
        let text = text.trim();
        if !text.is_empty() {
            tracing::info!("{}", text);
        }
    }
}
