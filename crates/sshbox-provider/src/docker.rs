//! Docker engine implementation using bollard
//!
//! bollard is async; every call here is driven to completion on a private
//! current-thread runtime so callers see a plain blocking API.

use crate::{
    BuildEvent, ContainerDetails, ContainerEngine, ContainerId, ContainerSpec, ContainerStatus,
    EngineEndpoint, EngineError, ImageId, PublishedPort, Result,
};
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions, WaitContainerOptions,
};
use bollard::image::BuildImageOptions;
use bollard::service::{BuildInfo, HostConfig, PortBinding};
use bollard::Docker;
use futures::{Stream, StreamExt};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::runtime::Runtime;

/// Seconds the engine waits for the container to stop before killing it
const STOP_TIMEOUT_SECS: i64 = 10;

/// Docker engine client bound to one endpoint
pub struct DockerEngine {
    client: Docker,
    runtime: Runtime,
}

impl DockerEngine {
    /// Bind a client to `endpoint`
    ///
    /// No request is made here; an unreachable daemon surfaces on first use.
    pub fn connect(
        endpoint: &EngineEndpoint,
        read_timeout: Duration,
        tls_cert_path: Option<&Path>,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| EngineError::Unreachable(format!("Failed to start runtime: {}", e)))?;

        let timeout = read_timeout.as_secs().max(1);
        let client = {
            let _guard = runtime.enter();
            let connected = match endpoint {
                EngineEndpoint::Unix(path) => Docker::connect_with_socket(
                    &path.to_string_lossy(),
                    timeout,
                    bollard::API_DEFAULT_VERSION,
                ),
                EngineEndpoint::Tcp(address) | EngineEndpoint::Http(address) => {
                    Docker::connect_with_http(address, timeout, bollard::API_DEFAULT_VERSION)
                }
                EngineEndpoint::Https(address) => {
                    let cert_dir = tls_cert_dir(tls_cert_path)?;
                    Docker::connect_with_ssl(
                        address,
                        &cert_dir.join("key.pem"),
                        &cert_dir.join("cert.pem"),
                        &cert_dir.join("ca.pem"),
                        timeout,
                        bollard::API_DEFAULT_VERSION,
                    )
                }
            };
            connected.map_err(|e| EngineError::Unreachable(e.to_string()))?
        };

        tracing::debug!("Bound container engine client to {}", endpoint);

        Ok(Self { client, runtime })
    }
}

impl ContainerEngine for DockerEngine {
    fn build_image(
        &self,
        dockerfile: &str,
        remove_intermediate: bool,
        on_event: &mut dyn FnMut(&BuildEvent),
    ) -> Result<ImageId> {
        let tar_data = create_build_context(dockerfile)?;

        let options = BuildImageOptions {
            dockerfile: "Dockerfile".to_string(),
            rm: remove_intermediate,
            forcerm: remove_intermediate,
            ..Default::default()
        };

        self.runtime.block_on(async {
            let stream = self.client.build_image(options, None, Some(tar_data.into()));
            drain_build_stream(stream, on_event).await
        })
    }

    fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerId> {
        let options = Some(CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        });

        let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
        let mut exposed_ports: HashMap<String, HashMap<(), ()>> = HashMap::new();

        for (container_port, requests) in &spec.port_bindings {
            exposed_ports.insert(container_port.clone(), HashMap::new());
            let bindings = requests
                .iter()
                .map(|r| PortBinding {
                    host_ip: Some(r.host_ip.clone()),
                    host_port: Some(r.host_port.map(|p| p.to_string()).unwrap_or_default()),
                })
                .collect();
            port_bindings.insert(container_port.clone(), Some(bindings));
        }

        let volumes: HashMap<String, HashMap<(), ()>> = spec
            .volumes
            .keys()
            .map(|path| (path.clone(), HashMap::new()))
            .collect();

        let host_config = HostConfig {
            port_bindings: Some(port_bindings),
            privileged: Some(spec.privileged),
            publish_all_ports: Some(spec.publish_all_ports),
            cpu_shares: spec.cpu_shares,
            memory: spec.memory,
            dns: spec.dns.clone(),
            ..Default::default()
        };

        let container_config = Config {
            image: Some(spec.image.clone()),
            cmd: Some(spec.cmd.clone()),
            hostname: spec.hostname.clone(),
            attach_stdout: Some(spec.attach_stdout),
            attach_stderr: Some(spec.attach_stderr),
            tty: Some(spec.tty),
            exposed_ports: Some(exposed_ports),
            volumes: if volumes.is_empty() {
                None
            } else {
                Some(volumes)
            },
            host_config: Some(host_config),
            ..Default::default()
        };

        let response = self
            .runtime
            .block_on(self.client.create_container(options, container_config))?;

        for warning in &response.warnings {
            tracing::warn!("Engine warning for {}: {}", spec.name, warning);
        }

        Ok(ContainerId::new(response.id))
    }

    fn start_container(&self, id: &ContainerId) -> Result<()> {
        self.runtime.block_on(
            self.client
                .start_container(&id.0, None::<StartContainerOptions<String>>),
        )?;
        Ok(())
    }

    fn inspect_container(&self, id: &ContainerId) -> Result<ContainerDetails> {
        let info = self.runtime.block_on(
            self.client
                .inspect_container(&id.0, None::<InspectContainerOptions>),
        )?;

        let status = info
            .state
            .as_ref()
            .and_then(|s| s.status)
            .map(|s| ContainerStatus::from(format!("{:?}", s).to_lowercase().as_str()))
            .unwrap_or(ContainerStatus::Unknown);

        let mut ports = BTreeMap::new();
        if let Some(port_map) = info.network_settings.as_ref().and_then(|n| n.ports.as_ref()) {
            for (container_port, bindings) in port_map {
                let published = bindings
                    .iter()
                    .flatten()
                    .map(|b| PublishedPort {
                        host_ip: b.host_ip.clone(),
                        host_port: b.host_port.clone(),
                    })
                    .collect();
                ports.insert(container_port.clone(), published);
            }
        }

        Ok(ContainerDetails {
            id: id.clone(),
            name: info
                .name
                .unwrap_or_default()
                .trim_start_matches('/')
                .to_string(),
            status,
            ports,
        })
    }

    fn stop_container(&self, id: &ContainerId) -> Result<()> {
        let options = StopContainerOptions {
            t: STOP_TIMEOUT_SECS,
        };
        match self
            .runtime
            .block_on(self.client.stop_container(&id.0, Some(options)))
        {
            Ok(()) => Ok(()),
            // 304: already stopped
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 304, ..
            }) => {
                tracing::debug!("Container {} was already stopped", id.short());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn wait_container(&self, id: &ContainerId) -> Result<()> {
        self.runtime.block_on(async {
            let mut stream = Box::pin(
                self.client
                    .wait_container(&id.0, None::<WaitContainerOptions<String>>),
            );

            match stream.next().await {
                Some(Ok(response)) => {
                    tracing::debug!(
                        "Container {} exited with status {}",
                        id.short(),
                        response.status_code
                    );
                    Ok(())
                }
                // A non-zero exit still means the process is gone
                Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => {
                    tracing::debug!("Container {} exited with status {}", id.short(), code);
                    Ok(())
                }
                Some(Err(e)) => Err(e.into()),
                None => Ok(()),
            }
        })
    }

    fn remove_container(&self, id: &ContainerId) -> Result<()> {
        let options = RemoveContainerOptions {
            force: false,
            ..Default::default()
        };
        self.runtime
            .block_on(self.client.remove_container(&id.0, Some(options)))?;
        Ok(())
    }
}

fn tls_cert_dir(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        return Ok(path.to_path_buf());
    }
    std::env::var("DOCKER_CERT_PATH")
        .ok()
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| {
            EngineError::InvalidEndpoint(
                "https engine address requires tls_cert_path or DOCKER_CERT_PATH".to_string(),
            )
        })
}

/// Consume the build log, reporting each chunk, and return the built image id
async fn drain_build_stream<S>(
    stream: S,
    on_event: &mut dyn FnMut(&BuildEvent),
) -> Result<ImageId>
where
    S: Stream<Item = std::result::Result<BuildInfo, bollard::errors::Error>>,
{
    let mut stream = Box::pin(stream);
    let mut image_id = None;

    while let Some(result) = stream.next().await {
        match result {
            Ok(output) => {
                if let Some(error) = output.error.clone() {
                    return Err(EngineError::Build(error));
                }
                if let Some(id) = output.aux.as_ref().and_then(|aux| aux.id.clone()) {
                    image_id = Some(id);
                }
                if image_id.is_none() {
                    image_id = output.stream.as_deref().and_then(parse_built_image_id);
                }
                on_event(&build_event(&output));
            }
            Err(bollard::errors::Error::JsonDataError { message, .. }) => {
                tracing::debug!("Skipping malformed build log chunk: {}", message);
            }
            Err(e) => return Err(e.into()),
        }
    }

    image_id
        .map(ImageId::new)
        .ok_or_else(|| EngineError::Build("No image ID returned".to_string()))
}

/// Re-encode a build chunk as JSON, keeping only the fields that are set
fn build_event(info: &BuildInfo) -> BuildEvent {
    let mut raw = serde_json::Map::new();
    let fields = [
        ("id", info.id.clone()),
        ("stream", info.stream.clone()),
        ("status", info.status.clone()),
        ("progress", info.progress.clone()),
        ("error", info.error.clone()),
    ];
    for (key, value) in fields {
        if let Some(value) = value {
            raw.insert(key.to_string(), serde_json::Value::String(value));
        }
    }
    if let Some(id) = info.aux.as_ref().and_then(|aux| aux.id.clone()) {
        raw.insert("aux".to_string(), serde_json::json!({ "ID": id }));
    }

    BuildEvent {
        stream: info.stream.clone(),
        status: info.status.clone(),
        raw: serde_json::Value::Object(raw).to_string(),
    }
}

/// Image id from the classic builder's closing `Successfully built <id>` line
fn parse_built_image_id(line: &str) -> Option<String> {
    line.trim()
        .strip_prefix("Successfully built ")
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
}

/// Create a tar archive holding only the Dockerfile
fn create_build_context(dockerfile: &str) -> Result<Vec<u8>> {
    use tar::{Builder, Header};

    let mut builder = Builder::new(Vec::new());
    let mut header = Header::new_gnu();
    header.set_size(dockerfile.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();

    builder
        .append_data(&mut header, "Dockerfile", dockerfile.as_bytes())
        .map_err(|e| EngineError::Build(format!("Failed to pack build context: {}", e)))?;

    builder
        .into_inner()
        .map_err(|e| EngineError::Build(format!("Failed to pack build context: {}", e)))
}
