//! Mapping of driver options onto a container-creation payload

use crate::{CoreError, Result};
use sshbox_config::DriverConfig;
use sshbox_provider::{ContainerSpec, ImageId, PortBindingRequest, VolumeOptions};
use std::collections::BTreeMap;

/// Port sshd listens on inside the container
pub const SSH_PORT: u16 = 22;

/// A parsed forward entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Forward {
    pub guest_port: u16,
    pub host_port: Option<u16>,
}

impl Forward {
    /// Parse `guest`, `host:guest` or `ip:host:guest`
    ///
    /// The rightmost segment is the container port and the one before it the
    /// host port.
    pub fn parse(entry: &str) -> Result<Self> {
        let mut segments = entry.trim().rsplit(':');
        let guest = segments.next().unwrap_or_default();
        let host = segments.next();

        Ok(Self {
            guest_port: parse_port(entry, guest)?,
            host_port: host.map(|h| parse_port(entry, h)).transpose()?,
        })
    }

    pub fn binding_key(&self) -> String {
        format!("{}/tcp", self.guest_port)
    }
}

fn parse_port(entry: &str, segment: &str) -> Result<u16> {
    segment.trim().parse().map_err(|_| {
        CoreError::InvalidConfig(format!(
            "invalid port '{}' in forward entry '{}'",
            segment, entry
        ))
    })
}

/// Build the creation payload for a container running `image`
pub fn build_container_spec(config: &DriverConfig, image: &ImageId) -> Result<ContainerSpec> {
    let cmd = shell_words::split(&config.run_command).map_err(|e| {
        CoreError::InvalidConfig(format!(
            "cannot split run_command '{}': {}",
            config.run_command, e
        ))
    })?;
    if cmd.is_empty() {
        return Err(CoreError::InvalidConfig("run_command is empty".into()));
    }

    let mut port_specs = vec![SSH_PORT.to_string()];
    port_specs.extend(config.forward.iter().cloned());

    // One binding per container port; a later forward replaces an earlier one
    let mut port_bindings: BTreeMap<String, Vec<PortBindingRequest>> = BTreeMap::new();
    for entry in &port_specs {
        let forward = Forward::parse(entry)?;
        port_bindings.insert(
            forward.binding_key(),
            vec![PortBindingRequest {
                host_ip: String::new(),
                host_port: forward.host_port,
            }],
        );
    }

    let volumes = config
        .volume
        .iter()
        .map(|v| (v.clone(), VolumeOptions::default()))
        .collect();

    let spec = ContainerSpec {
        name: config.container_name.clone(),
        image: image.to_string(),
        cmd,
        attach_stdout: true,
        attach_stderr: true,
        privileged: config.privileged,
        publish_all_ports: false,
        tty: true,
        cpu_shares: config.cpu,
        dns: config.dns.clone(),
        hostname: config.hostname.clone(),
        memory: config.memory,
        port_specs,
        port_bindings,
        volumes,
    };
    tracing::debug!(
        "Container spec: {}",
        serde_json::to_string(&spec).unwrap_or_default()
    );
    Ok(spec)
}
