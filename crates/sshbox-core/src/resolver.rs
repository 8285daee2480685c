//! Where the harness reaches the container's SSH daemon

use crate::container_spec::SSH_PORT;
use crate::{CoreError, Result};
use sshbox_provider::{ContainerDetails, EngineEndpoint};

/// Host used when the engine runs on this machine
pub const LOCAL_HOST: &str = "localhost";

/// Whether the engine address points at another machine
pub fn is_remote(address: &str) -> bool {
    EngineEndpoint::parse(address)
        .map(|endpoint| endpoint.is_remote())
        .unwrap_or(false)
}

/// Host the published ports are reachable on
///
/// A remote engine publishes on its own host; a local one on this machine.
pub fn resolve_host(address: &str) -> String {
    EngineEndpoint::parse(address)
        .ok()
        .filter(EngineEndpoint::is_remote)
        .and_then(|endpoint| endpoint.host())
        .unwrap_or_else(|| LOCAL_HOST.to_string())
}

/// First host port published for the container's SSH port
pub fn resolve_port(details: &ContainerDetails) -> Result<u16> {
    let key = format!("{}/tcp", SSH_PORT);
    details
        .ports
        .get(&key)
        .into_iter()
        .flatten()
        .filter_map(|binding| binding.host_port.as_deref())
        .find_map(|port| port.trim().parse::<u16>().ok())
        .ok_or_else(|| CoreError::PortBindingMissing {
            container_id: details.id.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sshbox_provider::{ContainerId, ContainerStatus, PublishedPort};
    use std::collections::BTreeMap;

    fn details(ports: BTreeMap<String, Vec<PublishedPort>>) -> ContainerDetails {
        ContainerDetails {
            id: ContainerId::new("c0ffee"),
            name: "/box".to_string(),
            status: ContainerStatus::Running,
            ports,
        }
    }

    fn published(port: &str) -> PublishedPort {
        PublishedPort {
            host_ip: Some("0.0.0.0".to_string()),
            host_port: Some(port.to_string()),
        }
    }

    #[test]
    fn test_remote_tcp_address() {
        assert!(is_remote("tcp://1.2.3.4:2375"));
        assert_eq!(resolve_host("tcp://1.2.3.4:2375"), "1.2.3.4");
    }

    #[test]
    fn test_local_socket() {
        assert!(!is_remote("unix:///var/run/docker.sock"));
        assert!(!is_remote("/var/run/docker.sock"));
        assert_eq!(resolve_host("/var/run/docker.sock"), "localhost");
    }

    #[test]
    fn test_https_remote() {
        assert!(is_remote("https://docker.example.com:2376"));
        assert_eq!(resolve_host("https://docker.example.com:2376"), "docker.example.com");
    }

    #[test]
    fn test_resolve_port() {
        let mut ports = BTreeMap::new();
        ports.insert("80/tcp".to_string(), vec![published("8080")]);
        ports.insert("22/tcp".to_string(), vec![published("32768"), published("32769")]);
        assert_eq!(resolve_port(&details(ports)).unwrap(), 32768);
    }

    #[test]
    fn test_missing_ssh_binding() {
        let mut ports = BTreeMap::new();
        ports.insert("80/tcp".to_string(), vec![published("8080")]);
        let err = resolve_port(&details(ports)).unwrap_err();
        match err {
            CoreError::PortBindingMissing { container_id } => assert_eq!(container_id, "c0ffee"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_unpublished_binding_is_missing() {
        let mut ports = BTreeMap::new();
        ports.insert(
            "22/tcp".to_string(),
            vec![PublishedPort {
                host_ip: None,
                host_port: None,
            }],
        );
        assert!(resolve_port(&details(ports)).is_err());
    }
}
