//! Parsing of container-engine addresses

use crate::{EngineError, Result};
use std::path::PathBuf;
use url::{Host, Url};

/// Where the container engine listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEndpoint {
    /// Local unix socket
    Unix(PathBuf),
    /// Plain-text TCP (`tcp://host:port`)
    Tcp(String),
    /// Plain-text HTTP (`http://host:port`)
    Http(String),
    /// TLS (`https://host:port`)
    Https(String),
}

impl EngineEndpoint {
    /// Parse an engine address
    ///
    /// Accepts `unix://` URLs, bare socket paths and `tcp`/`http`/`https` URLs.
    pub fn parse(address: &str) -> Result<Self> {
        let address = address.trim();
        if address.is_empty() {
            return Err(EngineError::InvalidEndpoint("empty address".into()));
        }
        if address.starts_with('/') {
            return Ok(Self::Unix(PathBuf::from(address)));
        }

        let url = Url::parse(address)
            .map_err(|e| EngineError::InvalidEndpoint(format!("{}: {}", address, e)))?;

        match url.scheme() {
            "unix" => Ok(Self::Unix(PathBuf::from(url.path()))),
            "tcp" | "http" | "https" if url.host().is_none() => Err(
                EngineError::InvalidEndpoint(format!("{}: missing host", address)),
            ),
            "tcp" => Ok(Self::Tcp(address.to_string())),
            "http" => Ok(Self::Http(address.to_string())),
            "https" => Ok(Self::Https(address.to_string())),
            other => Err(EngineError::InvalidEndpoint(format!(
                "{}: unsupported scheme '{}'",
                address, other
            ))),
        }
    }

    /// Whether the engine is reached over the network
    pub fn is_remote(&self) -> bool {
        !matches!(self, Self::Unix(_))
    }

    /// Host part of a network address
    pub fn host(&self) -> Option<String> {
        let address = match self {
            Self::Unix(_) => return None,
            Self::Tcp(a) | Self::Http(a) | Self::Https(a) => a,
        };

        let url = Url::parse(address).ok()?;
        match url.host()? {
            Host::Domain(domain) => Some(domain.to_string()),
            Host::Ipv4(ip) => Some(ip.to_string()),
            Host::Ipv6(ip) => Some(ip.to_string()),
        }
    }
}

impl std::fmt::Display for EngineEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
            Self::Tcp(a) | Self::Http(a) | Self::Https(a) => write!(f, "{}", a),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unix() {
        assert_eq!(
            EngineEndpoint::parse("unix:///var/run/docker.sock").unwrap(),
            EngineEndpoint::Unix(PathBuf::from("/var/run/docker.sock"))
        );
        assert_eq!(
            EngineEndpoint::parse("/run/user/1000/docker.sock").unwrap(),
            EngineEndpoint::Unix(PathBuf::from("/run/user/1000/docker.sock"))
        );
    }

    #[test]
    fn test_parse_tcp() {
        let endpoint = EngineEndpoint::parse("tcp://1.2.3.4:2375").unwrap();
        assert!(endpoint.is_remote());
        assert_eq!(endpoint.host().as_deref(), Some("1.2.3.4"));
    }

    #[test]
    fn test_parse_https_domain() {
        let endpoint = EngineEndpoint::parse("https://docker.internal:2376").unwrap();
        assert!(matches!(endpoint, EngineEndpoint::Https(_)));
        assert_eq!(endpoint.host().as_deref(), Some("docker.internal"));
    }

    #[test]
    fn test_ipv6_host_without_brackets() {
        let endpoint = EngineEndpoint::parse("tcp://[::1]:2375").unwrap();
        assert_eq!(endpoint.host().as_deref(), Some("::1"));
    }

    #[test]
    fn test_unix_is_local() {
        let endpoint = EngineEndpoint::parse("unix:///var/run/docker.sock").unwrap();
        assert!(!endpoint.is_remote());
        assert_eq!(endpoint.host(), None);
    }

    #[test]
    fn test_rejects_unknown_scheme() {
        let err = EngineEndpoint::parse("npipe:////./pipe/docker_engine").unwrap_err();
        assert!(matches!(err, EngineError::InvalidEndpoint(_)));
        assert!(EngineEndpoint::parse("").is_err());
    }
}
