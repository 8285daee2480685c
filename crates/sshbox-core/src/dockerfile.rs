//! Dockerfile synthesis for SSH-ready test images
//!
//! The generated Dockerfile is made of blocks in a fixed order, each separated
//! by a blank line: base image, proxy environment, platform bootstrap, user
//! setup, custom provisioning commands.

use crate::{CoreError, Result};
use sshbox_config::DriverConfig;

/// Platform families with a known bootstrap recipe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformFamily {
    Debian,
    Ubuntu,
    Rhel,
    Centos,
}

impl std::str::FromStr for PlatformFamily {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "debian" => Ok(Self::Debian),
            "ubuntu" => Ok(Self::Ubuntu),
            "rhel" => Ok(Self::Rhel),
            "centos" => Ok(Self::Centos),
            other => Err(CoreError::UnsupportedPlatform(other.to_string())),
        }
    }
}

impl PlatformFamily {
    /// Package installation and SSH preparation for this family
    pub fn bootstrap(self, disable_upstart: bool) -> Vec<String> {
        match self {
            Self::Debian | Self::Ubuntu => apt_bootstrap(disable_upstart),
            Self::Rhel | Self::Centos => yum_bootstrap(),
        }
    }
}

fn apt_bootstrap(disable_upstart: bool) -> Vec<String> {
    let mut lines = Vec::new();
    if disable_upstart {
        lines.push("RUN dpkg-divert --local --rename --add /sbin/initctl".to_string());
        lines.push("RUN ln -sf /bin/true /sbin/initctl".to_string());
    }
    lines.push("ENV DEBIAN_FRONTEND noninteractive".to_string());
    lines.push("RUN apt-get update".to_string());
    lines.push("RUN apt-get install -y sudo openssh-server curl lsb-release".to_string());
    lines
}

fn yum_bootstrap() -> Vec<String> {
    vec![
        "RUN yum clean all".to_string(),
        "RUN yum install -y sudo openssh-server openssh-clients curl".to_string(),
        "RUN ssh-keygen -t rsa -f /etc/ssh/ssh_host_rsa_key".to_string(),
        "RUN ssh-keygen -t dsa -f /etc/ssh/ssh_host_dsa_key".to_string(),
    ]
}

/// Synthesize the Dockerfile for the internal build
pub fn internal_dockerfile(config: &DriverConfig) -> Result<String> {
    validate_image_name(&config.image)?;
    let family: PlatformFamily = config.platform.parse()?;
    validate_username(&config.username)?;

    let blocks = [
        vec![format!("FROM {}", config.image)],
        proxy_env(config),
        family.bootstrap(config.disable_upstart),
        user_setup(&config.username, &config.password),
        config
            .provision_command
            .iter()
            .map(|cmd| format!("RUN {}", cmd))
            .collect(),
    ];

    Ok(blocks
        .iter()
        .filter(|block| !block.is_empty())
        .map(|block| {
            let mut text = block.join("\n");
            text.push('\n');
            text
        })
        .collect::<Vec<_>>()
        .join("\n"))
}

fn proxy_env(config: &DriverConfig) -> Vec<String> {
    let proxies = [
        ("http_proxy", &config.http_proxy),
        ("https_proxy", &config.https_proxy),
        ("no_proxy", &config.no_proxy),
    ];

    let mut lines = Vec::new();
    for (name, value) in proxies {
        if let Some(value) = value {
            lines.push(format!("ENV {} {}", name, value));
            lines.push(format!("ENV {} {}", name.to_uppercase(), value));
        }
    }
    lines
}

fn user_setup(username: &str, password: &str) -> Vec<String> {
    vec![
        "RUN mkdir -p /var/run/sshd".to_string(),
        format!("RUN useradd -d /home/{0} -m -s /bin/bash {0}", username),
        format!("RUN echo {}:{} | chpasswd", username, password),
        format!(
            "RUN echo '{} ALL=(ALL) NOPASSWD:ALL' >> /etc/sudoers",
            username
        ),
    ]
}

/// Validate that an image name is safe to embed in a Dockerfile FROM instruction.
///
/// Rejects empty names and names containing control characters (newlines, etc.)
/// which could inject arbitrary Dockerfile instructions.
fn validate_image_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CoreError::InvalidConfig("Image name cannot be empty".into()));
    }
    if name.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err(CoreError::InvalidConfig(format!(
            "Image name contains invalid characters: {:?}",
            name
        )));
    }
    Ok(())
}

/// Standard Unix username: starts with a lowercase letter or underscore,
/// followed by lowercase letters, digits, underscores, or hyphens; at most 32 chars.
fn validate_username(user: &str) -> Result<()> {
    if user.is_empty() || user.len() > 32 {
        return Err(CoreError::InvalidConfig(format!(
            "Invalid username length: {}",
            user.len()
        )));
    }

    let starts_ok = user
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_');
    if !starts_ok {
        return Err(CoreError::InvalidConfig(format!(
            "Invalid username '{}': must start with lowercase letter or underscore",
            user
        )));
    }

    if !user
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    {
        return Err(CoreError::InvalidConfig(format!(
            "Invalid username '{}': contains invalid characters",
            user
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sshbox_config::{InstanceInfo, RawDriverConfig};

    fn config_for(platform: &str, raw: RawDriverConfig) -> DriverConfig {
        let instance = InstanceInfo {
            platform: platform.to_string(),
            ..Default::default()
        };
        raw.resolve_with(&instance, "host", 1).unwrap()
    }

    #[test]
    fn test_centos_release() {
        let dockerfile = internal_dockerfile(&config_for("centos-7", RawDriverConfig::default())).unwrap();
        assert!(dockerfile.starts_with("FROM centos:7\n"));
        assert!(dockerfile.contains("RUN yum clean all"));
        assert!(dockerfile.contains("RUN ssh-keygen -t rsa -f /etc/ssh/ssh_host_rsa_key"));
        assert!(dockerfile.contains("RUN ssh-keygen -t dsa -f /etc/ssh/ssh_host_dsa_key"));
        assert!(!dockerfile.contains("apt-get"));
    }

    #[test]
    fn test_ubuntu_without_release() {
        let dockerfile = internal_dockerfile(&config_for("ubuntu", RawDriverConfig::default())).unwrap();
        assert!(dockerfile.starts_with("FROM ubuntu\n"));
        assert!(dockerfile.contains("ENV DEBIAN_FRONTEND noninteractive"));
        assert!(dockerfile.contains("RUN apt-get install -y sudo openssh-server curl lsb-release"));
        assert!(dockerfile.contains("RUN ln -sf /bin/true /sbin/initctl"));
        assert!(!dockerfile.contains("yum"));
    }

    #[test]
    fn test_upstart_left_alone_when_disabled() {
        let raw = RawDriverConfig {
            disable_upstart: Some(false),
            ..Default::default()
        };
        let dockerfile = internal_dockerfile(&config_for("debian-12", raw)).unwrap();
        assert!(!dockerfile.contains("initctl"));
        assert!(dockerfile.contains("RUN apt-get update"));
    }

    #[test]
    fn test_unknown_platform() {
        let raw = RawDriverConfig {
            platform: Some("freebsd".to_string()),
            ..Default::default()
        };
        let err = internal_dockerfile(&config_for("freebsd-14", raw)).unwrap_err();
        match err {
            CoreError::UnsupportedPlatform(name) => assert_eq!(name, "freebsd"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_proxy_env_both_cases() {
        let raw = RawDriverConfig {
            http_proxy: Some("http://p:8080".to_string()),
            no_proxy: Some("localhost".to_string()),
            ..Default::default()
        };
        let dockerfile = internal_dockerfile(&config_for("ubuntu", raw)).unwrap();
        assert!(dockerfile.contains("ENV http_proxy http://p:8080\n"));
        assert!(dockerfile.contains("ENV HTTP_PROXY http://p:8080\n"));
        assert!(dockerfile.contains("ENV no_proxy localhost\n"));
        assert!(dockerfile.contains("ENV NO_PROXY localhost\n"));
        assert!(!dockerfile.contains("https_proxy"));
    }

    #[test]
    fn test_block_order_and_separators() {
        let raw = RawDriverConfig {
            http_proxy: Some("http://p:8080".to_string()),
            provision_command: Some(sshbox_config::OneOrMany::Many(vec![
                "echo one".to_string(),
                "echo two".to_string(),
            ])),
            ..Default::default()
        };
        let dockerfile = internal_dockerfile(&config_for("centos-7", raw)).unwrap();

        let from = dockerfile.find("FROM centos:7").unwrap();
        let proxy = dockerfile.find("ENV http_proxy").unwrap();
        let platform = dockerfile.find("RUN yum clean all").unwrap();
        let user = dockerfile.find("RUN mkdir -p /var/run/sshd").unwrap();
        let custom = dockerfile.find("RUN echo one\nRUN echo two\n").unwrap();
        assert!(from < proxy && proxy < platform && platform < user && user < custom);

        let blocks: Vec<&str> = dockerfile.split("\n\n").collect();
        assert_eq!(blocks.len(), 5);
    }

    #[test]
    fn test_user_setup() {
        let raw = RawDriverConfig {
            username: Some("tester".to_string()),
            password: Some("s3cret".to_string()),
            ..Default::default()
        };
        let dockerfile = internal_dockerfile(&config_for("ubuntu", raw)).unwrap();
        assert!(dockerfile.contains("RUN useradd -d /home/tester -m -s /bin/bash tester"));
        assert!(dockerfile.contains("RUN echo tester:s3cret | chpasswd"));
        assert!(dockerfile.contains("RUN echo 'tester ALL=(ALL) NOPASSWD:ALL' >> /etc/sudoers"));
    }

    #[test]
    fn test_rejects_unsafe_username() {
        let raw = RawDriverConfig {
            username: Some("root; rm -rf /".to_string()),
            ..Default::default()
        };
        let err = internal_dockerfile(&config_for("ubuntu", raw)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_image_with_newline() {
        let raw = RawDriverConfig {
            image: Some("ubuntu\nRUN evil".to_string()),
            ..Default::default()
        };
        assert!(internal_dockerfile(&config_for("ubuntu", raw)).is_err());
    }

    #[test]
    fn test_username_length_boundary() {
        assert!(validate_username(&"a".repeat(32)).is_ok());
        assert!(validate_username(&"a".repeat(33)).is_err());
    }
}
