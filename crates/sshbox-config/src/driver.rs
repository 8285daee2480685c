//! Driver configuration for sshbox
//!
//! Located at `.sshbox.toml` in the project directory. The file has two tables:
//! `[driver]` with the declarative container options, and `[instance]` naming the
//! platform and suite being tested. Options left out are filled in once, at
//! construction time, by [`RawDriverConfig::resolve`].

use crate::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Sentinel value of the `dockerfile` option meaning "synthesize internally"
pub const INTERNAL_DOCKERFILE: &str = "internal";

pub const DEFAULT_RUN_COMMAND: &str = "/usr/sbin/sshd -D -o UseDNS=no -o UsePAM=no";
pub const DEFAULT_USERNAME: &str = "kitchen";
pub const DEFAULT_PASSWORD: &str = "kitchen";
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_SSH_WAIT_TIMEOUT_SECS: u64 = 150;
pub const DEFAULT_SSH_POLL_INTERVAL_SECS: u64 = 3;

/// On-disk layout of `.sshbox.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub driver: RawDriverConfig,
    pub instance: InstanceInfo,
}

impl ConfigFile {
    /// Load a config file, falling back to defaults when it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        tracing::debug!(
            "Loaded config from {:?}: platform={}, suite={}",
            path,
            config.instance.platform,
            config.instance.suite
        );

        Ok(config)
    }

    /// Resolve into the immutable driver configuration
    pub fn resolve(self) -> Result<DriverConfig> {
        self.driver.resolve(&self.instance)
    }
}

/// Identity of the test instance the container is provisioned for
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceInfo {
    /// Platform name, optionally with a release (`centos-7`, `ubuntu-22.04`, `ubuntu`)
    pub platform: String,
    /// Suite name
    pub suite: String,
    /// Project name (defaults to the current directory name)
    pub project: Option<String>,
}

impl Default for InstanceInfo {
    fn default() -> Self {
        Self {
            platform: "ubuntu".to_string(),
            suite: "default".to_string(),
            project: None,
        }
    }
}

/// A value that may be written either as a single item or as a list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(v) => vec![v],
            Self::Many(v) => v,
        }
    }
}

/// A port forward entry: a bare port number or a `host:guest` mapping string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ForwardEntry {
    Port(u16),
    Mapping(String),
}

impl std::fmt::Display for ForwardEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Port(p) => write!(f, "{}", p),
            Self::Mapping(m) => write!(f, "{}", m),
        }
    }
}

/// Where the build context comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DockerfileSource {
    /// Synthesize the Dockerfile from the configuration
    Internal,
    /// Fetch and render a template (path, `file://`, `http://` or `https://`)
    Template(String),
}

impl From<String> for DockerfileSource {
    fn from(s: String) -> Self {
        if s == INTERNAL_DOCKERFILE {
            Self::Internal
        } else {
            Self::Template(s)
        }
    }
}

impl From<DockerfileSource> for String {
    fn from(source: DockerfileSource) -> Self {
        match source {
            DockerfileSource::Internal => INTERNAL_DOCKERFILE.to_string(),
            DockerfileSource::Template(location) => location,
        }
    }
}

/// Driver options as written by the user; everything is optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawDriverConfig {
    pub socket: Option<String>,
    pub image: Option<String>,
    pub platform: Option<String>,
    pub container_name: Option<String>,
    pub privileged: Option<bool>,
    pub remove_images: Option<bool>,
    pub run_command: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub read_timeout: Option<u64>,
    pub dockerfile: Option<DockerfileSource>,
    pub disable_upstart: Option<bool>,
    pub http_proxy: Option<String>,
    pub https_proxy: Option<String>,
    pub no_proxy: Option<String>,
    pub provision_command: Option<OneOrMany<String>>,
    pub forward: Option<OneOrMany<ForwardEntry>>,
    pub volume: Option<OneOrMany<String>>,
    pub cpu: Option<i64>,
    pub dns: Option<OneOrMany<String>>,
    pub hostname: Option<String>,
    pub memory: Option<i64>,
    pub tls_cert_path: Option<PathBuf>,
    pub ssh_wait_timeout: Option<u64>,
    pub ssh_poll_interval: Option<u64>,
}

/// Resolved, immutable driver configuration
///
/// Built once per driver; every computed default has already been applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverConfig {
    /// Engine address (`unix:///var/run/docker.sock`, `tcp://host:2375`, ...)
    pub socket: String,
    pub image: String,
    /// Platform family tag (`ubuntu`, `debian`, `centos`, `rhel`)
    pub platform: String,
    pub container_name: String,
    pub privileged: bool,
    /// Remove intermediate containers after a successful build
    pub remove_images: bool,
    pub run_command: String,
    pub username: String,
    pub password: String,
    /// Engine read timeout in seconds
    pub read_timeout: u64,
    pub dockerfile: DockerfileSource,
    pub disable_upstart: bool,
    pub http_proxy: Option<String>,
    pub https_proxy: Option<String>,
    pub no_proxy: Option<String>,
    pub provision_command: Vec<String>,
    pub forward: Vec<String>,
    pub volume: Vec<String>,
    pub cpu: Option<i64>,
    pub dns: Option<Vec<String>>,
    pub hostname: Option<String>,
    pub memory: Option<i64>,
    pub tls_cert_path: Option<PathBuf>,
    /// Overall deadline for the SSH readiness wait, in seconds
    pub ssh_wait_timeout: u64,
    /// Delay between SSH readiness probes, in seconds
    pub ssh_poll_interval: u64,
}

impl RawDriverConfig {
    /// Resolve defaults using the local hostname and the current time
    pub fn resolve(self, instance: &InstanceInfo) -> Result<DriverConfig> {
        let host = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "localhost".to_string());
        let now = chrono::Utc::now().timestamp();
        self.resolve_with(instance, &host, now)
    }

    /// Resolve defaults with an explicit host name and timestamp
    pub fn resolve_with(
        self,
        instance: &InstanceInfo,
        host: &str,
        timestamp: i64,
    ) -> Result<DriverConfig> {
        if instance.platform.trim().is_empty() {
            return Err(ConfigError::Invalid("instance platform cannot be empty".into()));
        }

        let read_timeout = self.read_timeout.unwrap_or(DEFAULT_READ_TIMEOUT_SECS);
        if read_timeout == 0 {
            return Err(ConfigError::Invalid("read_timeout must be positive".into()));
        }
        let ssh_poll_interval = self
            .ssh_poll_interval
            .unwrap_or(DEFAULT_SSH_POLL_INTERVAL_SECS);
        if ssh_poll_interval == 0 {
            return Err(ConfigError::Invalid(
                "ssh_poll_interval must be positive".into(),
            ));
        }

        let container_name = match self.container_name {
            Some(name) => name,
            None => {
                let project = instance.project.clone().unwrap_or_else(default_project);
                default_container_name(
                    &instance.platform,
                    &project,
                    &instance.suite,
                    host,
                    timestamp,
                )
            }
        };

        Ok(DriverConfig {
            socket: self.socket.unwrap_or_else(default_socket),
            image: self
                .image
                .unwrap_or_else(|| default_image(&instance.platform)),
            platform: self
                .platform
                .unwrap_or_else(|| default_platform(&instance.platform)),
            container_name,
            privileged: self.privileged.unwrap_or(false),
            remove_images: self.remove_images.unwrap_or(true),
            run_command: self
                .run_command
                .unwrap_or_else(|| DEFAULT_RUN_COMMAND.to_string()),
            username: self
                .username
                .unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
            password: self
                .password
                .unwrap_or_else(|| DEFAULT_PASSWORD.to_string()),
            read_timeout,
            dockerfile: self.dockerfile.unwrap_or(DockerfileSource::Internal),
            disable_upstart: self.disable_upstart.unwrap_or(true),
            http_proxy: self.http_proxy,
            https_proxy: self.https_proxy,
            no_proxy: self.no_proxy,
            provision_command: self
                .provision_command
                .map(OneOrMany::into_vec)
                .unwrap_or_default(),
            forward: self
                .forward
                .map(|f| f.into_vec().iter().map(ToString::to_string).collect())
                .unwrap_or_default(),
            volume: self.volume.map(OneOrMany::into_vec).unwrap_or_default(),
            cpu: self.cpu,
            dns: self.dns.map(OneOrMany::into_vec),
            hostname: self.hostname,
            memory: self.memory,
            tls_cert_path: self.tls_cert_path,
            ssh_wait_timeout: self
                .ssh_wait_timeout
                .unwrap_or(DEFAULT_SSH_WAIT_TIMEOUT_SECS),
            ssh_poll_interval,
        })
    }
}

impl DriverConfig {
    /// Engine read timeout
    pub fn read_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.read_timeout)
    }

    /// Key/value pairs exposed to Dockerfile templates
    ///
    /// Lists render space-separated and unset options render empty.
    pub fn template_context(&self) -> BTreeMap<String, String> {
        let value = match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => return BTreeMap::new(),
        };

        value
            .into_iter()
            .map(|(key, v)| (key, render_value(&v)))
            .collect()
    }
}

fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(render_value)
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}

/// Engine address from `DOCKER_HOST`, else the local unix socket
pub fn default_socket() -> String {
    std::env::var("DOCKER_HOST")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unix:///var/run/docker.sock".to_string())
}

/// `centos-7` gives `centos:7`; a name without a release is used as-is
pub fn default_image(platform_name: &str) -> String {
    match platform_name.split_once('-') {
        Some((platform, release)) => format!("{}:{}", platform, release),
        None => platform_name.to_string(),
    }
}

/// `centos-7` gives `centos`; a name without a release falls back to `ubuntu`
pub fn default_platform(platform_name: &str) -> String {
    match platform_name.split_once('-') {
        Some((platform, _)) => platform.to_string(),
        None => "ubuntu".to_string(),
    }
}

/// `platform..project..suite..host..timestamp`, made safe for the engine
pub fn default_container_name(
    platform_name: &str,
    project: &str,
    suite: &str,
    host: &str,
    timestamp: i64,
) -> String {
    let short_host = host.split('.').next().unwrap_or(host);
    let name = [
        platform_name,
        project,
        suite,
        short_host,
        &timestamp.to_string(),
    ]
    .join("..");
    sanitize_container_name(&name)
}

/// Replace characters the engine rejects in container names
///
/// Names must match `[a-zA-Z0-9][a-zA-Z0-9_.-]*`.
pub fn sanitize_container_name(name: &str) -> String {
    let mut sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();

    if !sanitized
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric())
    {
        sanitized.insert(0, 'x');
    }
    sanitized
}

fn default_project() -> String {
    std::env::current_dir()
        .ok()
        .and_then(|dir| dir.file_name().map(|n| n.to_string_lossy().to_string()))
        .unwrap_or_else(|| "sshbox".to_string())
}
