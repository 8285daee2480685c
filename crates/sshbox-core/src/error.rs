//! Error types for sshbox-core

use sshbox_provider::EngineError;
use std::time::Duration;
use thiserror::Error;

/// Engine-facing step of the create path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleStep {
    Connect,
    BuildImage,
    CreateContainer,
    StartContainer,
    InspectContainer,
}

impl std::fmt::Display for LifecycleStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::BuildImage => write!(f, "build image"),
            Self::CreateContainer => write!(f, "create container"),
            Self::StartContainer => write!(f, "start container"),
            Self::InspectContainer => write!(f, "inspect container"),
        }
    }
}

/// Step of the teardown sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownStep {
    Stop,
    Wait,
    Delete,
}

impl std::fmt::Display for TeardownStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stop => write!(f, "stop"),
            Self::Wait => write!(f, "wait"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(#[from] sshbox_config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown platform '{0}'")]
    UnsupportedPlatform(String),

    #[error("Failed to fetch Dockerfile template {location}: {reason}")]
    TemplateFetchFailed { location: String, reason: String },

    #[error("Failed to render Dockerfile template {location}: {reason}")]
    TemplateRenderFailed { location: String, reason: String },

    #[error("Container engine unreachable during {step}{}: {source}", fmt_target(.target))]
    EngineUnreachable {
        step: LifecycleStep,
        target: Option<String>,
        source: EngineError,
    },

    #[error("Container engine rejected {step}{}: {source}", fmt_target(.target))]
    EngineRejected {
        step: LifecycleStep,
        target: Option<String>,
        source: EngineError,
    },

    #[error("Container {container_id} does not publish a host port for 22/tcp")]
    PortBindingMissing { container_id: String },

    #[error("SSH on {host}:{port} not reachable after {}s", .waited.as_secs())]
    ContainerNotReady {
        host: String,
        port: u16,
        waited: Duration,
    },

    #[error("Teardown of container {container_id} failed at {step}: {source}")]
    TeardownFailed {
        step: TeardownStep,
        container_id: String,
        source: EngineError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Classify an engine failure on the create path
    pub fn engine(step: LifecycleStep, target: Option<&str>, source: EngineError) -> Self {
        let target = target.map(str::to_string);
        if source.is_unreachable() {
            Self::EngineUnreachable {
                step,
                target,
                source,
            }
        } else {
            Self::EngineRejected {
                step,
                target,
                source,
            }
        }
    }

    /// Whether re-invoking the same lifecycle call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::EngineUnreachable { .. } | Self::ContainerNotReady { .. } | Self::TeardownFailed { .. }
        )
    }
}

fn fmt_target(target: &Option<String>) -> String {
    target
        .as_ref()
        .map(|t| format!(" of {}", t))
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, CoreError>;
