//! User-supplied Dockerfile templates
//!
//! A template location is a filesystem path, a `file://` URL or an
//! `http(s)://` URL. The fetched text is rendered against the driver options.

use crate::{CoreError, Result};
use sshbox_config::{render_template, ConfigError, DriverConfig};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Where a template comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateLocation {
    File(PathBuf),
    Remote(Url),
}

impl TemplateLocation {
    pub fn parse(location: &str) -> Result<Self> {
        match Url::parse(location) {
            Ok(url) if url.scheme() == "file" => {
                url.to_file_path()
                    .map(Self::File)
                    .map_err(|()| CoreError::TemplateFetchFailed {
                        location: location.to_string(),
                        reason: "not a local file URL".to_string(),
                    })
            }
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(Self::Remote(url)),
            // Windows drive letters parse as a one-letter scheme
            Ok(url) if url.scheme().len() > 1 => Err(CoreError::TemplateFetchFailed {
                location: location.to_string(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            }),
            _ => Ok(Self::File(PathBuf::from(location))),
        }
    }
}

/// Fetch the raw template text
pub fn fetch_template(location: &str, timeout: Duration) -> Result<String> {
    let fetched = match TemplateLocation::parse(location)? {
        TemplateLocation::File(path) => {
            tracing::debug!("Reading Dockerfile template from {}", path.display());
            std::fs::read_to_string(&path).map_err(|e| e.to_string())
        }
        TemplateLocation::Remote(url) => {
            tracing::debug!("Downloading Dockerfile template from {}", url);
            fetch_remote(url, timeout)
        }
    };

    fetched.map_err(|reason| CoreError::TemplateFetchFailed {
        location: location.to_string(),
        reason,
    })
}

fn fetch_remote(url: Url, timeout: Duration) -> std::result::Result<String, String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to start HTTP runtime: {}", e))?;

    runtime
        .block_on(async move {
            let client = reqwest::Client::builder().timeout(timeout).build()?;
            client
                .get(url)
                .send()
                .await?
                .error_for_status()?
                .text()
                .await
        })
        .map_err(|e| e.to_string())
}

/// Fetch a template and render it against the driver options
pub fn render_dockerfile_template(location: &str, config: &DriverConfig) -> Result<String> {
    let raw = fetch_template(location, config.read_timeout_duration())?;
    render_template(&raw, &config.template_context()).map_err(|e| {
        let reason = match e {
            ConfigError::Template(reason) => reason,
            other => other.to_string(),
        };
        CoreError::TemplateRenderFailed {
            location: location.to_string(),
            reason,
        }
    })
}
