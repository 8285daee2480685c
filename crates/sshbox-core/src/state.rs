//! Instance state bag
//!
//! The state belongs to the caller and carries progress between lifecycle
//! calls: once a field is set it is the source of truth, and the driver only
//! ever fills in fields that are still missing. Persisted as JSON with the keys
//! `image_id`, `container_id`, `hostname` and `port`.

use crate::Result;
use serde::{Deserialize, Serialize};
use sshbox_provider::{ContainerId, ImageId};
use std::io::Write;
use std::path::Path;

/// Write content to a file atomically using a temp-file-then-rename pattern.
pub(crate) fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(content)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Identifiers and connection details of one provisioned instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct State {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<ImageId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_id: Option<ContainerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill `slot` from `produce` unless it already holds a value
    ///
    /// `produce` runs only for an empty slot; an existing value is never
    /// replaced. This is the resumption rule for re-entrant create calls.
    pub fn fill<'a, T>(
        slot: &'a mut Option<T>,
        produce: impl FnOnce() -> Result<T>,
    ) -> Result<&'a T> {
        let value = match slot.take() {
            Some(existing) => existing,
            None => produce()?,
        };
        Ok(&*slot.insert(value))
    }

    /// Forget the container and how to reach it; the image id is kept
    pub fn clear_container(&mut self) {
        self.container_id = None;
        self.hostname = None;
        self.port = None;
    }

    /// True once create has recorded everything the harness needs
    pub fn is_complete(&self) -> bool {
        self.image_id.is_some()
            && self.container_id.is_some()
            && self.hostname.is_some()
            && self.port.is_some()
    }

    /// Load state from a JSON file; a missing file is an empty state
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("State file not found at {:?}, starting empty", path);
            return Ok(Self::new());
        }
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    /// Save state to a JSON file atomically
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        atomic_write(path, content.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CoreError;

    #[test]
    fn test_fill_only_when_missing() {
        let mut slot: Option<String> = None;
        let value = State::fill(&mut slot, || Ok("first".to_string())).unwrap();
        assert_eq!(value, "first");

        let mut called = false;
        let value = State::fill(&mut slot, || {
            called = true;
            Ok("second".to_string())
        })
        .unwrap();
        assert_eq!(value, "first");
        assert!(!called);
    }

    #[test]
    fn test_fill_error_leaves_slot_empty() {
        let mut slot: Option<u16> = None;
        let result = State::fill(&mut slot, || {
            Err(CoreError::InvalidConfig("boom".to_string()))
        });
        assert!(result.is_err());
        assert!(slot.is_none());
    }

    #[test]
    fn test_json_keys() {
        let state = State {
            image_id: Some(ImageId::new("sha256:abc")),
            container_id: Some(ContainerId::new("c0ffee")),
            hostname: Some("localhost".to_string()),
            port: Some(32768),
        };
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["image_id"], "sha256:abc");
        assert_eq!(value["container_id"], "c0ffee");
        assert_eq!(value["hostname"], "localhost");
        assert_eq!(value["port"], 32768);
        assert!(state.is_complete());
    }

    #[test]
    fn test_empty_state_serializes_to_empty_object() {
        assert_eq!(serde_json::to_string(&State::new()).unwrap(), "{}");
    }

    #[test]
    fn test_save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("state.json");
        let state = State {
            image_id: Some(ImageId::new("sha256:abc")),
            container_id: None,
            hostname: None,
            port: None,
        };
        state.save_to(&path).unwrap();
        assert_eq!(State::load_from(&path).unwrap(), state);
    }

    #[test]
    fn test_load_missing_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let state = State::load_from(&tmp.path().join("absent.json")).unwrap();
        assert_eq!(state, State::new());
    }

    #[test]
    fn test_clear_container_keeps_image() {
        let mut state = State {
            image_id: Some(ImageId::new("sha256:abc")),
            container_id: Some(ContainerId::new("c0ffee")),
            hostname: Some("localhost".to_string()),
            port: Some(2222),
        };
        state.clear_container();
        assert_eq!(state.image_id, Some(ImageId::new("sha256:abc")));
        assert!(state.container_id.is_none());
        assert!(state.port.is_none());
    }
}
