//! Test support utilities for sshbox-core
//!
//! Provides MockEngine and MockProbe for unit testing the Driver
//! without requiring a real container engine or SSH server.

use crate::ReadinessProbe;
use sshbox_provider::*;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Records which methods were called on the mock
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Build { remove_intermediate: bool },
    Create { name: String, image: String },
    Start { id: String },
    Inspect { id: String },
    Stop { id: String },
    Wait { id: String },
    Remove { id: String },
}

/// Configurable mock container engine for testing
pub struct MockEngine {
    pub calls: Arc<Mutex<Vec<MockCall>>>,
    /// Dockerfile text handed to the last build call
    pub last_dockerfile: Arc<Mutex<Option<String>>>,
    /// Spec handed to the last create call
    pub last_spec: Arc<Mutex<Option<ContainerSpec>>>,
    /// Events replayed to the build callback
    pub build_events: Arc<Mutex<Vec<BuildEvent>>>,
    /// Result for build calls
    pub build_result: Arc<Mutex<Result<ImageId>>>,
    /// Result for create calls
    pub create_result: Arc<Mutex<Result<ContainerId>>>,
    /// Result for start calls
    pub start_result: Arc<Mutex<Result<()>>>,
    /// Result for inspect calls
    pub inspect_result: Arc<Mutex<Result<ContainerDetails>>>,
    /// Result for stop calls
    pub stop_result: Arc<Mutex<Result<()>>>,
    /// Result for wait calls
    pub wait_result: Arc<Mutex<Result<()>>>,
    /// Result for remove calls
    pub remove_result: Arc<Mutex<Result<()>>>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    /// Create a new mock engine with default success results
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            last_dockerfile: Arc::new(Mutex::new(None)),
            last_spec: Arc::new(Mutex::new(None)),
            build_events: Arc::new(Mutex::new(Vec::new())),
            build_result: Arc::new(Mutex::new(Ok(ImageId::new("sha256:mock_image_id")))),
            create_result: Arc::new(Mutex::new(Ok(ContainerId::new("mock_container_id")))),
            start_result: Arc::new(Mutex::new(Ok(()))),
            inspect_result: Arc::new(Mutex::new(Ok(mock_container_details(
                "mock_container_id",
                32768,
            )))),
            stop_result: Arc::new(Mutex::new(Ok(()))),
            wait_result: Arc::new(Mutex::new(Ok(()))),
            remove_result: Arc::new(Mutex::new(Ok(()))),
        }
    }

    /// Record a call
    fn record(&self, call: MockCall) {
        self.calls.lock().unwrap().push(call);
    }

    /// Set the result for a slot
    pub fn set<T>(slot: &Arc<Mutex<Result<T>>>, result: Result<T>) {
        *slot.lock().unwrap() = result;
    }
}

fn clone_result<T: Clone>(r: &Arc<Mutex<Result<T>>>) -> Result<T> {
    r.lock().unwrap().clone()
}

impl ContainerEngine for MockEngine {
    fn build_image(
        &self,
        dockerfile: &str,
        remove_intermediate: bool,
        on_event: &mut dyn FnMut(&BuildEvent),
    ) -> Result<ImageId> {
        self.record(MockCall::Build {
            remove_intermediate,
        });
        *self.last_dockerfile.lock().unwrap() = Some(dockerfile.to_string());
        for event in self.build_events.lock().unwrap().iter() {
            on_event(event);
        }
        clone_result(&self.build_result)
    }

    fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerId> {
        self.record(MockCall::Create {
            name: spec.name.clone(),
            image: spec.image.clone(),
        });
        *self.last_spec.lock().unwrap() = Some(spec.clone());
        clone_result(&self.create_result)
    }

    fn start_container(&self, id: &ContainerId) -> Result<()> {
        self.record(MockCall::Start { id: id.to_string() });
        clone_result(&self.start_result)
    }

    fn inspect_container(&self, id: &ContainerId) -> Result<ContainerDetails> {
        self.record(MockCall::Inspect { id: id.to_string() });
        clone_result(&self.inspect_result)
    }

    fn stop_container(&self, id: &ContainerId) -> Result<()> {
        self.record(MockCall::Stop { id: id.to_string() });
        clone_result(&self.stop_result)
    }

    fn wait_container(&self, id: &ContainerId) -> Result<()> {
        self.record(MockCall::Wait { id: id.to_string() });
        clone_result(&self.wait_result)
    }

    fn remove_container(&self, id: &ContainerId) -> Result<()> {
        self.record(MockCall::Remove { id: id.to_string() });
        clone_result(&self.remove_result)
    }
}

/// Create container details publishing `22/tcp` on `ssh_port`
pub fn mock_container_details(id: &str, ssh_port: u16) -> ContainerDetails {
    let mut ports = BTreeMap::new();
    ports.insert(
        "22/tcp".to_string(),
        vec![PublishedPort {
            host_ip: Some("0.0.0.0".to_string()),
            host_port: Some(ssh_port.to_string()),
        }],
    );
    ContainerDetails {
        id: ContainerId::new(id),
        name: format!("/{}", id),
        status: ContainerStatus::Running,
        ports,
    }
}

/// Readiness probe with a fixed answer
pub struct MockProbe {
    pub ready: Arc<Mutex<bool>>,
    pub checks: Arc<Mutex<Vec<(String, u16)>>>,
}

impl MockProbe {
    pub fn new(ready: bool) -> Self {
        Self {
            ready: Arc::new(Mutex::new(ready)),
            checks: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl ReadinessProbe for MockProbe {
    fn is_ready(&self, host: &str, port: u16) -> bool {
        self.checks.lock().unwrap().push((host.to_string(), port));
        *self.ready.lock().unwrap()
    }
}
