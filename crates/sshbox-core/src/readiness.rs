//! Waiting for the container's SSH daemon to accept connections

use crate::{CoreError, Result};
use sshbox_config::DriverConfig;
use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

/// A single "is SSH up?" check against a host and port
pub trait ReadinessProbe: Send + Sync {
    fn is_ready(&self, host: &str, port: u16) -> bool;
}

/// Connects over TCP and expects the server to greet with an `SSH-` banner
#[derive(Debug, Clone)]
pub struct SshBannerProbe {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for SshBannerProbe {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(2),
            read_timeout: Duration::from_secs(2),
        }
    }
}

impl SshBannerProbe {
    fn try_banner(&self, host: &str, port: u16) -> std::io::Result<bool> {
        for addr in (host, port).to_socket_addrs()? {
            let mut stream = match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::trace!("Connect to {} failed: {}", addr, e);
                    continue;
                }
            };
            stream.set_read_timeout(Some(self.read_timeout))?;

            let mut banner = [0u8; 4];
            stream.read_exact(&mut banner)?;
            return Ok(&banner == b"SSH-");
        }
        Ok(false)
    }
}

impl ReadinessProbe for SshBannerProbe {
    fn is_ready(&self, host: &str, port: u16) -> bool {
        match self.try_banner(host, port) {
            Ok(ready) => ready,
            Err(e) => {
                tracing::trace!("SSH probe of {}:{} failed: {}", host, port, e);
                false
            }
        }
    }
}

/// Overall deadline and spacing of readiness checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl WaitPolicy {
    pub fn from_config(config: &DriverConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.ssh_wait_timeout),
            interval: Duration::from_secs(config.ssh_poll_interval),
        }
    }
}

/// Poll `probe` until it reports ready or the deadline passes
///
/// The probe runs at least once, even with a zero timeout.
pub fn wait_for_ssh(
    probe: &dyn ReadinessProbe,
    host: &str,
    port: u16,
    policy: WaitPolicy,
) -> Result<()> {
    let started = Instant::now();
    let deadline = started + policy.timeout;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        if probe.is_ready(host, port) {
            tracing::info!(
                "SSH on {}:{} is ready after {} attempt(s)",
                host,
                port,
                attempt
            );
            return Ok(());
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(CoreError::ContainerNotReady {
                host: host.to_string(),
                port,
                waited: started.elapsed(),
            });
        }

        tracing::debug!(
            "Waiting for SSH on {}:{} (attempt {})",
            host,
            port,
            attempt
        );
        std::thread::sleep(policy.interval.min(deadline - now));
    }
}
