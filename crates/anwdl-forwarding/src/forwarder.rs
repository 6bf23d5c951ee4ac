//! A single forwarded port, backed by an external relay process.

use std::net::Ipv4Addr;
use std::process::{Child, Command, Stdio};

use crate::error::{ForwardingError, Result};

/// Name of the external TCP relay binary the forwarder supervises.
/// Named the same as the original implementation's collaborator (a
/// `socat`-equivalent) so the seam is swappable without touching callers.
pub const RELAY_BINARY: &str = "socat";

/// A single host-port-to-guest-port relay, backed by a supervised child
/// process. Stopping is idempotent: calling it twice, or on a forwarder that
/// never started, is not an error.
pub struct Forwarder {
    host_port: u16,
    guest_ip: Ipv4Addr,
    guest_port: u16,
    child: Option<Child>,
}

impl Forwarder {
    /// Builds a forwarder description without starting the relay process.
    #[must_use]
    pub const fn new(host_port: u16, guest_ip: Ipv4Addr, guest_port: u16) -> Self {
        Self {
            host_port,
            guest_ip,
            guest_port,
            child: None,
        }
    }

    /// The host-side port this forwarder listens on.
    #[must_use]
    pub const fn host_port(&self) -> u16 {
        self.host_port
    }

    /// Spawns the relay process, `TCP-LISTEN:<host_port>,fork,reuseaddr`
    /// forwarding to `TCP:<guest_ip>:<guest_port>`.
    pub fn start(&mut self) -> Result<()> {
        if self.child.is_some() {
            return Ok(());
        }
        which::which(RELAY_BINARY)
            .map_err(|_| ForwardingError::RelayBinaryMissing(RELAY_BINARY.to_string()))?;

        let listen_spec = format!("TCP-LISTEN:{},fork,reuseaddr", self.host_port);
        let target_spec = format!("TCP:{}:{}", self.guest_ip, self.guest_port);

        tracing::info!(
            host_port = self.host_port,
            %self.guest_ip,
            guest_port = self.guest_port,
            "starting port forwarder"
        );

        let child = Command::new(RELAY_BINARY)
            .arg(listen_spec)
            .arg(target_spec)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        self.child = Some(child);
        Ok(())
    }

    /// Whether the relay process is currently supervised as running.
    #[must_use]
    pub fn is_running(&mut self) -> bool {
        match &mut self.child {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Stops the relay process. Idempotent.
    pub fn stop(&mut self) -> Result<()> {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        Ok(())
    }
}

impl Drop for Forwarder {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
