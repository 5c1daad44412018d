// ABOUTME: Handle over a running reverse tunnel process.
// ABOUTME: Terminates exactly once, either through close() or on drop.

use std::fmt;
use std::time::Duration;

use crate::process::ProcessControl;
use crate::types::RemoteHost;

/// Lifecycle of a tunnel process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelState {
    /// Spawned, remote port not yet reported.
    Establishing,
    /// Remote port allocated and forwarding.
    Active,
    /// Process killed; never leaves this state.
    Terminated,
}

impl fmt::Display for TunnelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TunnelState::Establishing => write!(f, "establishing"),
            TunnelState::Active => write!(f, "active"),
            TunnelState::Terminated => write!(f, "terminated"),
        }
    }
}

/// A reverse tunnel: `destination_port` on the remote host forwards to
/// `source_port` on this machine.
///
/// Dropping a handle that was not closed kills the process, so a tunnel
/// cannot outlive the scope that opened it.
pub struct TunnelHandle {
    host: RemoteHost,
    source_port: u16,
    destination_port: u16,
    state: TunnelState,
    control: Box<dyn ProcessControl>,
}

impl fmt::Debug for TunnelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TunnelHandle")
            .field("host", &self.host)
            .field("source_port", &self.source_port)
            .field("destination_port", &self.destination_port)
            .field("state", &self.state)
            .field("pid", &self.control.id())
            .finish()
    }
}

impl TunnelHandle {
    pub(super) fn establishing(
        host: RemoteHost,
        source_port: u16,
        control: Box<dyn ProcessControl>,
    ) -> Self {
        Self {
            host,
            source_port,
            destination_port: 0,
            state: TunnelState::Establishing,
            control,
        }
    }

    pub(super) fn activate(&mut self, destination_port: u16) {
        self.destination_port = destination_port;
        self.state = TunnelState::Active;
    }

    pub(super) async fn wait_exit(&mut self) -> std::io::Result<Option<i32>> {
        self.control.wait().await
    }

    pub fn host(&self) -> &RemoteHost {
        &self.host
    }

    /// Local port the tunnel forwards to.
    pub fn source_port(&self) -> u16 {
        self.source_port
    }

    /// Port allocated on the remote host (zero while establishing).
    pub fn destination_port(&self) -> u16 {
        self.destination_port
    }

    pub fn state(&self) -> TunnelState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TunnelState::Active
    }

    /// Kill the tunnel process. Idempotent: only the first call signals it.
    ///
    /// # Errors
    ///
    /// Returns the kill error from the first call; the handle is considered
    /// terminated either way.
    pub fn close(&mut self) -> std::io::Result<()> {
        if self.state == TunnelState::Terminated {
            return Ok(());
        }
        self.state = TunnelState::Terminated;
        tracing::debug!(host = %self.host, pid = ?self.control.id(), "terminating tunnel");
        self.control.kill()
    }

    /// Close the tunnel and wait up to `grace` for the process to exit.
    pub async fn shutdown(mut self, grace: Duration) -> std::io::Result<()> {
        self.close()?;
        match tokio::time::timeout(grace, self.control.wait()).await {
            Ok(status) => status.map(|_| ()),
            Err(_) => {
                tracing::warn!(host = %self.host, "tunnel process did not exit within {:?}", grace);
                Ok(())
            }
        }
    }
}

impl Drop for TunnelHandle {
    fn drop(&mut self) {
        if self.state != TunnelState::Terminated {
            tracing::debug!(host = %self.host, "tunnel dropped while {}", self.state);
            let _ = self.close();
        }
    }
}
