// ABOUTME: Opens reverse tunnels and resolves the port ssh allocates on the remote side.
// ABOUTME: Races stdout and stderr for the "Allocated port N" diagnostic, bounded by a timeout.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::error::TunnelError;
use super::handle::TunnelHandle;
use crate::process::{CommandSpec, LossyLines, OutputStream, ProcessHandle, ProcessRunner};
use crate::types::RemoteHost;

/// How long ssh gets to report the allocated remote port.
pub const DEFAULT_ALLOCATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Diagnostic lines kept for error reports.
const MAX_DIAGNOSTIC_LINES: usize = 20;

/// Opens reverse tunnels through the `ssh` binary.
pub struct TunnelManager<'a, R: ?Sized> {
    runner: &'a R,
    ssh_program: String,
    allocation_timeout: Duration,
}

impl<'a, R: ProcessRunner + ?Sized> TunnelManager<'a, R> {
    pub fn new(runner: &'a R) -> Self {
        Self {
            runner,
            ssh_program: "ssh".to_string(),
            allocation_timeout: DEFAULT_ALLOCATION_TIMEOUT,
        }
    }

    pub fn ssh_program(mut self, program: impl Into<String>) -> Self {
        self.ssh_program = program.into();
        self
    }

    pub fn allocation_timeout(mut self, timeout: Duration) -> Self {
        self.allocation_timeout = timeout;
        self
    }

    /// The ssh invocation for a reverse forward of `source_port`.
    ///
    /// Remote port `0` lets sshd pick a free port, which ssh then reports.
    pub fn tunnel_command(&self, host: &RemoteHost, source_port: u16) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.ssh_program).args([
            "-N",
            "-o",
            "ExitOnForwardFailure=yes",
            "-o",
            "BatchMode=yes",
        ]);
        if let Some(port) = host.port() {
            cmd = cmd.args(["-p".to_string(), port.to_string()]);
        }
        cmd.args([
            "-R".to_string(),
            format!("0:localhost:{}", source_port),
            host.ssh_destination(),
        ])
    }

    /// Open a reverse tunnel from `host` back to local `source_port`.
    ///
    /// Returns only once the tunnel is active. On any failure the ssh process
    /// is killed before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns `TunnelError::Process` if ssh cannot be launched and
    /// `TunnelError::Allocation` if it exits or times out without reporting a port.
    pub async fn open(
        &self,
        host: &RemoteHost,
        source_port: u16,
    ) -> Result<TunnelHandle, TunnelError> {
        let command = self.tunnel_command(host, source_port);
        let ProcessHandle {
            stdout,
            stderr,
            control,
        } = self.runner.spawn(&command)?;

        let mut tunnel = TunnelHandle::establishing(host.clone(), source_port, control);

        // The allocation line usually lands on stderr, but either stream may carry it.
        let diagnostics = Arc::new(Mutex::new(Vec::new()));
        let (tx, mut rx) = mpsc::channel(2);
        for stream in [stdout, stderr].into_iter().flatten() {
            tokio::spawn(scan_for_allocation(stream, tx.clone(), Arc::clone(&diagnostics)));
        }
        drop(tx);

        let outcome = tokio::time::timeout(self.allocation_timeout, async {
            tokio::select! {
                biased;
                Some(port) = rx.recv() => Ok(port),
                status = tunnel.wait_exit() => Err(status),
            }
        })
        .await;

        let detail = match outcome {
            Ok(Ok(port)) => {
                tunnel.activate(port);
                tracing::info!(
                    host = %host,
                    "reverse tunnel established at {}:{}",
                    source_port,
                    port
                );
                return Ok(tunnel);
            }
            Ok(Err(status)) => {
                // Give the readers a moment to collect what ssh said before exiting.
                let _ = tokio::time::timeout(Duration::from_millis(500), async {
                    while rx.recv().await.is_some() {}
                })
                .await;
                let status = match status {
                    Ok(Some(code)) => format!("exit code {}", code),
                    Ok(None) => "a signal".to_string(),
                    Err(e) => e.to_string(),
                };
                format!("ssh exited with {} before allocating a port", status)
            }
            Err(_) => format!("no allocated port reported within {:?}", self.allocation_timeout),
        };

        if let Err(e) = tunnel.close() {
            tracing::warn!(host = %host, "failed to kill tunnel process: {}", e);
        }

        let said = diagnostics.lock().join("\n");
        let detail = if said.trim().is_empty() {
            detail
        } else {
            format!("{}: {}", detail, said.trim())
        };

        Err(TunnelError::Allocation {
            host: host.to_string(),
            detail,
        })
    }
}

/// Read a tunnel output stream to EOF, reporting the first allocated port.
///
/// Keeps draining after the match, and past undecodable bytes, so ssh never
/// blocks on a full pipe.
async fn scan_for_allocation(
    stream: OutputStream,
    tx: mpsc::Sender<u16>,
    diagnostics: Arc<Mutex<Vec<String>>>,
) {
    let mut lines = LossyLines::new(stream);
    let mut reported = false;

    while let Some(line) = lines.next_line().await {
        tracing::debug!("ssh: {}", line.trim_end());

        if !reported && let Some(port) = parse_allocated_port(&line) {
            reported = true;
            let _ = tx.send(port).await;
            continue;
        }

        let mut diagnostics = diagnostics.lock();
        if diagnostics.len() < MAX_DIAGNOSTIC_LINES {
            diagnostics.push(line.trim_end().to_string());
        }
    }
}

/// Extract N from ssh's `Allocated port N for remote forward to host:port`.
pub fn parse_allocated_port(line: &str) -> Option<u16> {
    const MARKER: &str = "allocated port ";

    let start = line.to_ascii_lowercase().find(MARKER)? + MARKER.len();
    let digits: String = line[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();

    digits.parse().ok().filter(|port| *port != 0)
}
