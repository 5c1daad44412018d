// ABOUTME: ProcessRunner backed by tokio::process on the local machine.
// ABOUTME: Children are killed on drop so an abandoned pipeline never leaks them.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use super::command::{CommandSpec, OutputMode};
use super::error::ProcessError;
use super::lines::LossyLines;
use super::runner::{OutputStream, ProcessControl, ProcessHandle, ProcessOutput, ProcessRunner};

/// Runs commands as local OS processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalRunner;

impl LocalRunner {
    pub fn new() -> Self {
        Self
    }

    fn command(spec: &CommandSpec) -> Command {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args).kill_on_drop(true);
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn launch_error(spec: &CommandSpec, source: std::io::Error) -> ProcessError {
        ProcessError::Launch {
            program: spec.program.clone(),
            source,
        }
    }

    fn io_error(spec: &CommandSpec, source: std::io::Error) -> ProcessError {
        ProcessError::Io {
            program: spec.program.clone(),
            source,
        }
    }

    async fn run_unpiped(spec: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
        let mut cmd = Self::command(spec);
        if spec.output == OutputMode::Inherit {
            cmd.stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit());
        } else {
            cmd.stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null());
        }

        let mut child = cmd.spawn().map_err(|e| Self::launch_error(spec, e))?;
        let status = child.wait().await.map_err(|e| Self::io_error(spec, e))?;

        Ok(ProcessOutput {
            exit_code: status.code(),
            ..Default::default()
        })
    }

    async fn run_piped(spec: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
        let child = Self::command(spec)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Self::launch_error(spec, e))?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Self::io_error(spec, e))?;

        Ok(ProcessOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    async fn run_merged(spec: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
        let mut child = Self::command(spec)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Self::launch_error(spec, e))?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, tx));
        } else {
            drop(tx);
        }

        let mut merged = String::new();
        while let Some(line) = rx.recv().await {
            merged.push_str(&line);
            merged.push('\n');
        }

        let status = child.wait().await.map_err(|e| Self::io_error(spec, e))?;

        Ok(ProcessOutput {
            exit_code: status.code(),
            stdout: merged,
            stderr: String::new(),
        })
    }
}

/// Send every line of `reader` into `tx` until EOF.
async fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = LossyLines::new(reader);
    while let Some(line) = lines.next_line().await {
        if tx.send(line).is_err() {
            break;
        }
    }
}

#[async_trait]
impl ProcessRunner for LocalRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
        tracing::debug!(command = %spec, "running command");

        let output = match spec.output {
            OutputMode::Inherit | OutputMode::Null => Self::run_unpiped(spec).await?,
            OutputMode::Piped if spec.merge_streams => Self::run_merged(spec).await?,
            OutputMode::Piped => Self::run_piped(spec).await?,
        };

        tracing::debug!(command = %spec, exit_code = ?output.exit_code, "command finished");
        Ok(output)
    }

    fn spawn(&self, spec: &CommandSpec) -> Result<ProcessHandle, ProcessError> {
        tracing::debug!(command = %spec, "spawning process");

        let mut child = Self::command(spec)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Self::launch_error(spec, e))?;

        let stdout = child.stdout.take().map(|s| Box::new(s) as OutputStream);
        let stderr = child.stderr.take().map(|s| Box::new(s) as OutputStream);

        Ok(ProcessHandle {
            stdout,
            stderr,
            control: Box::new(ChildControl { child }),
        })
    }
}

/// ProcessControl over a tokio child.
struct ChildControl {
    child: Child,
}

#[async_trait]
impl ProcessControl for ChildControl {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn wait(&mut self) -> std::io::Result<Option<i32>> {
        let status = self.child.wait().await?;
        Ok(status.code())
    }

    fn kill(&mut self) -> std::io::Result<()> {
        // Already reaped children reject start_kill; that is still a terminated process.
        if let Ok(Some(_)) = self.child.try_wait() {
            return Ok(());
        }
        self.child.start_kill()
    }
}
