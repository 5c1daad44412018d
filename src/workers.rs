// ABOUTME: Fans a multi-service deployment out to one worker process per service.
// ABOUTME: Workers share nothing; their output is relayed line by line, tagged with the service key.

use std::path::PathBuf;

use nonempty::NonEmpty;
use tokio::task::JoinSet;

use crate::error::{Error, Result};
use crate::output::OutputMode;
use crate::process::{CommandSpec, LossyLines, OutputStream, ProcessRunner};
use crate::types::RemoteHost;

/// How each worker re-invokes this binary.
#[derive(Debug, Clone)]
pub struct WorkerPlan {
    pub program: PathBuf,
    pub config_path: PathBuf,
    pub host: RemoteHost,
    pub mode: OutputMode,
    pub verbose: bool,
}

impl WorkerPlan {
    /// Command deploying the single service `key`.
    pub fn command(&self, key: &str) -> CommandSpec {
        let mut cmd = CommandSpec::new(self.program.to_string_lossy()).args([
            "up".to_string(),
            self.host.to_string(),
            key.to_string(),
            "--file".to_string(),
            self.config_path.to_string_lossy().into_owned(),
        ]);
        match self.mode {
            OutputMode::Normal => {}
            OutputMode::Quiet => cmd = cmd.arg("--quiet"),
            OutputMode::Json => cmd = cmd.arg("--json"),
        }
        if self.verbose {
            cmd = cmd.arg("--verbose");
        }
        cmd
    }
}

/// Outcome of one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerExit {
    pub key: String,
    /// `None` when the worker was killed by a signal.
    pub code: Option<i32>,
}

impl WorkerExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Run one worker per key concurrently and wait for all of them.
///
/// Results come back in `keys` order.
pub async fn run_workers<R: ProcessRunner + ?Sized>(
    runner: &R,
    plan: &WorkerPlan,
    keys: &NonEmpty<String>,
) -> Result<Vec<WorkerExit>> {
    let keys: Vec<String> = keys.iter().cloned().collect();
    let tag_lines = plan.mode != OutputMode::Json;
    let mut waits = JoinSet::new();
    let mut relays = JoinSet::new();

    for (index, key) in keys.iter().enumerate() {
        let command = plan.command(key);
        tracing::debug!(service = %key, command = %command, "starting worker");

        let handle = runner.spawn(&command).map_err(|e| Error::Worker {
            service: key.clone(),
            detail: e.to_string(),
        })?;

        let prefix = tag_lines.then(|| format!("[{}] ", key));
        if let Some(stdout) = handle.stdout {
            relays.spawn(relay_lines(stdout, prefix.clone(), false));
        }
        if let Some(stderr) = handle.stderr {
            relays.spawn(relay_lines(stderr, prefix, true));
        }

        let mut control = handle.control;
        waits.spawn(async move { (index, control.wait().await) });
    }

    let mut exits: Vec<Option<WorkerExit>> = vec![None; keys.len()];
    while let Some(joined) = waits.join_next().await {
        let (index, status) = joined.map_err(|e| Error::Worker {
            service: "<unknown>".to_string(),
            detail: e.to_string(),
        })?;
        let key = keys[index].clone();
        let code = status.map_err(|e| Error::Worker {
            service: key.clone(),
            detail: e.to_string(),
        })?;
        tracing::debug!(service = %key, exit_code = ?code, "worker finished");
        exits[index] = Some(WorkerExit { key, code });
    }

    // Flush whatever the workers wrote last.
    while relays.join_next().await.is_some() {}

    Ok(exits.into_iter().flatten().collect())
}

/// Process exit code for a fan-out: the first failing worker's code, in key order.
pub fn combined_exit_code(exits: &[WorkerExit]) -> i32 {
    exits
        .iter()
        .find(|exit| !exit.success())
        .map_or(0, |exit| exit.code.unwrap_or(1))
}

async fn relay_lines(stream: OutputStream, prefix: Option<String>, to_stderr: bool) {
    let mut lines = LossyLines::new(stream);
    while let Some(line) = lines.next_line().await {
        let line = match &prefix {
            Some(prefix) => prefix_line(prefix, &line),
            None => line,
        };
        if to_stderr {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }
}

fn prefix_line(prefix: &str, line: &str) -> String {
    format!("{}{}", prefix, line)
}
