// ABOUTME: Command descriptions handed to a ProcessRunner.
// ABOUTME: Builders for shell strings and local/remote docker CLI invocations.

use std::fmt;
use std::path::PathBuf;

use crate::types::RemoteHost;

/// What happens to a child's stdout and stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Capture both streams into the returned output.
    #[default]
    Piped,
    /// Stream straight to the parent's terminal.
    Inherit,
    /// Discard everything.
    Null,
}

/// A program invocation: program, arguments and execution options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub output: OutputMode,
    /// Interleave stderr into stdout in arrival order (only with `Piped`).
    pub merge_streams: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            output: OutputMode::Piped,
            merge_streams: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn output(mut self, mode: OutputMode) -> Self {
        self.output = mode;
        self
    }

    pub fn merge_streams(mut self, merge: bool) -> Self {
        self.merge_streams = merge;
        self
    }

    /// Human-readable command line, used for logs and error messages.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                line.push('\'');
                line.push_str(arg);
                line.push('\'');
            } else {
                line.push_str(arg);
            }
        }
        line
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Run a shell string (such as a configured build command).
pub fn shell(script: &str) -> CommandSpec {
    if cfg!(windows) {
        CommandSpec::new("cmd").args(["/C", script])
    } else {
        CommandSpec::new("sh").args(["-c", script])
    }
}

/// A docker CLI invocation against the local daemon.
pub fn docker<I, S>(args: I) -> CommandSpec
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    CommandSpec::new("docker").args(args)
}

/// A docker CLI invocation against the daemon on `host`, tunnelled by docker over SSH.
pub fn remote_docker<I, S>(host: &RemoteHost, args: I) -> CommandSpec
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    CommandSpec::new("docker")
        .args(["-H".to_string(), host.docker_url()])
        .args(args)
}
