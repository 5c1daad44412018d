// ABOUTME: Scripted ProcessRunner for pipeline tests without docker or ssh.
// ABOUTME: Answers commands by substring rules and records every invocation.

use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

use async_trait::async_trait;
use deployer::process::{
    CommandSpec, OutputStream, ProcessControl, ProcessError, ProcessHandle, ProcessOutput,
    ProcessRunner,
};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::watch;

/// Port the default tunnel script reports.
pub const TUNNEL_PORT: u16 = 40661;

/// How a spawned process behaves.
#[derive(Debug, Clone)]
pub struct SpawnScript {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// `Some(code)` exits right away; `None` runs until killed.
    pub exit: Option<Option<i32>>,
    pub launch_fails: bool,
}

impl SpawnScript {
    /// An ssh reverse tunnel that reports `port` on stderr and stays up.
    pub fn tunnel(port: u16) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: format!("Allocated port {} for remote forward to localhost:20000\n", port)
                .into_bytes(),
            exit: None,
            launch_fails: false,
        }
    }

    /// ssh that gives up before allocating anything.
    pub fn exits(code: i32, stderr: &str) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
            exit: Some(Some(code)),
            launch_fails: false,
        }
    }

    /// ssh that stays up without ever reporting a port.
    pub fn silent() -> Self {
        Self {
            stdout: Vec::new(),
            stderr: Vec::new(),
            exit: None,
            launch_fails: false,
        }
    }

    pub fn missing_binary() -> Self {
        Self {
            launch_fails: true,
            ..Self::silent()
        }
    }

    pub fn on_stdout(mut self) -> Self {
        self.stdout = std::mem::take(&mut self.stderr);
        self
    }

    /// Bytes ssh writes to stderr before anything else.
    pub fn after_banner(mut self, banner: &[u8]) -> Self {
        self.stderr.splice(0..0, banner.iter().copied());
        self
    }

    /// Bytes ssh keeps writing to stderr once the tunnel is up.
    pub fn then_chatter(mut self, chatter: &[u8]) -> Self {
        self.stderr.extend_from_slice(chatter);
        self
    }

    /// Everything the process writes, both streams.
    pub fn total_bytes(&self) -> usize {
        self.stdout.len() + self.stderr.len()
    }
}

struct Rule {
    pattern: String,
    output: ProcessOutput,
}

/// Records commands and replays canned outputs.
///
/// Rules match by substring of the command line; the most recently added
/// matching rule wins. Unmatched commands succeed with empty output.
pub struct FakeRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<CommandSpec>>,
    spawns: Mutex<Vec<CommandSpec>>,
    script: Mutex<SpawnScript>,
    kills: Arc<AtomicUsize>,
    drained: Arc<AtomicUsize>,
}

impl Default for FakeRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeRunner {
    pub fn new() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            spawns: Mutex::new(Vec::new()),
            script: Mutex::new(SpawnScript::tunnel(TUNNEL_PORT)),
            kills: Arc::new(AtomicUsize::new(0)),
            drained: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Answer commands containing `pattern` with exit 0 and `stdout`.
    pub fn stdout(self, pattern: &str, stdout: &str) -> Self {
        self.respond(
            pattern,
            ProcessOutput {
                exit_code: Some(0),
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        )
    }

    /// Answer commands containing `pattern` with `code` and `stderr`.
    pub fn fail(self, pattern: &str, code: i32, stderr: &str) -> Self {
        self.respond(
            pattern,
            ProcessOutput {
                exit_code: Some(code),
                stdout: String::new(),
                stderr: stderr.to_string(),
            },
        )
    }

    pub fn respond(self, pattern: &str, output: ProcessOutput) -> Self {
        self.rules.lock().push(Rule {
            pattern: pattern.to_string(),
            output,
        });
        self
    }

    pub fn spawn_script(self, script: SpawnScript) -> Self {
        *self.script.lock() = script;
        self
    }

    /// A reachable local registry on `port`.
    pub fn with_local_registry(self, container: &str, port: u16) -> Self {
        self.stdout(
            &format!("docker port {}", container),
            &format!("5000/tcp -> 0.0.0.0:{port}\n5000/tcp -> [::]:{port}\n"),
        )
    }

    /// A swarm of `nodes` nodes.
    pub fn with_nodes(self, nodes: usize) -> Self {
        let ids: String = (1..=nodes).map(|n| format!("node{n}\n")).collect();
        self.stdout("node ls --format {{.ID}}", &ids)
    }

    /// Command lines of every buffered run, in order.
    pub fn commands(&self) -> Vec<String> {
        self.calls.lock().iter().map(CommandSpec::command_line).collect()
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().clone()
    }

    /// Command lines of every spawn, in order.
    pub fn spawned(&self) -> Vec<String> {
        self.spawns.lock().iter().map(CommandSpec::command_line).collect()
    }

    /// Whether some recorded run contains `needle`.
    pub fn ran(&self, needle: &str) -> bool {
        self.commands().iter().any(|line| line.contains(needle))
    }

    /// Position of the first run containing `needle`.
    pub fn position(&self, needle: &str) -> Option<usize> {
        self.commands().iter().position(|line| line.contains(needle))
    }

    /// Kill signals delivered to spawned processes.
    pub fn kills(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }

    /// Bytes read so far from the output streams of spawned processes.
    pub fn drained(&self) -> usize {
        self.drained.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    async fn run(&self, command: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
        let line = command.command_line();
        self.calls.lock().push(command.clone());

        let rules = self.rules.lock();
        let output = rules
            .iter()
            .rev()
            .find(|rule| line.contains(&rule.pattern))
            .map(|rule| rule.output.clone())
            .unwrap_or_else(|| ProcessOutput {
                exit_code: Some(0),
                ..ProcessOutput::default()
            });
        Ok(output)
    }

    fn spawn(&self, command: &CommandSpec) -> Result<ProcessHandle, ProcessError> {
        self.spawns.lock().push(command.clone());
        let script = self.script.lock().clone();

        if script.launch_fails {
            return Err(ProcessError::Launch {
                program: command.program.clone(),
                source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
            });
        }

        let (status, waiter) = watch::channel(script.exit);
        let stdout: OutputStream = Box::new(CountingReader::new(script.stdout, &self.drained));
        let stderr: OutputStream = Box::new(CountingReader::new(script.stderr, &self.drained));

        Ok(ProcessHandle {
            stdout: Some(stdout),
            stderr: Some(stderr),
            control: Box::new(FakeControl {
                status,
                waiter,
                kills: Arc::clone(&self.kills),
            }),
        })
    }
}

/// Canned process output that counts the bytes its reader consumed.
struct CountingReader {
    inner: Cursor<Vec<u8>>,
    read: Arc<AtomicUsize>,
}

impl CountingReader {
    fn new(bytes: Vec<u8>, read: &Arc<AtomicUsize>) -> Self {
        Self {
            inner: Cursor::new(bytes),
            read: Arc::clone(read),
        }
    }
}

impl AsyncRead for CountingReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        let poll = Pin::new(&mut self.inner).poll_read(cx, buf);
        self.read.fetch_add(buf.filled().len() - before, Ordering::SeqCst);
        poll
    }
}

/// A process that exits when scripted to or when killed.
pub struct FakeControl {
    status: watch::Sender<Option<Option<i32>>>,
    waiter: watch::Receiver<Option<Option<i32>>>,
    kills: Arc<AtomicUsize>,
}

#[async_trait]
impl ProcessControl for FakeControl {
    fn id(&self) -> Option<u32> {
        Some(4242)
    }

    async fn wait(&mut self) -> io::Result<Option<i32>> {
        let status = self
            .waiter
            .wait_for(Option::is_some)
            .await
            .map_err(|_| io::Error::other("status channel closed"))?;
        Ok((*status).flatten())
    }

    fn kill(&mut self) -> io::Result<()> {
        self.kills.fetch_add(1, Ordering::SeqCst);
        self.status.send_if_modified(|status| {
            if status.is_none() {
                *status = Some(None);
                true
            } else {
                false
            }
        });
        Ok(())
    }
}
