//! Supervised interpreter subprocesses.
//!
//! A child runs with a cleared environment, closed stdin and piped
//! stdout/stderr, as the leader of its own process group. Its wait races a
//! timer. Whichever way the child ends, the whole group is killed and the
//! child reaped before anything is returned, so no process outlives the call.

use crate::RuntimeError;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Per-stream capture limit. Output beyond it is read and discarded.
pub const MAX_CAPTURE_BYTES: usize = 1024 * 1024;

/// Appended (on its own line) to output cut at a capture limit.
pub const TRUNCATION_MARKER: &str = "[output truncated]";

/// How long to wait for pipes to close once the child is gone.
const PIPE_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub timeout: Duration,
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn envs(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    pub timed_out: bool,
    pub elapsed: Duration,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// Exit code as reported on the wire: `-1` when there is none.
    pub fn wire_exit_code(&self) -> i32 {
        self.exit_code.unwrap_or(-1)
    }

    /// Non-empty stderr lines, used as captured logs for successful runs.
    pub fn stderr_lines(&self) -> Vec<String> {
        self.stderr
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Describes an abnormal exit for when the child wrote nothing to stderr.
    pub fn describe_exit(&self) -> String {
        match (self.exit_code, self.signal) {
            (Some(code), _) => format!("Process exited with code {code}"),
            (None, Some(signal)) => format!("Process terminated by signal {signal}"),
            (None, None) => "Process terminated abnormally".to_string(),
        }
    }
}

/// Runs `spec` to completion or until its timeout fires.
///
/// Returns `Err` when the program could not be started or the OS rejected
/// its arguments, and when the child could no longer be waited on. Every
/// other outcome (including the timeout) is described by [`ProcessOutput`].
pub async fn run_supervised(spec: &ProcessSpec) -> Result<ProcessOutput, RuntimeError> {
    let start = Instant::now();

    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .env_clear()
        .envs(&spec.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    command.process_group(0);

    let mut child = command
        .spawn()
        .map_err(|source| spawn_error(&spec.program, source))?;
    // The id is gone once the child has been reaped; keep it for the sweep.
    let group = child.id();
    debug!(program = %spec.program, pid = ?group, "spawned interpreter");

    let stdout = child.stdout.take().map(StreamReader::spawn);
    let stderr = child.stderr.take().map(StreamReader::spawn);

    let waited = match tokio::time::timeout(spec.timeout, child.wait()).await {
        Ok(waited) => waited.map(|status| (status, false)),
        Err(_) => {
            debug!(
                program = %spec.program,
                timeout = ?spec.timeout,
                "timeout fired, killing process group"
            );
            kill_group(group);
            if let Err(e) = child.start_kill() {
                debug!(error = %e, "start_kill failed");
            }
            child.wait().await.map(|status| (status, true))
        }
    };
    // Background children of a finished interpreter go down with its group.
    kill_group(group);

    let (status, timed_out) = match waited {
        Ok(waited) => waited,
        Err(source) => {
            if let Err(e) = child.start_kill() {
                debug!(error = %e, "start_kill failed");
            }
            for reader in [stdout, stderr].into_iter().flatten() {
                reader.task.abort();
            }
            return Err(RuntimeError::Wait {
                program: spec.program.clone(),
                source,
            });
        }
    };
    let elapsed = start.elapsed();

    let stdout = collect(stdout).await;
    let stderr = collect(stderr).await;

    Ok(ProcessOutput {
        stdout,
        stderr,
        exit_code: status.code(),
        signal: exit_signal(&status),
        timed_out,
        elapsed,
    })
}

fn spawn_error(program: &str, source: io::Error) -> RuntimeError {
    let program = program.to_string();
    if source_rejected(&source) {
        RuntimeError::SourceRejected { program, source }
    } else {
        RuntimeError::Spawn { program, source }
    }
}

/// Errors raised for the arguments rather than the program: a NUL byte
/// inside an argument, or an argument list over the exec limit.
fn source_rejected(error: &io::Error) -> bool {
    if error.kind() == io::ErrorKind::InvalidInput {
        return true;
    }
    #[cfg(unix)]
    if error.raw_os_error() == Some(nix::errno::Errno::E2BIG as i32) {
        return true;
    }
    false
}

/// SIGKILLs the process group led by `leader`. An already empty group is
/// not an error.
fn kill_group(leader: Option<u32>) {
    #[cfg(unix)]
    if let Some(pgid) = leader.and_then(|pid| i32::try_from(pid).ok()) {
        use nix::errno::Errno;
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => debug!(pgid, error = %e, "killpg failed"),
        }
    }

    #[cfg(not(unix))]
    let _ = leader;
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}

#[derive(Default)]
struct Capture {
    bytes: Vec<u8>,
    truncated: bool,
}

impl Capture {
    fn render(&self) -> String {
        let mut text = String::from_utf8_lossy(&self.bytes).into_owned();
        if self.truncated {
            text.push('\n');
            text.push_str(TRUNCATION_MARKER);
        }
        text
    }
}

/// A pipe being drained into a buffer that stays readable after the
/// reader task is aborted.
struct StreamReader {
    capture: Arc<Mutex<Capture>>,
    task: JoinHandle<()>,
}

impl StreamReader {
    fn spawn<R>(pipe: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let capture = Arc::new(Mutex::new(Capture::default()));
        let task = tokio::spawn(drain(pipe, capture.clone()));
        Self { capture, task }
    }
}

async fn drain<R: AsyncRead + Unpin>(mut pipe: R, capture: Arc<Mutex<Capture>>) {
    let mut chunk = [0u8; 8192];

    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                let mut capture = capture.lock();
                let room = MAX_CAPTURE_BYTES.saturating_sub(capture.bytes.len());
                if n > room {
                    capture.truncated = true;
                }
                capture.bytes.extend_from_slice(&chunk[..n.min(room)]);
            }
            Err(e) => {
                debug!(error = %e, "pipe read failed");
                break;
            }
        }
    }
}

async fn collect(reader: Option<StreamReader>) -> String {
    let Some(StreamReader { capture, mut task }) = reader else {
        return String::new();
    };

    match tokio::time::timeout(PIPE_GRACE, &mut task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "pipe reader task failed"),
        Err(_) => {
            // A descendant left the process group and still holds the pipe.
            warn!("pipe still open after child exit, keeping output read so far");
            task.abort();
        }
    }

    let text = capture.lock().render();
    text
}
