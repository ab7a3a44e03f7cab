//! External filters run through `sh -c`, fed from a [`ByteSource`] and read
//! back as a stream.
//!
//! A filter gets one child process. When its input is a stream, a relay
//! thread copies the stream into the child's stdin while the caller drains
//! stdout, so neither side can block the other. The relay drops stdin once
//! the input is exhausted, which is how the filter sees end of file. Pipes
//! are created close-on-exec, so no other child holds a write end open.

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::IngestError;
use crate::source::ByteSource;

/// Bytes per relay write into the filter's stdin.
const RELAY_CHUNK: usize = 8 * 1024;

/// Default limit on how long a filter may run.
pub const DEFAULT_FILTER_TIMEOUT: Duration = Duration::from_secs(120);

/// Settings for one filter run.
#[derive(Clone, Debug)]
pub struct FilterConfig {
    /// Kill the filter after this long. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_FILTER_TIMEOUT),
        }
    }
}

/// Where a filter's stdin comes from.
pub enum FilterInput {
    /// Relayed from this source by a helper thread.
    Source(ByteSource),
    /// Connected directly to an open file.
    File(File),
    /// No input.
    Null,
}

/// Payload of the `TimedOut` I/O error a killed filter's reader returns.
#[derive(Clone, Debug, thiserror::Error)]
#[error("filter `{command}` timed out after {timeout:?}")]
pub struct FilterTimedOut {
    pub command: String,
    pub timeout: Duration,
}

struct Watchdog {
    cancel: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl Watchdog {
    fn start(
        command: &str,
        pid: u32,
        timeout: Duration,
        fired: Arc<AtomicBool>,
    ) -> io::Result<Self> {
        let (cancel, cancelled) = mpsc::channel::<()>();
        let command = command.to_owned();
        let handle = thread::Builder::new()
            .name("filter-watchdog".into())
            .spawn(move || {
                if let Err(RecvTimeoutError::Timeout) = cancelled.recv_timeout(timeout) {
                    log::warn!("filter `{command}` timed out after {timeout:?}, killing it");
                    fired.store(true, Ordering::SeqCst);
                    kill_tree(pid);
                }
            })?;
        Ok(Self { cancel, handle })
    }

    fn stop(self) {
        // A send error means the watchdog already fired and exited.
        let _ = self.cancel.send(());
        let _ = self.handle.join();
    }
}

/// Kill the filter along with anything its shell started.
fn kill_tree(pid: u32) {
    #[cfg(unix)]
    let status = Command::new("kill")
        .args(["-KILL", "--", &format!("-{pid}")])
        .stderr(Stdio::null())
        .status();
    #[cfg(not(unix))]
    let status = Command::new("taskkill")
        .args(["/F", "/T", "/PID", &pid.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    if let Err(e) = status {
        log::warn!("failed to kill filter process group {pid}: {e}");
    }
}

/// A running filter. Reading it yields the filter's stdout.
///
/// The child is waited on when its output reaches end of file, in
/// [`finish`](Self::finish), or on drop, whichever comes first. Dropping an
/// unfinished filter kills it.
pub struct FilterProcess {
    command: String,
    child: Child,
    stdout: Option<ChildStdout>,
    relay: Option<JoinHandle<u64>>,
    watchdog: Option<Watchdog>,
    timeout: Option<Duration>,
    timed_out: Arc<AtomicBool>,
    at_eof: bool,
    status: Option<ExitStatus>,
}

impl fmt::Debug for FilterProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterProcess")
            .field("command", &self.command)
            .field("pid", &self.child.id())
            .field("status", &self.status)
            .finish()
    }
}

fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // Own process group, so a timeout can kill the whole pipeline.
        cmd.process_group(0);
    }
    cmd
}

/// Start `command` with the given input.
pub fn spawn(
    command: &str,
    input: FilterInput,
    config: &FilterConfig,
) -> Result<FilterProcess, IngestError> {
    let mut cmd = shell_command(command);
    let (stdin, relay_source) = match input {
        FilterInput::Source(source) => (Stdio::piped(), Some(source)),
        FilterInput::File(file) => (Stdio::from(file), None),
        FilterInput::Null => (Stdio::null(), None),
    };
    cmd.stdin(stdin).stdout(Stdio::piped());

    let mut child = cmd.spawn().map_err(|source| IngestError::FilterSpawn {
        command: command.to_owned(),
        source,
    })?;
    log::debug!("filter: started `{command}` as pid {}", child.id());

    let stdout = child.stdout.take();
    let child_stdin = child.stdin.take();
    let mut process = FilterProcess {
        command: command.to_owned(),
        child,
        stdout,
        relay: None,
        watchdog: None,
        timeout: config.timeout,
        timed_out: Arc::new(AtomicBool::new(false)),
        at_eof: false,
        status: None,
    };

    // From here on an early return drops `process`, which kills and reaps.
    if let Some(timeout) = config.timeout {
        let watchdog = Watchdog::start(
            command,
            process.child.id(),
            timeout,
            Arc::clone(&process.timed_out),
        )?;
        process.watchdog = Some(watchdog);
    }
    if let (Some(source), Some(stdin)) = (relay_source, child_stdin) {
        let command = command.to_owned();
        let handle = thread::Builder::new()
            .name("filter-relay".into())
            .spawn(move || relay(source, stdin, &command))?;
        process.relay = Some(handle);
    }
    Ok(process)
}

/// Copy `source` into the filter's stdin until either side is done.
fn relay(mut source: ByteSource, mut stdin: ChildStdin, command: &str) -> u64 {
    let mut buf = vec![0u8; RELAY_CHUNK];
    let mut total = 0u64;
    loop {
        let n = match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                log::warn!("filter `{command}`: reading input failed after {total} bytes: {e}");
                break;
            }
        };
        if let Err(e) = stdin.write_all(&buf[..n]) {
            if e.kind() == io::ErrorKind::BrokenPipe {
                log::debug!("filter `{command}` stopped reading after {total} bytes");
            } else {
                log::warn!("filter `{command}`: writing input failed: {e}");
            }
            break;
        }
        total += n as u64;
    }
    log::trace!("filter `{command}`: relayed {total} bytes");
    total
}

impl FilterProcess {
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    fn has_timed_out(&self) -> bool {
        self.timed_out.load(Ordering::SeqCst)
    }

    fn timeout_error(&self) -> io::Error {
        io::Error::new(
            io::ErrorKind::TimedOut,
            FilterTimedOut {
                command: self.command.clone(),
                timeout: self.timeout.unwrap_or_default(),
            },
        )
    }

    /// Close our end of stdout, wait for the child, then collect helpers.
    fn reap(&mut self) -> Result<ExitStatus, IngestError> {
        if let Some(status) = self.status {
            return Ok(status);
        }
        // A filter still writing now gets EPIPE instead of blocking.
        self.stdout = None;
        let waited = self.child.wait();
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.stop();
        }
        if let Some(relay) = self.relay.take()
            && relay.join().is_err()
        {
            log::warn!("filter `{}`: relay thread panicked", self.command);
        }
        let status = waited?;
        if !status.success() && !self.has_timed_out() {
            if self.at_eof {
                log::warn!("filter `{}` exited with {status}", self.command);
            } else {
                log::debug!("filter `{}` exited with {status} before being drained", self.command);
            }
        }
        self.status = Some(status);
        Ok(status)
    }

    /// Stop reading, wait for the filter and return its exit status.
    pub fn finish(mut self) -> Result<ExitStatus, IngestError> {
        let status = self.reap()?;
        if self.has_timed_out() {
            return Err(IngestError::FilterTimeout {
                command: self.command.clone(),
                timeout: self.timeout.unwrap_or_default(),
            });
        }
        Ok(status)
    }
}

impl Read for FilterProcess {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(stdout) = self.stdout.as_mut() else {
            if self.has_timed_out() {
                return Err(self.timeout_error());
            }
            return Ok(0);
        };
        match stdout.read(buf) {
            Ok(0) if !buf.is_empty() => {
                self.at_eof = true;
                if let Err(e) = self.reap() {
                    log::warn!("filter `{}`: wait failed: {e}", self.command);
                }
                if self.has_timed_out() {
                    return Err(self.timeout_error());
                }
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(_) if self.has_timed_out() => Err(self.timeout_error()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for FilterProcess {
    fn drop(&mut self) {
        if self.status.is_some() {
            return;
        }
        if let Ok(None) = self.child.try_wait() {
            log::debug!("filter `{}` abandoned, killing pid {}", self.command, self.child.id());
            let _ = self.child.kill();
        }
        let _ = self.reap();
    }
}

/// Pipe `source` through `command`, returning the filter's output stream.
pub fn run_filter(
    source: ByteSource,
    command: &str,
    config: &FilterConfig,
) -> Result<ByteSource, IngestError> {
    let process = spawn(command, FilterInput::Source(source), config)?;
    Ok(ByteSource::from_reader(process))
}
