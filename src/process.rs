//! Child processes with piped I/O and a bounded wait.
//!
//! Both the programs under test and the comparator go through [`run_piped`].
//! Standard input is fed from its own thread and both output pipes are
//! drained on their own threads, so a child that writes before it has read
//! all of its input cannot wedge the runner.
//!
//! Only the direct child is killed on timeout. Anything it started may keep
//! the pipes open; those pump threads are given a short grace period and then
//! detached, so the wait stays bounded either way.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::errors::FixtureError;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long pump threads may run on after a killed child.
const DRAIN_GRACE: Duration = Duration::from_millis(200);

const READ_CHUNK: usize = 8192;

/// Shared flag that stops the run at the next opportunity.
///
/// A cancelled token kills whatever child is currently being waited on.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How long to wait for a child, and what can interrupt the wait.
#[derive(Debug, Clone)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub cancel: CancelToken,
}

impl WaitPolicy {
    pub fn new(timeout: Duration, cancel: CancelToken) -> Self {
        Self { timeout, cancel }
    }
}

/// How a child stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Exited(ExitStatus),
    TimedOut,
    Cancelled,
}

#[derive(Debug)]
pub struct ProcessOutput {
    pub completion: Completion,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        matches!(self.completion, Completion::Exited(status) if status.success())
    }
}

/// Spawns `command`, feeds it `input` (or nothing), and collects both output
/// streams until it exits, times out, or the run is cancelled.
///
/// A timed-out or cancelled child is killed and reaped; whatever it wrote up
/// to that point is still returned.
pub fn run_piped(
    mut command: Command,
    input: Option<Vec<u8>>,
    policy: &WaitPolicy,
) -> Result<ProcessOutput, FixtureError> {
    let program = PathBuf::from(command.get_program());
    command
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!(program = %program.display(), "spawning");
    let mut child = command.spawn().map_err(|source| FixtureError::Spawn {
        program: program.clone(),
        source,
    })?;

    let writer = child
        .stdin
        .take()
        .zip(input)
        .map(|(pipe, bytes)| spawn_writer(pipe, bytes));
    let stdout = child.stdout.take().map(Drain::spawn);
    let stderr = child.stderr.take().map(Drain::spawn);

    let deadline = Instant::now() + policy.timeout;
    let completion =
        wait_bounded(&mut child, deadline, &policy.cancel).map_err(|source| FixtureError::Pipe {
            program: program.clone(),
            source,
        })?;

    // A normal exit leaves descendants the rest of the time budget to
    // close the pipes; a killed child only gets the grace period.
    let drain_until = match completion {
        Completion::Exited(_) => deadline.max(Instant::now() + DRAIN_GRACE),
        Completion::TimedOut | Completion::Cancelled => Instant::now() + DRAIN_GRACE,
    };

    if let Some(writer) = writer {
        if finished_by(&writer, drain_until) {
            match writer.join() {
                Ok(Ok(())) => {}
                // The child is free to stop reading early.
                Ok(Err(e)) => debug!(program = %program.display(), error = %e, "stdin not fully consumed"),
                Err(_) => warn!(program = %program.display(), "stdin writer panicked"),
            }
        } else {
            debug!(program = %program.display(), "stdin still blocked, detaching writer");
        }
    }

    let pipe_err = |source| FixtureError::Pipe {
        program: program.clone(),
        source,
    };
    let stdout = Drain::finish(stdout, drain_until, &program).map_err(pipe_err)?;
    let stderr = Drain::finish(stderr, drain_until, &program).map_err(pipe_err)?;

    Ok(ProcessOutput {
        completion,
        stdout,
        stderr,
    })
}

fn wait_bounded(child: &mut Child, deadline: Instant, cancel: &CancelToken) -> io::Result<Completion> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Completion::Exited(status));
        }
        if cancel.is_cancelled() {
            kill_and_reap(child);
            return Ok(Completion::Cancelled);
        }
        if Instant::now() >= deadline {
            kill_and_reap(child);
            return Ok(Completion::TimedOut);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn kill_and_reap(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!(error = %e, "kill failed, child probably exited");
    }
    let _ = child.wait();
}

fn spawn_writer<W: Write + Send + 'static>(mut pipe: W, bytes: Vec<u8>) -> JoinHandle<io::Result<()>> {
    thread::spawn(move || {
        pipe.write_all(&bytes)?;
        pipe.flush()
        // `pipe` drops here, closing the child's stdin.
    })
}

/// Polls until `handle` has finished or `until` has passed.
fn finished_by<T>(handle: &JoinHandle<T>, until: Instant) -> bool {
    loop {
        if handle.is_finished() {
            return true;
        }
        if Instant::now() >= until {
            return false;
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// An output pipe pumped into a shared buffer, so whatever arrived is
/// available even if the pump has to be abandoned.
struct Drain {
    buf: Arc<Mutex<Vec<u8>>>,
    handle: JoinHandle<io::Result<()>>,
}

impl Drain {
    fn spawn<R: Read + Send + 'static>(mut pipe: R) -> Self {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let handle = thread::spawn(move || {
            let mut chunk = [0u8; READ_CHUNK];
            loop {
                match pipe.read(&mut chunk) {
                    Ok(0) => return Ok(()),
                    Ok(n) => lock(&sink).extend_from_slice(&chunk[..n]),
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                    Err(e) => return Err(e),
                }
            }
        });
        Self { buf, handle }
    }

    fn finish(drain: Option<Self>, until: Instant, program: &Path) -> io::Result<Vec<u8>> {
        let Some(drain) = drain else {
            return Ok(Vec::new());
        };
        if finished_by(&drain.handle, until) {
            drain
                .handle
                .join()
                .map_err(|_| io::Error::new(io::ErrorKind::Other, "output reader panicked"))??;
        } else {
            debug!(program = %program.display(), "output pipe held open by a descendant, detaching reader");
        }
        let captured = std::mem::take(&mut *lock(&drain.buf));
        Ok(captured)
    }
}

fn lock(buf: &Mutex<Vec<u8>>) -> MutexGuard<'_, Vec<u8>> {
    buf.lock().unwrap_or_else(PoisonError::into_inner)
}
