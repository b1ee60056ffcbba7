//! Step Session
//!
//! Runs one engine process per loaded program and hands out one decoded
//! [`Graph`] per rewriting step.
//!
//! ## Threads
//!
//! ```text
//! ┌──────────┐ stdin  "\n" every keepalive_ms  ┌──────────────┐
//! │ keepalive│───────────────────────────────▶│              │
//! └──────────┘                                 │    engine    │
//! ┌──────────┐ stdout  one JSON line per step  │   process    │
//! │  reader  │◀───────────────────────────────│              │
//! └────┬─────┘                                 └──────┬───────┘
//!      │ mpsc                                         │ stderr
//!      ▼                                              ▼
//!  next_graph()                                  log::debug!
//! ```
//!
//! All three threads live as long as the process and are joined on close.

use crate::config::EngineConfig;
use crate::error::{DecodeError, Result, StepError};
use crate::graph::{decode_with, Graph, SnapshotFormat};
use parking_lot::Mutex;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Running,
    /// Engine output ended
    Exited,
    /// Closed by the caller or after a fatal error
    Closed,
}

/// One running engine process
pub struct StepSession {
    program: PathBuf,
    format: SnapshotFormat,
    child: Arc<Mutex<Child>>,
    lines: Receiver<io::Result<Vec<u8>>>,
    pending: Option<io::Result<Vec<u8>>>,
    steps: usize,
    state: SessionState,
    threads: Vec<JoinHandle<()>>,
}

/// Terminates a session's process from another thread
///
/// A `next_graph` blocked on the session returns
/// [`StepError::ProcessExited`] once the process is gone.
#[derive(Clone)]
pub struct SessionCloser {
    child: Arc<Mutex<Child>>,
}

impl SessionCloser {
    pub fn close(&self) {
        let mut child = self.child.lock();
        if let Ok(None) = child.try_wait() {
            if let Err(e) = child.kill() {
                log::debug!("Failed to kill engine: {}", e);
            }
        }
    }
}

impl StepSession {
    /// Launch the engine on `program`
    pub fn open(program: impl AsRef<Path>, engine: &EngineConfig) -> Result<Self> {
        let program = program.as_ref().to_path_buf();
        let launch_error = |source: io::Error| StepError::ProcessLaunch {
            binary: engine.binary.clone(),
            source,
        };

        if !program.is_file() {
            return Err(launch_error(io::Error::new(
                io::ErrorKind::NotFound,
                format!("program file not found: {}", program.display()),
            )));
        }

        let binary = engine.resolve_binary().map_err(launch_error)?;
        let args = engine.args_for(&program);
        log::info!("Starting engine: {} {}", binary.display(), args.join(" "));

        let mut child = Command::new(&binary)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(launch_error)?;

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            // Unreachable with piped stdio, but never leave the engine running
            let _ = child.kill();
            let _ = child.wait();
            return Err(StepError::Io(io::Error::other("engine stdio was not captured")));
        };

        let (tx, rx) = channel();
        let threads = vec![
            spawn_reader(stdout, tx),
            spawn_keepalive(stdin, engine.keepalive_interval()),
            thread::spawn(move || {
                for line in BufReader::new(stderr).lines().map_while(|l| l.ok()) {
                    log::debug!("engine: {}", line);
                }
            }),
        ];

        Ok(Self {
            program,
            format: engine.format,
            child: Arc::new(Mutex::new(child)),
            lines: rx,
            pending: None,
            steps: 0,
            state: SessionState::Running,
            threads,
        })
    }

    /// Program this session runs
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Number of snapshots consumed so far
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn is_closed(&self) -> bool {
        self.state != SessionState::Running
    }

    pub fn closer(&self) -> SessionCloser {
        SessionCloser {
            child: Arc::clone(&self.child),
        }
    }

    /// Whether another snapshot is available or may still arrive
    ///
    /// Once the engine has exited, remaining output is drained before
    /// answering, so `false` means every snapshot has been consumed.
    pub fn has_next(&mut self) -> bool {
        if self.state != SessionState::Running {
            return false;
        }
        if self.pending.is_some() {
            return true;
        }

        match self.lines.try_recv() {
            Ok(item) => {
                self.pending = Some(item);
                true
            }
            Err(TryRecvError::Disconnected) => {
                self.mark_exited();
                false
            }
            Err(TryRecvError::Empty) if self.engine_exited() => match self.lines.recv() {
                Ok(item) => {
                    self.pending = Some(item);
                    true
                }
                Err(_) => {
                    self.mark_exited();
                    false
                }
            },
            Err(TryRecvError::Empty) => true,
        }
    }

    /// Block until the next snapshot arrives and decode it
    pub fn next_graph(&mut self) -> Result<Graph> {
        match self.state {
            SessionState::Running => {}
            SessionState::Exited => return Err(StepError::ProcessExited { steps: self.steps }),
            SessionState::Closed => return Err(StepError::Closed),
        }

        let item = match self.pending.take() {
            Some(item) => Some(item),
            None => self.lines.recv().ok(),
        };

        match item {
            None => {
                self.mark_exited();
                Err(StepError::ProcessExited { steps: self.steps })
            }
            Some(Err(e)) => {
                log::warn!("Reading engine output failed: {}", e);
                self.close();
                Err(StepError::Io(e))
            }
            Some(Ok(line)) => match decode_line(line, self.format) {
                Ok(graph) => {
                    self.steps += 1;
                    log::debug!(
                        "Step {}: {} nodes, {} edges",
                        self.steps,
                        graph.nodes().len(),
                        graph.edges().len()
                    );
                    Ok(graph)
                }
                Err(source) => {
                    let step = self.steps + 1;
                    log::warn!("Bad snapshot at step {}: {}", step, source);
                    self.close();
                    Err(StepError::Protocol { step, source })
                }
            },
        }
    }

    /// Terminate the engine and release its I/O handles
    pub fn close(&mut self) {
        if self.state == SessionState::Running {
            self.state = SessionState::Closed;
        }
        self.terminate();
    }

    fn mark_exited(&mut self) {
        log::info!(
            "Engine finished {} after {} step(s)",
            self.program.display(),
            self.steps
        );
        self.state = SessionState::Exited;
        self.terminate();
    }

    fn engine_exited(&self) -> bool {
        matches!(self.child.lock().try_wait(), Ok(Some(_)))
    }

    fn terminate(&mut self) {
        {
            let mut child = self.child.lock();
            match child.try_wait() {
                Ok(Some(_)) => {}
                _ => {
                    if let Err(e) = child.kill() {
                        log::debug!("Failed to kill engine: {}", e);
                    }
                }
            }
            match child.wait() {
                Ok(status) => log::debug!("Engine exited with {}", status),
                Err(e) => log::warn!("Failed to reap engine: {}", e),
            }
        }

        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                log::warn!("Engine I/O thread panicked");
            }
        }
    }
}

impl Iterator for StepSession {
    type Item = Result<Graph>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.has_next() {
            Some(self.next_graph())
        } else {
            None
        }
    }
}

impl Drop for StepSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn decode_line(
    line: Vec<u8>,
    format: SnapshotFormat,
) -> std::result::Result<Graph, DecodeError> {
    let line = String::from_utf8(line)?;
    decode_with(&line, format)
}

/// Forward non-blank stdout lines until EOF or a read error
///
/// Lines travel as raw bytes so that bad encoding is reported by the
/// decoder rather than as a read failure.
fn spawn_reader(
    stdout: impl io::Read + Send + 'static,
    tx: Sender<io::Result<Vec<u8>>>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(stdout);
        loop {
            let mut line = Vec::new();
            match reader.read_until(b'\n', &mut line) {
                Ok(0) => break,
                Ok(_) if line.iter().all(u8::is_ascii_whitespace) => continue,
                Ok(_) => {
                    if tx.send(Ok(line)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e));
                    break;
                }
            }
        }
        log::debug!("Engine stdout closed");
    })
}

/// Keep the engine's stdin busy until it goes away
fn spawn_keepalive(mut stdin: ChildStdin, interval: Duration) -> JoinHandle<()> {
    thread::spawn(move || loop {
        if let Err(e) = stdin.write_all(b"\n").and_then(|_| stdin.flush()) {
            log::debug!("Engine stdin closed: {}", e);
            break;
        }
        thread::sleep(interval);
    })
}
