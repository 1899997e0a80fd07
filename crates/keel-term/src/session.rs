//! One PTY-backed shell process and its bookkeeping.
//!
//! A [`PtySession`] owns the master side of the PTY pair exclusively: the
//! writer for input, the killer for teardown, and the master handle for
//! resize. Output is read on a dedicated background thread that pushes
//! [`SessionEvent`]s into the registrant's channel; the same thread waits
//! for the child after EOF, so per-session ordering and the single-`Exit`
//! guarantee hold by construction.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, MasterPty, PtySize};
use std::io::{Read, Write};

use crate::event::{EventSender, SessionEvent};

/// Read buffer size for the PTY reader thread (8 KB).
const PTY_READ_CHUNK: usize = 8_192;

// =============================================================================
// ERROR
// =============================================================================

/// Errors originating from PTY operations.
#[derive(Debug, thiserror::Error)]
pub enum TermError {
    #[error("failed to spawn process: {0}")]
    Spawn(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to resize pty: {0}")]
    Resize(String),
}

// =============================================================================
// SPAWN SPEC
// =============================================================================

/// Fully resolved parameters for one spawn. Built by the manager from a
/// create request after shell/cwd/dimension defaults are applied.
pub(crate) struct SpawnSpec {
    pub shell: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub cols: u16,
    pub rows: u16,
    pub env: Vec<(String, String)>,
}

// =============================================================================
// SESSION
// =============================================================================

/// A live shell process inside a PTY.
pub struct PtySession {
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    killer: Box<dyn ChildKiller + Send + Sync>,
    shell: String,
    cwd: PathBuf,
    cols: u16,
    rows: u16,
    /// Set before the kill signal so the reader thread stops emitting
    /// events into a half-torn-down session.
    detached: Arc<AtomicBool>,
}

impl PtySession {
    /// Spawn the shell and start the reader thread.
    ///
    /// `id` tags every event the session emits on `events`.
    pub(crate) fn spawn(id: u64, spec: SpawnSpec, events: EventSender) -> Result<Self, TermError> {
        let pty_system = native_pty_system();

        let pair = pty_system
            .openpty(PtySize {
                rows: spec.rows,
                cols: spec.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| TermError::Spawn(e.to_string()))?;

        let mut cmd = CommandBuilder::new(&spec.shell);
        cmd.args(&spec.args);
        cmd.cwd(&spec.cwd);
        cmd.env("TERM", "xterm-256color");
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        let mut child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| TermError::Spawn(format!("{}: {e}", spec.shell)))?;

        // Drop the slave side; only the master is needed from here on.
        drop(pair.slave);

        let killer = child.clone_killer();

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| TermError::Spawn(e.to_string()))?;

        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| TermError::Spawn(e.to_string()))?;

        let detached = Arc::new(AtomicBool::new(false));
        let thread_detached = Arc::clone(&detached);

        std::thread::Builder::new()
            .name(format!("pty-reader-{id}"))
            .spawn(move || {
                let mut buf = [0u8; PTY_READ_CHUNK];
                loop {
                    match reader.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => {
                            if thread_detached.load(Ordering::Acquire) {
                                // Teardown in progress: keep draining so the
                                // child can exit, emit nothing.
                                continue;
                            }
                            let chunk = buf[..n].to_vec();
                            if events.send(SessionEvent::Data { id, chunk }).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::debug!(id, error = %e, "pty reader error");
                            break;
                        }
                    }
                }

                // EOF: reap the child and report the exit, unless the
                // session was explicitly killed.
                let code = match child.wait() {
                    Ok(status) => status.exit_code(),
                    Err(e) => {
                        tracing::debug!(id, error = %e, "pty wait error");
                        0
                    }
                };
                if !thread_detached.load(Ordering::Acquire) {
                    let _ = events.send(SessionEvent::Exit { id, code });
                }
            })
            .map_err(|e| TermError::Spawn(e.to_string()))?;

        Ok(Self {
            master: pair.master,
            writer,
            killer,
            shell: spec.shell,
            cwd: spec.cwd,
            cols: spec.cols,
            rows: spec.rows,
            detached,
        })
    }

    /// Write raw input bytes into the PTY.
    ///
    /// Broken-pipe errors from a process that is mid-teardown are
    /// suppressed; everything else propagates.
    pub fn write(&mut self, data: &[u8]) -> Result<(), TermError> {
        let result = self
            .writer
            .write_all(data)
            .and_then(|()| self.writer.flush());
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                tracing::debug!(shell = %self.shell, "pty write during teardown suppressed: {e}");
                Ok(())
            }
            Err(e) => Err(TermError::Io(e)),
        }
    }

    /// Resize the PTY. Dimensions are updated only when the kernel accepted
    /// the new size.
    pub fn resize(&mut self, cols: u16, rows: u16) -> Result<(), TermError> {
        self.master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| TermError::Resize(e.to_string()))?;
        self.cols = cols;
        self.rows = rows;
        Ok(())
    }

    /// Detach event delivery, then signal the child. The reader thread
    /// drains remaining output silently and no `exit` event is emitted.
    pub fn kill(&mut self) {
        self.detach();
        if let Err(e) = self.killer.kill() {
            tracing::debug!(shell = %self.shell, "pty kill error (may already be dead): {e}");
        }
    }

    /// Stop event delivery without signalling the child.
    pub fn detach(&mut self) {
        self.detached.store(true, Ordering::Release);
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }

    pub fn cwd(&self) -> &PathBuf {
        &self.cwd
    }

    pub fn dims(&self) -> (u16, u16) {
        (self.cols, self.rows)
    }
}

impl Drop for PtySession {
    fn drop(&mut self) {
        // Closing the master fd alone is not always enough for the child to
        // exit promptly; signal it so the reader thread winds down. The
        // process may already be gone.
        let _ = self.killer.kill();
    }
}

// =============================================================================
// TESTS
// =============================================================================
