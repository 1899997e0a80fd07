//! The PTY session manager: registry plus lifecycle operations.
//!
//! The manager is the sole owner of every process handle. Clients address
//! sessions by id only; operations on ids that are no longer live are
//! benign no-ops, because the client's view of live sessions may lag
//! behind a process that already exited.

use std::path::PathBuf;

use keel_common::SessionTable;

use crate::event::EventSender;
use crate::session::{PtySession, SpawnSpec, TermError};
use crate::shell::{default_shell, shell_args};

/// Default terminal columns.
pub const DEFAULT_COLS: u16 = 80;

/// Default terminal rows.
pub const DEFAULT_ROWS: u16 = 30;

// =============================================================================
// CREATE OPTIONS
// =============================================================================

/// Options for one create request. Everything is optional; the manager
/// fills in platform defaults.
#[derive(Debug, Clone, Default)]
pub struct CreateSessionOptions {
    /// Shell binary. `None` or empty selects the platform default.
    pub shell: Option<String>,
    /// Working directory. Invalid or missing directories fall back to home.
    pub cwd: Option<PathBuf>,
    pub cols: Option<u16>,
    pub rows: Option<u16>,
    /// Spawn arguments. `None` selects the shell's login-session flags.
    pub args: Option<Vec<String>>,
    /// Extra environment variables layered over the inherited environment.
    pub env: Vec<(String, String)>,
}

// =============================================================================
// MANAGER
// =============================================================================

/// Owns all live PTY sessions, keyed by monotonically increasing ids.
pub struct SessionManager {
    sessions: SessionTable<PtySession>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: SessionTable::new(),
        }
    }

    /// Spawn a shell and register the session.
    ///
    /// Never fails because of a bad working directory, which falls back to
    /// the home directory with a warning. OS-level spawn failures propagate
    /// to the caller.
    pub fn create_session(
        &mut self,
        opts: CreateSessionOptions,
        events: EventSender,
    ) -> Result<u64, TermError> {
        let shell = opts
            .shell
            .filter(|s| !s.is_empty())
            .unwrap_or_else(default_shell);
        let args = opts.args.unwrap_or_else(|| shell_args(&shell));
        let cwd = resolve_cwd(opts.cwd);
        let cols = opts.cols.filter(|c| *c > 0).unwrap_or(DEFAULT_COLS);
        let rows = opts.rows.filter(|r| *r > 0).unwrap_or(DEFAULT_ROWS);

        let id = self.sessions.allocate_id();
        let session = PtySession::spawn(
            id,
            SpawnSpec {
                shell: shell.clone(),
                args,
                cwd: cwd.clone(),
                cols,
                rows,
                env: opts.env,
            },
            events,
        )?;
        self.sessions.insert_at(id, session);

        tracing::info!(id, shell = %shell, cwd = %cwd.display(), cols, rows, "session created");
        Ok(id)
    }

    /// Forward input to a session. No-op for unknown ids; write failures
    /// against a dying process are logged and swallowed.
    pub fn write(&mut self, id: u64, data: &[u8]) {
        let Some(session) = self.sessions.get_mut(id) else {
            tracing::debug!(id, "write to unknown session ignored");
            return;
        };
        if let Err(e) = session.write(data) {
            tracing::debug!(id, error = %e, "session write failed");
        }
    }

    /// Resize a session. Non-positive dimensions are ignored and the last
    /// valid dimensions are retained. No-op for unknown ids.
    pub fn resize(&mut self, id: u64, cols: u16, rows: u16) {
        if cols == 0 || rows == 0 {
            tracing::debug!(id, cols, rows, "non-positive resize ignored");
            return;
        }
        let Some(session) = self.sessions.get_mut(id) else {
            tracing::debug!(id, "resize of unknown session ignored");
            return;
        };
        if let Err(e) = session.resize(cols, rows) {
            tracing::debug!(id, error = %e, "session resize failed");
        }
    }

    /// Kill a session and remove it from the registry. Idempotent: unknown
    /// or already-removed ids are no-ops. Event delivery is detached before
    /// the kill signal, so no `exit` event fires during teardown.
    pub fn kill(&mut self, id: u64) {
        if let Some(mut session) = self.sessions.remove(id) {
            session.kill();
            tracing::info!(id, "session killed");
        }
    }

    /// Kill every live session. Used during application shutdown.
    pub fn kill_all(&mut self) {
        let entries = self.sessions.drain();
        let count = entries.len();
        for (_, mut session) in entries {
            session.kill();
        }
        tracing::info!(count, "all sessions killed");
    }

    /// Deregister a session after its natural exit. The process is already
    /// gone; this just releases the handles. No-op for unknown ids.
    pub fn remove_exited(&mut self, id: u64) {
        if self.sessions.remove(id).is_some() {
            tracing::debug!(id, "exited session removed");
        }
    }

    /// Ids of all currently-live sessions.
    pub fn session_ids(&self) -> Vec<u64> {
        self.sessions.ids()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.sessions.contains(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Effective working directory of a live session.
    pub fn session_cwd(&self, id: u64) -> Option<PathBuf> {
        self.sessions.get(id).map(|s| s.cwd().clone())
    }

    /// Current dimensions of a live session.
    pub fn session_dims(&self, id: u64) -> Option<(u16, u16)> {
        self.sessions.get(id).map(|s| s.dims())
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate a requested working directory, substituting home when it is
/// missing or not a directory.
fn resolve_cwd(requested: Option<PathBuf>) -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/"));
    match requested {
        Some(dir) if dir.is_dir() => dir,
        Some(dir) => {
            tracing::warn!(
                requested = %dir.display(),
                "invalid working directory, falling back to home"
            );
            home
        }
        None => home,
    }
}

// =============================================================================
// TESTS
// =============================================================================
