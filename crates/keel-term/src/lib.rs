pub mod event;
pub mod manager;
pub mod session;
pub mod shell;

pub use event::SessionEvent;
pub use manager::{CreateSessionOptions, SessionManager};
pub use session::TermError;
pub use shell::{available_shells, default_shell, ShellInfo};
