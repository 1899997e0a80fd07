pub mod errors;
pub mod table;

pub use errors::{ConfigError, KeelError};
pub use table::SessionTable;

pub type Result<T> = std::result::Result<T, KeelError>;
