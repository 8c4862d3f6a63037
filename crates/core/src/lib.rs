// Hostward Core - Domain Logic & Ports
// NO infrastructure dependencies: SSH and SQL live behind the port traits

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use error::{AppError, Result, StateError};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
