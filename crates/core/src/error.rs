// Central Error Type for the Application

use thiserror::Error;

/// Filesystem preconditions checked before a home directory is moved
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("backup source does not exist: {0}")]
    BackupDirNotExists(String),

    #[error("backup target is already occupied: {0}")]
    BackupTargetDirAlreadyExists(String),
}

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state: {0}")]
    State(#[from] StateError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Known, expected conditions are stable; everything else is a fault
    /// worth logging loudly.
    pub fn is_stable(&self) -> bool {
        matches!(
            self,
            AppError::Connection(_)
                | AppError::Validation(_)
                | AppError::Conflict(_)
                | AppError::State(_)
                | AppError::NotFound(_)
        )
    }

    /// Prefix the message with where the error happened, keeping its kind.
    ///
    /// `Io` and `Serialization` carry foreign sources and are folded into
    /// `Internal` so the context is not lost.
    pub fn context(self, ctx: impl std::fmt::Display) -> Self {
        match self {
            AppError::Connection(msg) => AppError::Connection(format!("{}: {}", ctx, msg)),
            AppError::Validation(msg) => AppError::Validation(format!("{}: {}", ctx, msg)),
            AppError::Conflict(msg) => AppError::Conflict(format!("{}: {}", ctx, msg)),
            AppError::State(StateError::BackupDirNotExists(msg)) => {
                AppError::State(StateError::BackupDirNotExists(format!("{}: {}", ctx, msg)))
            }
            AppError::State(StateError::BackupTargetDirAlreadyExists(msg)) => AppError::State(
                StateError::BackupTargetDirAlreadyExists(format!("{}: {}", ctx, msg)),
            ),
            AppError::NotFound(msg) => AppError::NotFound(format!("{}: {}", ctx, msg)),
            AppError::Database(msg) => AppError::Database(format!("{}: {}", ctx, msg)),
            AppError::Config(msg) => AppError::Config(format!("{}: {}", ctx, msg)),
            AppError::Io(e) => AppError::Internal(format!("{}: {}", ctx, e)),
            AppError::Serialization(e) => AppError::Internal(format!("{}: {}", ctx, e)),
            AppError::Internal(msg) => AppError::Internal(format!("{}: {}", ctx, msg)),
        }
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
