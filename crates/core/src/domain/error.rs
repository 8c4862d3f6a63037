// Domain Error Types

use crate::error::AppError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Unknown OS type: {0}")]
    UnknownOsType(String),

    #[error("Invalid account password: {0}")]
    InvalidSecret(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;

// Every domain rule violation is caller input the caller can fix.
impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        AppError::Validation(err.to_string())
    }
}
