use std::path::PathBuf;

use lance_types::LedgerMode;
use thiserror::Error;

use crate::config::EnvironmentKey;

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("unknown environment: {0}")]
    UnknownEnvironment(String),

    #[error("invalid environment config {path}: {message}")]
    InvalidConfig { path: PathBuf, message: String },

    #[error("environment {key} expects mode {expected}, config declares {found}")]
    ModeMismatch {
        key: EnvironmentKey,
        expected: LedgerMode,
        found: LedgerMode,
    },

    #[error("invalid settings: {0}")]
    Settings(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type EnvResult<T> = Result<T, EnvError>;
