//! Pool-specific error types (§4.5, §7 "Admission").

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error(transparent)]
    Core(#[from] ezchain_core::error::CoreError),

    #[error("no entry found for the given key")]
    NotFound,

    #[error("pool persistence I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = core::result::Result<T, PoolError>;
