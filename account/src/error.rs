//! Errors surfaced by the account VPB manager (§4.4, §7 "Ledger").

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("batch transaction request list was empty")]
    EmptyRequest,

    #[error(transparent)]
    Core(#[from] ezchain_core::error::CoreError),

    #[error("account integrity check failed: {0}")]
    IntegrityViolation(String),
}

pub type Result<T> = core::result::Result<T, AccountError>;
