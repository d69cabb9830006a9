//! Errors surfaced by the router (§6).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetError {
    #[error("no handler registered for message type {0:?}")]
    NoHandler(crate::message::MessageType),

    #[error("message {0} already observed in the dedup window")]
    Duplicate(String),

    #[error("message envelope failed canonical-encoding round trip")]
    MalformedEnvelope,
}

pub type Result<T> = core::result::Result<T, NetError>;
