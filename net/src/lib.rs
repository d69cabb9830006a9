//! The wire protocol and per-node router (§6). Real P2P transport is out of
//! scope; this crate models the message shapes and the router contract that
//! a transport layer plugs into.

pub mod error;
pub mod message;
pub mod router;

pub use error::{NetError, Result};
pub use message::{
    AcctxnSubmitPayload, BlockCommittedPayload, CreateAndSubmitPayload, Envelope, GenesisVpbInitPayload, MessageType, Payload,
    ProofToSenderPayload, TransferRequestPayload, VpbTransferPayload,
};
pub use router::{Handler, Router, DEFAULT_DEDUP_CAPACITY};
