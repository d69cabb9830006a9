//! The wire message enum and envelope (§6 "External Interfaces").

use serde::{Deserialize, Serialize};

use ezchain_core::block::BlockHeader;
use ezchain_core::proof::{BlockIndexList, ProofUnit};
use ezchain_core::tx::SubmitTxInfo;
use ezchain_core::value::Value;
use ezchain_crypto::keys::Address;
use ezchain_crypto::{digest_canonical, Hash};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    GenesisVpbInit,
    NewBlock,
    BlockCommitted,
    ProofToSender,
    AcctxnSubmit,
    VpbTransfer,
    CreateAndSubmit,
}

/// `consensus -> account`: the genesis block header plus the recipient's
/// opening VPB share.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisVpbInitPayload {
    pub genesis_header: BlockHeader,
    pub values: Vec<Value>,
    pub proof_units: Vec<ProofUnit>,
    pub block_index: BlockIndexList,
}

/// `miner -> all`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBlockPayload {
    pub header: BlockHeader,
}

/// `miner -> all consensus`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockCommittedPayload {
    pub block_index: u64,
    pub merkle_root: Hash,
}

/// `consensus -> account`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofToSenderPayload {
    pub block_index: u64,
    pub merkle_root: Hash,
    pub multi_transactions_hash: Hash,
    pub mt_proof: Vec<Hash>,
    pub leaf_index: u64,
    pub leaf_count: u64,
}

/// `account -> consensus`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcctxnSubmitPayload {
    pub submit_tx_info: SubmitTxInfo,
}

/// `account -> account`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VpbTransferPayload {
    pub recipient: Address,
    pub sender: Address,
    pub value: Value,
    pub proof_units: Vec<ProofUnit>,
    pub block_index: BlockIndexList,
}

/// One requested transfer inside a `CREATE_AND_SUBMIT` batch; `reference` is
/// an opaque caller-supplied correlation id, not interpreted by the account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequestPayload {
    pub recipient: Address,
    pub amount: u64,
    pub reference: Option<String>,
}

/// `control -> account`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAndSubmitPayload {
    pub requests: Vec<TransferRequestPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Payload {
    GenesisVpbInit(GenesisVpbInitPayload),
    NewBlock(NewBlockPayload),
    BlockCommitted(BlockCommittedPayload),
    ProofToSender(ProofToSenderPayload),
    AcctxnSubmit(AcctxnSubmitPayload),
    VpbTransfer(VpbTransferPayload),
    CreateAndSubmit(CreateAndSubmitPayload),
}

impl Payload {
    pub fn message_type(&self) -> MessageType {
        match self {
            Payload::GenesisVpbInit(_) => MessageType::GenesisVpbInit,
            Payload::NewBlock(_) => MessageType::NewBlock,
            Payload::BlockCommitted(_) => MessageType::BlockCommitted,
            Payload::ProofToSender(_) => MessageType::ProofToSender,
            Payload::AcctxnSubmit(_) => MessageType::AcctxnSubmit,
            Payload::VpbTransfer(_) => MessageType::VpbTransfer,
            Payload::CreateAndSubmit(_) => MessageType::CreateAndSubmit,
        }
    }
}

/// The full wire envelope (§6): `{type, payload, network_id,
/// protocol_version, from_node_id, to_node_id?, message_id, timestamp}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub message_type: MessageType,
    pub payload: Payload,
    pub network_id: String,
    pub protocol_version: String,
    pub from_node_id: String,
    pub to_node_id: Option<String>,
    pub message_id: Hash,
    pub timestamp: i64,
}

impl Envelope {
    /// Builds an envelope and derives its `message_id` as `H(from_node_id ||
    /// type || canonical_payload || timestamp)` per §6.
    pub fn new(
        payload: Payload,
        network_id: String,
        protocol_version: String,
        from_node_id: String,
        to_node_id: Option<String>,
        timestamp: i64,
    ) -> Self {
        let message_type = payload.message_type();
        let message_id = Self::derive_message_id(&from_node_id, message_type, &payload, timestamp);
        Self {
            message_type,
            payload,
            network_id,
            protocol_version,
            from_node_id,
            to_node_id,
            message_id,
            timestamp,
        }
    }

    fn derive_message_id(from_node_id: &str, message_type: MessageType, payload: &Payload, timestamp: i64) -> Hash {
        #[derive(Serialize)]
        struct Components<'a> {
            from_node_id: &'a str,
            message_type: MessageType,
            payload: &'a Payload,
            timestamp: i64,
        }
        digest_canonical(&Components { from_node_id, message_type, payload, timestamp })
    }
}
