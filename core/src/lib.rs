//! EZchain core data model: values, transactions, proofs, blocks and the
//! genesis builder shared by every other crate in the workspace.

pub mod block;
pub mod config;
pub mod error;
pub mod genesis;
pub mod proof;
pub mod tx;
pub mod value;

pub use block::{Block, BlockHeader};
pub use config::{GenesisConfig, GenesisConfigBuilder, PROTOCOL_VERSION};
pub use error::{CoreError, Result};
pub use genesis::{build_genesis, AccountGenesisShare, GenesisOutput};
pub use proof::{BlockIndexList, HeightOwner, ProofMap, ProofUnit};
pub use tx::{MultiTransactions, SubmitTxInfo, Transaction};
pub use value::{AccountValueCollection, Value, ValueSelectionStrategy, ValueState};
