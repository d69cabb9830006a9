//! Block assembly and the fork-tree blockchain engine (§4.6, §4.7).

pub mod chain;
pub mod config;
pub mod error;
pub mod picker;

pub use chain::{Blockchain, ConsensusStatus, ForkStatistics};
pub use config::{ChainConfig, ChainConfigBuilder};
pub use error::{ChainError, Result};
pub use picker::{create_block, pick, pick_with_proofs, PackagedBlockData, PickStrategy, ProofEntry, MAX_SUBMISSIONS_PER_BLOCK};
