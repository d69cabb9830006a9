//! Genesis and protocol configuration for **ezchain-core**.
//!
//! Mirrors the teacher crate's builder-pattern `Config`: a plain `pub`
//! struct with a `Default` impl for the common case, and a fluent builder
//! for callers who need to override specific fields.
//!
//! ```
//! use ezchain_core::config::GenesisConfig;
//!
//! let cfg = GenesisConfig::default();
//! assert_eq!(cfg.denomination_config[0], (100, 20));
//! ```

use serde::{Deserialize, Serialize};

/// The protocol version every `SubmitTxInfo` must declare. A single
/// supported version is assumed; there is no negotiation (§ supplement to
/// 4.3).
pub const PROTOCOL_VERSION: &str = "1.0.0";

/// Denomination schedule plus genesis metadata.
///
/// `denomination_config` is a list of `(amount, count)` pairs: each account
/// receives `count` distinct `Value`s of size `amount`. The reference
/// implementation's default schedule totals 2,050 units per account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenesisConfig {
    pub denomination_config: Vec<(u64, u32)>,
    pub miner: String,
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            denomination_config: vec![(100, 20), (50, 20), (20, 20), (10, 20), (5, 20), (1, 20)],
            miner: "genesis_miner".to_string(),
        }
    }
}

impl GenesisConfig {
    /// Total units distributed to a single account under this schedule.
    pub fn total_per_account(&self) -> u64 {
        self.denomination_config
            .iter()
            .map(|(amount, count)| amount * (*count as u64))
            .sum()
    }
}

/// Fluent builder for [`GenesisConfig`].
pub struct GenesisConfigBuilder {
    inner: GenesisConfig,
}

impl GenesisConfigBuilder {
    pub fn new() -> Self {
        Self {
            inner: GenesisConfig::default(),
        }
    }

    pub fn denomination_config(mut self, schedule: Vec<(u64, u32)>) -> Self {
        self.inner.denomination_config = schedule;
        self
    }

    pub fn miner<S: Into<String>>(mut self, miner: S) -> Self {
        self.inner.miner = miner.into();
        self
    }

    pub fn finish(self) -> GenesisConfig {
        self.inner
    }
}

impl Default for GenesisConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule_totals_2050_per_account() {
        assert_eq!(GenesisConfig::default().total_per_account(), 2050);
    }

    #[test]
    fn builder_overrides_schedule() {
        let cfg = GenesisConfigBuilder::new()
            .denomination_config(vec![(10, 5)])
            .miner("test-miner")
            .finish();
        assert_eq!(cfg.total_per_account(), 50);
        assert_eq!(cfg.miner, "test-miner");
    }
}
