//! Fork-engine configuration (§6 "Persistence layout", supplement recovered
//! from `original_source/`'s chain config defaults).

use std::path::PathBuf;

/// Mirrors the teacher crate's builder-pattern `Config`.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub max_fork_height: u64,
    pub confirmation_blocks: u64,
    pub enable_fork_resolution: bool,
    pub data_directory: PathBuf,
    pub auto_save: bool,
    pub backup_enabled: bool,
    pub backup_interval: u64,
    pub max_backups: usize,
    pub integrity_check: bool,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            max_fork_height: 6,
            confirmation_blocks: 6,
            enable_fork_resolution: true,
            data_directory: PathBuf::from("./data/chain"),
            auto_save: true,
            backup_enabled: true,
            backup_interval: 100,
            max_backups: 10,
            integrity_check: true,
        }
    }
}

pub struct ChainConfigBuilder {
    inner: ChainConfig,
}

impl ChainConfigBuilder {
    pub fn new() -> Self {
        Self { inner: ChainConfig::default() }
    }

    pub fn data_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.inner.data_directory = dir.into();
        self
    }

    pub fn confirmation_blocks(mut self, n: u64) -> Self {
        self.inner.confirmation_blocks = n;
        self
    }

    pub fn max_fork_height(mut self, n: u64) -> Self {
        self.inner.max_fork_height = n;
        self
    }

    pub fn finish(self) -> ChainConfig {
        self.inner
    }
}

impl Default for ChainConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
