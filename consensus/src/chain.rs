//! The blockchain fork engine (§4.7): an arena-indexed fork tree with
//! longest-chain resolution, confirmation-depth labeling and disk
//! persistence.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use ezchain_core::block::Block;
use ezchain_crypto::{digest_canonical, Hash};

use crate::config::ChainConfig;
use crate::error::{ChainError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsensusStatus {
    Pending,
    Confirmed,
    Orphaned,
}

/// One node of the fork-tree arena. Edges are stored as indices rather than
/// shared-owned pointers, so reorg is a pair of index-walks rather than
/// pointer surgery (§9 design notes).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ForkNode {
    block: Block,
    parent: Option<usize>,
    children: Vec<usize>,
    height: u64,
    is_main_chain: bool,
    status: ConsensusStatus,
}

#[derive(Debug, Clone, Default)]
pub struct ForkStatistics {
    pub total_nodes: usize,
    pub main_chain_length: usize,
    pub fork_count: usize,
    pub orphaned_count: usize,
    pub confirmed_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct ChainState {
    nodes: Vec<ForkNode>,
    by_hash: HashMap<Hash, usize>,
    main_chain: Vec<usize>,
    tip: Option<usize>,
    /// Accepted blocks since the last backup; reset to 0 whenever
    /// `backup_interval` triggers a new one (§6 "Persistence layout").
    blocks_since_backup: u64,
}

impl ChainState {
    fn path_to_root(&self, mut idx: usize) -> Vec<usize> {
        let mut path = vec![idx];
        while let Some(parent) = self.nodes[idx].parent {
            path.push(parent);
            idx = parent;
        }
        path.reverse();
        path
    }
}

fn validate_block(parent: &ForkNode, block: &Block) -> Result<()> {
    if block.header.index != parent.height + 1 {
        return Err(ChainError::InvalidLink);
    }
    if block.header.pre_hash != parent.block.hash() {
        return Err(ChainError::InvalidLink);
    }
    Ok(())
}

/// Result of inserting one block, distinguishing an ignored duplicate
/// (second genesis, already-known hash) from an accepted insertion so the
/// caller only counts real blocks towards auto-save/backup cadence.
enum InsertOutcome {
    Duplicate,
    Accepted { main_chain_updated: bool },
}

/// The fork-tree blockchain engine. All mutating operations serialize
/// through one re-entrant-in-spirit lock (§5: "a single re-entrant lock
/// guards all mutating operations; readers may obtain consistent snapshots
/// under the same lock").
pub struct Blockchain {
    config: ChainConfig,
    state: Mutex<ChainState>,
}

impl Blockchain {
    pub fn new(config: ChainConfig) -> Self {
        Self {
            config,
            state: Mutex::new(ChainState::default()),
        }
    }

    /// Inserts `block`, returning whether the main chain tip changed.
    /// Accepted blocks count towards `backup_interval`; when that cadence
    /// (or `auto_save` alone) fires, the chain is flushed to disk before
    /// returning (§6, SPEC_FULL.md supplement to §4.7).
    pub fn add_block(&self, block: Block) -> Result<bool> {
        let (main_chain_updated, should_save, should_backup) = {
            let mut state = self.state.lock().expect("chain lock poisoned");
            match self.insert_block(&mut state, block)? {
                InsertOutcome::Duplicate => (false, false, false),
                InsertOutcome::Accepted { main_chain_updated } => {
                    state.blocks_since_backup += 1;
                    let should_backup = self.config.backup_enabled && state.blocks_since_backup >= self.config.backup_interval;
                    if should_backup {
                        state.blocks_since_backup = 0;
                    }
                    (main_chain_updated, self.config.auto_save, should_backup)
                }
            }
        };

        if should_backup {
            if let Err(e) = self.create_backup() {
                warn!(error = %e, "failed to create periodic chain backup");
            }
        } else if should_save {
            if let Err(e) = self.save() {
                warn!(error = %e, "failed to auto-save chain snapshot");
            }
        }

        Ok(main_chain_updated)
    }

    fn insert_block(&self, state: &mut ChainState, block: Block) -> Result<InsertOutcome> {
        let hash = block.hash();
        if state.by_hash.contains_key(&hash) {
            return Ok(InsertOutcome::Duplicate);
        }

        if block.header.index == 0 {
            if !state.nodes.is_empty() {
                return Ok(InsertOutcome::Duplicate);
            }
            let idx = 0;
            state.nodes.push(ForkNode {
                block,
                parent: None,
                children: Vec::new(),
                height: 0,
                is_main_chain: true,
                status: ConsensusStatus::Pending,
            });
            state.by_hash.insert(hash, idx);
            state.main_chain = vec![idx];
            state.tip = Some(idx);
            self.update_consensus_status(state);
            return Ok(InsertOutcome::Accepted { main_chain_updated: true });
        }

        let tip_idx = state.tip.ok_or(ChainError::MissingParent)?;

        if block.header.pre_hash == state.nodes[tip_idx].block.hash() && block.header.index == state.nodes[tip_idx].height + 1 {
            validate_block(&state.nodes[tip_idx], &block)?;
            let idx = state.nodes.len();
            let height = state.nodes[tip_idx].height + 1;
            state.nodes.push(ForkNode {
                block,
                parent: Some(tip_idx),
                children: Vec::new(),
                height,
                is_main_chain: true,
                status: ConsensusStatus::Pending,
            });
            state.by_hash.insert(hash, idx);
            state.nodes[tip_idx].children.push(idx);
            state.main_chain.push(idx);
            state.tip = Some(idx);
            self.update_consensus_status(state);
            return Ok(InsertOutcome::Accepted { main_chain_updated: true });
        }

        let parent_idx = *state.by_hash.get(&block.header.pre_hash).ok_or(ChainError::MissingParent)?;
        validate_block(&state.nodes[parent_idx], &block)?;
        let new_height = state.nodes[parent_idx].height + 1;
        let idx = state.nodes.len();
        state.nodes.push(ForkNode {
            block,
            parent: Some(parent_idx),
            children: Vec::new(),
            height: new_height,
            is_main_chain: false,
            status: ConsensusStatus::Pending,
        });
        state.by_hash.insert(hash, idx);
        state.nodes[parent_idx].children.push(idx);

        let main_chain_updated = if self.config.enable_fork_resolution && new_height > state.nodes[tip_idx].height {
            self.reorg(state, idx);
            true
        } else {
            false
        };
        self.update_consensus_status(state);
        Ok(InsertOutcome::Accepted { main_chain_updated })
    }

    /// Reparents the main chain onto the path root..`new_tip`, flipping
    /// `is_main_chain` along both diverging suffixes.
    fn reorg(&self, state: &mut ChainState, new_tip: usize) {
        let new_path = state.path_to_root(new_tip);
        let old_path = state.main_chain.clone();

        let common = old_path
            .iter()
            .zip(new_path.iter())
            .take_while(|(a, b)| a == b)
            .count();

        for &idx in &old_path[common..] {
            state.nodes[idx].is_main_chain = false;
        }
        for &idx in &new_path[common..] {
            state.nodes[idx].is_main_chain = true;
        }
        info!(
            old_tip_height = state.nodes[*old_path.last().expect("main chain is never empty during a reorg")].height,
            new_tip_height = state.nodes[new_tip].height,
            common_ancestor_depth = common,
            "chain reorg: switching main chain to a longer fork"
        );
        state.main_chain = new_path;
        state.tip = Some(new_tip);
    }

    /// Confirmation threshold matches the worked example in §8 Scenario D
    /// (`confirmation_blocks = 2`, tip at index 5 confirms 0..=3): a node is
    /// CONFIRMED once its height is at or below `tip.height -
    /// confirmation_blocks`.
    fn update_consensus_status(&self, state: &mut ChainState) {
        let tip_idx = match state.tip {
            Some(t) => t,
            None => return,
        };
        let tip_height = state.nodes[tip_idx].height;
        let confirmed_threshold = tip_height.saturating_sub(self.config.confirmation_blocks);

        for &idx in &state.main_chain {
            if state.nodes[idx].status != ConsensusStatus::Confirmed && state.nodes[idx].height <= confirmed_threshold {
                state.nodes[idx].status = ConsensusStatus::Confirmed;
                info!(height = state.nodes[idx].height, "block confirmed");
            }
        }
        for node in state.nodes.iter_mut() {
            if !node.is_main_chain
                && node.status != ConsensusStatus::Orphaned
                && tip_height.saturating_sub(node.height) > self.config.max_fork_height
            {
                node.status = ConsensusStatus::Orphaned;
                warn!(height = node.height, max_fork_height = self.config.max_fork_height, "fork node orphaned");
            }
        }
    }

    pub fn get_block_by_index(&self, index: u64) -> Option<Block> {
        let state = self.state.lock().expect("chain lock poisoned");
        state
            .main_chain
            .iter()
            .map(|&idx| &state.nodes[idx])
            .find(|n| n.height == index)
            .map(|n| n.block.clone())
    }

    pub fn get_block_by_hash(&self, hash: Hash) -> Option<Block> {
        let state = self.state.lock().expect("chain lock poisoned");
        state.by_hash.get(&hash).map(|&idx| state.nodes[idx].block.clone())
    }

    pub fn get_latest_confirmed_index(&self) -> Option<u64> {
        let state = self.state.lock().expect("chain lock poisoned");
        state
            .main_chain
            .iter()
            .map(|&idx| &state.nodes[idx])
            .filter(|n| n.status == ConsensusStatus::Confirmed)
            .map(|n| n.height)
            .max()
    }

    /// Checks that every main-chain block correctly links to its
    /// predecessor (§8: `blocks[i].pre_hash == blocks[i-1].hash`).
    pub fn is_valid_chain(&self) -> bool {
        let state = self.state.lock().expect("chain lock poisoned");
        state.main_chain.windows(2).all(|w| {
            let (prev, next) = (&state.nodes[w[0]], &state.nodes[w[1]]);
            next.block.header.pre_hash == prev.block.hash() && next.height == prev.height + 1
        })
    }

    pub fn get_fork_statistics(&self) -> ForkStatistics {
        let state = self.state.lock().expect("chain lock poisoned");
        ForkStatistics {
            total_nodes: state.nodes.len(),
            main_chain_length: state.main_chain.len(),
            fork_count: state.nodes.iter().filter(|n| !n.is_main_chain).count(),
            orphaned_count: state.nodes.iter().filter(|n| n.status == ConsensusStatus::Orphaned).count(),
            confirmed_count: state.nodes.iter().filter(|n| n.status == ConsensusStatus::Confirmed).count(),
        }
    }

    fn snapshot_path(&self) -> PathBuf {
        self.config.data_directory.join("chain.snapshot")
    }

    fn checksum_path(&self) -> PathBuf {
        self.config.data_directory.join("chain.checksum")
    }

    fn backups_dir(&self) -> PathBuf {
        self.config.data_directory.join("backups")
    }

    /// Persists the chain state as a snapshot file plus a sibling checksum
    /// file (§6 "a main snapshot file, a metadata file with a checksum").
    pub fn save(&self) -> Result<()> {
        let state = self.state.lock().expect("chain lock poisoned");
        std::fs::create_dir_all(&self.config.data_directory)?;
        let encoded = bincode::serialize(&*state).map_err(|e| ChainError::CorruptRecord(e.to_string()))?;
        let checksum = digest_canonical(&encoded);
        std::fs::write(self.snapshot_path(), &encoded)?;
        std::fs::write(self.checksum_path(), hex::encode(checksum))?;
        Ok(())
    }

    /// Loads and revalidates a previously-saved chain. On any failure
    /// (missing files, checksum mismatch, corrupt encoding) the caller gets
    /// a typed error rather than a silently-empty chain (§6 "on any failure
    /// the chain falls back to a fresh genesis-less state and the caller
    /// decides recovery").
    pub fn load(config: ChainConfig) -> Result<Self> {
        let snapshot_path = config.data_directory.join("chain.snapshot");
        let checksum_path = config.data_directory.join("chain.checksum");

        let encoded = std::fs::read(&snapshot_path)?;
        if config.integrity_check {
            let stored_hex = std::fs::read_to_string(&checksum_path)?;
            let stored: Hash = ezchain_crypto::hex_decode(stored_hex.trim()).map_err(|_| ChainError::IntegrityChecksumMismatch)?;
            let computed = digest_canonical(&encoded);
            if stored != computed {
                return Err(ChainError::IntegrityChecksumMismatch);
            }
        }
        let state: ChainState = bincode::deserialize(&encoded).map_err(|e| ChainError::CorruptRecord(e.to_string()))?;
        let chain = Self {
            config,
            state: Mutex::new(state),
        };
        if !chain.is_valid_chain() {
            return Err(ChainError::CorruptRecord("loaded chain failed link validation".to_string()));
        }
        Ok(chain)
    }

    /// Copies the current snapshot into `backups/<iso8601>/`, then prunes
    /// old backups beyond `max_backups`.
    pub fn create_backup(&self) -> Result<PathBuf> {
        self.save()?;
        let stamp = chrono::DateTime::from_timestamp(self.wall_clock_unix(), 0)
            .unwrap_or_default()
            .to_rfc3339();
        let backup_dir = self.backups_dir().join(&stamp);
        std::fs::create_dir_all(&backup_dir)?;
        std::fs::copy(self.snapshot_path(), backup_dir.join("chain.snapshot"))?;
        std::fs::copy(self.checksum_path(), backup_dir.join("chain.checksum"))?;
        self.cleanup_old_backups()?;
        info!(path = %backup_dir.display(), "chain backup created");
        Ok(backup_dir)
    }

    /// Wall-clock seconds, isolated behind a method so tests can override it
    /// by constructing backup directory names directly when determinism
    /// matters.
    fn wall_clock_unix(&self) -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    pub fn cleanup_old_backups(&self) -> Result<()> {
        let dir = self.backups_dir();
        if !dir.exists() {
            return Ok(());
        }
        let mut entries: Vec<_> = std::fs::read_dir(&dir)?.filter_map(|e| e.ok()).collect();
        entries.sort_by_key(|e| e.file_name());
        while entries.len() > self.config.max_backups {
            let oldest = entries.remove(0);
            std::fs::remove_dir_all(oldest.path()).ok();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ezchain_crypto::ZERO_HASH;

    fn genesis() -> Block {
        Block::new(0, ZERO_HASH, ZERO_HASH, "genesis_miner".to_string(), 0)
    }

    fn child(parent: &Block, miner: &str) -> Block {
        Block::new(parent.header.index + 1, parent.hash(), ZERO_HASH, miner.to_string(), parent.header.timestamp + 1)
    }

    fn no_auto_persistence() -> ChainConfig {
        ChainConfig { auto_save: false, backup_enabled: false, ..ChainConfig::default() }
    }

    #[test]
    fn second_genesis_is_ignored() {
        let chain = Blockchain::new(no_auto_persistence());
        assert!(chain.add_block(genesis()).unwrap());
        assert!(!chain.add_block(genesis()).unwrap());
        assert_eq!(chain.get_fork_statistics().main_chain_length, 1);
    }

    #[test]
    fn fork_at_equal_height_does_not_move_tip() {
        let chain = Blockchain::new(no_auto_persistence());
        let g = genesis();
        chain.add_block(g.clone()).unwrap();
        let a1 = child(&g, "a");
        chain.add_block(a1.clone()).unwrap();

        let b1 = child(&g, "b");
        let updated = chain.add_block(b1).unwrap();
        assert!(!updated);
        assert_eq!(chain.get_block_by_index(1).unwrap().header.miner, "a");
    }

    #[test]
    fn longer_fork_triggers_reorg() {
        let chain = Blockchain::new(no_auto_persistence());
        let g = genesis();
        chain.add_block(g.clone()).unwrap();

        let a1 = child(&g, "A");
        let a2 = child(&a1, "B");
        chain.add_block(a1.clone()).unwrap();
        chain.add_block(a2.clone()).unwrap();

        let d1 = child(&g, "D");
        let e2 = child(&d1, "E");
        let f3 = child(&e2, "F");
        chain.add_block(d1).unwrap();
        chain.add_block(e2).unwrap();
        let updated = chain.add_block(f3).unwrap();

        assert!(updated);
        assert_eq!(chain.get_block_by_index(1).unwrap().header.miner, "D");
        assert_eq!(chain.get_block_by_index(2).unwrap().header.miner, "E");
        assert_eq!(chain.get_block_by_index(3).unwrap().header.miner, "F");

        let stats = chain.get_fork_statistics();
        assert_eq!(stats.fork_count, 2); // original A, B are now off the main chain
    }

    #[test]
    fn confirmation_promotes_matching_scenario_d() {
        let config = ChainConfig { confirmation_blocks: 2, ..no_auto_persistence() };
        let chain = Blockchain::new(config);
        let mut prev = genesis();
        chain.add_block(prev.clone()).unwrap();
        for i in 1..=5 {
            let next = child(&prev, &format!("miner-{i}"));
            chain.add_block(next.clone()).unwrap();
            prev = next;
        }
        assert_eq!(chain.get_latest_confirmed_index(), Some(3));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let config = ChainConfig { data_directory: dir.path().to_path_buf(), ..no_auto_persistence() };
        let chain = Blockchain::new(config.clone());
        let g = genesis();
        chain.add_block(g.clone()).unwrap();
        chain.add_block(child(&g, "a")).unwrap();
        chain.save().unwrap();

        let reloaded = Blockchain::load(config).unwrap();
        assert!(reloaded.is_valid_chain());
        assert_eq!(reloaded.get_fork_statistics().main_chain_length, 2);
    }

    #[test]
    fn backup_interval_triggers_automatic_backup() {
        let dir = tempfile::tempdir().unwrap();
        let config = ChainConfig {
            data_directory: dir.path().to_path_buf(),
            auto_save: false,
            backup_enabled: true,
            backup_interval: 2,
            ..ChainConfig::default()
        };
        let chain = Blockchain::new(config);
        let g = genesis();
        chain.add_block(g.clone()).unwrap();
        assert!(!dir.path().join("backups").exists());
        chain.add_block(child(&g, "a")).unwrap();
        assert!(dir.path().join("backups").exists());
        let backups: Vec<_> = std::fs::read_dir(dir.path().join("backups")).unwrap().collect();
        assert_eq!(backups.len(), 1);
    }

    #[test]
    fn auto_save_without_backup_writes_snapshot_every_block() {
        let dir = tempfile::tempdir().unwrap();
        let config = ChainConfig { data_directory: dir.path().to_path_buf(), auto_save: true, backup_enabled: false, ..ChainConfig::default() };
        let chain = Blockchain::new(config);
        chain.add_block(genesis()).unwrap();
        assert!(dir.path().join("chain.snapshot").exists());
        assert!(!dir.path().join("backups").exists());
    }
}
