//! Admission counters (§4.5 "Stats counters").

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub total_received: u64,
    pub valid_received: u64,
    pub invalid_received: u64,
    pub duplicates: u64,
}
