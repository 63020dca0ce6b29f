//! Chain positions used for event ordering and the poll cursor

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a log in the ledger.
///
/// Ordering is by block number first and log index within the block
/// second, which is the order the registry emitted the events in.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ChainPosition {
    /// Block height
    pub block: u64,

    /// Index of the log within the block
    pub log_index: u32,
}

impl ChainPosition {
    /// Position before any log
    pub const ZERO: ChainPosition = ChainPosition {
        block: 0,
        log_index: 0,
    };

    pub fn new(block: u64, log_index: u32) -> Self {
        Self { block, log_index }
    }
}

impl fmt::Display for ChainPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block, self.log_index)
    }
}
