//! Consensus view: a (height, round) pair.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A consensus view. `sequence` is the block height being agreed on,
/// `round` the retry counter within that height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct View {
    pub sequence: u64,
    pub round: u64,
}

impl View {
    pub fn new(sequence: u64, round: u64) -> Self {
        Self { sequence, round }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "View({}, {})", self.sequence, self.round)
    }
}
