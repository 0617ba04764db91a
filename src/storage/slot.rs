//! Slot records for the code pool

use serde::{Deserialize, Serialize};
use std::fmt;

/// A code is the natural key of a slot: an integer in `0..total`
pub type Code = u32;

/// Number of slots in a four-digit pool (0000-9999)
pub const DEFAULT_POOL_SIZE: u32 = 10_000;

/// A slot in the code pool
///
/// This is also the unit persisted by the journal: replaying every
/// recorded slot in order (last write wins) rebuilds the pool table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slot {
    /// Slot key
    pub code: Code,
    /// Whether this code has been handed out
    pub issued: bool,
}

impl Slot {
    /// Create a slot that is free to be claimed
    pub fn available(code: Code) -> Self {
        Self {
            code,
            issued: false,
        }
    }

    /// Create a slot that has already been handed out
    pub fn issued(code: Code) -> Self {
        Self { code, issued: true }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.issued { "issued" } else { "available" };
        write!(f, "Slot({:04}, {})", self.code, state)
    }
}
