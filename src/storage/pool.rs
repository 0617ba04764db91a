//! In-memory slot table
//!
//! Tracks the issued flag of every slot plus a dense list of the codes
//! that are still available, so a uniformly random pick is O(1).

use super::slot::{Code, Slot};
use rand::Rng;

/// Marker for slots that are not in the available list
const NOT_AVAILABLE: usize = usize::MAX;

#[derive(Debug, Clone)]
pub struct SlotTable {
    /// Issued flag indexed by code
    issued: Vec<bool>,
    /// Codes currently available, in no particular order
    available: Vec<Code>,
    /// Index of each code inside `available`, or `NOT_AVAILABLE`
    positions: Vec<usize>,
}

impl SlotTable {
    /// Create a table of `total` slots, all available
    pub fn new(total: u32) -> Self {
        Self::from_states(vec![false; total as usize])
    }

    /// Build a table from the issued flag of every code in `0..states.len()`
    pub fn from_states(states: Vec<bool>) -> Self {
        let mut available = Vec::with_capacity(states.len());
        let mut positions = vec![NOT_AVAILABLE; states.len()];

        for (code, &issued) in states.iter().enumerate() {
            if !issued {
                positions[code] = available.len();
                available.push(code as Code);
            }
        }

        Self {
            issued: states,
            available,
            positions,
        }
    }

    /// Number of slots in the table
    pub fn total(&self) -> u32 {
        self.issued.len() as u32
    }

    pub fn available_count(&self) -> usize {
        self.available.len()
    }

    pub fn issued_count(&self) -> usize {
        self.issued.len() - self.available.len()
    }

    /// Issued flag of a code, `None` if the code is outside the table
    pub fn is_issued(&self, code: Code) -> Option<bool> {
        self.issued.get(code as usize).copied()
    }

    /// Pick an available code uniformly at random without claiming it
    pub fn pick_random<R: Rng>(&self, rng: &mut R) -> Option<Code> {
        if self.available.is_empty() {
            return None;
        }
        let index = rng.gen_range(0..self.available.len());
        Some(self.available[index])
    }

    /// Flip an available slot to issued
    ///
    /// Returns `false` (and changes nothing) if the code is out of range
    /// or already issued.
    pub fn issue(&mut self, code: Code) -> bool {
        let idx = code as usize;
        if idx >= self.issued.len() || self.issued[idx] {
            return false;
        }

        let pos = self.positions[idx];
        self.available.swap_remove(pos);
        if let Some(&moved) = self.available.get(pos) {
            self.positions[moved as usize] = pos;
        }
        self.positions[idx] = NOT_AVAILABLE;
        self.issued[idx] = true;
        true
    }

    /// Flip an issued slot back to available
    ///
    /// Returns `false` (and changes nothing) if the code is out of range
    /// or not issued.
    pub fn release(&mut self, code: Code) -> bool {
        let idx = code as usize;
        if idx >= self.issued.len() || !self.issued[idx] {
            return false;
        }

        self.positions[idx] = self.available.len();
        self.available.push(code);
        self.issued[idx] = false;
        true
    }

    /// All issued codes in ascending order
    pub fn issued_codes(&self) -> Vec<Code> {
        self.issued
            .iter()
            .enumerate()
            .filter(|(_, &issued)| issued)
            .map(|(code, _)| code as Code)
            .collect()
    }

    /// Every slot in code order
    pub fn snapshot(&self) -> Vec<Slot> {
        self.issued
            .iter()
            .enumerate()
            .map(|(code, &issued)| Slot {
                code: code as Code,
                issued,
            })
            .collect()
    }
}
