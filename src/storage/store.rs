//! Durable code store
//!
//! Combines the in-memory `SlotTable` with the append-only `Journal`.
//! This is the layer that owns slot state and enforces single-writer
//! access to it: the directory lock keeps other stores out, the `RwLock`
//! orders callers inside this one.

use super::journal::Journal;
use super::lock::StoreLock;
use super::pool::SlotTable;
use super::slot::{Code, Slot, DEFAULT_POOL_SIZE};
use crate::error::{Error, Result};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File name of the journal inside the store directory
pub const JOURNAL_FILE: &str = "codes.journal";

/// Store configuration
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Number of slots in the pool
    pub total: u32,
    /// Fsync every journal batch before it is applied (default: true)
    pub sync_writes: bool,
    /// Compact on open once the journal holds more batches than this
    pub compact_threshold: u64,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            total: DEFAULT_POOL_SIZE,
            sync_writes: true,
            compact_threshold: 1024,
        }
    }
}

impl StoreOptions {
    /// Options for tests: custom pool size, no fsync
    pub fn for_testing(total: u32) -> Self {
        Self {
            total,
            sync_writes: false,
            ..Self::default()
        }
    }
}

struct Inner {
    table: SlotTable,
    journal: Journal,
}

/// Persistent pool of codes
///
/// Mutations take the write lock for the whole journal-then-apply
/// sequence, so they are totally ordered. Reads share the read lock and
/// never observe a half-applied batch.
pub struct CodeStore {
    base_path: PathBuf,
    options: StoreOptions,
    inner: RwLock<Inner>,
    /// Released last, after the journal is closed
    _lock: StoreLock,
}

impl std::fmt::Debug for CodeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeStore")
            .field("base_path", &self.base_path)
            .field("total", &self.options.total)
            .finish()
    }
}

impl CodeStore {
    /// Open the store in `base_path`, creating and bootstrapping it if needed
    ///
    /// Bootstrap is idempotent: slots missing from the journal are added
    /// as available in one batch, existing slots are left alone. Fails with
    /// `StoreUnavailable` while another store holds the directory.
    pub fn open<P: AsRef<Path>>(base_path: P, options: StoreOptions) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        if options.total == 0 {
            return Err(Error::Config("Pool size must be positive".to_string()));
        }

        info!(path = ?base_path, total = options.total, "Opening code store");

        std::fs::create_dir_all(&base_path)
            .map_err(|e| Error::StoreUnavailable(format!("Failed to create store directory: {}", e)))?;

        let lock = StoreLock::acquire(&base_path)?;
        let (mut journal, batches) = Journal::open(base_path.join(JOURNAL_FILE), options.sync_writes)?;

        // Replay: last write wins
        let mut states: Vec<Option<bool>> = vec![None; options.total as usize];
        for batch in &batches {
            for slot in &batch.slots {
                let state = states.get_mut(slot.code as usize).ok_or_else(|| {
                    Error::Corrupt(format!(
                        "Slot {} in batch {} is outside the pool of {}",
                        slot.code, batch.sequence, options.total
                    ))
                })?;
                *state = Some(slot.issued);
            }
        }

        let missing: Vec<Slot> = states
            .iter()
            .enumerate()
            .filter(|(_, state)| state.is_none())
            .map(|(code, _)| Slot::available(code as Code))
            .collect();

        if !missing.is_empty() {
            info!(missing = missing.len(), "Bootstrapping missing slots");
            journal.append(missing)?;
        }

        let table = SlotTable::from_states(states.into_iter().map(|s| s.unwrap_or(false)).collect());
        info!(
            available = table.available_count(),
            issued = table.issued_count(),
            "Code store ready"
        );

        let store = Self {
            base_path,
            options,
            inner: RwLock::new(Inner { table, journal }),
            _lock: lock,
        };

        if store.inner.read().journal.batches() > store.options.compact_threshold {
            store.compact()?;
        }

        Ok(store)
    }

    /// Number of slots in the pool
    pub fn total(&self) -> u32 {
        self.options.total
    }

    /// Count slots that can still be claimed
    pub fn count_available(&self) -> usize {
        self.inner.read().table.available_count()
    }

    /// Claim one available slot chosen uniformly at random
    ///
    /// Returns `None` when the pool is exhausted.
    pub fn claim_random(&self) -> Result<Option<Code>> {
        let mut inner = self.inner.write();

        let code = match inner.table.pick_random(&mut rand::thread_rng()) {
            Some(code) => code,
            None => {
                debug!("Pool exhausted");
                return Ok(None);
            }
        };

        inner.journal.append(vec![Slot::issued(code)])?;

        if !inner.table.issue(code) {
            return Err(Error::Corrupt(format!(
                "Slot {:04} was claimed while already issued",
                code
            )));
        }

        debug!(code, available = inner.table.available_count(), "Claimed code");
        Ok(Some(code))
    }

    /// Mark every available slot in `codes` as issued
    ///
    /// Codes outside the pool are ignored. Returns how many slots changed.
    pub fn mark_issued(&self, codes: &BTreeSet<Code>) -> Result<usize> {
        let mut inner = self.inner.write();

        let transitions: Vec<Code> = codes
            .iter()
            .copied()
            .filter(|&code| inner.table.is_issued(code) == Some(false))
            .collect();

        if transitions.is_empty() {
            debug!(requested = codes.len(), "Nothing to mark");
            return Ok(0);
        }

        inner
            .journal
            .append(transitions.iter().map(|&code| Slot::issued(code)).collect())?;

        let marked = transitions
            .into_iter()
            .filter(|&code| inner.table.issue(code))
            .count();

        info!(requested = codes.len(), marked, "Marked codes as issued");
        Ok(marked)
    }

    /// Return every issued slot to the pool
    pub fn clear_issued(&self) -> Result<usize> {
        let mut inner = self.inner.write();

        let issued = inner.table.issued_codes();
        if issued.is_empty() {
            return Ok(0);
        }

        inner
            .journal
            .append(issued.iter().map(|&code| Slot::available(code)).collect())?;

        let cleared = issued
            .into_iter()
            .filter(|&code| inner.table.release(code))
            .count();

        info!(cleared, "Cleared issued codes");
        Ok(cleared)
    }

    /// All issued codes in ascending order
    pub fn export_issued(&self) -> Vec<Code> {
        self.inner.read().table.issued_codes()
    }

    /// Rewrite the journal as a single snapshot of the current table
    pub fn compact(&self) -> Result<()> {
        let mut inner = self.inner.write();
        let snapshot = inner.table.snapshot();
        if let Err(e) = inner.journal.rewrite(snapshot) {
            warn!("Journal compaction failed: {}", e);
            return Err(e);
        }
        Ok(())
    }

    /// Get statistics about the store
    pub fn stats(&self) -> StoreStats {
        let inner = self.inner.read();
        StoreStats {
            total: self.options.total,
            available: inner.table.available_count(),
            issued: inner.table.issued_count(),
            journal_batches: inner.journal.batches(),
            journal_bytes: inner.journal.len(),
        }
    }
}

/// Store statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub total: u32,
    pub available: usize,
    pub issued: usize,
    pub journal_batches: u64,
    pub journal_bytes: u64,
}
