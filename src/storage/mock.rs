//! In-memory slot store for testing
//!
//! Same semantics as the durable engine without a journal. Mutations can
//! be switched to fail with `StoreUnavailable` to exercise error paths.

use super::engine::SlotStore;
use super::pool::SlotTable;
use super::slot::Code;
use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// In-memory slot store
#[derive(Clone)]
pub struct MemorySlotStore {
    table: Arc<Mutex<SlotTable>>,
    unavailable: Arc<AtomicBool>,
}

impl MemorySlotStore {
    /// Create a pool of `total` available slots
    pub fn new(total: u32) -> Self {
        Self {
            table: Arc::new(Mutex::new(SlotTable::new(total))),
            unavailable: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make every subsequent call fail as if the medium went away
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::StoreUnavailable("memory store switched off".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SlotStore for MemorySlotStore {
    fn total(&self) -> u32 {
        self.table.lock().total()
    }

    async fn count_available(&self) -> Result<usize> {
        self.check()?;
        Ok(self.table.lock().available_count())
    }

    async fn claim_random(&self) -> Result<Option<Code>> {
        self.check()?;
        let mut table = self.table.lock();
        let code = table.pick_random(&mut rand::thread_rng());
        if let Some(code) = code {
            table.issue(code);
        }
        Ok(code)
    }

    async fn mark_issued(&self, codes: BTreeSet<Code>) -> Result<usize> {
        self.check()?;
        let mut table = self.table.lock();
        Ok(codes.into_iter().filter(|&code| table.issue(code)).count())
    }

    async fn clear_issued(&self) -> Result<usize> {
        self.check()?;
        let mut table = self.table.lock();
        let issued = table.issued_codes();
        Ok(issued.into_iter().filter(|&code| table.release(code)).count())
    }

    async fn export_issued(&self) -> Result<Vec<Code>> {
        self.check()?;
        Ok(self.table.lock().issued_codes())
    }
}
