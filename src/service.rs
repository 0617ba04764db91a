//! Allocation service
//!
//! Domain-level operations over an injected `SlotStore`. The service keeps
//! no state of its own, so one instance can be shared by any number of
//! concurrent callers.

use crate::error::Result;
use crate::storage::{Code, SlotStore};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct CodeService {
    store: Arc<dyn SlotStore>,
}

impl std::fmt::Debug for CodeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeService")
            .field("total", &self.store.total())
            .finish()
    }
}

impl CodeService {
    pub fn new(store: Arc<dyn SlotStore>) -> Self {
        Self { store }
    }

    /// Pool size of the underlying store
    pub fn total(&self) -> u32 {
        self.store.total()
    }

    /// Hand out a fresh code, `None` once the pool is exhausted
    pub async fn take(&self) -> Result<Option<Code>> {
        let code = self.store.claim_random().await?;
        match code {
            Some(code) => debug!(code, "Took code"),
            None => info!("No codes left to take"),
        }
        Ok(code)
    }

    /// Number of codes that can still be taken
    pub async fn remaining(&self) -> Result<usize> {
        self.store.count_available().await
    }

    /// Issued codes in ascending order
    pub async fn export(&self) -> Result<Vec<Code>> {
        self.store.export_issued().await
    }

    /// Mark previously issued codes, e.g. from a backup
    ///
    /// Duplicates collapse and values outside the pool are dropped.
    /// Returns how many codes were newly marked.
    pub async fn import(&self, codes: &[i64]) -> Result<usize> {
        let total = i64::from(self.store.total());
        let valid: BTreeSet<Code> = codes
            .iter()
            .copied()
            .filter(|&code| (0..total).contains(&code))
            .map(|code| code as Code)
            .collect();

        debug!(received = codes.len(), valid = valid.len(), "Importing codes");
        if valid.is_empty() {
            return Ok(0);
        }
        self.store.mark_issued(valid).await
    }

    /// Return every issued code to the pool
    pub async fn clear(&self) -> Result<usize> {
        self.store.clear_issued().await
    }
}
