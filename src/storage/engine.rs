//! Slot store trait and the durable engine behind it

use super::slot::Code;
use super::store::{CodeStore, StoreOptions, StoreStats};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::error;

/// Slot store trait
///
/// The primitives the allocation service is built on. Implementations
/// must serialize all mutating calls.
#[async_trait]
pub trait SlotStore: Send + Sync {
    /// Number of slots in the pool
    fn total(&self) -> u32;

    async fn count_available(&self) -> Result<usize>;

    /// Atomically claim a random available slot, `None` when exhausted
    async fn claim_random(&self) -> Result<Option<Code>>;

    /// Mark available slots in `codes` as issued, returning how many changed
    async fn mark_issued(&self, codes: BTreeSet<Code>) -> Result<usize>;

    /// Reset every issued slot, returning how many changed
    async fn clear_issued(&self) -> Result<usize>;

    /// Issued codes in ascending order
    async fn export_issued(&self) -> Result<Vec<Code>>;
}

/// Async engine over a durable `CodeStore`
///
/// Every call runs on tokio's blocking pool. Dropping the returned future
/// does not cancel the blocking task, so an abandoned call still commits
/// or fails as a whole.
#[derive(Debug, Clone)]
pub struct CodeStoreEngine {
    inner: Arc<CodeStore>,
}

impl CodeStoreEngine {
    /// Open (and bootstrap if needed) a store at `base_path`
    pub fn open<P: AsRef<Path>>(base_path: P, options: StoreOptions) -> Result<Self> {
        let inner = CodeStore::open(base_path, options)?;
        Ok(Self::from_store(Arc::new(inner)))
    }

    pub fn from_store(inner: Arc<CodeStore>) -> Self {
        Self { inner }
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        self.blocking(|store| Ok(store.stats())).await
    }

    pub async fn compact(&self) -> Result<()> {
        self.blocking(|store| store.compact()).await
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&CodeStore) -> Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || op(&*store))
            .await
            .map_err(|e| {
                error!("Store task failed: {}", e);
                Error::Internal(format!("Store task failed: {}", e))
            })?
    }
}

#[async_trait]
impl SlotStore for CodeStoreEngine {
    fn total(&self) -> u32 {
        self.inner.total()
    }

    async fn count_available(&self) -> Result<usize> {
        self.blocking(|store| Ok(store.count_available())).await
    }

    async fn claim_random(&self) -> Result<Option<Code>> {
        self.blocking(|store| store.claim_random()).await
    }

    async fn mark_issued(&self, codes: BTreeSet<Code>) -> Result<usize> {
        self.blocking(move |store| store.mark_issued(&codes)).await
    }

    async fn clear_issued(&self) -> Result<usize> {
        self.blocking(|store| store.clear_issued()).await
    }

    async fn export_issued(&self) -> Result<Vec<Code>> {
        self.blocking(|store| Ok(store.export_issued())).await
    }
}
