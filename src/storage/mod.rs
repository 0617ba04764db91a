//! Storage layer
//!
//! # Architecture
//!
//! ```text
//! CodeStoreEngine (async, spawn_blocking)
//!   └─→ CodeStore (RwLock, single writer)
//!        ├─→ StoreLock   → LOCK (one store per directory)
//!        ├─→ SlotTable   → issued flags + available list
//!        └─→ Journal     → codes.journal (checksummed batches)
//! ```
//!
//! ## Slot store
//!
//! The `SlotStore` trait provides the primitives the allocation service
//! is built on:
//! - Count available slots
//! - Claim one random available slot
//! - Bulk mark slots issued / clear all issued slots
//! - List issued slots in ascending order
//!
//! ## Durability
//!
//! Every mutation is appended to the journal as one batch before the
//! in-memory table changes. On open the journal is replayed (last write
//! wins) and any slots it does not mention are bootstrapped as available.
//! Only one open store may own a directory at a time, across processes.

pub mod engine;
pub mod journal;
pub mod lock;
pub mod mock;
pub mod pool;
pub mod slot;
pub mod store;

// Default slot store
pub use engine::CodeStoreEngine as DefaultSlotStore;

pub use engine::{CodeStoreEngine, SlotStore};
pub use journal::{Journal, JournalBatch};
pub use lock::{StoreLock, LOCK_FILE};
pub use mock::MemorySlotStore;
pub use pool::SlotTable;
pub use slot::{Code, Slot, DEFAULT_POOL_SIZE};
pub use store::{CodeStore, StoreOptions, StoreStats, JOURNAL_FILE};
