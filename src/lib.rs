// Codepool - Rust Implementation
// A persistent pool of unique four-digit codes

#![warn(rust_2018_idioms)]

pub mod config;
pub mod probability;
pub mod service;
pub mod storage;
pub mod text;

// Re-exports for convenience
pub use crate::config::Settings;
pub use probability::cumulative_hit_probability;
pub use service::CodeService;
pub use storage::{CodeStore, SlotStore, StoreOptions};

/// Codepool error types
pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum Error {
        /// The durable medium could not be created, opened or written.
        #[error("Store unavailable: {0}")]
        StoreUnavailable(String),

        /// Persisted state violates the slot invariant and cannot be repaired by bootstrap.
        #[error("Store corrupt: {0}")]
        Corrupt(String),

        #[error("Configuration error: {0}")]
        Config(String),

        #[error("Internal error: {0}")]
        Internal(String),
    }

    pub type Result<T> = std::result::Result<T, Error>;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
