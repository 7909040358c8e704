//! Storage abstraction for buylog.
//!
//! Backend crates (e.g., buylog-store-sqlite) implement [`Store`] so the group and
//! invite caches don't depend on any specific database engine or schema details.

mod store;
mod types;

use thiserror::Error;

pub use store::*;
pub use types::*;

/// Uniform error type for all storage backends.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    #[error("backend error: {0}")]
    Backend(String),
}
