//! Graph storage backends
//!
//! Writes reach a store through the `GraphStore` trait. `MemoryGraphStore`
//! backs tests and short-lived hosts; `SqliteGraphStore` persists to disk.

mod memory;
mod sqlite;
mod traits;

pub use memory::MemoryGraphStore;
pub use sqlite::SqliteGraphStore;
pub use traits::{
    ApplySummary, GraphStore, OpenStore, Rejection, RejectionReason, StorageError, StorageResult,
};
