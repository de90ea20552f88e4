//! Persistence adapters for `resisched-core`'s five ports: an
//! in-memory store for tests and the resilience harness, and a sqlite
//! store for the CLI. Mirrors `iqrah-storage`'s split between a
//! lightweight cache-backed store and a pool-backed sqlite store, but
//! over one schedule database rather than two.

pub mod error;
pub mod inmem;
pub mod schema;
pub mod sqlite;

pub use error::{Result, StorageError};
pub use inmem::InMemoryStore;
pub use schema::{table_manifest, ColumnManifest, TableManifest};
pub use sqlite::{seed_context, SqliteStore};
