//! Database module
//!
//! Table schemas, the backend-neutral value and statement models, the
//! PostgreSQL connection manager, an in-memory backend, and the per-table
//! record caches.

pub mod cache;
pub mod connection;
pub mod memory;
pub mod schema;
pub mod statement;
pub mod value;

// Re-exports
pub use cache::{Caches, TableCache};
pub use connection::{Backend, Database};
pub use memory::{CallCounts, MemoryBackend};
pub use schema::{ColumnDef, ScalarType, SqlType, Table};
pub use statement::{ArrayOp, Assignment, OnConflict, Predicate, Statement};
pub use value::{FieldValue, FromField, Row};
