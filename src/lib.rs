//! Guild-Store Library
//!
//! A cached, schema-validated data-access layer for chat bot tables.
//! The admin shell binary is in src/main.rs.

pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod store;

pub use config::{DbConfig, Settings};
pub use database::{ArrayOp, Backend, Database, FieldValue, MemoryBackend, Predicate, Row, Table};
pub use error::{DatabaseError, Result, StoreError, ValidationError};
pub use models::Model;
pub use store::{Fields, Record, Store};
