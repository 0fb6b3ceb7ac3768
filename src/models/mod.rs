//! Typed table models
//!
//! One struct per table. Rows are mapped to and from these structs once, at
//! the backend boundary, through [`Model::from_row`] and [`Model::to_row`].

pub mod badges;
pub mod blacklist;
pub mod commands;
pub mod economy;
pub mod guilds;
pub mod statuses;
pub mod users;

use crate::database::cache::{Caches, TableCache};
use crate::database::schema::Table;
use crate::database::value::{FieldValue, Row};
use crate::error::Result;
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

// Re-exports
pub use badges::Badge;
pub use blacklist::{Blacklist, GuildBlacklist};
pub use commands::CommandToggles;
pub use economy::Economy;
pub use guilds::Guild;
pub use statuses::Status;
pub use users::User;

/// A typed snapshot of one row of a known table
pub trait Model: fmt::Debug + Clone + PartialEq + Send + Sync + 'static {
    /// Primary key type
    type Key: fmt::Debug
        + fmt::Display
        + Clone
        + Eq
        + Hash
        + FromStr
        + Into<FieldValue>
        + Send
        + Sync
        + 'static;

    /// Table this model belongs to
    const TABLE: Table;

    /// Decode from a backend row
    fn from_row(row: &Row) -> Result<Self>;

    /// Encode as a row in schema column order
    fn to_row(&self) -> Row;

    /// Primary key value
    fn key(&self) -> Self::Key;

    /// This table's cache inside a store's cache set
    fn cache(caches: &Caches) -> &TableCache<Self>;
}
