//! Per-guild command toggles
//!
//! Each guild has one row whose `disabled` array lists the commands turned
//! off in that guild. The array is the only state; there is no row per
//! command.

use crate::database::cache::{Caches, TableCache};
use crate::database::schema::Table;
use crate::database::value::Row;
use crate::error::Result;
use crate::models::Model;
use std::collections::BTreeMap;

/// A row of `commands`
#[derive(Debug, Clone, PartialEq)]
pub struct CommandToggles {
    pub guild_id: i64,
    pub disabled: Vec<String>,
}

impl CommandToggles {
    /// Whether a command is disabled in this snapshot
    pub fn is_disabled(&self, name: &str) -> bool {
        self.disabled.iter().any(|d| d.eq_ignore_ascii_case(name))
    }

    /// Enabled state for each of the given commands
    pub fn states<'a, I>(&self, names: I) -> BTreeMap<String, bool>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names
            .into_iter()
            .map(|name| (name.to_string(), !self.is_disabled(name)))
            .collect()
    }
}

impl Model for CommandToggles {
    type Key = i64;
    const TABLE: Table = Table::Commands;

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            guild_id: row.decode("guild_id")?,
            disabled: row.decode("disabled")?,
        })
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("guild_id", self.guild_id)
            .with("disabled", self.disabled.clone())
    }

    fn key(&self) -> i64 {
        self.guild_id
    }

    fn cache(caches: &Caches) -> &TableCache<Self> {
        &caches.commands
    }
}
