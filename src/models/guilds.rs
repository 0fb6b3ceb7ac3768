//! Per-guild settings

use crate::database::cache::{Caches, TableCache};
use crate::database::schema::Table;
use crate::database::value::Row;
use crate::error::Result;
use crate::models::Model;

/// A row of `guilds`
#[derive(Debug, Clone, PartialEq)]
pub struct Guild {
    pub guild_id: i64,
    pub prefix: String,
    pub log_channel_id: Option<i64>,
    pub welcome_channel_id: Option<i64>,
    /// Roles handed to new members; mutated only through array append/remove
    pub autorole_ids: Vec<i64>,
}

impl Guild {
    /// Whether a role is in the autorole list
    pub fn has_autorole(&self, role_id: i64) -> bool {
        self.autorole_ids.contains(&role_id)
    }
}

impl Model for Guild {
    type Key = i64;
    const TABLE: Table = Table::Guilds;

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            guild_id: row.decode("guild_id")?,
            prefix: row.decode("prefix")?,
            log_channel_id: row.decode("log_channel_id")?,
            welcome_channel_id: row.decode("welcome_channel_id")?,
            autorole_ids: row.decode("autorole_ids")?,
        })
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("guild_id", self.guild_id)
            .with("prefix", self.prefix.clone())
            .with("log_channel_id", self.log_channel_id)
            .with("welcome_channel_id", self.welcome_channel_id)
            .with("autorole_ids", self.autorole_ids.clone())
    }

    fn key(&self) -> i64 {
        self.guild_id
    }

    fn cache(caches: &Caches) -> &TableCache<Self> {
        &caches.guilds
    }
}
