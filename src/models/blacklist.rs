//! User and guild blacklists
//!
//! A blacklist entry is active while `blacklisted` is set and its expiry,
//! if any, lies in the future. Temporary entries are not swept; they simply
//! stop being active.

use crate::database::cache::{Caches, TableCache};
use crate::database::schema::Table;
use crate::database::value::Row;
use crate::error::Result;
use crate::models::Model;
use chrono::{DateTime, Utc};

/// A row of `blacklist`
#[derive(Debug, Clone, PartialEq)]
pub struct Blacklist {
    pub user_id: i64,
    pub blacklisted: bool,
    pub blacklisted_until: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

impl Blacklist {
    /// The stored flag, regardless of expiry
    pub fn is_blacklisted(&self) -> bool {
        self.blacklisted
    }

    /// Whether the entry is in force at `now`
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.blacklisted && self.blacklisted_until.map_or(true, |until| until > now)
    }

    /// Whether this is a temporary entry
    pub fn is_temporary(&self) -> bool {
        self.blacklisted_until.is_some()
    }
}

impl Model for Blacklist {
    type Key = i64;
    const TABLE: Table = Table::Blacklist;

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            user_id: row.decode("user_id")?,
            blacklisted: row.decode("blacklisted")?,
            blacklisted_until: row.decode("blacklisted_until")?,
            reason: row.decode("reason")?,
        })
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("user_id", self.user_id)
            .with("blacklisted", self.blacklisted)
            .with("blacklisted_until", self.blacklisted_until)
            .with("reason", self.reason.clone())
    }

    fn key(&self) -> i64 {
        self.user_id
    }

    fn cache(caches: &Caches) -> &TableCache<Self> {
        &caches.blacklist
    }
}

/// A row of `guild_blacklist`
#[derive(Debug, Clone, PartialEq)]
pub struct GuildBlacklist {
    pub guild_id: i64,
    pub blacklisted: bool,
    pub reason: Option<String>,
}

impl GuildBlacklist {
    /// The stored flag
    pub fn is_blacklisted(&self) -> bool {
        self.blacklisted
    }
}

impl Model for GuildBlacklist {
    type Key = i64;
    const TABLE: Table = Table::GuildBlacklist;

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            guild_id: row.decode("guild_id")?,
            blacklisted: row.decode("blacklisted")?,
            reason: row.decode("reason")?,
        })
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("guild_id", self.guild_id)
            .with("blacklisted", self.blacklisted)
            .with("reason", self.reason.clone())
    }

    fn key(&self) -> i64 {
        self.guild_id
    }

    fn cache(caches: &Caches) -> &TableCache<Self> {
        &caches.guild_blacklist
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(blacklisted: bool, until: Option<DateTime<Utc>>) -> Blacklist {
        Blacklist {
            user_id: 42,
            blacklisted,
            blacklisted_until: until,
            reason: None,
        }
    }

    #[test]
    fn test_is_active() {
        let now = Utc::now();
        assert!(entry(true, None).is_active(now));
        assert!(entry(true, Some(now + Duration::days(1))).is_active(now));
        assert!(!entry(true, Some(now - Duration::seconds(1))).is_active(now));
        assert!(!entry(false, None).is_active(now));
    }

    #[test]
    fn test_row_mapping() {
        let original = entry(true, None);
        let decoded = Blacklist::from_row(&original.to_row()).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(decoded.key(), 42);
    }
}
