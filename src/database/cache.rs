//! Record caches
//!
//! One [`TableCache`] per table, keyed by primary key. Entries are only
//! installed after a successful round trip to the backend and never expire;
//! staleness is the caller's concern.

use crate::database::schema::Table;
use crate::models::{Badge, Blacklist, CommandToggles, Economy, Guild, GuildBlacklist, Model, Status, User};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Key → model snapshot map for one table
#[derive(Debug)]
pub struct TableCache<T: Model> {
    entries: RwLock<HashMap<T::Key, T>>,
}

impl<T: Model> Default for TableCache<T> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: Model> TableCache<T> {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached snapshot for a key; never performs I/O
    pub fn get(&self, key: &T::Key) -> Option<T> {
        self.entries.read().get(key).cloned()
    }

    /// Install a snapshot under its own primary key (last write wins)
    pub fn insert(&self, model: T) {
        self.entries.write().insert(model.key(), model);
    }

    /// Evict a key, returning the evicted snapshot
    pub fn remove(&self, key: &T::Key) -> Option<T> {
        self.entries.write().remove(key)
    }

    /// Whether a key is cached
    pub fn contains(&self, key: &T::Key) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Every cached snapshot
    pub fn values(&self) -> Vec<T> {
        self.entries.read().values().cloned().collect()
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

/// The per-table caches owned by a store
#[derive(Debug, Default)]
pub struct Caches {
    pub(crate) users: TableCache<User>,
    pub(crate) guilds: TableCache<Guild>,
    pub(crate) blacklist: TableCache<Blacklist>,
    pub(crate) guild_blacklist: TableCache<GuildBlacklist>,
    pub(crate) economy: TableCache<Economy>,
    pub(crate) commands: TableCache<CommandToggles>,
    pub(crate) badges: TableCache<Badge>,
    pub(crate) statuses: TableCache<Status>,
}

impl Caches {
    /// Create empty caches
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache for a model type
    pub fn of<T: Model>(&self) -> &TableCache<T> {
        T::cache(self)
    }

    /// Number of entries cached for a table
    pub fn len(&self, table: Table) -> usize {
        match table {
            Table::Users => self.users.len(),
            Table::Guilds => self.guilds.len(),
            Table::Blacklist => self.blacklist.len(),
            Table::GuildBlacklist => self.guild_blacklist.len(),
            Table::Economy => self.economy.len(),
            Table::Commands => self.commands.len(),
            Table::Badges => self.badges.len(),
            Table::Statuses => self.statuses.len(),
        }
    }

    /// Drop every entry of a table
    pub fn clear(&self, table: Table) {
        match table {
            Table::Users => self.users.clear(),
            Table::Guilds => self.guilds.clear(),
            Table::Blacklist => self.blacklist.clear(),
            Table::GuildBlacklist => self.guild_blacklist.clear(),
            Table::Economy => self.economy.clear(),
            Table::Commands => self.commands.clear(),
            Table::Badges => self.badges.clear(),
            Table::Statuses => self.statuses.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_have_distinct_caches() {
        let caches = Caches::new();
        caches.blacklist.insert(Blacklist {
            user_id: 1,
            blacklisted: true,
            blacklisted_until: None,
            reason: None,
        });
        assert_eq!(caches.len(Table::Blacklist), 1);
        assert_eq!(caches.len(Table::GuildBlacklist), 0);
    }

    #[test]
    fn test_insert_is_last_write_wins() {
        let cache: TableCache<Economy> = TableCache::new();
        cache.insert(Economy {
            user_id: 7,
            wallet: 10,
            bank: 0,
            last_daily: None,
        });
        cache.insert(Economy {
            user_id: 7,
            wallet: 20,
            bank: 0,
            last_daily: None,
        });
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&7).map(|e| e.wallet), Some(20));
        assert_eq!(cache.remove(&7).map(|e| e.wallet), Some(20));
        assert!(cache.is_empty());
    }
}
