//! Cached CRUD facade
//!
//! [`Store`] is what callers use. It routes every operation through the
//! [`Backend`] and keeps one cache per table, populated only by explicit
//! fetch/add/edit calls.
//!
//! Reads are lenient: [`Store::getch`] turns backend failures into `None`.
//! Writes are strict: payloads are validated against the table schema before
//! a statement is built, and backend failures propagate unchanged.

pub mod record;
pub mod tables;

use crate::config::DbConfig;
use crate::database::cache::{Caches, TableCache};
use crate::database::connection::{Backend, Database};
use crate::database::schema::Table;
use crate::database::statement::{Assignment, OnConflict, Predicate, Statement};
use crate::database::value::{FieldValue, Row};
use crate::error::{DatabaseError, Result, StoreError};
use crate::models::{
    Badge, Blacklist, CommandToggles, Economy, Guild, GuildBlacklist, Model, Status, User,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub use record::Record;

/// Ordered write payload: `(column, value)` pairs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    entries: Vec<(String, FieldValue)>,
}

impl Fields {
    /// Empty payload
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style set; a later set of the same column wins
    pub fn set(mut self, column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(column, value);
        self
    }

    /// Set a column in place
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<FieldValue>) {
        let column = column.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((column, value)),
        }
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate over (column, value)
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(c, v)| (c.as_str(), v))
    }

    /// Map friendly names to physical columns and check every value against
    /// the schema. Unknown names are kept as given so validation can
    /// report them.
    pub(crate) fn resolve(self, table: Table) -> Result<Vec<(String, FieldValue)>> {
        let mut resolved = Fields::new();
        for (column, value) in self.entries {
            let physical = table
                .resolve(&column)
                .map(str::to_string)
                .unwrap_or(column);
            resolved.insert(physical, value);
        }
        table.validate(resolved.iter())?;
        Ok(resolved.entries)
    }
}

impl<C: Into<String>, V: Into<FieldValue>> FromIterator<(C, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (C, V)>>(iter: I) -> Self {
        let mut fields = Fields::new();
        for (column, value) in iter {
            fields.insert(column, value);
        }
        fields
    }
}

struct StoreInner {
    backend: Arc<dyn Backend>,
    caches: Caches,
}

/// Cheap-clone handle to a backend and its per-table caches.
///
/// Caches live exactly as long as the store.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("caches", &self.inner.caches)
            .finish_non_exhaustive()
    }
}

impl Store {
    /// Store over any backend, with empty caches
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                backend,
                caches: Caches::new(),
            }),
        }
    }

    /// Store over PostgreSQL; the pool is created on first use
    pub fn postgres(config: DbConfig) -> Self {
        Self::new(Arc::new(Database::new(config)))
    }

    /// The backend
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.inner.backend
    }

    /// The per-table caches
    pub fn caches(&self) -> &Caches {
        &self.inner.caches
    }

    fn cache<T: Model>(&self) -> &TableCache<T> {
        T::cache(&self.inner.caches)
    }

    /// Open the backend (idempotent)
    pub async fn connect(&self) -> Result<()> {
        self.inner.backend.connect().await
    }

    /// Close the backend. Cached records stay readable through `get`.
    pub async fn close(&self) {
        self.inner.backend.close().await
    }

    fn wrap<T: Model>(&self, model: T) -> Record<T> {
        Record::new(model, self.clone())
    }

    fn decode<T: Model>(&self, row: &Row, cache: bool) -> Result<Record<T>> {
        let model = T::from_row(row)?;
        if cache {
            self.cache::<T>().insert(model.clone());
        }
        Ok(self.wrap(model))
    }

    /// Insert a row keyed by `key`, failing if the key already exists
    pub async fn add<T: Model>(&self, key: T::Key, fields: Fields, cache: bool) -> Result<Record<T>> {
        self.insert::<T>(key, fields, false, cache).await
    }

    /// Insert a row, or overwrite the supplied columns of an existing one
    pub async fn upsert<T: Model>(&self, key: T::Key, fields: Fields, cache: bool) -> Result<Record<T>> {
        self.insert::<T>(key, fields, true, cache).await
    }

    async fn insert<T: Model>(
        &self,
        key: T::Key,
        fields: Fields,
        upsert: bool,
        cache: bool,
    ) -> Result<Record<T>> {
        let table = T::TABLE;
        let pk = table.primary_key();
        let values = fields.set(pk, key.clone()).resolve(table)?;

        let on_conflict = if upsert {
            let mut columns: Vec<String> = values
                .iter()
                .map(|(c, _)| c.clone())
                .filter(|c| c != pk)
                .collect();
            if columns.is_empty() {
                // Touch the key so RETURNING still yields the existing row
                columns.push(pk.to_string());
            }
            OnConflict::Update(columns)
        } else {
            OnConflict::Error
        };

        let statement = Statement::Insert {
            table,
            values,
            on_conflict,
        };
        debug!(table = %table, key = %key, upsert, "insert");
        let row = self
            .inner
            .backend
            .fetchrow(&statement)
            .await?
            .ok_or_else(|| DatabaseError::new(format!("insert into {} returned no row", table)))?;
        self.decode(&row, cache)
    }

    /// Query one row by key. Always hits the backend.
    pub async fn fetch<T: Model>(&self, key: T::Key, cache: bool) -> Result<Option<Record<T>>> {
        let table = T::TABLE;
        let statement = Statement::select(table, Predicate::eq(table.primary_key(), key));
        let row = self.inner.backend.fetchrow(&statement).await?;
        row.map(|row| self.decode(&row, cache)).transpose()
    }

    /// Query every row of a table
    pub async fn fetch_all<T: Model>(&self, cache: bool) -> Result<Vec<Record<T>>> {
        let statement = Statement::select(T::TABLE, Predicate::new());
        let rows = self.inner.backend.fetch(&statement).await?;
        rows.iter().map(|row| self.decode(row, cache)).collect()
    }

    /// Cached record for a key; never performs I/O
    pub fn get<T: Model>(&self, key: &T::Key) -> Option<Record<T>> {
        self.cache::<T>().get(key).map(|model| self.wrap(model))
    }

    /// Evict a key and delete its row.
    ///
    /// The cache entry is dropped before the DELETE is sent, so it is gone
    /// even when the DELETE fails. Returns the deleted row, or the evicted
    /// snapshot when the backend had no such row.
    pub async fn remove<T: Model>(&self, key: T::Key) -> Result<Option<Record<T>>> {
        let table = T::TABLE;
        let evicted = self.cache::<T>().remove(&key);
        let statement = Statement::Delete {
            table,
            filter: Predicate::eq(table.primary_key(), key.clone()),
        };
        debug!(table = %table, key = %key, "remove");
        let deleted = self.inner.backend.fetchrow(&statement).await?;
        match deleted {
            Some(row) => Ok(Some(self.decode(&row, false)?)),
            None => Ok(evicted.map(|model| self.wrap(model))),
        }
    }

    /// Cached record if present, otherwise fetch it.
    ///
    /// Backend errors are logged and reported as `None`.
    pub async fn getch<T: Model>(&self, key: T::Key, cache: bool) -> Option<Record<T>> {
        if let Some(record) = self.get::<T>(&key) {
            return Some(record);
        }
        match self.fetch::<T>(key.clone(), cache).await {
            Ok(record) => record,
            Err(e) => {
                warn!(table = %T::TABLE, key = %key, error = %e, "getch fetch failed");
                None
            }
        }
    }

    /// Run an UPDATE and install every returned row in the cache.
    ///
    /// Returns the row keyed by `key` when the filter matched it, otherwise
    /// the first row returned. `NotFound` when nothing matched.
    pub(crate) async fn update<T: Model>(
        &self,
        assignments: Vec<Assignment>,
        filter: Predicate,
        key: Option<&T::Key>,
    ) -> Result<Record<T>> {
        let table = T::TABLE;
        let described = filter
            .terms()
            .iter()
            .map(|(c, v)| format!("{}={}", c, v))
            .collect::<Vec<_>>()
            .join(", ");
        let statement = Statement::Update {
            table,
            assignments,
            filter,
        };
        debug!(table = %table, filter = %described, "update");
        let rows = self.inner.backend.fetch(&statement).await?;

        let mut updated = rows
            .iter()
            .map(|row| self.decode::<T>(row, true))
            .collect::<Result<Vec<_>>>()?;
        if updated.len() > 1 {
            debug!(table = %table, rows = updated.len(), "update matched several rows");
        }
        if updated.is_empty() {
            return Err(StoreError::not_found(table, described));
        }
        let position = key
            .and_then(|key| updated.iter().position(|record| record.key() == *key))
            .unwrap_or(0);
        Ok(updated.swap_remove(position))
    }

    /// Bulk-populate the caches of the given tables.
    ///
    /// Returns the number of rows cached.
    pub async fn chunk(&self, tables: &[Table]) -> Result<usize> {
        let mut total = 0;
        for table in tables {
            let count = match table {
                Table::Users => self.fetch_all::<User>(true).await?.len(),
                Table::Guilds => self.fetch_all::<Guild>(true).await?.len(),
                Table::Blacklist => self.fetch_all::<Blacklist>(true).await?.len(),
                Table::GuildBlacklist => self.fetch_all::<GuildBlacklist>(true).await?.len(),
                Table::Economy => self.fetch_all::<Economy>(true).await?.len(),
                Table::Commands => self.fetch_all::<CommandToggles>(true).await?.len(),
                Table::Badges => self.fetch_all::<Badge>(true).await?.len(),
                Table::Statuses => self.fetch_all::<Status>(true).await?.len(),
            };
            info!(table = %table, rows = count, "Chunked table");
            total += count;
        }
        Ok(total)
    }

    /// Number of cached entries for a table
    pub fn cache_len(&self, table: Table) -> usize {
        self.inner.caches.len(table)
    }

    /// Cache-only lookup by table and textual key
    pub fn get_dynamic(&self, table: Table, key: &str) -> Result<Option<Row>> {
        match table {
            Table::Users => self.get_row::<User>(key),
            Table::Guilds => self.get_row::<Guild>(key),
            Table::Blacklist => self.get_row::<Blacklist>(key),
            Table::GuildBlacklist => self.get_row::<GuildBlacklist>(key),
            Table::Economy => self.get_row::<Economy>(key),
            Table::Commands => self.get_row::<CommandToggles>(key),
            Table::Badges => self.get_row::<Badge>(key),
            Table::Statuses => self.get_row::<Status>(key),
        }
    }

    /// Fetch by table and textual key
    pub async fn fetch_dynamic(&self, table: Table, key: &str, cache: bool) -> Result<Option<Row>> {
        match table {
            Table::Users => self.fetch_row::<User>(key, cache).await,
            Table::Guilds => self.fetch_row::<Guild>(key, cache).await,
            Table::Blacklist => self.fetch_row::<Blacklist>(key, cache).await,
            Table::GuildBlacklist => self.fetch_row::<GuildBlacklist>(key, cache).await,
            Table::Economy => self.fetch_row::<Economy>(key, cache).await,
            Table::Commands => self.fetch_row::<CommandToggles>(key, cache).await,
            Table::Badges => self.fetch_row::<Badge>(key, cache).await,
            Table::Statuses => self.fetch_row::<Status>(key, cache).await,
        }
    }

    /// `getch` by table and textual key. Only an unparsable key is an error.
    pub async fn getch_dynamic(&self, table: Table, key: &str) -> Result<Option<Row>> {
        match table {
            Table::Users => self.getch_row::<User>(key).await,
            Table::Guilds => self.getch_row::<Guild>(key).await,
            Table::Blacklist => self.getch_row::<Blacklist>(key).await,
            Table::GuildBlacklist => self.getch_row::<GuildBlacklist>(key).await,
            Table::Economy => self.getch_row::<Economy>(key).await,
            Table::Commands => self.getch_row::<CommandToggles>(key).await,
            Table::Badges => self.getch_row::<Badge>(key).await,
            Table::Statuses => self.getch_row::<Status>(key).await,
        }
    }

    fn get_row<T: Model>(&self, key: &str) -> Result<Option<Row>> {
        let key = parse_key::<T>(key)?;
        Ok(self.get::<T>(&key).map(|r| r.to_row()))
    }

    async fn fetch_row<T: Model>(&self, key: &str, cache: bool) -> Result<Option<Row>> {
        let key = parse_key::<T>(key)?;
        Ok(self.fetch::<T>(key, cache).await?.map(|r| r.to_row()))
    }

    async fn getch_row<T: Model>(&self, key: &str) -> Result<Option<Row>> {
        let key = parse_key::<T>(key)?;
        Ok(self.getch::<T>(key, true).await.map(|r| r.to_row()))
    }
}

/// Parse a textual key into a model's key type
pub fn parse_key<T: Model>(key: &str) -> Result<T::Key> {
    key.trim().parse::<T::Key>().map_err(|_| StoreError::InvalidKey {
        table: T::TABLE.to_string(),
        key: key.to_string(),
    })
}
