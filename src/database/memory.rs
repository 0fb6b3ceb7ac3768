//! In-memory backend for testing.
//!
//! Interprets [`Statement`]s against per-table row vectors with the same
//! semantics the Postgres backend gets from the server: column defaults,
//! `RETURNING *`, `ON CONFLICT`, and in-place array append/remove. Every
//! primitive call is counted, and failures can be injected, so tests can
//! assert exactly when the store touches the backend.

use crate::database::connection::Backend;
use crate::database::schema::Table;
use crate::database::statement::{ArrayOp, Assignment, OnConflict, Predicate, Statement};
use crate::database::value::{FieldValue, Row};
use crate::error::{DatabaseError, Result};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Snapshot of how often each primitive was called
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// `execute` calls
    pub execute: usize,
    /// `fetch` calls
    pub fetch: usize,
    /// `fetchrow` calls
    pub fetchrow: usize,
}

impl CallCounts {
    /// Sum of all calls
    pub fn total(&self) -> usize {
        self.execute + self.fetch + self.fetchrow
    }
}

/// In-memory table store implementing [`Backend`]
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: RwLock<HashMap<Table, Vec<Row>>>,
    execute_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    fetchrow_calls: AtomicUsize,
    failing: AtomicBool,
    closed: AtomicBool,
    log: Mutex<Vec<String>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row directly, bypassing the call counters.
    ///
    /// Missing columns take their schema defaults.
    pub fn seed(&self, table: Table, row: Row) -> Result<()> {
        let row = complete_row(table, row)?;
        self.tables.write().entry(table).or_default().push(row);
        Ok(())
    }

    /// Rows currently stored for a table
    pub fn rows(&self, table: Table) -> Vec<Row> {
        self.tables.read().get(&table).cloned().unwrap_or_default()
    }

    /// Call counts so far
    pub fn calls(&self) -> CallCounts {
        CallCounts {
            execute: self.execute_calls.load(Ordering::SeqCst),
            fetch: self.fetch_calls.load(Ordering::SeqCst),
            fetchrow: self.fetchrow_calls.load(Ordering::SeqCst),
        }
    }

    /// Reset the call counters and statement log
    pub fn reset_calls(&self) {
        self.execute_calls.store(0, Ordering::SeqCst);
        self.fetch_calls.store(0, Ordering::SeqCst);
        self.fetchrow_calls.store(0, Ordering::SeqCst);
        self.log.lock().clear();
    }

    /// SQL of every statement received, in order
    pub fn statements(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    /// Make every subsequent call fail with a DatabaseError
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn enter(&self, counter: &AtomicUsize, statement: &Statement) -> Result<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        self.log.lock().push(statement.to_sql());
        if self.closed.load(Ordering::SeqCst) {
            return Err(DatabaseError::closed().into());
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(DatabaseError::new("injected failure").into());
        }
        Ok(())
    }

    fn run(&self, statement: &Statement) -> Result<Vec<Row>> {
        match statement {
            Statement::Select { table, filter } => Ok(self
                .rows(*table)
                .into_iter()
                .filter(|row| filter.matches(row))
                .collect()),
            Statement::Insert {
                table,
                values,
                on_conflict,
            } => self.insert(*table, values, on_conflict),
            Statement::Update {
                table,
                assignments,
                filter,
            } => self.update(*table, assignments, filter),
            Statement::Delete { table, filter } => {
                check_columns(*table, filter.terms().iter().map(|(c, _)| c.as_str()))?;
                let mut tables = self.tables.write();
                let rows = tables.entry(*table).or_default();
                let (removed, kept): (Vec<Row>, Vec<Row>) =
                    rows.drain(..).partition(|row| filter.matches(row));
                *rows = kept;
                Ok(removed)
            }
            Statement::Raw { .. } => Err(DatabaseError::new(
                "raw SQL is not supported by the memory backend",
            )
            .into()),
        }
    }

    fn insert(
        &self,
        table: Table,
        values: &[(String, FieldValue)],
        on_conflict: &OnConflict,
    ) -> Result<Vec<Row>> {
        let mut row = Row::new();
        for (column, value) in values {
            row.set(column.clone(), value.clone());
        }
        let row = complete_row(table, row)?;
        let pk = table.primary_key();
        let key = row.get(pk).cloned().unwrap_or(FieldValue::Null);

        let mut tables = self.tables.write();
        let rows = tables.entry(table).or_default();
        match rows.iter_mut().find(|r| r.get(pk) == Some(&key)) {
            None => {
                rows.push(row.clone());
                Ok(vec![row])
            }
            Some(existing) => match on_conflict {
                OnConflict::Error => Err(DatabaseError::new(format!(
                    "duplicate key value violates unique constraint \"{}_pkey\"",
                    table.name()
                ))
                .into()),
                OnConflict::Ignore => Ok(Vec::new()),
                OnConflict::Update(columns) if columns.is_empty() => Ok(Vec::new()),
                OnConflict::Update(columns) => {
                    for column in columns {
                        if let Some(value) = row.get(column) {
                            existing.set(column.clone(), value.clone());
                        }
                    }
                    Ok(vec![existing.clone()])
                }
            },
        }
    }

    fn update(
        &self,
        table: Table,
        assignments: &[Assignment],
        filter: &Predicate,
    ) -> Result<Vec<Row>> {
        check_columns(
            table,
            assignments
                .iter()
                .map(Assignment::column)
                .chain(filter.terms().iter().map(|(c, _)| c.as_str())),
        )?;

        let mut tables = self.tables.write();
        let rows = tables.entry(table).or_default();
        let mut updated = Vec::new();
        for row in rows.iter_mut().filter(|row| filter.matches(row)) {
            for assignment in assignments {
                match assignment {
                    Assignment::Replace(column, value) => row.set(column.clone(), value.clone()),
                    Assignment::Mutate(column, op, value) => {
                        let mut items = row
                            .get(column)
                            .and_then(FieldValue::as_array)
                            .map(<[FieldValue]>::to_vec)
                            .unwrap_or_default();
                        items.retain(|item| item != value);
                        if *op == ArrayOp::Append {
                            items.push(value.clone());
                        }
                        row.set(column.clone(), FieldValue::Array(items));
                    }
                }
            }
            updated.push(row.clone());
        }
        Ok(updated)
    }
}

/// Reject columns the table does not declare, as the server would
fn check_columns<'a>(table: Table, columns: impl IntoIterator<Item = &'a str>) -> Result<()> {
    for column in columns {
        if table.column(column).is_none() {
            return Err(DatabaseError::new(format!(
                "column \"{}\" of relation \"{}\" does not exist",
                column,
                table.name()
            ))
            .into());
        }
    }
    Ok(())
}

/// Lay a row out in schema order, filling defaults for missing columns
fn complete_row(table: Table, row: Row) -> Result<Row> {
    check_columns(table, row.column_names())?;
    let mut out = Row::new();
    for def in table.schema() {
        let value = match row.get(def.name) {
            Some(value) => value.clone(),
            None => def.default.value().ok_or_else(|| {
                DatabaseError::new(format!(
                    "null value in column \"{}\" of relation \"{}\" violates not-null constraint",
                    def.name,
                    table.name()
                ))
            })?,
        };
        out.set(def.name, value);
    }
    Ok(out)
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn connect(&self) -> Result<()> {
        self.closed.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn execute(&self, statement: &Statement) -> Result<u64> {
        self.enter(&self.execute_calls, statement)?;
        Ok(self.run(statement)?.len() as u64)
    }

    async fn fetch(&self, statement: &Statement) -> Result<Vec<Row>> {
        self.enter(&self.fetch_calls, statement)?;
        self.run(statement)
    }

    async fn fetchrow(&self, statement: &Statement) -> Result<Option<Row>> {
        self.enter(&self.fetchrow_calls, statement)?;
        Ok(self.run(statement)?.into_iter().next())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    async fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_fills_defaults_and_returns_row() {
        let backend = MemoryBackend::new();
        let stmt = Statement::Insert {
            table: Table::Guilds,
            values: vec![("guild_id".into(), 1_i64.into())],
            on_conflict: OnConflict::Error,
        };
        let row = backend.fetchrow(&stmt).await.unwrap().unwrap();
        assert_eq!(row.get("prefix"), Some(&FieldValue::from("!")));
        assert_eq!(row.get("autorole_ids"), Some(&FieldValue::Array(Vec::new())));
        assert_eq!(backend.calls().fetchrow, 1);

        let err = backend.fetchrow(&stmt).await.unwrap_err();
        assert!(err.is_database());
    }

    #[tokio::test]
    async fn test_insert_requires_primary_key() {
        let backend = MemoryBackend::new();
        let stmt = Statement::Insert {
            table: Table::Users,
            values: vec![("bio".into(), "hi".into())],
            on_conflict: OnConflict::Error,
        };
        assert!(backend.fetchrow(&stmt).await.is_err());
    }

    #[tokio::test]
    async fn test_array_append_is_idempotent() {
        let backend = MemoryBackend::new();
        backend
            .seed(Table::Guilds, Row::new().with("guild_id", 1_i64))
            .unwrap();
        let stmt = Statement::Update {
            table: Table::Guilds,
            assignments: vec![Assignment::Mutate(
                "autorole_ids".into(),
                ArrayOp::Append,
                5_i64.into(),
            )],
            filter: Predicate::eq("guild_id", 1_i64),
        };
        backend.fetchrow(&stmt).await.unwrap();
        let row = backend.fetchrow(&stmt).await.unwrap().unwrap();
        assert_eq!(row.get("autorole_ids"), Some(&FieldValue::from(vec![5_i64])));
    }

    #[tokio::test]
    async fn test_closed_and_failing() {
        let backend = MemoryBackend::new();
        let stmt = Statement::select(Table::Users, Predicate::new());

        backend.set_failing(true);
        assert!(backend.fetch(&stmt).await.is_err());
        backend.set_failing(false);
        assert!(backend.fetch(&stmt).await.is_ok());

        backend.close().await;
        assert!(backend.is_closed().await);
        assert!(backend.fetch(&stmt).await.is_err());
        backend.connect().await.unwrap();
        assert!(backend.fetch(&stmt).await.is_ok());
        assert_eq!(backend.calls().fetch, 4);
    }

    #[tokio::test]
    async fn test_raw_is_rejected() {
        let backend = MemoryBackend::new();
        let err = backend
            .execute(&Statement::raw("SELECT 1", Vec::new()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("memory backend"));
    }
}
