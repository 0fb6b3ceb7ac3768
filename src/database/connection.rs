//! Connection management
//!
//! This module provides the [`Backend`] seam every store operation goes
//! through, and [`Database`], the PostgreSQL implementation that owns the
//! connection pool.

use crate::config::DbConfig;
use crate::database::schema::{ScalarType, SqlType};
use crate::database::statement::Statement;
use crate::database::value::{FieldValue, Row};
use crate::error::{DatabaseError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row as _, TypeInfo};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Primitive operations the store needs from a backend.
///
/// Every failure is reported as a [`DatabaseError`] so callers never see
/// driver-specific error types.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Open the backend; a no-op when already open
    async fn connect(&self) -> Result<()>;

    /// Run a statement, returning the number of rows affected
    async fn execute(&self, statement: &Statement) -> Result<u64>;

    /// Run a statement, returning every row
    async fn fetch(&self, statement: &Statement) -> Result<Vec<Row>>;

    /// Run a statement, returning the first row if any
    async fn fetchrow(&self, statement: &Statement) -> Result<Option<Row>>;

    /// Run a statement, returning the first column of the first row
    async fn fetchval(&self, statement: &Statement) -> Result<Option<FieldValue>> {
        Ok(self
            .fetchrow(statement)
            .await?
            .and_then(|row| row.first().cloned()))
    }

    /// Tear down; calls fail until `connect` is called again
    async fn close(&self);

    /// Whether `close` has been called since the last `connect`
    async fn is_closed(&self) -> bool;
}

/// Pool lifecycle
enum PoolState {
    /// Never connected; the first call connects
    Idle,
    /// Open pool
    Open(PgPool),
    /// Explicitly closed
    Closed,
}

/// PostgreSQL connection manager
///
/// Holds a lazily created [`PgPool`]. Each operation acquires a connection
/// from the pool for the duration of one statement. sqlx returns the
/// connection to the pool when its guard drops, so a cancelled caller
/// never leaks one.
pub struct Database {
    /// Connection settings
    config: DbConfig,
    /// Current pool state
    state: RwLock<PoolState>,
}

impl Database {
    /// Create a manager without connecting
    pub fn new(config: DbConfig) -> Self {
        Self {
            config,
            state: RwLock::new(PoolState::Idle),
        }
    }

    /// Create a manager and open the pool immediately
    pub async fn connect_with(config: DbConfig) -> Result<Self> {
        let database = Self::new(config);
        database.connect().await?;
        Ok(database)
    }

    /// Connection settings
    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// Whether the pool is currently open
    pub async fn is_open(&self) -> bool {
        matches!(*self.state.read().await, PoolState::Open(_))
    }

    /// Create every table that does not exist yet
    pub async fn create_tables(&self) -> Result<()> {
        for table in crate::database::schema::Table::ALL {
            let statement = Statement::raw(table.create_sql(), Vec::new());
            self.execute(&statement).await?;
            debug!(table = %table, "Ensured table exists");
        }
        info!("Schema created");
        Ok(())
    }

    /// Test the connection
    pub async fn test_connection(&self) -> Result<()> {
        self.fetchval(&Statement::raw("SELECT 1::BIGINT", Vec::new()))
            .await
            .map(|_| ())
    }

    async fn open_pool(&self) -> Result<PgPool> {
        info!(
            host = %self.config.host,
            database = %self.config.database,
            max_connections = self.config.max_connections,
            "Creating connection pool"
        );
        PgPoolOptions::new()
            .max_connections(self.config.max_connections)
            .min_connections(self.config.min_connections)
            .acquire_timeout(self.config.acquire_timeout())
            .idle_timeout(Some(self.config.idle_timeout()))
            .connect_with(self.config.connect_options())
            .await
            .map_err(|e| DatabaseError::with_context("failed to connect", e).into())
    }

    /// Current pool, connecting first if nothing has been opened yet
    async fn pool(&self) -> Result<PgPool> {
        {
            let state = self.state.read().await;
            match &*state {
                PoolState::Open(pool) => return Ok(pool.clone()),
                PoolState::Closed => return Err(DatabaseError::closed().into()),
                PoolState::Idle => {}
            }
        }

        let mut state = self.state.write().await;
        match &*state {
            PoolState::Open(pool) => Ok(pool.clone()),
            PoolState::Closed => Err(DatabaseError::closed().into()),
            PoolState::Idle => {
                let pool = self.open_pool().await?;
                *state = PoolState::Open(pool.clone());
                Ok(pool)
            }
        }
    }
}

#[async_trait]
impl Backend for Database {
    async fn connect(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if let PoolState::Open(_) = &*state {
            return Ok(());
        }
        let pool = self.open_pool().await?;
        *state = PoolState::Open(pool);
        Ok(())
    }

    async fn execute(&self, statement: &Statement) -> Result<u64> {
        let pool = self.pool().await?;
        let sql = statement.to_sql();
        debug!(sql = %sql, "execute");
        let result = bind_all(sqlx::query(&sql), statement)?
            .execute(&pool)
            .await
            .map_err(DatabaseError::from)?;
        Ok(result.rows_affected())
    }

    async fn fetch(&self, statement: &Statement) -> Result<Vec<Row>> {
        let pool = self.pool().await?;
        let sql = statement.to_sql();
        debug!(sql = %sql, "fetch");
        let rows = bind_all(sqlx::query(&sql), statement)?
            .fetch_all(&pool)
            .await
            .map_err(DatabaseError::from)?;
        rows.iter().map(decode_row).collect()
    }

    async fn fetchrow(&self, statement: &Statement) -> Result<Option<Row>> {
        let pool = self.pool().await?;
        let sql = statement.to_sql();
        debug!(sql = %sql, "fetchrow");
        let row = bind_all(sqlx::query(&sql), statement)?
            .fetch_optional(&pool)
            .await
            .map_err(DatabaseError::from)?;
        row.as_ref().map(decode_row).transpose()
    }

    async fn close(&self) {
        let mut state = self.state.write().await;
        if let PoolState::Open(pool) = std::mem::replace(&mut *state, PoolState::Closed) {
            info!("Closing connection pool");
            pool.close().await;
        }
    }

    async fn is_closed(&self) -> bool {
        matches!(*self.state.read().await, PoolState::Closed)
    }
}

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// Bind every argument of a statement in placeholder order
fn bind_all<'q>(mut query: PgQuery<'q>, statement: &Statement) -> Result<PgQuery<'q>> {
    for (value, ty) in statement.args().into_iter().zip(statement.arg_types()) {
        query = bind_value(query, value, ty)?;
    }
    Ok(query)
}

/// Bind one value. The declared type decides how NULLs and empty arrays
/// are typed on the wire.
fn bind_value<'q>(query: PgQuery<'q>, value: &FieldValue, ty: Option<SqlType>) -> Result<PgQuery<'q>> {
    Ok(match value {
        FieldValue::Null => match ty {
            Some(SqlType::Scalar(ScalarType::Boolean)) => query.bind(None::<bool>),
            Some(SqlType::Scalar(ScalarType::BigInt)) => query.bind(None::<i64>),
            Some(SqlType::Scalar(ScalarType::Timestamp)) => query.bind(None::<DateTime<Utc>>),
            Some(SqlType::Scalar(ScalarType::Text)) | None => query.bind(None::<String>),
            Some(SqlType::Array(ScalarType::Boolean)) => query.bind(None::<Vec<bool>>),
            Some(SqlType::Array(ScalarType::BigInt)) => query.bind(None::<Vec<i64>>),
            Some(SqlType::Array(ScalarType::Text)) => query.bind(None::<Vec<String>>),
            Some(SqlType::Array(ScalarType::Timestamp)) => {
                query.bind(None::<Vec<DateTime<Utc>>>)
            }
        },
        FieldValue::Bool(v) => query.bind(*v),
        FieldValue::BigInt(v) => query.bind(*v),
        FieldValue::Text(v) => query.bind(v.clone()),
        FieldValue::Timestamp(v) => query.bind(*v),
        FieldValue::Array(items) => {
            let element = ty
                .map(|t| t.element())
                .or_else(|| items.iter().find_map(FieldValue::scalar_type))
                .unwrap_or(ScalarType::Text);
            let mixed = || DatabaseError::new(format!("cannot bind mixed array as {}[]", element));
            match element {
                ScalarType::Boolean => query.bind(
                    items
                        .iter()
                        .map(FieldValue::as_bool)
                        .collect::<Option<Vec<bool>>>()
                        .ok_or_else(mixed)?,
                ),
                ScalarType::BigInt => query.bind(
                    items
                        .iter()
                        .map(FieldValue::as_i64)
                        .collect::<Option<Vec<i64>>>()
                        .ok_or_else(mixed)?,
                ),
                ScalarType::Text => query.bind(
                    items
                        .iter()
                        .map(|v| v.as_str().map(str::to_string))
                        .collect::<Option<Vec<String>>>()
                        .ok_or_else(mixed)?,
                ),
                ScalarType::Timestamp => query.bind(
                    items
                        .iter()
                        .map(|v| match v {
                            FieldValue::Timestamp(t) => Some(*t),
                            _ => None,
                        })
                        .collect::<Option<Vec<DateTime<Utc>>>>()
                        .ok_or_else(mixed)?,
                ),
            }
        }
    })
}

/// Decode a Postgres row into a backend-neutral [`Row`]
fn decode_row(row: &PgRow) -> Result<Row> {
    let mut out = Row::new();
    for column in row.columns() {
        let idx = column.ordinal();
        let value: FieldValue = match column.type_info().name() {
            "BOOL" => row.try_get::<Option<bool>, _>(idx)?.into(),
            "INT2" => row.try_get::<Option<i16>, _>(idx)?.map(i64::from).into(),
            "INT4" => row.try_get::<Option<i32>, _>(idx)?.map(i64::from).into(),
            "INT8" => row.try_get::<Option<i64>, _>(idx)?.into(),
            "TEXT" | "VARCHAR" | "NAME" | "BPCHAR" | "CHAR" => {
                row.try_get::<Option<String>, _>(idx)?.into()
            }
            "TIMESTAMPTZ" => row.try_get::<Option<DateTime<Utc>>, _>(idx)?.into(),
            "TIMESTAMP" => row
                .try_get::<Option<NaiveDateTime>, _>(idx)?
                .map(|t| t.and_utc())
                .into(),
            "BOOL[]" => row.try_get::<Option<Vec<bool>>, _>(idx)?.into(),
            "INT4[]" => row
                .try_get::<Option<Vec<i32>>, _>(idx)?
                .map(|v| v.into_iter().map(i64::from).collect::<Vec<i64>>())
                .into(),
            "INT8[]" => row.try_get::<Option<Vec<i64>>, _>(idx)?.into(),
            "TEXT[]" | "VARCHAR[]" => row.try_get::<Option<Vec<String>>, _>(idx)?.into(),
            other => {
                return Err(DatabaseError::new(format!(
                    "unsupported column type {} for '{}'",
                    other,
                    column.name()
                ))
                .into())
            }
        };
        out.set(column.name(), value);
    }
    Ok(out)
}
