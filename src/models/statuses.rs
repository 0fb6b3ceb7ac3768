//! User statuses

use crate::database::cache::{Caches, TableCache};
use crate::database::schema::Table;
use crate::database::value::Row;
use crate::error::Result;
use crate::models::Model;
use chrono::{DateTime, Utc};

/// A row of `statuses`
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    pub user_id: i64,
    pub status: String,
    pub message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Model for Status {
    type Key = i64;
    const TABLE: Table = Table::Statuses;

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            user_id: row.decode("user_id")?,
            status: row.decode("status")?,
            message: row.decode("message")?,
            updated_at: row.decode("updated_at")?,
        })
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("user_id", self.user_id)
            .with("status", self.status.clone())
            .with("message", self.message.clone())
            .with("updated_at", self.updated_at)
    }

    fn key(&self) -> i64 {
        self.user_id
    }

    fn cache(caches: &Caches) -> &TableCache<Self> {
        &caches.statuses
    }
}
