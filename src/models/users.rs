//! User profiles

use crate::database::cache::{Caches, TableCache};
use crate::database::schema::Table;
use crate::database::value::Row;
use crate::error::Result;
use crate::models::Model;
use chrono::{DateTime, Utc};

/// A row of `users`
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub user_id: i64,
    pub bio: Option<String>,
    pub reputation: i64,
    pub created_at: DateTime<Utc>,
}

impl Model for User {
    type Key = i64;
    const TABLE: Table = Table::Users;

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            user_id: row.decode("user_id")?,
            bio: row.decode("bio")?,
            reputation: row.decode("reputation")?,
            created_at: row.decode("created_at")?,
        })
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("user_id", self.user_id)
            .with("bio", self.bio.clone())
            .with("reputation", self.reputation)
            .with("created_at", self.created_at)
    }

    fn key(&self) -> i64 {
        self.user_id
    }

    fn cache(caches: &Caches) -> &TableCache<Self> {
        &caches.users
    }
}
