//! Badges and their holders

use crate::database::cache::{Caches, TableCache};
use crate::database::schema::Table;
use crate::database::value::Row;
use crate::error::Result;
use crate::models::Model;

/// A row of `badges`, keyed by badge name
#[derive(Debug, Clone, PartialEq)]
pub struct Badge {
    pub name: String,
    pub description: Option<String>,
    /// Holder user ids; mutated only through array append/remove
    pub users: Vec<i64>,
}

impl Badge {
    /// Whether a user holds this badge in this snapshot
    pub fn has(&self, user_id: i64) -> bool {
        self.users.contains(&user_id)
    }
}

impl Model for Badge {
    type Key = String;
    const TABLE: Table = Table::Badges;

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            name: row.decode("name")?,
            description: row.decode("description")?,
            users: row.decode("users")?,
        })
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("name", self.name.clone())
            .with("description", self.description.clone())
            .with("users", self.users.clone())
    }

    fn key(&self) -> String {
        self.name.clone()
    }

    fn cache(caches: &Caches) -> &TableCache<Self> {
        &caches.badges
    }
}
