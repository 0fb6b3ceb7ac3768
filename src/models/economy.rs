//! Economy balances

use crate::database::cache::{Caches, TableCache};
use crate::database::schema::Table;
use crate::database::value::Row;
use crate::error::Result;
use crate::models::Model;
use chrono::{DateTime, Utc};

/// A row of `economy`
#[derive(Debug, Clone, PartialEq)]
pub struct Economy {
    pub user_id: i64,
    pub wallet: i64,
    pub bank: i64,
    pub last_daily: Option<DateTime<Utc>>,
}

impl Economy {
    /// Wallet plus bank
    pub fn total(&self) -> i64 {
        self.wallet.saturating_add(self.bank)
    }
}

impl Model for Economy {
    type Key = i64;
    const TABLE: Table = Table::Economy;

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            user_id: row.decode("user_id")?,
            wallet: row.decode("wallet")?,
            bank: row.decode("bank")?,
            last_daily: row.decode("last_daily")?,
        })
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("user_id", self.user_id)
            .with("wallet", self.wallet)
            .with("bank", self.bank)
            .with("last_daily", self.last_daily)
    }

    fn key(&self) -> i64 {
        self.user_id
    }

    fn cache(caches: &Caches) -> &TableCache<Self> {
        &caches.economy
    }
}
