//! Durable state: accounts, rooms and message history in SQLite.
//!
//! Everything here is a thin wrapper over single SQL statements. Operations
//! that must be atomic (filling slot B) are expressed as one conditional
//! statement rather than a read followed by a write.

mod accounts;
mod messages;
mod rooms;

pub use accounts::Account;

use std::str::FromStr;

use sqlx::{sqlite::{SqliteConnectOptions, SqlitePoolOptions}, SqlitePool};
use tracing::info;

use crate::db::SCHEMA;

#[derive(Clone)]
pub struct Store {
    db_pool: SqlitePool,
}

impl Store {
    pub async fn connect(database_url: &str, max_connections: u32) -> sqlx::Result<Store> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let db_pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let store = Store { db_pool };
        store.init_schema().await?;
        info!(database_url, "store ready");
        Ok(store)
    }

    /// A private in-memory database, kept alive on a single pooled connection.
    pub async fn open_in_memory() -> sqlx::Result<Store> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let db_pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Store { db_pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db_pool
    }

    async fn init_schema(&self) -> sqlx::Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.db_pool).await?;
        Ok(())
    }
}
