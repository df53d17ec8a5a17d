//! SQLite-backed catalog: devices, scan history, the per-device file
//! tables, payload identities, link plans, and rehome audit rows (spec §5,
//! §6).
//!
//! The catalog lives in a single local SQLite database rather than the
//! always-on Postgres service a multi-tenant web app would use: this tool
//! runs as a CLI/batch job against one filesystem tree, with no concurrent
//! writers to coordinate beyond "one write session per device" (spec §9).
#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

pub mod devices;
pub mod error;
pub mod files;
pub mod link;
pub mod payloads;
pub mod rehome;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

pub use error::{StoreError, StoreResult};
pub use rehome::RehomeRunStatus;

/// Handle to the catalog database, shared by every module in this crate.
#[derive(Clone)]
pub struct CatalogStore {
    pool: SqlitePool,
}

impl CatalogStore {
    /// Open (creating if absent) the catalog database at `database_url` and
    /// run pending migrations. `database_url` is a `sqlite://` URL, typically
    /// `sqlite:///path/to/catalog.db`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|source| StoreError::Query {
                operation: "parse_connect_options",
                source,
            })?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|source| StoreError::Query {
                operation: "connect",
                source,
            })?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Build a store directly from an already-open pool, primarily for
    /// tests that share an in-memory database across assertions.
    #[must_use]
    pub const fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Run any pending schema migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails to apply.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|source| StoreError::Migrate { source })
    }

    /// Access the underlying connection pool, for modules that need direct
    /// query access beyond what this crate exposes.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_applies_migrations_on_fresh_database() {
        let store = CatalogStore::connect("sqlite::memory:").await.unwrap();
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM devices")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(row.0, 0);
    }
}
