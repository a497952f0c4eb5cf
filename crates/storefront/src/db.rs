//! `SQLite` database holding the session store.
//!
//! # Tables
//!
//! - `tower_sessions` - Session records, including each visitor's cart blob
//!
//! The table is created by [`migrate`] at startup.

use std::str::FromStr;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tower_sessions_sqlx_store::SqliteStore;

const MAX_CONNECTIONS: u32 = 5;

/// Create a `SQLite` connection pool, creating the database file if needed.
///
/// Connections are never recycled, so an in-memory database
/// (`sqlite::memory:`) lives as long as the pool.
///
/// # Errors
///
/// Returns `sqlx::Error` if the URL is invalid or the database cannot be
/// opened.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<SqlitePool, sqlx::Error> {
    let url = database_url.expose_secret();
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    // Every connection to `:memory:` opens its own database.
    let max_connections = if url.contains(":memory:") {
        1
    } else {
        MAX_CONNECTIONS
    };

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
}

/// Create the session table if it does not exist.
///
/// # Errors
///
/// Returns `sqlx::Error` if the schema cannot be created.
pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    SqliteStore::new(pool.clone()).migrate().await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;
    use tower_sessions::SessionStore;
    use tower_sessions::cookie::time::{Duration as TimeDuration, OffsetDateTime};
    use tower_sessions::session::{Id, Record};
    use tower_sessions::session_store::ExpiredDeletion;

    use super::*;

    async fn memory_pool() -> SqlitePool {
        let pool = create_pool(&SecretString::from("sqlite::memory:"))
            .await
            .unwrap();
        migrate(&pool).await.unwrap();
        pool
    }

    async fn session_rows(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM tower_sessions")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    fn record(expires_in: TimeDuration) -> Record {
        Record {
            id: Id::default(),
            data: std::collections::HashMap::default(),
            expiry_date: OffsetDateTime::now_utc() + expires_in,
        }
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let pool = memory_pool().await;
        migrate(&pool).await.unwrap();
        assert_eq!(session_rows(&pool).await, 0);
    }

    #[tokio::test]
    async fn test_expired_sessions_are_deleted() {
        let pool = memory_pool().await;
        let store = SqliteStore::new(pool.clone());

        store.create(&mut record(TimeDuration::hours(-1))).await.unwrap();
        let mut live = record(TimeDuration::days(1));
        store.create(&mut live).await.unwrap();
        assert_eq!(session_rows(&pool).await, 2);

        store.delete_expired().await.unwrap();
        assert_eq!(session_rows(&pool).await, 1);
        assert!(store.load(&live.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_records_survive_a_new_store_on_the_same_database() {
        let pool = memory_pool().await;
        let mut saved = record(TimeDuration::days(1));
        SqliteStore::new(pool.clone()).create(&mut saved).await.unwrap();

        let reopened = SqliteStore::new(pool);
        let loaded = reopened.load(&saved.id).await.unwrap();
        assert_eq!(loaded.map(|r| r.id), Some(saved.id));
    }
}
