//! Session middleware configuration.
//!
//! Each visitor gets a signed session cookie; the session holds the cart.
//! Sessions are stored in `SQLite`, so carts survive a restart, and expired
//! records are swept by a background task.

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tower_sessions::cookie::Key;
use tower_sessions::service::SignedCookie;
use tower_sessions::session_store::{self, ExpiredDeletion};
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::SqliteStore;

use crate::config::StorefrontConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "cart_session";

/// Session expiry time in seconds (30 days).
const SESSION_EXPIRY_SECONDS: i64 = 30 * 24 * 60 * 60;

/// How often expired sessions are deleted.
const EXPIRED_SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Error building the session layer.
#[derive(Debug, thiserror::Error)]
#[error("session secret is not usable as a signing key: {0}")]
pub struct SessionKeyError(String);

/// Create the session layer with a `SQLite` store.
///
/// The `tower_sessions` table must already exist (see [`crate::db::migrate`]).
///
/// # Errors
///
/// Returns an error if the configured secret is too short to derive a
/// cookie signing key.
pub fn create_session_layer(
    pool: &SqlitePool,
    config: &StorefrontConfig,
) -> Result<SessionManagerLayer<SqliteStore, SignedCookie>, SessionKeyError> {
    let key = Key::try_from(config.session_secret.expose_secret().as_bytes())
        .map_err(|e| SessionKeyError(e.to_string()))?;

    Ok(SessionManagerLayer::new(SqliteStore::new(pool.clone()))
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.secure_cookies())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
        .with_signed(key))
}

/// Spawn the task that periodically deletes expired sessions.
///
/// The task runs until the runtime shuts down or a sweep fails.
pub fn spawn_expired_session_cleanup(
    pool: &SqlitePool,
) -> JoinHandle<session_store::Result<()>> {
    let store = SqliteStore::new(pool.clone());
    tokio::task::spawn(store.continuously_delete_expired(EXPIRED_SESSION_SWEEP_INTERVAL))
}
