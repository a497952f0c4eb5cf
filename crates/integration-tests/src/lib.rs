//! Integration tests for Cartkeeper.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cartkeeper-integration-tests
//! ```
//!
//! Tests drive the full storefront router in-process with
//! `tower::ServiceExt::oneshot`. [`TestClient`] plays the role of one
//! browser: it keeps the session cookie the server hands out and sends it
//! back on every request.

use std::path::PathBuf;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use cartkeeper_storefront::config::{SentryConfig, StorefrontConfig};
use cartkeeper_storefront::db;
use cartkeeper_storefront::state::AppState;
use secrecy::SecretString;
use sqlx::SqlitePool;
use tower::ServiceExt;

/// High-entropy secret long enough for a cookie signing key.
pub const TEST_SESSION_SECRET: &str =
    "q8Vz2LmN4rT7wXy1Kp3Hd6Jf9Sb0Gc5Ae8UiOo2Rt4Yu6Pl1Mk3Nj5Bh7Vg9Cf0Dx";

/// In-memory session database; each call opens a separate one.
pub const TEST_DATABASE_URL: &str = "sqlite::memory:";

/// Configuration pointing at the storefront crate's bundled static pages.
///
/// # Panics
///
/// Panics if the hard-coded addresses fail to parse.
#[must_use]
#[allow(clippy::expect_used)]
pub fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        host: "127.0.0.1".parse().expect("valid host"),
        port: 0,
        base_url: "http://localhost:3000".parse().expect("valid url"),
        store_name: "Test Store".to_string(),
        static_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../storefront/static"),
        session_secret: SecretString::from(TEST_SESSION_SECRET),
        database_url: SecretString::from(TEST_DATABASE_URL),
        sentry: SentryConfig::default(),
    }
}

/// Open a fresh, migrated session database.
///
/// # Panics
///
/// Panics if the in-memory database cannot be opened.
#[allow(clippy::expect_used)]
pub async fn test_pool() -> SqlitePool {
    let pool = db::create_pool(&SecretString::from(TEST_DATABASE_URL))
        .await
        .expect("in-memory database opens");
    db::migrate(&pool).await.expect("session table is created");
    pool
}

/// Build a storefront router over an existing session database.
///
/// Two routers on the same pool behave like one server before and after a
/// restart.
///
/// # Panics
///
/// Panics if the session layer cannot be built from the test secret.
#[must_use]
#[allow(clippy::expect_used)]
pub fn router_on(pool: SqlitePool) -> Router {
    cartkeeper_storefront::app(AppState::new(test_config(), pool)).expect("router builds")
}

/// Build a fresh storefront router with its own session database.
pub async fn test_router() -> Router {
    router_on(test_pool().await)
}

/// A response with its body collected as text.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    /// Value of a response header as a string, if present.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// One visitor talking to a storefront router.
#[derive(Clone)]
pub struct TestClient {
    router: Router,
    cookie: Option<String>,
}

impl TestClient {
    /// A visitor on a brand new storefront.
    pub async fn new() -> Self {
        Self::on(test_router().await)
    }

    /// A visitor with no session on an existing storefront.
    #[must_use]
    pub const fn on(router: Router) -> Self {
        Self {
            router,
            cookie: None,
        }
    }

    /// The same visitor, keeping their session cookie, talking to `router`.
    #[must_use]
    pub fn reconnect(&self, router: Router) -> Self {
        Self {
            router,
            cookie: self.cookie.clone(),
        }
    }

    /// Send a GET request.
    pub async fn get(&mut self, uri: &str) -> TestResponse {
        self.send(Method::GET, uri, None).await
    }

    /// Send a POST with an already URL-encoded form body.
    pub async fn post_form(&mut self, uri: &str, form: &str) -> TestResponse {
        self.send(Method::POST, uri, Some(form.to_owned())).await
    }

    /// Add a product through the add-to-cart endpoint.
    pub async fn add(&mut self, id: &str, name: &str, price: &str) -> TestResponse {
        let form = format!("id={id}&name={name}&price={price}&image=%2Fimages%2F{id}.jpg");
        self.post_form("/cart/add", &form).await
    }

    #[allow(clippy::expect_used)]
    async fn send(&mut self, method: Method, uri: &str, form: Option<String>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let body = match form {
            Some(form) => {
                builder = builder.header(
                    header::CONTENT_TYPE,
                    "application/x-www-form-urlencoded",
                );
                Body::from(form)
            }
            None => Body::empty(),
        };
        let request = builder.body(body).expect("valid request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        if let Some(pair) = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|set_cookie| set_cookie.split(';').next())
        {
            self.cookie = Some(pair.trim().to_owned());
        }

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body collects");

        TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }
}
