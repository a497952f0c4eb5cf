//! Cartkeeper Storefront library.
//!
//! A session-backed shopping cart for a static storefront. Product pages
//! post to `/cart/add`; the cart page and its HTMX fragments are rendered
//! server-side from the cart stored in the visitor's session.
//!
//! This crate provides the storefront functionality as a library,
//! allowing it to be tested and reused.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod storage;

use axum::Router;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::middleware::SessionKeyError;
use crate::state::AppState;

/// Build the storefront router with its middleware stack.
///
/// Cart routes are matched first; any other path is served from the
/// configured static directory.
///
/// # Errors
///
/// Returns an error if the session secret cannot be turned into a cookie
/// signing key.
pub fn app(state: AppState) -> Result<Router, SessionKeyError> {
    let session_layer = middleware::create_session_layer(state.pool(), state.config())?;
    let static_files = ServeDir::new(&state.config().static_dir);

    Ok(Router::new()
        .merge(routes::routes())
        .fallback_service(static_files)
        .layer(session_layer)
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(middleware::request_span::<axum::body::Body>),
        )
        .with_state(state))
}
