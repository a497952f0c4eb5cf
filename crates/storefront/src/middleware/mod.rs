//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (recorded into the request span)
//! 4. Session layer (signed cookie, `SQLite` store)

pub mod request_id;
pub mod session;

pub use request_id::{request_id_middleware, request_span};
pub use session::{
    SESSION_COOKIE_NAME, SessionKeyError, create_session_layer, spawn_expired_session_cleanup,
};
