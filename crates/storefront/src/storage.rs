//! Cart persistence.
//!
//! The cart lives as one JSON blob under [`CART_KEY`] in a per-visitor
//! key-value store. In production that store is the visitor's session; tests
//! and embedders can use [`MemoryStorage`].
//!
//! [`CartStore`] is the only way the rest of the crate touches that blob. It
//! never surfaces storage failures to handlers: an unreadable cart loads as
//! empty and a failed write is logged and dropped.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use cartkeeper_core::Cart;
use thiserror::Error;
use tower_sessions::Session;

/// Key the serialized cart is stored under.
pub const CART_KEY: &str = "cart";

/// Errors from the underlying key-value store or the cart encoding.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("session store error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("cart encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// A string key-value store scoped to one visitor.
pub trait CartStorage: Send + Sync {
    /// Read the value for `key`, `None` if absent.
    fn get_item(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, StorageError>> + Send;

    /// Write `value` under `key`, replacing any previous value.
    fn set_item(
        &self,
        key: &str,
        value: String,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Delete `key`. Deleting an absent key is not an error.
    fn remove_item(&self, key: &str) -> impl Future<Output = Result<(), StorageError>> + Send;
}

impl CartStorage for Session {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.get::<String>(key).await?)
    }

    async fn set_item(&self, key: &str, value: String) -> Result<(), StorageError> {
        Ok(self.insert(key, value).await?)
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.remove_value(key).await?;
        Ok(())
    }
}

/// In-process storage backed by a shared map.
///
/// Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entries<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, String>) -> T,
    ) -> Result<T, StorageError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        Ok(f(&mut entries))
    }
}

impl CartStorage for MemoryStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.with_entries(|entries| entries.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.with_entries(|entries| {
            entries.insert(key.to_owned(), value);
        })
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.with_entries(|entries| {
            entries.remove(key);
        })
    }
}

/// Loads and persists the cart for one visitor.
#[derive(Debug, Clone)]
pub struct CartStore<S> {
    storage: S,
}

impl<S: CartStorage> CartStore<S> {
    pub const fn new(storage: S) -> Self {
        Self { storage }
    }

    /// The underlying storage.
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Load the cart, treating any failure as an empty cart.
    pub async fn load(&self) -> Cart {
        match self.try_load().await {
            Ok(cart) => cart,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read cart, using empty cart");
                Cart::new()
            }
        }
    }

    /// Load the cart, surfacing read and decode errors.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the store cannot be read or the stored
    /// value is not a valid cart.
    pub async fn try_load(&self) -> Result<Cart, StorageError> {
        match self.storage.get_item(CART_KEY).await? {
            Some(blob) => Ok(serde_json::from_str(&blob)?),
            None => Ok(Cart::new()),
        }
    }

    /// Persist the cart. Failures are logged and otherwise ignored.
    pub async fn save(&self, cart: &Cart) {
        if let Err(e) = self.try_save(cart).await {
            tracing::error!(error = %e, items = cart.len(), "Failed to save cart");
        }
    }

    /// Persist the cart, surfacing errors.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the cart cannot be encoded or written.
    pub async fn try_save(&self, cart: &Cart) -> Result<(), StorageError> {
        let blob = serde_json::to_string(cart)?;
        self.storage.set_item(CART_KEY, blob).await
    }

    /// Delete the stored cart entirely. Failures are logged.
    pub async fn clear(&self) {
        if let Err(e) = self.storage.remove_item(CART_KEY).await {
            tracing::error!(error = %e, "Failed to clear cart");
        }
    }

    /// Load, apply `f`, and persist: one read-modify-write cycle.
    ///
    /// Returns the cart as saved along with `f`'s result.
    pub async fn update<T>(&self, f: impl FnOnce(&mut Cart) -> T) -> (Cart, T) {
        let mut cart = self.load().await;
        let out = f(&mut cart);
        self.save(&cart).await;
        (cart, out)
    }

    /// Like [`CartStore::update`] for a fallible operation.
    ///
    /// Nothing is written when `f` fails.
    ///
    /// # Errors
    ///
    /// Returns the error from `f`.
    pub async fn try_update<T, E>(
        &self,
        f: impl FnOnce(&mut Cart) -> Result<T, E>,
    ) -> Result<(Cart, T), E> {
        let mut cart = self.load().await;
        let out = f(&mut cart)?;
        self.save(&cart).await;
        Ok((cart, out))
    }
}
