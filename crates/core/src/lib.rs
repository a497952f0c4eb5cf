//! Cartkeeper Core - Shared cart domain types.
//!
//! This crate provides the types used by the Cartkeeper storefront:
//! - `storefront` - Cart page, cart fragments and the add-to-cart endpoint
//! - `integration-tests` - End-to-end router tests
//!
//! # Architecture
//!
//! The core crate contains only types and pure operations - no I/O, no
//! session access, no HTTP. Every cart mutation is a plain method on
//! [`Cart`]; persisting the result is the caller's job.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for product IDs, quantities and prices
//! - [`cart`] - The cart model and its operations

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod types;

pub use cart::{Cart, CartError, CartItem, NewCartItem, QuantityAction};
pub use types::*;
