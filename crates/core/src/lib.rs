//! Corner Shop Core - Shared domain types.
//!
//! This crate provides the types shared by every Corner Shop component:
//! - `storefront` - Catalog, cart and order stores plus the JSON API
//! - `cli` - Command-line tools for seeding and mirror inspection
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no remote access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, prices, statuses, products, cart lines and orders

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
