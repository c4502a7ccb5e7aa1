//! Corner Shop storefront library.
//!
//! Catalog, search, cart and order stores over a hosted document collection,
//! with an on-disk mirror for offline reads. The binary serves them as a
//! JSON API; the library form keeps everything testable and reusable.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod config;
pub mod debounce;
pub mod error;
pub mod live;
pub mod mirror;
pub mod notify;
pub mod orders;
pub mod remote;
pub mod routes;
pub mod seed;
pub mod state;
