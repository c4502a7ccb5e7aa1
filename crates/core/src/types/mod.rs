//! Core types for Corner Shop.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod filter;
pub mod id;
pub mod order;
pub mod price;
pub mod product;
pub mod status;

pub use filter::{CategoryFilter, StatusFilter};
pub use id::*;
pub use order::{CartLine, NewOrder, Order};
pub use price::{Price, PriceError};
pub use product::{CompositionUnit, Customization, Product};
pub use status::*;
