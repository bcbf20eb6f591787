//! # fx-arb Common Crate
//!
//! This crate provides the currency, quote and error types shared across the
//! `fx-arb` workspace.

/// Module for common error types.
pub mod errors;

/// Module for common data structures and types.
pub mod types;

// Re-export key items for easier access.
pub use errors::CommonError;
pub use types::{Currency, CurrencyPair, Quote};
