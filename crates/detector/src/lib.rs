//! # Arbitrage Detector Crate
//!
//! This crate is responsible for detecting currency arbitrage in a stream of
//! exchange-rate quotes. It keeps a time-decaying graph of the latest rates,
//! searches it for cycles whose rates compound above one, and is designed as a
//! service that communicates with other parts of the system via channels.

pub mod bellman_ford;
pub mod deduplicator;
pub mod engine;
pub mod graph;
pub mod report;
pub mod service;
pub mod traits;
pub mod transform;

#[cfg(test)]
mod test_utils;

// Re-export the main service struct for easy access.
pub use engine::{ArbitrageEngine, EngineConfig, QuoteDisposition};
pub use report::ArbitrageReport;
pub use service::{Clock, DetectorService, QuoteStream};
pub use traits::ArbitrageSink;
