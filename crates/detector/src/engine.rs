//! The arbitrage engine: one object owning the live graph, the sequencing
//! gate and the detector, driven one batch of quotes at a time.

use crate::bellman_ford::{BellmanFordDetector, DetectorConfig, DEFAULT_TOLERANCE};
use crate::deduplicator::CycleDeduplicator;
use crate::graph::CurrencyGraph;
use crate::report::{evaluate_cycle, ArbitrageReport, DEFAULT_PRINCIPAL};
use chrono::{DateTime, Duration, Utc};
use common::{CommonError, CurrencyPair, Quote};

/// Default freshness window for a quoted pair.
pub const DEFAULT_STALE_AFTER_MS: i64 = 1500;

/// Configuration for the [`ArbitrageEngine`].
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub tolerance: f64,
    /// A pair whose last quote is older than this is removed from the graph.
    pub stale_after: Duration,
    /// Starting amount for reported cycles.
    pub principal: f64,
    /// When set, a cycle already reported within this window is not reported again.
    pub dedup_window: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            stale_after: Duration::milliseconds(DEFAULT_STALE_AFTER_MS),
            principal: DEFAULT_PRINCIPAL,
            dedup_window: None,
        }
    }
}

/// Tracks the most recent accepted quote timestamp.
///
/// Quotes with the same timestamp as the latest are admitted; strictly older
/// ones are not.
#[derive(Debug, Clone, Default)]
pub struct SequenceGate {
    latest: Option<DateTime<Utc>>,
}

impl SequenceGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits `timestamp` and advances the gate, or rejects it as out of sequence.
    pub fn admit(&mut self, timestamp: DateTime<Utc>) -> bool {
        match self.latest {
            Some(latest) if timestamp < latest => false,
            _ => {
                self.latest = Some(timestamp);
                true
            }
        }
    }

    pub fn latest(&self) -> Option<DateTime<Utc>> {
        self.latest
    }
}

/// What the engine did with a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteDisposition {
    Accepted,
    OutOfSequence,
}

pub struct ArbitrageEngine {
    config: EngineConfig,
    graph: CurrencyGraph,
    gate: SequenceGate,
    detector: BellmanFordDetector,
    deduplicator: Option<CycleDeduplicator>,
}

impl ArbitrageEngine {
    pub fn new(config: EngineConfig) -> Self {
        let detector = BellmanFordDetector::new(DetectorConfig {
            tolerance: config.tolerance,
        });
        let deduplicator = config.dedup_window.map(CycleDeduplicator::new);
        Self {
            config,
            graph: CurrencyGraph::new(),
            gate: SequenceGate::new(),
            detector,
            deduplicator,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn graph(&self) -> &CurrencyGraph {
        &self.graph
    }

    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.gate.latest()
    }

    /// Applies a single quote to the graph.
    ///
    /// Invalid quotes are rejected with an error and leave the gate untouched.
    /// A quote strictly older than the latest accepted one is dropped.
    pub fn update(&mut self, quote: &Quote) -> Result<QuoteDisposition, CommonError> {
        quote.validate()?;
        if !self.gate.admit(quote.timestamp) {
            log::info!("ignoring out-of-sequence message");
            return Ok(QuoteDisposition::OutOfSequence);
        }
        self.graph.apply_quote(quote)?;
        Ok(QuoteDisposition::Accepted)
    }

    /// Removes every pair whose last quote is older than the freshness window at `now`.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Vec<CurrencyPair> {
        self.graph.expire_older_than(now, self.config.stale_after)
    }

    /// Looks for an arbitrage cycle in the current graph and evaluates it.
    pub fn detect(&self) -> Result<Option<ArbitrageReport>, CommonError> {
        match self.detector.find_arbitrage(&self.graph) {
            Some(cycle) => {
                let report = evaluate_cycle(&self.graph, &cycle.path, self.config.principal)?;
                Ok(Some(report))
            }
            None => Ok(None),
        }
    }

    /// Runs one processing cycle: apply every quote, expire against the
    /// single `now`, then detect.
    ///
    /// Invalid quotes are logged and skipped. A cycle reported within the
    /// de-duplication window is suppressed.
    pub fn process_batch(
        &mut self,
        quotes: &[Quote],
        now: DateTime<Utc>,
    ) -> Result<Option<ArbitrageReport>, CommonError> {
        for quote in quotes {
            if let Err(e) = self.update(quote) {
                log::warn!("rejecting quote {}: {}", quote, e);
            }
        }
        self.expire(now);

        let report = match self.detect()? {
            Some(report) => report,
            None => return Ok(None),
        };
        if let Some(dedup) = self.deduplicator.as_mut() {
            if dedup.is_duplicate(&report.path(), now) {
                log::debug!("suppressing repeated cycle starting at {}", report.start);
                return Ok(None);
            }
        }
        log::info!(
            "arbitrage found starting at {}: {:.4}% over {} hops",
            report.start,
            report.profit_pct(),
            report.steps.len()
        );
        Ok(Some(report))
    }
}

impl Default for ArbitrageEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}
