use chrono::{DateTime, Duration, Utc};
use common::types::{Currency, CurrencyPair, Quote};
use common::CommonError;
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use std::collections::HashMap;

/// Read access to a directed graph of raw conversion weights.
///
/// This is everything the cycle detector and the reporter need. Both
/// `vertices` and `edges` return fresh, sorted collections so callers can walk
/// them as many times as they like within one detection pass.
pub trait RateGraph {
    /// All currencies that are an endpoint of at least one edge, in ascending order.
    fn vertices(&self) -> Vec<Currency>;

    /// All directed edges as `(from, to, raw_weight)`, ordered lexicographically by `(from, to)`.
    fn edges(&self) -> Vec<(Currency, Currency, f64)>;

    /// The raw weight stored on the directed edge `from -> to`.
    fn weight(&self, from: Currency, to: Currency) -> Result<f64, CommonError>;
}

/// The live currency graph together with its per-pair freshness index.
///
/// Every quote installs two directed edges: `from -> to` carrying the rate and
/// `to -> from` carrying the negated rate. The negative sign is a direction
/// marker read by the log transform, it is not the reciprocal rate.
///
/// A pair has an entry in `last_quoted` exactly when both of its directed
/// edges are present in `graph`; only `upsert` and `expire_older_than` mutate
/// either structure.
#[derive(Clone, Debug, Default)]
pub struct CurrencyGraph {
    graph: DiGraphMap<Currency, f64>,
    last_quoted: HashMap<CurrencyPair, DateTime<Utc>>,
}

impl CurrencyGraph {
    pub fn new() -> Self {
        CurrencyGraph {
            graph: DiGraphMap::new(),
            last_quoted: HashMap::new(),
        }
    }

    /// Installs `from -> to = rate` and `to -> from = -rate`, replacing any
    /// previous weights, and stamps the pair with `quoted_at`.
    pub fn upsert(
        &mut self,
        from: Currency,
        to: Currency,
        rate: f64,
        quoted_at: DateTime<Utc>,
    ) -> Result<(), CommonError> {
        if !rate.is_finite() || rate == 0.0 {
            return Err(CommonError::InvalidRate(rate));
        }
        if from == to {
            return Err(CommonError::InvalidQuote(format!(
                "self-loop on {} is not allowed",
                from
            )));
        }

        self.graph.add_edge(from, to, rate);
        self.graph.add_edge(to, from, -rate);
        self.last_quoted.insert(CurrencyPair::new(from, to), quoted_at);
        Ok(())
    }

    /// Applies a decoded quote to the graph.
    pub fn apply_quote(&mut self, quote: &Quote) -> Result<(), CommonError> {
        self.upsert(quote.from, quote.to, quote.rate, quote.timestamp)
    }

    /// Removes every pair whose last quote is more than `max_age` older than
    /// `now`, returning the removed pairs in ascending order.
    ///
    /// Both directed edges go with the pair. A currency left without any edge
    /// is dropped from the vertex set as well.
    pub fn expire_older_than(
        &mut self,
        now: DateTime<Utc>,
        max_age: Duration,
    ) -> Vec<CurrencyPair> {
        let mut stale: Vec<CurrencyPair> = self
            .last_quoted
            .iter()
            .filter(|(_, quoted_at)| now.signed_duration_since(**quoted_at) > max_age)
            .map(|(pair, _)| *pair)
            .collect();
        stale.sort();

        for pair in &stale {
            self.last_quoted.remove(pair);
            // Either edge may already be gone; removal is a no-op then.
            self.graph.remove_edge(pair.first(), pair.second());
            self.graph.remove_edge(pair.second(), pair.first());
            self.remove_if_isolated(pair.first());
            self.remove_if_isolated(pair.second());
            log::info!("removing stale quote for {}", pair);
        }

        stale
    }

    /// Timestamp of the most recent quote for the unordered pair, if tracked.
    pub fn last_quoted(&self, a: Currency, b: Currency) -> Option<DateTime<Utc>> {
        self.last_quoted.get(&CurrencyPair::new(a, b)).copied()
    }

    pub fn pair_count(&self) -> usize {
        self.last_quoted.len()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    fn remove_if_isolated(&mut self, currency: Currency) {
        if !self.graph.contains_node(currency) {
            return;
        }
        let has_outgoing = self
            .graph
            .neighbors_directed(currency, Direction::Outgoing)
            .next()
            .is_some();
        let has_incoming = self
            .graph
            .neighbors_directed(currency, Direction::Incoming)
            .next()
            .is_some();
        if !has_outgoing && !has_incoming {
            self.graph.remove_node(currency);
        }
    }
}

impl RateGraph for CurrencyGraph {
    fn vertices(&self) -> Vec<Currency> {
        let mut vertices: Vec<Currency> = self.graph.nodes().collect();
        vertices.sort();
        vertices
    }

    fn edges(&self) -> Vec<(Currency, Currency, f64)> {
        let mut edges: Vec<(Currency, Currency, f64)> = self
            .graph
            .all_edges()
            .map(|(from, to, weight)| (from, to, *weight))
            .collect();
        edges.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        edges
    }

    fn weight(&self, from: Currency, to: Currency) -> Result<f64, CommonError> {
        self.graph
            .edge_weight(from, to)
            .copied()
            .ok_or_else(|| CommonError::NotFound(format!("edge {} -> {}", from, to)))
    }
}
