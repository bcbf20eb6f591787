//! Log-space Bellman-Ford negative cycle detector.

use crate::graph::RateGraph;
use crate::transform::relaxation_weight;
use common::types::Currency;
use std::collections::{BTreeMap, HashSet};

/// Default minimum improvement for a relaxation to be applied.
pub const DEFAULT_TOLERANCE: f64 = 1e-4;

/// Configuration for the arbitrage detector.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    /// A relaxation is applied only when it improves the target's distance by
    /// strictly more than this amount. Suppresses cycles that are break-even
    /// up to floating point noise.
    pub tolerance: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

/// A simple negative cycle recovered from the predecessor map.
#[derive(Debug, Clone, PartialEq)]
pub struct NegativeCycle {
    /// The edge `(from, to)` that could still be relaxed after `|V| - 1` rounds.
    pub edge: (Currency, Currency),
    /// Vertices in travel order, starting and ending at `edge.1`.
    pub path: Vec<Currency>,
}

/// Result of one Bellman-Ford run from a single start vertex.
#[derive(Debug, Clone)]
pub struct ShortestPaths {
    pub start: Currency,
    /// Shortest log-space distance from `start`; `f64::INFINITY` when unreachable.
    pub dist: BTreeMap<Currency, f64>,
    /// Predecessor on the shortest path; `None` for `start` and unreachable vertices.
    pub prev: BTreeMap<Currency, Option<Currency>>,
    pub cycle: Option<NegativeCycle>,
}

/// Bellman-Ford detector over a [`RateGraph`].
///
/// Holds configuration only; every call works on its own `dist`/`prev`
/// maps, so one detector can be reused for any number of start vertices.
#[derive(Debug, Clone, Default)]
pub struct BellmanFordDetector {
    config: DetectorConfig,
}

impl BellmanFordDetector {
    /// Creates a new detector with the given configuration.
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Creates a new detector with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(DetectorConfig::default())
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Runs Bellman-Ford from each vertex in ascending order and returns the
    /// first negative cycle found.
    pub fn find_arbitrage<G: RateGraph + ?Sized>(&self, graph: &G) -> Option<NegativeCycle> {
        for start in graph.vertices() {
            if let Some(cycle) = self.shortest_paths(graph, start).cycle {
                log::debug!(
                    "negative cycle found from {} via edge {} -> {}",
                    start,
                    cycle.edge.0,
                    cycle.edge.1
                );
                return Some(cycle);
            }
        }
        None
    }

    /// Computes shortest log-space distances from `start` and looks for a
    /// negative cycle reachable from it.
    ///
    /// Edges are visited in the order returned by [`RateGraph::edges`]
    /// (lexicographic by `(from, to)`), so when several negative cycles
    /// coexist the one reported is always the same for the same graph.
    pub fn shortest_paths<G: RateGraph + ?Sized>(&self, graph: &G, start: Currency) -> ShortestPaths {
        let vertices = graph.vertices();
        let edges = graph.edges();

        let mut dist: BTreeMap<Currency, f64> =
            vertices.iter().map(|&v| (v, f64::INFINITY)).collect();
        let mut prev: BTreeMap<Currency, Option<Currency>> =
            vertices.iter().map(|&v| (v, None)).collect();
        dist.insert(start, 0.0);
        prev.insert(start, None);

        // |V| - 1 relaxation rounds.
        for _ in 1..vertices.len() {
            let mut relaxed_in_this_round = false;
            for &(from, to, raw) in &edges {
                if let Some(candidate) = self.relaxed_distance(&dist, from, to, raw) {
                    dist.insert(to, candidate);
                    prev.insert(to, Some(from));
                    relaxed_in_this_round = true;
                }
            }
            // Nothing moved, so later rounds and the detection pass would not either.
            if !relaxed_in_this_round {
                break;
            }
        }

        // Detection pass. An edge that still relaxes sits on, or downstream of,
        // a negative cycle. Its chain may not loop back to it, in which case we
        // keep scanning for one that does.
        let mut cycle = None;
        for &(from, to, raw) in &edges {
            if self.relaxed_distance(&dist, from, to, raw).is_none() {
                continue;
            }
            match trace_cycle(to, &prev, vertices.len()) {
                Some(path) => {
                    cycle = Some(NegativeCycle {
                        edge: (from, to),
                        path,
                    });
                    break;
                }
                None => {
                    log::debug!(
                        "edge {} -> {} still relaxes but its predecessor chain does not return to {}",
                        from,
                        to,
                        to
                    );
                }
            }
        }

        ShortestPaths {
            start,
            dist,
            prev,
            cycle,
        }
    }

    /// The new distance for `to` if relaxing `from -> to` improves it by more
    /// than the tolerance.
    fn relaxed_distance(
        &self,
        dist: &BTreeMap<Currency, f64>,
        from: Currency,
        to: Currency,
        raw: f64,
    ) -> Option<f64> {
        let source = dist.get(&from).copied().filter(|d| d.is_finite())?;
        let candidate = source + relaxation_weight(raw);
        let current = dist.get(&to).copied().unwrap_or(f64::INFINITY);
        if candidate < current - self.config.tolerance {
            Some(candidate)
        } else {
            None
        }
    }
}

/// Follows predecessors backwards from `entry` until the chain returns to it.
///
/// Returns the cycle in travel order (`entry` first and last), or `None` when
/// the chain ends or runs into a loop that does not contain `entry`. The walk
/// is capped at `vertex_count + 1` steps so a malformed predecessor map cannot
/// keep it going.
fn trace_cycle(
    entry: Currency,
    prev: &BTreeMap<Currency, Option<Currency>>,
    vertex_count: usize,
) -> Option<Vec<Currency>> {
    let mut walk = vec![entry];
    let mut visited = HashSet::from([entry]);
    let mut current = entry;

    for _ in 0..=vertex_count {
        let predecessor = prev.get(&current).copied().flatten()?;
        if predecessor == entry {
            walk.push(entry);
            walk.reverse();
            return Some(walk);
        }
        if !visited.insert(predecessor) {
            return None;
        }
        walk.push(predecessor);
        current = predecessor;
    }
    None
}
