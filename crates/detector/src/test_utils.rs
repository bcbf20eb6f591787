//! Test helpers shared by the detector's unit tests.

use crate::graph::RateGraph;
use common::{CommonError, Currency};
use std::collections::BTreeMap;

pub fn cur(code: &str) -> Currency {
    code.parse().unwrap()
}

/// Directed graph of raw weights without the paired reverse edges that
/// `CurrencyGraph::upsert` installs.
#[derive(Default)]
pub struct RawGraph {
    edges: BTreeMap<(Currency, Currency), f64>,
}

impl RawGraph {
    pub fn with_edges(edges: &[(&str, &str, f64)]) -> Self {
        let mut graph = RawGraph::default();
        for &(from, to, weight) in edges {
            graph.insert(from, to, weight);
        }
        graph
    }

    pub fn insert(&mut self, from: &str, to: &str, weight: f64) {
        self.edges.insert((cur(from), cur(to)), weight);
    }
}

impl RateGraph for RawGraph {
    fn vertices(&self) -> Vec<Currency> {
        let mut vertices: Vec<Currency> = self
            .edges
            .keys()
            .flat_map(|&(from, to)| [from, to])
            .collect();
        vertices.sort();
        vertices.dedup();
        vertices
    }

    fn edges(&self) -> Vec<(Currency, Currency, f64)> {
        self.edges
            .iter()
            .map(|(&(from, to), &weight)| (from, to, weight))
            .collect()
    }

    fn weight(&self, from: Currency, to: Currency) -> Result<f64, CommonError> {
        self.edges
            .get(&(from, to))
            .copied()
            .ok_or_else(|| CommonError::NotFound(format!("edge {} -> {}", from, to)))
    }
}
