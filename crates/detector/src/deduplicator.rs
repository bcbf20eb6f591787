use chrono::{DateTime, Duration, Utc};
use common::Currency;
use std::collections::HashSet;

/// Suppresses re-reporting of a cycle seen within the last `ttl`.
///
/// Cycles are compared by their loop of currencies regardless of where the
/// walk entered it, so `[EUR, USD, GBP, EUR]` and `[USD, GBP, EUR, USD]` are
/// the same cycle.
pub struct CycleDeduplicator {
    seen: HashSet<Vec<Currency>>,
    last_pruned: Option<DateTime<Utc>>,
    ttl: Duration,
}

impl CycleDeduplicator {
    pub fn new(ttl: Duration) -> Self {
        Self {
            seen: HashSet::new(),
            last_pruned: None,
            ttl,
        }
    }

    /// Checks if a cycle is a duplicate. If not, it's added to the set.
    pub fn is_duplicate(&mut self, cycle: &[Currency], now: DateTime<Utc>) -> bool {
        match self.last_pruned {
            Some(pruned) if now.signed_duration_since(pruned) <= self.ttl => {}
            _ => {
                self.seen.clear();
                self.last_pruned = Some(now);
            }
        }

        !self.seen.insert(canonical_loop(cycle))
    }
}

/// The loop without its closing vertex, rotated to start at its smallest currency.
fn canonical_loop(cycle: &[Currency]) -> Vec<Currency> {
    let open = match cycle.split_last() {
        Some((last, rest)) if rest.first() == Some(last) => rest,
        _ => cycle,
    };
    let pivot = open
        .iter()
        .enumerate()
        .min_by_key(|(_, currency)| **currency)
        .map(|(index, _)| index)
        .unwrap_or(0);

    let mut rotated = open.to_vec();
    rotated.rotate_left(pivot);
    rotated
}
