//! Compounding a principal around a detected cycle.

use crate::graph::RateGraph;
use crate::transform::conversion_rate;
use common::{CommonError, Currency};
use std::fmt;

/// Amount of the first currency a reported cycle starts with.
pub const DEFAULT_PRINCIPAL: f64 = 100.0;

/// One hop of a cycle: `from` is sold for `to` at `rate`, leaving `amount` of `to`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionStep {
    pub from: Currency,
    pub to: Currency,
    pub rate: f64,
    pub amount: f64,
}

/// The value of a principal carried once around a cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ArbitrageReport {
    pub start: Currency,
    pub principal: f64,
    pub steps: Vec<ConversionStep>,
}

impl ArbitrageReport {
    /// Amount held after the last conversion.
    pub fn final_amount(&self) -> f64 {
        self.steps
            .last()
            .map(|step| step.amount)
            .unwrap_or(self.principal)
    }

    /// The cycle in travel order, start currency first and last.
    pub fn path(&self) -> Vec<Currency> {
        std::iter::once(self.start)
            .chain(self.steps.iter().map(|step| step.to))
            .collect()
    }

    /// Gain over the principal, in percent.
    pub fn profit_pct(&self) -> f64 {
        (self.final_amount() / self.principal - 1.0) * 100.0
    }

    pub fn is_profitable(&self) -> bool {
        self.final_amount() > self.principal
    }
}

impl fmt::Display for ArbitrageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ARBITRAGE:")?;
        writeln!(f, "\tstart with {} {}", self.start, self.principal)?;
        for step in &self.steps {
            writeln!(
                f,
                "\t{} for {} at {} --> {} {}",
                step.from, step.to, step.rate, step.to, step.amount
            )?;
        }
        Ok(())
    }
}

/// Carries `principal` units of `path[0]` around `path`, converting at each
/// hop with the rate read from `graph`.
///
/// `path` must be closed (first equals last) and have at least one
/// intermediate currency. A hop with no edge in `graph` fails the whole
/// evaluation with [`CommonError::NotFound`].
pub fn evaluate_cycle<G: RateGraph + ?Sized>(
    graph: &G,
    path: &[Currency],
    principal: f64,
) -> Result<ArbitrageReport, CommonError> {
    let (start, end) = match (path.first(), path.last()) {
        (Some(&start), Some(&end)) if path.len() >= 3 => (start, end),
        _ => {
            return Err(CommonError::InvalidCycle(format!(
                "expected at least 3 currencies, got {}",
                path.len()
            )))
        }
    };
    if start != end {
        return Err(CommonError::InvalidCycle(format!(
            "cycle starts at {} but ends at {}",
            start, end
        )));
    }

    let mut amount = principal;
    let mut steps = Vec::with_capacity(path.len() - 1);
    for hop in path.windows(2) {
        let (from, to) = (hop[0], hop[1]);
        let rate = conversion_rate(graph.weight(from, to)?);
        amount *= rate;
        steps.push(ConversionStep {
            from,
            to,
            rate,
            amount,
        });
    }

    Ok(ArbitrageReport {
        start,
        principal,
        steps,
    })
}
