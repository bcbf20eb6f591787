//! Conversions between raw stored edge weights and the quantities the
//! detector and reporter work with.
//!
//! A raw weight `w > 0` is a forward rate. A raw weight `w < 0` is the reverse
//! marker installed by `CurrencyGraph::upsert`: traversing it converts at
//! `1 / |w|`.

/// Log-space relaxation weight for a raw edge weight.
///
/// `-log10(w)` for a forward rate, `log10(|w|)` for a reverse marker, so the
/// weight is always `-log10(conversion_rate(w))` and a cycle whose rates
/// multiply to more than one sums to less than zero.
pub fn relaxation_weight(raw: f64) -> f64 {
    if raw > 0.0 {
        -raw.log10()
    } else {
        raw.abs().log10()
    }
}

/// Units of the target currency obtained for one unit of the source currency
/// when traversing an edge with the given raw weight.
pub fn conversion_rate(raw: f64) -> f64 {
    if raw > 0.0 {
        raw
    } else {
        1.0 / raw.abs()
    }
}
