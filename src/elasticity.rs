use crate::reference::ReferenceStatistics;
use log::debug;

/// Prices above this are outside anything the model ever saw; predicted
/// revenue is forced to zero rather than extrapolated.
pub const EXTREME_PRICE_CEILING: f64 = 100_000.0;

const DECAY_RATE_ABOVE_REFERENCE: f64 = 0.5;
const DECAY_RATE_FAR_ABOVE_REFERENCE: f64 = 1.0;
const FAR_RATIO_THRESHOLD: f64 = 3.0;

/// Adjusted revenue plus the price ratio that drove the decay; the ratio
/// is reported on prediction results.
#[derive(Debug, Clone, Copy)]
pub struct AdjustedOutput {
    pub revenue: f64,
    pub price_ratio: f64,
}

/// Post-processes raw model output with the hand-tuned elasticity decay.
///
/// Training data is sparse at price extremes, so the raw model flattens
/// there; this layer imposes explicit exponential decay once the price
/// moves above the product's reference average. Pure and deterministic;
/// output is never negative.
pub fn adjust(
    raw_log_output: f64,
    unit_price: f64,
    product_id: &str,
    reference: &ReferenceStatistics,
) -> AdjustedOutput {
    let mut revenue = raw_log_output.exp_m1().max(0.0);

    let reference_price = reference
        .elasticity_reference_price(product_id)
        .filter(|price| *price > 0.0)
        .unwrap_or(unit_price);
    let price_ratio = if reference_price > 0.0 {
        unit_price / reference_price
    } else {
        1.0
    };

    if price_ratio > 1.0 {
        revenue *= (-DECAY_RATE_ABOVE_REFERENCE * (price_ratio - 1.0)).exp();
    }
    if price_ratio > FAR_RATIO_THRESHOLD {
        // Compounds with the first decay step.
        revenue *= (-DECAY_RATE_FAR_ABOVE_REFERENCE * (price_ratio - FAR_RATIO_THRESHOLD)).exp();
    }
    if unit_price > EXTREME_PRICE_CEILING {
        debug!(
            "price {} above ceiling for product {}; forcing zero revenue",
            unit_price, product_id
        );
        revenue = 0.0;
    }

    AdjustedOutput {
        revenue: revenue.max(0.0),
        price_ratio,
    }
}
