/// How estimated quantity is rounded before costs are derived.
///
/// `Display` is the presentation/scenario policy: elevated prices snap to
/// coarser steps. `Exact` keeps full precision so forecast series retain
/// day-to-day variation instead of collapsing to identical rounded days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityRounding {
    Display,
    Exact,
}

#[derive(Debug, Clone, Copy)]
pub struct DerivedFinancials {
    pub quantity: f64,
    pub cost: f64,
    pub profit: f64,
    pub margin_pct: f64,
}

/// Derives quantity, cost, profit and margin from adjusted revenue.
///
/// Reported revenue stays the model-adjusted value; it is never recomputed
/// as quantity x price, so rounding affects cost and profit but not
/// revenue.
pub fn derive(
    revenue: f64,
    unit_price: f64,
    unit_cost: f64,
    price_ratio: f64,
    rounding: QuantityRounding,
) -> DerivedFinancials {
    let raw_quantity = if unit_price > 0.0 {
        revenue / unit_price
    } else {
        0.0
    };

    let quantity = match rounding {
        QuantityRounding::Exact => raw_quantity,
        QuantityRounding::Display => {
            if price_ratio > 1.5 && raw_quantity >= 10.0 {
                (raw_quantity / 5.0).round() * 5.0
            } else {
                raw_quantity.round()
            }
        }
    };
    let quantity = quantity.max(0.0);

    let cost = quantity * unit_cost;
    let profit = revenue - cost;
    let margin_pct = if revenue > 0.0 {
        profit / revenue * 100.0
    } else {
        0.0
    };

    DerivedFinancials {
        quantity,
        cost,
        profit,
        margin_pct,
    }
}
