use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const REFERENCE_SNAPSHOT_VERSION: u32 = 2;

/// Historical price/cost averages for one product or location.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriceStats {
    pub avg_price: f64,
    pub avg_cost: f64,
}

/// Time bucket of a composite reference key. Training stored these as
/// string-concatenated `"{id}_{period}"` keys; a typed key preserves the
/// exact lookup and fallback semantics without string assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodKey {
    Month(u32),
    Quarter(u32),
    Weekend(bool),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompositeKey {
    pub id: String,
    pub period: PeriodKey,
}

impl CompositeKey {
    pub fn new(id: &str, period: PeriodKey) -> Self {
        Self {
            id: id.to_string(),
            period,
        }
    }
}

/// Pre-computed reference statistics loaded with the model artifact.
/// Read-only at prediction time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceStatistics {
    pub products: HashMap<String, PriceStats>,
    pub locations: HashMap<String, PriceStats>,
    /// Average price per (entity, period) composite: product x month,
    /// product x quarter, location x month, product x weekend,
    /// location x weekend.
    pub composites: HashMap<CompositeKey, f64>,
}

impl ReferenceStatistics {
    pub fn product_stats(&self, product_id: &str) -> Option<PriceStats> {
        self.products.get(product_id).copied()
    }

    pub fn location_stats(&self, location: &str) -> Option<PriceStats> {
        self.locations.get(location).copied()
    }

    /// Composite average with the fallback chain used in training: a
    /// missing composite falls back to the owning entity's plain average,
    /// and a missing entity falls back to the supplied self value.
    pub fn composite_avg_price(
        &self,
        key: &CompositeKey,
        entity_avg_price: f64,
    ) -> f64 {
        self.composites
            .get(key)
            .copied()
            .filter(|value| value.is_finite())
            .unwrap_or(entity_avg_price)
    }

    /// Mean of every product's reference average price. This is the
    /// elasticity reference fallback, deliberately distinct from the
    /// self-price fallback used by the plain feature joins.
    pub fn global_average_product_price(&self) -> Option<f64> {
        let mut sum = 0.0;
        let mut count = 0usize;
        for stats in self.products.values() {
            if stats.avg_price.is_finite() {
                sum += stats.avg_price;
                count += 1;
            }
        }
        if count == 0 {
            None
        } else {
            Some(sum / count as f64)
        }
    }

    /// Elasticity reference price for one product: its reference average
    /// when present, otherwise the global average across all products.
    pub fn elasticity_reference_price(&self, product_id: &str) -> Option<f64> {
        match self.product_stats(product_id) {
            Some(stats) if stats.avg_price.is_finite() && stats.avg_price > 0.0 => {
                Some(stats.avg_price)
            }
            _ => self.global_average_product_price(),
        }
    }
}

/// On-disk form of the reference artifact, versioned the same way the
/// model snapshot is so stale artifacts fail loudly instead of skewing
/// feature joins.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReferenceSnapshot {
    pub version: u32,
    pub stats: ReferenceStatistics,
}

impl ReferenceSnapshot {
    pub fn current(stats: ReferenceStatistics) -> Self {
        Self {
            version: REFERENCE_SNAPSHOT_VERSION,
            stats,
        }
    }
}
