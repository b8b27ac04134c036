use crate::encoders::EncoderSet;
use crate::errors::Result;
use crate::models::{Season, ValidatedRequest};
use crate::reference::{CompositeKey, PeriodKey, ReferenceStatistics};
use chrono::Datelike;
use std::collections::{BTreeMap, HashMap};
use std::f64::consts::PI;

const EPSILON: f64 = 1e-12;

/// Placeholder until per-product popularity ships with the reference
/// artifact; training used the same constant.
const POPULARITY_PLACEHOLDER: f64 = 1.0;

/// Fixed holiday calendar from training. Floating holidays are pinned to
/// fixed dates on purpose (Thanksgiving as Nov 25); the model was trained
/// against exactly this list, so correcting the calendar would shift its
/// output distribution.
const HOLIDAYS: [(u32, u32); 7] = [
    (1, 1),
    (2, 14),
    (7, 4),
    (10, 31),
    (11, 25),
    (12, 25),
    (12, 31),
];

/// Ordered numeric row matching the trained schema.
#[derive(Debug, Clone)]
pub struct FeatureVector {
    pub values: Vec<f64>,
}

/// Named features for one request, before schema ordering. The temporal
/// subset is kept separately because prediction results expose it.
#[derive(Debug, Clone)]
pub struct EngineeredFeatures {
    named: HashMap<&'static str, f64>,
    pub time_features: BTreeMap<String, f64>,
}

impl EngineeredFeatures {
    /// Materializes the vector by walking the trained schema in order.
    /// Every schema column the pipeline did not produce defaults to 0;
    /// the reordering is unconditional so insertion order can never leak
    /// into column order.
    pub fn to_schema_vector(&self, schema: &[String]) -> FeatureVector {
        let values = schema
            .iter()
            .map(|name| self.named.get(name.as_str()).copied().unwrap_or(0.0))
            .collect();
        FeatureVector { values }
    }

    #[cfg(test)]
    fn get(&self, name: &str) -> Option<f64> {
        self.named.get(name).copied()
    }
}

fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator.abs() <= EPSILON {
        0.0
    } else {
        numerator / denominator
    }
}

fn cyclical(value: f64, period: f64) -> (f64, f64) {
    let angle = 2.0 * PI * value / period;
    (angle.sin(), angle.cos())
}

pub fn is_fixed_holiday(month: u32, day: u32) -> bool {
    HOLIDAYS.contains(&(month, day))
}

pub fn is_weekend_name(weekday: &str) -> bool {
    weekday == "Saturday" || weekday == "Sunday"
}

pub fn quarter_of(month: u32) -> u32 {
    (month - 1) / 3 + 1
}

/// Reproduces the training-time feature transforms for one request.
/// Unknown product or location is fatal here; unknown weekday is not.
pub fn build_features(
    request: &ValidatedRequest,
    encoders: &EncoderSet,
    reference: &ReferenceStatistics,
) -> Result<EngineeredFeatures> {
    let mut named: HashMap<&'static str, f64> = HashMap::with_capacity(64);
    let mut time: BTreeMap<String, f64> = BTreeMap::new();

    let price = request.unit_price;
    let cost = request.unit_cost;
    let month = request.date.month();
    let day = request.date.day();

    // Categorical encodings. Product and location must be in the trained
    // vocabulary; weekday silently defaults to Wednesday.
    named.insert("Product_ID_Encoded", encoders.encode_product(&request.product_id)?);
    named.insert("Location_Encoded", encoders.encode_location(&request.location)?);
    named.insert("Weekday_Encoded", encoders.encode_weekday(&request.weekday)?);

    named.insert("Unit_Price", price);
    named.insert("Unit_Cost", cost);
    named.insert("Year", request.date.year() as f64);
    named.insert("Month", month as f64);
    named.insert("Day", day as f64);

    // Temporal features.
    let day_of_year = request.date.ordinal() as f64;
    let week_of_year = request.date.iso_week().week() as f64;
    let quarter = quarter_of(month) as f64;
    let (month_sin, month_cos) = cyclical(month as f64, 12.0);
    let (day_sin, day_cos) = cyclical(day as f64, 31.0);
    let (doy_sin, doy_cos) = cyclical(day_of_year, 366.0);
    let (week_sin, week_cos) = cyclical(week_of_year, 53.0);

    let season = Season::from_month(month);
    let is_weekend = if is_weekend_name(&request.weekday) { 1.0 } else { 0.0 };
    let is_holiday = if is_fixed_holiday(month, day) { 1.0 } else { 0.0 };
    let is_holiday_season = if month == 11 || month == 12 { 1.0 } else { 0.0 };

    let temporal: [(&'static str, f64); 18] = [
        ("Day_Of_Year", day_of_year),
        ("Week_Of_Year", week_of_year),
        ("Month_Sin", month_sin),
        ("Month_Cos", month_cos),
        ("Day_Sin", day_sin),
        ("Day_Cos", day_cos),
        ("Day_Of_Year_Sin", doy_sin),
        ("Day_Of_Year_Cos", doy_cos),
        ("Week_Sin", week_sin),
        ("Week_Cos", week_cos),
        ("Quarter", quarter),
        ("Is_Winter", if season == Season::Winter { 1.0 } else { 0.0 }),
        ("Is_Spring", if season == Season::Spring { 1.0 } else { 0.0 }),
        ("Is_Summer", if season == Season::Summer { 1.0 } else { 0.0 }),
        ("Is_Fall", if season == Season::Fall { 1.0 } else { 0.0 }),
        ("Is_Holiday_Season", is_holiday_season),
        ("Is_Weekend", is_weekend),
        ("Is_Holiday", is_holiday),
    ];
    for (name, value) in temporal {
        named.insert(name, value);
        time.insert(name.to_string(), value);
    }

    // Price features.
    named.insert("Price_To_Cost_Ratio", safe_div(price, cost));
    named.insert("Margin_Per_Unit", price - cost);
    named.insert("Margin_Pct", safe_div(price - cost, price) * 100.0);
    named.insert("Price_Squared", price * price);
    named.insert("Price_Log", price.ln_1p());

    // Reference joins. Plain product/location averages fall back to the
    // request's own price/cost; composites fall back to the owning
    // entity's plain average. The elasticity layer uses a different,
    // global-average fallback on purpose.
    let product_avg_price = reference
        .product_stats(&request.product_id)
        .map(|stats| stats.avg_price)
        .unwrap_or(price);
    let product_avg_cost = reference
        .product_stats(&request.product_id)
        .map(|stats| stats.avg_cost)
        .unwrap_or(cost);
    let location_avg_price = reference
        .location_stats(&request.location)
        .map(|stats| stats.avg_price)
        .unwrap_or(price);
    let location_avg_cost = reference
        .location_stats(&request.location)
        .map(|stats| stats.avg_cost)
        .unwrap_or(cost);

    let weekend_key = PeriodKey::Weekend(is_weekend > 0.5);
    let product_month_avg = reference.composite_avg_price(
        &CompositeKey::new(&request.product_id, PeriodKey::Month(month)),
        product_avg_price,
    );
    let product_quarter_avg = reference.composite_avg_price(
        &CompositeKey::new(&request.product_id, PeriodKey::Quarter(quarter as u32)),
        product_avg_price,
    );
    let location_month_avg = reference.composite_avg_price(
        &CompositeKey::new(&request.location, PeriodKey::Month(month)),
        location_avg_price,
    );
    let product_weekend_avg = reference.composite_avg_price(
        &CompositeKey::new(&request.product_id, weekend_key),
        product_avg_price,
    );
    let location_weekend_avg = reference.composite_avg_price(
        &CompositeKey::new(&request.location, weekend_key),
        location_avg_price,
    );

    named.insert("Product_Avg_Price", product_avg_price);
    named.insert("Product_Avg_Cost", product_avg_cost);
    named.insert("Location_Avg_Price", location_avg_price);
    named.insert("Location_Avg_Cost", location_avg_cost);
    named.insert("Product_Month_Avg_Price", product_month_avg);
    named.insert("Product_Quarter_Avg_Price", product_quarter_avg);
    named.insert("Location_Month_Avg_Price", location_month_avg);
    named.insert("Product_Weekend_Avg_Price", product_weekend_avg);
    named.insert("Location_Weekend_Avg_Price", location_weekend_avg);

    // Comparison ratios.
    named.insert("Price_vs_Product_Avg", safe_div(price, product_avg_price));
    named.insert("Price_vs_Location_Avg", safe_div(price, location_avg_price));
    named.insert(
        "Seasonal_Price_Deviation",
        safe_div(price, product_month_avg),
    );

    // Interactions.
    named.insert("Price_X_Popularity", price * POPULARITY_PLACEHOLDER);
    named.insert("Price_X_Location_Avg", price * location_avg_price);
    named.insert("Price_X_Month", price * month as f64);
    named.insert("Price_X_Quarter", price * quarter);
    named.insert("Price_X_Holiday", price * is_holiday);
    named.insert("Price_X_Weekend", price * is_weekend);

    Ok(EngineeredFeatures {
        named,
        time_features: time,
    })
}
