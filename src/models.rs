use crate::errors::{PredictionError, Result};
use anyhow::anyhow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Sentinel location meaning "aggregate across every known location".
pub const ALL_LOCATIONS: &str = "All";

pub const WEEKDAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// One raw prediction request as supplied by the caller. Validation never
/// mutates this value; it produces a [`ValidatedRequest`] copy instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub unit_price: f64,
    pub unit_cost: f64,
    pub product_id: String,
    pub location: String,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub weekday: String,
}

/// A validated, normalized copy of a request. The date triple has been
/// checked against the calendar; the weekday is kept verbatim because an
/// unknown weekday is deliberately not an error (it defaults to Wednesday
/// at encoding time).
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub unit_price: f64,
    pub unit_cost: f64,
    pub product_id: String,
    pub location: String,
    pub date: NaiveDate,
    pub weekday: String,
}

impl PredictionRequest {
    pub fn validate(&self) -> Result<ValidatedRequest> {
        if !self.unit_price.is_finite() || self.unit_price < 0.0 {
            return Err(PredictionError::validation(format!(
                "unit_price must be a non-negative number (value: {})",
                self.unit_price
            )));
        }
        if !self.unit_cost.is_finite() || self.unit_cost < 0.0 {
            return Err(PredictionError::validation(format!(
                "unit_cost must be a non-negative number (value: {})",
                self.unit_cost
            )));
        }
        if self.unit_cost > self.unit_price {
            return Err(PredictionError::validation(format!(
                "unit_cost ({}) must not exceed unit_price ({})",
                self.unit_cost, self.unit_price
            )));
        }
        if self.product_id.trim().is_empty() {
            return Err(PredictionError::validation("product_id must not be empty"));
        }
        if self.location.trim().is_empty() {
            return Err(PredictionError::validation("location must not be empty"));
        }
        if !(1..=12).contains(&self.month) {
            return Err(PredictionError::validation(format!(
                "month must be in 1..=12 (value: {})",
                self.month
            )));
        }
        if !(1..=31).contains(&self.day) {
            return Err(PredictionError::validation(format!(
                "day must be in 1..=31 (value: {})",
                self.day
            )));
        }
        let date = NaiveDate::from_ymd_opt(self.year, self.month, self.day).ok_or_else(|| {
            PredictionError::validation(format!(
                "{}-{:02}-{:02} is not a calendar date",
                self.year, self.month, self.day
            ))
        })?;

        Ok(ValidatedRequest {
            unit_price: self.unit_price,
            unit_cost: self.unit_cost,
            product_id: self.product_id.trim().to_string(),
            location: self.location.trim().to_string(),
            date,
            weekday: self.weekday.trim().to_string(),
        })
    }

    /// Same product and date, different location. Used by the fan-out paths.
    pub fn with_location(&self, location: &str) -> PredictionRequest {
        PredictionRequest {
            location: location.to_string(),
            ..self.clone()
        }
    }

    pub fn with_price_factor(&self, factor: f64) -> PredictionRequest {
        PredictionRequest {
            unit_price: self.unit_price * factor,
            ..self.clone()
        }
    }

    /// Same product and location on a different calendar day. Used by the
    /// forecaster when expanding a template request across a date range.
    pub fn on_date(&self, date: NaiveDate) -> PredictionRequest {
        use chrono::Datelike;
        PredictionRequest {
            year: date.year(),
            month: date.month(),
            day: date.day(),
            weekday: weekday_name(date).to_string(),
            ..self.clone()
        }
    }

    pub fn is_all_locations(&self) -> bool {
        self.location.trim() == ALL_LOCATIONS
    }
}

pub fn weekday_name(date: NaiveDate) -> &'static str {
    use chrono::Datelike;
    WEEKDAY_NAMES[date.weekday().num_days_from_monday() as usize]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

impl Season {
    pub fn from_month(month: u32) -> Season {
        match month {
            12 | 1 | 2 => Season::Winter,
            3 | 4 | 5 => Season::Spring,
            6 | 7 | 8 => Season::Summer,
            _ => Season::Fall,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Winter => "Winter",
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Fall => "Fall",
        }
    }
}

/// Forecast bucket width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    pub fn label(self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        }
    }
}

impl FromStr for Frequency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" | "d" => Ok(Frequency::Daily),
            "weekly" | "w" => Ok(Frequency::Weekly),
            "monthly" | "m" => Ok(Frequency::Monthly),
            other => Err(anyhow!(
                "Frequency must be daily, weekly or monthly (value: {})",
                other
            )),
        }
    }
}

/// Objective for the price optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizationMetric {
    Revenue,
    Profit,
}

impl OptimizationMetric {
    pub fn label(self) -> &'static str {
        match self {
            OptimizationMetric::Revenue => "revenue",
            OptimizationMetric::Profit => "profit",
        }
    }
}

impl FromStr for OptimizationMetric {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "revenue" => Ok(OptimizationMetric::Revenue),
            "profit" => Ok(OptimizationMetric::Profit),
            other => Err(anyhow!(
                "Optimization metric must be revenue or profit (value: {})",
                other
            )),
        }
    }
}

/// Final per-request prediction, shaped for external serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    pub predicted_revenue: f64,
    pub estimated_quantity: f64,
    pub total_cost: f64,
    pub profit: f64,
    pub profit_margin_pct: f64,
    pub price_ratio: f64,
    pub season: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_count: Option<usize>,
    /// Raw temporal features that fed the model, keyed by feature name.
    pub time_features: BTreeMap<String, f64>,
}

/// Daily contribution retained inside a forecast period.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyContribution {
    pub date: NaiveDate,
    pub revenue: f64,
    pub quantity: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastPeriod {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub revenue: f64,
    pub quantity: f64,
    pub cost: f64,
    pub profit: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_breakdown: Option<Vec<DailyContribution>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceBounds {
    pub level: f64,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastSummary {
    pub total_revenue: f64,
    pub total_quantity: f64,
    pub total_profit: f64,
    pub avg_revenue_per_period: f64,
    pub avg_quantity_per_period: f64,
    pub period_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastSeries {
    pub frequency: Frequency,
    pub periods: Vec<ForecastPeriod>,
    pub summary: ForecastSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<ConfidenceBounds>,
}

/// One point on the elasticity curve produced by the scenario simulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioPoint {
    pub price_factor: f64,
    pub unit_price: f64,
    pub result: PredictionResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationOutcome {
    pub metric: OptimizationMetric,
    pub optimal_price: f64,
    pub optimal_factor: f64,
    pub price_change_pct: f64,
    pub improvement_pct: f64,
    pub baseline: PredictionResult,
    pub best: PredictionResult,
    pub scenarios: Vec<ScenarioPoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_request() -> PredictionRequest {
        PredictionRequest {
            unit_price: 100.0,
            unit_cost: 50.0,
            product_id: "1".to_string(),
            location: "North".to_string(),
            year: 2023,
            month: 6,
            day: 15,
            weekday: "Friday".to_string(),
        }
    }

    #[test]
    fn validate_accepts_well_formed_request() {
        let validated = base_request().validate().expect("request should validate");
        assert_eq!(
            validated.date,
            NaiveDate::from_ymd_opt(2023, 6, 15).unwrap()
        );
        assert_eq!(validated.product_id, "1");
    }

    #[test]
    fn validate_rejects_cost_above_price() {
        let mut request = base_request();
        request.unit_cost = 150.0;
        assert!(request.validate().is_err());
    }

    #[test]
    fn validate_rejects_impossible_calendar_date() {
        let mut request = base_request();
        request.month = 2;
        request.day = 30;
        assert!(request.validate().is_err());
    }

    #[test]
    fn validate_keeps_unknown_weekday() {
        // Unknown weekday names are not a validation failure; they default
        // to Wednesday at encoding time.
        let mut request = base_request();
        request.weekday = "Friyay".to_string();
        assert!(request.validate().is_ok());
    }

    #[test]
    fn on_date_rewrites_the_calendar_fields() {
        let shifted = base_request().on_date(NaiveDate::from_ymd_opt(2023, 12, 25).unwrap());
        assert_eq!(shifted.month, 12);
        assert_eq!(shifted.day, 25);
        assert_eq!(shifted.weekday, "Monday");
        assert_eq!(shifted.unit_price, 100.0);
    }

    #[test]
    fn season_buckets_are_fixed() {
        assert_eq!(Season::from_month(12), Season::Winter);
        assert_eq!(Season::from_month(2), Season::Winter);
        assert_eq!(Season::from_month(5), Season::Spring);
        assert_eq!(Season::from_month(8), Season::Summer);
        assert_eq!(Season::from_month(11), Season::Fall);
    }
}
