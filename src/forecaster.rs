use crate::errors::{PredictionError, Result};
use crate::models::{
    ConfidenceBounds, DailyContribution, ForecastPeriod, ForecastSeries, ForecastSummary,
    Frequency, PredictionRequest,
};
use crate::predictor::Predictor;
use crate::quantity::QuantityRounding;
use chrono::{Datelike, Duration, NaiveDate};
use indicatif::ProgressBar;
use log::warn;
use statrs::distribution::{ContinuousCDF, Normal};

/// Relative sigma used when a series has a single period and no spread to
/// measure.
const SINGLE_PERIOD_SIGMA_RATIO: f64 = 0.1;

/// Multi-period sales forecaster over a prediction template. The template
/// request supplies product, location and prices; the forecaster rewrites
/// its calendar fields per day.
pub struct Forecaster<'a> {
    predictor: &'a Predictor,
}

impl<'a> Forecaster<'a> {
    pub fn new(predictor: &'a Predictor) -> Self {
        Self { predictor }
    }

    /// Forecasts the inclusive [start, end] range at the given frequency.
    /// Failed periods are skipped and logged; an entirely failed range is
    /// `EmptyForecast`. Daily contributions are retained per period.
    pub fn forecast(
        &self,
        template: &PredictionRequest,
        start: NaiveDate,
        end: NaiveDate,
        frequency: Frequency,
        confidence_level: f64,
    ) -> Result<ForecastSeries> {
        self.forecast_with_progress(template, start, end, frequency, confidence_level, None)
    }

    /// Same as [`Self::forecast`], ticking the supplied bar once per
    /// period. Operational callers own the bar; embedders and tests get
    /// none.
    pub fn forecast_with_progress(
        &self,
        template: &PredictionRequest,
        start: NaiveDate,
        end: NaiveDate,
        frequency: Frequency,
        confidence_level: f64,
        progress: Option<&ProgressBar>,
    ) -> Result<ForecastSeries> {
        if end < start {
            return Err(PredictionError::validation(format!(
                "end date {end} precedes start date {start}"
            )));
        }
        if confidence_level <= 0.0 || confidence_level >= 1.0 {
            return Err(PredictionError::validation(format!(
                "confidence level must be in (0, 1) (value: {confidence_level})"
            )));
        }

        let spans = enumerate_periods(start, end, frequency);
        if let Some(pb) = progress {
            pb.set_length(spans.len() as u64);
        }

        let mut periods = Vec::new();
        for (period_start, period_end) in spans {
            match self.forecast_period(template, period_start, period_end) {
                Ok(period) => periods.push(period),
                Err(err) => {
                    warn!("Skipping forecast period starting {period_start}: {err}");
                }
            }
            if let Some(pb) = progress {
                pb.inc(1);
            }
        }
        if let Some(pb) = progress {
            pb.finish_and_clear();
        }
        if periods.is_empty() {
            return Err(PredictionError::EmptyForecast);
        }

        let revenues: Vec<f64> = periods.iter().map(|p| p.revenue).collect();
        let confidence = confidence_bounds(&revenues, confidence_level);
        let summary = summarize(&periods);

        Ok(ForecastSeries {
            frequency,
            periods,
            summary,
            confidence: Some(confidence),
        })
    }

    /// Predicts every day of one period in a single batch call and sums
    /// the daily contributions. The batch path also bounds the latency of
    /// "All"-location templates: one matrix instead of days x locations
    /// single calls.
    fn forecast_period(
        &self,
        template: &PredictionRequest,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<ForecastPeriod> {
        let days: Vec<NaiveDate> = iter_days(period_start, period_end).collect();
        let day_requests: Vec<PredictionRequest> =
            days.iter().map(|day| template.on_date(*day)).collect();

        // Full precision here: rounding would erase the day-to-day
        // variation the breakdown exists to show.
        let batch = self
            .predictor
            .predict_batch(&day_requests, QuantityRounding::Exact)?;
        if batch.is_empty() {
            return Err(PredictionError::EmptyForecast);
        }

        let mut revenue = 0.0;
        let mut quantity = 0.0;
        let mut cost = 0.0;
        let mut profit = 0.0;
        let mut breakdown = Vec::with_capacity(batch.len());
        for entry in &batch {
            let result = &entry.result;
            revenue += result.predicted_revenue;
            quantity += result.estimated_quantity;
            cost += result.total_cost;
            profit += result.profit;
            breakdown.push(DailyContribution {
                date: days[entry.index],
                revenue: result.predicted_revenue,
                quantity: result.estimated_quantity,
                profit: result.profit,
            });
        }

        Ok(ForecastPeriod {
            period_start,
            period_end,
            revenue,
            quantity,
            cost,
            profit,
            daily_breakdown: Some(breakdown),
        })
    }
}

/// Expands [start, end] into period boundaries. Daily buckets are single
/// days; weekly buckets anchor at `start` (not normalized to Monday) and
/// advance by 7 days; monthly buckets break at first-of-month boundaries,
/// clipped to the requested range at both edges.
pub fn enumerate_periods(
    start: NaiveDate,
    end: NaiveDate,
    frequency: Frequency,
) -> Vec<(NaiveDate, NaiveDate)> {
    let mut periods = Vec::new();
    match frequency {
        Frequency::Daily => {
            for day in iter_days(start, end) {
                periods.push((day, day));
            }
        }
        Frequency::Weekly => {
            let mut cursor = start;
            while cursor <= end {
                let period_end = (cursor + Duration::days(6)).min(end);
                periods.push((cursor, period_end));
                cursor += Duration::days(7);
            }
        }
        Frequency::Monthly => {
            let mut cursor = start;
            while cursor <= end {
                let month_end = last_day_of_month(cursor);
                periods.push((cursor, month_end.min(end)));
                cursor = match first_day_of_next_month(cursor) {
                    Some(next) => next,
                    None => break,
                };
            }
        }
    }
    periods
}

fn iter_days(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |day| *day <= end)
}

fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    match first_day_of_next_month(date) {
        Some(next) => next - Duration::days(1),
        None => NaiveDate::MAX,
    }
}

fn first_day_of_next_month(date: NaiveDate) -> Option<NaiveDate> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Bounds = point estimate +/- z * sigma, where sigma is the sample
/// standard deviation of the realized series (or 10% of the single value
/// for a length-1 series). Lower bounds never go below zero.
fn confidence_bounds(revenues: &[f64], level: f64) -> ConfidenceBounds {
    let sigma = if revenues.len() < 2 {
        revenues.first().copied().unwrap_or(0.0).abs() * SINGLE_PERIOD_SIGMA_RATIO
    } else {
        sample_std_dev(revenues)
    };
    let z = normal_z_score(level);
    let lower = revenues
        .iter()
        .map(|value| (value - z * sigma).max(0.0))
        .collect();
    let upper = revenues.iter().map(|value| value + z * sigma).collect();
    ConfidenceBounds {
        level,
        lower,
        upper,
    }
}

fn sample_std_dev(values: &[f64]) -> f64 {
    let count = values.len();
    if count < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / count as f64;
    let variance = values
        .iter()
        .map(|value| {
            let diff = value - mean;
            diff * diff
        })
        .sum::<f64>()
        / (count - 1) as f64;
    variance.sqrt()
}

fn normal_z_score(level: f64) -> f64 {
    let normal = Normal::new(0.0, 1.0).expect("standard normal is always constructible");
    normal.inverse_cdf(0.5 + level / 2.0)
}

fn summarize(periods: &[ForecastPeriod]) -> ForecastSummary {
    let count = periods.len();
    let total_revenue: f64 = periods.iter().map(|p| p.revenue).sum();
    let total_quantity: f64 = periods.iter().map(|p| p.quantity).sum();
    let total_profit: f64 = periods.iter().map(|p| p.profit).sum();
    ForecastSummary {
        total_revenue,
        total_quantity,
        total_profit,
        avg_revenue_per_period: total_revenue / count as f64,
        avg_quantity_per_period: total_quantity / count as f64,
        period_count: count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn daily_enumeration_is_inclusive() {
        let periods = enumerate_periods(date(2023, 6, 12), date(2023, 6, 18), Frequency::Daily);
        assert_eq!(periods.len(), 7);
        assert_eq!(periods[0], (date(2023, 6, 12), date(2023, 6, 12)));
        assert_eq!(periods[6], (date(2023, 6, 18), date(2023, 6, 18)));
    }

    #[test]
    fn weekly_enumeration_anchors_at_start_date() {
        // 2023-06-14 is a Wednesday; weeks stay Wednesday-anchored.
        let periods = enumerate_periods(date(2023, 6, 14), date(2023, 7, 4), Frequency::Weekly);
        assert_eq!(periods.len(), 3);
        assert_eq!(periods[0], (date(2023, 6, 14), date(2023, 6, 20)));
        assert_eq!(periods[1], (date(2023, 6, 21), date(2023, 6, 27)));
        assert_eq!(periods[2], (date(2023, 6, 28), date(2023, 7, 4)));
    }

    #[test]
    fn weekly_final_period_clips_to_end() {
        let periods = enumerate_periods(date(2023, 6, 1), date(2023, 6, 10), Frequency::Weekly);
        assert_eq!(periods.len(), 2);
        assert_eq!(periods[1], (date(2023, 6, 8), date(2023, 6, 10)));
    }

    #[test]
    fn monthly_enumeration_breaks_at_month_boundaries() {
        let periods = enumerate_periods(date(2023, 1, 15), date(2023, 3, 10), Frequency::Monthly);
        assert_eq!(periods.len(), 3);
        assert_eq!(periods[0], (date(2023, 1, 15), date(2023, 1, 31)));
        assert_eq!(periods[1], (date(2023, 2, 1), date(2023, 2, 28)));
        assert_eq!(periods[2], (date(2023, 3, 1), date(2023, 3, 10)));
    }

    #[test]
    fn sample_std_dev_matches_known_value() {
        // Sample (n-1) std of [2, 4, 4, 4, 5, 5, 7, 9] is ~2.138.
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((sample_std_dev(&values) - 2.138089935).abs() < 1e-6);
    }

    #[test]
    fn confidence_bounds_floor_at_zero() {
        let bounds = confidence_bounds(&[10.0, 1000.0], 0.95);
        assert!(bounds.lower.iter().all(|value| *value >= 0.0));
        assert!(bounds.upper[0] > 10.0);
        assert_eq!(bounds.lower[0], 0.0);
    }

    #[test]
    fn single_period_sigma_is_ten_percent() {
        let bounds = confidence_bounds(&[100.0], 0.95);
        let z = normal_z_score(0.95);
        assert!((bounds.upper[0] - (100.0 + z * 10.0)).abs() < 1e-9);
    }

    #[test]
    fn z_score_for_95_percent_is_close_to_1_96() {
        assert!((normal_z_score(0.95) - 1.959964).abs() < 1e-5);
    }
}
