use chrono::{Datelike, NaiveDate};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Units sold on one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyObservation {
    pub date: NaiveDate,
    pub quantity: f64,
}

impl DailyObservation {
    pub fn new(date: NaiveDate, quantity: f64) -> Self {
        Self { date, quantity }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ForecastError {
    #[error("no history to fit")]
    EmptyHistory,
    #[error("history contains a non-finite value on {0}")]
    NonFiniteInput(NaiveDate),
    #[error("model produced a non-finite prediction for {0}")]
    NonFinitePrediction(NaiveDate),
    #[error("{0}")]
    Model(String),
}

/// A model that turns a daily sales history into one prediction per
/// requested date.
pub trait DemandModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// `history` holds only the days that had sales, in any order. The
    /// result has one value per `horizon` date, in the same order.
    fn forecast(
        &self,
        history: &[DailyObservation],
        horizon: &[NaiveDate],
    ) -> Result<Vec<f64>, ForecastError>;
}

/// Additive linear trend plus a day-of-week effect, fitted by backfitting.
///
/// Each pass fits an ordinary least squares line to the series with the
/// weekday effect removed, then re-estimates each weekday effect as the
/// mean residual of that weekday shrunk towards zero:
/// `effect[d] = sum(residuals on d) / (count(d) + shrinkage)`.
/// Weekdays never observed keep a zero effect.
#[derive(Debug, Clone)]
pub struct WeeklyTrendModel {
    shrinkage: f64,
    iterations: usize,
}

impl Default for WeeklyTrendModel {
    fn default() -> Self {
        Self::new(1.0, 10)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Fit {
    origin: NaiveDate,
    intercept: f64,
    slope: f64,
    weekday: [f64; 7],
}

impl Fit {
    fn predict(&self, date: NaiveDate) -> f64 {
        let t = (date - self.origin).num_days() as f64;
        self.intercept + self.slope * t + self.weekday[weekday_index(date)]
    }
}

fn weekday_index(date: NaiveDate) -> usize {
    date.weekday().num_days_from_monday() as usize
}

/// Least squares line through `(t, y)`. A single abscissa gives a flat line.
fn ols(t: &[f64], y: &[f64]) -> (f64, f64) {
    let n = t.len() as f64;
    let t_mean = t.iter().sum::<f64>() / n;
    let y_mean = y.iter().sum::<f64>() / n;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (ti, yi) in t.iter().zip(y) {
        sxx += (ti - t_mean) * (ti - t_mean);
        sxy += (ti - t_mean) * (yi - y_mean);
    }

    let slope = if sxx > f64::EPSILON { sxy / sxx } else { 0.0 };
    (y_mean - slope * t_mean, slope)
}

impl WeeklyTrendModel {
    pub fn new(shrinkage: f64, iterations: usize) -> Self {
        Self {
            shrinkage: shrinkage.max(0.0),
            iterations: iterations.max(1),
        }
    }

    fn fit(&self, history: &[DailyObservation]) -> Result<Fit, ForecastError> {
        let mut points = history.to_vec();
        points.sort_by_key(|p| p.date);
        let origin = points.first().ok_or(ForecastError::EmptyHistory)?.date;

        if let Some(bad) = points.iter().find(|p| !p.quantity.is_finite()) {
            return Err(ForecastError::NonFiniteInput(bad.date));
        }

        let t: Vec<f64> = points
            .iter()
            .map(|p| (p.date - origin).num_days() as f64)
            .collect();
        let days: Vec<usize> = points.iter().map(|p| weekday_index(p.date)).collect();
        let y: Vec<f64> = points.iter().map(|p| p.quantity).collect();

        let mut weekday = [0.0_f64; 7];
        let mut intercept = 0.0;
        let mut slope = 0.0;

        for _ in 0..self.iterations {
            let adjusted: Vec<f64> = y
                .iter()
                .zip(&days)
                .map(|(yi, d)| yi - weekday[*d])
                .collect();
            (intercept, slope) = ols(&t, &adjusted);

            let mut sums = [0.0_f64; 7];
            let mut counts = [0usize; 7];
            for ((ti, yi), d) in t.iter().zip(&y).zip(&days) {
                sums[*d] += yi - (intercept + slope * ti);
                counts[*d] += 1;
            }

            let mut next = [0.0_f64; 7];
            for d in 0..7 {
                if counts[d] > 0 {
                    next[d] = sums[d] / (counts[d] as f64 + self.shrinkage);
                }
            }

            let delta = next
                .iter()
                .zip(&weekday)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max);
            weekday = next;
            if delta < 1e-9 {
                break;
            }
        }

        Ok(Fit {
            origin,
            intercept,
            slope,
            weekday,
        })
    }
}

impl DemandModel for WeeklyTrendModel {
    fn name(&self) -> &'static str {
        "weekly_trend"
    }

    fn forecast(
        &self,
        history: &[DailyObservation],
        horizon: &[NaiveDate],
    ) -> Result<Vec<f64>, ForecastError> {
        let fit = self.fit(history)?;
        horizon
            .iter()
            .map(|date| {
                let value = fit.predict(*date);
                if value.is_finite() {
                    Ok(value)
                } else {
                    Err(ForecastError::NonFinitePrediction(*date))
                }
            })
            .collect()
    }
}

/// Stored form of a prediction: never negative, two decimals, half away
/// from zero.
pub fn quantity_from_prediction(value: f64) -> Option<Decimal> {
    let clamped = if value > 0.0 { value } else { 0.0 };
    Decimal::from_f64(clamped)
        .map(|d| d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}
