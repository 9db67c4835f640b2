//! Demand models used by the forecast pipeline.

pub mod forecasting;

pub use forecasting::{
    quantity_from_prediction, DailyObservation, DemandModel, ForecastError, WeeklyTrendModel,
};
