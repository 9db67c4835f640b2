//! Demand forecast batch.
//!
//! One run regenerates the future forecast of every (product, branch) pair
//! with enough history. Each pair is replaced inside its own transaction, so
//! a crash mid-run leaves untouched pairs with their previous forecast.

use chrono::{Duration, NaiveDate, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::BranchScope,
    config::ForecastConfig,
    db::{self, DbPool},
    entities::{sale, sale_line, sales_forecast},
    errors::ServiceError,
    events::{Event, EventSender},
    ml::{quantity_from_prediction, DailyObservation, DemandModel, WeeklyTrendModel},
};

pub type PairKey = (Uuid, Uuid);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairFailure {
    pub product_id: Uuid,
    pub branch_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastRunSummary {
    pub pairs_seen: usize,
    pub pairs_skipped: usize,
    pub pairs_forecasted: usize,
    pub failures: Vec<PairFailure>,
}

/// The `days` consecutive dates starting at `start`.
pub fn horizon_dates(start: NaiveDate, days: u32) -> Vec<NaiveDate> {
    (0..days as i64).map(|d| start + Duration::days(d)).collect()
}

/// Daily units sold per pair, from product sale lines and their sales.
pub fn daily_series(
    rows: &[(sale_line::Model, Option<sale::Model>)],
) -> BTreeMap<PairKey, Vec<DailyObservation>> {
    let mut grouped: BTreeMap<PairKey, BTreeMap<NaiveDate, f64>> = BTreeMap::new();
    for (line, sale) in rows {
        let (Some(product_id), Some(sale)) = (line.product_id, sale) else {
            continue;
        };
        *grouped
            .entry((product_id, sale.branch_id))
            .or_default()
            .entry(sale.sold_at.date_naive())
            .or_insert(0.0) += line.quantity as f64;
    }

    grouped
        .into_iter()
        .map(|(key, days)| {
            let series = days
                .into_iter()
                .map(|(date, quantity)| DailyObservation::new(date, quantity))
                .collect();
            (key, series)
        })
        .collect()
}

#[derive(Clone)]
pub struct ForecastPipeline {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
    config: ForecastConfig,
    model: Arc<dyn DemandModel>,
}

impl ForecastPipeline {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender, config: ForecastConfig) -> Self {
        let model = Arc::new(WeeklyTrendModel::new(
            config.seasonality_shrinkage,
            config.backfit_iterations,
        ));
        Self {
            db_pool,
            event_sender,
            config,
            model,
        }
    }

    /// Swaps the demand model.
    pub fn with_model(mut self, model: Arc<dyn DemandModel>) -> Self {
        self.model = model;
        self
    }

    async fn load_history(&self) -> Result<BTreeMap<PairKey, Vec<DailyObservation>>, ServiceError> {
        let rows = sale_line::Entity::find()
            .filter(sale_line::Column::ProductId.is_not_null())
            .find_also_related(sale::Entity)
            .all(&*self.db_pool)
            .await?;
        Ok(daily_series(&rows))
    }

    /// Replaces the pair's forecasts dated `today` or later.
    async fn replace_pair(
        &self,
        (product_id, branch_id): PairKey,
        today: NaiveDate,
        points: Vec<(NaiveDate, Decimal)>,
    ) -> Result<(), ServiceError> {
        let generated_at = Utc::now();
        let rows: Vec<sales_forecast::ActiveModel> = points
            .into_iter()
            .map(|(date, quantity)| sales_forecast::ActiveModel {
                id: Set(Uuid::new_v4()),
                product_id: Set(product_id),
                branch_id: Set(branch_id),
                forecast_date: Set(date),
                predicted_quantity: Set(quantity),
                generated_at: Set(generated_at),
            })
            .collect();

        let txn = db::begin(&self.db_pool).await?;
        let outcome = async {
            sales_forecast::Entity::delete_many()
                .filter(sales_forecast::Column::ProductId.eq(product_id))
                .filter(sales_forecast::Column::BranchId.eq(branch_id))
                .filter(sales_forecast::Column::ForecastDate.gte(today))
                .exec(&txn)
                .await?;
            if !rows.is_empty() {
                sales_forecast::Entity::insert_many(rows).exec(&txn).await?;
            }
            Ok::<_, ServiceError>(())
        }
        .await;
        db::finish(txn, outcome).await
    }

    fn predict(
        &self,
        history: &[DailyObservation],
        horizon: &[NaiveDate],
    ) -> Result<Vec<(NaiveDate, Decimal)>, String> {
        let values = self
            .model
            .forecast(history, horizon)
            .map_err(|e| e.to_string())?;
        if values.len() != horizon.len() {
            return Err(format!(
                "{} returned {} values for {} dates",
                self.model.name(),
                values.len(),
                horizon.len()
            ));
        }
        horizon
            .iter()
            .zip(values)
            .map(|(date, value)| {
                quantity_from_prediction(value)
                    .map(|q| (*date, q))
                    .ok_or_else(|| format!("prediction {value} for {date} is out of range"))
            })
            .collect()
    }

    /// Runs one full regeneration as of `today`. Per-pair failures are
    /// recorded in the summary and do not stop the batch.
    #[instrument(skip(self))]
    pub async fn run(&self, today: NaiveDate) -> Result<ForecastRunSummary, ServiceError> {
        let series = self.load_history().await?;
        let horizon = horizon_dates(today, self.config.horizon_days);
        let mut summary = ForecastRunSummary {
            pairs_seen: series.len(),
            ..Default::default()
        };

        for (key, history) in series {
            let (product_id, branch_id) = key;
            if history.len() < self.config.min_history_days {
                summary.pairs_skipped += 1;
                continue;
            }

            let result = match self.predict(&history, &horizon) {
                Ok(points) => self
                    .replace_pair(key, today, points)
                    .await
                    .map_err(|e| e.to_string()),
                Err(reason) => Err(
                    ServiceError::ForecastFitFailure {
                        product_id,
                        branch_id,
                        reason,
                    }
                    .to_string(),
                ),
            };

            match result {
                Ok(()) => {
                    summary.pairs_forecasted += 1;
                    counter!("retail_ledger.forecast.pairs_succeeded", 1);
                    self.event_sender
                        .publish(Event::ForecastRegenerated {
                            product_id,
                            branch_id,
                            points: horizon.len(),
                        });
                }
                Err(reason) => {
                    counter!("retail_ledger.forecast.pairs_failed", 1);
                    warn!(product_id = %product_id, branch_id = %branch_id, reason = %reason, "Forecast pair failed");
                    self.event_sender
                        .publish(Event::ForecastFailed {
                            product_id,
                            branch_id,
                            reason: reason.clone(),
                        });
                    summary.failures.push(PairFailure {
                        product_id,
                        branch_id,
                        reason,
                    });
                }
            }
        }

        info!(
            seen = summary.pairs_seen,
            skipped = summary.pairs_skipped,
            forecasted = summary.pairs_forecasted,
            failed = summary.failures.len(),
            "Forecast run finished"
        );
        Ok(summary)
    }

    /// Stored forecasts from `today` on, oldest first.
    pub async fn forecasts_for(
        &self,
        scope: BranchScope,
        product_id: Option<Uuid>,
        today: NaiveDate,
    ) -> Result<Vec<sales_forecast::Model>, ServiceError> {
        let mut query = sales_forecast::Entity::find()
            .filter(sales_forecast::Column::ForecastDate.gte(today));
        if let Some(branch_id) = scope.branch_id() {
            query = query.filter(sales_forecast::Column::BranchId.eq(branch_id));
        }
        if let Some(product_id) = product_id {
            query = query.filter(sales_forecast::Column::ProductId.eq(product_id));
        }
        Ok(query
            .order_by_asc(sales_forecast::Column::ForecastDate)
            .order_by_asc(sales_forecast::Column::ProductId)
            .all(&*self.db_pool)
            .await?)
    }

    /// Predicted units for the scope over every stored day from `today` on.
    pub async fn predicted_demand(
        &self,
        scope: BranchScope,
        today: NaiveDate,
    ) -> Result<Decimal, ServiceError> {
        Ok(self
            .forecasts_for(scope, None, today)
            .await?
            .iter()
            .map(|f| f.predicted_quantity)
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use crate::entities::{PaymentMethod, SaleLineKind};

    fn sale_on(branch_id: Uuid, day: u32) -> sale::Model {
        sale::Model {
            id: Uuid::new_v4(),
            branch_id,
            customer_id: None,
            payment_method: PaymentMethod::Cash,
            installments: 1,
            subtotal: Decimal::ZERO,
            adjustment: Decimal::ZERO,
            total: Decimal::ZERO,
            sold_at: Utc.with_ymd_and_hms(2024, 2, day, 15, 30, 0).unwrap(),
        }
    }

    fn line(sale: &sale::Model, product_id: Option<Uuid>, quantity: i32) -> sale_line::Model {
        sale_line::Model {
            id: Uuid::new_v4(),
            sale_id: sale.id,
            line_kind: if product_id.is_some() {
                SaleLineKind::Product
            } else {
                SaleLineKind::ContainerReturn
            },
            product_id,
            container_id: None,
            quantity,
            unit_price: Decimal::ONE,
            line_total: Decimal::ONE,
        }
    }

    #[test]
    fn series_sums_per_day_and_skips_refunds() {
        let branch = Uuid::new_v4();
        let product = Uuid::new_v4();
        let morning = sale_on(branch, 3);
        let evening = sale_on(branch, 3);
        let next_day = sale_on(branch, 4);
        let rows = vec![
            (line(&morning, Some(product), 2), Some(morning.clone())),
            (line(&evening, Some(product), 3), Some(evening.clone())),
            (line(&evening, None, 1), Some(evening.clone())),
            (line(&next_day, Some(product), 1), Some(next_day.clone())),
        ];

        let series = daily_series(&rows);
        assert_eq!(series.len(), 1);
        let days = &series[&(product, branch)];
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].quantity, 5.0);
        assert_eq!(days[1].quantity, 1.0);
    }

    #[test]
    fn horizon_starts_at_run_date() {
        let today = NaiveDate::from_ymd_opt(2024, 2, 27).unwrap();
        let dates = horizon_dates(today, 7);
        assert_eq!(dates.len(), 7);
        assert_eq!(dates[0], today);
        assert_eq!(dates[6], NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
    }
}
