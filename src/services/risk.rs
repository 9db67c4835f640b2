//! Expiration and shortage risk. Read-only.

use chrono::{Duration, NaiveDate, NaiveTime};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait};
use sea_orm::JoinType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{
    auth::BranchScope,
    config::RiskConfig,
    db::DbPool,
    entities::{product, sale, sale_line, stock_lot},
    errors::ServiceError,
};

/// Stock position of one product within a scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStock {
    pub product_id: Uuid,
    pub name: String,
    pub perishable: bool,
    pub stock_minimo: i32,
    pub total_stock: i64,
    /// Earliest expiration among lots with stock; undated lots ignored
    pub nearest_expiration: Option<NaiveDate>,
    /// At least one lot with stock has no expiration date
    pub has_undated_stock: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskEntry {
    pub product_id: Uuid,
    pub name: String,
    pub total_stock: i64,
    pub nearest_expiration: Option<NaiveDate>,
    pub days_to_expire: Option<i64>,
    /// Units per day over the trailing window
    pub velocity: f64,
    /// Days until the current stock sells out at `velocity`
    pub days_of_stock: Option<f64>,
    pub at_risk: bool,
    pub undated_perishable: bool,
    pub low_stock: bool,
}

/// Scores one product. `units_sold` covers the trailing `window_days`.
pub fn assess(
    stock: &ProductStock,
    units_sold: i64,
    window_days: u32,
    today: NaiveDate,
) -> RiskEntry {
    let velocity = if units_sold > 0 && window_days > 0 {
        units_sold as f64 / window_days as f64
    } else {
        0.0
    };
    let days_to_expire = stock
        .nearest_expiration
        .map(|date| (date - today).num_days());
    let days_of_stock = (velocity > 0.0).then(|| stock.total_stock as f64 / velocity);

    let at_risk = match (days_of_stock, days_to_expire) {
        (Some(days_of_stock), Some(days_to_expire)) => {
            days_to_expire > 0 && days_of_stock > days_to_expire as f64
        }
        _ => false,
    };

    RiskEntry {
        product_id: stock.product_id,
        name: stock.name.clone(),
        total_stock: stock.total_stock,
        nearest_expiration: stock.nearest_expiration,
        days_to_expire,
        velocity,
        days_of_stock,
        at_risk,
        undated_perishable: stock.perishable && stock.has_undated_stock,
        low_stock: stock.total_stock < stock.stock_minimo as i64,
    }
}

/// Soonest expiration first, undated last; ties keep their order.
pub fn rank(entries: &mut [RiskEntry]) {
    entries.sort_by(|a, b| match (a.days_to_expire, b.days_to_expire) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

/// Folds lots into per-product positions, in the order of `products`.
/// Every product with a lot row gets a position; drained lots count as zero
/// stock and never contribute an expiration.
pub fn aggregate_stock(
    products: &[product::Model],
    lots: &[stock_lot::Model],
) -> Vec<ProductStock> {
    let mut by_product: HashMap<Uuid, (i64, Option<NaiveDate>, bool)> = HashMap::new();
    for lot in lots {
        let entry = by_product.entry(lot.product_id).or_insert((0, None, false));
        if lot.quantity <= 0 {
            continue;
        }
        entry.0 += lot.quantity as i64;
        match lot.expiration_date {
            Some(date) => entry.1 = Some(entry.1.map_or(date, |d| d.min(date))),
            None => entry.2 = true,
        }
    }

    products
        .iter()
        .filter_map(|p| {
            by_product
                .get(&p.id)
                .map(|(total, nearest, undated)| ProductStock {
                    product_id: p.id,
                    name: p.name.clone(),
                    perishable: p.perishable,
                    stock_minimo: p.stock_minimo,
                    total_stock: *total,
                    nearest_expiration: *nearest,
                    has_undated_stock: *undated,
                })
        })
        .collect()
}

/// Units sold per product over `[today - (window_days - 1), today]`.
pub async fn units_sold_by_product(
    db: &DbPool,
    scope: BranchScope,
    today: NaiveDate,
    window_days: u32,
) -> Result<HashMap<Uuid, i64>, ServiceError> {
    let from = (today - Duration::days(window_days.saturating_sub(1) as i64))
        .and_time(NaiveTime::MIN)
        .and_utc();
    let until = (today + Duration::days(1)).and_time(NaiveTime::MIN).and_utc();

    let mut query = sale_line::Entity::find()
        .join(JoinType::InnerJoin, sale_line::Relation::Sale.def())
        .filter(sale_line::Column::ProductId.is_not_null())
        .filter(sale::Column::SoldAt.gte(from))
        .filter(sale::Column::SoldAt.lt(until));
    if let Some(branch_id) = scope.branch_id() {
        query = query.filter(sale::Column::BranchId.eq(branch_id));
    }

    let mut sold = HashMap::new();
    for line in query.all(db).await? {
        if let Some(product_id) = line.product_id {
            *sold.entry(product_id).or_insert(0i64) += line.quantity as i64;
        }
    }
    Ok(sold)
}

#[derive(Clone)]
pub struct RiskService {
    db_pool: Arc<DbPool>,
    config: RiskConfig,
}

impl RiskService {
    pub fn new(db_pool: Arc<DbPool>, config: RiskConfig) -> Self {
        Self { db_pool, config }
    }

    /// Stock positions for every product with lot rows in `scope`, ordered
    /// by product name. Products whose lots are all drained show zero stock.
    pub async fn stock_positions(
        &self,
        scope: BranchScope,
    ) -> Result<Vec<ProductStock>, ServiceError> {
        let db = &*self.db_pool;
        let mut lots = stock_lot::Entity::find();
        if let Some(branch_id) = scope.branch_id() {
            lots = lots.filter(stock_lot::Column::BranchId.eq(branch_id));
        }
        let lots = lots.all(db).await?;
        let products = product::Entity::find()
            .order_by_asc(product::Column::Name)
            .order_by_asc(product::Column::Id)
            .all(db)
            .await?;
        Ok(aggregate_stock(&products, &lots))
    }

    /// Ranked risk list for `scope` as of `today`.
    #[instrument(skip(self))]
    pub async fn evaluate(
        &self,
        scope: BranchScope,
        today: NaiveDate,
    ) -> Result<Vec<RiskEntry>, ServiceError> {
        let positions = self.stock_positions(scope).await?;
        let window = self.config.velocity_window_days;
        let sold = units_sold_by_product(&self.db_pool, scope, today, window).await?;

        let mut entries: Vec<RiskEntry> = positions
            .iter()
            .map(|p| assess(p, sold.get(&p.product_id).copied().unwrap_or(0), window, today))
            .collect();
        rank(&mut entries);

        debug!(
            products = entries.len(),
            at_risk = entries.iter().filter(|e| e.at_risk).count(),
            "Risk evaluated"
        );
        Ok(entries)
    }
}
