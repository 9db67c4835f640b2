//! Operational reports: inventory count discrepancies, purchase suggestions,
//! shift close, period income, basket analysis and sales dashboards.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, JoinType, QueryFilter, QueryOrder, QuerySelect,
    RelationTrait, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::{
    auth::BranchScope,
    config::RiskConfig,
    db::{self, DbPool},
    entities::{
        customer, customer_payment, product, sale, sale_line, shift_close, stock_lot, supplier,
        supplier_payment, PaymentMethod,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

pub const UNASSIGNED_SUPPLIER: &str = "Sin Proveedor Asignado";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountDiscrepancy {
    pub product_id: Uuid,
    pub product_name: String,
    pub system: i64,
    pub counted: i64,
    /// counted - system
    pub difference: i64,
}

/// Differences between a physical count and the system stock.
///
/// Products missing from either side count as zero. Only non-zero
/// differences are returned, sorted by product name.
pub fn discrepancies(
    names: &HashMap<Uuid, String>,
    system: &HashMap<Uuid, i64>,
    counted: &HashMap<Uuid, i64>,
) -> Vec<CountDiscrepancy> {
    let mut ids: Vec<Uuid> = system
        .iter()
        .filter(|(_, qty)| **qty > 0)
        .map(|(id, _)| *id)
        .chain(counted.keys().copied())
        .collect();
    ids.sort();
    ids.dedup();

    let mut out: Vec<CountDiscrepancy> = ids
        .into_iter()
        .filter_map(|id| {
            let system = system.get(&id).copied().unwrap_or(0);
            let counted = counted.get(&id).copied().unwrap_or(0);
            (counted != system).then(|| CountDiscrepancy {
                product_id: id,
                product_name: names.get(&id).cloned().unwrap_or_default(),
                system,
                counted,
                difference: counted - system,
            })
        })
        .collect();
    out.sort_by(|a, b| {
        a.product_name
            .cmp(&b.product_name)
            .then(a.product_id.cmp(&b.product_id))
    });
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseSuggestion {
    pub product_id: Uuid,
    pub product_name: String,
    pub stock: i64,
    pub stock_minimo: i32,
    pub suggested_quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierOrder {
    pub supplier_id: Option<Uuid>,
    pub supplier_name: String,
    pub next_delivery: Option<NaiveDate>,
    pub items: Vec<PurchaseSuggestion>,
}

/// Units to order to get back above the minimum with half a minimum of slack.
pub fn suggested_order_quantity(stock: i64, stock_minimo: i32) -> i64 {
    let min = stock_minimo as i64;
    (min - stock) + min / 2
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftSummary {
    pub branch_id: Uuid,
    /// Previous close of the branch, if any
    pub started_at: Option<DateTime<Utc>>,
    pub until: DateTime<Utc>,
    pub cash_sales: Decimal,
    pub card_sales: Decimal,
    pub qr_sales: Decimal,
    pub customer_collections: Decimal,
    pub supplier_payments: Decimal,
    pub expected_cash: Decimal,
}

impl ShiftSummary {
    fn add_sale(&mut self, method: PaymentMethod, total: Decimal) {
        match method {
            PaymentMethod::Cash => self.cash_sales += total,
            PaymentMethod::Debit | PaymentMethod::Credit => self.card_sales += total,
            PaymentMethod::Qr => self.qr_sales += total,
            PaymentMethod::RunningAccount => {}
        }
    }

    fn settle_expected(&mut self) {
        self.expected_cash = self.cash_sales + self.customer_collections - self.supplier_payments;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySales {
    pub date: NaiveDate,
    pub total: Decimal,
}

/// Sums totals per day over the `days` days ending `today`, oldest first.
/// Days without sales are zero.
pub fn zero_filled_daily(
    sales: &[(DateTime<Utc>, Decimal)],
    today: NaiveDate,
    days: u32,
) -> Vec<DailySales> {
    let start = today - Duration::days(days.saturating_sub(1) as i64);
    let mut totals: BTreeMap<NaiveDate, Decimal> = (0..days as i64)
        .map(|offset| (start + Duration::days(offset), Decimal::ZERO))
        .collect();
    for (sold_at, total) in sales {
        if let Some(day) = totals.get_mut(&sold_at.date_naive()) {
            *day += *total;
        }
    }
    totals
        .into_iter()
        .map(|(date, total)| DailySales { date, total })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryAlert {
    pub lot_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub expiration_date: NaiveDate,
    pub days_left: i64,
}

/// Rows kept per movement list in a period report.
pub const RECENT_MOVEMENTS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodIncome {
    pub payment_method: PaymentMethod,
    pub total: Decimal,
}

/// Money in and out of a branch (or every branch) over a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub branch_id: Option<Uuid>,
    /// Sales actually paid, per method; running-account sales excluded
    pub income_by_method: Vec<MethodIncome>,
    pub customer_collections: Decimal,
    pub supplier_payments: Decimal,
    /// Sold on the customer's account; no money changed hands
    pub running_account_sales: Decimal,
    /// Current balances across all branches, not limited to the period
    pub customer_balances: Decimal,
    pub supplier_balances: Decimal,
    pub recent_sales: Vec<sale::Model>,
    pub recent_customer_payments: Vec<customer_payment::Model>,
    pub recent_supplier_payments: Vec<supplier_payment::Model>,
}

/// Splits sale totals into paid income per method, ordered by method code,
/// and the running-account total.
pub fn income_by_method(sales: &[(PaymentMethod, Decimal)]) -> (Vec<MethodIncome>, Decimal) {
    let mut paid: BTreeMap<String, MethodIncome> = BTreeMap::new();
    let mut running_account = Decimal::ZERO;
    for &(method, total) in sales {
        if method.requires_customer() {
            running_account += total;
            continue;
        }
        paid.entry(method.to_string())
            .or_insert(MethodIncome {
                payment_method: method,
                total: Decimal::ZERO,
            })
            .total += total;
    }
    (paid.into_values().collect(), running_account)
}

/// Minimum support, confidence and lift for a basket rule to be reported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BasketThresholds {
    pub min_support: f64,
    pub min_confidence: f64,
    pub min_lift: f64,
}

impl Default for BasketThresholds {
    fn default() -> Self {
        Self {
            min_support: 0.01,
            min_confidence: 0.1,
            min_lift: 1.1,
        }
    }
}

/// "Customers who buy `antecedent` also buy `consequent`".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasketRule {
    pub antecedent_id: Uuid,
    pub antecedent: String,
    pub consequent_id: Uuid,
    pub consequent: String,
    /// Percent of baskets holding both products
    pub support_pct: f64,
    /// Percent of baskets with the antecedent that also hold the consequent
    pub confidence_pct: f64,
    pub lift: f64,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Mines single-product rules A -> B from `baskets`. Rules below any of the
/// thresholds are dropped; the rest come strongest confidence first.
pub fn basket_rules(
    baskets: &[BTreeSet<Uuid>],
    names: &HashMap<Uuid, String>,
    thresholds: BasketThresholds,
) -> Vec<BasketRule> {
    if baskets.is_empty() {
        return Vec::new();
    }
    let total = baskets.len();

    let mut singles: HashMap<Uuid, usize> = HashMap::new();
    let mut pairs: BTreeMap<(Uuid, Uuid), usize> = BTreeMap::new();
    for basket in baskets {
        let items: Vec<Uuid> = basket.iter().copied().collect();
        for (i, a) in items.iter().enumerate() {
            *singles.entry(*a).or_insert(0) += 1;
            for b in &items[i + 1..] {
                *pairs.entry((*a, *b)).or_insert(0) += 1;
            }
        }
    }

    let name = |id: Uuid| names.get(&id).cloned().unwrap_or_default();
    let mut rules = Vec::new();
    for (&(a, b), &both) in &pairs {
        let support = both as f64 / total as f64;
        if support < thresholds.min_support {
            continue;
        }
        for (base, add) in [(a, b), (b, a)] {
            let base_count = singles.get(&base).copied().unwrap_or(0);
            let add_count = singles.get(&add).copied().unwrap_or(0);
            if base_count == 0 || add_count == 0 {
                continue;
            }
            let confidence = both as f64 / base_count as f64;
            let lift = (both * total) as f64 / (base_count * add_count) as f64;
            if confidence < thresholds.min_confidence || lift < thresholds.min_lift {
                continue;
            }
            rules.push(BasketRule {
                antecedent_id: base,
                antecedent: name(base),
                consequent_id: add,
                consequent: name(add),
                support_pct: round2(support * 100.0),
                confidence_pct: round2(confidence * 100.0),
                lift: round2(lift),
            });
        }
    }

    rules.sort_by(|x, y| {
        y.confidence_pct
            .total_cmp(&x.confidence_pct)
            .then_with(|| y.lift.total_cmp(&x.lift))
            .then_with(|| x.antecedent.cmp(&y.antecedent))
            .then_with(|| x.consequent.cmp(&y.consequent))
    });
    rules
}

fn start_of(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

#[derive(Clone)]
pub struct ReportService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
    config: RiskConfig,
}

impl ReportService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender, config: RiskConfig) -> Self {
        Self {
            db_pool,
            event_sender,
            config,
        }
    }

    async fn stock_by_product(
        &self,
        scope: BranchScope,
    ) -> Result<HashMap<Uuid, i64>, ServiceError> {
        let mut query = stock_lot::Entity::find();
        if let Some(branch_id) = scope.branch_id() {
            query = query.filter(stock_lot::Column::BranchId.eq(branch_id));
        }
        let mut totals = HashMap::new();
        for lot in query.all(&*self.db_pool).await? {
            *totals.entry(lot.product_id).or_insert(0i64) += lot.quantity as i64;
        }
        Ok(totals)
    }

    /// Compares a physical count with the branch stock.
    #[instrument(skip(self, counted), fields(counted = counted.len()))]
    pub async fn count_discrepancies(
        &self,
        scope: BranchScope,
        counted: HashMap<Uuid, i64>,
    ) -> Result<Vec<CountDiscrepancy>, ServiceError> {
        let branch_id = scope.single()?;
        let system = self.stock_by_product(BranchScope::Branch(branch_id)).await?;
        let names: HashMap<Uuid, String> = product::Entity::find()
            .all(&*self.db_pool)
            .await?
            .into_iter()
            .map(|p| (p.id, p.name))
            .collect();

        if let Some(unknown) = counted.keys().find(|id| !names.contains_key(id)) {
            return Err(ServiceError::NotFound(format!("Product {} not found", unknown)));
        }
        Ok(discrepancies(&names, &system, &counted))
    }

    /// Products below their minimum, grouped by supplier.
    #[instrument(skip(self))]
    pub async fn purchase_suggestions(
        &self,
        scope: BranchScope,
        today: NaiveDate,
    ) -> Result<Vec<SupplierOrder>, ServiceError> {
        let db = &*self.db_pool;
        let stock = self.stock_by_product(scope).await?;
        let products = product::Entity::find()
            .order_by_asc(product::Column::Name)
            .all(db)
            .await?;
        let suppliers: HashMap<Uuid, supplier::Model> = supplier::Entity::find()
            .all(db)
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();

        let mut groups: BTreeMap<String, SupplierOrder> = BTreeMap::new();
        for p in products {
            let Some(&current) = stock.get(&p.id) else {
                continue;
            };
            if current >= p.stock_minimo as i64 {
                continue;
            }

            let vendor = p.supplier_id.and_then(|id| suppliers.get(&id));
            let name = vendor
                .map(|s| s.name.clone())
                .unwrap_or_else(|| UNASSIGNED_SUPPLIER.to_string());
            let group = groups.entry(name.clone()).or_insert_with(|| SupplierOrder {
                supplier_id: vendor.map(|s| s.id),
                supplier_name: name,
                next_delivery: vendor.and_then(|s| s.next_delivery(today)),
                items: Vec::new(),
            });
            group.items.push(PurchaseSuggestion {
                product_id: p.id,
                product_name: p.name,
                stock: current,
                stock_minimo: p.stock_minimo,
                suggested_quantity: suggested_order_quantity(current, p.stock_minimo),
            });
        }

        Ok(groups.into_values().collect())
    }

    async fn last_close(
        &self,
        branch_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<shift_close::Model>, ServiceError> {
        Ok(shift_close::Entity::find()
            .filter(shift_close::Column::BranchId.eq(branch_id))
            .filter(shift_close::Column::ClosedAt.lte(now))
            .order_by_desc(shift_close::Column::ClosedAt)
            .one(&*self.db_pool)
            .await?)
    }

    /// Movements of the branch since its previous close, up to `now`.
    #[instrument(skip(self))]
    pub async fn shift_summary(
        &self,
        scope: BranchScope,
        now: DateTime<Utc>,
    ) -> Result<ShiftSummary, ServiceError> {
        let branch_id = scope.single()?;
        let db = &*self.db_pool;
        let started_at = self.last_close(branch_id, now).await?.map(|c| c.closed_at);

        let mut summary = ShiftSummary {
            branch_id,
            started_at,
            until: now,
            ..Default::default()
        };

        let mut sales = sale::Entity::find()
            .filter(sale::Column::BranchId.eq(branch_id))
            .filter(sale::Column::SoldAt.lte(now));
        let mut collections = customer_payment::Entity::find()
            .filter(customer_payment::Column::BranchId.eq(branch_id))
            .filter(customer_payment::Column::PaidAt.lte(now));
        let mut payments = supplier_payment::Entity::find()
            .filter(supplier_payment::Column::BranchId.eq(branch_id))
            .filter(supplier_payment::Column::PaidAt.lte(now));
        if let Some(since) = started_at {
            sales = sales.filter(sale::Column::SoldAt.gt(since));
            collections = collections.filter(customer_payment::Column::PaidAt.gt(since));
            payments = payments.filter(supplier_payment::Column::PaidAt.gt(since));
        }

        for s in sales.all(db).await? {
            summary.add_sale(s.payment_method, s.total);
        }
        summary.customer_collections = collections
            .all(db)
            .await?
            .iter()
            .map(|p| p.amount)
            .sum();
        summary.supplier_payments = payments.all(db).await?.iter().map(|p| p.amount).sum();
        summary.settle_expected();
        Ok(summary)
    }

    /// Closes the shift with the cash the operator declared.
    #[instrument(skip(self))]
    pub async fn close_shift(
        &self,
        scope: BranchScope,
        closed_by: &str,
        declared_cash: Decimal,
        now: DateTime<Utc>,
    ) -> Result<shift_close::Model, ServiceError> {
        if declared_cash.is_sign_negative() {
            return Err(ServiceError::InvalidInput(
                "declared cash cannot be negative".into(),
            ));
        }
        let summary = self.shift_summary(scope, now).await?;

        let txn = db::begin(&self.db_pool).await?;
        let outcome = shift_close::ActiveModel {
            id: Set(Uuid::new_v4()),
            branch_id: Set(summary.branch_id),
            closed_by: Set(closed_by.to_string()),
            started_at: Set(summary.started_at),
            closed_at: Set(now),
            cash_sales: Set(summary.cash_sales),
            card_sales: Set(summary.card_sales),
            qr_sales: Set(summary.qr_sales),
            customer_collections: Set(summary.customer_collections),
            supplier_payments: Set(summary.supplier_payments),
            declared_cash: Set(declared_cash),
            expected_cash: Set(summary.expected_cash),
            cash_difference: Set(declared_cash - summary.expected_cash),
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::from);
        let closed = db::finish(txn, outcome).await?;

        info!(
            shift_id = %closed.id,
            expected = %closed.expected_cash,
            difference = %closed.cash_difference,
            "Shift closed"
        );
        self.event_sender
            .publish(Event::ShiftClosed {
                shift_id: closed.id,
                branch_id: closed.branch_id,
                closed_at: closed.closed_at,
                cash_difference: closed.cash_difference,
            });
        Ok(closed)
    }

    /// Income, collections, supplier payments and balances for the days
    /// `from..=to`.
    #[instrument(skip(self))]
    pub async fn period_report(
        &self,
        scope: BranchScope,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<PeriodReport, ServiceError> {
        if from > to {
            return Err(ServiceError::InvalidInput(format!(
                "period starts {from} after it ends {to}"
            )));
        }
        let db = &*self.db_pool;
        let (start, end) = (start_of(from), start_of(to + Duration::days(1)));

        let mut sales = sale::Entity::find()
            .filter(sale::Column::SoldAt.gte(start))
            .filter(sale::Column::SoldAt.lt(end));
        let mut collections = customer_payment::Entity::find()
            .filter(customer_payment::Column::PaidAt.gte(start))
            .filter(customer_payment::Column::PaidAt.lt(end));
        let mut payments = supplier_payment::Entity::find()
            .filter(supplier_payment::Column::PaidAt.gte(start))
            .filter(supplier_payment::Column::PaidAt.lt(end));
        if let Some(branch_id) = scope.branch_id() {
            sales = sales.filter(sale::Column::BranchId.eq(branch_id));
            collections = collections.filter(customer_payment::Column::BranchId.eq(branch_id));
            payments = payments.filter(supplier_payment::Column::BranchId.eq(branch_id));
        }

        let mut recent_sales = sales
            .order_by_desc(sale::Column::SoldAt)
            .all(db)
            .await?;
        let mut recent_customer_payments = collections
            .order_by_desc(customer_payment::Column::PaidAt)
            .all(db)
            .await?;
        let mut recent_supplier_payments = payments
            .order_by_desc(supplier_payment::Column::PaidAt)
            .all(db)
            .await?;

        let totals: Vec<(PaymentMethod, Decimal)> = recent_sales
            .iter()
            .map(|s| (s.payment_method, s.total))
            .collect();
        let (income, running_account_sales) = income_by_method(&totals);
        let customer_collections: Decimal = recent_customer_payments.iter().map(|p| p.amount).sum();
        let supplier_payments: Decimal = recent_supplier_payments.iter().map(|p| p.amount).sum();

        let customer_balances: Decimal = customer::Entity::find()
            .all(db)
            .await?
            .iter()
            .map(|c| c.balance)
            .sum();
        let supplier_balances: Decimal = supplier::Entity::find()
            .all(db)
            .await?
            .iter()
            .map(|s| s.balance)
            .sum();

        recent_sales.truncate(RECENT_MOVEMENTS);
        recent_customer_payments.truncate(RECENT_MOVEMENTS);
        recent_supplier_payments.truncate(RECENT_MOVEMENTS);

        Ok(PeriodReport {
            from,
            to,
            branch_id: scope.branch_id(),
            income_by_method: income,
            customer_collections,
            supplier_payments,
            running_account_sales,
            customer_balances,
            supplier_balances,
            recent_sales,
            recent_customer_payments,
            recent_supplier_payments,
        })
    }

    /// Products bought together. Baskets are sales with more than one
    /// product line.
    #[instrument(skip(self))]
    pub async fn basket_analysis(
        &self,
        scope: BranchScope,
        thresholds: BasketThresholds,
    ) -> Result<Vec<BasketRule>, ServiceError> {
        let db = &*self.db_pool;
        let mut query = sale_line::Entity::find()
            .join(JoinType::InnerJoin, sale_line::Relation::Sale.def())
            .filter(sale_line::Column::ProductId.is_not_null());
        if let Some(branch_id) = scope.branch_id() {
            query = query.filter(sale::Column::BranchId.eq(branch_id));
        }

        let mut by_sale: HashMap<Uuid, (usize, BTreeSet<Uuid>)> = HashMap::new();
        for line in query.all(db).await? {
            if let Some(product_id) = line.product_id {
                let entry = by_sale.entry(line.sale_id).or_default();
                entry.0 += 1;
                entry.1.insert(product_id);
            }
        }
        let baskets: Vec<BTreeSet<Uuid>> = by_sale
            .into_values()
            .filter(|(lines, _)| *lines > 1)
            .map(|(_, items)| items)
            .collect();

        let names: HashMap<Uuid, String> = product::Entity::find()
            .all(db)
            .await?
            .into_iter()
            .map(|p| (p.id, p.name))
            .collect();
        let rules = basket_rules(&baskets, &names, thresholds);
        debug!(baskets = baskets.len(), rules = rules.len(), "Basket analysis done");
        Ok(rules)
    }

    /// Sale totals per day for the last `days` days including `today`.
    pub async fn daily_sales(
        &self,
        scope: BranchScope,
        today: NaiveDate,
        days: u32,
    ) -> Result<Vec<DailySales>, ServiceError> {
        let from = start_of(today - Duration::days(days.saturating_sub(1) as i64));
        let until = start_of(today + Duration::days(1));
        let mut query = sale::Entity::find()
            .filter(sale::Column::SoldAt.gte(from))
            .filter(sale::Column::SoldAt.lt(until));
        if let Some(branch_id) = scope.branch_id() {
            query = query.filter(sale::Column::BranchId.eq(branch_id));
        }
        let sales: Vec<(DateTime<Utc>, Decimal)> = query
            .all(&*self.db_pool)
            .await?
            .into_iter()
            .map(|s| (s.sold_at, s.total))
            .collect();
        Ok(zero_filled_daily(&sales, today, days))
    }

    /// Lots with stock expiring between today and the alert window, soonest
    /// first.
    pub async fn expiry_alerts(
        &self,
        scope: BranchScope,
        today: NaiveDate,
    ) -> Result<Vec<ExpiryAlert>, ServiceError> {
        let branch_id = scope.single()?;
        let limit = today + Duration::days(self.config.expiry_alert_days as i64);
        let lots = stock_lot::Entity::find()
            .find_also_related(product::Entity)
            .filter(stock_lot::Column::BranchId.eq(branch_id))
            .filter(stock_lot::Column::Quantity.gt(0))
            .filter(stock_lot::Column::ExpirationDate.gte(today))
            .filter(stock_lot::Column::ExpirationDate.lte(limit))
            .order_by_asc(stock_lot::Column::ExpirationDate)
            .order_by_asc(stock_lot::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?;

        Ok(lots
            .into_iter()
            .filter_map(|(lot, product)| {
                let expiration_date = lot.expiration_date?;
                Some(ExpiryAlert {
                    lot_id: lot.id,
                    product_id: lot.product_id,
                    product_name: product.map(|p| p.name).unwrap_or_default(),
                    quantity: lot.quantity,
                    expiration_date,
                    days_left: (expiration_date - today).num_days(),
                })
            })
            .take(self.config.alert_limit)
            .collect())
    }
}
