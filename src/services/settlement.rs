//! Sale settlement: one cart in, one committed sale out, or nothing at all.

use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::BranchScope,
    config::PricingConfig,
    db::{self, DbPool},
    entities::{
        container_stock, customer, product, returnable_container, sale, sale_line, PaymentMethod,
        SaleLineKind, StockLocation,
    },
    errors::ServiceError,
    events::{Event, EventSender, LotChange},
    services::allocation::{consume_fefo, ensure_positive, Consumption, ShortfallPolicy},
};

/// Money is kept at two decimals, halves rounded away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Signed percentage for a payment method: negative discounts, positive
/// surcharges.
pub fn adjustment_pct(method: PaymentMethod, pricing: &PricingConfig) -> Decimal {
    match method {
        PaymentMethod::Cash => -pricing.cash_discount_pct,
        PaymentMethod::Credit => pricing.credit_surcharge_pct,
        PaymentMethod::Qr => pricing.qr_surcharge_pct,
        PaymentMethod::Debit | PaymentMethod::RunningAccount => Decimal::ZERO,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CartLine {
    Product {
        product_id: Uuid,
        quantity: i32,
        unit_price: Decimal,
    },
    /// Refund for returned containers; `unit_price` is zero or negative.
    ContainerReturn {
        container_id: Uuid,
        quantity: i32,
        unit_price: Decimal,
    },
}

impl CartLine {
    pub fn quantity(&self) -> i32 {
        match self {
            CartLine::Product { quantity, .. } | CartLine::ContainerReturn { quantity, .. } => {
                *quantity
            }
        }
    }

    pub fn unit_price(&self) -> Decimal {
        match self {
            CartLine::Product { unit_price, .. }
            | CartLine::ContainerReturn { unit_price, .. } => *unit_price,
        }
    }

    /// Price times quantity, rounded to cents.
    pub fn line_total(&self) -> Result<Decimal, ServiceError> {
        self.unit_price()
            .checked_mul(Decimal::from(self.quantity()))
            .map(round_money)
            .ok_or_else(|| {
                ServiceError::InvalidQuantity(format!(
                    "line amount overflows: {} x {}",
                    self.unit_price(),
                    self.quantity()
                ))
            })
    }

    fn check(&self) -> Result<(), ServiceError> {
        ensure_positive(self.quantity(), "line quantity")?;
        match self {
            CartLine::Product { unit_price, .. } if unit_price.is_sign_negative() => {
                Err(ServiceError::InvalidInput(format!(
                    "product price cannot be negative, got {unit_price}"
                )))
            }
            CartLine::ContainerReturn { unit_price, .. } if *unit_price > Decimal::ZERO => {
                Err(ServiceError::InvalidInput(format!(
                    "container refund must be zero or negative, got {unit_price}"
                )))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SettleSaleRequest {
    pub lines: Vec<CartLine>,
    pub payment_method: PaymentMethod,
    #[serde(default = "default_installments")]
    #[validate(range(min = 1, max = 60))]
    pub installments: i32,
    pub customer_id: Option<Uuid>,
    /// Defaults to now; set when back-loading historical sales
    pub sold_at: Option<DateTime<Utc>>,
}

fn default_installments() -> i32 {
    1
}

impl SettleSaleRequest {
    pub fn new(lines: Vec<CartLine>, payment_method: PaymentMethod) -> Self {
        Self {
            lines,
            payment_method,
            installments: 1,
            customer_id: None,
            sold_at: None,
        }
    }

    /// Shape checks done before any storage is touched.
    pub fn check(&self) -> Result<(), ServiceError> {
        if self.lines.is_empty() {
            return Err(ServiceError::EmptyCart);
        }
        self.validate()?;
        for line in &self.lines {
            line.check()?;
        }
        if self.payment_method.requires_customer() && self.customer_id.is_none() {
            return Err(ServiceError::MissingCustomer);
        }
        Ok(())
    }
}

/// Totals of a cart. `total == subtotal + adjustment` holds exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleTotals {
    pub products_subtotal: Decimal,
    pub returns_total: Decimal,
    pub subtotal: Decimal,
    pub adjustment: Decimal,
    pub total: Decimal,
}

/// Computes cart totals from the rounded line totals, so the stored lines
/// always add up to the subtotal. The payment adjustment applies to product
/// lines only; container refunds are neither discounted nor surcharged.
pub fn compute_totals(
    lines: &[CartLine],
    method: PaymentMethod,
    pricing: &PricingConfig,
) -> Result<SaleTotals, ServiceError> {
    let overflow = || ServiceError::InvalidInput("cart total is out of range".to_string());

    let mut products_subtotal = Decimal::ZERO;
    let mut returns_total = Decimal::ZERO;
    for line in lines {
        let amount = line.line_total()?;
        let bucket = match line {
            CartLine::Product { .. } => &mut products_subtotal,
            CartLine::ContainerReturn { .. } => &mut returns_total,
        };
        *bucket = bucket.checked_add(amount).ok_or_else(overflow)?;
    }

    let subtotal = products_subtotal
        .checked_add(returns_total)
        .ok_or_else(overflow)?;
    let raw_adjustment = products_subtotal
        .checked_mul(adjustment_pct(method, pricing))
        .map(|v| v / Decimal::ONE_HUNDRED)
        .ok_or_else(overflow)?;
    let total = subtotal
        .checked_add(raw_adjustment)
        .map(round_money)
        .ok_or_else(overflow)?;

    Ok(SaleTotals {
        products_subtotal,
        returns_total,
        subtotal,
        adjustment: total - subtotal,
        total,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettledSale {
    pub sale: sale::Model,
    pub lines: Vec<sale_line::Model>,
    pub consumptions: Vec<Consumption>,
}

async fn charge_running_account<C: ConnectionTrait>(
    conn: &C,
    customer_id: Uuid,
    total: Decimal,
) -> Result<(), ServiceError> {
    let customer = customer::Entity::find_by_id(customer_id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", customer_id)))?;

    if customer.balance + total > customer.credit_limit {
        counter!("retail_ledger.sales.credit_rejections", 1);
        warn!(
            customer_id = %customer_id,
            balance = %customer.balance,
            credit_limit = %customer.credit_limit,
            attempted = %total,
            "Credit limit exceeded"
        );
        return Err(ServiceError::CreditLimitExceeded {
            customer_id,
            balance: customer.balance,
            credit_limit: customer.credit_limit,
            attempted: total,
        });
    }

    let balance = customer.balance + total;
    let mut active: customer::ActiveModel = customer.into();
    active.balance = Set(balance);
    active.update(conn).await?;
    Ok(())
}

async fn credit_container_return<C: ConnectionTrait>(
    conn: &C,
    container_id: Uuid,
    branch_id: Uuid,
    quantity: i32,
) -> Result<(), ServiceError> {
    returnable_container::Entity::find_by_id(container_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Container {} not found", container_id)))?;

    let existing = container_stock::Entity::find()
        .filter(container_stock::Column::ContainerId.eq(container_id))
        .filter(container_stock::Column::BranchId.eq(branch_id))
        .lock_exclusive()
        .one(conn)
        .await?;

    match existing {
        Some(row) => {
            let count = row.empty_count.checked_add(quantity).ok_or_else(|| {
                ServiceError::InvalidQuantity(format!(
                    "container count {} cannot take {} more",
                    row.empty_count, quantity
                ))
            })?;
            let mut active: container_stock::ActiveModel = row.into();
            active.empty_count = Set(count);
            active.update(conn).await?;
        }
        None => {
            container_stock::ActiveModel {
                id: Set(Uuid::new_v4()),
                container_id: Set(container_id),
                branch_id: Set(branch_id),
                empty_count: Set(quantity),
            }
            .insert(conn)
            .await?;
        }
    }
    Ok(())
}

/// Runs the whole settlement on `conn`. The caller owns the transaction.
pub async fn settle_in<C: ConnectionTrait>(
    conn: &C,
    branch_id: Uuid,
    request: &SettleSaleRequest,
    totals: SaleTotals,
) -> Result<SettledSale, ServiceError> {
    if let Some(customer_id) = request.customer_id {
        if request.payment_method.requires_customer() {
            charge_running_account(conn, customer_id, totals.total).await?;
        } else {
            customer::Entity::find_by_id(customer_id)
                .one(conn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Customer {} not found", customer_id))
                })?;
        }
    }

    let sale = sale::ActiveModel {
        id: Set(Uuid::new_v4()),
        branch_id: Set(branch_id),
        customer_id: Set(request.customer_id),
        payment_method: Set(request.payment_method),
        installments: Set(request.installments),
        subtotal: Set(totals.subtotal),
        adjustment: Set(totals.adjustment),
        total: Set(totals.total),
        sold_at: Set(request.sold_at.unwrap_or_else(Utc::now)),
    }
    .insert(conn)
    .await?;

    let mut lines = Vec::with_capacity(request.lines.len());
    let mut consumptions = Vec::new();
    for line in &request.lines {
        let (kind, product_id, container_id) = match line {
            CartLine::Product {
                product_id,
                quantity,
                ..
            } => {
                product::Entity::find_by_id(*product_id)
                    .one(conn)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Product {} not found", product_id))
                    })?;
                let consumption = consume_fefo(
                    conn,
                    *product_id,
                    branch_id,
                    Some(StockLocation::Shelf),
                    *quantity,
                    ShortfallPolicy::Reject,
                )
                .await?;
                consumptions.push(consumption);
                (SaleLineKind::Product, Some(*product_id), None)
            }
            CartLine::ContainerReturn {
                container_id,
                quantity,
                ..
            } => {
                credit_container_return(conn, *container_id, branch_id, *quantity).await?;
                (SaleLineKind::ContainerReturn, None, Some(*container_id))
            }
        };

        let row = sale_line::ActiveModel {
            id: Set(Uuid::new_v4()),
            sale_id: Set(sale.id),
            line_kind: Set(kind),
            product_id: Set(product_id),
            container_id: Set(container_id),
            quantity: Set(line.quantity()),
            unit_price: Set(line.unit_price()),
            line_total: Set(line.line_total()?),
        }
        .insert(conn)
        .await?;
        lines.push(row);
    }

    Ok(SettledSale {
        sale,
        lines,
        consumptions,
    })
}

#[derive(Clone)]
pub struct SettlementService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
}

impl SettlementService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Settles a cart at the scoped branch. `pricing` is read once for this
    /// sale.
    #[instrument(skip(self, request, pricing), fields(lines = request.lines.len(), method = %request.payment_method))]
    pub async fn settle(
        &self,
        scope: BranchScope,
        request: SettleSaleRequest,
        pricing: &PricingConfig,
    ) -> Result<SettledSale, ServiceError> {
        let branch_id = scope.single()?;
        request.check()?;
        let totals = compute_totals(&request.lines, request.payment_method, pricing)?;

        let txn = db::begin(&self.db_pool).await?;
        let outcome = settle_in(&txn, branch_id, &request, totals).await;
        let settled = db::finish(txn, outcome).await.map_err(|e| {
            counter!("retail_ledger.sales.rejected", 1, "reason" => e.error_code());
            e
        })?;

        counter!("retail_ledger.sales.settled", 1);
        info!(
            sale_id = %settled.sale.id,
            total = %settled.sale.total,
            "Sale settled"
        );

        self.event_sender
            .publish(Event::SaleSettled {
                sale_id: settled.sale.id,
                branch_id,
                payment_method: settled.sale.payment_method,
                total: settled.sale.total,
                customer_id: settled.sale.customer_id,
            });
        for consumption in &settled.consumptions {
            self.event_sender
                .publish(Event::LotsConsumed {
                    product_id: consumption.product_id,
                    branch_id,
                    quantity: consumption.consumed,
                    changes: consumption.mutations.iter().map(LotChange::from).collect(),
                });
        }

        Ok(settled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn pricing() -> PricingConfig {
        PricingConfig {
            cash_discount_pct: dec!(10),
            credit_surcharge_pct: dec!(10.5),
            qr_surcharge_pct: dec!(5),
        }
    }

    fn product_line(quantity: i32, unit_price: Decimal) -> CartLine {
        CartLine::Product {
            product_id: Uuid::nil(),
            quantity,
            unit_price,
        }
    }

    #[test]
    fn credit_surcharge_rounds_half_up() {
        let totals = compute_totals(
            &[product_line(1, dec!(100.00))],
            PaymentMethod::Credit,
            &pricing(),
        )
        .unwrap();
        assert_eq!(totals.adjustment, dec!(10.50));
        assert_eq!(totals.total, dec!(110.50));
        assert_eq!(totals.subtotal + totals.adjustment, totals.total);
    }

    #[rstest]
    #[case(PaymentMethod::Cash, dec!(-2.00), dec!(18.00))]
    #[case(PaymentMethod::Qr, dec!(1.00), dec!(21.00))]
    #[case(PaymentMethod::Debit, dec!(0), dec!(20.00))]
    #[case(PaymentMethod::RunningAccount, dec!(0), dec!(20.00))]
    fn adjustment_follows_payment_method(
        #[case] method: PaymentMethod,
        #[case] adjustment: Decimal,
        #[case] total: Decimal,
    ) {
        let totals = compute_totals(&[product_line(2, dec!(10))], method, &pricing()).unwrap();
        assert_eq!(totals.adjustment, adjustment);
        assert_eq!(totals.total, total);
    }

    #[test]
    fn container_refunds_are_not_discounted() {
        let lines = vec![
            product_line(1, dec!(50)),
            CartLine::ContainerReturn {
                container_id: Uuid::nil(),
                quantity: 2,
                unit_price: dec!(-5),
            },
        ];
        let totals = compute_totals(&lines, PaymentMethod::Cash, &pricing()).unwrap();
        assert_eq!(totals.products_subtotal, dec!(50));
        assert_eq!(totals.returns_total, dec!(-10));
        assert_eq!(totals.subtotal, dec!(40));
        assert_eq!(totals.adjustment, dec!(-5));
        assert_eq!(totals.total, dec!(35));
    }

    #[test]
    fn odd_cents_keep_total_consistent() {
        let pricing = PricingConfig {
            credit_surcharge_pct: dec!(7.5),
            ..Default::default()
        };
        let totals =
            compute_totals(&[product_line(3, dec!(0.33))], PaymentMethod::Credit, &pricing).unwrap();
        // 0.99 * 1.075 = 1.06425
        assert_eq!(totals.total, dec!(1.06));
        assert_eq!(totals.subtotal + totals.adjustment, totals.total);
    }

    #[test]
    fn subtotal_matches_stored_line_totals() {
        let lines = vec![product_line(1, dec!(0.005)), product_line(1, dec!(0.005))];
        let totals = compute_totals(&lines, PaymentMethod::Debit, &pricing()).unwrap();
        let stored: Decimal = lines.iter().map(|l| l.line_total().unwrap()).sum();
        assert_eq!(stored, dec!(0.02));
        assert_eq!(totals.subtotal, stored);
        assert_eq!(totals.total, dec!(0.02));
    }

    #[test]
    fn oversized_line_amount_is_an_error() {
        let line = product_line(i32::MAX, Decimal::MAX);
        assert_matches!(line.line_total(), Err(ServiceError::InvalidQuantity(_)));
        assert_matches!(
            compute_totals(&[line], PaymentMethod::Cash, &pricing()),
            Err(ServiceError::InvalidQuantity(_))
        );
    }

    #[test]
    fn empty_cart_is_rejected() {
        let request = SettleSaleRequest::new(vec![], PaymentMethod::Cash);
        assert_matches!(request.check(), Err(ServiceError::EmptyCart));
    }

    #[test]
    fn running_account_needs_customer() {
        let request = SettleSaleRequest::new(
            vec![product_line(1, dec!(1))],
            PaymentMethod::RunningAccount,
        );
        assert_matches!(request.check(), Err(ServiceError::MissingCustomer));
    }

    #[rstest]
    #[case(product_line(0, dec!(1)))]
    #[case(product_line(-2, dec!(1)))]
    fn non_positive_quantities_are_rejected(#[case] line: CartLine) {
        let request = SettleSaleRequest::new(vec![line], PaymentMethod::Cash);
        assert_matches!(request.check(), Err(ServiceError::InvalidQuantity(_)));
    }

    #[test]
    fn positive_container_refund_is_rejected() {
        let request = SettleSaleRequest::new(
            vec![CartLine::ContainerReturn {
                container_id: Uuid::nil(),
                quantity: 1,
                unit_price: dec!(3),
            }],
            PaymentMethod::Cash,
        );
        assert_matches!(request.check(), Err(ServiceError::InvalidInput(_)));
    }

    #[test]
    fn installments_are_bounded() {
        let mut request = SettleSaleRequest::new(vec![product_line(1, dec!(1))], PaymentMethod::Credit);
        request.installments = 0;
        assert_matches!(request.check(), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn cart_lines_deserialize_by_kind() {
        let json = r#"[
            {"kind": "product", "product_id": "00000000-0000-0000-0000-000000000000", "quantity": 2, "unit_price": "3.50"},
            {"kind": "container_return", "container_id": "00000000-0000-0000-0000-000000000000", "quantity": 1, "unit_price": "-1.00"}
        ]"#;
        let lines: Vec<CartLine> = serde_json::from_str(json).unwrap();
        assert_eq!(lines[0].line_total().unwrap(), dec!(7.00));
        assert_matches!(lines[1], CartLine::ContainerReturn { .. });
    }
}
