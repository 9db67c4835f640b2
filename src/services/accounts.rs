//! Running accounts: customer collections and supplier invoices/payments.
//!
//! Every operation writes the movement row and the balance change in one
//! transaction.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::BranchScope,
    db::{self, DbPool},
    entities::{customer, customer_payment, supplier, supplier_invoice, supplier_payment},
    errors::ServiceError,
    events::{Event, EventSender},
};

fn ensure_positive_amount(amount: Decimal) -> Result<(), ServiceError> {
    if amount <= Decimal::ZERO {
        warn!(%amount, "Rejected non-positive amount");
        return Err(ServiceError::InvalidInput(format!(
            "amount must be positive, got {}",
            amount
        )));
    }
    Ok(())
}

async fn find_customer<C: ConnectionTrait>(
    conn: &C,
    customer_id: Uuid,
) -> Result<customer::Model, ServiceError> {
    customer::Entity::find_by_id(customer_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", customer_id)))
}

async fn find_supplier<C: ConnectionTrait>(
    conn: &C,
    supplier_id: Uuid,
) -> Result<supplier::Model, ServiceError> {
    supplier::Entity::find_by_id(supplier_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Supplier {} not found", supplier_id)))
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SupplierInvoiceRequest {
    pub supplier_id: Uuid,
    #[validate(length(max = 64))]
    pub invoice_number: Option<String>,
    pub amount: Decimal,
    pub invoice_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
}

#[derive(Clone)]
pub struct AccountService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
}

impl AccountService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Records a collection on a customer's running account and lowers the
    /// balance by the same amount.
    #[instrument(skip(self))]
    pub async fn record_customer_payment(
        &self,
        scope: BranchScope,
        customer_id: Uuid,
        amount: Decimal,
        paid_at: DateTime<Utc>,
    ) -> Result<customer_payment::Model, ServiceError> {
        let branch_id = scope.single()?;
        ensure_positive_amount(amount)?;

        let txn = db::begin(&self.db_pool).await?;
        let outcome = async {
            let customer = find_customer(&txn, customer_id).await?;
            let balance = customer.balance - amount;
            let mut active: customer::ActiveModel = customer.into();
            active.balance = Set(balance);
            active.update(&txn).await?;

            let payment = customer_payment::ActiveModel {
                id: Set(Uuid::new_v4()),
                customer_id: Set(customer_id),
                branch_id: Set(branch_id),
                amount: Set(amount),
                paid_at: Set(paid_at),
            }
            .insert(&txn)
            .await?;
            Ok::<_, ServiceError>(payment)
        }
        .await;
        let payment = db::finish(txn, outcome).await?;

        info!(payment_id = %payment.id, %customer_id, %amount, "Customer payment recorded");
        self.event_sender
            .publish(Event::CustomerPaymentRecorded {
                payment_id: payment.id,
                customer_id,
                amount,
            });
        Ok(payment)
    }

    /// Registers an unpaid supplier invoice and raises the supplier balance.
    #[instrument(skip(self, request), fields(supplier_id = %request.supplier_id))]
    pub async fn register_supplier_invoice(
        &self,
        scope: BranchScope,
        request: SupplierInvoiceRequest,
    ) -> Result<supplier_invoice::Model, ServiceError> {
        let branch_id = scope.single()?;
        request.validate()?;
        ensure_positive_amount(request.amount)?;

        let txn = db::begin(&self.db_pool).await?;
        let outcome = async {
            let vendor = find_supplier(&txn, request.supplier_id).await?;
            let balance = vendor.balance + request.amount;
            let mut active: supplier::ActiveModel = vendor.into();
            active.balance = Set(balance);
            active.update(&txn).await?;

            let invoice = supplier_invoice::ActiveModel {
                id: Set(Uuid::new_v4()),
                supplier_id: Set(request.supplier_id),
                branch_id: Set(branch_id),
                invoice_number: Set(request
                    .invoice_number
                    .clone()
                    .filter(|n| !n.trim().is_empty())),
                amount: Set(request.amount),
                invoice_date: Set(request.invoice_date),
                due_date: Set(request.due_date),
                paid: Set(false),
                created_at: Set(Utc::now()),
            }
            .insert(&txn)
            .await?;
            Ok::<_, ServiceError>(invoice)
        }
        .await;
        let invoice = db::finish(txn, outcome).await?;

        info!(invoice_id = %invoice.id, amount = %invoice.amount, "Supplier invoice registered");
        self.event_sender
            .publish(Event::SupplierInvoiceRegistered {
                invoice_id: invoice.id,
                supplier_id: invoice.supplier_id,
                amount: invoice.amount,
            });
        Ok(invoice)
    }

    /// Pays a supplier and lowers the supplier balance.
    #[instrument(skip(self))]
    pub async fn record_supplier_payment(
        &self,
        scope: BranchScope,
        supplier_id: Uuid,
        amount: Decimal,
        paid_at: DateTime<Utc>,
    ) -> Result<supplier_payment::Model, ServiceError> {
        let branch_id = scope.single()?;
        ensure_positive_amount(amount)?;

        let txn = db::begin(&self.db_pool).await?;
        let outcome = async {
            let vendor = find_supplier(&txn, supplier_id).await?;
            let balance = vendor.balance - amount;
            let mut active: supplier::ActiveModel = vendor.into();
            active.balance = Set(balance);
            active.update(&txn).await?;

            let payment = supplier_payment::ActiveModel {
                id: Set(Uuid::new_v4()),
                supplier_id: Set(supplier_id),
                branch_id: Set(branch_id),
                amount: Set(amount),
                paid_at: Set(paid_at),
            }
            .insert(&txn)
            .await?;
            Ok::<_, ServiceError>(payment)
        }
        .await;
        let payment = db::finish(txn, outcome).await?;

        info!(payment_id = %payment.id, %supplier_id, %amount, "Supplier payment recorded");
        self.event_sender
            .publish(Event::SupplierPaymentRecorded {
                payment_id: payment.id,
                supplier_id,
                amount,
            });
        Ok(payment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    #[test]
    fn amounts_must_be_positive() {
        assert!(ensure_positive_amount(dec!(0.01)).is_ok());
        assert_matches!(ensure_positive_amount(dec!(0)), Err(ServiceError::InvalidInput(_)));
        assert_matches!(ensure_positive_amount(dec!(-5)), Err(ServiceError::InvalidInput(_)));
    }

    #[test]
    fn long_invoice_numbers_fail_validation() {
        let request = SupplierInvoiceRequest {
            supplier_id: Uuid::new_v4(),
            invoice_number: Some("x".repeat(65)),
            amount: dec!(10),
            invoice_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            due_date: None,
        };
        assert!(request.validate().is_err());
    }
}
