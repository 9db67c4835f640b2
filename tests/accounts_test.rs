mod common;

use assert_matches::assert_matches;
use chrono::Utc;
use common::{date, TestApp};
use retail_ledger::{
    auth::BranchScope,
    entities::{customer_payment, supplier},
    errors::ServiceError,
    events::Event,
    services::accounts::SupplierInvoiceRequest,
};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};
use uuid::Uuid;

async fn supplier_balance(app: &TestApp, id: Uuid) -> rust_decimal::Decimal {
    supplier::Entity::find_by_id(id)
        .one(app.db())
        .await
        .unwrap()
        .unwrap()
        .balance
}

#[tokio::test]
async fn customer_payment_lowers_balance() {
    let mut app = TestApp::new().await;
    let branch = app.branch("Centro").await;
    let customer = app.customer(dec!(500)).await;
    let owed = retail_ledger::entities::customer::Entity::find_by_id(customer)
        .one(app.db())
        .await
        .unwrap()
        .unwrap();
    let mut owed: retail_ledger::entities::customer::ActiveModel = owed.into();
    owed.balance = Set(dec!(120));
    owed.update(app.db()).await.unwrap();
    app.drain_events();

    let payment = app
        .state
        .services
        .accounts
        .record_customer_payment(BranchScope::Branch(branch), customer, dec!(45.50), Utc::now())
        .await
        .unwrap();

    assert_eq!(payment.amount, dec!(45.50));
    assert_eq!(app.customer_balance(customer).await, dec!(74.50));
    assert_matches!(
        app.drain_events().as_slice(),
        [Event::CustomerPaymentRecorded { amount, .. }] if *amount == dec!(45.50)
    );
}

#[tokio::test]
async fn non_positive_and_unknown_payments_are_rejected() {
    let app = TestApp::new().await;
    let branch = app.branch("Centro").await;
    let customer = app.customer(dec!(500)).await;
    let accounts = &app.state.services.accounts;

    let zero = accounts
        .record_customer_payment(BranchScope::Branch(branch), customer, dec!(0), Utc::now())
        .await;
    assert_matches!(zero, Err(ServiceError::InvalidInput(_)));

    let unknown = accounts
        .record_customer_payment(BranchScope::Branch(branch), Uuid::new_v4(), dec!(10), Utc::now())
        .await;
    assert_matches!(unknown, Err(ServiceError::NotFound(_)));

    assert_eq!(
        customer_payment::Entity::find().count(app.db()).await.unwrap(),
        0
    );
    assert_eq!(app.customer_balance(customer).await, dec!(0));
}

#[tokio::test]
async fn supplier_invoices_and_payments_move_the_balance() {
    let app = TestApp::new().await;
    let branch = app.branch("Centro").await;
    let supplier = app.supplier("Distribuidora Norte").await;
    let accounts = &app.state.services.accounts;

    let invoice = accounts
        .register_supplier_invoice(
            BranchScope::Branch(branch),
            SupplierInvoiceRequest {
                supplier_id: supplier.id,
                invoice_number: Some("A-0001-00001234".into()),
                amount: dec!(300),
                invoice_date: date(2024, 4, 2),
                due_date: Some(date(2024, 5, 2)),
            },
        )
        .await
        .unwrap();
    assert!(!invoice.paid);
    assert_eq!(supplier_balance(&app, supplier.id).await, dec!(300));

    accounts
        .record_supplier_payment(BranchScope::Branch(branch), supplier.id, dec!(120), Utc::now())
        .await
        .unwrap();
    assert_eq!(supplier_balance(&app, supplier.id).await, dec!(180));

    let negative = accounts
        .register_supplier_invoice(
            BranchScope::Branch(branch),
            SupplierInvoiceRequest {
                supplier_id: supplier.id,
                invoice_number: None,
                amount: dec!(-1),
                invoice_date: date(2024, 4, 3),
                due_date: None,
            },
        )
        .await;
    assert_matches!(negative, Err(ServiceError::InvalidInput(_)));
    assert_eq!(supplier_balance(&app, supplier.id).await, dec!(180));
}
