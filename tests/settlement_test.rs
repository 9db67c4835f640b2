mod common;

use assert_matches::assert_matches;
use common::{date, TestApp};
use retail_ledger::{
    auth::BranchScope,
    config::PricingConfig,
    entities::{container_stock, sale, sale_line, PaymentMethod, SaleLineKind},
    errors::ServiceError,
    events::Event,
    services::settlement::{CartLine, SettleSaleRequest},
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use uuid::Uuid;

fn pricing() -> PricingConfig {
    PricingConfig {
        cash_discount_pct: dec!(10),
        credit_surcharge_pct: dec!(10.5),
        qr_surcharge_pct: dec!(5),
    }
}

#[tokio::test]
async fn credit_sale_consumes_shelf_stock_and_persists_totals() {
    let mut app = TestApp::new().await;
    let branch = app.branch("Centro").await;
    let product = app.product("Vino").await;
    let lot = app.shelf_lot(product, branch, 5, Some(date(2024, 12, 1))).await;
    app.drain_events();

    let request = SettleSaleRequest::new(
        vec![CartLine::Product {
            product_id: product,
            quantity: 2,
            unit_price: dec!(50.00),
        }],
        PaymentMethod::Credit,
    );
    let settled = app
        .state
        .services
        .settlement
        .settle(BranchScope::Branch(branch), request, &pricing())
        .await
        .unwrap();

    assert_eq!(settled.sale.subtotal, dec!(100.00));
    assert_eq!(settled.sale.adjustment, dec!(10.50));
    assert_eq!(settled.sale.total, dec!(110.50));
    assert_eq!(settled.lines.len(), 1);
    assert_eq!(app.lot_quantity(lot).await, 3);

    let stored = sale::Entity::find_by_id(settled.sale.id)
        .one(app.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.total, dec!(110.50));

    let events = app.drain_events();
    assert_matches!(events.first(), Some(Event::SaleSettled { total, .. }) if *total == dec!(110.50));
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::LotsConsumed { quantity: 2, .. })));
}

#[tokio::test]
async fn credit_limit_rejection_leaves_no_trace() {
    let mut app = TestApp::new().await;
    let branch = app.branch("Centro").await;
    let product = app.product("Aceite").await;
    let lot = app.shelf_lot(product, branch, 10, None).await;
    let customer = app.customer(dec!(100)).await;

    let mut request = SettleSaleRequest::new(
        vec![CartLine::Product {
            product_id: product,
            quantity: 3,
            unit_price: dec!(50.00),
        }],
        PaymentMethod::RunningAccount,
    );
    request.customer_id = Some(customer);

    let err = app
        .state
        .services
        .settlement
        .settle(BranchScope::Branch(branch), request, &PricingConfig::default())
        .await
        .unwrap_err();

    assert_matches!(
        err,
        ServiceError::CreditLimitExceeded { attempted, credit_limit, .. }
            if attempted == dec!(150) && credit_limit == dec!(100)
    );
    assert_eq!(app.customer_balance(customer).await, Decimal::ZERO);
    assert_eq!(app.lot_quantity(lot).await, 10);
    assert_eq!(sale::Entity::find().count(app.db()).await.unwrap(), 0);
}

#[tokio::test]
async fn running_account_sale_within_limit_raises_balance() {
    let mut app = TestApp::new().await;
    let branch = app.branch("Centro").await;
    let product = app.product("Aceite").await;
    app.shelf_lot(product, branch, 10, None).await;
    let customer = app.customer(dec!(100)).await;

    let mut request = SettleSaleRequest::new(
        vec![CartLine::Product {
            product_id: product,
            quantity: 2,
            unit_price: dec!(40.00),
        }],
        PaymentMethod::RunningAccount,
    );
    request.customer_id = Some(customer);

    app.state
        .services
        .settlement
        .settle(BranchScope::Branch(branch), request, &pricing())
        .await
        .unwrap();
    assert_eq!(app.customer_balance(customer).await, dec!(80.00));
}

#[tokio::test]
async fn partial_shortage_rolls_back_every_line() {
    let mut app = TestApp::new().await;
    let branch = app.branch("Centro").await;
    let plenty = app.product("Agua").await;
    let scarce = app.product("Hielo").await;
    let plenty_lot = app.shelf_lot(plenty, branch, 10, None).await;
    let scarce_lot = app.shelf_lot(scarce, branch, 1, None).await;
    let container = app.container(dec!(0.50)).await;

    let request = SettleSaleRequest::new(
        vec![
            CartLine::Product {
                product_id: plenty,
                quantity: 4,
                unit_price: dec!(1.00),
            },
            CartLine::ContainerReturn {
                container_id: container,
                quantity: 2,
                unit_price: dec!(-0.50),
            },
            CartLine::Product {
                product_id: scarce,
                quantity: 3,
                unit_price: dec!(2.00),
            },
        ],
        PaymentMethod::Cash,
    );

    let err = app
        .state
        .services
        .settlement
        .settle(BranchScope::Branch(branch), request, &pricing())
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::InsufficientStock { requested: 3, available: 1, .. });
    assert_eq!(app.lot_quantity(plenty_lot).await, 10);
    assert_eq!(app.lot_quantity(scarce_lot).await, 1);
    assert_eq!(sale::Entity::find().count(app.db()).await.unwrap(), 0);
    assert_eq!(sale_line::Entity::find().count(app.db()).await.unwrap(), 0);
    assert_eq!(
        container_stock::Entity::find().count(app.db()).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn container_returns_credit_the_branch_counter() {
    let mut app = TestApp::new().await;
    let branch = app.branch("Centro").await;
    let beer = app.product("Cerveza").await;
    app.shelf_lot(beer, branch, 6, None).await;
    let bottle = app.container(dec!(0.50)).await;

    for _ in 0..2 {
        let request = SettleSaleRequest::new(
            vec![
                CartLine::Product {
                    product_id: beer,
                    quantity: 2,
                    unit_price: dec!(2.00),
                },
                CartLine::ContainerReturn {
                    container_id: bottle,
                    quantity: 2,
                    unit_price: dec!(-0.50),
                },
            ],
            PaymentMethod::Debit,
        );
        let settled = app
            .state
            .services
            .settlement
            .settle(BranchScope::Branch(branch), request, &pricing())
            .await
            .unwrap();
        assert_eq!(settled.sale.total, dec!(3.00));
        assert!(settled
            .lines
            .iter()
            .any(|l| l.line_kind == SaleLineKind::ContainerReturn && l.container_id == Some(bottle)));
    }

    let counter = container_stock::Entity::find()
        .filter(container_stock::Column::ContainerId.eq(bottle))
        .filter(container_stock::Column::BranchId.eq(branch))
        .one(app.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(counter.empty_count, 4);
}

#[tokio::test]
async fn sale_requires_a_branch_scope() {
    let app = TestApp::new().await;
    let product = app.product("Te").await;
    let request = SettleSaleRequest::new(
        vec![CartLine::Product {
            product_id: product,
            quantity: 1,
            unit_price: dec!(1.00),
        }],
        PaymentMethod::Cash,
    );

    let err = app
        .state
        .services
        .settlement
        .settle(BranchScope::All, request, &pricing())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidInput(_));
}

#[tokio::test]
async fn container_counter_overflow_rejects_the_sale() {
    let mut app = TestApp::new().await;
    let branch = app.branch("Centro").await;
    let soda = app.product("Gaseosa").await;
    let lot = app.shelf_lot(soda, branch, 3, None).await;
    let bottle = app.container(dec!(0.50)).await;
    container_stock::ActiveModel {
        id: Set(Uuid::new_v4()),
        container_id: Set(bottle),
        branch_id: Set(branch),
        empty_count: Set(i32::MAX),
    }
    .insert(app.db())
    .await
    .unwrap();

    let request = SettleSaleRequest::new(
        vec![
            CartLine::Product {
                product_id: soda,
                quantity: 1,
                unit_price: dec!(1.50),
            },
            CartLine::ContainerReturn {
                container_id: bottle,
                quantity: 1,
                unit_price: dec!(-0.50),
            },
        ],
        PaymentMethod::Cash,
    );
    let result = app
        .state
        .services
        .settlement
        .settle(BranchScope::Branch(branch), request, &pricing())
        .await;

    assert_matches!(result, Err(ServiceError::InvalidQuantity(_)));
    assert_eq!(app.lot_quantity(lot).await, 3);
    assert_eq!(sale::Entity::find().count(app.db()).await.unwrap(), 0);
}
