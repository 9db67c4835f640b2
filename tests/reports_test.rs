mod common;

use std::collections::HashMap;

use chrono::Duration;
use common::{at_noon, date, TestApp};
use assert_matches::assert_matches;
use retail_ledger::{
    auth::BranchScope,
    entities::{PaymentMethod, StockLocation},
    errors::ServiceError,
    events::Event,
    services::{
        accounts::SupplierInvoiceRequest,
        reports::{BasketThresholds, UNASSIGNED_SUPPLIER},
    },
};
use rust_decimal_macros::dec;

#[tokio::test]
async fn count_discrepancies_compare_branch_stock() {
    let mut app = TestApp::new().await;
    let branch = app.branch("Centro").await;
    let other = app.branch("Norte").await;
    let arroz = app.product("Arroz").await;
    let fideos = app.product("Fideos").await;
    let harina = app.product("Harina").await;
    app.shelf_lot(arroz, branch, 4, None).await;
    app.lot(arroz, branch, 6, None, StockLocation::Backroom).await;
    app.shelf_lot(fideos, branch, 5, None).await;
    app.shelf_lot(harina, other, 9, None).await;

    let counted = HashMap::from([(arroz, 8), (fideos, 5), (harina, 2)]);
    let found = app
        .state
        .services
        .reports
        .count_discrepancies(BranchScope::Branch(branch), counted)
        .await
        .unwrap();

    let summary: Vec<_> = found
        .iter()
        .map(|d| (d.product_name.as_str(), d.system, d.counted, d.difference))
        .collect();
    assert_eq!(summary, vec![("Arroz", 10, 8, -2), ("Harina", 0, 2, 2)]);
}

#[tokio::test]
async fn purchase_suggestions_group_by_supplier() {
    let mut app = TestApp::new().await;
    let branch = app.branch("Centro").await;
    let sur = app.supplier("Lacteos del Sur").await;
    let leche = app
        .product_with("Leche", None, 10, Some(sur.id), None)
        .await;
    let queso = app
        .product_with("Queso", None, 4, Some(sur.id), None)
        .await;
    let pan = app.product_with("Pan", None, 6, None, None).await;
    // no lot rows at all, so no suggestion
    app.product_with("Nunca cargado", None, 6, None, None).await;
    app.shelf_lot(leche.id, branch, 3, None).await;
    app.shelf_lot(queso.id, branch, 9, None).await;
    app.shelf_lot(pan.id, branch, 0, None).await;

    let groups = app
        .state
        .services
        .reports
        .purchase_suggestions(BranchScope::Branch(branch), date(2024, 5, 1))
        .await
        .unwrap();

    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].supplier_name, "Lacteos del Sur");
    assert_eq!(groups[0].items.len(), 1);
    assert_eq!(groups[0].items[0].product_id, leche.id);
    assert_eq!(groups[0].items[0].suggested_quantity, 12);
    assert_eq!(groups[1].supplier_name, UNASSIGNED_SUPPLIER);
    assert_eq!(groups[1].supplier_id, None);
    assert_eq!(groups[1].items[0].suggested_quantity, 9);
}

#[tokio::test]
async fn shift_close_nets_movements_since_previous_close() {
    let mut app = TestApp::new().await;
    let branch = app.branch("Centro").await;
    let product = app.product("Gaseosa").await;
    let supplier = app.supplier("Bebidas del Este").await;
    let customer = app.customer(dec!(1000)).await;
    let day = date(2024, 5, 1);
    let morning = day.and_hms_opt(8, 0, 0).unwrap().and_utc();
    let evening = day.and_hms_opt(20, 0, 0).unwrap().and_utc();

    // before the first close
    app.past_sale(branch, product, 1, dec!(500), PaymentMethod::Cash, morning - Duration::hours(1))
        .await;
    let reports = app.state.services.reports.clone();
    let first = reports
        .close_shift(BranchScope::Branch(branch), "ana", dec!(500), morning)
        .await
        .unwrap();
    assert_eq!(first.cash_difference, dec!(0));

    app.past_sale(branch, product, 2, dec!(100), PaymentMethod::Cash, at_noon(day))
        .await;
    app.past_sale(branch, product, 1, dec!(40), PaymentMethod::Credit, at_noon(day))
        .await;
    app.past_sale(branch, product, 1, dec!(10), PaymentMethod::Debit, at_noon(day))
        .await;
    app.past_sale(branch, product, 1, dec!(15), PaymentMethod::Qr, at_noon(day))
        .await;
    app.past_sale(branch, product, 1, dec!(60), PaymentMethod::RunningAccount, at_noon(day))
        .await;
    app.state
        .services
        .accounts
        .record_customer_payment(BranchScope::Branch(branch), customer, dec!(25), at_noon(day))
        .await
        .unwrap();
    app.state
        .services
        .accounts
        .record_supplier_payment(BranchScope::Branch(branch), supplier.id, dec!(30), at_noon(day))
        .await
        .unwrap();

    let summary = reports
        .shift_summary(BranchScope::Branch(branch), evening)
        .await
        .unwrap();
    assert_eq!(summary.started_at, Some(morning));
    assert_eq!(summary.cash_sales, dec!(100));
    assert_eq!(summary.card_sales, dec!(50));
    assert_eq!(summary.qr_sales, dec!(15));
    assert_eq!(summary.customer_collections, dec!(25));
    assert_eq!(summary.supplier_payments, dec!(30));
    assert_eq!(summary.expected_cash, dec!(95));

    app.drain_events();
    let closed = reports
        .close_shift(BranchScope::Branch(branch), "ana", dec!(90), evening)
        .await
        .unwrap();
    assert_eq!(closed.expected_cash, dec!(95));
    assert_eq!(closed.cash_difference, dec!(-5));
    assert!(app
        .drain_events()
        .iter()
        .any(|e| matches!(e, Event::ShiftClosed { cash_difference, .. } if *cash_difference == dec!(-5))));
}

#[tokio::test]
async fn daily_sales_and_expiry_alerts() {
    let mut app = TestApp::new().await;
    let branch = app.branch("Centro").await;
    let product = app.product("Yogur").await;
    let today = date(2024, 5, 10);

    app.past_sale(branch, product, 1, dec!(10), PaymentMethod::Cash, at_noon(today))
        .await;
    app.past_sale(branch, product, 1, dec!(5), PaymentMethod::Qr, at_noon(today))
        .await;
    app.past_sale(branch, product, 1, dec!(7), PaymentMethod::Cash, at_noon(today - Duration::days(6)))
        .await;
    app.past_sale(branch, product, 1, dec!(99), PaymentMethod::Cash, at_noon(today - Duration::days(7)))
        .await;

    let series = app
        .state
        .services
        .reports
        .daily_sales(BranchScope::All, today, 7)
        .await
        .unwrap();
    assert_eq!(series.len(), 7);
    assert_eq!(series[0].date, today - Duration::days(6));
    assert_eq!(series[0].total, dec!(7));
    assert_eq!(series[3].total, dec!(0));
    assert_eq!(series[6].total, dec!(15));

    for days in [25, 1, 20, 3, 0, 7, 12, -1] {
        app.shelf_lot(product, branch, 2, Some(today + Duration::days(days)))
            .await;
    }
    app.shelf_lot(product, branch, 0, Some(today + Duration::days(2)))
        .await;

    let alerts = app
        .state
        .services
        .reports
        .expiry_alerts(BranchScope::Branch(branch), today)
        .await
        .unwrap();
    let days: Vec<i64> = alerts.iter().map(|a| a.days_left).collect();
    assert_eq!(days, vec![0, 1, 3, 7, 12]);
}

#[tokio::test]
async fn period_report_splits_income_from_running_account() {
    let app = TestApp::new().await;
    let branch = app.branch("Centro").await;
    let other = app.branch("Norte").await;
    let yerba = app.product("Yerba").await;
    let day = date(2024, 3, 10);

    app.past_sale(branch, yerba, 1, dec!(100), PaymentMethod::Cash, at_noon(day)).await;
    app.past_sale(branch, yerba, 1, dec!(50), PaymentMethod::Qr, at_noon(day + Duration::days(1))).await;
    app.past_sale(branch, yerba, 1, dec!(30), PaymentMethod::RunningAccount, at_noon(day)).await;
    app.past_sale(other, yerba, 1, dec!(20), PaymentMethod::Cash, at_noon(day)).await;
    app.past_sale(branch, yerba, 1, dec!(999), PaymentMethod::Cash, at_noon(day - Duration::days(1))).await;

    let accounts = &app.state.services.accounts;
    let scope = BranchScope::Branch(branch);
    let client = app.customer(dec!(500)).await;
    accounts
        .record_customer_payment(scope, client, dec!(40), at_noon(day))
        .await
        .unwrap();
    let vendor = app.supplier("Molinos").await;
    accounts
        .register_supplier_invoice(
            scope,
            SupplierInvoiceRequest {
                supplier_id: vendor.id,
                invoice_number: Some("A-1".into()),
                amount: dec!(200),
                invoice_date: day,
                due_date: None,
            },
        )
        .await
        .unwrap();
    accounts
        .record_supplier_payment(scope, vendor.id, dec!(80), at_noon(day))
        .await
        .unwrap();

    let reports = &app.state.services.reports;
    let report = reports
        .period_report(scope, day, day + Duration::days(1))
        .await
        .unwrap();
    let income: Vec<(PaymentMethod, _)> = report
        .income_by_method
        .iter()
        .map(|m| (m.payment_method, m.total))
        .collect();
    assert_eq!(
        income,
        vec![(PaymentMethod::Cash, dec!(100)), (PaymentMethod::Qr, dec!(50))]
    );
    assert_eq!(report.running_account_sales, dec!(30));
    assert_eq!(report.customer_collections, dec!(40));
    assert_eq!(report.supplier_payments, dec!(80));
    assert_eq!(report.customer_balances, dec!(-40));
    assert_eq!(report.supplier_balances, dec!(120));
    assert_eq!(report.branch_id, Some(branch));
    assert_eq!(report.recent_sales.len(), 3);
    assert_eq!(report.recent_sales[0].total, dec!(50));

    let everywhere = reports
        .period_report(BranchScope::All, day, day)
        .await
        .unwrap();
    let cash = everywhere
        .income_by_method
        .iter()
        .find(|m| m.payment_method == PaymentMethod::Cash)
        .map(|m| m.total);
    assert_eq!(cash, Some(dec!(120)));
    assert_eq!(everywhere.branch_id, None);

    assert_matches!(
        reports.period_report(scope, day, day - Duration::days(1)).await,
        Err(ServiceError::InvalidInput(_))
    );
}

#[tokio::test]
async fn basket_analysis_pairs_products_sold_together() {
    let app = TestApp::new().await;
    let branch = app.branch("Centro").await;
    let other = app.branch("Norte").await;
    let pan = app.product("Pan").await;
    let leche = app.product("Leche").await;
    let manteca = app.product("Manteca").await;
    let cafe = app.product("Cafe").await;
    let azucar = app.product("Azucar").await;
    let when = at_noon(date(2024, 3, 10));

    for _ in 0..3 {
        app.basket_sale(branch, &[pan, leche], when).await;
    }
    app.basket_sale(branch, &[pan, manteca], when).await;
    app.basket_sale(branch, &[cafe, azucar], when).await;
    app.basket_sale(branch, &[pan], when).await;
    app.basket_sale(other, &[cafe, azucar], when).await;

    let reports = &app.state.services.reports;
    let rules = reports
        .basket_analysis(BranchScope::Branch(branch), BasketThresholds::default())
        .await
        .unwrap();
    let flat: Vec<(&str, &str)> = rules
        .iter()
        .map(|r| (r.antecedent.as_str(), r.consequent.as_str()))
        .collect();
    assert_eq!(
        flat,
        vec![
            ("Azucar", "Cafe"),
            ("Cafe", "Azucar"),
            ("Leche", "Pan"),
            ("Manteca", "Pan"),
            ("Pan", "Leche"),
            ("Pan", "Manteca"),
        ]
    );
    // The single-line sale is not a basket: five baskets, not six.
    assert_eq!(rules[0].lift, 5.0);
    assert_eq!(rules[3].antecedent_id, manteca);
    assert_eq!(rules[3].consequent_id, pan);

    let everywhere = reports
        .basket_analysis(BranchScope::All, BasketThresholds::default())
        .await
        .unwrap();
    assert_eq!(everywhere.len(), 6);
    assert_eq!(everywhere[0].antecedent, "Azucar");
    assert_eq!(everywhere[0].lift, 3.0);
    assert_eq!(everywhere[0].support_pct, 33.33);
}
