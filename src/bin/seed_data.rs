//! Seed data script - populates the database with a small demo store
//!
//! Run with: cargo run --bin seed-data
//!
//! This creates:
//! - 2 branches with a mix of shelf and backroom lots
//! - 3 suppliers and 3 categories
//! - 8 products, some perishable, some below their minimum
//! - a returnable container and two running-account customers
//! - a few weeks of cash and card sales so forecasts have history

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use retail_ledger::{
    auth::BranchScope,
    config::{self, PricingConfig},
    db,
    entities::{branch, category, customer, product, returnable_container, supplier, PaymentMethod, StockLocation},
    events::EventSender,
    services::{
        allocation::receive_lot,
        settlement::{CartLine, SettleSaleRequest, SettlementService},
    },
};

struct SeedProduct {
    name: &'static str,
    barcode: &'static str,
    cost: Decimal,
    price: Decimal,
    stock_minimo: i32,
    perishable: bool,
    /// (days to expire, shelf quantity, backroom quantity)
    lots: &'static [(Option<i64>, i32, i32)],
}

const PRODUCTS: &[SeedProduct] = &[
    SeedProduct { name: "Leche Entera 1L", barcode: "7790001000011", cost: dec!(0.80), price: dec!(1.20), stock_minimo: 20, perishable: true, lots: &[(Some(6), 12, 24), (Some(14), 0, 36)] },
    SeedProduct { name: "Yogur Frutilla", barcode: "7790001000028", cost: dec!(0.55), price: dec!(0.95), stock_minimo: 10, perishable: true, lots: &[(Some(3), 18, 0)] },
    SeedProduct { name: "Queso Cremoso", barcode: "7790001000035", cost: dec!(4.10), price: dec!(6.50), stock_minimo: 5, perishable: true, lots: &[(Some(25), 3, 0)] },
    SeedProduct { name: "Pan Lactal", barcode: "7790002000010", cost: dec!(1.30), price: dec!(2.10), stock_minimo: 8, perishable: true, lots: &[(None, 6, 0)] },
    SeedProduct { name: "Arroz 1kg", barcode: "7790003000019", cost: dec!(0.90), price: dec!(1.45), stock_minimo: 15, perishable: false, lots: &[(None, 10, 40)] },
    SeedProduct { name: "Fideos Tirabuzon", barcode: "7790003000026", cost: dec!(0.70), price: dec!(1.10), stock_minimo: 15, perishable: false, lots: &[(Some(300), 8, 4)] },
    SeedProduct { name: "Cerveza Retornable 1L", barcode: "7790004000018", cost: dec!(1.10), price: dec!(1.90), stock_minimo: 24, perishable: true, lots: &[(Some(120), 24, 48)] },
    SeedProduct { name: "Gaseosa Cola 2L", barcode: "7790004000025", cost: dec!(1.25), price: dec!(2.30), stock_minimo: 12, perishable: true, lots: &[(Some(90), 6, 0)] },
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_config = config::load_config()?;
    config::init_tracing(app_config.log_level(), app_config.log_json);

    info!("=== Retail Ledger Seed Data ===");
    let pool = db::establish_connection_from_app_config(&app_config).await?;
    db::run_migrations(&pool).await?;
    let pool = Arc::new(pool);
    let today = Utc::now().date_naive();

    info!("Creating branches...");
    let branches = create_branches(&pool).await?;

    info!("Creating suppliers and categories...");
    let suppliers = create_suppliers(&pool).await?;
    let categories = create_categories(&pool).await?;

    info!("Creating products and lots...");
    let products = create_products(&pool, &suppliers, &categories, &branches, today).await?;
    info!("  Created {} products", products.len());

    info!("Creating customers and containers...");
    create_customers(&pool).await?;
    returnable_container::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set("Botella 1L".to_string()),
        deposit_value: Set(dec!(0.50)),
    }
    .insert(&*pool)
    .await?;

    info!("Creating sales history...");
    let (events, _rx) = EventSender::channel(1024);
    let settlement = SettlementService::new(pool.clone(), events);
    let sales = create_sales(&settlement, branches[0], &products, today).await?;
    info!("  Settled {} sales", sales);

    info!("=== Seed Data Complete ===");
    info!("Try: retail-cli risk report");
    info!("     retail-cli forecast run");
    info!("     retail-cli reports purchases");
    Ok(())
}

async fn create_branches(db: &DatabaseConnection) -> anyhow::Result<Vec<Uuid>> {
    let mut ids = Vec::new();
    for (name, address) in [("Centro", "Av. Principal 100"), ("Barrio Norte", "Calle 12 345")] {
        let model = branch::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            address: Set(Some(address.to_string())),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await?;
        ids.push(model.id);
    }
    Ok(ids)
}

async fn create_suppliers(db: &DatabaseConnection) -> anyhow::Result<Vec<Uuid>> {
    let mut ids = Vec::new();
    for (name, weekday) in [("Lacteos del Sur", Some(1)), ("Distribuidora Norte", Some(3)), ("Bebidas del Este", None)] {
        let model = supplier::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            contact: Set(None),
            balance: Set(Decimal::ZERO),
            delivery_weekday: Set(weekday),
            delivery_frequency: Set(weekday.map(|_| "weekly".to_string())),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await?;
        ids.push(model.id);
    }
    Ok(ids)
}

async fn create_categories(db: &DatabaseConnection) -> anyhow::Result<Vec<Uuid>> {
    let mut ids = Vec::new();
    for (name, margin) in [("Lacteos", dec!(35)), ("Almacen", dec!(40)), ("Bebidas", dec!(50))] {
        let model = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            margin_pct: Set(margin),
        }
        .insert(db)
        .await?;
        ids.push(model.id);
    }
    Ok(ids)
}

async fn create_products(
    db: &DatabaseConnection,
    suppliers: &[Uuid],
    categories: &[Uuid],
    branches: &[Uuid],
    today: NaiveDate,
) -> anyhow::Result<Vec<Uuid>> {
    let mut ids = Vec::new();
    for (i, seed) in PRODUCTS.iter().enumerate() {
        let group = match i {
            0..=3 => 0,
            4 | 5 => 1,
            _ => 2,
        };
        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            barcode: Set(Some(seed.barcode.to_string())),
            name: Set(seed.name.to_string()),
            cost: Set(seed.cost),
            sale_price: Set(seed.price),
            stock_minimo: Set(seed.stock_minimo),
            perishable: Set(seed.perishable),
            favorite: Set(i < 3),
            // Pan Lactal has no supplier on purpose
            supplier_id: Set((i != 3).then(|| suppliers[group])),
            category_id: Set(Some(categories[group])),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await?;

        for branch_id in branches {
            for (days, shelf, backroom) in seed.lots {
                let expiration = days.map(|d| today + Duration::days(d));
                for (quantity, location) in [(*shelf, StockLocation::Shelf), (*backroom, StockLocation::Backroom)] {
                    if quantity > 0 {
                        receive_lot(db, model.id, *branch_id, quantity, expiration, location).await?;
                    }
                }
            }
        }
        ids.push(model.id);
    }
    Ok(ids)
}

async fn create_customers(db: &DatabaseConnection) -> anyhow::Result<()> {
    for (name, limit) in [("Marta Gomez", dec!(100)), ("Jorge Paz", dec!(250))] {
        customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            full_name: Set(name.to_string()),
            document: Set(None),
            phone: Set(None),
            credit_limit: Set(limit),
            balance: Set(Decimal::ZERO),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await?;
    }
    Ok(())
}

/// One or two small sales per day over the last three weeks, shelf stock
/// permitting.
async fn create_sales(
    settlement: &SettlementService,
    branch_id: Uuid,
    products: &[Uuid],
    today: NaiveDate,
) -> anyhow::Result<usize> {
    let pricing = PricingConfig::default();
    let mut settled = 0;
    for days_ago in (1..=21i64).rev() {
        let sold_at = (today - Duration::days(days_ago))
            .and_hms_opt(12, 0, 0)
            .map(|t| t.and_utc());
        for (offset, method) in [(0usize, PaymentMethod::Cash), (4, PaymentMethod::Debit)] {
            let product_id = products[(days_ago as usize + offset) % products.len()];
            let mut request = SettleSaleRequest::new(
                vec![CartLine::Product {
                    product_id,
                    quantity: 1,
                    unit_price: PRODUCTS[(days_ago as usize + offset) % PRODUCTS.len()].price,
                }],
                method,
            );
            request.sold_at = sold_at;
            match settlement
                .settle(BranchScope::Branch(branch_id), request, &pricing)
                .await
            {
                Ok(_) => settled += 1,
                Err(e) => warn!(
                    product_id = %product_id,
                    days_ago,
                    code = e.error_code(),
                    error = %e,
                    "Seed sale rejected"
                ),
            }
        }
    }
    Ok(settled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejected_sales_are_skipped_not_fatal() {
        let pool = db::establish_connection_with_config(&db::DbConfig::in_memory())
            .await
            .unwrap();
        db::run_migrations(&pool).await.unwrap();
        let pool = Arc::new(pool);
        let today = Utc::now().date_naive();

        let branches = create_branches(&pool).await.unwrap();
        let suppliers = create_suppliers(&pool).await.unwrap();
        let categories = create_categories(&pool).await.unwrap();
        // Stock only the first branch.
        let products = create_products(&pool, &suppliers, &categories, &branches[..1], today)
            .await
            .unwrap();

        let (events, _rx) = EventSender::channel(1024);
        let settlement = SettlementService::new(pool.clone(), events);

        let empty = create_sales(&settlement, branches[1], &products, today)
            .await
            .unwrap();
        assert_eq!(empty, 0);

        // Queso Cremoso has 3 units on the shelf and is asked for 5 times.
        let stocked = create_sales(&settlement, branches[0], &products, today)
            .await
            .unwrap();
        assert!(stocked > 0 && stocked < 42, "settled {stocked}");
    }
}
