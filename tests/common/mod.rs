#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use tokio::sync::mpsc;
use uuid::Uuid;

use retail_ledger::{
    config::AppConfig,
    db::{self, DbConfig, DbPool},
    entities::{
        branch, category, customer, product, returnable_container, sale, sale_line, stock_lot,
        supplier, PaymentMethod, SaleLineKind, StockLocation,
    },
    events::Event,
    AppState,
};

/// Application state over a fresh, migrated in-memory SQLite database.
pub struct TestApp {
    pub state: AppState,
    events: mpsc::Receiver<Event>,
    /// Lots inserted by fixtures get strictly increasing creation times
    lot_clock: DateTime<Utc>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let mut config = AppConfig::new("sqlite::memory:".to_string(), "test".to_string());
        config.event_channel_capacity = 4096;
        adjust(&mut config);

        let pool = db::establish_connection_with_config(&DbConfig::in_memory())
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to migrate test database");

        let (state, events) = AppState::new(Arc::new(pool), config);
        Self {
            state,
            events,
            lot_clock: Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap(),
        }
    }

    pub fn db(&self) -> &DbPool {
        &self.state.db
    }

    /// Events published so far, oldest first.
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    pub async fn branch(&self, name: &str) -> Uuid {
        branch::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            address: Set(None),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("insert branch")
        .id
    }

    pub async fn supplier(&self, name: &str) -> supplier::Model {
        supplier::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            contact: Set(None),
            balance: Set(Decimal::ZERO),
            delivery_weekday: Set(None),
            delivery_frequency: Set(None),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("insert supplier")
    }

    pub async fn category(&self, name: &str, margin_pct: Decimal) -> Uuid {
        category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            margin_pct: Set(margin_pct),
        }
        .insert(self.db())
        .await
        .expect("insert category")
        .id
    }

    pub async fn product(&self, name: &str) -> Uuid {
        self.product_with(name, None, 5, None, None).await.id
    }

    pub async fn product_with(
        &self,
        name: &str,
        barcode: Option<&str>,
        stock_minimo: i32,
        supplier_id: Option<Uuid>,
        category_id: Option<Uuid>,
    ) -> product::Model {
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            barcode: Set(barcode.map(str::to_string)),
            name: Set(name.to_string()),
            cost: Set(Decimal::ONE),
            sale_price: Set(Decimal::TWO),
            stock_minimo: Set(stock_minimo),
            perishable: Set(true),
            favorite: Set(false),
            supplier_id: Set(supplier_id),
            category_id: Set(category_id),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("insert product")
    }

    /// Inserts a lot directly, bypassing the allocation engine.
    pub async fn lot(
        &mut self,
        product_id: Uuid,
        branch_id: Uuid,
        quantity: i32,
        expiration_date: Option<NaiveDate>,
        location: StockLocation,
    ) -> Uuid {
        self.lot_clock += Duration::minutes(1);
        stock_lot::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            branch_id: Set(branch_id),
            quantity: Set(quantity),
            location: Set(location),
            expiration_date: Set(expiration_date),
            created_at: Set(self.lot_clock),
            updated_at: Set(self.lot_clock),
        }
        .insert(self.db())
        .await
        .expect("insert lot")
        .id
    }

    pub async fn shelf_lot(
        &mut self,
        product_id: Uuid,
        branch_id: Uuid,
        quantity: i32,
        expiration_date: Option<NaiveDate>,
    ) -> Uuid {
        self.lot(product_id, branch_id, quantity, expiration_date, StockLocation::Shelf)
            .await
    }

    pub async fn lot_quantity(&self, lot_id: Uuid) -> i32 {
        stock_lot::Entity::find_by_id(lot_id)
            .one(self.db())
            .await
            .expect("load lot")
            .expect("lot exists")
            .quantity
    }

    pub async fn customer(&self, credit_limit: Decimal) -> Uuid {
        customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            full_name: Set("Cliente Prueba".to_string()),
            document: Set(None),
            phone: Set(None),
            credit_limit: Set(credit_limit),
            balance: Set(Decimal::ZERO),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("insert customer")
        .id
    }

    pub async fn customer_balance(&self, customer_id: Uuid) -> Decimal {
        customer::Entity::find_by_id(customer_id)
            .one(self.db())
            .await
            .expect("load customer")
            .expect("customer exists")
            .balance
    }

    pub async fn container(&self, deposit_value: Decimal) -> Uuid {
        returnable_container::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set("Botella 1L".to_string()),
            deposit_value: Set(deposit_value),
        }
        .insert(self.db())
        .await
        .expect("insert container")
        .id
    }
}

impl TestApp {
    /// Writes a finished sale of one product line without touching stock.
    pub async fn past_sale(
        &self,
        branch_id: Uuid,
        product_id: Uuid,
        quantity: i32,
        total: Decimal,
        method: PaymentMethod,
        sold_at: DateTime<Utc>,
    ) -> Uuid {
        let sale = sale::ActiveModel {
            id: Set(Uuid::new_v4()),
            branch_id: Set(branch_id),
            customer_id: Set(None),
            payment_method: Set(method),
            installments: Set(1),
            subtotal: Set(total),
            adjustment: Set(Decimal::ZERO),
            total: Set(total),
            sold_at: Set(sold_at),
        }
        .insert(self.db())
        .await
        .expect("insert sale");

        sale_line::ActiveModel {
            id: Set(Uuid::new_v4()),
            sale_id: Set(sale.id),
            line_kind: Set(SaleLineKind::Product),
            product_id: Set(Some(product_id)),
            container_id: Set(None),
            quantity: Set(quantity),
            unit_price: Set(total / Decimal::from(quantity.max(1))),
            line_total: Set(total),
        }
        .insert(self.db())
        .await
        .expect("insert sale line");
        sale.id
    }

    /// Cash sale with one unit of each product, one line per product.
    pub async fn basket_sale(&self, branch_id: Uuid, products: &[Uuid], sold_at: DateTime<Utc>) {
        let total = Decimal::from(products.len() as i64);
        let sale = sale::ActiveModel {
            id: Set(Uuid::new_v4()),
            branch_id: Set(branch_id),
            customer_id: Set(None),
            payment_method: Set(PaymentMethod::Cash),
            installments: Set(1),
            subtotal: Set(total),
            adjustment: Set(Decimal::ZERO),
            total: Set(total),
            sold_at: Set(sold_at),
        }
        .insert(self.db())
        .await
        .expect("insert sale");

        for product_id in products {
            sale_line::ActiveModel {
                id: Set(Uuid::new_v4()),
                sale_id: Set(sale.id),
                line_kind: Set(SaleLineKind::Product),
                product_id: Set(Some(*product_id)),
                container_id: Set(None),
                quantity: Set(1),
                unit_price: Set(Decimal::ONE),
                line_total: Set(Decimal::ONE),
            }
            .insert(self.db())
            .await
            .expect("insert sale line");
        }
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn at_noon(day: NaiveDate) -> DateTime<Utc> {
    day.and_hms_opt(12, 0, 0).expect("valid time").and_utc()
}
