//! Stock import: classification of normalized spreadsheet/OCR rows and the
//! atomic load that follows the operator's review.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::BranchScope,
    config::IngestionConfig,
    db::{self, DbPool},
    entities::{category, product, stock_lot, supplier, StockLocation},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{allocation::receive_lot, settlement::round_money},
};

/// Normalized import row as produced by the spreadsheet/OCR reader.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRow {
    pub barcode: Option<String>,
    pub name: Option<String>,
    pub quantity: Option<i32>,
    #[serde(default)]
    pub unit_cost: Decimal,
    pub sale_price: Option<Decimal>,
    pub expiration_date: Option<NaiveDate>,
    pub location: Option<StockLocation>,
    pub supplier_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierSuggestion {
    pub supplier_id: Uuid,
    pub name: String,
    pub score: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestockRow {
    pub index: usize,
    pub product_id: Uuid,
    pub product_name: String,
    pub row: ImportRow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProductRow {
    pub index: usize,
    pub row: ImportRow,
    pub supplier_suggestion: Option<SupplierSuggestion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedRow {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportClassification {
    pub restock: Vec<RestockRow>,
    pub new_products: Vec<NewProductRow>,
    pub rejected: Vec<RejectedRow>,
}

/// Normalized indel similarity in 0..=100.
///
/// `100 * (|a| + |b| - indel) / (|a| + |b|)`, where `indel` is the number of
/// insertions and deletions turning `a` into `b`. Two empty strings score 100.
pub fn similarity(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 100;
    }

    // indel distance = total - 2 * LCS
    let mut prev = vec![0usize; b.len() + 1];
    let mut row = vec![0usize; b.len() + 1];
    for ca in &a {
        for (j, cb) in b.iter().enumerate() {
            row[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                row[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut row);
    }
    let lcs = prev[b.len()];

    ((200 * lcs + total / 2) / total) as u8
}

/// Best existing supplier for an imported supplier name.
///
/// A case-insensitive exact match scores 100. Otherwise the highest
/// [`similarity`] wins, first supplier on ties, and is suggested only when it
/// scores strictly above `threshold`.
pub fn suggest_supplier(
    name: &str,
    suppliers: &[(Uuid, String)],
    threshold: u8,
) -> Option<SupplierSuggestion> {
    let wanted = name.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }

    if let Some((id, existing)) = suppliers
        .iter()
        .find(|(_, existing)| existing.to_lowercase() == wanted)
    {
        return Some(SupplierSuggestion {
            supplier_id: *id,
            name: existing.clone(),
            score: 100,
        });
    }

    let mut best: Option<(u8, &(Uuid, String))> = None;
    for candidate in suppliers {
        let score = similarity(&wanted, &candidate.1.to_lowercase());
        if best.map_or(score > 0, |(top, _)| score > top) {
            best = Some((score, candidate));
        }
    }

    best.filter(|(score, _)| *score > threshold)
        .map(|(score, (id, existing))| SupplierSuggestion {
            supplier_id: *id,
            name: existing.clone(),
            score,
        })
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Sorts import rows into restocks, new products and rejects.
/// `products_by_barcode` maps barcode to (product id, name).
pub fn classify_rows(
    rows: Vec<ImportRow>,
    products_by_barcode: &HashMap<String, (Uuid, String)>,
    suppliers: &[(Uuid, String)],
    threshold: u8,
) -> ImportClassification {
    let mut out = ImportClassification::default();

    for (index, row) in rows.into_iter().enumerate() {
        let barcode = non_blank(&row.barcode).map(str::to_string);
        let has_name = non_blank(&row.name).is_some();
        let quantity_ok = row.quantity.map_or(false, |q| q > 0);

        let Some(barcode) = barcode.filter(|_| has_name && quantity_ok) else {
            out.rejected.push(RejectedRow {
                index,
                reason: "missing barcode, name or positive quantity".to_string(),
            });
            continue;
        };

        match products_by_barcode.get(&barcode) {
            Some((product_id, product_name)) => out.restock.push(RestockRow {
                index,
                product_id: *product_id,
                product_name: product_name.clone(),
                row,
            }),
            None => {
                let supplier_suggestion = non_blank(&row.supplier_name)
                    .and_then(|name| suggest_supplier(name, suppliers, threshold));
                out.new_products.push(NewProductRow {
                    index,
                    row,
                    supplier_suggestion,
                });
            }
        }
    }

    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SupplierChoice {
    None,
    Existing(Uuid),
    /// Get-or-create by name, case-insensitive
    Create(String),
}

/// One reviewed row ready to load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImportDecision {
    Restock {
        product_id: Uuid,
        quantity: i32,
        expiration_date: Option<NaiveDate>,
        location: StockLocation,
    },
    NewProduct {
        barcode: String,
        name: String,
        cost: Decimal,
        sale_price: Decimal,
        category_id: Option<Uuid>,
        supplier: SupplierChoice,
        quantity: i32,
        expiration_date: Option<NaiveDate>,
        location: StockLocation,
    },
}

impl ImportClassification {
    /// Accepts every row as classified: suggested suppliers are used, and
    /// unmatched supplier names are created.
    pub fn into_decisions(self) -> Vec<ImportDecision> {
        let mut indexed: Vec<(usize, ImportDecision)> = Vec::new();

        for r in self.restock {
            indexed.push((
                r.index,
                ImportDecision::Restock {
                    product_id: r.product_id,
                    quantity: r.row.quantity.unwrap_or(0),
                    expiration_date: r.row.expiration_date,
                    location: r.row.location.unwrap_or_default(),
                },
            ));
        }

        for n in self.new_products {
            let supplier = match (&n.supplier_suggestion, non_blank(&n.row.supplier_name)) {
                (Some(s), _) => SupplierChoice::Existing(s.supplier_id),
                (None, Some(name)) => SupplierChoice::Create(name.to_string()),
                (None, None) => SupplierChoice::None,
            };
            let row = n.row;
            indexed.push((
                n.index,
                ImportDecision::NewProduct {
                    barcode: non_blank(&row.barcode).unwrap_or_default().to_string(),
                    name: non_blank(&row.name).unwrap_or_default().to_string(),
                    cost: row.unit_cost,
                    sale_price: row.sale_price.unwrap_or_default(),
                    category_id: None,
                    supplier,
                    quantity: row.quantity.unwrap_or(0),
                    expiration_date: row.expiration_date,
                    location: row.location.unwrap_or_default(),
                },
            ));
        }

        indexed.sort_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, d)| d).collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub lots_loaded: usize,
    pub products_created: usize,
    pub suppliers_created: usize,
}

/// Sale price from cost and a category margin in percent, when the margin
/// is positive.
pub fn suggested_sale_price(cost: Decimal, margin_pct: Decimal) -> Option<Decimal> {
    (margin_pct > Decimal::ZERO)
        .then(|| round_money(cost * (Decimal::ONE + margin_pct / Decimal::ONE_HUNDRED)))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub product_id: Uuid,
    pub quantity: i32,
    pub cost: Decimal,
    /// Used when positive; otherwise the category margin decides
    #[serde(default)]
    pub sale_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceConfirmation {
    pub expiration_date: Option<NaiveDate>,
    #[serde(default)]
    pub location: StockLocation,
    pub items: Vec<InvoiceItem>,
}

async fn get_or_create_supplier<C: ConnectionTrait>(
    conn: &C,
    name: &str,
) -> Result<(supplier::Model, bool), ServiceError> {
    let wanted = name.trim().to_lowercase();
    let existing = supplier::Entity::find()
        .all(conn)
        .await?
        .into_iter()
        .find(|s| s.name.to_lowercase() == wanted);
    if let Some(found) = existing {
        return Ok((found, false));
    }

    let created = supplier::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.trim().to_string()),
        contact: Set(None),
        balance: Set(Decimal::ZERO),
        delivery_weekday: Set(None),
        delivery_frequency: Set(None),
        created_at: Set(Utc::now()),
    }
    .insert(conn)
    .await?;
    Ok((created, true))
}

#[derive(Clone)]
pub struct IngestionService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
    config: IngestionConfig,
}

impl IngestionService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender, config: IngestionConfig) -> Self {
        Self {
            db_pool,
            event_sender,
            config,
        }
    }

    /// Classifies rows against the current catalog. Read-only.
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    pub async fn classify(&self, rows: Vec<ImportRow>) -> Result<ImportClassification, ServiceError> {
        let db = &*self.db_pool;
        let products_by_barcode: HashMap<String, (Uuid, String)> = product::Entity::find()
            .filter(product::Column::Barcode.is_not_null())
            .all(db)
            .await?
            .into_iter()
            .filter_map(|p| {
                p.barcode
                    .filter(|b| !b.trim().is_empty())
                    .map(|b| (b.trim().to_string(), (p.id, p.name)))
            })
            .collect();
        let suppliers: Vec<(Uuid, String)> = supplier::Entity::find()
            .all(db)
            .await?
            .into_iter()
            .map(|s| (s.id, s.name))
            .collect();

        let classification = classify_rows(
            rows,
            &products_by_barcode,
            &suppliers,
            self.config.supplier_match_threshold,
        );
        info!(
            restock = classification.restock.len(),
            new_products = classification.new_products.len(),
            rejected = classification.rejected.len(),
            "Import classified"
        );
        Ok(classification)
    }

    /// Loads reviewed rows in one transaction. Rows with a non-positive
    /// quantity are skipped.
    #[instrument(skip(self, decisions), fields(rows = decisions.len()))]
    pub async fn apply_import(
        &self,
        scope: BranchScope,
        decisions: Vec<ImportDecision>,
    ) -> Result<ImportSummary, ServiceError> {
        let branch_id = scope.single()?;
        let default_stock_minimo = self.config.default_stock_minimo;

        let txn = db::begin(&self.db_pool).await?;
        let outcome = async {
            let mut summary = ImportSummary::default();
            let mut lots = Vec::new();
            for decision in &decisions {
                let lot = match decision {
                    ImportDecision::Restock {
                        product_id,
                        quantity,
                        expiration_date,
                        location,
                    } => {
                        if *quantity <= 0 {
                            continue;
                        }
                        receive_lot(&txn, *product_id, branch_id, *quantity, *expiration_date, *location)
                            .await?
                    }
                    ImportDecision::NewProduct {
                        barcode,
                        name,
                        cost,
                        sale_price,
                        category_id,
                        supplier,
                        quantity,
                        expiration_date,
                        location,
                    } => {
                        if *quantity <= 0 {
                            continue;
                        }
                        let supplier_id = match supplier {
                            SupplierChoice::None => None,
                            SupplierChoice::Existing(id) => {
                                supplier::Entity::find_by_id(*id).one(&txn).await?.ok_or_else(
                                    || ServiceError::NotFound(format!("Supplier {} not found", id)),
                                )?;
                                Some(*id)
                            }
                            SupplierChoice::Create(supplier_name) => {
                                let (found, created) =
                                    get_or_create_supplier(&txn, supplier_name).await?;
                                if created {
                                    summary.suppliers_created += 1;
                                }
                                Some(found.id)
                            }
                        };

                        let created = product::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            barcode: Set(Some(barcode.clone()).filter(|b| !b.is_empty())),
                            name: Set(name.clone()),
                            cost: Set(*cost),
                            sale_price: Set(*sale_price),
                            stock_minimo: Set(default_stock_minimo),
                            perishable: Set(true),
                            favorite: Set(false),
                            supplier_id: Set(supplier_id),
                            category_id: Set(*category_id),
                            created_at: Set(Utc::now()),
                        }
                        .insert(&txn)
                        .await?;
                        summary.products_created += 1;

                        receive_lot(&txn, created.id, branch_id, *quantity, *expiration_date, *location)
                            .await?
                    }
                };
                summary.lots_loaded += 1;
                lots.push(lot);
            }
            Ok::<_, ServiceError>((summary, lots))
        }
        .await;
        let (summary, lots) = db::finish(txn, outcome).await?;

        info!(
            lots = summary.lots_loaded,
            products = summary.products_created,
            suppliers = summary.suppliers_created,
            "Import applied"
        );
        self.publish_received(&lots).await;
        Ok(summary)
    }

    /// Loads a confirmed supplier invoice: updates cost and sale price of
    /// each product and creates its lot. Returns the number of lots loaded.
    #[instrument(skip(self, confirmation), fields(items = confirmation.items.len()))]
    pub async fn confirm_invoice(
        &self,
        scope: BranchScope,
        confirmation: InvoiceConfirmation,
    ) -> Result<usize, ServiceError> {
        let branch_id = scope.single()?;

        let txn = db::begin(&self.db_pool).await?;
        let outcome = async {
            let mut lots = Vec::new();
            for item in &confirmation.items {
                if item.quantity <= 0 || item.cost.is_sign_negative() {
                    continue;
                }

                let product = product::Entity::find_by_id(item.product_id)
                    .one(&txn)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Product {} not found", item.product_id))
                    })?;
                let margin = match product.category_id {
                    Some(category_id) => category::Entity::find_by_id(category_id)
                        .one(&txn)
                        .await?
                        .map(|c| c.margin_pct)
                        .unwrap_or_default(),
                    None => Decimal::ZERO,
                };

                let sale_price = if item.sale_price > Decimal::ZERO {
                    Some(item.sale_price)
                } else {
                    suggested_sale_price(item.cost, margin)
                };

                let mut active: product::ActiveModel = product.into();
                active.cost = Set(item.cost);
                if let Some(price) = sale_price {
                    active.sale_price = Set(price);
                }
                active.update(&txn).await?;

                lots.push(
                    receive_lot(
                        &txn,
                        item.product_id,
                        branch_id,
                        item.quantity,
                        confirmation.expiration_date,
                        confirmation.location,
                    )
                    .await?,
                );
            }
            Ok::<_, ServiceError>(lots)
        }
        .await;
        let lots = db::finish(txn, outcome).await?;

        info!(lots = lots.len(), "Invoice confirmed");
        self.publish_received(&lots).await;
        Ok(lots.len())
    }

    async fn publish_received(&self, lots: &[stock_lot::Model]) {
        for lot in lots {
            self.event_sender
                .publish(Event::StockReceived {
                    lot_id: lot.id,
                    product_id: lot.product_id,
                    branch_id: lot.branch_id,
                    quantity: lot.quantity,
                    expiration_date: lot.expiration_date,
                });
        }
    }
}
