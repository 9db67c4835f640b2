//! FEFO lot allocation.
//!
//! The free functions work on any connection so the sale settlement can run
//! them inside its own transaction. [`AllocationService`] wraps each one in a
//! transaction of its own for stand-alone stock operations.

use chrono::{NaiveDate, Utc};
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::BranchScope,
    db::{self, DbPool},
    entities::{
        product,
        stock_lot::{self, sort_fefo, Entity as StockLot, StockLocation},
    },
    errors::ServiceError,
    events::{Event, EventSender, LotChange},
};

/// What to do when the lots cannot cover the requested quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortfallPolicy {
    /// Fail with `InsufficientStock` before touching any lot.
    Reject,
    /// Drain what exists and report the rest as unabsorbed.
    Absorb,
}

/// Quantity of one lot before and after an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotMutation {
    pub lot_id: Uuid,
    pub before: i32,
    pub after: i32,
}

impl LotMutation {
    /// Signed change; negative when stock left the lot.
    pub fn delta(&self) -> i32 {
        self.after - self.before
    }
}

impl From<&LotMutation> for LotChange {
    fn from(m: &LotMutation) -> Self {
        LotChange {
            lot_id: m.lot_id,
            before: m.before,
            after: m.after,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consumption {
    pub product_id: Uuid,
    pub branch_id: Uuid,
    pub requested: i32,
    pub consumed: i32,
    pub mutations: Vec<LotMutation>,
}

impl Consumption {
    /// Part of the request no lot could cover. Always zero under
    /// [`ShortfallPolicy::Reject`].
    pub fn unabsorbed(&self) -> i32 {
        self.requested - self.consumed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub product_id: Uuid,
    pub quantity: i32,
    pub source: LotMutation,
    pub destination: LotMutation,
    pub destination_location: StockLocation,
}

/// Walks FEFO-ordered `(lot_id, quantity)` pairs taking
/// `min(lot, remaining)` from each until `needed` is met or the lots run out.
pub fn plan_consumption(lots: &[(Uuid, i32)], needed: i32) -> Vec<LotMutation> {
    let mut remaining = needed.max(0);
    let mut plan = Vec::new();
    for &(lot_id, quantity) in lots {
        if remaining == 0 {
            break;
        }
        if quantity <= 0 {
            continue;
        }
        let take = quantity.min(remaining);
        remaining -= take;
        plan.push(LotMutation {
            lot_id,
            before: quantity,
            after: quantity - take,
        });
    }
    plan
}

pub(crate) fn ensure_positive(quantity: i32, what: &str) -> Result<(), ServiceError> {
    if quantity <= 0 {
        return Err(ServiceError::InvalidQuantity(format!(
            "{what} must be positive, got {quantity}"
        )));
    }
    Ok(())
}

/// Adds `quantity` to a lot's stock, refusing to wrap past `i32::MAX`.
fn stocked_quantity(lot: &stock_lot::Model, quantity: i32) -> Result<i32, ServiceError> {
    lot.quantity.checked_add(quantity).ok_or_else(|| {
        ServiceError::InvalidQuantity(format!(
            "lot {} holds {} and cannot take {} more",
            lot.id, lot.quantity, quantity
        ))
    })
}

async fn ensure_product<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> Result<product::Model, ServiceError> {
    product::Entity::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
}

async fn set_quantity<C: ConnectionTrait>(
    conn: &C,
    lot: stock_lot::Model,
    quantity: i32,
) -> Result<stock_lot::Model, ServiceError> {
    let mut active: stock_lot::ActiveModel = lot.into();
    active.quantity = Set(quantity);
    active.updated_at = Set(Utc::now());
    Ok(active.update(conn).await?)
}

/// Lots of a product with stock, in FEFO order. `None` location means any.
pub async fn load_fefo_lots<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    scope: BranchScope,
    location: Option<StockLocation>,
) -> Result<Vec<stock_lot::Model>, ServiceError> {
    let mut condition = Condition::all()
        .add(stock_lot::Column::ProductId.eq(product_id))
        .add(stock_lot::Column::Quantity.gt(0));
    if let Some(branch_id) = scope.branch_id() {
        condition = condition.add(stock_lot::Column::BranchId.eq(branch_id));
    }
    if let Some(location) = location {
        condition = condition.add(stock_lot::Column::Location.eq(location));
    }

    let mut lots = StockLot::find()
        .filter(condition)
        .order_by_asc(stock_lot::Column::CreatedAt)
        .order_by_asc(stock_lot::Column::Id)
        .lock_exclusive()
        .all(conn)
        .await?;
    sort_fefo(&mut lots);
    Ok(lots)
}

/// Consumes `quantity` units of a product at a branch in FEFO order.
pub async fn consume_fefo<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    branch_id: Uuid,
    location: Option<StockLocation>,
    quantity: i32,
    policy: ShortfallPolicy,
) -> Result<Consumption, ServiceError> {
    ensure_positive(quantity, "quantity")?;

    let lots = load_fefo_lots(conn, product_id, BranchScope::Branch(branch_id), location).await?;
    let available: i64 = lots.iter().map(|l| l.quantity as i64).sum();

    if policy == ShortfallPolicy::Reject && available < quantity as i64 {
        counter!("retail_ledger.stock.shortfalls", 1);
        warn!(
            product_id = %product_id,
            branch_id = %branch_id,
            requested = quantity,
            available = available,
            "Insufficient stock"
        );
        return Err(ServiceError::insufficient_stock(
            product_id,
            quantity,
            available.min(i32::MAX as i64) as i32,
        ));
    }

    let pairs: Vec<(Uuid, i32)> = lots.iter().map(|l| (l.id, l.quantity)).collect();
    let plan = plan_consumption(&pairs, quantity);

    let mut by_id: std::collections::HashMap<Uuid, stock_lot::Model> =
        lots.into_iter().map(|l| (l.id, l)).collect();
    for mutation in &plan {
        if let Some(lot) = by_id.remove(&mutation.lot_id) {
            set_quantity(conn, lot, mutation.after).await?;
        }
    }

    let consumed = plan.iter().map(|m| m.before - m.after).sum();
    Ok(Consumption {
        product_id,
        branch_id,
        requested: quantity,
        consumed,
        mutations: plan,
    })
}

/// Finds the lot keyed by (product, branch, location, expiration) or creates
/// an empty one.
async fn find_or_create_lot<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    branch_id: Uuid,
    location: StockLocation,
    expiration_date: Option<NaiveDate>,
) -> Result<stock_lot::Model, ServiceError> {
    let expiration = match expiration_date {
        Some(date) => stock_lot::Column::ExpirationDate.eq(date),
        None => stock_lot::Column::ExpirationDate.is_null(),
    };
    let existing = StockLot::find()
        .filter(
            Condition::all()
                .add(stock_lot::Column::ProductId.eq(product_id))
                .add(stock_lot::Column::BranchId.eq(branch_id))
                .add(stock_lot::Column::Location.eq(location))
                .add(expiration),
        )
        .order_by_asc(stock_lot::Column::CreatedAt)
        .lock_exclusive()
        .one(conn)
        .await?;

    if let Some(lot) = existing {
        return Ok(lot);
    }

    let now = Utc::now();
    let lot = stock_lot::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        branch_id: Set(branch_id),
        quantity: Set(0),
        location: Set(location),
        expiration_date: Set(expiration_date),
        created_at: Set(now),
        updated_at: Set(now),
    };
    Ok(lot.insert(conn).await?)
}

/// Moves `quantity` from one lot to the matching lot at `destination`,
/// keeping the expiration date. Never falls back to other lots.
pub async fn transfer_lot<C: ConnectionTrait>(
    conn: &C,
    branch_id: Uuid,
    lot_id: Uuid,
    quantity: i32,
    destination: StockLocation,
) -> Result<TransferOutcome, ServiceError> {
    ensure_positive(quantity, "transfer quantity")?;

    let source = StockLot::find_by_id(lot_id)
        .lock_exclusive()
        .one(conn)
        .await?
        .filter(|lot| lot.branch_id == branch_id)
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Lot {} not found in branch {}", lot_id, branch_id))
        })?;

    if source.location == destination {
        return Err(ServiceError::InvalidOperation(format!(
            "Lot {} is already in {}",
            lot_id, destination
        )));
    }
    if source.quantity < quantity {
        counter!("retail_ledger.stock.shortfalls", 1);
        return Err(ServiceError::insufficient_lot_stock(
            source.product_id,
            lot_id,
            quantity,
            source.quantity,
        ));
    }

    let product_id = source.product_id;
    let expiration = source.expiration_date;
    let source_before = source.quantity;
    set_quantity(conn, source, source_before - quantity).await?;

    let dest = find_or_create_lot(conn, product_id, branch_id, destination, expiration).await?;
    let dest_before = dest.quantity;
    let dest_after = stocked_quantity(&dest, quantity)?;
    let dest = set_quantity(conn, dest, dest_after).await?;

    Ok(TransferOutcome {
        product_id,
        quantity,
        source: LotMutation {
            lot_id,
            before: source_before,
            after: source_before - quantity,
        },
        destination: LotMutation {
            lot_id: dest.id,
            before: dest_before,
            after: dest.quantity,
        },
        destination_location: destination,
    })
}

/// Unexplained surplus goes to the backroom lot without expiration.
pub async fn adjust_surplus<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    branch_id: Uuid,
    quantity: i32,
) -> Result<LotMutation, ServiceError> {
    ensure_positive(quantity, "surplus")?;
    ensure_product(conn, product_id).await?;

    let lot =
        find_or_create_lot(conn, product_id, branch_id, StockLocation::Backroom, None).await?;
    let before = lot.quantity;
    let after = stocked_quantity(&lot, quantity)?;
    let lot = set_quantity(conn, lot, after).await?;
    Ok(LotMutation {
        lot_id: lot.id,
        before,
        after: lot.quantity,
    })
}

/// Shortage drains lots in any location, FEFO. Whatever cannot be covered
/// is reported through [`Consumption::unabsorbed`].
pub async fn adjust_shortage<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    branch_id: Uuid,
    quantity: i32,
) -> Result<Consumption, ServiceError> {
    consume_fefo(
        conn,
        product_id,
        branch_id,
        None,
        quantity,
        ShortfallPolicy::Absorb,
    )
    .await
}

/// Creates a new lot for a restock.
pub async fn receive_lot<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    branch_id: Uuid,
    quantity: i32,
    expiration_date: Option<NaiveDate>,
    location: StockLocation,
) -> Result<stock_lot::Model, ServiceError> {
    ensure_positive(quantity, "received quantity")?;
    ensure_product(conn, product_id).await?;

    let now = Utc::now();
    let lot = stock_lot::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        branch_id: Set(branch_id),
        quantity: Set(quantity),
        location: Set(location),
        expiration_date: Set(expiration_date),
        created_at: Set(now),
        updated_at: Set(now),
    };
    Ok(lot.insert(conn).await?)
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ConsumeRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
    #[serde(default = "default_shelf")]
    pub location: StockLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TransferRequest {
    pub lot_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
    #[serde(default = "default_shelf")]
    pub destination: StockLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReceiveLotRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
    pub expiration_date: Option<NaiveDate>,
    #[serde(default)]
    pub location: StockLocation,
}

/// Counted minus system quantity for one product.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CountAdjustment {
    pub product_id: Uuid,
    pub difference: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CountOutcome {
    Surplus {
        product_id: Uuid,
        mutation: LotMutation,
    },
    Shortage {
        product_id: Uuid,
        consumption: Consumption,
    },
}

fn default_shelf() -> StockLocation {
    StockLocation::Shelf
}

/// Request shape check. A non-positive quantity is reported as
/// `InvalidQuantity` like everywhere else in the ledger.
fn check_request<T: Validate>(request: &T) -> Result<(), ServiceError> {
    request
        .validate()
        .map_err(|e| ServiceError::InvalidQuantity(e.to_string()))
}

/// Stand-alone stock operations, one transaction each.
#[derive(Clone)]
pub struct AllocationService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
}

impl AllocationService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Point-of-sale style consumption outside a sale.
    #[instrument(skip(self))]
    pub async fn consume(
        &self,
        scope: BranchScope,
        request: ConsumeRequest,
    ) -> Result<Consumption, ServiceError> {
        check_request(&request)?;
        let branch_id = scope.single()?;

        let txn = db::begin(&self.db_pool).await?;
        let outcome = consume_fefo(
            &txn,
            request.product_id,
            branch_id,
            Some(request.location),
            request.quantity,
            ShortfallPolicy::Reject,
        )
        .await;
        let consumption = db::finish(txn, outcome).await?;

        info!(product_id = %consumption.product_id, consumed = consumption.consumed, "Stock consumed");
        self.event_sender
            .publish(Event::LotsConsumed {
                product_id: consumption.product_id,
                branch_id,
                quantity: consumption.consumed,
                changes: consumption.mutations.iter().map(LotChange::from).collect(),
            });
        Ok(consumption)
    }

    #[instrument(skip(self))]
    pub async fn transfer(
        &self,
        scope: BranchScope,
        request: TransferRequest,
    ) -> Result<TransferOutcome, ServiceError> {
        let mut outcomes = self.replenish_shelf(scope, vec![request]).await?;
        outcomes
            .pop()
            .ok_or_else(|| ServiceError::InternalError("transfer produced no outcome".into()))
    }

    /// Several transfers, all or nothing.
    #[instrument(skip(self, requests), fields(count = requests.len()))]
    pub async fn replenish_shelf(
        &self,
        scope: BranchScope,
        requests: Vec<TransferRequest>,
    ) -> Result<Vec<TransferOutcome>, ServiceError> {
        let branch_id = scope.single()?;
        if requests.is_empty() {
            return Err(ServiceError::InvalidInput("no transfers requested".into()));
        }
        for request in &requests {
            check_request(request)?;
        }

        let txn = db::begin(&self.db_pool).await?;
        let outcome = async {
            let mut done = Vec::with_capacity(requests.len());
            for request in &requests {
                done.push(
                    transfer_lot(
                        &txn,
                        branch_id,
                        request.lot_id,
                        request.quantity,
                        request.destination,
                    )
                    .await?,
                );
            }
            Ok::<_, ServiceError>(done)
        }
        .await;
        let outcomes = db::finish(txn, outcome).await?;

        for o in &outcomes {
            info!(source = %o.source.lot_id, destination = %o.destination.lot_id, quantity = o.quantity, "Stock transferred");
            self.event_sender
                .publish(Event::StockTransferred {
                    source_lot_id: o.source.lot_id,
                    destination_lot_id: o.destination.lot_id,
                    quantity: o.quantity,
                    destination: o.destination_location,
                });
        }
        Ok(outcomes)
    }

    #[instrument(skip(self))]
    pub async fn adjust_surplus(
        &self,
        scope: BranchScope,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<LotMutation, ServiceError> {
        ensure_positive(quantity, "surplus")?;
        let outcomes = self
            .apply_count_adjustments(
                scope,
                vec![CountAdjustment {
                    product_id,
                    difference: quantity,
                }],
            )
            .await?;
        match outcomes.into_iter().next() {
            Some(CountOutcome::Surplus { mutation, .. }) => Ok(mutation),
            _ => Err(ServiceError::InternalError(
                "surplus produced no outcome".into(),
            )),
        }
    }

    #[instrument(skip(self))]
    pub async fn adjust_shortage(
        &self,
        scope: BranchScope,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<Consumption, ServiceError> {
        ensure_positive(quantity, "shortage")?;
        let outcomes = self
            .apply_count_adjustments(
                scope,
                vec![CountAdjustment {
                    product_id,
                    difference: -quantity,
                }],
            )
            .await?;
        match outcomes.into_iter().next() {
            Some(CountOutcome::Shortage { consumption, .. }) => Ok(consumption),
            _ => Err(ServiceError::InternalError(
                "shortage produced no outcome".into(),
            )),
        }
    }

    /// Applies an inventory count in one transaction. Zero differences are
    /// skipped.
    #[instrument(skip(self, adjustments), fields(count = adjustments.len()))]
    pub async fn apply_count_adjustments(
        &self,
        scope: BranchScope,
        adjustments: Vec<CountAdjustment>,
    ) -> Result<Vec<CountOutcome>, ServiceError> {
        let branch_id = scope.single()?;

        let txn = db::begin(&self.db_pool).await?;
        let outcome = async {
            let mut done = Vec::new();
            for adj in adjustments.iter().filter(|a| a.difference != 0) {
                if adj.difference > 0 {
                    let mutation =
                        adjust_surplus(&txn, adj.product_id, branch_id, adj.difference).await?;
                    done.push(CountOutcome::Surplus {
                        product_id: adj.product_id,
                        mutation,
                    });
                } else {
                    let consumption = adjust_shortage(
                        &txn,
                        adj.product_id,
                        branch_id,
                        adj.difference.saturating_neg(),
                    )
                    .await?;
                    done.push(CountOutcome::Shortage {
                        product_id: adj.product_id,
                        consumption,
                    });
                }
            }
            Ok::<_, ServiceError>(done)
        }
        .await;
        let outcomes = db::finish(txn, outcome).await?;

        for o in &outcomes {
            match o {
                CountOutcome::Surplus {
                    product_id,
                    mutation,
                } => {
                    info!(product_id = %product_id, quantity = mutation.delta(), "Surplus recorded");
                    self.event_sender
                        .publish(Event::SurplusRecorded {
                            product_id: *product_id,
                            branch_id,
                            lot_id: mutation.lot_id,
                            quantity: mutation.delta(),
                        });
                }
                CountOutcome::Shortage {
                    product_id,
                    consumption,
                } => {
                    if consumption.unabsorbed() > 0 {
                        warn!(
                            product_id = %product_id,
                            requested = consumption.requested,
                            unabsorbed = consumption.unabsorbed(),
                            "Shortage exceeds stock on hand"
                        );
                    } else {
                        info!(product_id = %product_id, quantity = consumption.consumed, "Shortage recorded");
                    }
                    self.event_sender
                        .publish(Event::ShortageRecorded {
                            product_id: *product_id,
                            branch_id,
                            requested: consumption.requested,
                            absorbed: consumption.consumed,
                            unabsorbed: consumption.unabsorbed(),
                        });
                }
            }
        }
        Ok(outcomes)
    }

    #[instrument(skip(self))]
    pub async fn receive_lot(
        &self,
        scope: BranchScope,
        request: ReceiveLotRequest,
    ) -> Result<stock_lot::Model, ServiceError> {
        check_request(&request)?;
        let branch_id = scope.single()?;

        let txn = db::begin(&self.db_pool).await?;
        let outcome = receive_lot(
            &txn,
            request.product_id,
            branch_id,
            request.quantity,
            request.expiration_date,
            request.location,
        )
        .await;
        let lot = db::finish(txn, outcome).await?;

        info!(lot_id = %lot.id, quantity = lot.quantity, "Stock received");
        self.event_sender
            .publish(Event::StockReceived {
                lot_id: lot.id,
                product_id: lot.product_id,
                branch_id,
                quantity: lot.quantity,
                expiration_date: lot.expiration_date,
            });
        Ok(lot)
    }

    /// Lots with stock for a product, FEFO order, across any location.
    pub async fn lots_for_product(
        &self,
        product_id: Uuid,
        scope: BranchScope,
    ) -> Result<Vec<stock_lot::Model>, ServiceError> {
        load_fefo_lots(&*self.db_pool, product_id, scope, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn plan_takes_lots_in_given_order() {
        let lots = ids(3);
        let plan = plan_consumption(&[(lots[0], 2), (lots[1], 5), (lots[2], 4)], 4);
        assert_eq!(
            plan,
            vec![
                LotMutation {
                    lot_id: lots[0],
                    before: 2,
                    after: 0
                },
                LotMutation {
                    lot_id: lots[1],
                    before: 5,
                    after: 3
                },
            ]
        );
    }

    #[test]
    fn plan_stops_when_lots_run_out() {
        let lots = ids(2);
        let plan = plan_consumption(&[(lots[0], 1), (lots[1], 1)], 10);
        let consumed: i32 = plan.iter().map(|m| -m.delta()).sum();
        assert_eq!(consumed, 2);
    }

    fn lot_with(quantity: i32) -> stock_lot::Model {
        let now = Utc::now();
        stock_lot::Model {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            branch_id: Uuid::new_v4(),
            quantity,
            location: StockLocation::Backroom,
            expiration_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn stocking_past_i32_max_is_refused() {
        assert_eq!(stocked_quantity(&lot_with(5), 3).unwrap(), 8);
        assert!(matches!(
            stocked_quantity(&lot_with(i32::MAX), 1),
            Err(ServiceError::InvalidQuantity(_))
        ));
    }

    #[test]
    fn requests_need_positive_quantities() {
        let transfer = TransferRequest {
            lot_id: Uuid::nil(),
            quantity: 0,
            destination: StockLocation::Shelf,
        };
        assert!(matches!(
            check_request(&transfer),
            Err(ServiceError::InvalidQuantity(_))
        ));
        let consume = ConsumeRequest {
            product_id: Uuid::nil(),
            quantity: 3,
            location: StockLocation::Shelf,
        };
        assert!(check_request(&consume).is_ok());
    }

    proptest! {
        #[test]
        fn plan_conserves_quantity(
            quantities in prop::collection::vec(0i32..50, 0..8),
            needed in 1i32..200,
        ) {
            let lots: Vec<(Uuid, i32)> = quantities.iter().map(|q| (Uuid::new_v4(), *q)).collect();
            let before: i32 = quantities.iter().sum();
            let plan = plan_consumption(&lots, needed);

            let consumed: i32 = plan.iter().map(|m| m.before - m.after).sum();
            let mut after = before;
            for m in &plan {
                after += m.delta();
                prop_assert!(m.after >= 0);
            }
            prop_assert_eq!(before - after, consumed);
            prop_assert!(consumed <= needed);
            prop_assert_eq!(consumed, needed.min(before));
        }
    }
}
