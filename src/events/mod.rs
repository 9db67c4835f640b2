use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    entities::{PaymentMethod, StockLocation},
    errors::ServiceError,
};

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a bounded channel and returns both ends.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Queues an event without waiting for channel capacity.
    pub fn send(&self, event: Event) -> Result<(), ServiceError> {
        self.sender.try_send(event).map_err(|e| match e {
            TrySendError::Full(event) => {
                ServiceError::EventError(format!("channel full, {} dropped", event.name()))
            }
            TrySendError::Closed(event) => {
                ServiceError::EventError(format!("channel closed, {} dropped", event.name()))
            }
        })
    }

    /// Sends an event after a commit. The work is already durable, so a full
    /// or closed channel is only worth a warning; callers never wait on a
    /// slow consumer.
    pub fn publish(&self, event: Event) {
        let name = event.name();
        if let Err(e) = self.send(event) {
            warn!(event = name, error = %e, "Event dropped");
        }
    }
}

/// One lot's quantity change inside an allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotChange {
    pub lot_id: Uuid,
    pub before: i32,
    pub after: i32,
}

/// Everything the ledger announces after a successful commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    SaleSettled {
        sale_id: Uuid,
        branch_id: Uuid,
        payment_method: PaymentMethod,
        total: Decimal,
        customer_id: Option<Uuid>,
    },
    LotsConsumed {
        product_id: Uuid,
        branch_id: Uuid,
        quantity: i32,
        changes: Vec<LotChange>,
    },
    StockTransferred {
        source_lot_id: Uuid,
        destination_lot_id: Uuid,
        quantity: i32,
        destination: StockLocation,
    },
    SurplusRecorded {
        product_id: Uuid,
        branch_id: Uuid,
        lot_id: Uuid,
        quantity: i32,
    },
    /// `unabsorbed` is the part of the shortage that no lot could cover
    ShortageRecorded {
        product_id: Uuid,
        branch_id: Uuid,
        requested: i32,
        absorbed: i32,
        unabsorbed: i32,
    },
    StockReceived {
        lot_id: Uuid,
        product_id: Uuid,
        branch_id: Uuid,
        quantity: i32,
        expiration_date: Option<NaiveDate>,
    },
    ForecastRegenerated {
        product_id: Uuid,
        branch_id: Uuid,
        points: usize,
    },
    ForecastFailed {
        product_id: Uuid,
        branch_id: Uuid,
        reason: String,
    },
    CustomerPaymentRecorded {
        payment_id: Uuid,
        customer_id: Uuid,
        amount: Decimal,
    },
    SupplierInvoiceRegistered {
        invoice_id: Uuid,
        supplier_id: Uuid,
        amount: Decimal,
    },
    SupplierPaymentRecorded {
        payment_id: Uuid,
        supplier_id: Uuid,
        amount: Decimal,
    },
    ShiftClosed {
        shift_id: Uuid,
        branch_id: Uuid,
        closed_at: DateTime<Utc>,
        cash_difference: Decimal,
    },
}

impl Event {
    /// Short name used as a log field.
    pub fn name(&self) -> &'static str {
        match self {
            Event::SaleSettled { .. } => "sale_settled",
            Event::LotsConsumed { .. } => "lots_consumed",
            Event::StockTransferred { .. } => "stock_transferred",
            Event::SurplusRecorded { .. } => "surplus_recorded",
            Event::ShortageRecorded { .. } => "shortage_recorded",
            Event::StockReceived { .. } => "stock_received",
            Event::ForecastRegenerated { .. } => "forecast_regenerated",
            Event::ForecastFailed { .. } => "forecast_failed",
            Event::CustomerPaymentRecorded { .. } => "customer_payment_recorded",
            Event::SupplierInvoiceRegistered { .. } => "supplier_invoice_registered",
            Event::SupplierPaymentRecorded { .. } => "supplier_payment_recorded",
            Event::ShiftClosed { .. } => "shift_closed",
        }
    }
}

/// Drains the channel, logging every event until all senders are dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");
    while let Some(event) = rx.recv().await {
        match &event {
            Event::ShortageRecorded {
                product_id,
                unabsorbed,
                ..
            } if *unabsorbed > 0 => {
                warn!(
                    product_id = %product_id,
                    unabsorbed = unabsorbed,
                    "Count shortage exceeded available stock"
                );
            }
            Event::ForecastFailed {
                product_id,
                branch_id,
                reason,
            } => {
                warn!(product_id = %product_id, branch_id = %branch_id, reason = %reason, "Forecast failed");
            }
            _ => {
                info!(event = event.name(), payload = ?event, "Received event");
            }
        }
    }
    warn!("Event processing loop has ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_delivers_in_order() {
        let (sender, mut rx) = EventSender::channel(4);
        let branch_id = Uuid::new_v4();
        sender
            .publish(Event::ForecastRegenerated {
                product_id: Uuid::nil(),
                branch_id,
                points: 7,
            });
        sender
            .publish(Event::ForecastFailed {
                product_id: Uuid::nil(),
                branch_id,
                reason: "flat".into(),
            });
        assert_eq!(rx.recv().await.map(|e| e.name()), Some("forecast_regenerated"));
        assert_eq!(rx.recv().await.map(|e| e.name()), Some("forecast_failed"));
    }

    #[tokio::test]
    async fn full_channel_drops_instead_of_blocking() {
        let (sender, mut rx) = EventSender::channel(1);
        let failed = |reason: &str| Event::ForecastFailed {
            product_id: Uuid::nil(),
            branch_id: Uuid::nil(),
            reason: reason.to_string(),
        };
        sender.publish(failed("first"));
        sender.publish(failed("second"));
        assert!(matches!(
            sender.send(failed("third")),
            Err(ServiceError::EventError(_))
        ));

        match rx.recv().await {
            Some(Event::ForecastFailed { reason, .. }) => assert_eq!(reason, "first"),
            other => panic!("unexpected event {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_to_closed_channel_does_not_fail() {
        let (sender, rx) = EventSender::channel(1);
        drop(rx);
        sender
            .publish(Event::SupplierPaymentRecorded {
                payment_id: Uuid::nil(),
                supplier_id: Uuid::nil(),
                amount: Decimal::ONE,
            });
        assert!(sender
            .send(Event::ShiftClosed {
                shift_id: Uuid::nil(),
                branch_id: Uuid::nil(),
                closed_at: Utc::now(),
                cash_difference: Decimal::ZERO,
            })
            .is_err());
    }
}
