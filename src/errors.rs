use rust_decimal::Decimal;
use sea_orm::error::DbErr;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        sea_orm::error::DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: Uuid,
        #[serde(skip_serializing_if = "Option::is_none")]
        lot_id: Option<Uuid>,
        requested: i32,
        available: i32,
    },

    #[error(
        "Credit limit exceeded for customer {customer_id}: balance {balance} + sale {attempted} > limit {credit_limit}"
    )]
    CreditLimitExceeded {
        customer_id: Uuid,
        balance: Decimal,
        credit_limit: Decimal,
        attempted: Decimal,
    },

    #[error("A customer is required for running-account sales")]
    MissingCustomer,

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Forecast fit failed for product {product_id} at branch {branch_id}: {reason}")]
    ForecastFitFailure {
        product_id: Uuid,
        branch_id: Uuid,
        reason: String,
    },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    pub fn db_error(error: DbErr) -> Self {
        ServiceError::DatabaseError(error)
    }

    /// Shortage on the aggregate of a product's lots.
    pub fn insufficient_stock(product_id: Uuid, requested: i32, available: i32) -> Self {
        ServiceError::InsufficientStock {
            product_id,
            lot_id: None,
            requested,
            available,
        }
    }

    /// Shortage on one specific lot (transfers never fall back to other lots).
    pub fn insufficient_lot_stock(
        product_id: Uuid,
        lot_id: Uuid,
        requested: i32,
        available: i32,
    ) -> Self {
        ServiceError::InsufficientStock {
            product_id,
            lot_id: Some(lot_id),
            requested,
            available,
        }
    }

    /// Stable machine-readable code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => "database_error",
            Self::NotFound(_) => "resource_not_found",
            Self::ValidationError(_) => "validation_error",
            Self::InvalidOperation(_) => "invalid_operation",
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidQuantity(_) => "invalid_quantity",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::CreditLimitExceeded { .. } => "credit_limit_exceeded",
            Self::MissingCustomer => "missing_customer",
            Self::EmptyCart => "empty_cart",
            Self::ForecastFitFailure { .. } => "forecast_fit_failure",
            Self::Forbidden(_) => "forbidden",
            Self::EventError(_) => "event_error",
            Self::InternalError(_) | Self::Other(_) => "internal_error",
            Self::MigrationError(_) => "migration_error",
        }
    }

    /// Whether the operator can fix the input and retry.
    pub fn is_user_error(&self) -> bool {
        !matches!(
            self,
            Self::DatabaseError(_)
                | Self::EventError(_)
                | Self::InternalError(_)
                | Self::MigrationError(_)
                | Self::Other(_)
        )
    }

    /// Returns the message shown to operators.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::MigrationError(_) | Self::Other(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

pub type AppError = ServiceError;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn insufficient_stock_message_carries_amounts() {
        let product_id = Uuid::new_v4();
        let err = ServiceError::insufficient_stock(product_id, 7, 3);
        let message = err.to_string();
        assert!(message.contains("requested 7"));
        assert!(message.contains("available 3"));
        assert_eq!(err.error_code(), "insufficient_stock");
    }

    #[test]
    fn credit_limit_message_carries_amounts() {
        let err = ServiceError::CreditLimitExceeded {
            customer_id: Uuid::new_v4(),
            balance: dec!(0),
            credit_limit: dec!(100),
            attempted: dec!(150.00),
        };
        assert!(err.response_message().contains("150.00"));
        assert!(err.is_user_error());
    }

    #[test]
    fn database_errors_are_not_leaked() {
        let err = ServiceError::db_error(DbErr::Custom("connection reset by peer".into()));
        assert_eq!(err.response_message(), "Database error");
        assert!(!err.is_user_error());
    }

    #[test]
    fn serializes_structured_variants() {
        let product_id = Uuid::nil();
        let err = ServiceError::insufficient_lot_stock(product_id, Uuid::nil(), 5, 2);
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["InsufficientStock"]["requested"], 5);
        assert_eq!(json["InsufficientStock"]["available"], 2);
    }
}
