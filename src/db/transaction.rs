/*!
 * Transaction helpers
 *
 * Services open a transaction with [`begin`], run their unit of work against
 * it, and hand the outcome to [`finish`], which commits on `Ok` and rolls
 * back on `Err`. Nothing a unit of work wrote survives a failed outcome.
 */

use crate::errors::ServiceError;
use metrics::counter;
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use tracing::{debug, warn};

/// Opens a transaction on the pool.
pub async fn begin(db: &DatabaseConnection) -> Result<DatabaseTransaction, ServiceError> {
    counter!("retail_ledger.db.transaction.started", 1);
    db.begin().await.map_err(ServiceError::db_error)
}

/// Commits `txn` when `outcome` is `Ok`, rolls it back otherwise.
///
/// A rollback failure is logged and the original error is returned, since
/// the caller cares about why the unit of work failed.
pub async fn finish<T>(
    txn: DatabaseTransaction,
    outcome: Result<T, ServiceError>,
) -> Result<T, ServiceError> {
    match outcome {
        Ok(value) => {
            txn.commit().await.map_err(ServiceError::db_error)?;
            counter!("retail_ledger.db.transaction.committed", 1);
            debug!("Transaction committed");
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = txn.rollback().await {
                warn!(error = %rollback_err, "Transaction rollback failed");
            }
            counter!("retail_ledger.db.transaction.rolled_back", 1);
            debug!(error = %err, "Transaction rolled back");
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{establish_connection_with_config, run_migrations, DbConfig};
    use crate::entities::branch;
    use chrono::Utc;
    use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};
    use uuid::Uuid;

    async fn pool() -> DatabaseConnection {
        let pool = establish_connection_with_config(&DbConfig::in_memory())
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    fn branch_row() -> branch::ActiveModel {
        branch::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set("Centro".into()),
            address: Set(None),
            created_at: Set(Utc::now()),
        }
    }

    #[tokio::test]
    async fn commits_ok_outcome() {
        let db = pool().await;
        let txn = begin(&db).await.unwrap();
        let outcome = branch_row().insert(&txn).await.map_err(ServiceError::db_error);
        finish(txn, outcome).await.unwrap();
        assert_eq!(branch::Entity::find().count(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rolls_back_err_outcome() {
        let db = pool().await;
        let txn = begin(&db).await.unwrap();
        branch_row().insert(&txn).await.unwrap();
        let outcome: Result<(), ServiceError> = Err(ServiceError::EmptyCart);
        let err = finish(txn, outcome).await.unwrap_err();
        assert_eq!(err.error_code(), "empty_cart");
        assert_eq!(branch::Entity::find().count(&db).await.unwrap(), 0);
    }
}
