/*!
 * Transaction Helper Utilities
 *
 * Every mutating operation opens one transaction, runs its body against it and
 * hands the body's result to [`finish`]. Nothing a body writes is visible to
 * other connections unless `finish` commits it.
 */

use crate::errors::ServiceError;
use metrics::counter;
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use tracing::{debug, error, warn};

/// Opens a transaction, mapping driver failures into [`ServiceError`].
pub async fn begin(db: &DatabaseConnection) -> Result<DatabaseTransaction, ServiceError> {
    counter!("tableside_db.transaction.started", 1);
    db.begin().await.map_err(|e| {
        error!(error = %e, "Failed to start transaction");
        ServiceError::DatabaseError(e)
    })
}

/// Commits `txn` when `result` is `Ok`, rolls it back otherwise.
///
/// A failed commit surfaces as the commit error; the body's value is dropped.
pub async fn finish<T>(
    txn: DatabaseTransaction,
    result: Result<T, ServiceError>,
) -> Result<T, ServiceError> {
    match result {
        Ok(value) => {
            txn.commit().await.map_err(|e| {
                error!(error = %e, "Failed to commit transaction");
                counter!("tableside_db.transaction.commit_failed", 1);
                ServiceError::DatabaseError(e)
            })?;
            counter!("tableside_db.transaction.committed", 1);
            Ok(value)
        }
        Err(err) => {
            counter!("tableside_db.transaction.rolled_back", 1);
            if let Err(rollback_err) = txn.rollback().await {
                // the connection is discarded by the pool either way
                warn!(error = %rollback_err, "Rollback failed");
            } else {
                debug!(reason = %err, "Transaction rolled back");
            }
            Err(err)
        }
    }
}
