use sqlx::{Postgres, Transaction};
use tracing::warn;

/// Ends a transaction according to `outcome`: commit on `Ok`, rollback on
/// `Err`. The outcome error is returned even if the rollback itself fails.
pub async fn finish<T, E>(
    tx: Transaction<'static, Postgres>,
    outcome: Result<T, E>,
) -> Result<T, E>
where
    E: From<sqlx::Error>,
{
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "transaction rollback failed");
            }
            Err(err)
        }
    }
}
