//! Retry policies: backoff builders and retryable error classification.
//!
//! Uses `backon` for exponential backoff with jitter. Only
//! [`StorageError::Unavailable`] is retried; validation, eligibility and
//! precondition failures will never succeed on retry.

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tracing::warn;

use crate::storage::StorageError;

/// Standard backoff for store operations.
///
/// - Min delay: 50ms
/// - Max delay: 2s
/// - Max attempts: 5
/// - Jitter enabled
pub fn storage_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(50))
        .with_max_delay(Duration::from_secs(2))
        .with_max_times(5)
        .with_jitter()
}

/// Determines if a storage error is retryable.
///
/// Retryable:
/// - `Unavailable`: transient outage or timeout; the atomic commit
///   guarantees no partial state was left behind.
///
/// Non-retryable:
/// - `PreconditionFailed`: a conditional write lost its race; retrying
///   would spin on the same condition.
/// - `NotFound` / `Corrupt`: terminal for the operation.
pub fn is_retryable(error: &StorageError) -> bool {
    matches!(error, StorageError::Unavailable(_))
}

/// Run a store operation under the standard backoff policy.
pub async fn with_storage_retry<T, Fut, F>(op: F) -> Result<T, StorageError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StorageError>>,
{
    op.retry(storage_backoff())
        .when(is_retryable)
        .notify(|err: &StorageError, dur: Duration| {
            warn!("store unavailable, retrying in {:?}: {}", dur, err);
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RedemptionKey;
    use crate::storage::Precondition;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_is_retryable() {
        assert!(is_retryable(&StorageError::Unavailable("timeout".into())));
        assert!(!is_retryable(&StorageError::NotFound {
            entity: "coupon",
            id: "x".into()
        }));
        assert!(!is_retryable(&StorageError::PreconditionFailed {
            condition: Precondition::RedemptionKeyAbsent(RedemptionKey {
                code: "AFF-X".into(),
                redeemed_at: chrono::Utc::now(),
                order_amount: 100,
            }),
        }));
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let attempts = AtomicU32::new(0);
        let result = with_storage_retry(|| async {
            if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(StorageError::Unavailable("flaky".into()))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_does_not_retry_precondition_failures() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = with_storage_retry(|| async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::PreconditionFailed {
                condition: Precondition::CampaignHasCapacity {
                    campaign_id: uuid::Uuid::new_v4(),
                },
            })
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
