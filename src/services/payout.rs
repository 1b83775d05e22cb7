//! Payout request processing.
//!
//! Requests move one-directionally: pending -> approved -> paid, or
//! pending -> rejected. Funds stay locked (excluded from the available
//! balance) from request until paid or rejected; the payout ledger entry
//! is appended when the request is marked paid, in the same commit as the
//! status transition, so the ledger stays append-only and rejection needs
//! no compensating entry.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::domain::{
    EntryReference, EntryType, LedgerEntry, PayoutMethod, PayoutRequest, PayoutStatus,
};
use crate::error::EngineError;
use crate::services::ledger::LedgerService;
use crate::storage::{DocumentStore, Precondition, StorageError, WriteBatch, WriteOp};

/// Validates and transitions payout requests.
pub struct PayoutProcessor {
    store: Arc<dyn DocumentStore>,
    ledger: LedgerService,
    config: EngineConfig,
}

impl PayoutProcessor {
    pub fn new(store: Arc<dyn DocumentStore>, config: EngineConfig) -> Self {
        let ledger = LedgerService::new(Arc::clone(&store));
        Self {
            store,
            ledger,
            config,
        }
    }

    /// Create a payout request in `pending` status.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Validation`] for amounts below the minimum
    /// - [`EngineError::InvalidPayoutMethod`] for malformed details
    /// - [`EngineError::InsufficientBalance`] when the available balance
    ///   does not cover the request
    pub async fn request(
        &self,
        influencer_id: Uuid,
        amount: i64,
        method: PayoutMethod,
        now: DateTime<Utc>,
    ) -> Result<PayoutRequest, EngineError> {
        let minimum = self.config.payouts.minimum_amount;
        if amount < minimum {
            return Err(EngineError::Validation {
                message: format!("payout amount {amount} is below the minimum {minimum}"),
            });
        }
        method.validate()?;

        let balance = self.ledger.compute_balance(influencer_id).await?;
        if balance.available_balance < amount {
            return Err(EngineError::InsufficientBalance {
                available: balance.available_balance,
                requested: amount,
            });
        }

        let request = PayoutRequest {
            id: Uuid::new_v4(),
            influencer_id,
            amount,
            method,
            status: PayoutStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.store
            .commit(WriteBatch::new().write(WriteOp::PutPayoutRequest(request.clone())))
            .await?;

        info!(
            influencer = %influencer_id,
            amount,
            method = request.method.label(),
            "payout requested"
        );
        Ok(request)
    }

    /// Transition `pending -> approved`.
    ///
    /// Re-reads the balance immediately before approving so a request is
    /// never approved against a stale balance.
    pub async fn approve(
        &self,
        request_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<PayoutRequest, EngineError> {
        let request = self.load(request_id).await?;
        self.check_transition(&request, PayoutStatus::Approved)?;

        // The pending amount is already excluded from available; fees or
        // negative adjustments appended since the request can still have
        // driven it below zero.
        let balance = self.ledger.compute_balance(request.influencer_id).await?;
        if balance.available_balance < 0 {
            return Err(EngineError::InsufficientBalance {
                available: balance.available_balance + request.amount,
                requested: request.amount,
            });
        }

        self.transition(&request, PayoutStatus::Approved, now).await
    }

    /// Transition `approved -> paid` and append the payout ledger entry
    /// in the same atomic commit.
    pub async fn mark_paid(
        &self,
        request_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<PayoutRequest, EngineError> {
        let request = self.load(request_id).await?;
        self.check_transition(&request, PayoutStatus::Paid)?;

        let entry = LedgerEntry::new(
            request.influencer_id,
            EntryType::Payout,
            -request.amount,
            now,
            Some(EntryReference::PayoutRequest(request.id)),
            now,
        );
        let batch = WriteBatch::new()
            .guard(Precondition::PayoutStatusIs {
                request_id,
                status: request.status,
            })
            .write(WriteOp::SetPayoutStatus {
                request_id,
                status: PayoutStatus::Paid,
                updated_at: now,
            })
            .write(WriteOp::AppendLedger(entry));
        self.commit_transition(batch, &request, PayoutStatus::Paid)
            .await?;

        info!(request = %request_id, amount = request.amount, "payout paid");
        self.load(request_id).await
    }

    /// Transition `pending -> rejected`.
    ///
    /// The request leaves the pending set, which alone restores the
    /// available balance; no ledger entry was written at request time.
    pub async fn reject(
        &self,
        request_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<PayoutRequest, EngineError> {
        let request = self.load(request_id).await?;
        self.check_transition(&request, PayoutStatus::Rejected)?;
        self.transition(&request, PayoutStatus::Rejected, now).await
    }

    async fn load(&self, request_id: Uuid) -> Result<PayoutRequest, EngineError> {
        self.store
            .get_payout_request(request_id)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                entity: "payout_request",
                id: request_id.to_string(),
            })
    }

    fn check_transition(
        &self,
        request: &PayoutRequest,
        to: PayoutStatus,
    ) -> Result<(), EngineError> {
        if request.status.can_transition_to(to) {
            Ok(())
        } else {
            Err(EngineError::InvalidTransition {
                from: request.status,
                to,
            })
        }
    }

    async fn transition(
        &self,
        request: &PayoutRequest,
        to: PayoutStatus,
        now: DateTime<Utc>,
    ) -> Result<PayoutRequest, EngineError> {
        let batch = WriteBatch::new()
            .guard(Precondition::PayoutStatusIs {
                request_id: request.id,
                status: request.status,
            })
            .write(WriteOp::SetPayoutStatus {
                request_id: request.id,
                status: to,
                updated_at: now,
            });
        self.commit_transition(batch, request, to).await?;
        self.load(request.id).await
    }

    /// Commit a guarded transition; a lost race surfaces as the
    /// transition error the caller would have gotten on a fresh read.
    async fn commit_transition(
        &self,
        batch: WriteBatch,
        request: &PayoutRequest,
        to: PayoutStatus,
    ) -> Result<(), EngineError> {
        match self.store.commit(batch).await {
            Ok(()) => Ok(()),
            Err(StorageError::PreconditionFailed {
                condition: Precondition::PayoutStatusIs { .. },
            }) => {
                let current = self.load(request.id).await?;
                Err(EngineError::InvalidTransition {
                    from: current.status,
                    to,
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LedgerFilter;
    use crate::storage::MemoryStore;

    fn paypal() -> PayoutMethod {
        PayoutMethod::Paypal {
            email: "ada@example.com".into(),
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        processor: PayoutProcessor,
        ledger: LedgerService,
        influencer_id: Uuid,
    }

    async fn fixture_with_earnings(earnings: i64) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let ledger = LedgerService::new(store.clone());
        let influencer_id = Uuid::new_v4();
        if earnings > 0 {
            let now = Utc::now();
            ledger
                .append(LedgerEntry::new(
                    influencer_id,
                    EntryType::Earning,
                    earnings,
                    now,
                    None,
                    now,
                ))
                .await
                .unwrap();
        }
        let processor = PayoutProcessor::new(store.clone(), EngineConfig::default());
        Fixture {
            store,
            processor,
            ledger,
            influencer_id,
        }
    }

    #[tokio::test]
    async fn test_below_minimum_rejected() {
        let f = fixture_with_earnings(10_000).await;
        // $15 against the $20 minimum.
        let err = f
            .processor
            .request(f.influencer_id, 1500, paypal(), Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[tokio::test]
    async fn test_request_against_balance() {
        // $25 against a $30 balance -> approved, $5 left.
        let f = fixture_with_earnings(3000).await;
        let request = f
            .processor
            .request(f.influencer_id, 2500, paypal(), Utc::now())
            .await
            .unwrap();
        assert_eq!(request.status, PayoutStatus::Pending);

        let balance = f.ledger.compute_balance(f.influencer_id).await.unwrap();
        assert_eq!(balance.pending_payouts, 2500);
        assert_eq!(balance.available_balance, 500);
    }

    #[tokio::test]
    async fn test_insufficient_balance() {
        let f = fixture_with_earnings(3000).await;
        let err = f
            .processor
            .request(f.influencer_id, 3500, paypal(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::InsufficientBalance {
                available: 3000,
                requested: 3500
            }
        ));
    }

    #[tokio::test]
    async fn test_two_requests_cannot_overdraw() {
        let f = fixture_with_earnings(3000).await;
        f.processor
            .request(f.influencer_id, 2500, paypal(), Utc::now())
            .await
            .unwrap();
        // Only $5 remains available.
        let err = f
            .processor
            .request(f.influencer_id, 2500, paypal(), Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "insufficient_balance");
    }

    #[tokio::test]
    async fn test_full_lifecycle_to_paid() {
        let f = fixture_with_earnings(5000).await;
        let now = Utc::now();
        let request = f
            .processor
            .request(f.influencer_id, 2000, paypal(), now)
            .await
            .unwrap();

        let approved = f.processor.approve(request.id, now).await.unwrap();
        assert_eq!(approved.status, PayoutStatus::Approved);
        // Still locked while approved.
        let balance = f.ledger.compute_balance(f.influencer_id).await.unwrap();
        assert_eq!(balance.available_balance, 3000);

        let paid = f.processor.mark_paid(request.id, now).await.unwrap();
        assert_eq!(paid.status, PayoutStatus::Paid);

        // Paid: the payout entry replaces the pending lock; available
        // balance is unchanged across the transition.
        let balance = f.ledger.compute_balance(f.influencer_id).await.unwrap();
        assert_eq!(balance.total_payouts, 2000);
        assert_eq!(balance.pending_payouts, 0);
        assert_eq!(balance.available_balance, 3000);

        let entries = f
            .store
            .ledger_entries(
                f.influencer_id,
                &LedgerFilter {
                    entry_type: Some(EntryType::Payout),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount, -2000);
        assert_eq!(
            entries[0].reference,
            Some(EntryReference::PayoutRequest(request.id))
        );
    }

    #[tokio::test]
    async fn test_rejection_restores_balance() {
        let f = fixture_with_earnings(5000).await;
        let now = Utc::now();
        let request = f
            .processor
            .request(f.influencer_id, 2000, paypal(), now)
            .await
            .unwrap();
        assert_eq!(
            f.ledger
                .compute_balance(f.influencer_id)
                .await
                .unwrap()
                .available_balance,
            3000
        );

        let rejected = f.processor.reject(request.id, now).await.unwrap();
        assert_eq!(rejected.status, PayoutStatus::Rejected);

        let balance = f.ledger.compute_balance(f.influencer_id).await.unwrap();
        assert_eq!(balance.available_balance, 5000);
        assert_eq!(balance.total_payouts, 0);
    }

    #[tokio::test]
    async fn test_terminal_states_stay_terminal() {
        let f = fixture_with_earnings(5000).await;
        let now = Utc::now();
        let request = f
            .processor
            .request(f.influencer_id, 2000, paypal(), now)
            .await
            .unwrap();
        f.processor.reject(request.id, now).await.unwrap();

        let err = f.processor.approve(request.id, now).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidTransition {
                from: PayoutStatus::Rejected,
                to: PayoutStatus::Approved
            }
        ));

        // Paid cannot be rejected either.
        let second = f
            .processor
            .request(f.influencer_id, 2000, paypal(), now)
            .await
            .unwrap();
        f.processor.approve(second.id, now).await.unwrap();
        f.processor.mark_paid(second.id, now).await.unwrap();
        let err = f.processor.reject(second.id, now).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_transition");
    }

    #[tokio::test]
    async fn test_approval_rechecks_balance() {
        let f = fixture_with_earnings(5000).await;
        let now = Utc::now();
        let request = f
            .processor
            .request(f.influencer_id, 4000, paypal(), now)
            .await
            .unwrap();

        // A fee lands between request and approval.
        f.ledger
            .append(LedgerEntry::new(
                f.influencer_id,
                EntryType::Fee,
                -1500,
                now,
                None,
                now,
            ))
            .await
            .unwrap();

        let err = f.processor.approve(request.id, now).await.unwrap_err();
        assert_eq!(err.kind(), "insufficient_balance");
    }

    #[tokio::test]
    async fn test_invalid_method_rejected() {
        let f = fixture_with_earnings(5000).await;
        let err = f
            .processor
            .request(
                f.influencer_id,
                2000,
                PayoutMethod::Stripe {
                    account_id: "bogus".into(),
                },
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_payout_method");
    }
}
