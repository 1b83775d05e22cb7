//! Ledger & balance engine.
//!
//! The ledger is the single source of truth for money. Balances are
//! folded from the append-only log on demand; no separately mutated
//! "cached balance" field is ever trusted.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::domain::{Balance, EntryType, LedgerEntry, LedgerFilter};
use crate::error::EngineError;
use crate::retry::with_storage_retry;
use crate::storage::{DocumentStore, WriteBatch, WriteOp};

/// Append-only ledger operations and derived balances.
pub struct LedgerService {
    store: Arc<dyn DocumentStore>,
}

impl LedgerService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Append one entry. Pure append; existing entries are never touched.
    ///
    /// # Errors
    ///
    /// [`EngineError::Validation`] when the amount's sign does not match
    /// the entry type (earnings/adjustments/refunds positive, payouts and
    /// fees negative).
    pub async fn append(&self, entry: LedgerEntry) -> Result<(), EngineError> {
        if !entry.sign_is_valid() {
            return Err(EngineError::Validation {
                message: format!(
                    "amount {} has the wrong sign for entry type {:?}",
                    entry.amount, entry.entry_type
                ),
            });
        }
        self.store
            .commit(WriteBatch::new().write(WriteOp::AppendLedger(entry)))
            .await?;
        Ok(())
    }

    /// Fold all entries and pending payout requests into a balance.
    ///
    /// `available = earnings + adjustments + refunds - |payouts| - |fees|
    ///  - pending payouts`. Safe to run concurrently with appends; a read
    /// may miss an in-flight append but never observes a partial one.
    pub async fn compute_balance(&self, influencer_id: Uuid) -> Result<Balance, EngineError> {
        let entries = with_storage_retry(|| async move {
            self.store
                .ledger_entries(influencer_id, &LedgerFilter::default())
                .await
        })
        .await?;

        let mut total_earnings = 0i64;
        let mut credits = 0i64;
        let mut total_payouts = 0i64;
        let mut fees = 0i64;
        for entry in &entries {
            match entry.entry_type {
                EntryType::Earning => {
                    total_earnings += entry.amount;
                    credits += entry.amount;
                }
                EntryType::Adjustment | EntryType::Refund => credits += entry.amount,
                EntryType::Payout => total_payouts += entry.amount.abs(),
                EntryType::Fee => fees += entry.amount.abs(),
            }
        }

        let pending_payouts = with_storage_retry(|| async move {
            self.store.payout_requests(influencer_id).await
        })
        .await?
        .iter()
        .filter(|r| r.status.locks_funds())
        .map(|r| r.amount)
        .sum::<i64>();

        let balance = Balance {
            total_earnings,
            total_payouts,
            pending_payouts,
            available_balance: credits - total_payouts - fees - pending_payouts,
        };
        debug!(
            influencer = %influencer_id,
            available = balance.available_balance,
            pending = balance.pending_payouts,
            "balance computed"
        );
        Ok(balance)
    }

    /// Ledger entries for an influencer, oldest first, filtered.
    pub async fn list(
        &self,
        influencer_id: Uuid,
        filter: &LedgerFilter,
    ) -> Result<Vec<LedgerEntry>, EngineError> {
        Ok(self.store.ledger_entries(influencer_id, filter).await?)
    }
}

/// Convenience constructor for entries created outside redemption flow
/// (administrative adjustments, platform fees).
pub fn adjustment_entry(
    influencer_id: Uuid,
    amount: i64,
    transacted_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> LedgerEntry {
    LedgerEntry::new(
        influencer_id,
        EntryType::Adjustment,
        amount,
        transacted_at,
        None,
        now,
    )
}
