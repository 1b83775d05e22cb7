//! Ledger entries and the derived balance.
//!
//! Ledger entries are append-only and never mutated or deleted. Any
//! balance is derived by folding the log; no stored aggregate is trusted
//! as ground truth.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Balance-affecting event classification.
///
/// Earnings, adjustments and refunds carry positive amounts; payouts and
/// fees are stored negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Earning,
    Payout,
    Adjustment,
    Fee,
    Refund,
}

/// Back-reference to the record that produced an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntryReference {
    Redemption(Uuid),
    PayoutRequest(Uuid),
}

/// Immutable record of a balance-affecting event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub influencer_id: Uuid,
    pub entry_type: EntryType,
    /// Signed amount in minor units; sign must match `entry_type`.
    pub amount: i64,
    pub transacted_at: DateTime<Utc>,
    pub reference: Option<EntryReference>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(
        influencer_id: Uuid,
        entry_type: EntryType,
        amount: i64,
        transacted_at: DateTime<Utc>,
        reference: Option<EntryReference>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            influencer_id,
            entry_type,
            amount,
            transacted_at,
            reference,
            created_at: now,
        }
    }

    /// Whether `amount` has the sign convention `entry_type` requires.
    pub fn sign_is_valid(&self) -> bool {
        match self.entry_type {
            EntryType::Earning | EntryType::Adjustment | EntryType::Refund => self.amount > 0,
            EntryType::Payout | EntryType::Fee => self.amount < 0,
        }
    }
}

/// Filters for listing ledger entries.
#[derive(Debug, Clone, Default)]
pub struct LedgerFilter {
    pub entry_type: Option<EntryType>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl LedgerFilter {
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        if self.entry_type.is_some_and(|t| t != entry.entry_type) {
            return false;
        }
        if self.from.is_some_and(|from| entry.transacted_at < from) {
            return false;
        }
        if self.to.is_some_and(|to| entry.transacted_at >= to) {
            return false;
        }
        true
    }
}

/// Derived balance figures for an influencer, minor units.
///
/// `available_balance = total_earnings + adjustments + refunds
///  - total_payouts - fees - pending_payouts`; pending payouts are the
/// amounts locked in not-yet-paid payout requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub total_earnings: i64,
    pub total_payouts: i64,
    pub pending_payouts: i64,
    pub available_balance: i64,
}
