//! Engine error taxonomy.
//!
//! Every error carries a stable machine-readable kind plus a human-readable
//! message. Only [`StorageError::Unavailable`] is eligible for automatic
//! retry (see [`crate::retry`]); everything else is terminal for its
//! operation or recoverable only by the caller correcting input.

use uuid::Uuid;

use crate::domain::PayoutStatus;
use crate::services::eligibility::IneligibleReason;
use crate::storage::StorageError;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by the engine's external interface.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Malformed input; recoverable by the caller correcting it.
    #[error("validation failed: {message}")]
    Validation { message: String },

    /// Unknown business/influencer/campaign/coupon.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Eligibility checks failed; carries the full reason list.
    #[error("influencer not eligible: {}", format_reasons(.reasons))]
    Ineligible { reasons: Vec<IneligibleReason> },

    /// A non-revoked affiliate coupon already binds this pair, or a
    /// concurrent join won the race.
    #[error("influencer {influencer_id} already joined campaign {campaign_id}")]
    AlreadyJoined {
        influencer_id: Uuid,
        campaign_id: Uuid,
    },

    /// A redemption with the identical (code, timestamp, amount) triple
    /// was already recorded.
    #[error("duplicate redemption for coupon {code}")]
    DuplicateRedemption { code: String },

    /// Requested payout exceeds the available balance.
    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance { available: i64, requested: i64 },

    /// Method-specific payout details missing or malformed.
    #[error("invalid payout method: {message}")]
    InvalidPayoutMethod { message: String },

    /// Illegal payout request state transition.
    #[error("invalid payout transition: {from:?} -> {to:?}")]
    InvalidTransition { from: PayoutStatus, to: PayoutStatus },

    /// Underlying store failure. `Unavailable` is the only retryable class.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl EngineError {
    /// Stable machine-readable kind for callers and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation { .. } => "validation",
            EngineError::NotFound { .. } => "not_found",
            EngineError::Ineligible { .. } => "not_eligible",
            EngineError::AlreadyJoined { .. } => "already_joined",
            EngineError::DuplicateRedemption { .. } => "duplicate_redemption",
            EngineError::InsufficientBalance { .. } => "insufficient_balance",
            EngineError::InvalidPayoutMethod { .. } => "invalid_payout_method",
            EngineError::InvalidTransition { .. } => "invalid_transition",
            EngineError::Storage(StorageError::Unavailable(_)) => "storage_unavailable",
            EngineError::Storage(_) => "storage",
        }
    }
}

fn format_reasons(reasons: &[IneligibleReason]) -> String {
    reasons
        .iter()
        .map(|r| r.code())
        .collect::<Vec<_>>()
        .join(", ")
}
