//! Document-store abstraction.
//!
//! The engine holds no in-process shared mutable state and takes no
//! long-lived locks; it relies entirely on the store's atomic
//! all-or-nothing batch commit and on conditional-write preconditions to
//! resolve races. Collections are typed; every write that must be
//! all-or-nothing goes through [`DocumentStore::commit`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    AffiliateLink, Business, Campaign, Coupon, CouponStatus, Influencer, JoinEvent, LedgerEntry,
    LedgerFilter, PayoutRequest, PayoutStatus, Redemption, RedemptionKey,
};

pub mod memory;

pub use memory::MemoryStore;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A commit precondition did not hold; the batch was not applied.
    #[error("precondition failed: {condition:?}")]
    PreconditionFailed { condition: Precondition },

    /// Transient store failure; the only retryable class. A timed-out
    /// commit surfaces here and never leaves partial state behind.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt record in {collection}: {message}")]
    Corrupt {
        collection: &'static str,
        message: String,
    },
}

/// Conditional-write guard evaluated atomically with the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// No non-revoked affiliate coupon binds this pair. Resolves
    /// concurrent duplicate joins to exactly one winner.
    NoActiveAffiliateCoupon {
        influencer_id: Uuid,
        campaign_id: Uuid,
    },
    /// No redemption with this (code, timestamp, amount) triple exists.
    /// Backs idempotent ingestion.
    RedemptionKeyAbsent(RedemptionKey),
    /// The campaign still has influencer capacity.
    CampaignHasCapacity { campaign_id: Uuid },
    /// The campaign's redemption cap, if any, has not been reached.
    CampaignBelowRedemptionCap { campaign_id: Uuid },
    /// The payout request is currently in the given status.
    PayoutStatusIs { request_id: Uuid, status: PayoutStatus },
}

/// One write inside an atomic batch.
#[derive(Debug, Clone)]
pub enum WriteOp {
    PutCoupon(Coupon),
    PutLink(AffiliateLink),
    PutRedemption(Redemption),
    AppendLedger(LedgerEntry),
    PutJoinEvent(JoinEvent),
    PutPayoutRequest(PayoutRequest),
    SetCouponStatus {
        coupon_id: Uuid,
        status: CouponStatus,
    },
    SetPayoutStatus {
        request_id: Uuid,
        status: PayoutStatus,
        updated_at: DateTime<Utc>,
    },
    BumpLinkClicks {
        link_id: Uuid,
    },
    BumpLinkConversions {
        link_id: Uuid,
    },
    /// current_influencers += 1
    BumpCampaignJoin {
        campaign_id: Uuid,
    },
    /// redemption_count += 1, revenue += order amount
    BumpCampaignRedemption {
        campaign_id: Uuid,
        revenue: i64,
    },
}

/// Atomic, all-or-nothing unit of writes guarded by preconditions.
///
/// Either every op is durably applied, or none are.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    pub preconditions: Vec<Precondition>,
    pub ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a precondition; chainable.
    pub fn guard(mut self, condition: Precondition) -> Self {
        self.preconditions.push(condition);
        self
    }

    /// Add a write; chainable.
    pub fn write(mut self, op: WriteOp) -> Self {
        self.ops.push(op);
        self
    }
}

/// Interface for document persistence.
///
/// Implementations:
/// - [`MemoryStore`]: in-memory store for tests and embedded use
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_business(&self, id: Uuid) -> Result<Option<Business>>;
    async fn put_business(&self, business: Business) -> Result<()>;

    async fn get_influencer(&self, id: Uuid) -> Result<Option<Influencer>>;
    async fn put_influencer(&self, influencer: Influencer) -> Result<()>;

    async fn get_campaign(&self, id: Uuid) -> Result<Option<Campaign>>;
    async fn put_campaign(&self, campaign: Campaign) -> Result<()>;

    async fn get_coupon(&self, id: Uuid) -> Result<Option<Coupon>>;

    /// Look up a coupon by its unique code.
    async fn find_coupon_by_code(&self, code: &str) -> Result<Option<Coupon>>;

    /// All coupons ever issued to this (influencer, campaign) pair.
    async fn coupons_for_pair(
        &self,
        influencer_id: Uuid,
        campaign_id: Uuid,
    ) -> Result<Vec<Coupon>>;

    async fn get_link(&self, id: Uuid) -> Result<Option<AffiliateLink>>;

    /// Look up a redemption by its uniqueness triple.
    async fn find_redemption(&self, key: &RedemptionKey) -> Result<Option<Redemption>>;

    /// Ledger entries for an influencer matching the filter, oldest first.
    async fn ledger_entries(
        &self,
        influencer_id: Uuid,
        filter: &LedgerFilter,
    ) -> Result<Vec<LedgerEntry>>;

    /// Join events for an influencer at or after `cutoff`, oldest first.
    async fn join_events_since(
        &self,
        influencer_id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<JoinEvent>>;

    async fn get_payout_request(&self, id: Uuid) -> Result<Option<PayoutRequest>>;

    /// All payout requests for an influencer, oldest first.
    async fn payout_requests(&self, influencer_id: Uuid) -> Result<Vec<PayoutRequest>>;

    /// Apply a batch atomically. All preconditions are evaluated and all
    /// ops applied as one unit; a concurrent reader never observes a
    /// partially-applied batch.
    async fn commit(&self, batch: WriteBatch) -> Result<()>;
}
