//! Engine facade for in-process library usage.
//!
//! The presentation and identity layers sit outside this crate; they
//! resolve the calling principal, perform authorization, and parse any
//! CSV before handing the engine already-typed rows.
//!
//! # Example
//!
//! ```ignore
//! use affiliate_engine::Engine;
//!
//! let engine = Engine::in_memory();
//! let eligibility = engine.evaluate_eligibility(influencer_id, campaign_id).await?;
//! if eligibility.eligible {
//!     let grant = engine.issue_coupons(influencer_id, campaign_id, true).await?;
//! }
//! ```

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::domain::{
    Balance, Business, Campaign, Influencer, LedgerEntry, LedgerFilter, PayoutMethod,
    PayoutRequest, PlatformMetrics, RedemptionEvent,
};
use crate::error::EngineError;
use crate::services::ingestion::IngestReport;
use crate::services::issuance::JoinGrant;
use crate::services::ledger::adjustment_entry;
use crate::services::{
    Eligibility, EligibilityEvaluator, IngestionEngine, IssuanceService, LedgerService,
    PayoutProcessor,
};
use crate::storage::{DocumentStore, MemoryStore, WriteBatch, WriteOp};

/// The coupon lifecycle & commission ledger engine.
///
/// Owns the document store handle and wires the services together. All
/// methods are safe to call concurrently; consistency is delegated to the
/// store's atomic commits and conditional writes.
pub struct Engine {
    store: Arc<dyn DocumentStore>,
    config: EngineConfig,
    eligibility: EligibilityEvaluator,
    issuance: IssuanceService,
    ingestion: IngestionEngine,
    ledger: LedgerService,
    payouts: PayoutProcessor,
}

impl Engine {
    /// Create an engine over an existing store.
    pub fn new(store: Arc<dyn DocumentStore>, config: EngineConfig) -> Self {
        Self {
            eligibility: EligibilityEvaluator::new(Arc::clone(&store), config.cooldown.clone()),
            issuance: IssuanceService::new(Arc::clone(&store), config.clone()),
            ingestion: IngestionEngine::new(Arc::clone(&store), config.clone()),
            ledger: LedgerService::new(Arc::clone(&store)),
            payouts: PayoutProcessor::new(Arc::clone(&store), config.clone()),
            config,
            store,
        }
    }

    /// Create an engine over a fresh in-memory store with defaults.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), EngineConfig::default())
    }

    /// The underlying store handle.
    pub fn store(&self) -> Arc<dyn DocumentStore> {
        Arc::clone(&self.store)
    }

    // --- registration (called by the excluded CRUD layer) ---

    pub async fn put_business(&self, business: Business) -> Result<(), EngineError> {
        Ok(self.store.put_business(business).await?)
    }

    pub async fn put_influencer(&self, influencer: Influencer) -> Result<(), EngineError> {
        Ok(self.store.put_influencer(influencer).await?)
    }

    pub async fn put_campaign(&self, campaign: Campaign) -> Result<(), EngineError> {
        Ok(self.store.put_campaign(campaign).await?)
    }

    /// Update one platform's metrics for an influencer, recomputing the
    /// tier and appending to the tier history on a move.
    pub async fn update_influencer_metrics(
        &self,
        influencer_id: Uuid,
        platform: &str,
        metrics: PlatformMetrics,
    ) -> Result<Influencer, EngineError> {
        let mut influencer = self
            .store
            .get_influencer(influencer_id)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                entity: "influencer",
                id: influencer_id.to_string(),
            })?;
        influencer.apply_metrics(
            platform,
            metrics,
            self.config.tiers.promotion_proximity,
            Utc::now(),
        )?;
        self.store.put_influencer(influencer.clone()).await?;
        Ok(influencer)
    }

    // --- external interface ---

    /// Decide whether an influencer may join a campaign, with the full
    /// reason list on rejection.
    pub async fn evaluate_eligibility(
        &self,
        influencer_id: Uuid,
        campaign_id: Uuid,
    ) -> Result<Eligibility, EngineError> {
        self.eligibility
            .evaluate(influencer_id, campaign_id, Utc::now())
            .await
    }

    /// Admit an influencer and atomically issue the coupon pair plus
    /// affiliate link.
    pub async fn issue_coupons(
        &self,
        influencer_id: Uuid,
        campaign_id: Uuid,
        terms_accepted: bool,
    ) -> Result<JoinGrant, EngineError> {
        self.issuance
            .issue(influencer_id, campaign_id, terms_accepted, Utc::now())
            .await
    }

    /// Ingest redemption events exactly once, with per-event outcomes.
    pub async fn ingest_redemptions(&self, events: Vec<RedemptionEvent>) -> IngestReport {
        self.ingestion.ingest(events, Utc::now()).await
    }

    /// Derived balance for an influencer, folded from the ledger.
    pub async fn compute_balance(&self, influencer_id: Uuid) -> Result<Balance, EngineError> {
        self.ledger.compute_balance(influencer_id).await
    }

    /// Ledger entries for an influencer, oldest first.
    pub async fn list_ledger(
        &self,
        influencer_id: Uuid,
        filter: &LedgerFilter,
    ) -> Result<Vec<LedgerEntry>, EngineError> {
        self.ledger.list(influencer_id, filter).await
    }

    /// Append an administrative adjustment for an influencer.
    pub async fn record_adjustment(
        &self,
        influencer_id: Uuid,
        amount: i64,
    ) -> Result<(), EngineError> {
        let now = Utc::now();
        self.ledger
            .append(adjustment_entry(influencer_id, amount, now, now))
            .await
    }

    /// Record a click on an affiliate link.
    pub async fn record_link_click(&self, link_id: Uuid) -> Result<(), EngineError> {
        Ok(self
            .store
            .commit(WriteBatch::new().write(WriteOp::BumpLinkClicks { link_id }))
            .await?)
    }

    /// Validate and create a payout request in `pending` status.
    pub async fn request_payout(
        &self,
        influencer_id: Uuid,
        amount: i64,
        method: PayoutMethod,
    ) -> Result<PayoutRequest, EngineError> {
        self.payouts
            .request(influencer_id, amount, method, Utc::now())
            .await
    }

    /// Transition a payout request `pending -> approved`, re-checking
    /// the balance first.
    pub async fn approve_payout(&self, request_id: Uuid) -> Result<PayoutRequest, EngineError> {
        self.payouts.approve(request_id, Utc::now()).await
    }

    /// Transition a payout request `approved -> paid`, appending the
    /// payout ledger entry in the same commit.
    pub async fn mark_payout_paid(
        &self,
        request_id: Uuid,
    ) -> Result<PayoutRequest, EngineError> {
        self.payouts.mark_paid(request_id, Utc::now()).await
    }

    /// Transition a payout request `pending -> rejected`.
    pub async fn reject_payout(&self, request_id: Uuid) -> Result<PayoutRequest, EngineError> {
        self.payouts.reject(request_id, Utc::now()).await
    }
}
