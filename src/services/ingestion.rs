//! Redemption ingestion.
//!
//! Events are processed independently and sequentially: one malformed row
//! never aborts the batch, and no event observes another uncommitted
//! event's effects. Per-event writes are one atomic commit guarded by the
//! redemption uniqueness triple, which makes batch and CSV ingestion
//! safely re-runnable.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::domain::{
    Coupon, CouponKind, CouponStatus, EntryReference, EntryType, LedgerEntry, Redemption,
    RedemptionEvent,
};
use crate::services::split::{commission, resolve_split};
use crate::storage::{DocumentStore, Precondition, StorageError, WriteBatch, WriteOp};

/// Why one event in a batch did not produce a redemption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestFailure {
    /// Identical (code, timestamp, amount) triple already recorded.
    /// A no-op for idempotent re-imports, not an error.
    Duplicate,
    InvalidAmount,
    CouponNotFound,
    /// Coupon expired, revoked, or a content-meal coupon already used.
    CouponNotUsable,
    SpendingCapExceeded,
    CampaignNotFound,
    CampaignLimitReached,
    InfluencerNotFound,
    /// Store failure after retries; the event can be resubmitted.
    Storage(String),
}

impl IngestFailure {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            IngestFailure::Duplicate => "duplicate",
            IngestFailure::InvalidAmount => "invalid_amount",
            IngestFailure::CouponNotFound => "coupon_not_found",
            IngestFailure::CouponNotUsable => "coupon_not_usable",
            IngestFailure::SpendingCapExceeded => "spending_cap_exceeded",
            IngestFailure::CampaignNotFound => "campaign_not_found",
            IngestFailure::CampaignLimitReached => "campaign_limit_reached",
            IngestFailure::InfluencerNotFound => "influencer_not_found",
            IngestFailure::Storage(_) => "storage_unavailable",
        }
    }
}

/// An event that did not land, with its reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedEvent {
    pub event: RedemptionEvent,
    pub reason: IngestFailure,
}

/// Per-event outcomes for a batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestReport {
    pub successful: Vec<Redemption>,
    pub failed: Vec<FailedEvent>,
}

/// Ingests redemption events exactly once.
pub struct IngestionEngine {
    store: Arc<dyn DocumentStore>,
    config: EngineConfig,
}

impl IngestionEngine {
    pub fn new(store: Arc<dyn DocumentStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Process a batch of candidate redemption events.
    ///
    /// Events are independent; the report carries a per-event outcome
    /// rather than an all-or-nothing result.
    pub async fn ingest(&self, events: Vec<RedemptionEvent>, now: DateTime<Utc>) -> IngestReport {
        let mut report = IngestReport::default();
        let total = events.len();

        for event in events {
            match self.ingest_one(&event, now).await {
                Ok(redemption) => report.successful.push(redemption),
                Err(reason) => {
                    debug!(
                        code = %event.coupon_code,
                        reason = reason.code(),
                        "redemption event not recorded"
                    );
                    report.failed.push(FailedEvent { event, reason });
                }
            }
        }

        info!(
            total,
            successful = report.successful.len(),
            failed = report.failed.len(),
            "redemption batch ingested"
        );
        report
    }

    async fn ingest_one(
        &self,
        event: &RedemptionEvent,
        now: DateTime<Utc>,
    ) -> Result<Redemption, IngestFailure> {
        if event.order_amount <= 0 {
            return Err(IngestFailure::InvalidAmount);
        }

        let key = event.key();
        if self
            .store
            .find_redemption(&key)
            .await
            .map_err(storage_failure)?
            .is_some()
        {
            return Err(IngestFailure::Duplicate);
        }

        let coupon = self
            .store
            .find_coupon_by_code(&event.coupon_code)
            .await
            .map_err(storage_failure)?
            .ok_or(IngestFailure::CouponNotFound)?;

        if !coupon.is_redeemable_at(event.redeemed_at) {
            return Err(IngestFailure::CouponNotUsable);
        }
        if let CouponKind::ContentMeal {
            spending_cap: Some(cap),
            ..
        } = coupon.kind
        {
            if event.order_amount > cap {
                return Err(IngestFailure::SpendingCapExceeded);
            }
        }

        let campaign = self
            .store
            .get_campaign(coupon.campaign_id)
            .await
            .map_err(storage_failure)?
            .ok_or(IngestFailure::CampaignNotFound)?;
        if campaign.redemption_limit_reached() {
            return Err(IngestFailure::CampaignLimitReached);
        }

        let (split_pct, earnings) = self.resolve_earnings(&coupon, event).await?;

        let redemption = Redemption {
            id: Uuid::new_v4(),
            source: event.source,
            coupon_id: coupon.id,
            coupon_code: coupon.code.clone(),
            campaign_id: coupon.campaign_id,
            influencer_id: coupon.influencer_id,
            business_id: coupon.business_id,
            order_amount: event.order_amount,
            earnings,
            split_pct,
            redeemed_at: event.redeemed_at,
            created_at: now,
        };

        let mut batch = WriteBatch::new()
            .guard(Precondition::RedemptionKeyAbsent(key))
            .guard(Precondition::CampaignBelowRedemptionCap {
                campaign_id: coupon.campaign_id,
            })
            .write(WriteOp::PutRedemption(redemption.clone()))
            .write(WriteOp::BumpCampaignRedemption {
                campaign_id: coupon.campaign_id,
                revenue: event.order_amount,
            });

        if earnings > 0 {
            batch = batch.write(WriteOp::AppendLedger(LedgerEntry::new(
                coupon.influencer_id,
                EntryType::Earning,
                earnings,
                event.redeemed_at,
                Some(EntryReference::Redemption(redemption.id)),
                now,
            )));
        }

        if matches!(coupon.status, CouponStatus::Issued | CouponStatus::Active) {
            batch = batch.write(WriteOp::SetCouponStatus {
                coupon_id: coupon.id,
                status: CouponStatus::Used,
            });
        }
        if let CouponKind::Affiliate { link_id } = coupon.kind {
            batch = batch.write(WriteOp::BumpLinkConversions { link_id });
        }

        let commit = crate::retry::with_storage_retry(|| {
            let batch = batch.clone();
            async move { self.store.commit(batch).await }
        })
        .await;

        match commit {
            Ok(()) => {
                debug!(
                    code = %redemption.coupon_code,
                    amount = redemption.order_amount,
                    earnings = redemption.earnings,
                    split_pct = redemption.split_pct,
                    "redemption recorded"
                );
                Ok(redemption)
            }
            // A racing submission committed the same triple first.
            Err(StorageError::PreconditionFailed {
                condition: Precondition::RedemptionKeyAbsent(_),
            }) => Err(IngestFailure::Duplicate),
            // A racing redemption took the campaign's last slot.
            Err(StorageError::PreconditionFailed {
                condition: Precondition::CampaignBelowRedemptionCap { .. },
            }) => Err(IngestFailure::CampaignLimitReached),
            Err(e) => {
                warn!(code = %event.coupon_code, error = %e, "redemption commit failed");
                Err(storage_failure(e))
            }
        }
    }

    /// Resolve the frozen split percentage and earnings for a coupon.
    async fn resolve_earnings(
        &self,
        coupon: &Coupon,
        event: &RedemptionEvent,
    ) -> Result<(u8, i64), IngestFailure> {
        // Content-meal coupons carry no revenue share.
        if !coupon.is_affiliate() {
            return Ok((0, 0));
        }

        let influencer = self
            .store
            .get_influencer(coupon.influencer_id)
            .await
            .map_err(storage_failure)?
            .ok_or(IngestFailure::InfluencerNotFound)?;
        let business = self
            .store
            .get_business(coupon.business_id)
            .await
            .map_err(storage_failure)?;
        let campaign = self
            .store
            .get_campaign(coupon.campaign_id)
            .await
            .map_err(storage_failure)?
            .ok_or(IngestFailure::CampaignNotFound)?;

        let pct = resolve_split(
            business.as_ref(),
            &campaign,
            influencer.tier,
            self.config.splits.platform_default_pct,
        );
        Ok((pct, commission(event.order_amount, pct)))
    }
}

fn storage_failure(error: StorageError) -> IngestFailure {
    IngestFailure::Storage(error.to_string())
}
