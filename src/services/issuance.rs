//! Coupon issuance.
//!
//! A successful join atomically creates the affiliate coupon, the
//! content-meal coupon, the affiliate link, the join audit event, and the
//! campaign counter increment. Either all five land or none do. The
//! commit is guarded by a conditional write on the (influencer, campaign)
//! pair so a racing duplicate join resolves to exactly one winner.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::codes;
use crate::config::EngineConfig;
use crate::domain::{
    AffiliateLink, Campaign, Coupon, CouponKind, CouponStatus, JoinEvent,
};
use crate::error::EngineError;
use crate::retry::with_storage_retry;
use crate::services::eligibility::EligibilityEvaluator;
use crate::storage::{DocumentStore, Precondition, StorageError, WriteBatch, WriteOp};

/// Everything a successful join creates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinGrant {
    pub affiliate_coupon: Coupon,
    pub content_coupon: Coupon,
    pub affiliate_link: AffiliateLink,
}

/// Issues paired coupons on campaign admission.
pub struct IssuanceService {
    store: Arc<dyn DocumentStore>,
    config: EngineConfig,
}

impl IssuanceService {
    pub fn new(store: Arc<dyn DocumentStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Admit an influencer to a campaign and issue the coupon pair.
    ///
    /// Runs a fresh eligibility pass first; `terms_accepted` must already
    /// have been recorded by the caller.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Validation`] when terms were not accepted
    /// - [`EngineError::Ineligible`] with the full reason list
    /// - [`EngineError::AlreadyJoined`] when a concurrent join won the race
    pub async fn issue(
        &self,
        influencer_id: Uuid,
        campaign_id: Uuid,
        terms_accepted: bool,
        now: DateTime<Utc>,
    ) -> Result<JoinGrant, EngineError> {
        if !terms_accepted {
            return Err(EngineError::Validation {
                message: "terms must be accepted before joining".to_string(),
            });
        }

        let evaluator =
            EligibilityEvaluator::new(Arc::clone(&self.store), self.config.cooldown.clone());
        let eligibility = evaluator.evaluate(influencer_id, campaign_id, now).await?;
        if !eligibility.eligible {
            return Err(EngineError::Ineligible {
                reasons: eligibility.reasons,
            });
        }

        let campaign = self
            .store
            .get_campaign(campaign_id)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                entity: "campaign",
                id: campaign_id.to_string(),
            })?;

        let affiliate_code = self.fresh_code(codes::AFFILIATE_PREFIX).await?;
        let content_code = self.fresh_code(codes::CONTENT_MEAL_PREFIX).await?;

        let link_id = Uuid::new_v4();
        let affiliate_coupon = Coupon {
            id: Uuid::new_v4(),
            campaign_id,
            influencer_id,
            business_id: campaign.business_id,
            code: affiliate_code,
            status: CouponStatus::Issued,
            issued_at: now,
            expires_at: self.affiliate_expiry(&campaign, now),
            kind: CouponKind::Affiliate { link_id },
        };

        let content_expiry = now + Duration::days(self.config.coupons.content_meal_validity_days);
        let content_coupon = Coupon {
            id: Uuid::new_v4(),
            campaign_id,
            influencer_id,
            business_id: campaign.business_id,
            code: content_code,
            status: CouponStatus::Issued,
            issued_at: now,
            expires_at: content_expiry,
            kind: CouponKind::ContentMeal {
                spending_cap: None,
                content_deadline: content_expiry,
            },
        };

        let mut affiliate_link = AffiliateLink::new(
            codes::link_token(),
            affiliate_coupon.id,
            influencer_id,
            campaign.business_id,
            campaign_id,
            now,
        );
        affiliate_link.id = link_id;

        let batch = WriteBatch::new()
            .guard(Precondition::NoActiveAffiliateCoupon {
                influencer_id,
                campaign_id,
            })
            .guard(Precondition::CampaignHasCapacity { campaign_id })
            .write(WriteOp::PutCoupon(affiliate_coupon.clone()))
            .write(WriteOp::PutCoupon(content_coupon.clone()))
            .write(WriteOp::PutLink(affiliate_link.clone()))
            .write(WriteOp::PutJoinEvent(JoinEvent::new(
                influencer_id,
                campaign_id,
                campaign.business_id,
                now,
            )))
            .write(WriteOp::BumpCampaignJoin { campaign_id });

        let result = with_storage_retry(|| {
            let batch = batch.clone();
            async move { self.store.commit(batch).await }
        })
        .await;

        match result {
            Ok(()) => {
                info!(
                    influencer = %influencer_id,
                    campaign = %campaign_id,
                    affiliate_code = %affiliate_coupon.code,
                    "coupon pair issued"
                );
                Ok(JoinGrant {
                    affiliate_coupon,
                    content_coupon,
                    affiliate_link,
                })
            }
            Err(StorageError::PreconditionFailed {
                condition: Precondition::NoActiveAffiliateCoupon { .. },
            }) => Err(EngineError::AlreadyJoined {
                influencer_id,
                campaign_id,
            }),
            Err(StorageError::PreconditionFailed {
                condition: Precondition::CampaignHasCapacity { .. },
            }) => Err(EngineError::Ineligible {
                reasons: vec![crate::services::eligibility::IneligibleReason::CampaignFull],
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Affiliate coupons expire at campaign end or the configured cap
    /// from issuance, whichever is sooner.
    fn affiliate_expiry(&self, campaign: &Campaign, now: DateTime<Utc>) -> DateTime<Utc> {
        let cap = now + Duration::days(self.config.coupons.affiliate_validity_days);
        match campaign.ends_at {
            Some(end) if end < cap => end,
            _ => cap,
        }
    }

    /// Generate a code not yet present in the store. Collisions are
    /// vanishingly rare; the loop is bounded regardless.
    async fn fresh_code(&self, prefix: &str) -> Result<String, EngineError> {
        for _ in 0..5 {
            let code = codes::coupon_code(prefix);
            if self.store.find_coupon_by_code(&code).await?.is_none() {
                return Ok(code);
            }
        }
        Err(EngineError::Storage(StorageError::Unavailable(
            "could not generate a unique coupon code".to_string(),
        )))
    }
}
