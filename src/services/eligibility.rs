//! Eligibility & cooldown evaluation.
//!
//! All checks run independently so callers always receive the full reason
//! list, never just the first failure. The cooldown throttle is a
//! windowed query over the append-only join-event log.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::CooldownConfig;
use crate::domain::{Campaign, Influencer, JoinEvent};
use crate::error::EngineError;
use crate::storage::DocumentStore;

/// Why a join was rejected. Ordered, distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IneligibleReason {
    TierNotEligible,
    CampaignNotActive,
    CampaignEnded,
    AlreadyJoined,
    CampaignFull,
    Cooldown,
    InsufficientFollowers,
}

impl IneligibleReason {
    /// Stable machine-readable code.
    pub fn code(self) -> &'static str {
        match self {
            IneligibleReason::TierNotEligible => "tier_not_eligible",
            IneligibleReason::CampaignNotActive => "campaign_not_active",
            IneligibleReason::CampaignEnded => "campaign_ended",
            IneligibleReason::AlreadyJoined => "already_joined",
            IneligibleReason::CampaignFull => "campaign_full",
            IneligibleReason::Cooldown => "cooldown",
            IneligibleReason::InsufficientFollowers => "insufficient_followers",
        }
    }
}

/// Evaluation outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Eligibility {
    pub eligible: bool,
    pub reasons: Vec<IneligibleReason>,
    /// When a cooldown blocks the join: the earliest time it stops
    /// blocking, `oldest blocking join + window`.
    pub next_eligible_at: Option<DateTime<Utc>>,
}

impl Eligibility {
    fn admitted() -> Self {
        Self {
            eligible: true,
            reasons: Vec::new(),
            next_eligible_at: None,
        }
    }
}

/// Decides whether an influencer may join a campaign.
pub struct EligibilityEvaluator {
    store: Arc<dyn DocumentStore>,
    config: CooldownConfig,
}

impl EligibilityEvaluator {
    pub fn new(store: Arc<dyn DocumentStore>, config: CooldownConfig) -> Self {
        Self { store, config }
    }

    /// Evaluate all admission checks for (influencer, campaign) at `now`.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] for an unknown influencer or campaign;
    /// storage errors pass through.
    pub async fn evaluate(
        &self,
        influencer_id: Uuid,
        campaign_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Eligibility, EngineError> {
        let influencer = self
            .store
            .get_influencer(influencer_id)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                entity: "influencer",
                id: influencer_id.to_string(),
            })?;
        let campaign = self
            .store
            .get_campaign(campaign_id)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                entity: "campaign",
                id: campaign_id.to_string(),
            })?;

        let mut reasons = Vec::new();
        let mut next_eligible_at = None;

        if !campaign.admits_tier(influencer.tier) {
            reasons.push(IneligibleReason::TierNotEligible);
        }

        if campaign.status != crate::domain::CampaignStatus::Active {
            reasons.push(IneligibleReason::CampaignNotActive);
        }
        if campaign.has_ended_at(now) {
            reasons.push(IneligibleReason::CampaignEnded);
        }

        if self.already_joined(&influencer, &campaign).await? {
            reasons.push(IneligibleReason::AlreadyJoined);
        }

        if !campaign.has_capacity() {
            reasons.push(IneligibleReason::CampaignFull);
        }

        // The re-engagement rule can look further back than the platform
        // window; fetch once from the older cutoff and re-filter.
        let window = self.config.window();
        let mut cutoff = now - window;
        if let Some(days) = self.config.business_reengagement_days {
            cutoff = cutoff.min(now - Duration::days(days as i64));
        }
        let recent = self.store.join_events_since(influencer_id, cutoff).await?;
        let windowed: Vec<JoinEvent> = recent
            .iter()
            .filter(|e| e.joined_at >= now - window)
            .cloned()
            .collect();
        if let Some(blocked_until) = self.cooldown_blocked_until(&windowed, window) {
            reasons.push(IneligibleReason::Cooldown);
            next_eligible_at = Some(blocked_until);
        }
        if self.reengagement_blocked(&recent, campaign.business_id, now)
            && !reasons.contains(&IneligibleReason::Cooldown)
        {
            reasons.push(IneligibleReason::Cooldown);
        }

        if let Some(min) = campaign.min_followers {
            if influencer.follower_count() < min {
                reasons.push(IneligibleReason::InsufficientFollowers);
            }
        }

        if reasons.is_empty() {
            Ok(Eligibility::admitted())
        } else {
            debug!(
                influencer = %influencer_id,
                campaign = %campaign_id,
                reasons = ?reasons,
                "join rejected"
            );
            Ok(Eligibility {
                eligible: false,
                reasons,
                next_eligible_at,
            })
        }
    }

    async fn already_joined(
        &self,
        influencer: &Influencer,
        campaign: &Campaign,
    ) -> Result<bool, EngineError> {
        let coupons = self
            .store
            .coupons_for_pair(influencer.id, campaign.id)
            .await?;
        Ok(coupons.iter().any(|c| c.blocks_rejoin()))
    }

    /// The platform-wide throttle: at most `max_joins` joins, any
    /// campaign, inside the rolling window. Returns the time the count
    /// drops back under the ceiling.
    fn cooldown_blocked_until(
        &self,
        recent: &[JoinEvent],
        window: Duration,
    ) -> Option<DateTime<Utc>> {
        let max = self.config.max_joins as usize;
        if max == 0 || recent.len() < max {
            return None;
        }
        // `recent` is oldest-first. The join whose expiry brings the
        // windowed count back under the ceiling is the (n - max + 1)th
        // oldest.
        let blocking = &recent[recent.len() - max];
        Some(blocking.joined_at + window)
    }

    /// Optional per-business re-engagement cooldown: when configured, a
    /// second join at the same business within the configured number of
    /// days is blocked.
    fn reengagement_blocked(
        &self,
        recent: &[JoinEvent],
        business_id: Uuid,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(days) = self.config.business_reengagement_days else {
            return false;
        };
        let cutoff = now - Duration::days(days as i64);
        recent
            .iter()
            .any(|e| e.business_id == business_id && e.joined_at >= cutoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Business, CampaignStatus, Coupon, CouponKind, CouponStatus, PlatformMetrics, Tier,
    };
    use crate::storage::{MemoryStore, Precondition, WriteBatch, WriteOp};
    use std::collections::BTreeSet;

    struct Fixture {
        store: Arc<MemoryStore>,
        evaluator: EligibilityEvaluator,
        influencer_id: Uuid,
        campaign_id: Uuid,
        business_id: Uuid,
    }

    async fn fixture(config: CooldownConfig) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();

        let business = Business::new("biz", now);
        let business_id = business.id;
        store.put_business(business).await.unwrap();

        let mut influencer = Influencer::new("ada", now);
        influencer
            .apply_metrics(
                "instagram",
                PlatformMetrics {
                    followers: 60_000,
                    engagement_rate: None,
                },
                0.8,
                now,
            )
            .unwrap();
        let influencer_id = influencer.id;
        store.put_influencer(influencer).await.unwrap();

        let campaign = Campaign {
            id: Uuid::new_v4(),
            business_id,
            title: "spring menu".into(),
            eligible_tiers: BTreeSet::from([Tier::Micro, Tier::Mid, Tier::Macro]),
            split_pct: Some(20),
            max_influencers: 5,
            current_influencers: 0,
            max_redemptions: None,
            redemption_count: 0,
            revenue: 0,
            min_followers: None,
            starts_at: now - Duration::days(1),
            ends_at: Some(now + Duration::days(30)),
            status: CampaignStatus::Active,
            created_at: now,
        };
        let campaign_id = campaign.id;
        store.put_campaign(campaign).await.unwrap();

        let evaluator = EligibilityEvaluator::new(store.clone(), config);
        Fixture {
            store,
            evaluator,
            influencer_id,
            campaign_id,
            business_id,
        }
    }

    async fn record_join(f: &Fixture, campaign_id: Uuid, at: DateTime<Utc>) {
        f.store
            .commit(WriteBatch::new().write(WriteOp::PutJoinEvent(JoinEvent::new(
                f.influencer_id,
                campaign_id,
                f.business_id,
                at,
            ))))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_admitted_when_all_checks_pass() {
        let f = fixture(CooldownConfig::default()).await;
        let result = f
            .evaluator
            .evaluate(f.influencer_id, f.campaign_id, Utc::now())
            .await
            .unwrap();
        assert!(result.eligible);
        assert!(result.reasons.is_empty());
    }

    #[tokio::test]
    async fn test_collects_all_reasons() {
        let f = fixture(CooldownConfig::default()).await;
        let now = Utc::now();

        // Make the campaign paused, ended, full, and tier-restricted.
        let mut campaign = f.store.get_campaign(f.campaign_id).await.unwrap().unwrap();
        campaign.status = CampaignStatus::Paused;
        campaign.ends_at = Some(now - Duration::hours(1));
        campaign.current_influencers = campaign.max_influencers;
        campaign.eligible_tiers = BTreeSet::from([Tier::Celebrity]);
        campaign.min_followers = Some(1_000_000);
        f.store.put_campaign(campaign).await.unwrap();

        let result = f
            .evaluator
            .evaluate(f.influencer_id, f.campaign_id, now)
            .await
            .unwrap();
        assert!(!result.eligible);
        assert_eq!(
            result.reasons,
            vec![
                IneligibleReason::TierNotEligible,
                IneligibleReason::CampaignNotActive,
                IneligibleReason::CampaignEnded,
                IneligibleReason::CampaignFull,
                IneligibleReason::InsufficientFollowers,
            ]
        );
    }

    #[tokio::test]
    async fn test_existing_affiliate_coupon_blocks_rejoin() {
        let f = fixture(CooldownConfig::default()).await;
        let now = Utc::now();
        let coupon = Coupon {
            id: Uuid::new_v4(),
            campaign_id: f.campaign_id,
            influencer_id: f.influencer_id,
            business_id: f.business_id,
            code: "AFF-EXISTING".into(),
            status: CouponStatus::Issued,
            issued_at: now,
            expires_at: now + Duration::days(30),
            kind: CouponKind::Affiliate {
                link_id: Uuid::new_v4(),
            },
        };
        f.store
            .commit(
                WriteBatch::new()
                    .guard(Precondition::NoActiveAffiliateCoupon {
                        influencer_id: f.influencer_id,
                        campaign_id: f.campaign_id,
                    })
                    .write(WriteOp::PutCoupon(coupon)),
            )
            .await
            .unwrap();

        let result = f
            .evaluator
            .evaluate(f.influencer_id, f.campaign_id, now)
            .await
            .unwrap();
        assert!(!result.eligible);
        assert!(result.reasons.contains(&IneligibleReason::AlreadyJoined));
    }

    #[tokio::test]
    async fn test_cooldown_three_joins_in_window() {
        let f = fixture(CooldownConfig::default()).await;
        let now = Utc::now();

        for hours_ago in [20, 10, 2] {
            record_join(&f, Uuid::new_v4(), now - Duration::hours(hours_ago)).await;
        }

        let result = f
            .evaluator
            .evaluate(f.influencer_id, f.campaign_id, now)
            .await
            .unwrap();
        assert!(!result.eligible);
        assert_eq!(result.reasons, vec![IneligibleReason::Cooldown]);
        // Oldest blocking join was 20h ago; window is 24h.
        let expected = now - Duration::hours(20) + Duration::hours(24);
        assert_eq!(result.next_eligible_at, Some(expected));
    }

    #[tokio::test]
    async fn test_admitted_once_oldest_join_leaves_window() {
        let f = fixture(CooldownConfig::default()).await;
        let now = Utc::now();

        // Three joins, the oldest just outside the 24h window.
        for hours_ago in [25, 10, 2] {
            record_join(&f, Uuid::new_v4(), now - Duration::hours(hours_ago)).await;
        }

        let result = f
            .evaluator
            .evaluate(f.influencer_id, f.campaign_id, now)
            .await
            .unwrap();
        assert!(result.eligible);
    }

    #[tokio::test]
    async fn test_reengagement_looks_past_the_platform_window() {
        // Default 24h platform window; the 14-day re-engagement rule must
        // still see a same-business join from 3 days ago.
        let f = fixture(CooldownConfig {
            window_hours: 24,
            max_joins: 3,
            business_reengagement_days: Some(14),
        })
        .await;
        let now = Utc::now();

        record_join(&f, Uuid::new_v4(), now - Duration::days(3)).await;

        let result = f
            .evaluator
            .evaluate(f.influencer_id, f.campaign_id, now)
            .await
            .unwrap();
        assert!(!result.eligible);
        assert_eq!(result.reasons, vec![IneligibleReason::Cooldown]);
    }

    #[tokio::test]
    async fn test_old_joins_do_not_count_toward_platform_window() {
        // A wide fetch for the re-engagement rule must not feed joins
        // older than the platform window into the join-count throttle.
        let f = fixture(CooldownConfig {
            window_hours: 24,
            max_joins: 3,
            business_reengagement_days: Some(14),
        })
        .await;
        let now = Utc::now();

        // Three joins at other businesses, all outside the 24h window.
        let elsewhere = Uuid::new_v4();
        for days_ago in [3, 4, 5] {
            f.store
                .commit(WriteBatch::new().write(WriteOp::PutJoinEvent(JoinEvent::new(
                    f.influencer_id,
                    Uuid::new_v4(),
                    elsewhere,
                    now - Duration::days(days_ago),
                ))))
                .await
                .unwrap();
        }

        let result = f
            .evaluator
            .evaluate(f.influencer_id, f.campaign_id, now)
            .await
            .unwrap();
        assert!(result.eligible);
    }

    #[tokio::test]
    async fn test_reengagement_cooldown_same_business() {
        let f = fixture(CooldownConfig {
            window_hours: 24 * 30,
            max_joins: 100,
            business_reengagement_days: Some(14),
        })
        .await;
        let now = Utc::now();

        // Joined another campaign at the same business 3 days ago.
        record_join(&f, Uuid::new_v4(), now - Duration::days(3)).await;

        let result = f
            .evaluator
            .evaluate(f.influencer_id, f.campaign_id, now)
            .await
            .unwrap();
        assert!(!result.eligible);
        assert_eq!(result.reasons, vec![IneligibleReason::Cooldown]);
    }
}
