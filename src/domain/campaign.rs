//! Campaign document and the join-event audit log.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::tier::Tier;

/// Campaign lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Scheduled,
    Active,
    Paused,
    Expired,
    Deleted,
}

/// A discount campaign published by a business.
///
/// `current_influencers`, `redemption_count` and `revenue` are aggregate
/// counters maintained by admission and redemption commits; the ledger
/// remains the source of truth for money.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub business_id: Uuid,
    pub title: String,
    /// Tiers admitted to this campaign. Empty means no tier restriction.
    #[serde(default)]
    pub eligible_tiers: BTreeSet<Tier>,
    /// Flat revenue-share percent. Business per-tier overrides win over this.
    pub split_pct: Option<u8>,
    pub max_influencers: u32,
    pub current_influencers: u32,
    pub max_redemptions: Option<u32>,
    pub redemption_count: u32,
    /// Gross order value redeemed against this campaign, minor units.
    pub revenue: i64,
    pub min_followers: Option<i64>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub status: CampaignStatus,
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    /// Whether the campaign is admitting and redeeming at `now`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == CampaignStatus::Active && !self.has_ended_at(now)
    }

    /// Whether the campaign's end time, if any, has passed.
    pub fn has_ended_at(&self, now: DateTime<Utc>) -> bool {
        self.ends_at.is_some_and(|end| end <= now)
    }

    /// Whether another influencer can still be admitted.
    pub fn has_capacity(&self) -> bool {
        self.current_influencers < self.max_influencers
    }

    /// Whether the redemption cap, if any, has been reached.
    pub fn redemption_limit_reached(&self) -> bool {
        self.max_redemptions
            .is_some_and(|max| self.redemption_count >= max)
    }

    /// Whether `tier` is admitted. An empty set admits every tier.
    pub fn admits_tier(&self, tier: Tier) -> bool {
        self.eligible_tiers.is_empty() || self.eligible_tiers.contains(&tier)
    }
}

/// Append-only record of a campaign admission.
///
/// The platform-wide cooldown throttle is a windowed query over this log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinEvent {
    pub id: Uuid,
    pub influencer_id: Uuid,
    pub campaign_id: Uuid,
    pub business_id: Uuid,
    pub joined_at: DateTime<Utc>,
}

impl JoinEvent {
    pub fn new(
        influencer_id: Uuid,
        campaign_id: Uuid,
        business_id: Uuid,
        joined_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            influencer_id,
            campaign_id,
            business_id,
            joined_at,
        }
    }
}
