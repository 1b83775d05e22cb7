//! Affiliate link document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Active,
    Disabled,
}

/// Tracking link bound to an affiliate coupon, created in the same
/// commit. Click and conversion counters are monotonic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffiliateLink {
    pub id: Uuid,
    /// Public short token embedded in shared URLs.
    pub token: String,
    pub coupon_id: Uuid,
    pub influencer_id: Uuid,
    pub business_id: Uuid,
    pub campaign_id: Uuid,
    pub clicks: u64,
    pub conversions: u64,
    pub status: LinkStatus,
    pub created_at: DateTime<Utc>,
}

impl AffiliateLink {
    pub fn new(
        token: impl Into<String>,
        coupon_id: Uuid,
        influencer_id: Uuid,
        business_id: Uuid,
        campaign_id: Uuid,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            token: token.into(),
            coupon_id,
            influencer_id,
            business_id,
            campaign_id,
            clicks: 0,
            conversions: 0,
            status: LinkStatus::Active,
            created_at: now,
        }
    }
}
