//! Commission split resolution.
//!
//! Pure functions; the resolved percentage is frozen into each redemption
//! at ingestion time and never recomputed.

use crate::domain::{Business, Campaign, Tier};

/// Resolve the effective revenue-share percentage for an affiliate
/// redemption. First match wins:
///
/// 1. business per-tier override for the influencer's tier
/// 2. campaign flat split percentage
/// 3. platform default
///
/// Content-meal coupons never pass through here; they always earn 0.
pub fn resolve_split(
    business: Option<&Business>,
    campaign: &Campaign,
    tier: Tier,
    platform_default_pct: u8,
) -> u8 {
    if let Some(pct) = business.and_then(|b| b.tier_split_overrides.get(&tier).copied()) {
        return pct.min(100);
    }
    if let Some(pct) = campaign.split_pct {
        return pct.min(100);
    }
    platform_default_pct.min(100)
}

/// Influencer earnings for an order, integer half-up rounding on minor
/// units. Never floating point.
pub fn commission(order_amount: i64, split_pct: u8) -> i64 {
    (order_amount * split_pct as i64 + 50) / 100
}
