//! Influencer tier bands and the tier resolver.
//!
//! Tiers are ordered follower-reach buckets. Resolution picks the highest
//! band whose minimum threshold is met, then optionally promotes one band
//! for verified or high-engagement accounts close to the next threshold.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Engagement rate (percent) above which an account qualifies for promotion.
pub const ENGAGEMENT_PROMOTION_THRESHOLD: f32 = 5.0;

/// Discrete influencer classification bucket by follower reach.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Nano,
    Micro,
    Mid,
    Macro,
    Celebrity,
}

impl Tier {
    /// Minimum aggregated follower count for this band.
    pub fn min_followers(self) -> i64 {
        match self {
            Tier::Nano => 0,
            Tier::Micro => 10_000,
            Tier::Mid => 50_000,
            Tier::Macro => 250_000,
            Tier::Celebrity => 1_000_000,
        }
    }

    /// The next band up, if any.
    pub fn next(self) -> Option<Tier> {
        match self {
            Tier::Nano => Some(Tier::Micro),
            Tier::Micro => Some(Tier::Mid),
            Tier::Mid => Some(Tier::Macro),
            Tier::Macro => Some(Tier::Celebrity),
            Tier::Celebrity => None,
        }
    }

    /// All bands, lowest first.
    pub fn all() -> [Tier; 5] {
        [Tier::Nano, Tier::Micro, Tier::Mid, Tier::Macro, Tier::Celebrity]
    }

    /// Stable label used in logs and serialized documents.
    pub fn label(self) -> &'static str {
        match self {
            Tier::Nano => "nano",
            Tier::Micro => "micro",
            Tier::Mid => "mid",
            Tier::Macro => "macro",
            Tier::Celebrity => "celebrity",
        }
    }
}

/// Resolve the tier for an aggregated follower count.
///
/// Base band is the highest whose threshold is met. A single-band promotion
/// applies when the account is verified or its engagement rate exceeds
/// [`ENGAGEMENT_PROMOTION_THRESHOLD`], and the follower count is within
/// `promotion_proximity` (a fraction, e.g. 0.8) of the next band's
/// threshold. Promotion never skips a band and never applies twice.
///
/// # Errors
///
/// [`EngineError::Validation`] for negative follower counts.
pub fn resolve_tier(
    followers: i64,
    verified: bool,
    engagement_rate: Option<f32>,
    promotion_proximity: f64,
) -> Result<Tier, EngineError> {
    if followers < 0 {
        return Err(EngineError::Validation {
            message: format!("follower count must be non-negative, got {followers}"),
        });
    }

    let mut tier = Tier::Nano;
    for band in Tier::all() {
        if followers >= band.min_followers() {
            tier = band;
        }
    }

    let qualifies = verified
        || engagement_rate.is_some_and(|rate| rate > ENGAGEMENT_PROMOTION_THRESHOLD);
    if qualifies {
        if let Some(next) = tier.next() {
            let cutoff = promotion_proximity * next.min_followers() as f64;
            if followers as f64 >= cutoff {
                tier = next;
            }
        }
    }

    Ok(tier)
}
