//! Influencer document with per-platform metrics and tier history.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::tier::{resolve_tier, Tier};
use crate::error::EngineError;

/// Follower and engagement figures for one connected platform.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlatformMetrics {
    pub followers: i64,
    /// Engagement rate in percent, when the platform reports one.
    pub engagement_rate: Option<f32>,
}

/// One tier transition, recorded whenever metrics move an influencer
/// between bands. Never rewritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierChange {
    pub from: Tier,
    pub to: Tier,
    pub changed_at: DateTime<Utc>,
}

/// An influencer account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Influencer {
    pub id: Uuid,
    pub name: String,
    pub tier: Tier,
    pub verified: bool,
    /// Metrics keyed by platform name (e.g. "instagram").
    #[serde(default)]
    pub platforms: BTreeMap<String, PlatformMetrics>,
    /// Append-only log of tier transitions.
    #[serde(default)]
    pub tier_history: Vec<TierChange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Influencer {
    pub fn new(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            tier: Tier::Nano,
            verified: false,
            platforms: BTreeMap::new(),
            tier_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Aggregated follower count across all connected platforms.
    pub fn follower_count(&self) -> i64 {
        self.platforms.values().map(|m| m.followers).sum()
    }

    /// Follower-weighted mean engagement rate, when any platform reports one.
    pub fn engagement_rate(&self) -> Option<f32> {
        let mut weighted = 0.0f64;
        let mut weight = 0i64;
        for metrics in self.platforms.values() {
            if let Some(rate) = metrics.engagement_rate {
                weighted += rate as f64 * metrics.followers as f64;
                weight += metrics.followers;
            }
        }
        if weight > 0 {
            Some((weighted / weight as f64) as f32)
        } else {
            None
        }
    }

    /// Update one platform's metrics and recompute the tier.
    ///
    /// A tier move appends a [`TierChange`] to the history; the history is
    /// never overwritten in place.
    ///
    /// # Errors
    ///
    /// [`EngineError::Validation`] for negative follower counts.
    pub fn apply_metrics(
        &mut self,
        platform: impl Into<String>,
        metrics: PlatformMetrics,
        promotion_proximity: f64,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        if metrics.followers < 0 {
            return Err(EngineError::Validation {
                message: format!(
                    "follower count must be non-negative, got {}",
                    metrics.followers
                ),
            });
        }
        self.platforms.insert(platform.into(), metrics);

        let tier = resolve_tier(
            self.follower_count(),
            self.verified,
            self.engagement_rate(),
            promotion_proximity,
        )?;
        if tier != self.tier {
            self.tier_history.push(TierChange {
                from: self.tier,
                to: tier,
                changed_at: now,
            });
            self.tier = tier;
        }
        self.updated_at = now;
        Ok(())
    }
}
