//! Business document.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::tier::Tier;

/// A business that owns campaigns and configures commission splits.
///
/// `tier_split_overrides` takes precedence over any campaign-level flat
/// split when resolving the effective percentage for a redemption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Business {
    pub id: Uuid,
    pub name: String,
    /// Per-tier revenue-share overrides, percent in [0, 100].
    #[serde(default)]
    pub tier_split_overrides: BTreeMap<Tier, u8>,
    pub created_at: DateTime<Utc>,
}

impl Business {
    pub fn new(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            tier_split_overrides: BTreeMap::new(),
            created_at: now,
        }
    }
}
