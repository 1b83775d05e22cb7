//! Redemption documents and ingestion events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a redemption event originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedemptionSource {
    CsvImport,
    ManualAdmin,
    Pos,
    Online,
}

/// Uniqueness key for a redemption.
///
/// A second submission with an identical triple is a duplicate and must
/// not create a second ledger effect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RedemptionKey {
    pub code: String,
    pub redeemed_at: DateTime<Utc>,
    pub order_amount: i64,
}

/// A candidate redemption handed to the ingestion engine.
///
/// CSV parsing happens upstream; the engine receives already-parsed rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedemptionEvent {
    pub coupon_code: String,
    /// Order value in minor units; must be positive.
    pub order_amount: i64,
    pub redeemed_at: DateTime<Utc>,
    pub source: RedemptionSource,
}

impl RedemptionEvent {
    pub fn key(&self) -> RedemptionKey {
        RedemptionKey {
            code: self.coupon_code.clone(),
            redeemed_at: self.redeemed_at,
            order_amount: self.order_amount,
        }
    }
}

/// A recorded redemption. Immutable once created.
///
/// `split_pct` and `earnings` are frozen at ingestion time; later changes
/// to business or campaign configuration never alter them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Redemption {
    pub id: Uuid,
    pub source: RedemptionSource,
    pub coupon_id: Uuid,
    pub coupon_code: String,
    pub campaign_id: Uuid,
    pub influencer_id: Uuid,
    pub business_id: Uuid,
    pub order_amount: i64,
    /// Influencer commission in minor units, computed at ingestion.
    pub earnings: i64,
    /// Split percentage applied at ingestion time.
    pub split_pct: u8,
    pub redeemed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Redemption {
    pub fn key(&self) -> RedemptionKey {
        RedemptionKey {
            code: self.coupon_code.clone(),
            redeemed_at: self.redeemed_at,
            order_amount: self.order_amount,
        }
    }
}
