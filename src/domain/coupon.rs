//! Coupon documents.
//!
//! A coupon's kind is a tagged variant fixed at creation: affiliate
//! coupons earn commission per redemption and carry a link reference;
//! content-meal coupons are single-use, short-lived, and earn nothing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Coupon lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponStatus {
    Issued,
    Active,
    Used,
    Expired,
    Revoked,
}

/// Type-specific coupon payload. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CouponKind {
    Affiliate {
        /// The affiliate link created in the same commit as this coupon.
        link_id: Uuid,
    },
    ContentMeal {
        /// Maximum order value reimbursed, minor units.
        spending_cap: Option<i64>,
        /// Deadline for submitting the promised content; equals expiry.
        content_deadline: DateTime<Utc>,
    },
}

/// A coupon issued to an influencer for a campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coupon {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub influencer_id: Uuid,
    pub business_id: Uuid,
    /// Unique generated human-readable code.
    pub code: String,
    pub status: CouponStatus,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: CouponKind,
}

impl Coupon {
    pub fn is_affiliate(&self) -> bool {
        matches!(self.kind, CouponKind::Affiliate { .. })
    }

    /// Whether this coupon blocks a re-join of its (influencer, campaign)
    /// pair: any non-revoked affiliate coupon does.
    pub fn blocks_rejoin(&self) -> bool {
        self.is_affiliate() && self.status != CouponStatus::Revoked
    }

    /// Whether a redemption at `at` may be recorded against this coupon.
    ///
    /// Affiliate coupons keep earning after their first use; content-meal
    /// coupons are single-use.
    pub fn is_redeemable_at(&self, at: DateTime<Utc>) -> bool {
        if at > self.expires_at {
            return false;
        }
        match self.status {
            CouponStatus::Issued | CouponStatus::Active => true,
            CouponStatus::Used => self.is_affiliate(),
            CouponStatus::Expired | CouponStatus::Revoked => false,
        }
    }

    /// Stable label for logs: "AFFILIATE" or "CONTENT_MEAL".
    pub fn kind_label(&self) -> &'static str {
        match self.kind {
            CouponKind::Affiliate { .. } => "AFFILIATE",
            CouponKind::ContentMeal { .. } => "CONTENT_MEAL",
        }
    }
}
