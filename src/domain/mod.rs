//! Domain documents persisted in the store.
//!
//! Every type here is a JSON-serializable document. Monetary amounts are
//! integer minor-currency units throughout; percentages are whole numbers
//! in [0, 100].

pub mod business;
pub mod campaign;
pub mod coupon;
pub mod influencer;
pub mod ledger;
pub mod link;
pub mod payout;
pub mod redemption;
pub mod tier;

pub use business::Business;
pub use campaign::{Campaign, CampaignStatus, JoinEvent};
pub use coupon::{Coupon, CouponKind, CouponStatus};
pub use influencer::{Influencer, PlatformMetrics, TierChange};
pub use ledger::{Balance, EntryReference, EntryType, LedgerEntry, LedgerFilter};
pub use link::{AffiliateLink, LinkStatus};
pub use payout::{PayoutMethod, PayoutRequest, PayoutStatus};
pub use redemption::{Redemption, RedemptionEvent, RedemptionKey, RedemptionSource};
pub use tier::Tier;
