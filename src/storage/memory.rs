//! In-memory document store.
//!
//! Backs tests and embedded use. A single `RwLock` over the collections
//! makes `commit` genuinely atomic: preconditions are evaluated and ops
//! applied under one write guard, so concurrent readers never observe a
//! partial batch. Failure toggles mirror the store-outage behaviors the
//! engine must survive.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    AffiliateLink, Business, Campaign, Coupon, Influencer, JoinEvent, LedgerEntry, LedgerFilter,
    PayoutRequest, Redemption, RedemptionKey,
};

use super::{DocumentStore, Precondition, Result, StorageError, WriteBatch, WriteOp};

#[derive(Default, Clone)]
struct Inner {
    businesses: HashMap<Uuid, Business>,
    influencers: HashMap<Uuid, Influencer>,
    campaigns: HashMap<Uuid, Campaign>,
    coupons: HashMap<Uuid, Coupon>,
    /// code -> coupon id
    code_index: HashMap<String, Uuid>,
    links: HashMap<Uuid, AffiliateLink>,
    redemptions: HashMap<Uuid, Redemption>,
    /// uniqueness triple -> redemption id
    redemption_keys: HashMap<RedemptionKey, Uuid>,
    ledger: Vec<LedgerEntry>,
    join_events: Vec<JoinEvent>,
    payout_requests: HashMap<Uuid, PayoutRequest>,
}

/// In-memory store with failure injection for tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    unavailable: RwLock<bool>,
    fail_next_commits: RwLock<u32>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with `Unavailable` until cleared.
    pub async fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write().await = unavailable;
    }

    /// Fail the next `n` commits with `Unavailable`, then recover.
    pub async fn fail_next_commits(&self, n: u32) {
        *self.fail_next_commits.write().await = n;
    }

    async fn check_available(&self) -> Result<()> {
        if *self.unavailable.read().await {
            return Err(StorageError::Unavailable("store offline".to_string()));
        }
        Ok(())
    }

    fn check_precondition(inner: &Inner, condition: &Precondition) -> Result<()> {
        let holds = match condition {
            Precondition::NoActiveAffiliateCoupon {
                influencer_id,
                campaign_id,
            } => !inner.coupons.values().any(|c| {
                c.influencer_id == *influencer_id
                    && c.campaign_id == *campaign_id
                    && c.blocks_rejoin()
            }),
            Precondition::RedemptionKeyAbsent(key) => !inner.redemption_keys.contains_key(key),
            Precondition::CampaignHasCapacity { campaign_id } => inner
                .campaigns
                .get(campaign_id)
                .is_some_and(Campaign::has_capacity),
            Precondition::CampaignBelowRedemptionCap { campaign_id } => inner
                .campaigns
                .get(campaign_id)
                .is_some_and(|c| !c.redemption_limit_reached()),
            Precondition::PayoutStatusIs { request_id, status } => inner
                .payout_requests
                .get(request_id)
                .is_some_and(|r| r.status == *status),
        };
        if holds {
            Ok(())
        } else {
            Err(StorageError::PreconditionFailed {
                condition: condition.clone(),
            })
        }
    }

    fn apply(inner: &mut Inner, op: WriteOp) -> Result<()> {
        match op {
            WriteOp::PutCoupon(coupon) => {
                inner.code_index.insert(coupon.code.clone(), coupon.id);
                inner.coupons.insert(coupon.id, coupon);
            }
            WriteOp::PutLink(link) => {
                inner.links.insert(link.id, link);
            }
            WriteOp::PutRedemption(redemption) => {
                inner
                    .redemption_keys
                    .insert(redemption.key(), redemption.id);
                inner.redemptions.insert(redemption.id, redemption);
            }
            WriteOp::AppendLedger(entry) => {
                inner.ledger.push(entry);
            }
            WriteOp::PutJoinEvent(event) => {
                inner.join_events.push(event);
            }
            WriteOp::PutPayoutRequest(request) => {
                inner.payout_requests.insert(request.id, request);
            }
            WriteOp::SetCouponStatus { coupon_id, status } => {
                let coupon = inner.coupons.get_mut(&coupon_id).ok_or_else(|| {
                    StorageError::NotFound {
                        entity: "coupon",
                        id: coupon_id.to_string(),
                    }
                })?;
                coupon.status = status;
            }
            WriteOp::SetPayoutStatus {
                request_id,
                status,
                updated_at,
            } => {
                let request = inner.payout_requests.get_mut(&request_id).ok_or_else(|| {
                    StorageError::NotFound {
                        entity: "payout_request",
                        id: request_id.to_string(),
                    }
                })?;
                request.status = status;
                request.updated_at = updated_at;
            }
            WriteOp::BumpLinkClicks { link_id } => {
                let link =
                    inner
                        .links
                        .get_mut(&link_id)
                        .ok_or_else(|| StorageError::NotFound {
                            entity: "affiliate_link",
                            id: link_id.to_string(),
                        })?;
                link.clicks += 1;
            }
            WriteOp::BumpLinkConversions { link_id } => {
                let link =
                    inner
                        .links
                        .get_mut(&link_id)
                        .ok_or_else(|| StorageError::NotFound {
                            entity: "affiliate_link",
                            id: link_id.to_string(),
                        })?;
                link.conversions += 1;
            }
            WriteOp::BumpCampaignJoin { campaign_id } => {
                let campaign = inner.campaigns.get_mut(&campaign_id).ok_or_else(|| {
                    StorageError::NotFound {
                        entity: "campaign",
                        id: campaign_id.to_string(),
                    }
                })?;
                campaign.current_influencers += 1;
            }
            WriteOp::BumpCampaignRedemption {
                campaign_id,
                revenue,
            } => {
                let campaign = inner.campaigns.get_mut(&campaign_id).ok_or_else(|| {
                    StorageError::NotFound {
                        entity: "campaign",
                        id: campaign_id.to_string(),
                    }
                })?;
                campaign.redemption_count += 1;
                campaign.revenue += revenue;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_business(&self, id: Uuid) -> Result<Option<Business>> {
        self.check_available().await?;
        Ok(self.inner.read().await.businesses.get(&id).cloned())
    }

    async fn put_business(&self, business: Business) -> Result<()> {
        self.check_available().await?;
        self.inner
            .write()
            .await
            .businesses
            .insert(business.id, business);
        Ok(())
    }

    async fn get_influencer(&self, id: Uuid) -> Result<Option<Influencer>> {
        self.check_available().await?;
        Ok(self.inner.read().await.influencers.get(&id).cloned())
    }

    async fn put_influencer(&self, influencer: Influencer) -> Result<()> {
        self.check_available().await?;
        self.inner
            .write()
            .await
            .influencers
            .insert(influencer.id, influencer);
        Ok(())
    }

    async fn get_campaign(&self, id: Uuid) -> Result<Option<Campaign>> {
        self.check_available().await?;
        Ok(self.inner.read().await.campaigns.get(&id).cloned())
    }

    async fn put_campaign(&self, campaign: Campaign) -> Result<()> {
        self.check_available().await?;
        self.inner
            .write()
            .await
            .campaigns
            .insert(campaign.id, campaign);
        Ok(())
    }

    async fn get_coupon(&self, id: Uuid) -> Result<Option<Coupon>> {
        self.check_available().await?;
        Ok(self.inner.read().await.coupons.get(&id).cloned())
    }

    async fn find_coupon_by_code(&self, code: &str) -> Result<Option<Coupon>> {
        self.check_available().await?;
        let inner = self.inner.read().await;
        Ok(inner
            .code_index
            .get(code)
            .and_then(|id| inner.coupons.get(id))
            .cloned())
    }

    async fn coupons_for_pair(
        &self,
        influencer_id: Uuid,
        campaign_id: Uuid,
    ) -> Result<Vec<Coupon>> {
        self.check_available().await?;
        Ok(self
            .inner
            .read()
            .await
            .coupons
            .values()
            .filter(|c| c.influencer_id == influencer_id && c.campaign_id == campaign_id)
            .cloned()
            .collect())
    }

    async fn get_link(&self, id: Uuid) -> Result<Option<AffiliateLink>> {
        self.check_available().await?;
        Ok(self.inner.read().await.links.get(&id).cloned())
    }

    async fn find_redemption(&self, key: &RedemptionKey) -> Result<Option<Redemption>> {
        self.check_available().await?;
        let inner = self.inner.read().await;
        Ok(inner
            .redemption_keys
            .get(key)
            .and_then(|id| inner.redemptions.get(id))
            .cloned())
    }

    async fn ledger_entries(
        &self,
        influencer_id: Uuid,
        filter: &LedgerFilter,
    ) -> Result<Vec<LedgerEntry>> {
        self.check_available().await?;
        Ok(self
            .inner
            .read()
            .await
            .ledger
            .iter()
            .filter(|e| e.influencer_id == influencer_id && filter.matches(e))
            .cloned()
            .collect())
    }

    async fn join_events_since(
        &self,
        influencer_id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<JoinEvent>> {
        self.check_available().await?;
        let mut events: Vec<JoinEvent> = self
            .inner
            .read()
            .await
            .join_events
            .iter()
            .filter(|e| e.influencer_id == influencer_id && e.joined_at >= cutoff)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.joined_at);
        Ok(events)
    }

    async fn get_payout_request(&self, id: Uuid) -> Result<Option<PayoutRequest>> {
        self.check_available().await?;
        Ok(self.inner.read().await.payout_requests.get(&id).cloned())
    }

    async fn payout_requests(&self, influencer_id: Uuid) -> Result<Vec<PayoutRequest>> {
        self.check_available().await?;
        let mut requests: Vec<PayoutRequest> = self
            .inner
            .read()
            .await
            .payout_requests
            .values()
            .filter(|r| r.influencer_id == influencer_id)
            .cloned()
            .collect();
        requests.sort_by_key(|r| r.created_at);
        Ok(requests)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        self.check_available().await?;
        {
            let mut remaining = self.fail_next_commits.write().await;
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StorageError::Unavailable(
                    "injected commit failure".to_string(),
                ));
            }
        }

        let mut inner = self.inner.write().await;
        for condition in &batch.preconditions {
            Self::check_precondition(&inner, condition)?;
        }
        // Stage onto a copy; a failing op must not leave earlier ops behind.
        let mut staged = inner.clone();
        for op in batch.ops {
            Self::apply(&mut staged, op)?;
        }
        *inner = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CouponKind, CouponStatus};
    use chrono::Duration;

    fn coupon_for(influencer_id: Uuid, campaign_id: Uuid, code: &str) -> Coupon {
        let now = Utc::now();
        Coupon {
            id: Uuid::new_v4(),
            campaign_id,
            influencer_id,
            business_id: Uuid::new_v4(),
            code: code.to_string(),
            status: CouponStatus::Issued,
            issued_at: now,
            expires_at: now + Duration::days(30),
            kind: CouponKind::Affiliate {
                link_id: Uuid::new_v4(),
            },
        }
    }

    #[tokio::test]
    async fn test_commit_is_all_or_nothing_on_precondition_failure() {
        let store = MemoryStore::new();
        let influencer_id = Uuid::new_v4();
        let campaign_id = Uuid::new_v4();

        let first = coupon_for(influencer_id, campaign_id, "AFF-ONE");
        store
            .commit(
                WriteBatch::new()
                    .guard(Precondition::NoActiveAffiliateCoupon {
                        influencer_id,
                        campaign_id,
                    })
                    .write(WriteOp::PutCoupon(first)),
            )
            .await
            .unwrap();

        // Second batch carries two writes; neither may land.
        let second = coupon_for(influencer_id, campaign_id, "AFF-TWO");
        let link = AffiliateLink::new(
            "tok",
            second.id,
            influencer_id,
            second.business_id,
            campaign_id,
            Utc::now(),
        );
        let link_id = link.id;
        let err = store
            .commit(
                WriteBatch::new()
                    .guard(Precondition::NoActiveAffiliateCoupon {
                        influencer_id,
                        campaign_id,
                    })
                    .write(WriteOp::PutCoupon(second))
                    .write(WriteOp::PutLink(link)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::PreconditionFailed { .. }));

        assert!(store.find_coupon_by_code("AFF-TWO").await.unwrap().is_none());
        assert!(store.get_link(link_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failing_op_rolls_back_whole_batch() {
        let store = MemoryStore::new();
        let coupon = coupon_for(Uuid::new_v4(), Uuid::new_v4(), "AFF-STAGED");

        // First op would succeed; the second targets a missing coupon.
        let err = store
            .commit(
                WriteBatch::new()
                    .write(WriteOp::PutCoupon(coupon))
                    .write(WriteOp::SetCouponStatus {
                        coupon_id: Uuid::new_v4(),
                        status: CouponStatus::Revoked,
                    }),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));

        assert!(store
            .find_coupon_by_code("AFF-STAGED")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_unavailable_toggle() {
        let store = MemoryStore::new();
        store.set_unavailable(true).await;
        let err = store.get_coupon(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, StorageError::Unavailable(_)));

        store.set_unavailable(false).await;
        assert!(store.get_coupon(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fail_next_commits_then_recover() {
        let store = MemoryStore::new();
        store.fail_next_commits(1).await;

        let coupon = coupon_for(Uuid::new_v4(), Uuid::new_v4(), "AFF-X");
        let batch = WriteBatch::new().write(WriteOp::PutCoupon(coupon));
        assert!(store.commit(batch.clone()).await.is_err());
        assert!(store.commit(batch).await.is_ok());
        assert!(store.find_coupon_by_code("AFF-X").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_redemption_key_lookup() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let redemption = Redemption {
            id: Uuid::new_v4(),
            source: crate::domain::RedemptionSource::Pos,
            coupon_id: Uuid::new_v4(),
            coupon_code: "AFF-Y".to_string(),
            campaign_id: Uuid::new_v4(),
            influencer_id: Uuid::new_v4(),
            business_id: Uuid::new_v4(),
            order_amount: 5000,
            earnings: 1000,
            split_pct: 20,
            redeemed_at: now,
            created_at: now,
        };
        let key = redemption.key();
        store
            .commit(
                WriteBatch::new()
                    .guard(Precondition::RedemptionKeyAbsent(key.clone()))
                    .write(WriteOp::PutRedemption(redemption)),
            )
            .await
            .unwrap();

        assert!(store.find_redemption(&key).await.unwrap().is_some());

        // The same triple can never be committed twice.
        let err = store
            .commit(WriteBatch::new().guard(Precondition::RedemptionKeyAbsent(key)))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::PreconditionFailed { .. }));
    }
}
