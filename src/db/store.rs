use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::db::models::{Account, PromoCode, Redemption, SavedContentItem, SubscriptionTier};
use crate::Result;

/// Account balance and grant state. Every mutation is atomic per account.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_account(&self, id: Uuid) -> Result<Option<Account>>;

    /// Inserts `account` unless a row with the same id exists, then returns
    /// the stored row.
    async fn insert_account_if_absent(&self, account: &Account) -> Result<Account>;

    /// Conditional decrement: fails with `InsufficientBalance` instead of
    /// going below zero. Returns the new balance.
    async fn debit(&self, id: Uuid, amount: i64) -> Result<i64>;

    async fn credit(&self, id: Uuid, amount: i64) -> Result<i64>;

    async fn set_subscription(
        &self,
        id: Uuid,
        tier: SubscriptionTier,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Account>;

    /// Credits `amount` and stamps `now` as the last claim, or fails with
    /// `NotEligible` if `interval` has not elapsed since the previous claim.
    async fn claim_daily(&self, id: Uuid, now: DateTime<Utc>, interval: Duration, amount: i64) -> Result<Account>;
}

/// The shared promo code registry.
#[async_trait]
pub trait PromoStore: Send + Sync {
    async fn insert_promo(&self, promo: &PromoCode) -> Result<PromoCode>;

    async fn find_active_promo(&self, code: &str) -> Result<Option<PromoCode>>;

    /// Validates the normalized `code` and, in one transaction, increments its
    /// usage and credits the account.
    async fn redeem(&self, account_id: Uuid, code: &str, now: DateTime<Utc>) -> Result<Redemption>;

    /// Deactivates exhausted or expired codes. Returns how many were touched.
    async fn deactivate_spent(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// Saved content, always scoped by owner.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn insert_item(&self, item: &SavedContentItem) -> Result<SavedContentItem>;

    /// Newest first.
    async fn list_items(&self, account_id: Uuid, platform: Option<&str>) -> Result<Vec<SavedContentItem>>;

    async fn find_item(&self, account_id: Uuid, item_id: Uuid) -> Result<Option<SavedContentItem>>;

    /// Returns false when nothing owned by `account_id` matched.
    async fn delete_item(&self, account_id: Uuid, item_id: Uuid) -> Result<bool>;
}

pub trait Storage: AccountStore + PromoStore + ContentStore {}

impl<T: AccountStore + PromoStore + ContentStore> Storage for T {}
