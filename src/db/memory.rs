use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::db::models::{Account, PromoCode, Redemption, SavedContentItem, SubscriptionTier};
use crate::db::store::{AccountStore, ContentStore, PromoStore};
use crate::error::{DatabaseError, LedgerError, PromoError};
use crate::Result;

type Slot<T> = Arc<Mutex<T>>;

/// In-process storage with the same guarantees as the Postgres backend.
///
/// Each account and each promo code sits behind its own mutex, so operations
/// on different accounts never contend. Redemption locks the promo code
/// before the account, and nothing locks in the other order.
///
/// Promo records are keyed by id and never removed. `active_codes` maps the
/// text of each active code to its record, so a retired code's text can be
/// issued again while the old record stays in the registry.
#[derive(Default)]
pub struct MemoryStore {
    accounts: RwLock<HashMap<Uuid, Slot<Account>>>,
    promos: RwLock<HashMap<Uuid, Slot<PromoCode>>>,
    active_codes: RwLock<HashMap<String, Uuid>>,
    items: RwLock<HashMap<Uuid, SavedContentItem>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn account_slot(&self, id: Uuid) -> Result<Slot<Account>> {
        self.accounts
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| DatabaseError::NotFound.into())
    }

    async fn active_promo_slot(&self, code: &str) -> Option<Slot<PromoCode>> {
        let id = self.active_codes.read().await.get(code).copied()?;
        self.promos.read().await.get(&id).cloned()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find_account(&self, id: Uuid) -> Result<Option<Account>> {
        let slot = self.accounts.read().await.get(&id).cloned();
        match slot {
            Some(slot) => Ok(Some(slot.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn insert_account_if_absent(&self, account: &Account) -> Result<Account> {
        let slot = {
            let mut accounts = self.accounts.write().await;
            accounts
                .entry(account.id)
                .or_insert_with(|| Arc::new(Mutex::new(account.clone())))
                .clone()
        };
        let stored = slot.lock().await.clone();
        Ok(stored)
    }

    async fn debit(&self, id: Uuid, amount: i64) -> Result<i64> {
        let slot = self.account_slot(id).await?;
        let mut account = slot.lock().await;
        if account.tokens < amount {
            return Err(LedgerError::InsufficientBalance.into());
        }
        account.tokens -= amount;
        account.updated_at = Utc::now();
        Ok(account.tokens)
    }

    async fn credit(&self, id: Uuid, amount: i64) -> Result<i64> {
        let slot = self.account_slot(id).await?;
        let mut account = slot.lock().await;
        account.tokens += amount;
        account.updated_at = Utc::now();
        Ok(account.tokens)
    }

    async fn set_subscription(
        &self,
        id: Uuid,
        tier: SubscriptionTier,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Account> {
        let slot = self.account_slot(id).await?;
        let mut account = slot.lock().await;
        account.subscription_tier = tier;
        account.subscription_expires_at = expires_at;
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    async fn claim_daily(&self, id: Uuid, now: DateTime<Utc>, interval: Duration, amount: i64) -> Result<Account> {
        let slot = self.account_slot(id).await?;
        let mut account = slot.lock().await;
        if !account.can_claim_daily(now, interval) {
            let next_claim_at = account.next_daily_claim_at(interval).unwrap_or(now);
            return Err(LedgerError::NotEligible { next_claim_at }.into());
        }
        account.tokens += amount;
        account.last_daily_claim_at = Some(now);
        account.updated_at = now;
        Ok(account.clone())
    }
}

#[async_trait]
impl PromoStore for MemoryStore {
    async fn insert_promo(&self, promo: &PromoCode) -> Result<PromoCode> {
        let mut active_codes = self.active_codes.write().await;
        if let Some(existing_id) = active_codes.get(&promo.code) {
            let existing = self.promos.read().await.get(existing_id).cloned();
            if let Some(existing) = existing {
                if existing.lock().await.active {
                    return Err(DatabaseError::Duplicate.into());
                }
            }
        }

        self.promos
            .write()
            .await
            .insert(promo.id, Arc::new(Mutex::new(promo.clone())));
        if promo.active {
            active_codes.insert(promo.code.clone(), promo.id);
        }
        Ok(promo.clone())
    }

    async fn find_active_promo(&self, code: &str) -> Result<Option<PromoCode>> {
        match self.active_promo_slot(code).await {
            Some(slot) => {
                let promo = slot.lock().await;
                Ok(promo.active.then(|| promo.clone()))
            }
            None => Ok(None),
        }
    }

    async fn redeem(&self, account_id: Uuid, code: &str, now: DateTime<Utc>) -> Result<Redemption> {
        let promo_slot = self
            .active_promo_slot(code)
            .await
            .ok_or(PromoError::CodeNotFound)?;

        let mut promo = promo_slot.lock().await;
        promo.check_redeemable(now)?;

        let account_slot = self.account_slot(account_id).await?;
        let mut account = account_slot.lock().await;

        let tokens_credited = i64::from(promo.token_value);
        promo.current_uses += 1;
        account.tokens += tokens_credited;
        account.updated_at = now;

        Ok(Redemption {
            code: promo.code.clone(),
            tokens_credited,
            balance: account.tokens,
            uses_remaining: promo.max_uses - promo.current_uses,
        })
    }

    async fn deactivate_spent(&self, now: DateTime<Utc>) -> Result<u64> {
        let slots: Vec<Slot<PromoCode>> = self.promos.read().await.values().cloned().collect();
        let mut retired = Vec::new();
        for slot in slots {
            let mut promo = slot.lock().await;
            if promo.active && promo.is_spent(now) {
                promo.active = false;
                retired.push((promo.code.clone(), promo.id));
            }
        }

        // A reissued code may already point the index at a newer record.
        let mut active_codes = self.active_codes.write().await;
        for (code, id) in &retired {
            if active_codes.get(code) == Some(id) {
                active_codes.remove(code);
            }
        }
        Ok(retired.len() as u64)
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn insert_item(&self, item: &SavedContentItem) -> Result<SavedContentItem> {
        self.items.write().await.insert(item.id, item.clone());
        Ok(item.clone())
    }

    async fn list_items(&self, account_id: Uuid, platform: Option<&str>) -> Result<Vec<SavedContentItem>> {
        let items = self.items.read().await;
        let mut owned: Vec<SavedContentItem> = items
            .values()
            .filter(|item| item.account_id == account_id)
            .filter(|item| platform.map_or(true, |p| item.platform == p))
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn find_item(&self, account_id: Uuid, item_id: Uuid) -> Result<Option<SavedContentItem>> {
        let items = self.items.read().await;
        Ok(items
            .get(&item_id)
            .filter(|item| item.account_id == account_id)
            .cloned())
    }

    async fn delete_item(&self, account_id: Uuid, item_id: Uuid) -> Result<bool> {
        let mut items = self.items.write().await;
        match items.get(&item_id) {
            Some(item) if item.account_id == account_id => {
                items.remove(&item_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AppError;
    use tokio_test::{assert_err, assert_ok};

    async fn store_with_account(tokens: i64) -> (MemoryStore, Uuid) {
        let store = MemoryStore::new();
        let account = Account::new(Uuid::new_v4(), "owner@example.com".into(), None, tokens);
        store.insert_account_if_absent(&account).await.unwrap();
        (store, account.id)
    }

    #[tokio::test]
    async fn test_insert_if_absent_keeps_existing_balance() {
        let (store, id) = store_with_account(3).await;
        store.credit(id, 4).await.unwrap();

        let again = Account::new(id, "owner@example.com".into(), None, 3);
        let stored = store.insert_account_if_absent(&again).await.unwrap();
        assert_eq!(stored.tokens, 7);
    }

    #[tokio::test]
    async fn test_debit_refuses_to_go_negative() {
        let (store, id) = store_with_account(1).await;
        assert_eq!(assert_ok!(store.debit(id, 1).await), 0);

        let err = assert_err!(store.debit(id, 1).await);
        assert!(matches!(err, AppError::LedgerError(LedgerError::InsufficientBalance)));
        assert_eq!(store.find_account(id).await.unwrap().unwrap().tokens, 0);
    }

    #[tokio::test]
    async fn test_unknown_account_is_not_found() {
        let store = MemoryStore::new();
        let err = assert_err!(store.credit(Uuid::new_v4(), 1).await);
        assert!(matches!(err, AppError::DatabaseError(DatabaseError::NotFound)));
    }

    #[tokio::test]
    async fn test_redeem_unknown_account_leaves_promo_untouched() {
        let store = MemoryStore::new();
        store.insert_promo(&PromoCode::new("ONCE", 5, 1, None)).await.unwrap();

        let err = assert_err!(store.redeem(Uuid::new_v4(), "ONCE", Utc::now()).await);
        assert!(matches!(err, AppError::DatabaseError(DatabaseError::NotFound)));

        let promo = store.find_active_promo("ONCE").await.unwrap().unwrap();
        assert_eq!(promo.current_uses, 0);
    }

    #[tokio::test]
    async fn test_duplicate_active_code_is_rejected() {
        let store = MemoryStore::new();
        store.insert_promo(&PromoCode::new("DUP", 5, 1, None)).await.unwrap();
        let err = assert_err!(store.insert_promo(&PromoCode::new("dup", 5, 1, None)).await);
        assert!(matches!(err, AppError::DatabaseError(DatabaseError::Duplicate)));
    }

    #[tokio::test]
    async fn test_deactivated_code_can_be_reissued() {
        let store = MemoryStore::new();
        let mut spent = PromoCode::new("AGAIN", 5, 1, None);
        spent.current_uses = 1;
        store.insert_promo(&spent).await.unwrap();
        assert_eq!(store.deactivate_spent(Utc::now()).await.unwrap(), 1);
        assert!(store.find_active_promo("AGAIN").await.unwrap().is_none());

        let reissued = assert_ok!(store.insert_promo(&PromoCode::new("AGAIN", 5, 1, None)).await);
        let active = store.find_active_promo("AGAIN").await.unwrap().unwrap();
        assert_eq!(active.id, reissued.id);
        assert_eq!(active.current_uses, 0);

        // The retired record is kept alongside the new one.
        let retired = store.promos.read().await.get(&spent.id).cloned().unwrap();
        let retired = retired.lock().await;
        assert!(!retired.active);
        assert_eq!(retired.current_uses, 1);
        assert_eq!(store.promos.read().await.len(), 2);
    }

    #[tokio::test]
    async fn test_sweep_after_reissue_keeps_new_code_active() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let mut spent = PromoCode::new("ROUND", 5, 1, None);
        spent.current_uses = 1;
        store.insert_promo(&spent).await.unwrap();
        assert_eq!(store.deactivate_spent(now).await.unwrap(), 1);

        store.insert_promo(&PromoCode::new("ROUND", 5, 2, None)).await.unwrap();
        assert_eq!(store.deactivate_spent(now).await.unwrap(), 0);

        let id = Uuid::new_v4();
        store
            .insert_account_if_absent(&Account::new(id, "round@example.com".into(), None, 0))
            .await
            .unwrap();
        let redemption = assert_ok!(store.redeem(id, "ROUND", now).await);
        assert_eq!(redemption.uses_remaining, 1);
    }

    #[tokio::test]
    async fn test_items_are_scoped_to_owner() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let item = SavedContentItem::new(owner, "t".into(), "b".into(), "post".into(), "facebook".into());
        store.insert_item(&item).await.unwrap();

        assert!(store.find_item(other, item.id).await.unwrap().is_none());
        assert!(!store.delete_item(other, item.id).await.unwrap());
        assert!(store.list_items(other, None).await.unwrap().is_empty());

        assert!(store.delete_item(owner, item.id).await.unwrap());
        assert!(store.find_item(owner, item.id).await.unwrap().is_none());
    }
}
