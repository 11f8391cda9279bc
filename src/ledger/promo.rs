use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{PromoCode, Redemption, Storage};
use crate::error::{AppError, PromoError};
use crate::Result;

#[derive(Debug, Clone, Deserialize)]
pub struct NewPromoCode {
    pub code: String,
    pub token_value: i32,
    pub max_uses: i32,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Redemption against the shared promo registry.
pub struct PromoRedemption {
    store: Arc<dyn Storage>,
}

impl PromoRedemption {
    pub fn new(store: Arc<dyn Storage>) -> Self {
        Self { store }
    }

    /// Checks run in order (existence, usage limit, expiry) before anything
    /// is written. Crediting the account and bumping the usage count commit
    /// together or not at all.
    pub async fn redeem(&self, account_id: Uuid, code_text: &str, now: DateTime<Utc>) -> Result<Redemption> {
        let code = PromoCode::normalize(code_text);
        if code.is_empty() {
            return Err(PromoError::CodeNotFound.into());
        }

        match self.store.redeem(account_id, &code, now).await {
            Ok(redemption) => {
                info!(
                    %account_id,
                    code = %redemption.code,
                    tokens = redemption.tokens_credited,
                    balance = redemption.balance,
                    "Promo code redeemed"
                );
                Ok(redemption)
            }
            Err(e) => {
                warn!(%account_id, %code, error = %e, "Promo redemption refused");
                Err(e)
            }
        }
    }

    pub async fn create_code(&self, new: &NewPromoCode) -> Result<PromoCode> {
        if new.token_value <= 0 || new.max_uses <= 0 {
            return Err(AppError::ValidationError(
                "token_value and max_uses must be positive".to_string(),
            ));
        }

        let promo = PromoCode::new(&new.code, new.token_value, new.max_uses, new.expires_at);
        if promo.code.is_empty() {
            return Err(AppError::ValidationError("code must not be empty".to_string()));
        }

        let promo = self.store.insert_promo(&promo).await?;
        info!(code = %promo.code, token_value = promo.token_value, max_uses = promo.max_uses, "Promo code created");
        Ok(promo)
    }

    /// Retires codes that can no longer be redeemed.
    pub async fn deactivate_spent(&self, now: DateTime<Utc>) -> Result<u64> {
        let count = self.store.deactivate_spent(now).await?;
        if count > 0 {
            info!(count, "Deactivated spent promo codes");
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Account, AccountStore, MemoryStore, PromoStore};
    use chrono::Duration;
    use futures::future::join_all;

    async fn account(store: &MemoryStore, tokens: i64) -> Uuid {
        let account = Account::new(Uuid::new_v4(), "promo@example.com".into(), None, tokens);
        store.insert_account_if_absent(&account).await.unwrap().id
    }

    fn new_code(code: &str, token_value: i32, max_uses: i32, expires_at: Option<DateTime<Utc>>) -> NewPromoCode {
        NewPromoCode {
            code: code.to_string(),
            token_value,
            max_uses,
            expires_at,
        }
    }

    #[tokio::test]
    async fn test_welcome_code_single_use() {
        let store = Arc::new(MemoryStore::new());
        let promos = PromoRedemption::new(store.clone());
        promos.create_code(&new_code("WELCOME5", 5, 1, None)).await.unwrap();

        let first = account(&store, 0).await;
        let redemption = promos.redeem(first, " welcome5 ", Utc::now()).await.unwrap();
        assert_eq!(redemption.balance, 5);
        assert_eq!(redemption.uses_remaining, 0);
        assert_eq!(store.find_active_promo("WELCOME5").await.unwrap().unwrap().current_uses, 1);

        let err = promos.redeem(first, "WELCOME5", Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::PromoError(PromoError::UsageLimitReached)));

        let second = account(&store, 0).await;
        let err = promos.redeem(second, "WELCOME5", Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::PromoError(PromoError::UsageLimitReached)));
        assert_eq!(store.find_account(second).await.unwrap().unwrap().tokens, 0);
    }

    #[tokio::test]
    async fn test_unknown_and_blank_codes() {
        let store = Arc::new(MemoryStore::new());
        let promos = PromoRedemption::new(store.clone());
        let id = account(&store, 0).await;

        for text in ["NOPE", "   ", ""] {
            let err = promos.redeem(id, text, Utc::now()).await.unwrap_err();
            assert_eq!(err.kind(), "code_not_found");
        }
    }

    #[tokio::test]
    async fn test_expired_code_is_not_applied() {
        let store = Arc::new(MemoryStore::new());
        let promos = PromoRedemption::new(store.clone());
        let now = Utc::now();
        promos
            .create_code(&new_code("OLD", 10, 5, Some(now - Duration::minutes(1))))
            .await
            .unwrap();
        let id = account(&store, 1).await;

        let err = promos.redeem(id, "old", now).await.unwrap_err();
        assert!(matches!(err, AppError::PromoError(PromoError::CodeExpired)));
        assert_eq!(store.find_account(id).await.unwrap().unwrap().tokens, 1);
        assert_eq!(store.find_active_promo("OLD").await.unwrap().unwrap().current_uses, 0);
    }

    #[tokio::test]
    async fn test_create_code_validation() {
        let promos = PromoRedemption::new(Arc::new(MemoryStore::new()));
        assert!(matches!(
            promos.create_code(&new_code("ZERO", 0, 1, None)).await,
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            promos.create_code(&new_code("  ", 1, 1, None)).await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_sweep_deactivates_spent_codes() {
        let store = Arc::new(MemoryStore::new());
        let promos = PromoRedemption::new(store.clone());
        let now = Utc::now();
        promos.create_code(&new_code("LIVE", 1, 3, None)).await.unwrap();
        promos
            .create_code(&new_code("STALE", 1, 3, Some(now - Duration::days(1))))
            .await
            .unwrap();

        assert_eq!(promos.deactivate_spent(now).await.unwrap(), 1);
        assert!(store.find_active_promo("LIVE").await.unwrap().is_some());

        let id = account(&store, 0).await;
        let err = promos.redeem(id, "STALE", now).await.unwrap_err();
        assert!(matches!(err, AppError::PromoError(PromoError::CodeNotFound)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_redemptions_respect_max_uses() {
        let store = Arc::new(MemoryStore::new());
        let promos = Arc::new(PromoRedemption::new(store.clone()));
        promos.create_code(&new_code("RUSH", 2, 3, None)).await.unwrap();

        let mut accounts = Vec::new();
        for _ in 0..12 {
            accounts.push(account(&store, 0).await);
        }

        let attempts = accounts.iter().map(|&id| {
            let promos = promos.clone();
            tokio::spawn(async move { promos.redeem(id, "rush", Utc::now()).await })
        });
        let results = join_all(attempts).await;

        let successes = results.into_iter().filter(|r| matches!(r, Ok(Ok(_)))).count();
        assert_eq!(successes, 3);

        let mut credited = 0;
        for id in accounts {
            credited += store.find_account(id).await.unwrap().unwrap().tokens;
        }
        assert_eq!(credited, 6);
        assert_eq!(store.find_active_promo("RUSH").await.unwrap().unwrap().current_uses, 3);
    }
}
