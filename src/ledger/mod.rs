//! Token ledger
//!
//! Balance, daily grant and promo redemption. All balance arithmetic happens
//! inside the store so each mutation is a single atomic step.

mod grant;
mod promo;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::{Account, Storage, SubscriptionTier};
use crate::error::{AppError, DatabaseError};
use crate::Result;

pub use grant::{DailyClaim, DailyGrant};
pub use promo::{NewPromoCode, PromoRedemption};

/// Identity asserted by the external identity provider.
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
}

#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn Storage>,
}

impl Ledger {
    pub fn new(store: Arc<dyn Storage>) -> Self {
        Self { store }
    }

    pub async fn account(&self, id: Uuid) -> Result<Account> {
        self.store
            .find_account(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound.into())
    }

    /// Returns the account for `identity`, creating it with `signup_tokens` on
    /// first sight. Concurrent first requests converge on one row.
    pub async fn provision(&self, identity: &Identity, signup_tokens: i64) -> Result<Account> {
        if let Some(account) = self.store.find_account(identity.id).await? {
            return Ok(account);
        }

        let account = Account::new(
            identity.id,
            identity.email.clone(),
            identity.display_name.clone(),
            signup_tokens,
        );
        let account = self.store.insert_account_if_absent(&account).await?;
        info!(account_id = %account.id, tokens = account.tokens, "Account provisioned");
        Ok(account)
    }

    pub async fn debit(&self, id: Uuid, amount: i64) -> Result<i64> {
        ensure_positive(amount)?;
        let balance = self.store.debit(id, amount).await?;
        debug!(account_id = %id, amount, balance, "Debited tokens");
        Ok(balance)
    }

    pub async fn credit(&self, id: Uuid, amount: i64) -> Result<i64> {
        ensure_positive(amount)?;
        let balance = self.store.credit(id, amount).await?;
        debug!(account_id = %id, amount, balance, "Credited tokens");
        Ok(balance)
    }

    pub async fn set_subscription(
        &self,
        id: Uuid,
        tier: SubscriptionTier,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Account> {
        let account = self.store.set_subscription(id, tier, expires_at).await?;
        info!(account_id = %id, ?tier, ?expires_at, "Subscription updated");
        Ok(account)
    }
}

fn ensure_positive(amount: i64) -> Result<()> {
    if amount <= 0 {
        return Err(AppError::ValidationError(format!("amount must be positive, got {}", amount)));
    }
    Ok(())
}
