use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::PromoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_tier", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Free,
    Monthly,
    Yearly,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub tokens: i64,
    pub subscription_tier: SubscriptionTier,
    pub subscription_expires_at: Option<DateTime<Utc>>,
    pub last_daily_claim_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(id: Uuid, email: String, display_name: Option<String>, tokens: i64) -> Self {
        let now = Utc::now();
        Self {
            id,
            email,
            display_name,
            tokens,
            subscription_tier: SubscriptionTier::Free,
            subscription_expires_at: None,
            last_daily_claim_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rolling-window eligibility: exactly `interval` must have elapsed since
    /// the previous claim.
    pub fn can_claim_daily(&self, now: DateTime<Utc>, interval: Duration) -> bool {
        match self.last_daily_claim_at {
            None => true,
            Some(last) => now - last >= interval,
        }
    }

    pub fn next_daily_claim_at(&self, interval: Duration) -> Option<DateTime<Utc>> {
        self.last_daily_claim_at.map(|last| last + interval)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PromoCode {
    pub id: Uuid,
    pub code: String,
    pub token_value: i32,
    pub max_uses: i32,
    pub current_uses: i32,
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl PromoCode {
    pub fn new(code: &str, token_value: i32, max_uses: i32, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            code: Self::normalize(code),
            token_value,
            max_uses,
            current_uses: 0,
            expires_at,
            active: true,
            created_at: Utc::now(),
        }
    }

    /// Codes are matched case-insensitively and ignore surrounding whitespace.
    pub fn normalize(code: &str) -> String {
        code.trim().to_uppercase()
    }

    /// Usage is checked before expiry so a spent code reports the limit.
    pub fn check_redeemable(&self, now: DateTime<Utc>) -> Result<(), PromoError> {
        if !self.active {
            return Err(PromoError::CodeNotFound);
        }
        if self.current_uses >= self.max_uses {
            return Err(PromoError::UsageLimitReached);
        }
        if let Some(expires_at) = self.expires_at {
            if now > expires_at {
                return Err(PromoError::CodeExpired);
            }
        }
        Ok(())
    }

    pub fn is_spent(&self, now: DateTime<Utc>) -> bool {
        self.current_uses >= self.max_uses || self.expires_at.map_or(false, |at| at < now)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SavedContentItem {
    pub id: Uuid,
    pub account_id: Uuid,
    pub title: String,
    pub body: String,
    pub content_type: String,
    pub platform: String,
    pub created_at: DateTime<Utc>,
}

impl SavedContentItem {
    pub fn new(account_id: Uuid, title: String, body: String, content_type: String, platform: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            title,
            body,
            content_type,
            platform,
            created_at: Utc::now(),
        }
    }
}

/// Outcome of a successful promo redemption.
#[derive(Debug, Clone, Serialize)]
pub struct Redemption {
    pub code: String,
    pub tokens_credited: i64,
    pub balance: i64,
    pub uses_remaining: i32,
}
