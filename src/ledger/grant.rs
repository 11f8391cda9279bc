use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::db::Storage;
use crate::Result;

#[derive(Debug, Clone, Serialize)]
pub struct DailyClaim {
    pub tokens_credited: i64,
    pub balance: i64,
    pub claimed_at: DateTime<Utc>,
    pub next_claim_at: DateTime<Utc>,
}

/// Free tokens, once per rolling window.
pub struct DailyGrant {
    store: Arc<dyn Storage>,
    amount: i64,
    interval: Duration,
}

impl DailyGrant {
    pub fn new(store: Arc<dyn Storage>, amount: i64, interval: Duration) -> Self {
        Self { store, amount, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn claim(&self, account_id: Uuid, now: DateTime<Utc>) -> Result<DailyClaim> {
        let account = self
            .store
            .claim_daily(account_id, now, self.interval, self.amount)
            .await?;

        info!(%account_id, amount = self.amount, balance = account.tokens, "Daily tokens claimed");

        Ok(DailyClaim {
            tokens_credited: self.amount,
            balance: account.tokens,
            claimed_at: now,
            next_claim_at: now + self.interval,
        })
    }
}
