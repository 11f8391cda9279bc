use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Postgres, Transaction};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::db::models::{Account, PromoCode, Redemption, SavedContentItem, SubscriptionTier};
use crate::db::store::{AccountStore, ContentStore, PromoStore};
use crate::error::{DatabaseError, LedgerError, PromoError};
use crate::Result;

const ACCOUNT_COLUMNS: &str = "id, email, display_name, tokens, subscription_tier, \
    subscription_expires_at, last_daily_claim_at, created_at, updated_at";

const PROMO_COLUMNS: &str = "id, code, token_value, max_uses, current_uses, expires_at, active, created_at";

const ITEM_COLUMNS: &str = "id, account_id, title, body, content_type, platform, created_at";

/// Postgres-backed storage. Balance checks live inside the SQL statements
/// that mutate the balance, so concurrent handlers never read-then-write.
pub struct DbOperations {
    pool: Arc<PgPool>,
}

impl DbOperations {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = PgConnectOptions::from_str(&config.url)?
            .options([("statement_timeout", config.statement_timeout_ms.to_string())]);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(std::time::Duration::from_secs(config.acquire_timeout_secs))
            .connect_with(options)
            .await?;

        Ok(Self { pool: Arc::new(pool) })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(self.pool.as_ref()).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn begin_transaction(&self) -> Result<Transaction<'_, Postgres>> {
        Ok(self.pool.as_ref().begin().await?)
    }

    async fn account_exists(&self, id: Uuid) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM accounts WHERE id = $1)")
            .bind(id)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(exists)
    }

    async fn claim_daily_with_transaction(
        &self,
        transaction: &mut Transaction<'_, Postgres>,
        id: Uuid,
        now: DateTime<Utc>,
        interval: Duration,
        amount: i64,
    ) -> Result<Account> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut **transaction)
        .await?
        .ok_or(DatabaseError::NotFound)?;

        if !account.can_claim_daily(now, interval) {
            let next_claim_at = account.next_daily_claim_at(interval).unwrap_or(now);
            return Err(LedgerError::NotEligible { next_claim_at }.into());
        }

        let account = sqlx::query_as::<_, Account>(&format!(
            r#"
            UPDATE accounts
            SET tokens = tokens + $2, last_daily_claim_at = $3, updated_at = $3
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(amount)
        .bind(now)
        .fetch_one(&mut **transaction)
        .await?;

        Ok(account)
    }

    async fn redeem_with_transaction(
        &self,
        transaction: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Redemption> {
        // Lock order: promo row, then account row.
        let promo = sqlx::query_as::<_, PromoCode>(&format!(
            "SELECT {PROMO_COLUMNS} FROM promo_codes WHERE code = $1 AND active FOR UPDATE"
        ))
        .bind(code)
        .fetch_optional(&mut **transaction)
        .await?
        .ok_or(PromoError::CodeNotFound)?;

        promo.check_redeemable(now)?;

        sqlx::query_scalar::<_, Uuid>("SELECT id FROM accounts WHERE id = $1 FOR UPDATE")
            .bind(account_id)
            .fetch_optional(&mut **transaction)
            .await?
            .ok_or(DatabaseError::NotFound)?;

        let current_uses = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE promo_codes
            SET current_uses = current_uses + 1
            WHERE id = $1 AND current_uses < max_uses
            RETURNING current_uses
            "#,
        )
        .bind(promo.id)
        .fetch_optional(&mut **transaction)
        .await?
        .ok_or(PromoError::UsageLimitReached)?;

        let tokens_credited = i64::from(promo.token_value);
        let balance = sqlx::query_scalar::<_, i64>(
            "UPDATE accounts SET tokens = tokens + $2, updated_at = $3 WHERE id = $1 RETURNING tokens",
        )
        .bind(account_id)
        .bind(tokens_credited)
        .bind(now)
        .fetch_one(&mut **transaction)
        .await?;

        Ok(Redemption {
            code: promo.code,
            tokens_credited,
            balance,
            uses_remaining: promo.max_uses - current_uses,
        })
    }
}

#[async_trait]
impl AccountStore for DbOperations {
    async fn find_account(&self, id: Uuid) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(account)
    }

    async fn insert_account_if_absent(&self, account: &Account) -> Result<Account> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO accounts (id, email, display_name, tokens, subscription_tier, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(account.id)
        .bind(&account.email)
        .bind(&account.display_name)
        .bind(account.tokens)
        .bind(account.subscription_tier)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(self.pool.as_ref())
        .await?;

        if inserted.rows_affected() > 0 {
            debug!(account_id = %account.id, "Inserted new account");
        }

        self.find_account(account.id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound.into())
    }

    async fn debit(&self, id: Uuid, amount: i64) -> Result<i64> {
        let balance = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE accounts
            SET tokens = tokens - $2, updated_at = now()
            WHERE id = $1 AND tokens >= $2
            RETURNING tokens
            "#,
        )
        .bind(id)
        .bind(amount)
        .fetch_optional(self.pool.as_ref())
        .await?;

        if let Some(balance) = balance {
            return Ok(balance);
        }

        if self.account_exists(id).await? {
            Err(LedgerError::InsufficientBalance.into())
        } else {
            Err(DatabaseError::NotFound.into())
        }
    }

    async fn credit(&self, id: Uuid, amount: i64) -> Result<i64> {
        let balance = sqlx::query_scalar::<_, i64>(
            "UPDATE accounts SET tokens = tokens + $2, updated_at = now() WHERE id = $1 RETURNING tokens",
        )
        .bind(id)
        .bind(amount)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(DatabaseError::NotFound)?;

        Ok(balance)
    }

    async fn set_subscription(
        &self,
        id: Uuid,
        tier: SubscriptionTier,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Account> {
        let account = sqlx::query_as::<_, Account>(&format!(
            r#"
            UPDATE accounts
            SET subscription_tier = $2, subscription_expires_at = $3, updated_at = now()
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(tier)
        .bind(expires_at)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(DatabaseError::NotFound)?;

        Ok(account)
    }

    async fn claim_daily(&self, id: Uuid, now: DateTime<Utc>, interval: Duration, amount: i64) -> Result<Account> {
        let mut transaction = self.begin_transaction().await?;

        let result = self
            .claim_daily_with_transaction(&mut transaction, id, now, interval, amount)
            .await;

        match result {
            Ok(account) => {
                transaction.commit().await?;
                Ok(account)
            }
            Err(e) => {
                transaction.rollback().await?;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl PromoStore for DbOperations {
    async fn insert_promo(&self, promo: &PromoCode) -> Result<PromoCode> {
        let promo = sqlx::query_as::<_, PromoCode>(&format!(
            r#"
            INSERT INTO promo_codes (id, code, token_value, max_uses, current_uses, expires_at, active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PROMO_COLUMNS}
            "#
        ))
        .bind(promo.id)
        .bind(&promo.code)
        .bind(promo.token_value)
        .bind(promo.max_uses)
        .bind(promo.current_uses)
        .bind(promo.expires_at)
        .bind(promo.active)
        .bind(promo.created_at)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(promo)
    }

    async fn find_active_promo(&self, code: &str) -> Result<Option<PromoCode>> {
        let promo = sqlx::query_as::<_, PromoCode>(&format!(
            "SELECT {PROMO_COLUMNS} FROM promo_codes WHERE code = $1 AND active"
        ))
        .bind(code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(promo)
    }

    async fn redeem(&self, account_id: Uuid, code: &str, now: DateTime<Utc>) -> Result<Redemption> {
        let mut transaction = self.begin_transaction().await?;

        let result = self
            .redeem_with_transaction(&mut transaction, account_id, code, now)
            .await;

        match result {
            Ok(redemption) => {
                transaction.commit().await?;
                Ok(redemption)
            }
            Err(e) => {
                transaction.rollback().await?;
                Err(e)
            }
        }
    }

    async fn deactivate_spent(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE promo_codes
            SET active = FALSE
            WHERE active AND (current_uses >= max_uses OR (expires_at IS NOT NULL AND expires_at < $1))
            "#,
        )
        .bind(now)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ContentStore for DbOperations {
    async fn insert_item(&self, item: &SavedContentItem) -> Result<SavedContentItem> {
        let item = sqlx::query_as::<_, SavedContentItem>(&format!(
            r#"
            INSERT INTO saved_content (id, account_id, title, body, content_type, platform, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(item.id)
        .bind(item.account_id)
        .bind(&item.title)
        .bind(&item.body)
        .bind(&item.content_type)
        .bind(&item.platform)
        .bind(item.created_at)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(item)
    }

    async fn list_items(&self, account_id: Uuid, platform: Option<&str>) -> Result<Vec<SavedContentItem>> {
        let items = sqlx::query_as::<_, SavedContentItem>(&format!(
            r#"
            SELECT {ITEM_COLUMNS} FROM saved_content
            WHERE account_id = $1 AND ($2::text IS NULL OR platform = $2)
            ORDER BY created_at DESC
            "#
        ))
        .bind(account_id)
        .bind(platform)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(items)
    }

    async fn find_item(&self, account_id: Uuid, item_id: Uuid) -> Result<Option<SavedContentItem>> {
        let item = sqlx::query_as::<_, SavedContentItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM saved_content WHERE id = $1 AND account_id = $2"
        ))
        .bind(item_id)
        .bind(account_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(item)
    }

    async fn delete_item(&self, account_id: Uuid, item_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM saved_content WHERE id = $1 AND account_id = $2")
            .bind(item_id)
            .bind(account_id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
