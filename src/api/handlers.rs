use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::db::{Account, SubscriptionTier};
use crate::error::AppError;
use crate::generation::GenerationRequest;
use crate::ledger::NewPromoCode;
use crate::library::SaveContentRequest;
use crate::AppState;

/// Resolves the bearer JWT to an account, provisioning it on first sight.
async fn current_account(req: &HttpRequest, state: &AppState) -> Result<Account, AppError> {
    let identity = state.auth_service.authenticate(req)?;
    state
        .ledger
        .provision(&identity, state.config.ledger.signup_tokens)
        .await
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    #[serde(flatten)]
    pub account: Account,
    pub can_claim_daily: bool,
    pub next_daily_claim_at: Option<DateTime<Utc>>,
}

pub async fn get_account(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let account = current_account(&req, &state).await?;
    let interval = state.daily_grant.interval();

    Ok(HttpResponse::Ok().json(AccountResponse {
        can_claim_daily: account.can_claim_daily(Utc::now(), interval),
        next_daily_claim_at: account.next_daily_claim_at(interval),
        account,
    }))
}

pub async fn generate(
    req: HttpRequest,
    body: web::Json<GenerationRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let account = current_account(&req, &state).await?;
    info!(account_id = %account.id, platform = %body.platform, "Received generation request");

    let outcome = state.generation_gate.generate(account.id, &body).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

pub async fn claim_daily(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let account = current_account(&req, &state).await?;
    let claim = state.daily_grant.claim(account.id, Utc::now()).await?;
    Ok(HttpResponse::Ok().json(claim))
}

#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    pub code: String,
}

pub async fn redeem_promo(
    req: HttpRequest,
    body: web::Json<RedeemRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let account = current_account(&req, &state).await?;
    let redemption = state
        .promo_redemption
        .redeem(account.id, &body.code, Utc::now())
        .await?;
    Ok(HttpResponse::Ok().json(redemption))
}

#[derive(Debug, Deserialize)]
pub struct ListContentQuery {
    pub platform: Option<String>,
}

pub async fn list_content(
    req: HttpRequest,
    query: web::Query<ListContentQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let account = current_account(&req, &state).await?;
    let platform = query.platform.as_deref().filter(|p| !p.is_empty() && *p != "all");
    let items = state.library.list(account.id, platform).await?;
    Ok(HttpResponse::Ok().json(items))
}

pub async fn save_content(
    req: HttpRequest,
    body: web::Json<SaveContentRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let account = current_account(&req, &state).await?;
    let item = state.library.save(account.id, &body).await?;
    Ok(HttpResponse::Created().json(item))
}

pub async fn get_content(
    req: HttpRequest,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let account = current_account(&req, &state).await?;
    let item = state.library.get(account.id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(item))
}

pub async fn delete_content(
    req: HttpRequest,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let account = current_account(&req, &state).await?;
    state.library.delete(account.id, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn create_promo_code(
    req: HttpRequest,
    body: web::Json<NewPromoCode>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    state.auth_service.authorize_admin(&req)?;
    match state.promo_redemption.create_code(&body).await {
        Ok(promo) => Ok(HttpResponse::Created().json(promo)),
        Err(e) => {
            error!("Failed to create promo code {}: {}", body.code, e);
            Err(e)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionRequest {
    pub tier: SubscriptionTier,
    pub expires_at: Option<DateTime<Utc>>,
}

pub async fn set_subscription(
    req: HttpRequest,
    path: web::Path<Uuid>,
    body: web::Json<SubscriptionRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    state.auth_service.authorize_admin(&req)?;
    let account = state
        .ledger
        .set_subscription(path.into_inner(), body.tier, body.expires_at)
        .await?;
    Ok(HttpResponse::Ok().json(account))
}

#[derive(Debug, Deserialize)]
pub struct CreditRequest {
    pub amount: i64,
}

pub async fn credit_account(
    req: HttpRequest,
    path: web::Path<Uuid>,
    body: web::Json<CreditRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    state.auth_service.authorize_admin(&req)?;
    let account_id = path.into_inner();
    let tokens = state.ledger.credit(account_id, body.amount).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "account_id": account_id,
        "tokens": tokens
    })))
}
