use thiserror::Error;
use actix_web::{ResponseError, HttpResponse, http::StatusCode};
use serde_json::json;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    AuthError(#[from] AuthError),

    #[error("Ledger error: {0}")]
    LedgerError(#[from] LedgerError),

    #[error("Promo code error: {0}")]
    PromoError(#[from] PromoError),

    #[error("Content generation unavailable: {0}")]
    GenerationError(#[from] GenerationError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl AppError {
    /// Stable machine-readable error kind, sent to clients next to the message.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::AuthError(AuthError::Forbidden) => "forbidden",
            AppError::AuthError(_) => "unauthorized",
            AppError::LedgerError(LedgerError::InsufficientBalance) => "insufficient_balance",
            AppError::LedgerError(LedgerError::NotEligible { .. }) => "not_eligible",
            AppError::PromoError(PromoError::CodeNotFound) => "code_not_found",
            AppError::PromoError(PromoError::UsageLimitReached) => "usage_limit_reached",
            AppError::PromoError(PromoError::CodeExpired) => "code_expired",
            AppError::GenerationError(_) => "generation_unavailable",
            AppError::DatabaseError(DatabaseError::NotFound) => "not_found",
            AppError::DatabaseError(DatabaseError::Duplicate) => "duplicate",
            AppError::DatabaseError(DatabaseError::Unavailable(_)) => "store_unavailable",
            AppError::ConfigError(_) => "config_error",
            AppError::InternalError(_) => "internal_error",
            AppError::ValidationError(_) => "validation_error",
        }
    }
}

// Implement conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound,
            sqlx::Error::Database(ref db) if db.is_unique_violation() => DatabaseError::Duplicate,
            _ => DatabaseError::Unavailable(err.to_string()),
        }
    }
}

// Implement conversion from sqlx::Error
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err.into())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::DatabaseError(DatabaseError::Unavailable(err.to_string()))
    }
}

// Add conversion from std::io::Error
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

// Implement actix_web::ResponseError for AppError
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = self.to_string();
        let response = json!({
            "error": {
                "status": status.as_u16(),
                "kind": self.kind(),
                "message": message
            }
        });
        HttpResponse::build(status).json(response)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::AuthError(e) => match e {
                AuthError::MissingToken => StatusCode::UNAUTHORIZED,
                AuthError::TokenExpired => StatusCode::UNAUTHORIZED,
                AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
                AuthError::Forbidden => StatusCode::FORBIDDEN,
            },
            AppError::LedgerError(e) => match e {
                LedgerError::InsufficientBalance => StatusCode::PAYMENT_REQUIRED,
                LedgerError::NotEligible { .. } => StatusCode::TOO_MANY_REQUESTS,
            },
            AppError::PromoError(e) => match e {
                PromoError::CodeNotFound => StatusCode::NOT_FOUND,
                PromoError::UsageLimitReached => StatusCode::CONFLICT,
                PromoError::CodeExpired => StatusCode::GONE,
            },
            AppError::GenerationError(_) => StatusCode::BAD_GATEWAY,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::DatabaseError(DatabaseError::NotFound) => StatusCode::NOT_FOUND,
            AppError::DatabaseError(DatabaseError::Duplicate) => StatusCode::CONFLICT,
            AppError::DatabaseError(DatabaseError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Forbidden")]
    Forbidden,
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Insufficient token balance")]
    InsufficientBalance,

    #[error("Daily tokens already claimed, next claim available at {next_claim_at}")]
    NotEligible { next_claim_at: chrono::DateTime<chrono::Utc> },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromoError {
    #[error("Invalid or inactive promo code")]
    CodeNotFound,

    #[error("Promo code has reached its usage limit")]
    UsageLimitReached,

    #[error("Promo code has expired")]
    CodeExpired,
}

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Request to content generator failed: {0}")]
    RequestFailed(String),

    #[error("Content generator responded with status {0}")]
    Status(u16),

    #[error("Content generator timed out")]
    Timeout,

    #[error("Malformed generator response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GenerationError::Timeout
        } else if err.is_decode() {
            GenerationError::Malformed(err.to_string())
        } else {
            GenerationError::RequestFailed(err.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Record not found")]
    NotFound,

    #[error("Duplicate record")]
    Duplicate,
}
