//! HTTP routes. Each browser action maps to exactly one handler.

pub mod handlers;

use actix_web::web;

use crate::error::AppError;

const JSON_LIMIT: usize = 64 * 1024;

/// Extractor failures use the same error envelope as every other failure.
fn extractor_configs(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(JSON_LIMIT)
            .error_handler(|err, _req| AppError::ValidationError(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| AppError::ValidationError(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| AppError::ValidationError(err.to_string()).into()),
    );
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    extractor_configs(cfg);
    cfg.service(
        web::scope("/api")
            .route("/account", web::get().to(handlers::get_account))
            .route("/generate", web::post().to(handlers::generate))
            .route("/tokens/daily", web::post().to(handlers::claim_daily))
            .route("/tokens/redeem", web::post().to(handlers::redeem_promo))
            .route("/content", web::get().to(handlers::list_content))
            .route("/content", web::post().to(handlers::save_content))
            .route("/content/{id}", web::get().to(handlers::get_content))
            .route("/content/{id}", web::delete().to(handlers::delete_content)),
    )
    .service(
        web::scope("/admin")
            .route("/promo-codes", web::post().to(handlers::create_promo_code))
            .route("/accounts/{id}/subscription", web::put().to(handlers::set_subscription))
            .route("/accounts/{id}/credit", web::post().to(handlers::credit_account)),
    );
}
