#![allow(dead_code)]

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use myanmar_content_server::generation::TemplateEngine;
use myanmar_content_server::{AppState, MemoryStore, Settings};
use std::sync::Arc;
use uuid::Uuid;

pub const ADMIN_KEY: &str = "test_admin_key";

pub fn test_state() -> AppState {
    let engine = Arc::new(myanmar_content_server::generation::LocalTemplateEngine::new());
    state_with_engine(engine)
}

pub fn state_with_engine(engine: Arc<dyn TemplateEngine>) -> AppState {
    let config = Settings::new_for_test().expect("Failed to load test config");
    AppState::from_parts(config, Arc::new(MemoryStore::new()), engine)
}

/// Signs a token the way the identity provider would.
pub fn token_for(id: Uuid) -> String {
    let claims = serde_json::json!({
        "sub": id.to_string(),
        "exp": (Utc::now() + Duration::hours(1)).timestamp(),
        "email": format!("{}@example.com", id.simple()),
        "name": "Ko Aung",
    });
    encode(&Header::default(), &claims, &EncodingKey::from_secret(b"test_secret")).unwrap()
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}

pub fn brief() -> serde_json::Value {
    serde_json::json!({
        "businessName": "Shwe Mandalay Tea",
        "productService": "Laphet thoke and milk tea",
        "targetAudience": "office workers in Yangon",
        "contentType": "promotion",
        "platform": "facebook",
        "tone": "friendly",
        "brandGender": "female",
        "additionalInfo": "opening a new branch"
    })
}

#[macro_export]
macro_rules! init_app {
    ($state:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new($state.clone()))
                .route(
                    "/health",
                    actix_web::web::get().to(myanmar_content_server::health_check),
                )
                .configure(myanmar_content_server::api::configure),
        )
        .await
    };
}
