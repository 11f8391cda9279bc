pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod generation;
pub mod ledger;
pub mod library;

use actix_web::HttpResponse;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use auth::AuthService;
pub use db::{DbOperations, MemoryStore, Storage};

use config::{GeneratorBackend, StorageBackend};
use generation::{GenerationGate, HttpTemplateEngine, LocalTemplateEngine, TemplateEngine};
use ledger::{DailyGrant, Ledger, PromoRedemption};
use library::ContentLibrary;

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Application state shared across all workers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub store: Arc<dyn Storage>,
    pub auth_service: Arc<AuthService>,
    pub ledger: Ledger,
    pub daily_grant: Arc<DailyGrant>,
    pub promo_redemption: Arc<PromoRedemption>,
    pub generation_gate: Arc<GenerationGate>,
    pub library: Arc<ContentLibrary>,
    db: Option<Arc<DbOperations>>,
}

impl AppState {
    pub async fn new(config: Settings) -> Result<Self> {
        let (store, db): (Arc<dyn Storage>, Option<Arc<DbOperations>>) = match config.database.backend {
            StorageBackend::Postgres => {
                let db = Arc::new(DbOperations::connect(&config.database).await?);
                if config.database.run_migrations {
                    db.run_migrations().await?;
                    info!("Database migrations applied");
                }
                let store: Arc<dyn Storage> = db.clone();
                (store, Some(db))
            }
            StorageBackend::Memory => {
                info!("Using in-memory storage; balances are lost on restart");
                let store: Arc<dyn Storage> = Arc::new(MemoryStore::new());
                (store, None)
            }
        };

        let engine: Arc<dyn TemplateEngine> = match config.generator.backend {
            GeneratorBackend::Local => Arc::new(LocalTemplateEngine::new()),
            GeneratorBackend::Remote => Arc::new(HttpTemplateEngine::from_config(&config.generator)?),
        };

        let mut state = Self::from_parts(config, store, engine);
        state.db = db;
        Ok(state)
    }

    /// Wires the services over an existing store and engine.
    pub fn from_parts(config: Settings, store: Arc<dyn Storage>, engine: Arc<dyn TemplateEngine>) -> Self {
        let ledger = Ledger::new(store.clone());
        let daily_grant = DailyGrant::new(
            store.clone(),
            config.ledger.daily_grant_tokens,
            config.daily_grant_interval(),
        );
        let generation_gate = GenerationGate::new(
            ledger.clone(),
            engine,
            config.ledger.generation_cost,
            Duration::from_secs(config.generator.timeout_secs),
        );

        Self {
            auth_service: Arc::new(AuthService::new(&config.auth)),
            ledger,
            daily_grant: Arc::new(daily_grant),
            promo_redemption: Arc::new(PromoRedemption::new(store.clone())),
            generation_gate: Arc::new(generation_gate),
            library: Arc::new(ContentLibrary::new(store.clone())),
            store,
            config: Arc::new(config),
            db: None,
        }
    }

    pub async fn shutdown(&self) -> Result<()> {
        if let Some(db) = &self.db {
            db.close().await;
        }
        Ok(())
    }
}
