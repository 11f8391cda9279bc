use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use super::types::{GeneratedVariant, GenerationRequest};
use super::TemplateEngine;
use crate::error::{AppError, GenerationError, LedgerError};
use crate::ledger::Ledger;
use crate::Result;

#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutcome {
    pub content: Vec<GeneratedVariant>,
    pub tokens: i64,
}

/// Token check and debit around every template engine call.
///
/// The debit happens only after the engine succeeds, so failed generations
/// are free. The debit is a conditional decrement: when two calls race for
/// the last token, the loser gets `InsufficientBalance` and its variants are
/// dropped.
pub struct GenerationGate {
    ledger: Ledger,
    engine: Arc<dyn TemplateEngine>,
    cost: i64,
    timeout: Duration,
}

impl GenerationGate {
    pub fn new(ledger: Ledger, engine: Arc<dyn TemplateEngine>, cost: i64, timeout: Duration) -> Self {
        Self {
            ledger,
            engine,
            cost,
            timeout,
        }
    }

    pub async fn generate(&self, account_id: Uuid, request: &GenerationRequest) -> Result<GenerationOutcome> {
        request.validate().map_err(AppError::ValidationError)?;

        let account = self.ledger.account(account_id).await?;
        if account.tokens < self.cost {
            info!(%account_id, balance = account.tokens, "Generation refused, insufficient tokens");
            return Err(LedgerError::InsufficientBalance.into());
        }

        let variants = match tokio::time::timeout(self.timeout, self.engine.generate(request)).await {
            Ok(Ok(variants)) => variants,
            Ok(Err(e)) => {
                warn!(%account_id, error = %e, "Template engine failed, no tokens debited");
                return Err(e.into());
            }
            Err(_) => {
                warn!(%account_id, "Template engine timed out, no tokens debited");
                return Err(GenerationError::Timeout.into());
            }
        };

        let tokens = self.ledger.debit(account_id, self.cost).await?;
        info!(%account_id, variants = variants.len(), balance = tokens, "Content generated");

        Ok(GenerationOutcome { content: variants, tokens })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Account, AccountStore, MemoryStore, Storage};
    use crate::generation::MockTemplateEngine;
    use serde_json::json;

    fn request() -> GenerationRequest {
        serde_json::from_value(json!({
            "businessName": "Shwe Tea",
            "productService": "Milk tea",
        }))
        .unwrap()
    }

    fn variants() -> Vec<GeneratedVariant> {
        (1..=3)
            .map(|i| GeneratedVariant {
                id: format!("content_{}", i),
                content: "မင်္ဂလာပါ".to_string(),
                quality_score: 90,
                engagement_prediction: 75,
                keywords: vec!["Myanmar".to_string()],
            })
            .collect()
    }

    async fn setup(tokens: i64, engine: MockTemplateEngine) -> (GenerationGate, Arc<MemoryStore>, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let account = Account::new(Uuid::new_v4(), "gate@example.com".into(), None, tokens);
        store.insert_account_if_absent(&account).await.unwrap();

        let storage: Arc<dyn Storage> = store.clone();
        let gate = GenerationGate::new(Ledger::new(storage), Arc::new(engine), 1, Duration::from_secs(5));
        (gate, store, account.id)
    }

    async fn balance(store: &MemoryStore, id: Uuid) -> i64 {
        store.find_account(id).await.unwrap().unwrap().tokens
    }

    #[test_log::test(tokio::test)]
    async fn test_last_token_then_insufficient() {
        let mut engine = MockTemplateEngine::new();
        engine.expect_generate().times(1).returning(|_| Ok(variants()));
        let (gate, store, id) = setup(1, engine).await;

        let outcome = gate.generate(id, &request()).await.unwrap();
        assert_eq!(outcome.content.len(), 3);
        assert_eq!(outcome.tokens, 0);
        assert_eq!(balance(&store, id).await, 0);

        let err = gate.generate(id, &request()).await.unwrap_err();
        assert!(matches!(err, AppError::LedgerError(LedgerError::InsufficientBalance)));
        assert_eq!(balance(&store, id).await, 0);
    }

    #[tokio::test]
    async fn test_engine_not_called_without_tokens() {
        let mut engine = MockTemplateEngine::new();
        engine.expect_generate().never();
        let (gate, _store, id) = setup(0, engine).await;

        let err = gate.generate(id, &request()).await.unwrap_err();
        assert_eq!(err.kind(), "insufficient_balance");
    }

    #[test_log::test(tokio::test)]
    async fn test_engine_failure_is_not_charged() {
        let mut engine = MockTemplateEngine::new();
        engine
            .expect_generate()
            .returning(|_| Err(GenerationError::Status(503)));
        let (gate, store, id) = setup(4, engine).await;

        let err = gate.generate(id, &request()).await.unwrap_err();
        assert_eq!(err.kind(), "generation_unavailable");
        assert_eq!(balance(&store, id).await, 4);
    }

    #[tokio::test]
    async fn test_invalid_request_is_rejected_before_anything() {
        let mut engine = MockTemplateEngine::new();
        engine.expect_generate().never();
        let (gate, store, id) = setup(2, engine).await;

        let mut bad = request();
        bad.product_service = String::new();
        let err = gate.generate(id, &bad).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert_eq!(balance(&store, id).await, 2);
    }

    struct SlowEngine;

    #[async_trait::async_trait]
    impl TemplateEngine for SlowEngine {
        async fn generate(&self, _request: &GenerationRequest) -> std::result::Result<Vec<GeneratedVariant>, GenerationError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(variants())
        }
    }

    #[tokio::test]
    async fn test_timeout_is_not_charged() {
        let store = Arc::new(MemoryStore::new());
        let account = Account::new(Uuid::new_v4(), "slow@example.com".into(), None, 3);
        store.insert_account_if_absent(&account).await.unwrap();
        let storage: Arc<dyn Storage> = store.clone();
        let gate = GenerationGate::new(Ledger::new(storage), Arc::new(SlowEngine), 1, Duration::from_millis(50));

        let err = gate.generate(account.id, &request()).await.unwrap_err();
        assert!(matches!(err, AppError::GenerationError(GenerationError::Timeout)));
        assert_eq!(balance(&store, account.id).await, 3);
    }

    #[tokio::test]
    async fn test_unknown_account_is_not_found() {
        let mut engine = MockTemplateEngine::new();
        engine.expect_generate().never();
        let (gate, _store, _id) = setup(1, engine).await;

        let err = gate.generate(Uuid::new_v4(), &request()).await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }
}
