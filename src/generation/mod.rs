//! Content generation
//!
//! The template engine is an external collaborator; `GenerationGate` wraps
//! every call to it with the token check and the debit.

mod client;
mod gate;
mod templates;
mod types;

use async_trait::async_trait;

use crate::error::GenerationError;

pub use client::HttpTemplateEngine;
pub use gate::{GenerationGate, GenerationOutcome};
pub use templates::LocalTemplateEngine;
pub use types::{
    validate_variants, BrandGender, GeneratedVariant, GenerationRequest, GenerationResponse, MAX_KEYWORDS,
};

/// Produces 2–3 content variants from a brief.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TemplateEngine: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<GeneratedVariant>, GenerationError>;
}
