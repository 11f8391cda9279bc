use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

pub const MAX_KEYWORDS: usize = 5;
pub const MIN_VARIANTS: usize = 2;
pub const MAX_VARIANTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BrandGender {
    Male,
    Female,
    #[default]
    Neutral,
}

/// The brief a user submits from the generator form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub business_name: String,
    pub product_service: String,
    #[serde(default)]
    pub target_audience: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(default = "default_platform")]
    pub platform: String,
    #[serde(default = "default_tone")]
    pub tone: String,
    #[serde(default)]
    pub brand_gender: BrandGender,
    #[serde(default)]
    pub additional_info: String,
}

fn default_content_type() -> String {
    "post".to_string()
}

fn default_platform() -> String {
    "facebook".to_string()
}

fn default_tone() -> String {
    "professional".to_string()
}

impl GenerationRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.business_name.trim().is_empty() {
            return Err("businessName is required".to_string());
        }
        if self.product_service.trim().is_empty() {
            return Err("productService is required".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedVariant {
    pub id: String,
    pub content: String,
    pub quality_score: u8,
    pub engagement_prediction: u8,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub content: Vec<GeneratedVariant>,
}

/// Enforces the collaborator contract: 2–3 variants with scores in 0..=100.
/// Keyword lists longer than the limit are truncated.
pub fn validate_variants(mut variants: Vec<GeneratedVariant>) -> Result<Vec<GeneratedVariant>, GenerationError> {
    if !(MIN_VARIANTS..=MAX_VARIANTS).contains(&variants.len()) {
        return Err(GenerationError::Malformed(format!(
            "expected {}-{} variants, got {}",
            MIN_VARIANTS,
            MAX_VARIANTS,
            variants.len()
        )));
    }

    for variant in variants.iter_mut() {
        if variant.quality_score > 100 || variant.engagement_prediction > 100 {
            return Err(GenerationError::Malformed(format!(
                "score out of range in variant {}",
                variant.id
            )));
        }
        variant.keywords.truncate(MAX_KEYWORDS);
    }

    Ok(variants)
}
