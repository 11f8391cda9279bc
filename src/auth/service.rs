use actix_web::HttpRequest;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::ledger::Identity;

/// Claims issued by the identity provider. Only `sub` is required beyond
/// the expiry.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

pub struct AuthService {
    decoding_key: DecodingKey,
    validation: Validation,
    admin_api_key: Option<String>,
}

impl AuthService {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        match &config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            admin_api_key: config.admin_api_key.clone(),
        }
    }

    pub fn validate_token(&self, token: &str) -> Result<Identity, AuthError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)?.claims;
        let id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        Ok(Identity {
            id,
            email: claims.email.unwrap_or_default(),
            display_name: claims.name,
        })
    }

    pub fn authenticate(&self, req: &HttpRequest) -> Result<Identity, AuthError> {
        self.validate_token(bearer_token(req)?)
    }

    /// Admin routes are closed entirely when no admin key is configured.
    pub fn authorize_admin(&self, req: &HttpRequest) -> Result<(), AuthError> {
        let expected = self.admin_api_key.as_deref().ok_or(AuthError::Forbidden)?;
        if keys_match(bearer_token(req)?, expected) {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }
}

/// Compares SHA-256 digests so the comparison time does not depend on where
/// the keys first differ or on their lengths.
fn keys_match(given: &str, expected: &str) -> bool {
    let given = Sha256::digest(given.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    given
        .iter()
        .zip(expected.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

pub fn bearer_token(req: &HttpRequest) -> Result<&str, AuthError> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(AuthError::MissingToken)
}
