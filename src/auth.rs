//! Password hashing, JWT issuing/verification and the `AuthUser` extractor
//! that guards the `/account` routes.

use std::sync::Arc;

use anyhow::anyhow;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{ApiError, ApiResult};
use crate::models::User;

/// Claims carried by every issued token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID (subject)
    pub sub: String,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

/// Token payload returned by signup and login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthToken {
    #[serde(rename = "type")]
    pub token_type: String,
    pub token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: Option<String>,
}

/// Signs and verifies tokens, and hashes passwords with the configured
/// bcrypt cost.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    token_lifetime_secs: i64,
    bcrypt_cost: u32,
    /// Hash checked when the login email is unknown, so both outcomes cost
    /// one bcrypt verification.
    dummy_hash: String,
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> ApiResult<Self> {
        let secret = config.jwt_secret.as_bytes();

        let dummy_hash = bcrypt::hash(Uuid::new_v4().to_string(), config.bcrypt_cost)
            .map_err(|e| ApiError::Internal(anyhow!("Failed to prepare password hasher: {}", e)))?;

        Ok(TokenService {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
            token_lifetime_secs: i64::try_from(config.token_lifetime.as_secs()).unwrap_or(i64::MAX),
            bcrypt_cost: config.bcrypt_cost,
            dummy_hash,
        })
    }

    /// Issues a bearer token for `user`.
    pub fn generate(&self, user: &User) -> ApiResult<AuthToken> {
        let now = Utc::now().timestamp();

        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            iat: now,
            exp: now.saturating_add(self.token_lifetime_secs),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow!("Failed to sign token: {}", e))?;

        Ok(AuthToken {
            token_type: "bearer".to_string(),
            token,
            refresh_token: None,
        })
    }

    /// Checks signature and expiry and returns the claims.
    pub fn verify(&self, token: &str) -> ApiResult<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| ApiError::unauthorized(format!("Invalid token: {}", e)))
    }

    /// bcrypt is CPU bound, so hashing runs on the blocking pool.
    pub async fn hash_password(&self, password: String) -> ApiResult<String> {
        let cost = self.bcrypt_cost;

        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(anyhow::Error::from)?
            .map_err(|e| ApiError::Internal(anyhow!("Failed to hash password: {}", e)))
    }

    pub async fn verify_password(&self, password: String, hash: String) -> ApiResult<bool> {
        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(anyhow::Error::from)?
            .map_err(|e| ApiError::Internal(anyhow!("Failed to verify password: {}", e)))
    }

    /// Verifies `password` against the stored hash of a login candidate.
    /// A missing account is checked against the dummy hash and always
    /// fails, taking as long as a wrong password does.
    pub async fn check_credentials(
        &self,
        password: String,
        stored_hash: Option<String>,
    ) -> ApiResult<bool> {
        match stored_hash {
            Some(hash) => self.verify_password(password, hash).await,
            None => {
                self.verify_password(password, self.dummy_hash.clone()).await?;
                Ok(false)
            }
        }
    }
}

/// The caller identified by a valid `Authorization: Bearer` header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    Arc<TokenService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tokens = Arc::<TokenService>::from_ref(state);

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .ok_or_else(|| ApiError::unauthorized("Missing or malformed authorization token"))?;

        let claims = tokens.verify(token)?;

        let id = Uuid::parse_str(&claims.sub)
            .map_err(|_| ApiError::unauthorized("Invalid token subject"))?;

        Ok(AuthUser { id })
    }
}

fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();

    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}
