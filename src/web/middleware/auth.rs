//! JWT authentication middleware.

use axum::{
    async_trait,
    body::Body,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::web::error::ApiError;

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID).
    pub sub: i64,
    /// Username.
    pub username: String,
    /// Issued at timestamp.
    pub iat: u64,
    /// Expiration timestamp.
    pub exp: u64,
    /// JWT ID, the handle used for revocation.
    pub jti: String,
}

/// Token issuing, verification and in-process revocation.
pub struct JwtState {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    /// Token lifetime in seconds.
    expiry_secs: u64,
    /// Revoked token ids with their expiry, kept until they would lapse anyway.
    revoked: RwLock<HashMap<String, u64>>,
}

impl JwtState {
    /// Create a new JWT state from a secret key.
    pub fn new(secret: &str, expiry_secs: u64) -> Self {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            expiry_secs,
            revoked: RwLock::new(HashMap::new()),
        }
    }

    pub fn expiry_secs(&self) -> u64 {
        self.expiry_secs
    }

    /// Sign a fresh HS256 token for a user.
    pub fn issue(&self, user_id: i64, username: &str) -> Result<String, ApiError> {
        let now = now_secs();
        let claims = JwtClaims {
            sub: user_id,
            username: username.to_string(),
            iat: now,
            exp: now + self.expiry_secs,
            jti: uuid::Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to encode JWT: {}", e);
            ApiError::internal("Failed to generate token")
        })
    }

    /// Decode a token, rejecting bad signatures, expired and revoked tokens.
    pub async fn verify(&self, token: &str) -> Result<JwtClaims, ApiError> {
        let claims = decode::<JwtClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!("JWT validation failed: {}", e);
                ApiError::unauthorized("Invalid or expired token")
            })?
            .claims;

        if self.revoked.read().await.contains_key(&claims.jti) {
            return Err(ApiError::unauthorized("Token has been revoked"));
        }
        Ok(claims)
    }

    /// Revoke a token for the rest of its lifetime.
    pub async fn revoke(&self, claims: &JwtClaims) {
        let now = now_secs();
        let mut revoked = self.revoked.write().await;
        revoked.retain(|_, exp| *exp > now);
        revoked.insert(claims.jti.clone(), claims.exp);
    }
}

fn now_secs() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Extractor for authenticated users.
///
/// Requires `Authorization: Bearer <token>` and the [`JwtState`] placed in the
/// request extensions by [`jwt_auth`].
#[derive(Debug, Clone)]
pub struct AuthUser(pub JwtClaims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ApiError::unauthorized("Missing authorization"))?
            .to_string();

        let jwt_state = parts
            .extensions
            .get::<Arc<JwtState>>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication is not enabled"))?;

        jwt_state.verify(&token).await.map(AuthUser)
    }
}

/// Optional authentication extractor.
///
/// Yields `None` when no valid token is present or authentication is off.
#[derive(Debug, Clone)]
pub struct OptionalAuthUser(pub Option<JwtClaims>);

impl OptionalAuthUser {
    /// The caller's user id, if authenticated.
    pub fn user_id(&self) -> Option<i64> {
        self.0.as_ref().map(|claims| claims.sub)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for OptionalAuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuthUser(
            AuthUser::from_request_parts(parts, state)
                .await
                .ok()
                .map(|AuthUser(claims)| claims),
        ))
    }
}

/// Middleware function to inject JWT state into request extensions.
pub async fn jwt_auth(
    jwt_state: Arc<JwtState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    request.extensions_mut().insert(jwt_state);
    next.run(request).await
}

/// Route layer that turns away requests without a valid token.
pub async fn require_auth(request: Request<Body>, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();
    if let Err(rejection) = AuthUser::from_request_parts(&mut parts, &()).await {
        return rejection.into_response();
    }
    next.run(Request::from_parts(parts, body)).await
}
