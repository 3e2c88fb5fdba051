//! Authentication middleware
//!
//! Verifies the bearer token on protected routes and turns its claims into
//! the [`Actor`] the services check capabilities against. Tokens are issued
//! elsewhere; this layer only verifies them.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use shared::{Actor, Role};

use crate::error::AppError;

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    /// Claims for `actor`, valid for `ttl_secs` from now
    pub fn new(actor: &Actor, ttl_secs: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: actor.user_id.to_string(),
            role: actor.role.as_str().to_string(),
            exp: now + ttl_secs,
            iat: now,
        }
    }

    fn into_actor(self) -> Result<Actor, AppError> {
        let user_id = self
            .sub
            .parse::<i64>()
            .map_err(|_| AppError::Unauthorized("Invalid user ID in token".to_string()))?;
        let role = self
            .role
            .parse::<Role>()
            .map_err(|_| AppError::Unauthorized("Invalid role in token".to_string()))?;
        Ok(Actor::new(user_id, role))
    }
}

/// Verifies HS256 bearer tokens against the configured secret
#[derive(Clone)]
pub struct TokenVerifier {
    key: Arc<DecodingKey>,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Actor, AppError> {
        decode::<Claims>(token, &self.key, &Validation::default())
            .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?
            .claims
            .into_actor()
    }
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(
    State(verifier): State<TokenVerifier>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    let Some(token) = token else {
        return AppError::Unauthorized("Missing or invalid Authorization header".to_string())
            .into_response();
    };

    match verifier.verify(token) {
        Ok(actor) => {
            request.extensions_mut().insert(actor);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

/// Extractor for the authenticated actor
#[derive(Clone, Debug)]
pub struct CurrentUser(pub Actor);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Actor>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}
