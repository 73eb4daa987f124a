use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::jwt::extract_bearer_token;
use crate::core::shared::enums::Role;
use crate::core::shared::error::CrmError;
use crate::core::shared::state::AppState;

pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";

/// The authenticated caller, resolved from the request token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// `x-auth-token` wins over `Authorization: Bearer` when both are sent.
pub fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    if let Some(token) = headers
        .get(AUTH_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        return Some(token);
    }
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(extract_bearer_token)
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Actor {
    type Rejection = CrmError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers)
            .ok_or_else(|| CrmError::Unauthenticated("No token, authorization denied".into()))?;

        let claims = state.jwt.validate(token).map_err(|e| {
            debug!("Rejected token: {e}");
            CrmError::Unauthenticated("Token is not valid".into())
        })?;
        let user_id = claims
            .user_id()
            .map_err(|_| CrmError::Unauthenticated("Token is not valid".into()))?;

        Ok(Actor::new(user_id, claims.role))
    }
}
