//! Registration, login and the current-user profile.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::activity::{ActionType, ActivityEntry};
use crate::core::shared::error::{CrmError, CrmResult};
use crate::core::shared::extract::JsonBody;
use crate::core::shared::models::User;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{normalize_email, require_text};
use crate::core::store::Filter;
use crate::security::password::{hash_password, validate_password, verify_password};
use crate::security::Actor;

#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token: String,
    pub expires_in: i64,
}

fn issue_token(state: &AppState, user: &User) -> CrmResult<Json<TokenResponse>> {
    let token = state
        .jwt
        .issue(user.id, user.role)
        .map_err(CrmError::internal)?;
    Ok(Json(TokenResponse {
        token,
        expires_in: state.jwt.expires_in_seconds(),
    }))
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> CrmResult<Json<TokenResponse>> {
    let name = require_text(req.name, "name")?;
    let email = normalize_email(&require_text(req.email, "email")?);
    if !email.contains('@') {
        return Err(CrmError::validation("email is not valid"));
    }
    let password = req
        .password
        .ok_or_else(|| CrmError::validation("password is required"))?;
    validate_password(&password)?;

    if state
        .store
        .users()
        .find_one(&Filter::by_key(email.clone()))
        .await?
        .is_some()
    {
        return Err(CrmError::Conflict("User already exists".into()));
    }

    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(CrmError::internal)?
        .map_err(CrmError::internal)?;

    let user = state
        .store
        .users()
        .insert(User::new(name, email, password_hash))
        .await?;
    info!("Registered user {}", user.id);

    state
        .activity
        .record(
            ActivityEntry::action(user.id, ActionType::RegisteredUser, user.id)
                .details(json!({ "name": user.name, "email": user.email })),
        )
        .await;

    issue_token(&state, &user)
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> CrmResult<Json<TokenResponse>> {
    let invalid = || CrmError::Unauthenticated("Invalid credentials".into());

    let email = normalize_email(&require_text(req.email, "email")?);
    let password = req
        .password
        .ok_or_else(|| CrmError::validation("password is required"))?;

    let user = state
        .store
        .users()
        .find_one(&Filter::by_key(email))
        .await?
        .ok_or_else(invalid)?;

    let hash = user.password_hash.clone();
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(CrmError::internal)?
        .map_err(CrmError::internal)?;
    if !matches {
        warn!("Failed login for user {}", user.id);
        return Err(invalid());
    }

    issue_token(&state, &user)
}

pub async fn current_user(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> CrmResult<Json<User>> {
    let user = state
        .store
        .users()
        .find_by_id(actor.user_id)
        .await?
        .ok_or_else(|| CrmError::not_found("User not found"))?;
    Ok(Json(user))
}

pub fn configure_auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth", get(current_user))
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
}
