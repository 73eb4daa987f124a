//! User administration. Admin only.

use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::activity::{ActionType, ActivityEntry};
use crate::core::shared::enums::Role;
use crate::core::shared::error::{CrmError, CrmResult};
use crate::core::shared::extract::JsonBody;
use crate::core::shared::models::User;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{parse_choice, parse_id};
use crate::core::store::Filter;
use crate::security::policy::{guard_role_change, guard_self_delete};
use crate::security::{ensure_admin, Actor};
use crate::teams::detach_from_team;

#[derive(Debug, Default, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: Option<String>,
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> CrmResult<Json<Vec<User>>> {
    ensure_admin(&actor)?;
    let mut users = state.store.users().find_many(&Filter::all()).await?;
    users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Ok(Json(users))
}

pub async fn update_user_role(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateRoleRequest>,
) -> CrmResult<Json<User>> {
    ensure_admin(&actor)?;
    let id = parse_id(&id, "user id")?;
    let role: Role = parse_choice(req.role, "role")?
        .ok_or_else(|| CrmError::validation("role is required"))?;

    let mut user = state
        .store
        .users()
        .find_by_id(id)
        .await?
        .ok_or_else(|| CrmError::not_found("User not found"))?;
    guard_role_change(&actor, user.id, role)?;

    let previous = user.role;
    user.role = role;
    let user = state.store.users().update(user).await?;
    info!("User {} role changed {previous} -> {}", user.id, user.role);

    state
        .activity
        .record(
            ActivityEntry::action(actor.user_id, ActionType::UpdatedUserRole, user.id)
                .change("role", previous, user.role),
        )
        .await;

    Ok(Json(user))
}

/// Owned contacts, deals, tasks and appointments are left in place.
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> CrmResult<Json<Value>> {
    ensure_admin(&actor)?;
    let id = parse_id(&id, "user id")?;

    let mut user = state
        .store
        .users()
        .find_by_id(id)
        .await?
        .ok_or_else(|| CrmError::not_found("User not found"))?;
    guard_self_delete(&actor, user.id)?;

    detach_from_team(state.store.as_ref(), &mut user).await?;
    if !state.store.users().delete_by_id(user.id).await? {
        return Err(CrmError::not_found("User not found"));
    }
    info!("User {} deleted by {}", user.id, actor.user_id);

    state
        .activity
        .record(
            ActivityEntry::action(actor.user_id, ActionType::DeletedUser, user.id)
                .details(json!({ "name": user.name, "email": user.email })),
        )
        .await;

    Ok(Json(json!({ "msg": "User deleted", "id": user.id })))
}

pub fn configure_admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/admin/users", get(list_users))
        .route(
            "/api/admin/users/:id",
            put(update_user_role).delete(delete_user),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::AppConfig;
    use crate::core::shared::models::{Contact, Team};
    use crate::core::store::{CrmStore, MemoryStore};
    use crate::teams::add_member;

    fn state() -> Arc<AppState> {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = "admin-module-test-secret-0123456789abcdef".into();
        Arc::new(AppState::new(config, Arc::new(MemoryStore::new())).unwrap())
    }

    async fn seed_user(state: &AppState, email: &str, role: Role) -> User {
        let mut user = User::new("Someone".into(), email.into(), "h".into());
        user.role = role;
        state.store.users().insert(user).await.unwrap()
    }

    #[tokio::test]
    async fn test_role_change_requires_known_role() {
        let state = state();
        let admin = seed_user(&state, "root@example.com", Role::Admin).await;
        let target = seed_user(&state, "agent@example.com", Role::User).await;
        let actor = Actor::new(admin.id, Role::Admin);

        let err = update_user_role(
            State(Arc::clone(&state)),
            actor,
            Path(target.id.to_string()),
            JsonBody(UpdateRoleRequest {
                role: Some("owner".into()),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CrmError::Validation(_)));

        let Json(updated) = update_user_role(
            State(Arc::clone(&state)),
            actor,
            Path(target.id.to_string()),
            JsonBody(UpdateRoleRequest {
                role: Some("Admin".into()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(updated.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_delete_user_detaches_team_and_keeps_records() {
        let state = state();
        let admin = seed_user(&state, "root@example.com", Role::Admin).await;
        let agent = seed_user(&state, "agent@example.com", Role::User).await;
        let team = state
            .store
            .teams()
            .insert(Team::new("North".into()))
            .await
            .unwrap();
        add_member(state.store.as_ref(), team.id, agent.id).await.unwrap();
        let contact = state
            .store
            .contacts()
            .insert(Contact::new(agent.id, "Kept lead".into()))
            .await
            .unwrap();

        let actor = Actor::new(admin.id, Role::Admin);
        delete_user(State(Arc::clone(&state)), actor, Path(agent.id.to_string()))
            .await
            .unwrap();

        assert!(state.store.users().find_by_id(agent.id).await.unwrap().is_none());
        let team = state.store.teams().find_by_id(team.id).await.unwrap().unwrap();
        assert!(team.members.is_empty());
        assert!(state
            .store
            .contacts()
            .find_by_id(contact.id)
            .await
            .unwrap()
            .is_some());

        let err = delete_user(State(Arc::clone(&state)), actor, Path(admin.id.to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, CrmError::Forbidden(_)));
    }
}
