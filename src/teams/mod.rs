//! Sales teams. Admin only.
//!
//! A team's member set and each member's `team_id` are two views of the same
//! relation; the operations here update both sides. Writes are sequential,
//! not atomic.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::activity::{ActionType, ActivityEntry};
use crate::core::shared::error::{CrmError, CrmResult};
use crate::core::shared::extract::JsonBody;
use crate::core::shared::models::{Team, User};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{parse_id, require_text};
use crate::core::store::{CrmStore, Filter};
use crate::security::{ensure_admin, Actor};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTeamRequest {
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetLeaderRequest {
    pub user_id: Option<String>,
}

async fn load_team(store: &dyn CrmStore, team_id: Uuid) -> CrmResult<Team> {
    store
        .teams()
        .find_by_id(team_id)
        .await?
        .ok_or_else(|| CrmError::not_found("Team not found"))
}

async fn load_user(store: &dyn CrmStore, user_id: Uuid) -> CrmResult<User> {
    store
        .users()
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| CrmError::not_found("User not found"))
}

/// Removes the user from whatever team they are on, if any.
pub async fn detach_from_team(store: &dyn CrmStore, user: &mut User) -> CrmResult<()> {
    let Some(team_id) = user.team_id.take() else {
        return Ok(());
    };
    if let Some(mut team) = store.teams().find_by_id(team_id).await? {
        if team.remove_member(user.id) {
            store.teams().update(team).await?;
        }
    }
    Ok(())
}

/// Adds the user to the team. A user on another team moves over.
pub async fn add_member(store: &dyn CrmStore, team_id: Uuid, user_id: Uuid) -> CrmResult<Team> {
    let mut team = load_team(store, team_id).await?;
    let mut user = load_user(store, user_id).await?;

    if user.team_id.is_some_and(|current| current != team.id) {
        detach_from_team(store, &mut user).await?;
    }
    let team = if team.add_member(user.id) {
        store.teams().update(team).await?
    } else {
        team
    };
    if user.team_id != Some(team.id) {
        user.team_id = Some(team.id);
        store.users().update(user).await?;
    }
    Ok(team)
}

pub async fn remove_member(
    store: &dyn CrmStore,
    team_id: Uuid,
    user_id: Uuid,
) -> CrmResult<Team> {
    let mut team = load_team(store, team_id).await?;
    let mut user = load_user(store, user_id).await?;

    let team = if team.remove_member(user.id) {
        store.teams().update(team).await?
    } else {
        team
    };
    if user.team_id == Some(team.id) {
        user.team_id = None;
        store.users().update(user).await?;
    }
    Ok(team)
}

pub async fn set_leader(store: &dyn CrmStore, team_id: Uuid, user_id: Uuid) -> CrmResult<Team> {
    let mut team = load_team(store, team_id).await?;
    let user = load_user(store, user_id).await?;
    if !team.has_member(user.id) {
        return Err(CrmError::validation("Team leader must be a member of the team"));
    }
    team.leader_id = Some(user.id);
    Ok(store.teams().update(team).await?)
}

pub async fn create_team(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    JsonBody(req): JsonBody<CreateTeamRequest>,
) -> CrmResult<(StatusCode, Json<Team>)> {
    ensure_admin(&actor)?;
    let name = require_text(req.name, "name")?;

    if state
        .store
        .teams()
        .find_one(&Filter::by_key(name.clone()))
        .await?
        .is_some()
    {
        return Err(CrmError::Conflict(
            "Team with this name already exists".into(),
        ));
    }
    let team = state.store.teams().insert(Team::new(name)).await?;
    info!("Team {} created by {}", team.name, actor.user_id);

    state
        .activity
        .record(
            ActivityEntry::action(actor.user_id, ActionType::CreatedTeam, team.id)
                .details(json!({ "name": team.name })),
        )
        .await;

    Ok((StatusCode::CREATED, Json(team)))
}

pub async fn list_teams(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> CrmResult<Json<Vec<Team>>> {
    ensure_admin(&actor)?;
    let mut teams = state.store.teams().find_many(&Filter::all()).await?;
    teams.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Json(teams))
}

pub async fn put_team_member(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path((team_id, user_id)): Path<(String, String)>,
) -> CrmResult<Json<Vec<Uuid>>> {
    ensure_admin(&actor)?;
    let team_id = parse_id(&team_id, "team id")?;
    let user_id = parse_id(&user_id, "user id")?;

    let team = add_member(state.store.as_ref(), team_id, user_id).await?;

    state
        .activity
        .record(
            ActivityEntry::action(actor.user_id, ActionType::AddedTeamMember, team.id)
                .details(json!({ "team": team.name, "userId": user_id })),
        )
        .await;

    Ok(Json(team.members))
}

pub async fn delete_team_member(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path((team_id, user_id)): Path<(String, String)>,
) -> CrmResult<Json<Vec<Uuid>>> {
    ensure_admin(&actor)?;
    let team_id = parse_id(&team_id, "team id")?;
    let user_id = parse_id(&user_id, "user id")?;

    let team = remove_member(state.store.as_ref(), team_id, user_id).await?;

    state
        .activity
        .record(
            ActivityEntry::action(actor.user_id, ActionType::RemovedTeamMember, team.id)
                .details(json!({ "team": team.name, "userId": user_id })),
        )
        .await;

    Ok(Json(team.members))
}

pub async fn put_team_leader(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(team_id): Path<String>,
    JsonBody(req): JsonBody<SetLeaderRequest>,
) -> CrmResult<Json<Team>> {
    ensure_admin(&actor)?;
    let team_id = parse_id(&team_id, "team id")?;
    let user_id = require_text(req.user_id, "userId")?;
    let user_id = parse_id(&user_id, "userId")?;

    let before = load_team(state.store.as_ref(), team_id).await?;
    let team = set_leader(state.store.as_ref(), team_id, user_id).await?;

    state
        .activity
        .record(
            ActivityEntry::action(actor.user_id, ActionType::SetTeamLeader, team.id).change(
                "leader",
                before.leader_id,
                team.leader_id,
            ),
        )
        .await;

    Ok(Json(team))
}

pub fn configure_team_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/teams", get(list_teams).post(create_team))
        .route(
            "/api/teams/:team_id/members/:user_id",
            put(put_team_member).delete(delete_team_member),
        )
        .route("/api/teams/:team_id/leader", put(put_team_leader))
}
