//! Follow-up tasks attached to a contact.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::activity::{ActionType, ActivityEntry};
use crate::core::shared::error::{CrmError, CrmResult};
use crate::core::shared::extract::JsonBody;
use crate::core::shared::models::Task;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{
    deserialize_some, parse_id, parse_optional_datetime, require_text,
};
use crate::core::store::Filter;
use crate::security::{load_authorized, Actor};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub content: Option<String>,
    pub due_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    pub content: Option<String>,
    pub is_completed: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub due_date: Option<Option<String>>,
}

pub async fn list_contact_tasks(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(contact_id): Path<String>,
) -> CrmResult<Json<Vec<Task>>> {
    let contact_id = parse_id(&contact_id, "contact id")?;
    load_authorized(state.store.contacts(), contact_id, "Contact", &actor).await?;

    let mut tasks = state
        .store
        .tasks()
        .find_many(&Filter::for_contact(contact_id))
        .await?;
    tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(tasks))
}

pub async fn create_task(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(contact_id): Path<String>,
    JsonBody(req): JsonBody<CreateTaskRequest>,
) -> CrmResult<(StatusCode, Json<Task>)> {
    let contact_id = parse_id(&contact_id, "contact id")?;
    let content = require_text(req.content, "content")?;
    let due_date = parse_optional_datetime(req.due_date.as_deref(), "dueDate")?;
    let contact = load_authorized(state.store.contacts(), contact_id, "Contact", &actor).await?;

    let mut task = Task::new(actor.user_id, contact.id, content);
    task.due_date = due_date;
    let task = state.store.tasks().insert(task).await?;

    state
        .activity
        .record(
            ActivityEntry::action(actor.user_id, ActionType::CreatedTask, task.id)
                .details(json!({ "content": task.content, "contactName": contact.name })),
        )
        .await;

    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn get_task(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> CrmResult<Json<Task>> {
    let id = parse_id(&id, "task id")?;
    let task = load_authorized(state.store.tasks(), id, "Task", &actor).await?;
    Ok(Json(task))
}

pub async fn update_task(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateTaskRequest>,
) -> CrmResult<Json<Task>> {
    let id = parse_id(&id, "task id")?;
    let before = load_authorized(state.store.tasks(), id, "Task", &actor).await?;

    let mut task = before.clone();
    if req.content.is_some() {
        task.content = require_text(req.content, "content")?;
    }
    if let Some(done) = req.is_completed {
        task.is_completed = done;
    }
    if let Some(due_date) = req.due_date {
        task.due_date = parse_optional_datetime(due_date.as_deref(), "dueDate")?;
    }
    let task = state.store.tasks().update(task).await?;

    let mut details = json!({ "content": task.content });
    if before.is_completed != task.is_completed {
        details["changed"] = json!("isCompleted");
        details["from"] = json!(before.is_completed);
        details["to"] = json!(task.is_completed);
    }
    state
        .activity
        .record(
            ActivityEntry::action(actor.user_id, ActionType::UpdatedTask, task.id)
                .details(details),
        )
        .await;

    Ok(Json(task))
}

pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> CrmResult<Json<Value>> {
    let id = parse_id(&id, "task id")?;
    let task = load_authorized(state.store.tasks(), id, "Task", &actor).await?;

    if !state.store.tasks().delete_by_id(id).await? {
        return Err(CrmError::not_found("Task not found"));
    }

    state
        .activity
        .record(
            ActivityEntry::action(actor.user_id, ActionType::DeletedTask, id)
                .details(json!({ "content": task.content })),
        )
        .await;

    Ok(Json(json!({ "msg": "Task removed", "id": id })))
}

pub fn configure_task_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/tasks/contact/:contact_id",
            get(list_contact_tasks).post(create_task),
        )
        .route(
            "/api/tasks/:id",
            get(get_task).put(update_task).delete(delete_task),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::AppConfig;
    use crate::core::shared::enums::Role;
    use crate::core::shared::models::Contact;
    use crate::core::store::{CrmStore, MemoryStore};

    fn state() -> Arc<AppState> {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = "task-module-test-secret-0123456789abcdef".into();
        Arc::new(AppState::new(config, Arc::new(MemoryStore::new())).unwrap())
    }

    #[test]
    fn test_update_request_distinguishes_null_due_date() {
        let absent: UpdateTaskRequest = serde_json::from_str("{}").unwrap();
        assert!(absent.due_date.is_none());
        let cleared: UpdateTaskRequest = serde_json::from_str(r#"{"dueDate":null}"#).unwrap();
        assert_eq!(cleared.due_date, Some(None));
    }

    #[tokio::test]
    async fn test_tasks_follow_contact_ownership() {
        let state = state();
        let owner = Actor::new(uuid::Uuid::new_v4(), Role::User);
        let stranger = Actor::new(uuid::Uuid::new_v4(), Role::User);
        let contact = state
            .store
            .contacts()
            .insert(Contact::new(owner.user_id, "Jane Doe".into()))
            .await
            .unwrap();

        let (status, Json(task)) = create_task(
            State(Arc::clone(&state)),
            owner,
            Path(contact.id.to_string()),
            JsonBody(CreateTaskRequest {
                content: Some(" Call back ".into()),
                due_date: Some("2026-11-01".into()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(task.content, "Call back");
        assert!(task.due_date.is_some());

        let err = create_task(
            State(Arc::clone(&state)),
            stranger,
            Path(contact.id.to_string()),
            JsonBody(CreateTaskRequest {
                content: Some("Steal lead".into()),
                due_date: None,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CrmError::Forbidden(_)));

        let err = get_task(State(Arc::clone(&state)), stranger, Path(task.id.to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, CrmError::Forbidden(_)));

        let Json(tasks) =
            list_contact_tasks(State(Arc::clone(&state)), owner, Path(contact.id.to_string()))
                .await
                .unwrap();
        assert_eq!(tasks.len(), 1);
    }
}
