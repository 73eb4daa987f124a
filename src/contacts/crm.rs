use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use super::cascade::{delete_contact_cascade, DeletionSummary};
use crate::activity::{ActionType, ActivityEntry};
use crate::core::shared::enums::{LeadSource, LeadStage, UnitType};
use crate::core::shared::error::{CrmError, CrmResult};
use crate::core::shared::extract::JsonBody;
use crate::core::shared::models::Contact;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{
    deserialize_some, optional_text, parse_choice, parse_id, require_text,
};
use crate::core::store::{CrmStore, Filter};
use crate::security::{load_authorized, owner_scope, Actor};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContactRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub lead_stage: Option<String>,
    pub unit_type: Option<String>,
    pub project_suggestion: Option<String>,
    pub remark: Option<String>,
    pub team_lead: Option<String>,
    pub lead_source: Option<String>,
}

/// Absent fields are left alone; `teamLead: null` clears the team lead.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContactRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub lead_stage: Option<String>,
    pub unit_type: Option<String>,
    pub project_suggestion: Option<String>,
    pub remark: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub team_lead: Option<Option<String>>,
    pub lead_source: Option<String>,
}

async fn resolve_team_lead(store: &dyn CrmStore, raw: Option<String>) -> CrmResult<Option<Uuid>> {
    let Some(raw) = optional_text(raw) else {
        return Ok(None);
    };
    let id = parse_id(&raw, "teamLead")?;
    if store.users().find_by_id(id).await?.is_none() {
        return Err(CrmError::validation("teamLead does not reference an existing user"));
    }
    Ok(Some(id))
}

/// Name shown in activity details; a missing contact reads as "N/A".
pub async fn contact_display_name(store: &dyn CrmStore, contact_id: Uuid) -> String {
    match store.contacts().find_by_id(contact_id).await {
        Ok(Some(contact)) => contact.name,
        _ => "N/A".to_string(),
    }
}

pub async fn create_contact(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    JsonBody(req): JsonBody<CreateContactRequest>,
) -> CrmResult<(StatusCode, Json<Contact>)> {
    let name = require_text(req.name, "name")?;
    let lead_stage: Option<LeadStage> = parse_choice(req.lead_stage, "leadStage")?;
    let unit_type: Option<UnitType> = parse_choice(req.unit_type, "unitType")?;
    let lead_source: Option<LeadSource> = parse_choice(req.lead_source, "leadSource")?;
    let team_lead_id = resolve_team_lead(state.store.as_ref(), req.team_lead).await?;

    let mut contact = Contact::new(actor.user_id, name);
    contact.email = optional_text(req.email);
    contact.phone = optional_text(req.phone);
    contact.company = optional_text(req.company);
    contact.lead_stage = lead_stage.unwrap_or_default();
    contact.unit_type = unit_type.unwrap_or_default();
    contact.project_suggestion = optional_text(req.project_suggestion);
    contact.remark = optional_text(req.remark);
    contact.team_lead_id = team_lead_id;
    contact.lead_source = lead_source.unwrap_or_default();

    let contact = state.store.contacts().insert(contact).await?;

    state
        .activity
        .record(
            ActivityEntry::action(actor.user_id, ActionType::CreatedContact, contact.id).details(
                json!({ "name": contact.name, "source": contact.lead_source }),
            ),
        )
        .await;

    Ok((StatusCode::CREATED, Json(contact)))
}

pub async fn list_contacts(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> CrmResult<Json<Vec<Contact>>> {
    let mut contacts = state
        .store
        .contacts()
        .find_many(&Filter::scoped(owner_scope(&actor)))
        .await?;
    contacts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(contacts))
}

pub async fn get_contact(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> CrmResult<Json<Contact>> {
    let id = parse_id(&id, "contact id")?;
    let contact = load_authorized(state.store.contacts(), id, "Contact", &actor).await?;
    Ok(Json(contact))
}

pub async fn update_contact(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateContactRequest>,
) -> CrmResult<Json<Contact>> {
    let id = parse_id(&id, "contact id")?;
    let before = load_authorized(state.store.contacts(), id, "Contact", &actor).await?;

    let mut contact = before.clone();
    if req.name.is_some() {
        contact.name = require_text(req.name, "name")?;
    }
    if let Some(email) = req.email {
        contact.email = optional_text(Some(email));
    }
    if let Some(phone) = req.phone {
        contact.phone = optional_text(Some(phone));
    }
    if let Some(company) = req.company {
        contact.company = optional_text(Some(company));
    }
    if let Some(stage) = parse_choice::<LeadStage>(req.lead_stage, "leadStage")? {
        contact.lead_stage = stage;
    }
    if let Some(unit_type) = parse_choice::<UnitType>(req.unit_type, "unitType")? {
        contact.unit_type = unit_type;
    }
    if let Some(suggestion) = req.project_suggestion {
        contact.project_suggestion = optional_text(Some(suggestion));
    }
    if let Some(remark) = req.remark {
        contact.remark = optional_text(Some(remark));
    }
    if let Some(team_lead) = req.team_lead {
        contact.team_lead_id = resolve_team_lead(state.store.as_ref(), team_lead).await?;
    }
    if let Some(source) = parse_choice::<LeadSource>(req.lead_source, "leadSource")? {
        contact.lead_source = source;
    }

    let contact = state.store.contacts().update(contact).await?;

    let mut details = json!({ "name": contact.name });
    if before.lead_source != contact.lead_source {
        details["changed"] = json!("leadSource");
        details["from"] = json!(before.lead_source);
        details["to"] = json!(contact.lead_source);
    } else if before.name != contact.name {
        details["changed"] = json!("name");
        details["from"] = json!(before.name);
        details["to"] = json!(contact.name);
    } else if before.lead_stage != contact.lead_stage {
        details["changed"] = json!("leadStage");
        details["from"] = json!(before.lead_stage);
        details["to"] = json!(contact.lead_stage);
    }
    state
        .activity
        .record(
            ActivityEntry::action(actor.user_id, ActionType::UpdatedContact, contact.id)
                .details(details),
        )
        .await;

    Ok(Json(contact))
}

pub async fn delete_contact(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> CrmResult<Json<DeletionSummary>> {
    let id = parse_id(&id, "contact id")?;
    load_authorized(state.store.contacts(), id, "Contact", &actor).await?;

    let summary = delete_contact_cascade(state.store.as_ref(), id).await?;

    state
        .activity
        .record(
            ActivityEntry::action(actor.user_id, ActionType::DeletedContact, id)
                .details(json!(summary)),
        )
        .await;

    Ok(Json(summary))
}

pub fn configure_contact_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/contacts", get(list_contacts).post(create_contact))
        .route(
            "/api/contacts/:id",
            get(get_contact).put(update_contact).delete(delete_contact),
        )
}
