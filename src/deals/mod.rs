//! Sales pipeline: deals attached to a contact.

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
use crate::contacts::contact_display_name;
use crate::core::shared::enums::DealStage;
use crate::core::shared::error::{CrmError, CrmResult};
use crate::core::shared::extract::JsonBody;
use crate::core::shared::models::Deal;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{
    deserialize_some, parse_choice, parse_id, parse_optional_datetime, require_text,
};
use crate::core::store::Filter;
use crate::security::{load_authorized, owner_scope, Actor};

/// Normalizes a client-supplied deal value.
///
/// Numbers pass through, numeric strings are parsed, and null, blank or
/// unparseable input counts as 0. Negative and non-finite amounts are
/// rejected.
pub fn coerce_deal_value(raw: &Value) -> CrmResult<f64> {
    let value = match raw {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if !value.is_finite() {
        return Err(CrmError::validation("value must be a finite number"));
    }
    if value < 0.0 {
        return Err(CrmError::validation("value cannot be negative"));
    }
    Ok(value)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDealRequest {
    pub contact_id: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub value: Value,
    pub stage: Option<String>,
    pub close_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDealRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub value: Option<Value>,
    pub stage: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub close_date: Option<Option<String>>,
}

pub async fn create_deal(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    JsonBody(req): JsonBody<CreateDealRequest>,
) -> CrmResult<(StatusCode, Json<Deal>)> {
    let contact_id = require_text(req.contact_id, "contactId")?;
    let contact_id = parse_id(&contact_id, "contactId")?;
    let name = require_text(req.name, "name")?;
    let value = coerce_deal_value(&req.value)?;
    let stage: Option<DealStage> = parse_choice(req.stage, "stage")?;
    let close_date = parse_optional_datetime(req.close_date.as_deref(), "closeDate")?;

    let contact = load_authorized(state.store.contacts(), contact_id, "Contact", &actor).await?;

    let mut deal = Deal::new(actor.user_id, contact.id, name);
    deal.value = value;
    deal.stage = stage.unwrap_or_default();
    deal.close_date = close_date;
    let deal = state.store.deals().insert(deal).await?;

    state
        .activity
        .record(
            ActivityEntry::action(actor.user_id, ActionType::CreatedDeal, deal.id).details(
                json!({ "name": deal.name, "contactName": contact.name, "value": deal.value }),
            ),
        )
        .await;

    Ok((StatusCode::CREATED, Json(deal)))
}

pub async fn list_deals(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> CrmResult<Json<Vec<Deal>>> {
    let mut deals = state
        .store
        .deals()
        .find_many(&Filter::scoped(owner_scope(&actor)))
        .await?;
    deals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(deals))
}

pub async fn get_deal(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> CrmResult<Json<Deal>> {
    let id = parse_id(&id, "deal id")?;
    let deal = load_authorized(state.store.deals(), id, "Deal", &actor).await?;
    Ok(Json(deal))
}

pub async fn update_deal(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateDealRequest>,
) -> CrmResult<Json<Deal>> {
    let id = parse_id(&id, "deal id")?;
    let before = load_authorized(state.store.deals(), id, "Deal", &actor).await?;

    let mut deal = before.clone();
    if req.name.is_some() {
        deal.name = require_text(req.name, "name")?;
    }
    if let Some(value) = req.value {
        deal.value = coerce_deal_value(&value)?;
    }
    if let Some(stage) = parse_choice::<DealStage>(req.stage, "stage")? {
        deal.stage = stage;
    }
    if let Some(close_date) = req.close_date {
        deal.close_date = parse_optional_datetime(close_date.as_deref(), "closeDate")?;
    }

    let deal = state.store.deals().update(deal).await?;

    let contact_name = contact_display_name(state.store.as_ref(), deal.contact_id).await;
    let entry = if before.stage != deal.stage {
        ActivityEntry::action(actor.user_id, ActionType::UpdatedDealStage, deal.id).details(json!({
            "name": deal.name,
            "contactName": contact_name,
            "changed": "stage",
            "from": before.stage,
            "to": deal.stage,
        }))
    } else {
        ActivityEntry::action(actor.user_id, ActionType::UpdatedDeal, deal.id)
            .details(json!({ "name": deal.name, "contactName": contact_name }))
    };
    state.activity.record(entry).await;

    Ok(Json(deal))
}

pub async fn delete_deal(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> CrmResult<Json<Value>> {
    let id = parse_id(&id, "deal id")?;
    let deal = load_authorized(state.store.deals(), id, "Deal", &actor).await?;

    if !state.store.deals().delete_by_id(id).await? {
        return Err(CrmError::not_found("Deal not found"));
    }

    let contact_name = contact_display_name(state.store.as_ref(), deal.contact_id).await;
    state
        .activity
        .record(
            ActivityEntry::action(actor.user_id, ActionType::DeletedDeal, id)
                .details(json!({ "name": deal.name, "contactName": contact_name })),
        )
        .await;

    Ok(Json(json!({ "msg": "Deal removed", "id": id })))
}

pub fn configure_deal_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/deals", get(list_deals).post(create_deal))
        .route(
            "/api/deals/:id",
            get(get_deal).put(update_deal).delete(delete_deal),
        )
}
