//! Scheduled meetings and site visits with a contact.

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
use crate::core::shared::enums::AppointmentStatus;
use crate::core::shared::error::{CrmError, CrmResult};
use crate::core::shared::extract::JsonBody;
use crate::core::shared::models::{Appointment, DEFAULT_APPOINTMENT_MINUTES};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{
    deserialize_some, optional_text, parse_choice, parse_datetime, parse_id, require_text,
};
use crate::core::store::Filter;
use crate::security::{load_authorized, owner_scope, Actor};

/// Accepts a number or a numeric string; null, absent and blank mean unset.
pub fn coerce_duration(raw: &Value) -> CrmResult<Option<i64>> {
    let invalid = || CrmError::validation("durationMinutes must be a whole number");
    match raw {
        Value::Null => Ok(None),
        Value::Number(n) => match n.as_i64() {
            Some(m) => Ok(Some(m)),
            None => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| Some(f as i64))
                .ok_or_else(invalid),
        },
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s.trim().parse::<i64>().map(Some).map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

pub fn validate_duration(minutes: Option<i64>) -> CrmResult<i32> {
    match minutes {
        None => Ok(DEFAULT_APPOINTMENT_MINUTES),
        Some(m) if m > 0 => i32::try_from(m)
            .map_err(|_| CrmError::validation("durationMinutes is too large")),
        Some(_) => Err(CrmError::validation("durationMinutes must be greater than 0")),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentRequest {
    pub contact_id: Option<String>,
    pub title: Option<String>,
    pub appointment_time: Option<String>,
    #[serde(default)]
    pub duration_minutes: Value,
    pub notes: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAppointmentRequest {
    pub title: Option<String>,
    pub appointment_time: Option<String>,
    #[serde(default)]
    pub duration_minutes: Value,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub notes: Option<Option<String>>,
    pub status: Option<String>,
}

pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    JsonBody(req): JsonBody<CreateAppointmentRequest>,
) -> CrmResult<(StatusCode, Json<Appointment>)> {
    let contact_id = require_text(req.contact_id, "contactId")?;
    let contact_id = parse_id(&contact_id, "contactId")?;
    let title = require_text(req.title, "title")?;
    let time = require_text(req.appointment_time, "appointmentTime")?;
    let time = parse_datetime(&time, "appointmentTime")?;
    let duration = validate_duration(coerce_duration(&req.duration_minutes)?)?;
    let status: Option<AppointmentStatus> = parse_choice(req.status, "status")?;

    let contact = load_authorized(state.store.contacts(), contact_id, "Contact", &actor).await?;

    let mut appointment = Appointment::new(actor.user_id, contact.id, title, time);
    appointment.duration_minutes = duration;
    appointment.notes = optional_text(req.notes);
    appointment.status = status.unwrap_or_default();
    let appointment = state.store.appointments().insert(appointment).await?;

    state
        .activity
        .record(
            ActivityEntry::action(actor.user_id, ActionType::CreatedAppointment, appointment.id)
                .details(json!({
                    "contactName": contact.name,
                    "title": appointment.title,
                    "time": appointment.appointment_time,
                })),
        )
        .await;

    Ok((StatusCode::CREATED, Json(appointment)))
}

/// Soonest first.
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> CrmResult<Json<Vec<Appointment>>> {
    let mut appointments = state
        .store
        .appointments()
        .find_many(&Filter::scoped(owner_scope(&actor)))
        .await?;
    appointments.sort_by(|a, b| a.appointment_time.cmp(&b.appointment_time));
    Ok(Json(appointments))
}

/// Contact history, most recent first.
pub async fn list_contact_appointments(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(contact_id): Path<String>,
) -> CrmResult<Json<Vec<Appointment>>> {
    let contact_id = parse_id(&contact_id, "contact id")?;
    load_authorized(state.store.contacts(), contact_id, "Contact", &actor).await?;

    let mut appointments = state
        .store
        .appointments()
        .find_many(&Filter::for_contact(contact_id))
        .await?;
    appointments.sort_by(|a, b| b.appointment_time.cmp(&a.appointment_time));
    Ok(Json(appointments))
}

pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> CrmResult<Json<Appointment>> {
    let id = parse_id(&id, "appointment id")?;
    let appointment = load_authorized(state.store.appointments(), id, "Appointment", &actor).await?;
    Ok(Json(appointment))
}

pub async fn update_appointment(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateAppointmentRequest>,
) -> CrmResult<Json<Appointment>> {
    let id = parse_id(&id, "appointment id")?;
    let before = load_authorized(state.store.appointments(), id, "Appointment", &actor).await?;

    let mut appointment = before.clone();
    if req.title.is_some() {
        appointment.title = require_text(req.title, "title")?;
    }
    if req.appointment_time.is_some() {
        let time = require_text(req.appointment_time, "appointmentTime")?;
        appointment.appointment_time = parse_datetime(&time, "appointmentTime")?;
    }
    if let Some(minutes) = coerce_duration(&req.duration_minutes)? {
        appointment.duration_minutes = validate_duration(Some(minutes))?;
    }
    if let Some(notes) = req.notes {
        appointment.notes = optional_text(notes);
    }
    if let Some(status) = parse_choice::<AppointmentStatus>(req.status, "status")? {
        appointment.status = status;
    }
    let appointment = state.store.appointments().update(appointment).await?;

    let contact_name = contact_display_name(state.store.as_ref(), appointment.contact_id).await;
    let entry = if before.status != appointment.status {
        ActivityEntry::action(
            actor.user_id,
            ActionType::UpdatedAppointmentStatus,
            appointment.id,
        )
        .details(json!({
            "contactName": contact_name,
            "title": appointment.title,
            "changed": "status",
            "from": before.status,
            "to": appointment.status,
        }))
    } else {
        ActivityEntry::action(actor.user_id, ActionType::UpdatedAppointment, appointment.id)
            .details(json!({ "contactName": contact_name, "title": appointment.title }))
    };
    state.activity.record(entry).await;

    Ok(Json(appointment))
}

pub async fn delete_appointment(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> CrmResult<Json<Value>> {
    let id = parse_id(&id, "appointment id")?;
    let appointment = load_authorized(state.store.appointments(), id, "Appointment", &actor).await?;

    if !state.store.appointments().delete_by_id(id).await? {
        return Err(CrmError::not_found("Appointment not found"));
    }

    let contact_name = contact_display_name(state.store.as_ref(), appointment.contact_id).await;
    state
        .activity
        .record(
            ActivityEntry::action(actor.user_id, ActionType::DeletedAppointment, id).details(
                json!({
                    "contactName": contact_name,
                    "title": appointment.title,
                    "time": appointment.appointment_time,
                }),
            ),
        )
        .await;

    Ok(Json(json!({ "msg": "Appointment deleted", "id": id })))
}

pub fn configure_appointment_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/appointments",
            get(list_appointments).post(create_appointment),
        )
        .route(
            "/api/appointments/contact/:contact_id",
            get(list_contact_appointments),
        )
        .route(
            "/api/appointments/:id",
            get(get_appointment)
                .put(update_appointment)
                .delete(delete_appointment),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_defaults_and_bounds() {
        assert_eq!(validate_duration(None).unwrap(), 30);
        assert_eq!(validate_duration(Some(45)).unwrap(), 45);
        assert!(matches!(
            validate_duration(Some(0)),
            Err(CrmError::Validation(_))
        ));
        assert!(validate_duration(Some(-15)).is_err());
        assert!(validate_duration(Some(i64::from(i32::MAX) + 1)).is_err());
    }

    #[test]
    fn test_duration_accepts_numeric_strings() {
        assert_eq!(coerce_duration(&json!(45)).unwrap(), Some(45));
        assert_eq!(coerce_duration(&json!("45")).unwrap(), Some(45));
        assert_eq!(coerce_duration(&json!(" 60 ")).unwrap(), Some(60));
        assert_eq!(coerce_duration(&json!(90.0)).unwrap(), Some(90));
        assert_eq!(coerce_duration(&Value::Null).unwrap(), None);
        assert_eq!(coerce_duration(&json!("")).unwrap(), None);
        assert!(matches!(
            coerce_duration(&json!("an hour")),
            Err(CrmError::Validation(ref m)) if m.contains("durationMinutes")
        ));
        assert!(coerce_duration(&json!(12.5)).is_err());
        assert!(coerce_duration(&json!(true)).is_err());
    }
}
