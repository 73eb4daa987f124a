//! Audit trail of user actions.
//!
//! Every successful mutating request appends exactly one [`Activity`]. The
//! logger is awaited after the mutation, but a failed append is only logged:
//! it never turns a completed change into an error response.

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

use crate::core::shared::error::CrmResult;
use crate::core::shared::models::Activity;
use crate::core::shared::state::AppState;
use crate::core::store::{CrmStore, StoreError};
use crate::security::Actor;

pub const FEED_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    RegisteredUser,
    CreatedContact,
    UpdatedContact,
    DeletedContact,
    CreatedDeal,
    UpdatedDeal,
    UpdatedDealStage,
    DeletedDeal,
    CreatedTask,
    UpdatedTask,
    DeletedTask,
    CreatedAppointment,
    UpdatedAppointment,
    UpdatedAppointmentStatus,
    DeletedAppointment,
    CreatedTeam,
    AddedTeamMember,
    RemovedTeamMember,
    SetTeamLeader,
    UpdatedUserRole,
    DeletedUser,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RegisteredUser => "registered_user",
            Self::CreatedContact => "created_contact",
            Self::UpdatedContact => "updated_contact",
            Self::DeletedContact => "deleted_contact",
            Self::CreatedDeal => "created_deal",
            Self::UpdatedDeal => "updated_deal",
            Self::UpdatedDealStage => "updated_deal_stage",
            Self::DeletedDeal => "deleted_deal",
            Self::CreatedTask => "created_task",
            Self::UpdatedTask => "updated_task",
            Self::DeletedTask => "deleted_task",
            Self::CreatedAppointment => "created_appointment",
            Self::UpdatedAppointment => "updated_appointment",
            Self::UpdatedAppointmentStatus => "updated_appointment_status",
            Self::DeletedAppointment => "deleted_appointment",
            Self::CreatedTeam => "created_team",
            Self::AddedTeamMember => "added_team_member",
            Self::RemovedTeamMember => "removed_team_member",
            Self::SetTeamLeader => "set_team_leader",
            Self::UpdatedUserRole => "updated_user_role",
            Self::DeletedUser => "deleted_user",
        }
    }

    /// Model name stored alongside the related id.
    pub fn related_model(&self) -> &'static str {
        match self {
            Self::RegisteredUser | Self::UpdatedUserRole | Self::DeletedUser => "User",
            Self::CreatedContact | Self::UpdatedContact | Self::DeletedContact => "Contact",
            Self::CreatedDeal | Self::UpdatedDeal | Self::UpdatedDealStage | Self::DeletedDeal => {
                "Deal"
            }
            Self::CreatedTask | Self::UpdatedTask | Self::DeletedTask => "Task",
            Self::CreatedAppointment
            | Self::UpdatedAppointment
            | Self::UpdatedAppointmentStatus
            | Self::DeletedAppointment => "Appointment",
            Self::CreatedTeam
            | Self::AddedTeamMember
            | Self::RemovedTeamMember
            | Self::SetTeamLeader => "Team",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ActionType> for String {
    fn from(action: ActionType) -> Self {
        action.as_str().to_string()
    }
}

#[derive(Debug, Clone)]
pub struct ActivityEntry {
    pub user_id: Uuid,
    pub action_type: String,
    pub related_model: Option<String>,
    pub related_id: Option<Uuid>,
    pub details: Value,
}

impl ActivityEntry {
    pub fn new(user_id: Uuid, action_type: impl Into<String>) -> Self {
        Self {
            user_id,
            action_type: action_type.into(),
            related_model: None,
            related_id: None,
            details: Value::Object(Default::default()),
        }
    }

    /// Entry for a known action, tagged with that action's model.
    pub fn action(user_id: Uuid, action: ActionType, related_id: Uuid) -> Self {
        Self::new(user_id, action).related(action.related_model(), related_id)
    }

    pub fn related(mut self, model: impl Into<String>, id: Uuid) -> Self {
        self.related_model = Some(model.into());
        self.related_id = Some(id);
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Details of a single-field change.
    pub fn change(self, field: &str, from: impl Serialize, to: impl Serialize) -> Self {
        self.details(serde_json::json!({
            "changed": field,
            "from": from,
            "to": to,
        }))
    }
}

#[derive(Clone)]
pub struct ActivityLogger {
    store: Arc<dyn CrmStore>,
}

impl ActivityLogger {
    pub fn new(store: Arc<dyn CrmStore>) -> Self {
        Self { store }
    }

    /// Appends the entry. `Ok(None)` when the entry was rejected as incomplete.
    pub async fn try_record(&self, entry: ActivityEntry) -> Result<Option<Activity>, StoreError> {
        if entry.user_id.is_nil() || entry.action_type.trim().is_empty() {
            warn!(
                "Activity not logged, missing user or action type (user={}, action={:?})",
                entry.user_id, entry.action_type
            );
            return Ok(None);
        }

        let activity = Activity {
            id: Uuid::new_v4(),
            user_id: entry.user_id,
            action_type: entry.action_type.trim().to_string(),
            related_model: entry.related_model,
            related_id: entry.related_id,
            details: entry.details,
            timestamp: Utc::now(),
        };
        self.store.activities().append(activity).await.map(Some)
    }

    /// Never fails; problems are reported through tracing only.
    pub async fn record(&self, entry: ActivityEntry) {
        let action = entry.action_type.clone();
        if let Err(e) = self.try_record(entry).await {
            error!("Failed to log activity {action}: {e}");
        }
    }
}

pub async fn list_activities(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> CrmResult<Json<Vec<Activity>>> {
    let scope = (!actor.is_admin()).then_some(actor.user_id);
    let activities = state
        .store
        .activities()
        .recent(FEED_LIMIT, scope)
        .await?;
    Ok(Json(activities))
}

pub fn configure_activity_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/activities", get(list_activities))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::enums::LeadSource;
    use crate::core::shared::models::{Appointment, Contact, Deal, Task, Team, User};
    use crate::core::store::{ActivityLog, Collection, MemoryStore};
    use async_trait::async_trait;

    fn logger() -> (Arc<MemoryStore>, ActivityLogger) {
        let store = Arc::new(MemoryStore::new());
        let logger = ActivityLogger::new(store.clone());
        (store, logger)
    }

    #[tokio::test]
    async fn test_record_appends_with_server_timestamp() {
        let (store, logger) = logger();
        let user = Uuid::new_v4();
        let contact = Uuid::new_v4();
        let before = Utc::now();

        logger
            .record(
                ActivityEntry::action(user, ActionType::UpdatedContact, contact)
                    .change("leadSource", "Website", "Referral"),
            )
            .await;

        let entries = store.activities().recent(10, None).await.unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.user_id, user);
        assert_eq!(entry.action_type, "updated_contact");
        assert_eq!(entry.related_model.as_deref(), Some("Contact"));
        assert_eq!(entry.related_id, Some(contact));
        assert_eq!(entry.details["changed"], "leadSource");
        assert_eq!(entry.details["from"], "Website");
        assert_eq!(entry.details["to"], "Referral");
        assert!(entry.timestamp >= before);
    }

    #[tokio::test]
    async fn test_incomplete_entries_are_skipped() {
        let (store, logger) = logger();

        let skipped = logger
            .try_record(ActivityEntry::new(Uuid::nil(), ActionType::CreatedDeal))
            .await
            .unwrap();
        assert!(skipped.is_none());

        logger.record(ActivityEntry::new(Uuid::new_v4(), "  ")).await;

        assert!(store.activities().recent(10, None).await.unwrap().is_empty());
    }

    struct BrokenLog;

    #[async_trait]
    impl ActivityLog for BrokenLog {
        async fn append(&self, _activity: Activity) -> Result<Activity, StoreError> {
            Err(StoreError::Unavailable("log offline".into()))
        }

        async fn recent(
            &self,
            _limit: usize,
            _user_id: Option<Uuid>,
        ) -> Result<Vec<Activity>, StoreError> {
            Ok(Vec::new())
        }
    }

    struct BrokenLogStore {
        inner: MemoryStore,
        log: BrokenLog,
    }

    #[async_trait]
    impl CrmStore for BrokenLogStore {
        fn users(&self) -> &dyn Collection<User> {
            self.inner.users()
        }
        fn teams(&self) -> &dyn Collection<Team> {
            self.inner.teams()
        }
        fn contacts(&self) -> &dyn Collection<Contact> {
            self.inner.contacts()
        }
        fn deals(&self) -> &dyn Collection<Deal> {
            self.inner.deals()
        }
        fn tasks(&self) -> &dyn Collection<Task> {
            self.inner.tasks()
        }
        fn appointments(&self) -> &dyn Collection<Appointment> {
            self.inner.appointments()
        }
        fn activities(&self) -> &dyn ActivityLog {
            &self.log
        }
        async fn lead_source_counts(&self) -> Result<Vec<(LeadSource, i64)>, StoreError> {
            self.inner.lead_source_counts().await
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_swallowed() {
        let store = Arc::new(BrokenLogStore {
            inner: MemoryStore::new(),
            log: BrokenLog,
        });
        let logger = ActivityLogger::new(store);
        let entry = ActivityEntry::action(Uuid::new_v4(), ActionType::DeletedDeal, Uuid::new_v4());

        assert!(logger.try_record(entry.clone()).await.is_err());
        // `record` returns normally even though the append failed.
        logger.record(entry).await;
    }

    #[test]
    fn test_action_tags() {
        assert_eq!(ActionType::UpdatedDealStage.as_str(), "updated_deal_stage");
        assert_eq!(
            ActionType::UpdatedAppointmentStatus.to_string(),
            "updated_appointment_status"
        );
        assert_eq!(ActionType::SetTeamLeader.related_model(), "Team");
        assert_eq!(
            serde_json::to_value(ActionType::AddedTeamMember).unwrap(),
            "added_team_member"
        );
    }
}
