//! CRM records as they are persisted and returned over the API.
//!
//! Constructors resolve every enum default, so a record that exists is always
//! fully classified.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::core::shared::enums::{
    AppointmentStatus, DealStage, LeadSource, LeadStage, Role, UnitType,
};
use crate::core::shared::schema::{
    crm_activities, crm_appointments, crm_contacts, crm_deals, crm_tasks, crm_teams, crm_users,
};

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = crm_users)]
#[diesel(treat_none_as_null = true)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub team_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: String, email: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash,
            role: Role::default(),
            team_id: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = crm_teams)]
#[diesel(treat_none_as_null = true)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    pub members: Vec<Uuid>,
    pub leader_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Team {
    pub fn new(name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            members: Vec::new(),
            leader_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn has_member(&self, user_id: Uuid) -> bool {
        self.members.contains(&user_id)
    }

    /// Returns false when the user was already a member.
    pub fn add_member(&mut self, user_id: Uuid) -> bool {
        if self.has_member(user_id) {
            return false;
        }
        self.members.push(user_id);
        true
    }

    /// Also clears the leader slot when the leader leaves.
    pub fn remove_member(&mut self, user_id: Uuid) -> bool {
        let before = self.members.len();
        self.members.retain(|m| *m != user_id);
        if self.leader_id == Some(user_id) {
            self.leader_id = None;
        }
        self.members.len() != before
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = crm_contacts)]
#[diesel(treat_none_as_null = true)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub lead_stage: LeadStage,
    pub unit_type: UnitType,
    pub project_suggestion: Option<String>,
    pub remark: Option<String>,
    pub team_lead_id: Option<Uuid>,
    pub lead_source: LeadSource,
    pub created_at: DateTime<Utc>,
}

impl Contact {
    pub fn new(owner_id: Uuid, name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            name,
            email: None,
            phone: None,
            company: None,
            lead_stage: LeadStage::default(),
            unit_type: UnitType::default(),
            project_suggestion: None,
            remark: None,
            team_lead_id: None,
            lead_source: LeadSource::default(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = crm_deals)]
#[diesel(treat_none_as_null = true)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub contact_id: Uuid,
    pub name: String,
    pub value: f64,
    pub stage: DealStage,
    pub close_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Deal {
    pub fn new(owner_id: Uuid, contact_id: Uuid, name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            contact_id,
            name,
            value: 0.0,
            stage: DealStage::default(),
            close_date: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = crm_tasks)]
#[diesel(treat_none_as_null = true)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub contact_id: Uuid,
    pub content: String,
    pub is_completed: bool,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(owner_id: Uuid, contact_id: Uuid, content: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            contact_id,
            content,
            is_completed: false,
            due_date: None,
            created_at: Utc::now(),
        }
    }
}

pub const DEFAULT_APPOINTMENT_MINUTES: i32 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = crm_appointments)]
#[diesel(treat_none_as_null = true)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub contact_id: Uuid,
    pub title: String,
    pub appointment_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    pub fn new(
        owner_id: Uuid,
        contact_id: Uuid,
        title: String,
        appointment_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            contact_id,
            title,
            appointment_time,
            duration_minutes: DEFAULT_APPOINTMENT_MINUTES,
            notes: None,
            status: AppointmentStatus::default(),
            created_at: Utc::now(),
        }
    }
}

/// One audit entry. There is no changeset for this type on purpose: the log
/// only ever grows.
#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = crm_activities)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub action_type: String,
    pub related_model: Option<String>,
    pub related_id: Option<Uuid>,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_resolve_enum_defaults() {
        let owner = Uuid::new_v4();
        let contact = Contact::new(owner, "Jane Doe".into());
        assert_eq!(contact.lead_source, LeadSource::Other);
        assert_eq!(contact.unit_type, UnitType::Other);
        assert_eq!(contact.lead_stage, LeadStage::New);

        let deal = Deal::new(owner, contact.id, "Plot 12".into());
        assert_eq!(deal.stage, DealStage::Lead);
        assert_eq!(deal.value, 0.0);

        let appt = Appointment::new(owner, contact.id, "Site visit".into(), Utc::now());
        assert_eq!(appt.duration_minutes, 30);
        assert_eq!(appt.status, AppointmentStatus::Scheduled);
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let user = User::new("A".into(), "a@example.com".into(), "$argon2id$secret".into());
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["role"], "user");
    }

    #[test]
    fn test_team_membership_is_a_set() {
        let mut team = Team::new("North".into());
        let user = Uuid::new_v4();
        assert!(team.add_member(user));
        assert!(!team.add_member(user));
        assert_eq!(team.members.len(), 1);

        team.leader_id = Some(user);
        assert!(team.remove_member(user));
        assert!(team.members.is_empty());
        assert_eq!(team.leader_id, None);
    }
}
