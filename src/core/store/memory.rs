use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ActivityLog, Collection, CrmStore, Filter, Record, StoreError};
use crate::core::shared::enums::LeadSource;
use crate::core::shared::models::{Activity, Appointment, Contact, Deal, Task, Team, User};

/// Process-local collection. Used when no database is configured and by tests.
pub struct MemoryCollection<T> {
    rows: RwLock<HashMap<Uuid, T>>,
}

impl<T> Default for MemoryCollection<T> {
    fn default() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }
}

fn key_taken<T: Record>(rows: &HashMap<Uuid, T>, candidate: &T) -> bool {
    let Some(key) = candidate.lookup_key() else {
        return false;
    };
    rows.values()
        .any(|row| row.id() != candidate.id() && row.lookup_key() == Some(key))
}

#[async_trait]
impl<T: Record> Collection<T> for MemoryCollection<T> {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<T>, StoreError> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn find_many(&self, filter: &Filter) -> Result<Vec<T>, StoreError> {
        filter.check::<T>()?;
        let rows = self.rows.read().await;
        Ok(rows.values().filter(|r| r.matches(filter)).cloned().collect())
    }

    async fn insert(&self, record: T) -> Result<T, StoreError> {
        let mut rows = self.rows.write().await;
        if rows.contains_key(&record.id()) {
            return Err(StoreError::Duplicate(format!("{} id", T::COLLECTION)));
        }
        if key_taken(&rows, &record) {
            return Err(StoreError::Duplicate(format!("{} key", T::COLLECTION)));
        }
        rows.insert(record.id(), record.clone());
        Ok(record)
    }

    async fn update(&self, record: T) -> Result<T, StoreError> {
        let mut rows = self.rows.write().await;
        if !rows.contains_key(&record.id()) {
            return Err(StoreError::Missing);
        }
        if key_taken(&rows, &record) {
            return Err(StoreError::Duplicate(format!("{} key", T::COLLECTION)));
        }
        rows.insert(record.id(), record.clone());
        Ok(record)
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.rows.write().await.remove(&id).is_some())
    }

    async fn delete_many(&self, filter: &Filter) -> Result<u64, StoreError> {
        filter.check::<T>()?;
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|_, row| !row.matches(filter));
        Ok((before - rows.len()) as u64)
    }
}

#[derive(Default)]
pub struct MemoryActivityLog {
    entries: RwLock<Vec<Activity>>,
}

#[async_trait]
impl ActivityLog for MemoryActivityLog {
    async fn append(&self, activity: Activity) -> Result<Activity, StoreError> {
        self.entries.write().await.push(activity.clone());
        Ok(activity)
    }

    async fn recent(
        &self,
        limit: usize,
        user_id: Option<Uuid>,
    ) -> Result<Vec<Activity>, StoreError> {
        let entries = self.entries.read().await;
        let mut matching: Vec<Activity> = entries
            .iter()
            .filter(|a| user_id.map_or(true, |u| a.user_id == u))
            .cloned()
            .collect();
        // Appends arrive in time order; a stable sort keeps insertion order on ties.
        matching.reverse();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matching.truncate(limit);
        Ok(matching)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    users: MemoryCollection<User>,
    teams: MemoryCollection<Team>,
    contacts: MemoryCollection<Contact>,
    deals: MemoryCollection<Deal>,
    tasks: MemoryCollection<Task>,
    appointments: MemoryCollection<Appointment>,
    activities: MemoryActivityLog,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CrmStore for MemoryStore {
    fn users(&self) -> &dyn Collection<User> {
        &self.users
    }

    fn teams(&self) -> &dyn Collection<Team> {
        &self.teams
    }

    fn contacts(&self) -> &dyn Collection<Contact> {
        &self.contacts
    }

    fn deals(&self) -> &dyn Collection<Deal> {
        &self.deals
    }

    fn tasks(&self) -> &dyn Collection<Task> {
        &self.tasks
    }

    fn appointments(&self) -> &dyn Collection<Appointment> {
        &self.appointments
    }

    fn activities(&self) -> &dyn ActivityLog {
        &self.activities
    }

    async fn lead_source_counts(&self) -> Result<Vec<(LeadSource, i64)>, StoreError> {
        let rows = self.contacts.rows.read().await;
        let mut counts: HashMap<LeadSource, i64> = HashMap::new();
        for contact in rows.values() {
            *counts.entry(contact.lead_source).or_insert(0) += 1;
        }
        Ok(counts.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::enums::DealStage;

    #[tokio::test]
    async fn test_unique_key_enforced_on_insert_and_update() {
        let store = MemoryStore::new();
        let a = User::new("A".into(), "a@example.com".into(), "h".into());
        let mut b = User::new("B".into(), "b@example.com".into(), "h".into());
        store.users().insert(a).await.unwrap();
        store.users().insert(b.clone()).await.unwrap();

        let dup = User::new("A2".into(), "a@example.com".into(), "h".into());
        assert!(matches!(
            store.users().insert(dup).await,
            Err(StoreError::Duplicate(_))
        ));

        b.email = "a@example.com".into();
        assert!(matches!(
            store.users().update(b).await,
            Err(StoreError::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn test_update_of_missing_record_fails() {
        let store = MemoryStore::new();
        let contact = Contact::new(Uuid::new_v4(), "Ghost".into());
        assert!(matches!(
            store.contacts().update(contact).await,
            Err(StoreError::Missing)
        ));
    }

    #[tokio::test]
    async fn test_delete_many_only_touches_matching_rows() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let keep = Contact::new(owner, "Keep".into());
        let gone = Contact::new(owner, "Gone".into());

        for contact in [&keep, &gone] {
            store.contacts().insert(contact.clone()).await.unwrap();
        }
        let mut kept_deal = Deal::new(owner, keep.id, "Villa".into());
        kept_deal.stage = DealStage::Proposal;
        store.deals().insert(kept_deal.clone()).await.unwrap();
        store
            .deals()
            .insert(Deal::new(owner, gone.id, "Plot".into()))
            .await
            .unwrap();

        let removed = store
            .deals()
            .delete_many(&Filter::for_contact(gone.id))
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let left = store.deals().find_many(&Filter::all()).await.unwrap();
        assert_eq!(left, vec![kept_deal]);
    }

    #[tokio::test]
    async fn test_default_cascade_removes_dependents_then_contact() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let contact = Contact::new(owner, "Jane Doe".into());
        store.contacts().insert(contact.clone()).await.unwrap();
        store
            .deals()
            .insert(Deal::new(owner, contact.id, "Plot 12".into()))
            .await
            .unwrap();
        store
            .tasks()
            .insert(Task::new(owner, contact.id, "Call back".into()))
            .await
            .unwrap();

        let counts = store.delete_contact_graph(contact.id).await.unwrap();
        assert_eq!(counts.deals, 1);
        assert_eq!(counts.tasks, 1);
        assert_eq!(counts.appointments, 0);
        assert!(counts.contact_removed);
        assert!(store.contacts().find_by_id(contact.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lead_source_counts_group_contacts() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        for source in [LeadSource::Referral, LeadSource::Referral, LeadSource::Website] {
            let mut contact = Contact::new(owner, "Lead".into());
            contact.lead_source = source;
            store.contacts().insert(contact).await.unwrap();
        }
        store
            .contacts()
            .insert(Contact::new(owner, "No source".into()))
            .await
            .unwrap();

        let mut counts = store.lead_source_counts().await.unwrap();
        counts.sort_by_key(|(source, _)| *source as i16);
        assert_eq!(
            counts,
            vec![
                (LeadSource::Website, 1),
                (LeadSource::Referral, 2),
                (LeadSource::Other, 1)
            ]
        );
    }
}
