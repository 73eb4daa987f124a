use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::core::shared::error::{CrmError, CrmResult};
use crate::core::store::CrmStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionSummary {
    pub contact_id: Uuid,
    pub contact_name: String,
    pub deals_removed: u64,
    pub tasks_removed: u64,
    pub appointments_removed: u64,
}

/// Deletes a contact with its deals, tasks and appointments.
///
/// The caller has already authorized the actor on this contact.
pub async fn delete_contact_cascade(
    store: &dyn CrmStore,
    contact_id: Uuid,
) -> CrmResult<DeletionSummary> {
    let contact = store
        .contacts()
        .find_by_id(contact_id)
        .await?
        .ok_or_else(|| CrmError::not_found("Contact not found"))?;

    let counts = store.delete_contact_graph(contact_id).await?;
    if !counts.contact_removed {
        return Err(CrmError::not_found("Contact not found"));
    }

    info!(
        "Deleted contact {contact_id} with {} deals, {} tasks, {} appointments",
        counts.deals, counts.tasks, counts.appointments
    );

    Ok(DeletionSummary {
        contact_id,
        contact_name: contact.name,
        deals_removed: counts.deals,
        tasks_removed: counts.tasks,
        appointments_removed: counts.appointments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::models::{Appointment, Contact, Deal, Task};
    use crate::core::store::{Filter, MemoryStore};
    use chrono::Utc;

    #[tokio::test]
    async fn test_cascade_removes_every_dependent() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let jane = Contact::new(owner, "Jane Doe".into());
        let other = Contact::new(owner, "John Roe".into());
        store.contacts().insert(jane.clone()).await.unwrap();
        store.contacts().insert(other.clone()).await.unwrap();

        for name in ["Plot 12", "Villa 3"] {
            store
                .deals()
                .insert(Deal::new(owner, jane.id, name.into()))
                .await
                .unwrap();
        }
        store
            .tasks()
            .insert(Task::new(owner, jane.id, "Send brochure".into()))
            .await
            .unwrap();
        store
            .appointments()
            .insert(Appointment::new(owner, jane.id, "Site visit".into(), Utc::now()))
            .await
            .unwrap();
        let survivor = Deal::new(owner, other.id, "Commercial unit".into());
        store.deals().insert(survivor.clone()).await.unwrap();

        let summary = delete_contact_cascade(&store, jane.id).await.unwrap();
        assert_eq!(
            summary,
            DeletionSummary {
                contact_id: jane.id,
                contact_name: "Jane Doe".into(),
                deals_removed: 2,
                tasks_removed: 1,
                appointments_removed: 1,
            }
        );

        let jane_filter = Filter::for_contact(jane.id);
        assert!(store.deals().find_many(&jane_filter).await.unwrap().is_empty());
        assert!(store.tasks().find_many(&jane_filter).await.unwrap().is_empty());
        assert!(store
            .appointments()
            .find_many(&jane_filter)
            .await
            .unwrap()
            .is_empty());
        assert!(store.contacts().find_by_id(jane.id).await.unwrap().is_none());
        assert_eq!(
            store.deals().find_many(&Filter::all()).await.unwrap(),
            vec![survivor]
        );
    }

    #[tokio::test]
    async fn test_cascade_without_dependents() {
        let store = MemoryStore::new();
        let contact = Contact::new(Uuid::new_v4(), "Lonely".into());
        store.contacts().insert(contact.clone()).await.unwrap();

        let summary = delete_contact_cascade(&store, contact.id).await.unwrap();
        assert_eq!(
            (summary.deals_removed, summary.tasks_removed, summary.appointments_removed),
            (0, 0, 0)
        );
    }

    #[tokio::test]
    async fn test_cascade_on_missing_contact() {
        let store = MemoryStore::new();
        let err = delete_contact_cascade(&store, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, CrmError::NotFound(_)));
    }
}
