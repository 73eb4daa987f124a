//! Record store seam.
//!
//! Handlers never talk to a database directly. They go through [`CrmStore`],
//! which hands out one [`Collection`] per record type plus the append-only
//! [`ActivityLog`]. Two backends exist: [`memory::MemoryStore`] and
//! [`postgres::PgStore`].

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::core::shared::enums::LeadSource;
use crate::core::shared::models::{Activity, Appointment, Contact, Deal, Task, Team, User};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error("duplicate {0}")]
    Duplicate(String),
    #[error("record not found")]
    Missing,
    #[error("{collection} cannot be filtered by {field:?}")]
    UnsupportedFilter {
        collection: &'static str,
        field: FilterField,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerScope {
    One(Uuid),
    AnyOf(Vec<Uuid>),
}

impl OwnerScope {
    pub fn contains(&self, owner_id: Uuid) -> bool {
        match self {
            Self::One(id) => *id == owner_id,
            Self::AnyOf(ids) => ids.contains(&owner_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Owner,
    Contact,
    Key,
}

/// Conjunction of field matches. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub owner: Option<OwnerScope>,
    pub contact: Option<Uuid>,
    pub key: Option<String>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn owned_by(owner_id: Uuid) -> Self {
        Self {
            owner: Some(OwnerScope::One(owner_id)),
            ..Self::default()
        }
    }

    pub fn scoped(owner: Option<OwnerScope>) -> Self {
        Self {
            owner,
            ..Self::default()
        }
    }

    pub fn for_contact(contact_id: Uuid) -> Self {
        Self {
            contact: Some(contact_id),
            ..Self::default()
        }
    }

    pub fn by_key(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::default()
        }
    }

    fn fields(&self) -> Vec<FilterField> {
        let mut fields = Vec::new();
        if self.owner.is_some() {
            fields.push(FilterField::Owner);
        }
        if self.contact.is_some() {
            fields.push(FilterField::Contact);
        }
        if self.key.is_some() {
            fields.push(FilterField::Key);
        }
        fields
    }

    /// Rejects filters naming a field the collection does not carry, so a
    /// typo can never widen a `delete_many` to the whole collection.
    pub fn check<T: Record>(&self) -> Result<(), StoreError> {
        match self.fields().into_iter().find(|f| !T::FILTERABLE.contains(f)) {
            Some(field) => Err(StoreError::UnsupportedFilter {
                collection: T::COLLECTION,
                field,
            }),
            None => Ok(()),
        }
    }
}

pub trait Record: Clone + Send + Sync + 'static {
    const COLLECTION: &'static str;
    const FILTERABLE: &'static [FilterField];

    fn id(&self) -> Uuid;

    fn owner_id(&self) -> Option<Uuid> {
        None
    }

    fn contact_id(&self) -> Option<Uuid> {
        None
    }

    /// Unique natural key, if the collection has one.
    fn lookup_key(&self) -> Option<&str> {
        None
    }

    fn matches(&self, filter: &Filter) -> bool {
        if let Some(scope) = &filter.owner {
            match self.owner_id() {
                Some(owner) if scope.contains(owner) => {}
                _ => return false,
            }
        }
        if let Some(contact) = filter.contact {
            if self.contact_id() != Some(contact) {
                return false;
            }
        }
        if let Some(key) = &filter.key {
            if self.lookup_key() != Some(key.as_str()) {
                return false;
            }
        }
        true
    }
}

impl Record for User {
    const COLLECTION: &'static str = "users";
    const FILTERABLE: &'static [FilterField] = &[FilterField::Key];

    fn id(&self) -> Uuid {
        self.id
    }

    fn lookup_key(&self) -> Option<&str> {
        Some(&self.email)
    }
}

impl Record for Team {
    const COLLECTION: &'static str = "teams";
    const FILTERABLE: &'static [FilterField] = &[FilterField::Key];

    fn id(&self) -> Uuid {
        self.id
    }

    fn lookup_key(&self) -> Option<&str> {
        Some(&self.name)
    }
}

impl Record for Contact {
    const COLLECTION: &'static str = "contacts";
    const FILTERABLE: &'static [FilterField] = &[FilterField::Owner];

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner_id(&self) -> Option<Uuid> {
        Some(self.owner_id)
    }
}

impl Record for Deal {
    const COLLECTION: &'static str = "deals";
    const FILTERABLE: &'static [FilterField] = &[FilterField::Owner, FilterField::Contact];

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner_id(&self) -> Option<Uuid> {
        Some(self.owner_id)
    }

    fn contact_id(&self) -> Option<Uuid> {
        Some(self.contact_id)
    }
}

impl Record for Task {
    const COLLECTION: &'static str = "tasks";
    const FILTERABLE: &'static [FilterField] = &[FilterField::Owner, FilterField::Contact];

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner_id(&self) -> Option<Uuid> {
        Some(self.owner_id)
    }

    fn contact_id(&self) -> Option<Uuid> {
        Some(self.contact_id)
    }
}

impl Record for Appointment {
    const COLLECTION: &'static str = "appointments";
    const FILTERABLE: &'static [FilterField] = &[FilterField::Owner, FilterField::Contact];

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner_id(&self) -> Option<Uuid> {
        Some(self.owner_id)
    }

    fn contact_id(&self) -> Option<Uuid> {
        Some(self.contact_id)
    }
}

#[async_trait]
pub trait Collection<T: Record>: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<T>, StoreError>;

    async fn find_many(&self, filter: &Filter) -> Result<Vec<T>, StoreError>;

    async fn find_one(&self, filter: &Filter) -> Result<Option<T>, StoreError> {
        Ok(self.find_many(filter).await?.into_iter().next())
    }

    async fn insert(&self, record: T) -> Result<T, StoreError>;

    /// Replaces the stored record with the same id. `Missing` if it is gone.
    async fn update(&self, record: T) -> Result<T, StoreError>;

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn delete_many(&self, filter: &Filter) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait ActivityLog: Send + Sync {
    async fn append(&self, activity: Activity) -> Result<Activity, StoreError>;

    /// Newest first, optionally restricted to one actor.
    async fn recent(&self, limit: usize, user_id: Option<Uuid>)
        -> Result<Vec<Activity>, StoreError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeCounts {
    pub deals: u64,
    pub tasks: u64,
    pub appointments: u64,
    pub contact_removed: bool,
}

#[async_trait]
pub trait CrmStore: Send + Sync {
    fn users(&self) -> &dyn Collection<User>;
    fn teams(&self) -> &dyn Collection<Team>;
    fn contacts(&self) -> &dyn Collection<Contact>;
    fn deals(&self) -> &dyn Collection<Deal>;
    fn tasks(&self) -> &dyn Collection<Task>;
    fn appointments(&self) -> &dyn Collection<Appointment>;
    fn activities(&self) -> &dyn ActivityLog;

    /// Contact count per lead source.
    async fn lead_source_counts(&self) -> Result<Vec<(LeadSource, i64)>, StoreError>;

    /// Removes a contact and everything that references it. Dependents go
    /// first so an interrupted run never leaves a deal, task or appointment
    /// pointing at a missing contact. Backends with transactions override
    /// this to make the four steps atomic.
    async fn delete_contact_graph(&self, contact_id: Uuid) -> Result<CascadeCounts, StoreError> {
        let filter = Filter::for_contact(contact_id);
        let deals = self.deals().delete_many(&filter).await?;
        let tasks = self.tasks().delete_many(&filter).await?;
        let appointments = self.appointments().delete_many(&filter).await?;
        let contact_removed = self.contacts().delete_by_id(contact_id).await?;
        Ok(CascadeCounts {
            deals,
            tasks,
            appointments,
            contact_removed,
        })
    }
}
