use async_trait::async_trait;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use std::marker::PhantomData;
use tracing::info;
use uuid::Uuid;

use super::{
    ActivityLog, CascadeCounts, Collection, CrmStore, Filter, OwnerScope, StoreError,
};
use crate::core::shared::enums::LeadSource;
use crate::core::shared::models::{Activity, Appointment, Contact, Deal, Task, Team, User};
use crate::core::shared::schema::{
    crm_activities, crm_appointments, crm_contacts, crm_deals, crm_tasks, crm_teams, crm_users,
};
use crate::core::shared::utils::{create_conn, run_migrations, DbPool};

impl From<DieselError> for StoreError {
    fn from(e: DieselError) -> Self {
        match e {
            DieselError::NotFound => Self::Missing,
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                Self::Duplicate(info.constraint_name().unwrap_or("key").to_string())
            }
            DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, info) => {
                Self::Unavailable(info.message().to_string())
            }
            other => Self::Query(other.to_string()),
        }
    }
}

/// Runs a blocking diesel closure on the pool without stalling the runtime.
async fn run<F, R>(pool: &DbPool, f: F) -> Result<R, StoreError>
where
    F: FnOnce(&mut PgConnection) -> Result<R, DieselError> + Send + 'static,
    R: Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        f(&mut conn).map_err(StoreError::from)
    })
    .await
    .map_err(|e| StoreError::Unavailable(format!("blocking task failed: {e}")))?
}

pub struct PgCollection<T> {
    pool: DbPool,
    _record: PhantomData<fn() -> T>,
}

impl<T> PgCollection<T> {
    fn new(pool: DbPool) -> Self {
        Self {
            pool,
            _record: PhantomData,
        }
    }
}

// Filters below only receive fields that passed `Filter::check` for the
// record type; the others are unreachable.

fn users_query(filter: &Filter) -> crm_users::BoxedQuery<'static, Pg> {
    let mut query = crm_users::table.into_boxed();
    if let Some(email) = &filter.key {
        query = query.filter(crm_users::email.eq(email.clone()));
    }
    query
}

fn teams_query(filter: &Filter) -> crm_teams::BoxedQuery<'static, Pg> {
    let mut query = crm_teams::table.into_boxed();
    if let Some(name) = &filter.key {
        query = query.filter(crm_teams::name.eq(name.clone()));
    }
    query
}

fn contacts_query(filter: &Filter) -> crm_contacts::BoxedQuery<'static, Pg> {
    let mut query = crm_contacts::table.into_boxed();
    match &filter.owner {
        Some(OwnerScope::One(id)) => query = query.filter(crm_contacts::owner_id.eq(*id)),
        Some(OwnerScope::AnyOf(ids)) => {
            query = query.filter(crm_contacts::owner_id.eq_any(ids.clone()))
        }
        None => {}
    }
    query
}

macro_rules! owned_query {
    ($fn_name:ident, $table:ident) => {
        fn $fn_name(filter: &Filter) -> $table::BoxedQuery<'static, Pg> {
            let mut query = $table::table.into_boxed();
            match &filter.owner {
                Some(OwnerScope::One(id)) => query = query.filter($table::owner_id.eq(*id)),
                Some(OwnerScope::AnyOf(ids)) => {
                    query = query.filter($table::owner_id.eq_any(ids.clone()))
                }
                None => {}
            }
            if let Some(contact_id) = filter.contact {
                query = query.filter($table::contact_id.eq(contact_id));
            }
            query
        }
    };
}

owned_query!(deals_query, crm_deals);
owned_query!(tasks_query, crm_tasks);
owned_query!(appointments_query, crm_appointments);

macro_rules! pg_collection {
    ($record:ty, $table:ident, $query:ident) => {
        #[async_trait]
        impl Collection<$record> for PgCollection<$record> {
            async fn find_by_id(&self, id: Uuid) -> Result<Option<$record>, StoreError> {
                run(&self.pool, move |conn| {
                    $table::table
                        .find(id)
                        .select(<$record>::as_select())
                        .first(conn)
                        .optional()
                })
                .await
            }

            async fn find_many(&self, filter: &Filter) -> Result<Vec<$record>, StoreError> {
                filter.check::<$record>()?;
                let filter = filter.clone();
                run(&self.pool, move |conn| {
                    $query(&filter)
                        .order($table::created_at.desc())
                        .select(<$record>::as_select())
                        .load(conn)
                })
                .await
            }

            async fn insert(&self, record: $record) -> Result<$record, StoreError> {
                run(&self.pool, move |conn| {
                    diesel::insert_into($table::table)
                        .values(&record)
                        .returning(<$record>::as_returning())
                        .get_result(conn)
                })
                .await
            }

            async fn update(&self, record: $record) -> Result<$record, StoreError> {
                run(&self.pool, move |conn| {
                    diesel::update($table::table.find(record.id))
                        .set(&record)
                        .returning(<$record>::as_returning())
                        .get_result(conn)
                })
                .await
            }

            async fn delete_by_id(&self, id: Uuid) -> Result<bool, StoreError> {
                run(&self.pool, move |conn| {
                    diesel::delete($table::table.find(id))
                        .execute(conn)
                        .map(|n| n > 0)
                })
                .await
            }

            async fn delete_many(&self, filter: &Filter) -> Result<u64, StoreError> {
                filter.check::<$record>()?;
                let filter = filter.clone();
                run(&self.pool, move |conn| {
                    conn.transaction::<_, DieselError, _>(|conn| {
                        let ids: Vec<Uuid> = $query(&filter).select($table::id).load(conn)?;
                        diesel::delete($table::table.filter($table::id.eq_any(ids)))
                            .execute(conn)
                            .map(|n| n as u64)
                    })
                })
                .await
            }
        }
    };
}

pg_collection!(User, crm_users, users_query);
pg_collection!(Team, crm_teams, teams_query);
pg_collection!(Contact, crm_contacts, contacts_query);
pg_collection!(Deal, crm_deals, deals_query);
pg_collection!(Task, crm_tasks, tasks_query);
pg_collection!(Appointment, crm_appointments, appointments_query);

pub struct PgActivityLog {
    pool: DbPool,
}

#[async_trait]
impl ActivityLog for PgActivityLog {
    async fn append(&self, activity: Activity) -> Result<Activity, StoreError> {
        run(&self.pool, move |conn| {
            diesel::insert_into(crm_activities::table)
                .values(&activity)
                .returning(Activity::as_returning())
                .get_result(conn)
        })
        .await
    }

    async fn recent(
        &self,
        limit: usize,
        user_id: Option<Uuid>,
    ) -> Result<Vec<Activity>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        run(&self.pool, move |conn| {
            let mut query = crm_activities::table.into_boxed();
            if let Some(user_id) = user_id {
                query = query.filter(crm_activities::user_id.eq(user_id));
            }
            query
                .order(crm_activities::timestamp.desc())
                .limit(limit)
                .select(Activity::as_select())
                .load(conn)
        })
        .await
    }
}

pub struct PgStore {
    pool: DbPool,
    users: PgCollection<User>,
    teams: PgCollection<Team>,
    contacts: PgCollection<Contact>,
    deals: PgCollection<Deal>,
    tasks: PgCollection<Task>,
    appointments: PgCollection<Appointment>,
    activities: PgActivityLog,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            users: PgCollection::new(pool.clone()),
            teams: PgCollection::new(pool.clone()),
            contacts: PgCollection::new(pool.clone()),
            deals: PgCollection::new(pool.clone()),
            tasks: PgCollection::new(pool.clone()),
            appointments: PgCollection::new(pool.clone()),
            activities: PgActivityLog { pool: pool.clone() },
            pool,
        }
    }

    /// Builds the pool and brings the schema up to date.
    pub fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = create_conn(database_url, max_connections)?;
        run_migrations(&pool)?;
        info!("Database migrations applied");
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl CrmStore for PgStore {
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
        run(&self.pool, |conn| {
            crm_contacts::table
                .group_by(crm_contacts::lead_source)
                .select((crm_contacts::lead_source, diesel::dsl::count_star()))
                .load::<(LeadSource, i64)>(conn)
        })
        .await
    }

    async fn delete_contact_graph(&self, contact_id: Uuid) -> Result<CascadeCounts, StoreError> {
        run(&self.pool, move |conn| {
            conn.transaction::<_, DieselError, _>(|conn| {
                let deals = diesel::delete(
                    crm_deals::table.filter(crm_deals::contact_id.eq(contact_id)),
                )
                .execute(conn)?;
                let tasks = diesel::delete(
                    crm_tasks::table.filter(crm_tasks::contact_id.eq(contact_id)),
                )
                .execute(conn)?;
                let appointments = diesel::delete(
                    crm_appointments::table.filter(crm_appointments::contact_id.eq(contact_id)),
                )
                .execute(conn)?;
                let contact = diesel::delete(crm_contacts::table.find(contact_id)).execute(conn)?;
                Ok(CascadeCounts {
                    deals: deals as u64,
                    tasks: tasks as u64,
                    appointments: appointments as u64,
                    contact_removed: contact > 0,
                })
            })
        })
        .await
    }
}
