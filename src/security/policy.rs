//! Ownership rules shared by every handler.
//!
//! Admins bypass ownership; everyone else may only touch records they own.
//! Handlers check in a fixed order: id format, then existence, then policy,
//! so "not found" and "not yours" never blur together.

use uuid::Uuid;

use super::auth::Actor;
use crate::core::shared::enums::Role;
use crate::core::shared::error::{CrmError, CrmResult};
use crate::core::store::{Collection, OwnerScope, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Deny,
}

pub fn can_mutate(actor: &Actor, owner_id: Uuid) -> AccessDecision {
    if actor.is_admin() || actor.user_id == owner_id {
        AccessDecision::Allow
    } else {
        AccessDecision::Deny
    }
}

/// Single-record reads follow the same rule as mutations.
pub fn ensure_can_mutate(actor: &Actor, owner_id: Uuid, what: &str) -> CrmResult<()> {
    match can_mutate(actor, owner_id) {
        AccessDecision::Allow => Ok(()),
        AccessDecision::Deny => Err(CrmError::forbidden(format!(
            "Not authorized to access this {what}"
        ))),
    }
}

/// Loads a record and checks the actor may act on it. Records without an
/// owner are admin-only.
pub async fn load_authorized<T: Record>(
    collection: &dyn Collection<T>,
    id: Uuid,
    label: &str,
    actor: &Actor,
) -> CrmResult<T> {
    let record = collection
        .find_by_id(id)
        .await?
        .ok_or_else(|| CrmError::not_found(format!("{label} not found")))?;
    match record.owner_id() {
        Some(owner_id) => ensure_can_mutate(actor, owner_id, &label.to_lowercase())?,
        None => ensure_admin(actor)?,
    }
    Ok(record)
}

pub fn ensure_admin(actor: &Actor) -> CrmResult<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(CrmError::forbidden("Admin access required"))
    }
}

pub fn guard_role_change(actor: &Actor, target_id: Uuid, new_role: Role) -> CrmResult<()> {
    if actor.user_id == target_id && actor.is_admin() && !new_role.is_admin() {
        return Err(CrmError::forbidden("Admins cannot demote themselves"));
    }
    Ok(())
}

pub fn guard_self_delete(actor: &Actor, target_id: Uuid) -> CrmResult<()> {
    if actor.user_id == target_id {
        return Err(CrmError::forbidden("Admins cannot delete their own account"));
    }
    Ok(())
}

/// `None` means unrestricted.
pub fn owner_scope(actor: &Actor) -> Option<OwnerScope> {
    if actor.is_admin() {
        None
    } else {
        Some(OwnerScope::One(actor.user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> Actor {
        Actor::new(Uuid::new_v4(), Role::User)
    }

    fn admin() -> Actor {
        Actor::new(Uuid::new_v4(), Role::Admin)
    }

    #[test]
    fn test_owner_and_admin_allowed_others_denied() {
        let owner = user();
        let stranger = user();

        assert_eq!(can_mutate(&owner, owner.user_id), AccessDecision::Allow);
        assert_eq!(can_mutate(&admin(), owner.user_id), AccessDecision::Allow);
        assert_eq!(can_mutate(&stranger, owner.user_id), AccessDecision::Deny);

        let err = ensure_can_mutate(&stranger, owner.user_id, "contact").unwrap_err();
        assert!(matches!(err, CrmError::Forbidden(_)));
    }

    #[test]
    fn test_ensure_admin() {
        assert!(ensure_admin(&admin()).is_ok());
        assert!(matches!(ensure_admin(&user()), Err(CrmError::Forbidden(_))));
    }

    #[test]
    fn test_admin_cannot_demote_self() {
        let me = admin();
        assert!(matches!(
            guard_role_change(&me, me.user_id, Role::User),
            Err(CrmError::Forbidden(_))
        ));
        assert!(guard_role_change(&me, me.user_id, Role::Admin).is_ok());
        assert!(guard_role_change(&me, Uuid::new_v4(), Role::User).is_ok());
    }

    #[test]
    fn test_admin_cannot_delete_self() {
        let me = admin();
        assert!(guard_self_delete(&me, me.user_id).is_err());
        assert!(guard_self_delete(&me, Uuid::new_v4()).is_ok());
    }

    #[tokio::test]
    async fn test_load_authorized_checks_existence_before_ownership() {
        use crate::core::shared::models::Contact;
        use crate::core::store::{CrmStore, MemoryStore};

        let store = MemoryStore::new();
        let owner = user();
        let contact = Contact::new(owner.user_id, "Jane Doe".into());
        store.contacts().insert(contact.clone()).await.unwrap();

        let missing = load_authorized(store.contacts(), Uuid::new_v4(), "Contact", &user()).await;
        assert!(matches!(missing, Err(CrmError::NotFound(_))));

        let foreign = load_authorized(store.contacts(), contact.id, "Contact", &user()).await;
        assert!(matches!(foreign, Err(CrmError::Forbidden(_))));

        let mine = load_authorized(store.contacts(), contact.id, "Contact", &owner).await;
        assert_eq!(mine.unwrap(), contact);
        assert!(load_authorized(store.contacts(), contact.id, "Contact", &admin())
            .await
            .is_ok());
    }

    #[test]
    fn test_owner_scope() {
        let me = user();
        assert_eq!(owner_scope(&me), Some(OwnerScope::One(me.user_id)));
        assert_eq!(owner_scope(&admin()), None);
    }
}
