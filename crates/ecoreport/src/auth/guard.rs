//! Ownership and role checks shared by every mutating endpoint.

use super::{AuthError, CurrentUser};
use crate::user::UserRole;

/// A resource with an owning identity.
pub trait Owned {
    /// Id of the identity that owns this resource, if any.
    fn owner_id(&self) -> Option<&str>;
}

/// True iff `actor` owns `resource` or holds an elevated role.
/// Ownerless resources can only be mutated by elevated roles.
pub fn can_mutate<R: Owned + ?Sized>(actor: &CurrentUser, resource: &R) -> bool {
    actor.is_elevated() || resource.owner_id().is_some_and(|owner| owner == actor.id())
}

/// [`can_mutate`], as a `Result`.
pub fn authorize_mutation<R: Owned + ?Sized>(actor: &CurrentUser, resource: &R) -> Result<(), AuthError> {
    if can_mutate(actor, resource) {
        Ok(())
    } else {
        Err(AuthError::forbidden(
            "only the owner, a moderator or an administrator may modify this resource",
        ))
    }
}

/// Require one of `roles`.
pub fn require_role(actor: &CurrentUser, roles: &[UserRole]) -> Result<(), AuthError> {
    if roles.contains(&actor.role()) {
        Ok(())
    } else {
        let names: Vec<&str> = roles.iter().map(|r| r.as_str()).collect();
        Err(AuthError::forbidden(format!(
            "requires role: {}",
            names.join(" or ")
        )))
    }
}
