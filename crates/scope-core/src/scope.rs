//! Role to object bindings
//!
//! The [`ObjectScope`] starts with every role unbound. Filtering binds roles
//! tentatively and puts the previous binding back; the instantiator and the
//! matching engine bind for real. [`ObjectScope::finalize`] checks coverage
//! and exclusivity before final enforcement.

use crate::error::InvariantViolation;
use crate::types::{ObjectId, RoleId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Mapping role → scene object for one attempt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectScope {
    bindings: IndexMap<RoleId, Option<ObjectId>>,
}

impl ObjectScope {
    /// Scope with every role unbound
    #[must_use]
    pub fn new<'a>(roles: impl IntoIterator<Item = &'a RoleId>) -> Self {
        Self {
            bindings: roles.into_iter().map(|r| (r.clone(), None)).collect(),
        }
    }

    /// Bind a role, returning the previous binding
    pub fn bind(&mut self, role: &RoleId, object: ObjectId) -> Option<ObjectId> {
        self.bindings.insert(role.clone(), Some(object)).flatten()
    }

    /// Put back a binding returned by [`Self::bind`]
    pub fn restore(&mut self, role: &RoleId, previous: Option<ObjectId>) {
        self.bindings.insert(role.clone(), previous);
    }

    /// Current binding
    #[must_use]
    pub fn get(&self, role: &RoleId) -> Option<ObjectId> {
        self.bindings.get(role).copied().flatten()
    }

    /// Binding that must exist
    ///
    /// # Errors
    /// `UnboundRole`
    pub fn require(&self, role: &RoleId) -> Result<ObjectId, InvariantViolation> {
        self.get(role)
            .ok_or_else(|| InvariantViolation::UnboundRole(role.clone()))
    }

    /// Whether every operand is bound
    #[must_use]
    pub fn all_bound<'a>(&self, roles: impl IntoIterator<Item = &'a RoleId>) -> bool {
        roles.into_iter().all(|r| self.get(r).is_some())
    }

    /// Bound roles in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&RoleId, ObjectId)> {
        self.bindings
            .iter()
            .filter_map(|(r, o)| o.map(|o| (r, o)))
    }

    /// Number of bound roles
    #[must_use]
    pub fn bound_count(&self) -> usize {
        self.iter().count()
    }

    /// Check that every role is bound and no object is shared
    ///
    /// # Errors
    /// `UnboundRole` or `SharedObject`
    pub fn finalize(&self, allow_shared: bool) -> Result<(), InvariantViolation> {
        let mut owners: HashMap<ObjectId, &RoleId> = HashMap::new();
        for (role, object) in &self.bindings {
            let object = object.ok_or_else(|| InvariantViolation::UnboundRole(role.clone()))?;
            if let Some(first) = owners.insert(object, role) {
                if !allow_shared {
                    return Err(InvariantViolation::SharedObject {
                        first: first.clone(),
                        second: role.clone(),
                        object,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles() -> Vec<RoleId> {
        vec![RoleId::new("a"), RoleId::new("b")]
    }

    #[test]
    fn tentative_binding_restores() {
        let roles = roles();
        let mut scope = ObjectScope::new(&roles);
        let prev = scope.bind(&roles[0], ObjectId(1));
        assert_eq!(prev, None);
        assert_eq!(scope.get(&roles[0]), Some(ObjectId(1)));
        scope.restore(&roles[0], prev);
        assert_eq!(scope.get(&roles[0]), None);
    }

    #[test]
    fn finalize_requires_coverage() {
        let roles = roles();
        let mut scope = ObjectScope::new(&roles);
        scope.bind(&roles[0], ObjectId(1));
        assert_eq!(
            scope.finalize(false),
            Err(InvariantViolation::UnboundRole(RoleId::new("b")))
        );
    }

    #[test]
    fn finalize_rejects_sharing_unless_allowed() {
        let roles = roles();
        let mut scope = ObjectScope::new(&roles);
        scope.bind(&roles[0], ObjectId(1));
        scope.bind(&roles[1], ObjectId(1));
        assert!(matches!(
            scope.finalize(false),
            Err(InvariantViolation::SharedObject { .. })
        ));
        assert!(scope.finalize(true).is_ok());
    }
}
