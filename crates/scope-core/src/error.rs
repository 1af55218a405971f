//! Error types for scope sampling
//!
//! Two classes of failure exist:
//! - expected sampling failures (missing room type, infeasible room
//!   instance, exhausted placement, re-sample anomalies) which the
//!   controller recovers from locally and reports as `success: false`
//! - fatal errors (invariant violations, backend errors) which abort task
//!   instantiation

use crate::condition::Condition;
use crate::types::{Category, LinkId, ObjectId, RoleId, RoomType, StateId};

/// Main sampling error type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SamplingError {
    /// The loaded scene has no instance of a room type the task needs
    #[error("room type [{room_type}] missing in scene [{scene}]")]
    SceneMissingRoomType {
        /// Room type named by an `inroom` condition
        room_type: RoomType,
        /// Scene identifier
        scene: String,
    },

    /// No room instance of a room type can host every role bound to it
    #[error("room type [{room_type}] has no feasible room instance: {reason}")]
    NoFeasibleRoomInstance {
        /// Room type that failed
        room_type: RoomType,
        /// Which stage rejected it
        reason: String,
    },

    /// Every placement trial collided
    #[error("placement of {object} {predicate} {support} exhausted after {trials} trials")]
    PlacementSamplingExhausted {
        /// Object being placed
        object: ObjectId,
        /// Supporting object
        support: ObjectId,
        /// `ontop` or `inside`
        predicate: String,
        /// Trials performed
        trials: usize,
    },

    /// A condition that sampled true during filtering failed after matching
    #[error("condition {condition} failed re-sampling after successful matching")]
    ConditionReSampleFailure {
        /// The condition
        condition: Condition,
    },

    /// A condition involving only sampleable roles failed
    #[error("sampleable condition {condition} failed")]
    SampleableConditionFailure {
        /// The condition
        condition: Condition,
    },

    /// Malformed task or broken contract (fatal)
    #[error("invariant violation: {0}")]
    InvariantViolation(#[from] InvariantViolation),

    /// Physics backend rejected a request (fatal)
    #[error("physics error: {0}")]
    Physics(#[from] PhysicsError),

    /// Scene catalog rejected a request (fatal)
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

impl SamplingError {
    /// Recovered by trying the next room instance or goal set
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NoFeasibleRoomInstance { .. } | Self::PlacementSamplingExhausted { .. }
        )
    }

    /// Aborts task instantiation instead of yielding `success: false`
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvariantViolation(_) | Self::Physics(_) | Self::Catalog(_)
        )
    }

    /// Flags a nondeterministic regression between filtering and enforcement
    #[inline]
    #[must_use]
    pub fn is_anomaly(&self) -> bool {
        matches!(self, Self::ConditionReSampleFailure { .. })
    }

    /// Variant name, for tallies and reports
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SceneMissingRoomType { .. } => "SceneMissingRoomType",
            Self::NoFeasibleRoomInstance { .. } => "NoFeasibleRoomInstance",
            Self::PlacementSamplingExhausted { .. } => "PlacementSamplingExhausted",
            Self::ConditionReSampleFailure { .. } => "ConditionReSampleFailure",
            Self::SampleableConditionFailure { .. } => "SampleableConditionFailure",
            Self::InvariantViolation(_) => "InvariantViolation",
            Self::Physics(_) => "Physics",
            Self::Catalog(_) => "Catalog",
        }
    }
}

/// Configuration errors in the task definition or broken internal contracts
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    /// `inroom` on a role whose category is sampleable
    #[error("only non-sampleable objects can have a room assignment: [{role}] is a [{category}]")]
    RoomAssignmentOnSampleable {
        /// Offending role
        role: RoleId,
        /// Its category
        category: Category,
    },

    /// A role has two `inroom` conditions
    #[error("object [{0}] has more than one room assignment")]
    MultipleRoomAssignments(RoleId),

    /// A non-sampleable role lacks an `inroom` condition
    #[error("all non-sampleable objects need a room assignment: [{0}]")]
    MissingRoomAssignment(RoleId),

    /// A condition mentions a role the task never declares
    #[error("condition references undeclared role [{0}]")]
    UndeclaredRole(RoleId),

    /// A role is declared under two categories
    #[error("role [{0}] is declared more than once")]
    DuplicateRole(RoleId),

    /// Wrong number of operands for a predicate
    #[error("predicate [{predicate}] expects {expected} operands, got {actual}")]
    Arity {
        /// Predicate name
        predicate: String,
        /// Required operand count
        expected: usize,
        /// Provided operand count
        actual: usize,
    },

    /// Role looked up before being bound
    #[error("role [{0}] is not bound in the object scope")]
    UnboundRole(RoleId),

    /// Two roles finalized to the same object without permission
    #[error("roles [{first}] and [{second}] both resolve to {object}")]
    SharedObject {
        /// First role
        first: RoleId,
        /// Second role
        second: RoleId,
        /// Object both resolve to
        object: ObjectId,
    },

    /// Goal filtering produced candidates absent from initial filtering
    #[error("goal-filtered candidates for [{0}] are not a subset of initial candidates")]
    NonMonotonicFiltering(RoleId),
}

/// Physics backend failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PhysicsError {
    /// No body for this object
    #[error("unknown body {0}")]
    UnknownBody(ObjectId),

    /// Body exists but has no such link
    #[error("body {body} has no link {link:?}")]
    UnknownLink {
        /// Body
        body: ObjectId,
        /// Requested link
        link: LinkId,
    },

    /// Checkpoint was never saved or already removed
    #[error("unknown saved state {0:?}")]
    UnknownState(StateId),
}

/// Scene catalog failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// Object id not in the catalog
    #[error("unknown object {0}")]
    UnknownObject(ObjectId),

    /// Room instance not in the scene
    #[error("unknown room instance [{0}]")]
    UnknownRoom(String),

    /// No model to instantiate for a category
    #[error("no model available for category [{0}]")]
    NoModel(Category),

    /// Model name not in the library
    #[error("unknown model [{model}] for category [{category}]")]
    UnknownModel {
        /// Category
        category: Category,
        /// Requested model
        model: String,
    },
}

/// Result alias for sampling operations
pub type SamplingResult<T> = Result<T, SamplingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let missing = SamplingError::SceneMissingRoomType {
            room_type: RoomType::new("garage"),
            scene: "Rs_int".into(),
        };
        assert!(!missing.is_retryable());
        assert!(!missing.is_fatal());

        let infeasible = SamplingError::NoFeasibleRoomInstance {
            room_type: RoomType::new("kitchen"),
            reason: "matching".into(),
        };
        assert!(infeasible.is_retryable());

        let fatal: SamplingError = InvariantViolation::MultipleRoomAssignments(RoleId::new("t1")).into();
        assert!(fatal.is_fatal());
        assert_eq!(
            fatal.to_string(),
            "invariant violation: object [t1] has more than one room assignment"
        );
    }
}
