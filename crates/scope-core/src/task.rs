//! Task definitions
//!
//! A task names its roles per category, lists initial conditions and a
//! disjunction of ground goal-condition sets. Roles whose category is listed
//! in `non_sampleable_categories` are anchored to a room type by exactly one
//! `inroom` initial condition; every other role is sampleable.

use crate::condition::{Condition, Relation};
use crate::error::InvariantViolation;
use crate::types::{Category, RoleId, RoomType};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Category whose roles resolve to a room's synthetic floor object
pub const FLOOR_CATEGORY: &str = "floor.n.01";

/// Errors reading a task file
#[derive(Debug, thiserror::Error)]
pub enum TaskDefinitionError {
    /// File could not be read
    #[error("failed to read task {path}: {source}")]
    Io {
        /// Path that failed
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File is not a valid task definition
    #[error("invalid task definition: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Parsed task ready for sampling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
    /// Activity name
    #[serde(default)]
    pub activity: String,
    /// Activity definition number
    #[serde(default)]
    pub instance: u32,
    /// Roles per category
    pub objects: IndexMap<Category, Vec<RoleId>>,
    /// Conditions that must hold when the episode starts
    #[serde(default)]
    pub initial_conditions: Vec<Condition>,
    /// Each entry is one conjunctive goal; the task goal is their disjunction
    #[serde(default)]
    pub ground_goal_options: Vec<Vec<Condition>>,
    /// Categories that must come from the scene and carry a room assignment
    #[serde(default)]
    pub non_sampleable_categories: IndexSet<Category>,
    /// Let two roles finalize to the same object
    #[serde(default)]
    pub allow_shared_objects: bool,
}

impl TaskDefinition {
    /// Parse from JSON text
    ///
    /// # Errors
    /// `Parse` on malformed JSON or unknown predicates
    pub fn from_json_str(text: &str) -> Result<Self, TaskDefinitionError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load from a JSON file
    ///
    /// # Errors
    /// `Io` when unreadable, otherwise as [`Self::from_json_str`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TaskDefinitionError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| TaskDefinitionError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Every role with its category, in declaration order
    pub fn roles(&self) -> impl Iterator<Item = (&RoleId, &Category)> {
        self.objects
            .iter()
            .flat_map(|(category, roles)| roles.iter().map(move |r| (r, category)))
    }

    /// Category of a role
    #[must_use]
    pub fn category_of(&self, role: &RoleId) -> Option<&Category> {
        self.roles().find(|(r, _)| *r == role).map(|(_, c)| c)
    }

    /// Whether the role's category is sampleable
    #[must_use]
    pub fn is_sampleable(&self, role: &RoleId) -> bool {
        self.category_of(role)
            .is_some_and(|c| !self.non_sampleable_categories.contains(c))
    }

    /// Sampleable categories with their roles
    pub fn sampleable_objects(&self) -> impl Iterator<Item = (&Category, &Vec<RoleId>)> {
        self.objects
            .iter()
            .filter(|(c, _)| !self.non_sampleable_categories.contains(*c))
    }

    /// Whether the condition touches at least one non-sampleable role
    #[must_use]
    pub fn is_non_sampleable_condition(&self, condition: &Condition) -> bool {
        condition.body.iter().any(|r| !self.is_sampleable(r))
    }

    /// Room type of every role with an `inroom` initial condition
    ///
    /// Assumes [`Self::validate`] passed; later duplicates are ignored.
    #[must_use]
    pub fn room_assignments(&self) -> IndexMap<RoleId, RoomType> {
        let mut out = IndexMap::new();
        for condition in &self.initial_conditions {
            if let (Relation::InRoom(room_type), Some(role)) = (&condition.relation, condition.body.first()) {
                if condition.positive {
                    out.entry(role.clone()).or_insert_with(|| room_type.clone());
                }
            }
        }
        out
    }

    /// Check the task before any sampling
    ///
    /// # Errors
    /// The first [`InvariantViolation`] found
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        let mut declared = IndexSet::new();
        for (role, _) in self.roles() {
            if !declared.insert(role.clone()) {
                return Err(InvariantViolation::DuplicateRole(role.clone()));
            }
        }

        let all_conditions = self
            .initial_conditions
            .iter()
            .chain(self.ground_goal_options.iter().flatten());
        for condition in all_conditions {
            condition.check_arity()?;
            if let Some(role) = condition.body.iter().find(|r| !declared.contains(*r)) {
                return Err(InvariantViolation::UndeclaredRole(role.clone()));
            }
        }

        let mut assigned = IndexSet::new();
        for condition in &self.initial_conditions {
            if !matches!(condition.relation, Relation::InRoom(_)) || !condition.positive {
                continue;
            }
            let role = &condition.body[0];
            if let Some(category) = self
                .category_of(role)
                .filter(|c| !self.non_sampleable_categories.contains(*c))
            {
                return Err(InvariantViolation::RoomAssignmentOnSampleable {
                    role: role.clone(),
                    category: category.clone(),
                });
            }
            if !assigned.insert(role.clone()) {
                return Err(InvariantViolation::MultipleRoomAssignments(role.clone()));
            }
        }

        for (role, category) in self.roles() {
            if self.non_sampleable_categories.contains(category) && !assigned.contains(role) {
                return Err(InvariantViolation::MissingRoomAssignment(role.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Predicate;

    fn task() -> TaskDefinition {
        TaskDefinition::from_json_str(
            r#"{
                "activity": "putting_away_apples",
                "objects": {
                    "table.n.02": ["table.n.02_1"],
                    "apple.n.01": ["apple.n.01_1"],
                    "floor.n.01": ["floor.n.01_1"]
                },
                "initial_conditions": [
                    {"predicate": "ontop", "body": ["apple.n.01_1", "table.n.02_1"]},
                    {"predicate": "inroom", "body": ["table.n.02_1", "kitchen"]},
                    {"predicate": "inroom", "body": ["floor.n.01_1", "kitchen"]}
                ],
                "ground_goal_options": [
                    [{"predicate": "ontop", "body": ["apple.n.01_1", "floor.n.01_1"]}]
                ],
                "non_sampleable_categories": ["table.n.02", "floor.n.01"]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn valid_task_passes() {
        let task = task();
        task.validate().unwrap();
        assert!(task.is_sampleable(&RoleId::new("apple.n.01_1")));
        assert!(!task.is_sampleable(&RoleId::new("table.n.02_1")));
        assert_eq!(
            task.room_assignments().get(&RoleId::new("table.n.02_1")),
            Some(&RoomType::new("kitchen"))
        );
        assert!(task.is_non_sampleable_condition(&task.initial_conditions[0]));
    }

    #[test]
    fn room_assignment_on_sampleable_is_rejected() {
        let mut task = task();
        task.initial_conditions.push(Condition::in_room("apple.n.01_1", "kitchen"));
        assert!(matches!(
            task.validate(),
            Err(InvariantViolation::RoomAssignmentOnSampleable { .. })
        ));
    }

    #[test]
    fn second_room_assignment_is_rejected() {
        let mut task = task();
        task.initial_conditions.push(Condition::in_room("table.n.02_1", "bathroom"));
        assert_eq!(
            task.validate(),
            Err(InvariantViolation::MultipleRoomAssignments(RoleId::new("table.n.02_1")))
        );
    }

    #[test]
    fn missing_room_assignment_is_rejected() {
        let mut task = task();
        task.initial_conditions.retain(|c| !c.involves(&RoleId::new("floor.n.01_1")));
        assert_eq!(
            task.validate(),
            Err(InvariantViolation::MissingRoomAssignment(RoleId::new("floor.n.01_1")))
        );
    }

    #[test]
    fn undeclared_goal_role_is_rejected() {
        let mut task = task();
        task.ground_goal_options[0].push(Condition::kinematic(Predicate::Inside, "apple.n.01_1", "bowl.n.01_1"));
        assert_eq!(
            task.validate(),
            Err(InvariantViolation::UndeclaredRole(RoleId::new("bowl.n.01_1")))
        );
    }
}
