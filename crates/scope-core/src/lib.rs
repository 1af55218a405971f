//! Scope Core - grounding symbolic tasks in a physics scene
//!
//! Given a task with named object roles, initial conditions and a
//! disjunction of goal-condition sets, the sampler:
//! - resolves room-anchored roles against the scene's room instances
//! - filters candidates by sampling their conditions
//! - picks one room instance per room type through bipartite matching
//! - binds the remaining roles to existing or newly imported objects
//! - enforces the initial conditions with physics-validated placement
//!
//! The physics engine and scene are reached only through the
//! [`PhysicsWorld`], [`SceneCatalog`] and [`ObjectStates`] traits.
//!
//! # Example
//!
//! ```rust,ignore
//! use scope_core::prelude::*;
//! use rand::SeedableRng;
//!
//! let task = TaskDefinition::load("task.json")?;
//! let sampler = TaskSampler::new(SamplerConfig::new());
//! let mut rng = rand::rngs::StdRng::seed_from_u64(7);
//! let report = sampler.sample(&task, &mut world, &mut rng)?;
//! println!("success: {} digest: {}", report.success, report.journal.digest());
//! ```

pub mod catalog;
pub mod condition;
pub mod config;
pub mod controller;
pub mod error;
pub mod instantiator;
pub mod journal;
pub mod matching;
pub mod physics;
pub mod placement;
pub mod predicates;
pub mod resolver;
pub mod sampler;
pub mod scope;
pub mod support;
pub mod task;
pub mod types;

pub use catalog::{ImportRequest, ObjectStates, SceneBackend, SceneCatalog, SceneObject};
pub use condition::{Condition, ObjectState, Predicate, Relation, SupportPredicate};
pub use config::{ConfigError, DebugMode, InstantiationPolicy, PlacementConfig, SamplerConfig};
pub use controller::{SamplingReport, TaskSampler};
pub use error::{CatalogError, InvariantViolation, PhysicsError, SamplingError, SamplingResult};
pub use journal::{JournalError, JournalRecord, Phase, SamplingJournal};
pub use matching::{match_room_type, MatchGraph, RoomMatch};
pub use physics::{Contact, PhysicsWorld};
pub use placement::{PlacementOutcome, PlacementSampler};
pub use resolver::{CandidateScope, RoomCandidates, RoomTypeResolver};
pub use sampler::{ConditionSampler, PlacementStats};
pub use scope::ObjectScope;
pub use support::{OccupancyGrid, SupportMap, SupportSurface, SurfaceKey};
pub use task::{TaskDefinition, TaskDefinitionError, FLOOR_CATEGORY};
pub use types::{Aabb, Category, LinkId, ObjectId, Pose, RoleId, RoomInstanceId, RoomType, StateId};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving the sampler
    pub use crate::{
        Condition, ObjectId, ObjectScope, ObjectState, PhysicsWorld, Predicate, RoleId,
        SamplerConfig, SamplingError, SamplingReport, SceneBackend, SceneCatalog, TaskDefinition,
        TaskSampler,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
