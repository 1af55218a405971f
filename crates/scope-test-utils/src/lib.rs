//! Testing utilities for the scope workspace
//!
//! Scene fixtures, a task builder and seeded randomness.

#![allow(missing_docs)]

use indexmap::{IndexMap, IndexSet};
use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use scope_core::condition::{Condition, SupportPredicate};
use scope_core::task::{TaskDefinition, FLOOR_CATEGORY};
use scope_core::types::{Category, ObjectId, RoleId};
use scope_sim::scene::{ModelSpec, ObjectSpec, SceneDescription};
use scope_sim::world::BoxWorld;

pub const TABLE: &str = "table.n.02";
pub const APPLE: &str = "apple.n.01";
pub const BOWL: &str = "bowl.n.01";
pub const FLOOR: &str = FLOOR_CATEGORY;

pub const APPLE_HALF: f64 = 0.04;
pub const TABLE_HEIGHT: f64 = 0.8;

pub fn rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Scene with the shared taxonomy and model library and no rooms
pub fn base_scene(id: &str) -> SceneDescription {
    SceneDescription::new(id)
        .with_taxonomy(TABLE, &["table"])
        .with_taxonomy(APPLE, &["apple"])
        .with_taxonomy(BOWL, &["bowl"])
        .with_model("apple", ModelSpec::cube("apple_001", Vector3::repeat(APPLE_HALF)))
        .with_model("bowl", ModelSpec::open_box("bowl_001", [0.15, 0.15], 0.01, 0.01, 0.12))
}

/// Fixed table whose top is at [`TABLE_HEIGHT`], centred at `(x, y)`
pub fn table(name: &str, room: &str, x: f64, y: f64) -> ObjectSpec {
    ObjectSpec::boxed(
        name,
        "table",
        Vector3::new(x, y, TABLE_HEIGHT / 2.0),
        Vector3::new(0.6, 0.4, TABLE_HEIGHT / 2.0),
    )
    .in_room(room)
    .fixed()
    .supporting(SupportPredicate::OnTop)
}

/// Fixed slab resting on a table from [`table`], covering its whole top
pub fn lid(name: &str, room: &str, x: f64, y: f64) -> ObjectSpec {
    ObjectSpec::boxed(
        name,
        "lid",
        Vector3::new(x, y, TABLE_HEIGHT + 0.05),
        Vector3::new(0.7, 0.5, 0.05),
    )
    .in_room(room)
    .fixed()
}

/// Apple resting on the floor at `(x, y)`
pub fn apple(name: &str, room: &str, x: f64, y: f64) -> ObjectSpec {
    ObjectSpec::boxed(name, "apple", Vector3::new(x, y, APPLE_HALF), Vector3::repeat(APPLE_HALF)).in_room(room)
}

/// Fixed open box with its base centred at `position`
pub fn fixed_bowl(name: &str, room: &str, position: Vector3<f64>, inner_half: f64) -> ObjectSpec {
    let model = ModelSpec::open_box(name, [inner_half, inner_half], 0.01, 0.01, 0.12);
    ObjectSpec::boxed(name, "bowl", position, Vector3::repeat(0.1))
        .with_parts(model.parts)
        .in_room(room)
        .fixed()
}

/// `living_room_0` holds two tables, `living_room_1` one
pub fn living_rooms() -> SceneDescription {
    base_scene("two_living_rooms")
        .with_room("living_room_0", "living_room", [0.0, 0.0], [6.0, 6.0])
        .with_room("living_room_1", "living_room", [10.0, 0.0], [16.0, 6.0])
        .with_object(table("table_0", "living_room_0", 1.5, 3.0))
        .with_object(table("table_1", "living_room_0", 4.5, 3.0))
        .with_object(table("table_2", "living_room_1", 13.0, 3.0))
}

/// One kitchen with a table and a fixed bowl on it
pub fn kitchen_with_bowl(inner_half: f64) -> SceneDescription {
    base_scene("kitchen_bowl")
        .with_room("kitchen_0", "kitchen", [0.0, 0.0], [6.0, 6.0])
        .with_object(table("table_0", "kitchen_0", 3.0, 3.0))
        .with_object(fixed_bowl("bowl_0", "kitchen_0", Vector3::new(3.0, 3.0, TABLE_HEIGHT + 0.01), inner_half))
}

pub fn world(scene: SceneDescription) -> BoxWorld {
    BoxWorld::from_description(scene).unwrap()
}

pub fn id(world: &BoxWorld, name: &str) -> ObjectId {
    world.object_by_name(name).unwrap_or_else(|| panic!("no object named {name}"))
}

/// Fluent task definition builder
#[derive(Debug, Clone, Default)]
pub struct TaskBuilder {
    activity: String,
    objects: IndexMap<Category, Vec<RoleId>>,
    initial: Vec<Condition>,
    goals: Vec<Vec<Condition>>,
    non_sampleable: IndexSet<Category>,
    allow_shared: bool,
}

impl TaskBuilder {
    pub fn new(activity: &str) -> Self {
        Self {
            activity: activity.to_string(),
            ..Self::default()
        }
    }

    /// Declare `role` of a sampleable category
    pub fn role(mut self, category: &str, role: &str) -> Self {
        self.objects.entry(Category::new(category)).or_default().push(RoleId::new(role));
        self
    }

    /// Declare `role` of a non-sampleable category located in `room_type`
    pub fn fixed_role(mut self, category: &str, role: &str, room_type: &str) -> Self {
        self.non_sampleable.insert(Category::new(category));
        self.initial.push(Condition::in_room(role, room_type));
        self.role(category, role)
    }

    pub fn non_sampleable(mut self, category: &str) -> Self {
        self.non_sampleable.insert(Category::new(category));
        self
    }

    pub fn initial(mut self, condition: Condition) -> Self {
        self.initial.push(condition);
        self
    }

    pub fn goal(mut self, conditions: Vec<Condition>) -> Self {
        self.goals.push(conditions);
        self
    }

    pub fn allow_shared(mut self) -> Self {
        self.allow_shared = true;
        self
    }

    pub fn build(self) -> TaskDefinition {
        TaskDefinition {
            activity: self.activity,
            instance: 0,
            objects: self.objects,
            initial_conditions: self.initial,
            ground_goal_options: self.goals,
            non_sampleable_categories: self.non_sampleable,
            allow_shared_objects: self.allow_shared,
        }
    }
}
