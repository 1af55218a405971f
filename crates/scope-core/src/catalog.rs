//! Scene catalog and object-state backends
//!
//! The catalog owns every [`SceneObject`] record. The sampler only holds
//! [`ObjectId`]s and asks the catalog for groupings by category, by room
//! instance and by room type.

use crate::condition::ObjectState;
use crate::error::CatalogError;
use crate::physics::PhysicsWorld;
use crate::support::SupportMap;
use crate::types::{Category, ObjectId, RoomInstanceId, RoomType};
use nalgebra::Vector3;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Concrete body in the loaded scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    /// Catalog identity, also the physics body handle
    pub id: ObjectId,
    /// Scene-unique name, e.g. `table_3`
    pub name: String,
    /// Concrete category
    pub category: Category,
    /// Room instance holding the object, if any
    #[serde(default)]
    pub room: Option<RoomInstanceId>,
    /// Native bounding-box side lengths before scaling
    pub bounding_box: Vector3<f64>,
    /// Per-axis scale applied to the native model
    pub scale: Vector3<f64>,
    /// Where other objects may rest on or inside this one
    #[serde(default)]
    pub support: SupportMap,
}

/// Request to add a new object to the scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRequest {
    /// Name for the new object
    pub name: String,
    /// Concrete category
    pub category: Category,
    /// Model from [`SceneCatalog::available_models`]
    pub model: String,
    /// Initial world position
    pub position: Vector3<f64>,
}

/// Read access to the scene plus the two mutations the sampler needs
pub trait SceneCatalog {
    /// Identifier of the loaded scene, used in log messages
    fn scene_id(&self) -> &str;

    /// Look up an object record
    ///
    /// # Errors
    /// `UnknownObject`
    fn object(&self, id: ObjectId) -> Result<&SceneObject, CatalogError>;

    /// Every object of a concrete category, scene-wide
    fn objects_by_category(&self, category: &Category) -> Vec<ObjectId>;

    /// Every object located in a room instance
    fn objects_by_room_instance(&self, room: &RoomInstanceId) -> Vec<ObjectId>;

    /// Room instances of a type; empty when the scene has none
    fn room_type_instances(&self, room_type: &RoomType) -> Vec<RoomInstanceId>;

    /// Concrete categories under a taxonomy node, including the node itself
    /// when it is concrete
    fn subtree_categories(&self, category: &Category) -> Vec<Category>;

    /// Synthetic floor object for one room instance
    ///
    /// Repeated calls return the same id.
    ///
    /// # Errors
    /// `UnknownRoom`
    fn room_floor(&mut self, room: &RoomInstanceId) -> Result<ObjectId, CatalogError>;

    /// Model names that can be imported for a concrete category
    fn available_models(&self, category: &Category) -> Vec<String>;

    /// Create a new object
    ///
    /// # Errors
    /// `UnknownModel` when the model is not in the library
    fn import_object(&mut self, request: ImportRequest) -> Result<ObjectId, CatalogError>;
}

/// Unary object states
pub trait ObjectStates {
    /// Current value of a state
    ///
    /// # Errors
    /// `UnknownObject`
    fn state(&self, object: ObjectId, state: ObjectState) -> Result<bool, CatalogError>;

    /// Try to set a state; `Ok(false)` when the state cannot take `value`
    ///
    /// # Errors
    /// `UnknownObject`
    fn sample_state(
        &mut self,
        object: ObjectId,
        state: ObjectState,
        value: bool,
        rng: &mut dyn RngCore,
    ) -> Result<bool, CatalogError>;
}

/// Everything the task sampler talks to
pub trait SceneBackend: PhysicsWorld + SceneCatalog + ObjectStates {}

impl<T: PhysicsWorld + SceneCatalog + ObjectStates> SceneBackend for T {}
