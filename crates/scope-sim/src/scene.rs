//! JSON scene descriptions for [`BoxWorld`](crate::world::BoxWorld)
//!
//! A scene lists rooms (each with a floor slab), objects built from boxes,
//! a category taxonomy and a model library for imports. Every box is given
//! by its offset from the body origin and its half extents, in metres.

use indexmap::IndexMap;
use nalgebra::Vector3;
use scope_core::condition::SupportPredicate;
use scope_core::types::{Category, RoomInstanceId, RoomType};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Scene loading errors
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// File could not be read
    #[error("failed to read scene {path}: {source}")]
    Io {
        /// Path that failed
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Not a valid scene description
    #[error("invalid scene description: {0}")]
    Parse(#[from] serde_json::Error),

    /// Object placed in a room the scene does not declare
    #[error("object [{object}] references unknown room [{room}]")]
    UnknownRoom {
        /// Object name
        object: String,
        /// Room instance
        room: RoomInstanceId,
    },

    /// Object or model without boxes
    #[error("[{0}] has no boxes")]
    EmptyBody(String),

    /// Two objects share a name
    #[error("duplicate object name [{0}]")]
    DuplicateName(String),
}

fn default_timestep() -> f64 {
    1.0 / 240.0
}

fn default_gravity() -> f64 {
    9.81
}

fn zero_offset() -> Vector3<f64> {
    Vector3::zeros()
}

fn unit_scale() -> Vector3<f64> {
    Vector3::new(1.0, 1.0, 1.0)
}

/// One box of a compound body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxSpec {
    /// Box centre relative to the body origin
    #[serde(default = "zero_offset")]
    pub offset: Vector3<f64>,
    /// Half side lengths
    pub half_extents: Vector3<f64>,
    /// Other objects may rest on this box's top face
    #[serde(default)]
    pub support: Option<SupportPredicate>,
}

impl BoxSpec {
    /// Box centred on the body origin
    #[must_use]
    pub fn centered(half_extents: Vector3<f64>) -> Self {
        Self {
            offset: Vector3::zeros(),
            half_extents,
            support: None,
        }
    }

    /// With offset
    #[must_use]
    pub fn at(mut self, offset: Vector3<f64>) -> Self {
        self.offset = offset;
        self
    }

    /// Mark the top face as a support surface
    #[must_use]
    pub fn supporting(mut self, predicate: SupportPredicate) -> Self {
        self.support = Some(predicate);
        self
    }
}

/// Room instance with its floor slab
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSpec {
    /// Instance id, e.g. `kitchen_0`
    pub id: RoomInstanceId,
    /// Room type, e.g. `kitchen`
    pub room_type: RoomType,
    /// Lower corner of the floor footprint
    pub min: [f64; 2],
    /// Upper corner of the floor footprint
    pub max: [f64; 2],
}

/// Object placed in the scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSpec {
    /// Unique name
    pub name: String,
    /// Concrete category
    pub category: Category,
    /// Room instance holding the object
    #[serde(default)]
    pub room: Option<RoomInstanceId>,
    /// Body origin in world coordinates
    pub position: Vector3<f64>,
    /// Fixed objects never move under gravity
    #[serde(default)]
    pub fixed: bool,
    /// Scale the boxes were modelled at
    #[serde(default = "unit_scale")]
    pub scale: Vector3<f64>,
    /// Boxes
    pub parts: Vec<BoxSpec>,
}

impl ObjectSpec {
    /// Single-box object
    #[must_use]
    pub fn boxed(name: &str, category: &str, position: Vector3<f64>, half_extents: Vector3<f64>) -> Self {
        Self {
            name: name.to_string(),
            category: Category::new(category),
            room: None,
            position,
            fixed: false,
            scale: unit_scale(),
            parts: vec![BoxSpec::centered(half_extents)],
        }
    }

    /// In a room
    #[must_use]
    pub fn in_room(mut self, room: &str) -> Self {
        self.room = Some(RoomInstanceId::new(room));
        self
    }

    /// Immovable
    #[must_use]
    pub fn fixed(mut self) -> Self {
        self.fixed = true;
        self
    }

    /// Replace the boxes
    #[must_use]
    pub fn with_parts(mut self, parts: Vec<BoxSpec>) -> Self {
        self.parts = parts;
        self
    }

    /// Mark every box as a support surface
    #[must_use]
    pub fn supporting(mut self, predicate: SupportPredicate) -> Self {
        for part in &mut self.parts {
            part.support = Some(predicate);
        }
        self
    }
}

/// Importable model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Model name, e.g. `apple_001`
    pub name: String,
    /// Boxes
    pub parts: Vec<BoxSpec>,
}

impl ModelSpec {
    /// Single box centred on the origin
    #[must_use]
    pub fn cube(name: &str, half_extents: Vector3<f64>) -> Self {
        Self {
            name: name.to_string(),
            parts: vec![BoxSpec::centered(half_extents)],
        }
    }

    /// Open container: a base slab whose top is an `inside` surface, ringed
    /// by four walls standing outside the slab footprint
    ///
    /// `inner` is the half size of the base, `wall` the wall half thickness
    /// and `height` the wall height above the base top.
    #[must_use]
    pub fn open_box(name: &str, inner: [f64; 2], base_half_height: f64, wall: f64, height: f64) -> Self {
        let [hx, hy] = inner;
        let wall_half_z = (height + 2.0 * base_half_height) / 2.0;
        let wall_z = wall_half_z - base_half_height;
        let base = BoxSpec::centered(Vector3::new(hx, hy, base_half_height)).supporting(SupportPredicate::Inside);
        let walls = [
            (Vector3::new(hx + wall, 0.0, wall_z), Vector3::new(wall, hy + 2.0 * wall, wall_half_z)),
            (Vector3::new(-hx - wall, 0.0, wall_z), Vector3::new(wall, hy + 2.0 * wall, wall_half_z)),
            (Vector3::new(0.0, hy + wall, wall_z), Vector3::new(hx, wall, wall_half_z)),
            (Vector3::new(0.0, -hy - wall, wall_z), Vector3::new(hx, wall, wall_half_z)),
        ];
        let mut parts = vec![base];
        parts.extend(walls.into_iter().map(|(offset, half)| BoxSpec::centered(half).at(offset)));
        Self {
            name: name.to_string(),
            parts,
        }
    }
}

/// Complete scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDescription {
    /// Scene identifier
    pub scene_id: String,
    /// Seconds per physics step
    #[serde(default = "default_timestep")]
    pub timestep: f64,
    /// Downward acceleration
    #[serde(default = "default_gravity")]
    pub gravity: f64,
    /// Rooms
    #[serde(default)]
    pub rooms: Vec<RoomSpec>,
    /// Objects
    #[serde(default)]
    pub objects: Vec<ObjectSpec>,
    /// Taxonomy node → child categories
    #[serde(default)]
    pub taxonomy: IndexMap<Category, Vec<Category>>,
    /// Concrete category → importable models
    #[serde(default)]
    pub models: IndexMap<Category, Vec<ModelSpec>>,
}

impl SceneDescription {
    /// Empty scene
    #[must_use]
    pub fn new(scene_id: &str) -> Self {
        Self {
            scene_id: scene_id.to_string(),
            timestep: default_timestep(),
            gravity: default_gravity(),
            rooms: Vec::new(),
            objects: Vec::new(),
            taxonomy: IndexMap::new(),
            models: IndexMap::new(),
        }
    }

    /// Parse from JSON text
    ///
    /// # Errors
    /// `Parse`
    pub fn from_json_str(text: &str) -> Result<Self, SceneError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load from a JSON file
    ///
    /// # Errors
    /// `Io` or `Parse`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SceneError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// With a room whose floor spans `min..max` in x and y
    #[must_use]
    pub fn with_room(mut self, id: &str, room_type: &str, min: [f64; 2], max: [f64; 2]) -> Self {
        self.rooms.push(RoomSpec {
            id: RoomInstanceId::new(id),
            room_type: RoomType::new(room_type),
            min,
            max,
        });
        self
    }

    /// With an object
    #[must_use]
    pub fn with_object(mut self, object: ObjectSpec) -> Self {
        self.objects.push(object);
        self
    }

    /// With a taxonomy node
    #[must_use]
    pub fn with_taxonomy(mut self, node: &str, children: &[&str]) -> Self {
        self.taxonomy.insert(
            Category::new(node),
            children.iter().map(|c| Category::new(*c)).collect(),
        );
        self
    }

    /// With an importable model
    #[must_use]
    pub fn with_model(mut self, category: &str, model: ModelSpec) -> Self {
        self.models.entry(Category::new(category)).or_default().push(model);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_scene() {
        let scene = SceneDescription::from_json_str(
            r#"{
                "scene_id": "Rs_int",
                "rooms": [{"id": "kitchen_0", "room_type": "kitchen", "min": [0, 0], "max": [4, 4]}],
                "objects": [{
                    "name": "table_0",
                    "category": "table",
                    "room": "kitchen_0",
                    "position": [2.0, 2.0, 0.4],
                    "fixed": true,
                    "parts": [{"half_extents": [0.6, 0.4, 0.4], "support": "on_top"}]
                }]
            }"#,
        )
        .unwrap();
        assert_eq!(scene.timestep, 1.0 / 240.0);
        assert_eq!(scene.objects[0].parts[0].support, Some(SupportPredicate::OnTop));
        assert_eq!(scene.objects[0].scale, Vector3::new(1.0, 1.0, 1.0));
    }
}
