//! Identifiers and geometric primitives shared by every component.
//!
//! Scene objects are referred to by [`ObjectId`] everywhere; the records
//! themselves are owned by the scene catalog. Roles, categories and rooms are
//! string-backed newtypes so they serialize as plain JSON strings.

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create from anything string-like
            #[inline]
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the underlying string
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// A named slot in a task template, e.g. `table.n.02_1`
    RoleId
);
string_id!(
    /// Semantic category, possibly a taxonomy node (`fruit.n.01`) or a
    /// concrete scene category (`apple`)
    Category
);
string_id!(
    /// Abstract room category, e.g. `kitchen`
    RoomType
);
string_id!(
    /// One concrete room in the loaded scene, e.g. `kitchen_0`
    RoomInstanceId
);

/// Stable identity of a scene object inside the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u32);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Link index on a multi-link body. `BASE` addresses the body frame itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(pub i32);

impl LinkId {
    /// The base link
    pub const BASE: LinkId = LinkId(-1);
}

/// Handle to a saved physics checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateId(pub u64);

/// Axis-aligned bounding box in world coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Lower corner
    pub min: Vector3<f64>,
    /// Upper corner
    pub max: Vector3<f64>,
}

impl Aabb {
    /// Create from corners
    #[inline]
    #[must_use]
    pub fn new(min: Vector3<f64>, max: Vector3<f64>) -> Self {
        Self { min, max }
    }

    /// Box centred at `center` with the given half extents
    #[must_use]
    pub fn from_center_half_extents(center: Vector3<f64>, half: Vector3<f64>) -> Self {
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Centre point
    #[inline]
    #[must_use]
    pub fn center(&self) -> Vector3<f64> {
        (self.min + self.max) / 2.0
    }

    /// Full side lengths
    #[inline]
    #[must_use]
    pub fn extent(&self) -> Vector3<f64> {
        self.max - self.min
    }

    /// Product of the side lengths
    #[inline]
    #[must_use]
    pub fn volume(&self) -> f64 {
        let e = self.extent();
        e.x * e.y * e.z
    }

    /// Inclusive containment of a point
    #[must_use]
    pub fn contains_point(&self, p: &Vector3<f64>) -> bool {
        (0..3).all(|i| self.min[i] <= p[i] && p[i] <= self.max[i])
    }

    /// Inclusive containment of `(x, y)` in the footprint of the box
    #[must_use]
    pub fn footprint_contains(&self, x: f64, y: f64) -> bool {
        self.min.x <= x && x <= self.max.x && self.min.y <= y && y <= self.max.y
    }

    /// Smallest box containing both
    #[must_use]
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }
}

/// Rigid pose of a body or link
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Position in world coordinates
    pub position: Vector3<f64>,
    /// Orientation
    pub orientation: UnitQuaternion<f64>,
}

impl Pose {
    /// Pose at `position` with identity orientation
    #[inline]
    #[must_use]
    pub fn at(position: Vector3<f64>) -> Self {
        Self {
            position,
            orientation: UnitQuaternion::identity(),
        }
    }

    /// As an isometry
    #[must_use]
    pub fn isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(Translation3::from(self.position), self.orientation)
    }

    /// Map a point from this frame to the parent frame
    #[must_use]
    pub fn transform_point(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.orientation * local + self.position
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::at(Vector3::zeros())
    }
}
