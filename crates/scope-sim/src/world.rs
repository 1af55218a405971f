//! In-memory rigid-box world
//!
//! Bodies are compounds of boxes. Fixed bodies never move; dynamic bodies
//! fall under gravity and are lifted out of anything they penetrate, which
//! leaves them resting in contact. Two bodies are in contact when any pair of
//! their boxes overlaps or touches within [`CONTACT_TOLERANCE`].
//!
//! The world also serves as scene catalog and object-state store, so one
//! `BoxWorld` is a complete [`SceneBackend`](scope_core::SceneBackend).

use crate::scene::{BoxSpec, SceneDescription, SceneError};
use indexmap::IndexMap;
use nalgebra::Vector3;
use rand::{Rng, RngCore};
use scope_core::catalog::{ImportRequest, ObjectStates, SceneCatalog, SceneObject};
use scope_core::condition::{ObjectState, SupportPredicate};
use scope_core::error::{CatalogError, PhysicsError};
use scope_core::physics::{Contact, PhysicsWorld};
use scope_core::support::{OccupancyGrid, SupportMap, SupportSurface, SurfaceKey};
use scope_core::task::FLOOR_CATEGORY;
use scope_core::types::{Aabb, Category, LinkId, ObjectId, Pose, RoomInstanceId, RoomType, StateId};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Gap below which two boxes count as touching
pub const CONTACT_TOLERANCE: f64 = 1e-6;

/// Thickness of generated floor slabs; their top face is at z = 0
pub const FLOOR_THICKNESS: f64 = 0.1;

/// Fewest particles a dusty or stained object may carry
pub const MIN_PARTICLES: usize = 5;

/// Surface area covered by one particle
const PARTICLE_AREA: f64 = 0.0025;

const MAX_PARTICLES: usize = 200;

const PENETRATION_EPSILON: f64 = 1e-9;

const MAX_LIFT_PASSES: usize = 4;

#[derive(Debug, Clone)]
struct Body {
    parts: Vec<BoxSpec>,
    pose: Pose,
    velocity_z: f64,
    fixed: bool,
}

impl Body {
    fn part_aabb(&self, part: &BoxSpec) -> Aabb {
        let center = self.pose.transform_point(&part.offset);
        let rotation = self.pose.orientation.to_rotation_matrix();
        let half = rotation.matrix().abs() * part.half_extents;
        Aabb::from_center_half_extents(center, half)
    }

    fn part_aabbs(&self) -> Vec<Aabb> {
        self.parts.iter().map(|p| self.part_aabb(p)).collect()
    }

    fn aabb(&self) -> Aabb {
        let mut boxes = self.part_aabbs().into_iter();
        let first = boxes
            .next()
            .unwrap_or_else(|| Aabb::from_center_half_extents(self.pose.position, Vector3::zeros()));
        boxes.fold(first, |acc, b| acc.union(&b))
    }
}

fn penetrates(a: &Aabb, b: &Aabb) -> bool {
    (0..3).all(|i| a.min[i] < b.max[i] - PENETRATION_EPSILON && b.min[i] < a.max[i] - PENETRATION_EPSILON)
}

fn touches(a: &Aabb, b: &Aabb) -> bool {
    (0..3).all(|i| a.min[i] <= b.max[i] + CONTACT_TOLERANCE && b.min[i] <= a.max[i] + CONTACT_TOLERANCE)
}

#[derive(Debug, Clone)]
struct Snapshot {
    bodies: Vec<(ObjectId, Pose, f64)>,
}

/// Rigid-box world implementing every backend trait
#[derive(Debug, Clone)]
pub struct BoxWorld {
    scene_id: String,
    timestep: f64,
    gravity: f64,
    bodies: IndexMap<ObjectId, Body>,
    aliases: HashMap<ObjectId, ObjectId>,
    objects: IndexMap<ObjectId, SceneObject>,
    names: HashMap<String, ObjectId>,
    rooms: IndexMap<RoomInstanceId, RoomType>,
    floors: HashMap<RoomInstanceId, ObjectId>,
    room_floors: HashMap<RoomInstanceId, ObjectId>,
    taxonomy: IndexMap<Category, Vec<Category>>,
    models: IndexMap<Category, Vec<crate::scene::ModelSpec>>,
    states: HashMap<(ObjectId, ObjectState), bool>,
    particles: HashMap<(ObjectId, ObjectState), usize>,
    snapshots: HashMap<StateId, Snapshot>,
    next_state: u64,
    next_id: u32,
    step_count: u64,
}

impl BoxWorld {
    /// Build a world from a scene description
    ///
    /// # Errors
    /// `UnknownRoom`, `EmptyBody` or `DuplicateName`
    pub fn from_description(scene: SceneDescription) -> Result<Self, SceneError> {
        let mut world = Self {
            scene_id: scene.scene_id,
            timestep: scene.timestep,
            gravity: scene.gravity,
            bodies: IndexMap::new(),
            aliases: HashMap::new(),
            objects: IndexMap::new(),
            names: HashMap::new(),
            rooms: IndexMap::new(),
            floors: HashMap::new(),
            room_floors: HashMap::new(),
            taxonomy: scene.taxonomy,
            models: scene.models,
            states: HashMap::new(),
            particles: HashMap::new(),
            snapshots: HashMap::new(),
            next_state: 0,
            next_id: 0,
            step_count: 0,
        };

        for room in scene.rooms {
            let half = Vector3::new(
                (room.max[0] - room.min[0]) / 2.0,
                (room.max[1] - room.min[1]) / 2.0,
                FLOOR_THICKNESS / 2.0,
            );
            let center = Vector3::new(
                (room.min[0] + room.max[0]) / 2.0,
                (room.min[1] + room.max[1]) / 2.0,
                -FLOOR_THICKNESS / 2.0,
            );
            let parts = vec![BoxSpec::centered(half).supporting(SupportPredicate::OnTop)];
            let id = world.add_body(
                format!("floor_{}", room.id),
                Category::new("floor"),
                Some(room.id.clone()),
                parts,
                center,
                Vector3::new(1.0, 1.0, 1.0),
                true,
            );
            world.floors.insert(room.id.clone(), id);
            world.rooms.insert(room.id, room.room_type);
        }

        for object in scene.objects {
            if object.parts.is_empty() {
                return Err(SceneError::EmptyBody(object.name));
            }
            if world.names.contains_key(&object.name) {
                return Err(SceneError::DuplicateName(object.name));
            }
            if let Some(room) = &object.room {
                if !world.rooms.contains_key(room) {
                    return Err(SceneError::UnknownRoom {
                        object: object.name,
                        room: room.clone(),
                    });
                }
            }
            world.add_body(
                object.name,
                object.category,
                object.room,
                object.parts,
                object.position,
                object.scale,
                object.fixed,
            );
        }
        debug!(scene = %world.scene_id, bodies = world.bodies.len(), "box world built");
        Ok(world)
    }

    /// Load a scene description file and build the world
    ///
    /// # Errors
    /// As [`SceneDescription::load`] and [`Self::from_description`]
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, SceneError> {
        Self::from_description(SceneDescription::load(path)?)
    }

    #[allow(clippy::too_many_arguments)]
    fn add_body(
        &mut self,
        name: String,
        category: Category,
        room: Option<RoomInstanceId>,
        parts: Vec<BoxSpec>,
        position: Vector3<f64>,
        scale: Vector3<f64>,
        fixed: bool,
    ) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;

        let mut support = SupportMap::new();
        for (i, part) in parts.iter().enumerate() {
            let Some(predicate) = part.support else {
                continue;
            };
            let local_half = part.half_extents.component_div(&scale);
            let grid = OccupancyGrid::covering(-local_half.x, local_half.x, -local_half.y, local_half.y);
            support.add_surface(
                predicate,
                SurfaceKey {
                    body: id,
                    link: LinkId(i as i32),
                },
                SupportSurface {
                    height: local_half.z,
                    grid,
                },
            );
        }

        let body = Body {
            parts,
            pose: Pose::at(position),
            velocity_z: 0.0,
            fixed,
        };
        let bounding_box = body.aabb().extent().component_div(&scale);
        self.bodies.insert(id, body);
        self.names.insert(name.clone(), id);
        self.objects.insert(
            id,
            SceneObject {
                id,
                name,
                category,
                room,
                bounding_box,
                scale,
                support,
            },
        );
        id
    }

    /// Object id by name
    #[must_use]
    pub fn object_by_name(&self, name: &str) -> Option<ObjectId> {
        self.names.get(name).copied()
    }

    /// Physics steps taken so far
    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Checkpoints currently held
    #[must_use]
    pub fn saved_state_count(&self) -> usize {
        self.snapshots.len()
    }

    /// Current pose of a body
    ///
    /// # Errors
    /// `UnknownBody`
    pub fn pose(&self, id: ObjectId) -> Result<Pose, PhysicsError> {
        Ok(self.body(id)?.pose)
    }

    /// Every catalog object id, including synthetic floors
    pub fn object_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.objects.keys().copied()
    }

    /// Force a state without sampling
    pub fn set_state(&mut self, object: ObjectId, state: ObjectState, value: bool) {
        let body = self.resolve(object).unwrap_or(object);
        self.states.insert((body, state), value);
    }

    fn resolve(&self, id: ObjectId) -> Result<ObjectId, PhysicsError> {
        let body = self.aliases.get(&id).copied().unwrap_or(id);
        if self.bodies.contains_key(&body) {
            Ok(body)
        } else {
            Err(PhysicsError::UnknownBody(id))
        }
    }

    fn body(&self, id: ObjectId) -> Result<&Body, PhysicsError> {
        let body = self.resolve(id)?;
        self.bodies.get(&body).ok_or(PhysicsError::UnknownBody(id))
    }

    fn body_mut(&mut self, id: ObjectId) -> Result<&mut Body, PhysicsError> {
        let body = self.resolve(id)?;
        self.bodies.get_mut(&body).ok_or(PhysicsError::UnknownBody(id))
    }

    fn required_lift(&self, id: ObjectId) -> f64 {
        let Some(body) = self.bodies.get(&id) else {
            return 0.0;
        };
        let mine = body.part_aabbs();
        let mut lift = 0.0f64;
        for (other_id, other) in &self.bodies {
            if *other_id == id {
                continue;
            }
            for theirs in other.part_aabbs() {
                for part in &mine {
                    if penetrates(part, &theirs) {
                        lift = lift.max(theirs.max.z - part.min.z);
                    }
                }
            }
        }
        lift
    }

    fn touching_parts(&self, a: &Body, b: &Body) -> Option<Vector3<f64>> {
        for pa in a.part_aabbs() {
            for pb in b.part_aabbs() {
                if touches(&pa, &pb) {
                    let lo = pa.min.sup(&pb.min);
                    let hi = pa.max.inf(&pb.max);
                    return Some((lo + hi) / 2.0);
                }
            }
        }
        None
    }

    fn leaf_categories(&self, category: &Category, out: &mut Vec<Category>, depth: usize) {
        match self.taxonomy.get(category) {
            Some(children) if depth < 16 => {
                for child in children {
                    self.leaf_categories(child, out, depth + 1);
                }
            }
            _ => {
                if !out.contains(category) {
                    out.push(category.clone());
                }
            }
        }
    }
}

impl PhysicsWorld for BoxWorld {
    fn step(&mut self) -> Result<(), PhysicsError> {
        let dynamic: Vec<ObjectId> = self
            .bodies
            .iter()
            .filter(|(_, b)| !b.fixed)
            .map(|(id, _)| *id)
            .collect();
        for id in dynamic {
            let (gravity, dt) = (self.gravity, self.timestep);
            let body = self.body_mut(id)?;
            body.velocity_z -= gravity * dt;
            body.pose.position.z += body.velocity_z * dt;
            for _ in 0..MAX_LIFT_PASSES {
                let lift = self.required_lift(id);
                if lift <= 0.0 {
                    break;
                }
                let body = self.body_mut(id)?;
                body.pose.position.z += lift;
                body.velocity_z = 0.0;
            }
        }
        self.step_count += 1;
        Ok(())
    }

    fn timestep(&self) -> f64 {
        self.timestep
    }

    fn save_state(&mut self) -> StateId {
        let id = StateId(self.next_state);
        self.next_state += 1;
        let bodies = self
            .bodies
            .iter()
            .map(|(id, b)| (*id, b.pose, b.velocity_z))
            .collect();
        self.snapshots.insert(id, Snapshot { bodies });
        trace!(state = id.0, "state saved");
        id
    }

    fn restore_state(&mut self, state: StateId) -> Result<(), PhysicsError> {
        let snapshot = self
            .snapshots
            .get(&state)
            .cloned()
            .ok_or(PhysicsError::UnknownState(state))?;
        for (id, pose, velocity) in snapshot.bodies {
            if let Some(body) = self.bodies.get_mut(&id) {
                body.pose = pose;
                body.velocity_z = velocity;
            }
        }
        Ok(())
    }

    fn remove_state(&mut self, state: StateId) -> Result<(), PhysicsError> {
        self.snapshots
            .remove(&state)
            .map(|_| ())
            .ok_or(PhysicsError::UnknownState(state))
    }

    fn aabb(&self, body: ObjectId) -> Result<Aabb, PhysicsError> {
        Ok(self.body(body)?.aabb())
    }

    fn contacts(&self, body: ObjectId) -> Result<Vec<Contact>, PhysicsError> {
        let id = self.resolve(body)?;
        let me = self.body(id)?;
        let mut out = Vec::new();
        for (other_id, other) in &self.bodies {
            if *other_id == id {
                continue;
            }
            if let Some(point) = self.touching_parts(me, other) {
                out.push(Contact {
                    other: *other_id,
                    point,
                });
            }
        }
        Ok(out)
    }

    fn contacts_between(&self, a: ObjectId, b: ObjectId) -> Result<Vec<Contact>, PhysicsError> {
        let (ia, ib) = (self.resolve(a)?, self.resolve(b)?);
        if ia == ib {
            return Ok(Vec::new());
        }
        let (ba, bb) = (self.body(ia)?, self.body(ib)?);
        Ok(self
            .touching_parts(ba, bb)
            .map(|point| Contact { other: ib, point })
            .into_iter()
            .collect())
    }

    fn link_pose(&self, body: ObjectId, link: LinkId) -> Result<Pose, PhysicsError> {
        let b = self.body(body)?;
        if link == LinkId::BASE {
            return Ok(b.pose);
        }
        let part = usize::try_from(link.0)
            .ok()
            .and_then(|i| b.parts.get(i))
            .ok_or(PhysicsError::UnknownLink { body, link })?;
        Ok(Pose {
            position: b.pose.transform_point(&part.offset),
            orientation: b.pose.orientation,
        })
    }

    fn set_body_pose(&mut self, body: ObjectId, pose: Pose) -> Result<(), PhysicsError> {
        let b = self.body_mut(body)?;
        b.pose = pose;
        b.velocity_z = 0.0;
        Ok(())
    }
}

impl SceneCatalog for BoxWorld {
    fn scene_id(&self) -> &str {
        &self.scene_id
    }

    fn object(&self, id: ObjectId) -> Result<&SceneObject, CatalogError> {
        self.objects.get(&id).ok_or(CatalogError::UnknownObject(id))
    }

    fn objects_by_category(&self, category: &Category) -> Vec<ObjectId> {
        self.objects
            .values()
            .filter(|o| &o.category == category)
            .map(|o| o.id)
            .collect()
    }

    fn objects_by_room_instance(&self, room: &RoomInstanceId) -> Vec<ObjectId> {
        self.objects
            .values()
            .filter(|o| o.room.as_ref() == Some(room))
            .map(|o| o.id)
            .collect()
    }

    fn room_type_instances(&self, room_type: &RoomType) -> Vec<RoomInstanceId> {
        self.rooms
            .iter()
            .filter(|(_, t)| *t == room_type)
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn subtree_categories(&self, category: &Category) -> Vec<Category> {
        let mut out = Vec::new();
        self.leaf_categories(category, &mut out, 0);
        out
    }

    fn room_floor(&mut self, room: &RoomInstanceId) -> Result<ObjectId, CatalogError> {
        if let Some(&id) = self.room_floors.get(room) {
            return Ok(id);
        }
        let floor = *self
            .floors
            .get(room)
            .ok_or_else(|| CatalogError::UnknownRoom(room.to_string()))?;
        let mut record = self.object(floor)?.clone();
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        record.id = id;
        record.name = format!("room_floor_{room}");
        record.category = Category::new(FLOOR_CATEGORY);
        record.support.rebind(floor);
        self.names.insert(record.name.clone(), id);
        self.objects.insert(id, record);
        self.aliases.insert(id, floor);
        self.room_floors.insert(room.clone(), id);
        Ok(id)
    }

    fn available_models(&self, category: &Category) -> Vec<String> {
        self.models
            .get(category)
            .map(|models| models.iter().map(|m| m.name.clone()).collect())
            .unwrap_or_default()
    }

    fn import_object(&mut self, request: ImportRequest) -> Result<ObjectId, CatalogError> {
        let parts = self
            .models
            .get(&request.category)
            .and_then(|models| models.iter().find(|m| m.name == request.model))
            .map(|m| m.parts.clone())
            .filter(|parts| !parts.is_empty())
            .ok_or_else(|| CatalogError::UnknownModel {
                category: request.category.clone(),
                model: request.model.clone(),
            })?;
        let id = self.add_body(
            request.name,
            request.category,
            None,
            parts,
            request.position,
            Vector3::new(1.0, 1.0, 1.0),
            false,
        );
        debug!(object = %id, "object imported");
        Ok(id)
    }
}

impl ObjectStates for BoxWorld {
    fn state(&self, object: ObjectId, state: ObjectState) -> Result<bool, CatalogError> {
        self.object(object)?;
        let body = self.resolve(object).unwrap_or(object);
        Ok(self.states.get(&(body, state)).copied().unwrap_or(false))
    }

    fn sample_state(
        &mut self,
        object: ObjectId,
        state: ObjectState,
        value: bool,
        rng: &mut dyn RngCore,
    ) -> Result<bool, CatalogError> {
        let current = self.state(object, state)?;
        let body = self.resolve(object).unwrap_or(object);

        if state == ObjectState::Sliced && current && !value {
            return Ok(false);
        }

        if matches!(state, ObjectState::Dusty | ObjectState::Stained) {
            if value {
                let extent = self
                    .body(body)
                    .map(|b| b.aabb().extent())
                    .unwrap_or_else(|_| Vector3::zeros());
                let capacity = ((extent.x * extent.y / PARTICLE_AREA) as usize).min(MAX_PARTICLES);
                let activated = if capacity == 0 {
                    0
                } else {
                    rng.gen_range(capacity / 2..=capacity)
                };
                if activated < MIN_PARTICLES {
                    trace!(%object, activated, "too few particles activated");
                    return Ok(false);
                }
                self.particles.insert((body, state), activated);
            } else {
                self.particles.remove(&(body, state));
            }
        }

        self.states.insert((body, state), value);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::ObjectSpec;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn world() -> BoxWorld {
        let scene = SceneDescription::new("unit")
            .with_room("kitchen_0", "kitchen", [0.0, 0.0], [4.0, 4.0])
            .with_object(
                ObjectSpec::boxed("table_0", "table", Vector3::new(2.0, 2.0, 0.4), Vector3::new(0.6, 0.4, 0.4))
                    .in_room("kitchen_0")
                    .fixed()
                    .supporting(SupportPredicate::OnTop),
            )
            .with_object(ObjectSpec::boxed(
                "apple_0",
                "apple",
                Vector3::new(2.0, 2.0, 0.85),
                Vector3::new(0.04, 0.04, 0.04),
            ));
        BoxWorld::from_description(scene).unwrap()
    }

    #[test]
    fn falling_body_comes_to_rest_in_contact() {
        let mut w = world();
        let apple = w.object_by_name("apple_0").unwrap();
        let table = w.object_by_name("table_0").unwrap();
        for _ in 0..240 {
            w.step().unwrap();
        }
        let aabb = w.aabb(apple).unwrap();
        assert!((aabb.min.z - 0.8).abs() < 1e-9);
        assert_eq!(w.contacts_between(apple, table).unwrap().len(), 1);
    }

    #[test]
    fn restore_rolls_back_poses() {
        let mut w = world();
        let apple = w.object_by_name("apple_0").unwrap();
        let before = w.pose(apple).unwrap();
        let state = w.save_state();
        w.set_body_pose(apple, Pose::at(Vector3::new(0.0, 0.0, 5.0))).unwrap();
        w.restore_state(state).unwrap();
        assert_eq!(w.pose(apple).unwrap(), before);
        w.remove_state(state).unwrap();
        assert_eq!(w.restore_state(state), Err(PhysicsError::UnknownState(state)));
    }

    #[test]
    fn room_floor_aliases_floor_body() {
        let mut w = world();
        let room = RoomInstanceId::new("kitchen_0");
        let floor = w.room_floor(&room).unwrap();
        assert_eq!(w.room_floor(&room).unwrap(), floor);
        let record = w.object(floor).unwrap();
        assert_eq!(record.category.as_str(), FLOOR_CATEGORY);
        assert!(record.support.supports(SupportPredicate::OnTop));
        let aabb = w.aabb(floor).unwrap();
        assert!(aabb.max.z.abs() < 1e-12);
    }

    #[test]
    fn table_support_surface_is_its_top() {
        let w = world();
        let table = w.object_by_name("table_0").unwrap();
        let record = w.object(table).unwrap();
        let (key, levels) = &record.support.surfaces(SupportPredicate::OnTop)[0];
        assert_eq!(key.link, LinkId(0));
        assert!((levels[0].height - 0.4).abs() < 1e-12);
        let link = w.link_pose(table, key.link).unwrap();
        assert!((link.position.z + levels[0].height - 0.8).abs() < 1e-12);
    }

    #[test]
    fn sliced_cannot_be_undone() {
        let mut w = world();
        let apple = w.object_by_name("apple_0").unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(w.sample_state(apple, ObjectState::Sliced, true, &mut rng).unwrap());
        assert!(!w.sample_state(apple, ObjectState::Sliced, false, &mut rng).unwrap());
        assert!(w.state(apple, ObjectState::Sliced).unwrap());
    }

    #[test]
    fn small_objects_cannot_hold_enough_dust() {
        let mut w = world();
        let apple = w.object_by_name("apple_0").unwrap();
        let table = w.object_by_name("table_0").unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(!w.sample_state(apple, ObjectState::Dusty, true, &mut rng).unwrap());
        assert!(w.sample_state(table, ObjectState::Dusty, true, &mut rng).unwrap());
        assert!(w.state(table, ObjectState::Dusty).unwrap());
    }

    #[test]
    fn taxonomy_expands_to_leaves() {
        let mut scene = SceneDescription::new("tax").with_taxonomy("fruit.n.01", &["apple", "citrus.n.01"]);
        scene = scene.with_taxonomy("citrus.n.01", &["orange", "lemon"]);
        let w = BoxWorld::from_description(scene).unwrap();
        let leaves = w.subtree_categories(&Category::new("fruit.n.01"));
        assert_eq!(
            leaves,
            vec![Category::new("apple"), Category::new("orange"), Category::new("lemon")]
        );
        assert_eq!(w.subtree_categories(&Category::new("apple")), vec![Category::new("apple")]);
    }
}
