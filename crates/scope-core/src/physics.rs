//! Narrow view of the rigid-body engine
//!
//! The sampler never simulates anything itself. It parks, poses, steps and
//! checkpoints bodies through [`PhysicsWorld`], and reads back bounding boxes
//! and contacts to evaluate predicates.

use crate::error::PhysicsError;
use crate::types::{Aabb, LinkId, ObjectId, Pose, StateId};
use nalgebra::Vector3;

/// One contact point reported by the engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// Body on the other side of the contact
    pub other: ObjectId,
    /// World position of the contact
    pub point: Vector3<f64>,
}

/// Rigid-body engine operations used by predicate evaluation and placement
///
/// All calls are synchronous. A saved state is owned by whoever saved it until
/// it is restored and removed.
pub trait PhysicsWorld {
    /// Advance the simulation by one [`timestep`](Self::timestep)
    ///
    /// # Errors
    /// Engine-specific failures
    fn step(&mut self) -> Result<(), PhysicsError>;

    /// Seconds simulated per [`step`](Self::step)
    fn timestep(&self) -> f64;

    /// Checkpoint every body pose and velocity
    fn save_state(&mut self) -> StateId;

    /// Roll back to a checkpoint; the checkpoint stays available
    ///
    /// # Errors
    /// `UnknownState` when the checkpoint was removed or never existed
    fn restore_state(&mut self, state: StateId) -> Result<(), PhysicsError>;

    /// Drop a checkpoint
    ///
    /// # Errors
    /// `UnknownState` when the checkpoint does not exist
    fn remove_state(&mut self, state: StateId) -> Result<(), PhysicsError>;

    /// World-space bounding box of a body
    ///
    /// # Errors
    /// `UnknownBody`
    fn aabb(&self, body: ObjectId) -> Result<Aabb, PhysicsError>;

    /// Every contact involving `body`
    ///
    /// # Errors
    /// `UnknownBody`
    fn contacts(&self, body: ObjectId) -> Result<Vec<Contact>, PhysicsError>;

    /// Contacts between two specific bodies
    ///
    /// # Errors
    /// `UnknownBody`
    fn contacts_between(&self, a: ObjectId, b: ObjectId) -> Result<Vec<Contact>, PhysicsError>;

    /// World pose of a link; [`LinkId::BASE`] is the body frame
    ///
    /// # Errors
    /// `UnknownBody` or `UnknownLink`
    fn link_pose(&self, body: ObjectId, link: LinkId) -> Result<Pose, PhysicsError>;

    /// Teleport a body and zero its velocity
    ///
    /// # Errors
    /// `UnknownBody`
    fn set_body_pose(&mut self, body: ObjectId, pose: Pose) -> Result<(), PhysicsError>;
}

/// Whether the two bodies currently touch
///
/// # Errors
/// Propagates `UnknownBody`
pub fn in_contact<W: PhysicsWorld + ?Sized>(
    world: &W,
    a: ObjectId,
    b: ObjectId,
) -> Result<bool, PhysicsError> {
    Ok(!world.contacts_between(a, b)?.is_empty())
}
