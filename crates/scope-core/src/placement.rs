//! Physics-validated placement on support surfaces
//!
//! A placement call parks the object, checkpoints the world once and then
//! runs up to `max_trials` trials. Each trial picks a surface and height
//! level, erodes its occupancy grid by the object's footprint, drops the
//! object onto a random surviving cell, steps once and checks for contacts.
//! The checkpoint is restored after every trial; the winning pose is
//! re-applied afterwards and the object settles under gravity.

use crate::catalog::SceneCatalog;
use crate::condition::SupportPredicate;
use crate::config::PlacementConfig;
use crate::error::{SamplingError, SamplingResult};
use crate::physics::{in_contact, PhysicsWorld};
use crate::support::{cell_to_local, clearance_kernel, OccupancyGrid, SupportSurface, SurfaceKey};
use crate::types::{ObjectId, Pose};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use tracing::{debug, trace, warn};

/// Result of one placement call
#[derive(Debug, Clone, PartialEq)]
pub enum PlacementOutcome {
    /// A collision-free pose was found and applied
    Placed {
        /// Pose applied before settling
        pose: Pose,
        /// Trials used, including the successful one
        trials: usize,
        /// Physics steps taken by trials, excluding settling
        trial_steps: usize,
    },
    /// Every trial collided or found no free cell
    Exhausted {
        /// Trials used
        trials: usize,
        /// Physics steps taken by trials
        trial_steps: usize,
    },
    /// The support object has no surface for the predicate
    NoSupportSurface,
}

impl PlacementOutcome {
    /// Whether the object was placed
    #[inline]
    #[must_use]
    pub fn is_placed(&self) -> bool {
        matches!(self, Self::Placed { .. })
    }

    /// Steps spent in trials
    #[must_use]
    pub fn trial_steps(&self) -> usize {
        match self {
            Self::Placed { trial_steps, .. } | Self::Exhausted { trial_steps, .. } => *trial_steps,
            Self::NoSupportSurface => 0,
        }
    }

    /// Convert a failed outcome into the matching error
    ///
    /// # Errors
    /// `PlacementSamplingExhausted` unless the object was placed
    pub fn into_result(
        self,
        object: ObjectId,
        support: ObjectId,
        predicate: SupportPredicate,
    ) -> SamplingResult<Pose> {
        match self {
            Self::Placed { pose, .. } => Ok(pose),
            Self::Exhausted { trials, .. } => Err(SamplingError::PlacementSamplingExhausted {
                object,
                support,
                predicate: predicate.to_string(),
                trials,
            }),
            Self::NoSupportSurface => Err(SamplingError::PlacementSamplingExhausted {
                object,
                support,
                predicate: predicate.to_string(),
                trials: 0,
            }),
        }
    }
}

/// Randomized placement search
#[derive(Debug, Clone, Copy)]
pub struct PlacementSampler<'a> {
    config: &'a PlacementConfig,
}

impl<'a> PlacementSampler<'a> {
    /// Sampler using `config`
    #[must_use]
    pub fn new(config: &'a PlacementConfig) -> Self {
        Self { config }
    }

    /// Place `object` on or inside `support`
    ///
    /// # Errors
    /// Fatal backend errors only; running out of trials is an
    /// [`PlacementOutcome::Exhausted`] outcome.
    pub fn place<B, R>(
        &self,
        backend: &mut B,
        object: ObjectId,
        support: ObjectId,
        predicate: SupportPredicate,
        rng: &mut R,
    ) -> SamplingResult<PlacementOutcome>
    where
        B: PhysicsWorld + SceneCatalog + ?Sized,
        R: Rng + ?Sized,
    {
        let support_record = backend.object(support)?;
        let support_scale = support_record.scale;
        let surfaces: Vec<(SurfaceKey, Vec<SupportSurface>)> = support_record
            .support
            .surfaces(predicate)
            .iter()
            .filter(|(_, levels)| !levels.is_empty())
            .cloned()
            .collect();
        if surfaces.is_empty() {
            debug!(%object, %support, %predicate, "support object has no surface for predicate");
            return Ok(PlacementOutcome::NoSupportSurface);
        }

        let record = backend.object(object)?;
        let size = record.bounding_box.component_mul(&record.scale);
        let kernel = clearance_kernel(size.x, size.y, &support_scale);

        backend.set_body_pose(object, Pose::at(self.config.parking_position))?;
        let parked = backend.aabb(object)?;
        let base_to_origin = self.config.parking_position.z - parked.center().z;
        let half_height = parked.extent().z / 2.0;
        let checkpoint = backend.save_state();

        let mut eroded: HashMap<(usize, usize), OccupancyGrid> = HashMap::new();
        let mut trial_steps = 0;

        for trial in 1..=self.config.max_trials {
            let surface_idx = rng.gen_range(0..surfaces.len());
            let (key, levels) = &surfaces[surface_idx];
            let level_idx = rng.gen_range(0..levels.len());
            let level = &levels[level_idx];
            let grid = eroded
                .entry((surface_idx, level_idx))
                .or_insert_with(|| level.grid.erode(kernel.0, kernel.1));

            let cells = grid.nonzero_cells();
            let Some(&cell) = cells.choose(rng) else {
                trace!(%object, trial, "eroded grid is empty");
                continue;
            };

            let local = cell_to_local(cell, level.height).component_mul(&support_scale);
            let link = backend.link_pose(key.body, key.link)?;
            let mut target = link.transform_point(&local);
            target.z += self.config.z_offset;
            target.z += half_height + base_to_origin;
            let pose = Pose::at(target);

            backend.set_body_pose(object, pose)?;
            backend.step()?;
            trial_steps += 1;
            let collision_free = backend.contacts(object)?.is_empty();
            backend.restore_state(checkpoint)?;

            if collision_free {
                backend.set_body_pose(object, pose)?;
                backend.remove_state(checkpoint)?;
                debug!(%object, %support, %predicate, trial, "placement succeeded");
                self.settle(backend, object, support)?;
                return Ok(PlacementOutcome::Placed {
                    pose,
                    trials: trial,
                    trial_steps,
                });
            }
            trace!(%object, trial, "placement trial collided");
        }

        backend.remove_state(checkpoint)?;
        warn!(
            %object,
            %support,
            %predicate,
            trials = self.config.max_trials,
            "placement sampling exhausted"
        );
        Ok(PlacementOutcome::Exhausted {
            trials: self.config.max_trials,
            trial_steps,
        })
    }

    /// Let the object fall until it touches `support` or the settle time ends
    fn settle<B>(&self, backend: &mut B, object: ObjectId, support: ObjectId) -> SamplingResult<()>
    where
        B: PhysicsWorld + ?Sized,
    {
        let timestep = backend.timestep();
        if timestep <= 0.0 {
            return Ok(());
        }
        let steps = (self.config.settle_duration_secs / timestep) as usize;
        for _ in 0..steps {
            backend.step()?;
            if in_contact(&*backend, object, support)? {
                break;
            }
        }
        Ok(())
    }
}
