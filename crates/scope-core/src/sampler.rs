//! Sampling a single condition
//!
//! Sampling tries to make a condition hold with its polarity:
//! - positive `ontop`/`inside` run the placement sampler
//! - unary states go through [`ObjectStates::sample_state`]
//! - everything else (`nextto`, `under`, `touching`, negated kinematic
//!   conditions, `inroom`) is evaluated as the scene stands

use crate::catalog::{ObjectStates, SceneBackend, SceneCatalog};
use crate::condition::{Condition, Relation};
use crate::config::PlacementConfig;
use crate::error::SamplingResult;
use crate::placement::{PlacementOutcome, PlacementSampler};
use crate::predicates;
use crate::scope::ObjectScope;
use crate::types::{ObjectId, RoomType};
use rand::Rng;
use tracing::trace;

/// Counters over every placement call made by one sampler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlacementStats {
    /// Placement calls
    pub calls: usize,
    /// Calls that placed the object
    pub placed: usize,
    /// Largest number of trial steps in a single call
    pub max_trial_steps: usize,
}

/// Samples conditions against the live scene
#[derive(Debug)]
pub struct ConditionSampler<'a> {
    placement: PlacementSampler<'a>,
    stats: PlacementStats,
}

impl<'a> ConditionSampler<'a> {
    /// Sampler with the given placement parameters
    #[must_use]
    pub fn new(config: &'a PlacementConfig) -> Self {
        Self {
            placement: PlacementSampler::new(config),
            stats: PlacementStats::default(),
        }
    }

    /// Placement counters so far
    #[must_use]
    pub fn stats(&self) -> PlacementStats {
        self.stats
    }

    /// Try to make `condition` hold under the current bindings
    ///
    /// # Errors
    /// `UnboundRole` when an operand is unbound, or fatal backend errors.
    /// A condition that cannot be made true is `Ok(false)`.
    pub fn sample<B, R>(
        &mut self,
        backend: &mut B,
        scope: &ObjectScope,
        condition: &Condition,
        rng: &mut R,
    ) -> SamplingResult<bool>
    where
        B: SceneBackend + ?Sized,
        R: Rng,
    {
        condition.check_arity()?;
        let objects = condition
            .body
            .iter()
            .map(|r| scope.require(r))
            .collect::<Result<Vec<ObjectId>, _>>()?;

        let holds = match &condition.relation {
            Relation::Kinematic(predicate) => {
                let (a, b) = (objects[0], objects[1]);
                match predicate.support_predicate() {
                    Some(support) if condition.positive => {
                        let outcome = self.placement.place(backend, a, b, support, rng)?;
                        self.record(&outcome);
                        outcome.is_placed()
                    }
                    _ => predicates::evaluate(&*backend, *predicate, a, b)? == condition.positive,
                }
            }
            Relation::State(state) => backend.sample_state(objects[0], *state, condition.positive, rng)?,
            Relation::InRoom(room_type) => {
                in_room_type(&*backend, objects[0], room_type)? == condition.positive
            }
        };
        trace!(%condition, holds, "sampled condition");
        Ok(holds)
    }

    /// Whether `condition` holds now, without sampling
    ///
    /// # Errors
    /// As [`Self::sample`]
    pub fn evaluate<B>(backend: &B, scope: &ObjectScope, condition: &Condition) -> SamplingResult<bool>
    where
        B: SceneBackend + ?Sized,
    {
        condition.check_arity()?;
        let objects = condition
            .body
            .iter()
            .map(|r| scope.require(r))
            .collect::<Result<Vec<ObjectId>, _>>()?;
        let value = match &condition.relation {
            Relation::Kinematic(predicate) => predicates::evaluate(backend, *predicate, objects[0], objects[1])?,
            Relation::State(state) => backend.state(objects[0], *state)?,
            Relation::InRoom(room_type) => in_room_type(backend, objects[0], room_type)?,
        };
        Ok(value == condition.positive)
    }

    fn record(&mut self, outcome: &PlacementOutcome) {
        self.stats.calls += 1;
        if outcome.is_placed() {
            self.stats.placed += 1;
        }
        self.stats.max_trial_steps = self.stats.max_trial_steps.max(outcome.trial_steps());
    }
}

fn in_room_type<B>(backend: &B, object: ObjectId, room_type: &RoomType) -> SamplingResult<bool>
where
    B: SceneCatalog + ?Sized,
{
    let Some(room) = backend.object(object)?.room.clone() else {
        return Ok(false);
    };
    Ok(backend.room_type_instances(room_type).contains(&room))
}
