//! Task sampling controller
//!
//! Drives one attempt end to end:
//!
//! 1. validate the task
//! 2. resolve room types against the scene
//! 3. bind sampleable roles
//! 4. filter candidates against initial conditions
//! 5. for up to `max_goal_condition_sets` shuffled goal sets: filter against
//!    the goal, consolidate, match every room type, and reject the goal set
//!    if a matched object is already bound to another role
//! 6. finalize the scope and enforce the initial conditions
//!
//! Expected failures end the attempt with `success: false`; fatal errors are
//! returned as `Err`.

use crate::catalog::SceneBackend;
use crate::condition::Condition;
use crate::config::{DebugMode, SamplerConfig};
use crate::error::{InvariantViolation, SamplingError, SamplingResult};
use crate::instantiator::SampleableInstantiator;
use crate::journal::{JournalRecord, Phase, SamplingJournal};
use crate::matching::{match_room_type, RoomMatch};
use crate::resolver::{CandidateScope, RoomTypeResolver};
use crate::sampler::{ConditionSampler, PlacementStats};
use crate::scope::ObjectScope;
use crate::task::TaskDefinition;
use crate::types::RoomType;
use indexmap::IndexMap;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, error, info, warn};

/// Outcome of one sampling attempt
#[derive(Debug, Clone)]
pub struct SamplingReport {
    /// Whether every initial condition holds in the scene
    pub success: bool,
    /// Why the attempt failed
    pub failure: Option<SamplingError>,
    /// Conditions that could not be made true
    pub failed_conditions: Vec<Condition>,
    /// Role bindings at the end of the attempt
    pub scope: ObjectScope,
    /// Index into `ground_goal_options` of the accepted goal set
    pub goal_set_index: Option<usize>,
    /// Goal sets tried
    pub goal_sets_tried: usize,
    /// Room instance chosen per room type
    pub rooms: IndexMap<RoomType, RoomMatch>,
    /// Placement counters
    pub placement: PlacementStats,
    /// Hash-chained record of the attempt
    pub journal: SamplingJournal,
}

/// Mutable state threaded through one attempt
#[derive(Debug)]
struct Attempt {
    scope: ObjectScope,
    journal: SamplingJournal,
    goal_set_index: Option<usize>,
    goal_sets_tried: usize,
    rooms: IndexMap<RoomType, RoomMatch>,
    failed_conditions: Vec<Condition>,
}

impl Attempt {
    fn into_report(self, failure: Option<SamplingError>, placement: PlacementStats) -> SamplingReport {
        SamplingReport {
            success: failure.is_none(),
            failure,
            failed_conditions: self.failed_conditions,
            scope: self.scope,
            goal_set_index: self.goal_set_index,
            goal_sets_tried: self.goal_sets_tried,
            rooms: self.rooms,
            placement,
            journal: self.journal,
        }
    }
}

/// Grounds tasks in a scene
#[derive(Debug, Clone, Default)]
pub struct TaskSampler {
    config: SamplerConfig,
}

impl TaskSampler {
    /// Sampler with `config`
    #[must_use]
    pub fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    /// Configuration in use
    #[must_use]
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Run one attempt of `task` against the scene behind `backend`
    ///
    /// # Errors
    /// Only fatal errors (`InvariantViolation`, `Physics`, `Catalog`); every
    /// other failure is reported with `success: false`.
    pub fn sample<B, R>(&self, task: &TaskDefinition, backend: &mut B, rng: &mut R) -> SamplingResult<SamplingReport>
    where
        B: SceneBackend + ?Sized,
        R: Rng,
    {
        task.validate()?;
        let roles: Vec<_> = task.roles().map(|(r, _)| r.clone()).collect();
        let mut attempt = Attempt {
            scope: ObjectScope::new(&roles),
            journal: SamplingJournal::new(),
            goal_set_index: None,
            goal_sets_tried: 0,
            rooms: IndexMap::new(),
            failed_conditions: Vec::new(),
        };
        let mut sampler = ConditionSampler::new(&self.config.placement);

        let result = self.run(task, backend, rng, &mut sampler, &mut attempt);
        let stats = sampler.stats();
        match result {
            Ok(()) => {
                info!(
                    activity = %task.activity,
                    goal_set = ?attempt.goal_set_index,
                    bound = attempt.scope.bound_count(),
                    "task sampled"
                );
                Ok(attempt.into_report(None, stats))
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(activity = %task.activity, error = %e, "task sampling failed");
                Ok(attempt.into_report(Some(e), stats))
            }
        }
    }

    fn run<B, R>(
        &self,
        task: &TaskDefinition,
        backend: &mut B,
        rng: &mut R,
        sampler: &mut ConditionSampler<'_>,
        attempt: &mut Attempt,
    ) -> SamplingResult<()>
    where
        B: SceneBackend + ?Sized,
        R: Rng,
    {
        let resolver = RoomTypeResolver::new(task);
        let unfiltered = resolver.check_scene(backend, &mut attempt.journal)?;

        SampleableInstantiator::new(&self.config.instantiation).instantiate(
            task,
            backend,
            &mut attempt.scope,
            rng,
            &mut attempt.journal,
        )?;

        let mut initial = resolver.filter_initial(
            &unfiltered,
            backend,
            &mut attempt.scope,
            sampler,
            rng,
            &mut attempt.journal,
        )?;
        resolver.consolidate(&mut initial, "initial filtering", &mut attempt.journal)?;

        self.select_goal_set(task, &resolver, &unfiltered, &initial, backend, sampler, rng, attempt)?;
        attempt.scope.finalize(task.allow_shared_objects)?;
        info!(bound = attempt.scope.bound_count(), "object scope finalized");

        self.enforce(task, backend, sampler, rng, attempt)
    }

    /// Try shuffled goal sets until one survives goal filtering and matching
    #[allow(clippy::too_many_arguments)]
    fn select_goal_set<B, R>(
        &self,
        task: &TaskDefinition,
        resolver: &RoomTypeResolver<'_>,
        unfiltered: &CandidateScope,
        initial: &CandidateScope,
        backend: &mut B,
        sampler: &mut ConditionSampler<'_>,
        rng: &mut R,
        attempt: &mut Attempt,
    ) -> SamplingResult<()>
    where
        B: SceneBackend + ?Sized,
        R: Rng,
    {
        let no_goal: [Condition; 0] = [];
        let mut options: Vec<Option<usize>> = if task.ground_goal_options.is_empty() {
            vec![None]
        } else {
            (0..task.ground_goal_options.len()).map(Some).collect()
        };
        options.shuffle(rng);
        options.truncate(self.config.max_goal_condition_sets.max(1));

        let mut last_failure = None;
        for option in options {
            attempt.goal_sets_tried += 1;
            let goal: &[Condition] = option.map_or(&no_goal[..], |i| task.ground_goal_options[i].as_slice());
            attempt.journal.record(
                JournalRecord::new(Phase::GoalSelection, true)
                    .detail(option.map_or_else(|| "none".to_string(), |i| i.to_string())),
            );

            let mut filtered = resolver.filter_goal(
                goal,
                initial,
                backend,
                &mut attempt.scope,
                sampler,
                rng,
                &mut attempt.journal,
            )?;
            if let Some(role) = filtered.first_not_subset_of(initial) {
                return Err(InvariantViolation::NonMonotonicFiltering(role).into());
            }

            if self.config.debug == DebugMode::Verbose {
                resolver.debug_emptied_roles(
                    goal,
                    unfiltered,
                    &filtered,
                    backend,
                    &mut attempt.scope,
                    sampler,
                    rng,
                    &mut attempt.journal,
                )?;
            }

            if let Err(e) = resolver.consolidate(&mut filtered, "goal filtering", &mut attempt.journal) {
                debug!(goal_set = ?option, error = %e, "goal set rejected");
                last_failure = Some(e);
                continue;
            }

            let rooms = match self.match_all(&filtered, rng, &mut attempt.journal) {
                Ok(rooms) => rooms,
                Err(e) => {
                    debug!(goal_set = ?option, error = %e, "goal set rejected");
                    last_failure = Some(e);
                    continue;
                }
            };

            let previous: Vec<_> = rooms
                .values()
                .flat_map(|m| m.assignments.iter())
                .map(|(role, &object)| (role.clone(), attempt.scope.bind(role, object)))
                .collect();
            match attempt.scope.finalize(task.allow_shared_objects) {
                Ok(()) => {
                    info!(goal_set = ?option, tried = attempt.goal_sets_tried, "goal set accepted");
                    attempt.goal_set_index = option;
                    attempt.rooms = rooms;
                    return Ok(());
                }
                Err(InvariantViolation::SharedObject { first, second, object }) => {
                    for (role, binding) in previous.into_iter().rev() {
                        attempt.scope.restore(&role, binding);
                    }
                    let room_type = rooms
                        .iter()
                        .find(|(_, m)| m.assignments.contains_key(&second) || m.assignments.contains_key(&first))
                        .map_or_else(|| RoomType::new(""), |(rt, _)| rt.clone());
                    debug!(goal_set = ?option, %first, %second, %object, "goal set rejected: object shared by two roles");
                    attempt.journal.record(
                        JournalRecord::new(Phase::Matching, false)
                            .room_type(&room_type)
                            .object(object)
                            .detail(format!("shared by {first} and {second}")),
                    );
                    last_failure = Some(SamplingError::NoFeasibleRoomInstance {
                        room_type,
                        reason: format!("object {object} matched to both {first} and {second}"),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_failure.unwrap_or_else(|| SamplingError::NoFeasibleRoomInstance {
            room_type: RoomType::new(""),
            reason: "no goal condition set tried".into(),
        }))
    }

    /// Match every room type; fails on the first room type without a perfect
    /// matching in any instance
    fn match_all<R: Rng>(
        &self,
        candidates: &CandidateScope,
        rng: &mut R,
        journal: &mut SamplingJournal,
    ) -> SamplingResult<IndexMap<RoomType, RoomMatch>> {
        let mut rooms = IndexMap::new();
        for room_type in candidates.room_types() {
            match match_room_type(candidates, room_type, rng) {
                Some(found) => {
                    journal.record(
                        JournalRecord::new(Phase::Matching, true)
                            .room_type(room_type)
                            .room_instance(&found.room)
                            .detail(format!("tried {}", found.tried)),
                    );
                    rooms.insert(room_type.clone(), found);
                }
                None => {
                    warn!(%room_type, "no room instance yields a perfect matching");
                    journal.record(JournalRecord::new(Phase::Matching, false).room_type(room_type));
                    return Err(SamplingError::NoFeasibleRoomInstance {
                        room_type: room_type.clone(),
                        reason: "no perfect matching".into(),
                    });
                }
            }
        }
        Ok(rooms)
    }

    /// Re-sample non-sampleable initial conditions, then sampleable-only ones
    fn enforce<B, R>(
        &self,
        task: &TaskDefinition,
        backend: &mut B,
        sampler: &mut ConditionSampler<'_>,
        rng: &mut R,
        attempt: &mut Attempt,
    ) -> SamplingResult<()>
    where
        B: SceneBackend + ?Sized,
        R: Rng,
    {
        let (non_sampleable, sampleable): (Vec<&Condition>, Vec<&Condition>) = task
            .initial_conditions
            .iter()
            .partition(|c| task.is_non_sampleable_condition(c));

        for condition in non_sampleable {
            let mut holds = false;
            let mut trials = 0;
            while trials < self.config.max_resample_trials {
                trials += 1;
                if sampler.sample(backend, &attempt.scope, condition, rng)? {
                    holds = true;
                    break;
                }
            }
            attempt.journal.record(
                JournalRecord::new(Phase::Enforcement, holds)
                    .condition(condition)
                    .detail(format!("{trials} trials")),
            );
            if !holds {
                error!(%condition, trials, "condition failed re-sampling after successful matching");
                attempt.failed_conditions.push(condition.clone());
                return Err(SamplingError::ConditionReSampleFailure {
                    condition: condition.clone(),
                });
            }
        }

        for condition in sampleable {
            let holds = sampler.sample(backend, &attempt.scope, condition, rng)?;
            attempt.journal.record(JournalRecord::new(Phase::Enforcement, holds).condition(condition));
            if !holds {
                warn!(%condition, "sampleable condition failed");
                attempt.failed_conditions.push(condition.clone());
                return Err(SamplingError::SampleableConditionFailure {
                    condition: condition.clone(),
                });
            }
        }
        Ok(())
    }
}
