//! Room-type resolution and candidate filtering
//!
//! For every room type named by an `inroom` condition the resolver builds
//! `candidates[room_type][role][room_instance]`: the objects of the role's
//! category located in that room instance. Filtering then keeps only the
//! candidates for which the role's conditions can be sampled true (a
//! condition on two room-anchored roles is tried against the partner's
//! candidates in the same room instance), and
//! consolidation keeps only the room instances that still host every role of
//! the room type.

use crate::catalog::SceneBackend;
use crate::condition::{Condition, Relation};
use crate::error::{InvariantViolation, SamplingError, SamplingResult};
use crate::journal::{JournalRecord, Phase, SamplingJournal};
use crate::sampler::ConditionSampler;
use crate::scope::ObjectScope;
use crate::task::{TaskDefinition, FLOOR_CATEGORY};
use crate::types::{ObjectId, RoleId, RoomInstanceId, RoomType};
use indexmap::{IndexMap, IndexSet};
use rand::Rng;
use tracing::{debug, info, trace, warn};

/// Candidate objects of one role, per room instance
pub type RoomCandidates = IndexMap<RoomInstanceId, Vec<ObjectId>>;

/// `candidates[room_type][role][room_instance]`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateScope {
    rooms: IndexMap<RoomType, IndexMap<RoleId, RoomCandidates>>,
}

impl CandidateScope {
    /// Empty scope
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a role under a room type with its candidates
    pub fn insert(&mut self, room_type: RoomType, role: RoleId, candidates: RoomCandidates) {
        self.rooms.entry(room_type).or_default().insert(role, candidates);
    }

    /// Room types in task order
    pub fn room_types(&self) -> impl Iterator<Item = &RoomType> {
        self.rooms.keys()
    }

    /// Roles bound to a room type
    #[must_use]
    pub fn roles(&self, room_type: &RoomType) -> Vec<RoleId> {
        self.rooms
            .get(room_type)
            .map(|roles| roles.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Candidates of one role
    #[must_use]
    pub fn candidates(&self, room_type: &RoomType, role: &RoleId) -> Option<&RoomCandidates> {
        self.rooms.get(room_type).and_then(|roles| roles.get(role))
    }

    /// Room instances that host every role of the room type
    #[must_use]
    pub fn room_instances(&self, room_type: &RoomType) -> Vec<RoomInstanceId> {
        let Some(roles) = self.rooms.get(room_type) else {
            return Vec::new();
        };
        let mut iter = roles.values();
        let Some(first) = iter.next() else {
            return Vec::new();
        };
        let mut shared: IndexSet<RoomInstanceId> = first.keys().cloned().collect();
        for other in iter {
            shared.retain(|room| other.contains_key(room));
        }
        shared.into_iter().collect()
    }

    /// Roles that have no candidate in any room instance
    #[must_use]
    pub fn empty_roles(&self, room_type: &RoomType) -> Vec<RoleId> {
        self.rooms
            .get(room_type)
            .map(|roles| {
                roles
                    .iter()
                    .filter(|(_, c)| c.values().all(Vec::is_empty))
                    .map(|(r, _)| r.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Drop every room instance outside `keep`
    pub fn restrict(&mut self, room_type: &RoomType, keep: &[RoomInstanceId]) {
        if let Some(roles) = self.rooms.get_mut(room_type) {
            for candidates in roles.values_mut() {
                candidates.retain(|room, _| keep.contains(room));
            }
        }
    }

    /// First role whose candidates are not contained in `other`'s
    #[must_use]
    pub fn first_not_subset_of(&self, other: &CandidateScope) -> Option<RoleId> {
        for (room_type, roles) in &self.rooms {
            for (role, candidates) in roles {
                let Some(theirs) = other.candidates(room_type, role) else {
                    return Some(role.clone());
                };
                for (room, objects) in candidates {
                    let Some(their_objects) = theirs.get(room) else {
                        return Some(role.clone());
                    };
                    if objects.iter().any(|o| !their_objects.contains(o)) {
                        return Some(role.clone());
                    }
                }
            }
        }
        None
    }

    /// Objects an unbound co-operand may take when paired with a candidate
    /// located in `room`
    ///
    /// A co-operand of the same room type is limited to `room`; one anchored
    /// to another room type may take any of its candidates. `None` when the
    /// role is not room-anchored.
    #[must_use]
    pub fn partner_candidates(&self, room_type: &RoomType, room: &RoomInstanceId, role: &RoleId) -> Option<Vec<ObjectId>> {
        if let Some(candidates) = self.candidates(room_type, role) {
            return Some(candidates.get(room).cloned().unwrap_or_default());
        }
        self.rooms
            .values()
            .find_map(|roles| roles.get(role))
            .map(|candidates| candidates.values().flatten().copied().collect())
    }

    /// Whether every candidate here is also a candidate in `other`
    #[must_use]
    pub fn is_subset_of(&self, other: &CandidateScope) -> bool {
        self.first_not_subset_of(other).is_none()
    }

    /// Total candidate count across room types, roles and instances
    #[must_use]
    pub fn candidate_count(&self) -> usize {
        self.rooms
            .values()
            .flat_map(IndexMap::values)
            .flat_map(IndexMap::values)
            .map(Vec::len)
            .sum()
    }
}

/// Which conditions a filtering pass samples for a role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterStage {
    Initial,
    Goal,
}

impl FilterStage {
    fn phase(self) -> Phase {
        match self {
            FilterStage::Initial => Phase::InitialFilter,
            FilterStage::Goal => Phase::GoalFilter,
        }
    }

    fn label(self) -> &'static str {
        match self {
            FilterStage::Initial => "initial filtering",
            FilterStage::Goal => "goal filtering",
        }
    }
}

/// Resolves room-anchored roles of one task
#[derive(Debug, Clone, Copy)]
pub struct RoomTypeResolver<'t> {
    task: &'t TaskDefinition,
}

impl<'t> RoomTypeResolver<'t> {
    /// Resolver for `task`
    #[must_use]
    pub fn new(task: &'t TaskDefinition) -> Self {
        Self { task }
    }

    /// Build the unfiltered candidate scope from the scene
    ///
    /// # Errors
    /// `SceneMissingRoomType` when the scene lacks a room type,
    /// `NoFeasibleRoomInstance` when no room instance hosts every role of a
    /// room type, fatal catalog errors otherwise
    pub fn check_scene<B>(&self, backend: &mut B, journal: &mut SamplingJournal) -> SamplingResult<CandidateScope>
    where
        B: SceneBackend + ?Sized,
    {
        let mut scope = CandidateScope::new();
        for (role, room_type) in self.task.room_assignments() {
            let instances = backend.room_type_instances(&room_type);
            if instances.is_empty() {
                warn!(%room_type, scene = backend.scene_id(), "room type missing in scene");
                journal.record(
                    JournalRecord::new(Phase::SceneCheck, false)
                        .room_type(&room_type)
                        .detail("missing"),
                );
                return Err(SamplingError::SceneMissingRoomType {
                    room_type,
                    scene: backend.scene_id().to_string(),
                });
            }

            let category = self
                .task
                .category_of(&role)
                .cloned()
                .ok_or_else(|| InvariantViolation::UndeclaredRole(role.clone()))?;
            let concrete = backend.subtree_categories(&category);

            let mut candidates = RoomCandidates::new();
            for room in instances {
                let objects = if category.as_str() == FLOOR_CATEGORY {
                    vec![backend.room_floor(&room)?]
                } else {
                    let mut objects = Vec::new();
                    for id in backend.objects_by_room_instance(&room) {
                        if concrete.contains(&backend.object(id)?.category) {
                            objects.push(id);
                        }
                    }
                    objects
                };
                if objects.is_empty() {
                    continue;
                }
                journal.record(
                    JournalRecord::new(Phase::SceneCheck, true)
                        .room_type(&room_type)
                        .role(&role)
                        .room_instance(&room)
                        .detail(format!("{} candidates", objects.len())),
                );
                candidates.insert(room, objects);
            }
            scope.insert(room_type, role, candidates);
        }

        self.consolidate(&mut scope, "scene check", journal)?;
        Ok(scope)
    }

    /// Keep candidates whose non-sampleable initial conditions sample true
    ///
    /// # Errors
    /// Fatal errors only; emptied room types surface through
    /// [`Self::consolidate`]
    #[allow(clippy::too_many_arguments)]
    pub fn filter_initial<B, R>(
        &self,
        unfiltered: &CandidateScope,
        backend: &mut B,
        scope: &mut ObjectScope,
        sampler: &mut ConditionSampler<'_>,
        rng: &mut R,
        journal: &mut SamplingJournal,
    ) -> SamplingResult<CandidateScope>
    where
        B: SceneBackend + ?Sized,
        R: Rng,
    {
        let task = self.task;
        let conditions: Vec<&Condition> = task
            .initial_conditions
            .iter()
            .filter(|c| !matches!(c.relation, Relation::InRoom(_)))
            .filter(|c| task.is_non_sampleable_condition(c))
            .collect();
        self.filter(FilterStage::Initial, &conditions, unfiltered, backend, scope, sampler, rng, journal)
    }

    /// Keep candidates for which the positive `ontop`/`inside`/`under`
    /// conditions of one goal set sample true
    ///
    /// # Errors
    /// As [`Self::filter_initial`]
    #[allow(clippy::too_many_arguments)]
    pub fn filter_goal<B, R>(
        &self,
        goal: &[Condition],
        initial: &CandidateScope,
        backend: &mut B,
        scope: &mut ObjectScope,
        sampler: &mut ConditionSampler<'_>,
        rng: &mut R,
        journal: &mut SamplingJournal,
    ) -> SamplingResult<CandidateScope>
    where
        B: SceneBackend + ?Sized,
        R: Rng,
    {
        let conditions = goal_filter_conditions(goal);
        self.filter(FilterStage::Goal, &conditions, initial, backend, scope, sampler, rng, journal)
    }

    /// Keep, per room type, only the room instances that host every role
    ///
    /// # Errors
    /// `NoFeasibleRoomInstance` for the first room type left with none
    pub fn consolidate(
        &self,
        candidates: &mut CandidateScope,
        stage: &str,
        journal: &mut SamplingJournal,
    ) -> SamplingResult<()> {
        let room_types: Vec<RoomType> = candidates.room_types().cloned().collect();
        for room_type in room_types {
            let shared = candidates.room_instances(&room_type);
            if shared.is_empty() {
                warn!(%room_type, stage, "no room instance hosts every role");
                journal.record(
                    JournalRecord::new(Phase::SceneCheck, false)
                        .room_type(&room_type)
                        .detail(format!("{stage}: empty intersection")),
                );
                return Err(SamplingError::NoFeasibleRoomInstance {
                    room_type,
                    reason: format!("{stage}: no room instance hosts every role"),
                });
            }
            candidates.restrict(&room_type, &shared);
            debug!(%room_type, stage, instances = shared.len(), "room instances consolidated");
        }
        Ok(())
    }

    /// Re-sample roles emptied by goal filtering against every unfiltered
    /// candidate, logging the outcome of each goal condition
    ///
    /// Diagnostics only: the bindings of `scope` are left as they were.
    ///
    /// # Errors
    /// Fatal errors only
    #[allow(clippy::too_many_arguments)]
    pub fn debug_emptied_roles<B, R>(
        &self,
        goal: &[Condition],
        unfiltered: &CandidateScope,
        filtered: &CandidateScope,
        backend: &mut B,
        scope: &mut ObjectScope,
        sampler: &mut ConditionSampler<'_>,
        rng: &mut R,
        journal: &mut SamplingJournal,
    ) -> SamplingResult<()>
    where
        B: SceneBackend + ?Sized,
        R: Rng,
    {
        let conditions = goal_filter_conditions(goal);
        for room_type in filtered.room_types() {
            for role in filtered.empty_roles(room_type) {
                let Some(all) = unfiltered.candidates(room_type, &role) else {
                    continue;
                };
                for (room, objects) in all {
                    for &object in objects {
                        let previous = scope.bind(&role, object);
                        for condition in conditions.iter().filter(|c| c.involves(&role)) {
                            if !scope.all_bound(&condition.body) {
                                continue;
                            }
                            let holds = sampler.sample(backend, scope, condition, rng)?;
                            info!(%room_type, %role, %room, %object, %condition, holds, "debug re-sample");
                            journal.record(
                                JournalRecord::new(Phase::Debug, holds)
                                    .room_type(room_type)
                                    .role(&role)
                                    .room_instance(room)
                                    .object(object)
                                    .condition(condition),
                            );
                        }
                        scope.restore(&role, previous);
                    }
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn filter<B, R>(
        &self,
        stage: FilterStage,
        conditions: &[&Condition],
        source: &CandidateScope,
        backend: &mut B,
        scope: &mut ObjectScope,
        sampler: &mut ConditionSampler<'_>,
        rng: &mut R,
        journal: &mut SamplingJournal,
    ) -> SamplingResult<CandidateScope>
    where
        B: SceneBackend + ?Sized,
        R: Rng,
    {
        let mut filtered = CandidateScope::new();
        for room_type in source.room_types() {
            for role in source.roles(room_type) {
                let relevant: Vec<&Condition> = conditions
                    .iter()
                    .copied()
                    .filter(|c| c.involves(&role))
                    .collect();
                let mut kept = RoomCandidates::new();
                if let Some(per_room) = source.candidates(room_type, &role) {
                    for (room, objects) in per_room {
                        let mut survivors = Vec::new();
                        for &object in objects {
                            let previous = scope.bind(&role, object);
                            let mut survived = true;
                            for condition in &relevant {
                                let pairing = Pairing {
                                    room_type,
                                    room,
                                    object,
                                    source,
                                };
                                if !sample_paired(condition, &pairing, backend, scope, sampler, rng)? {
                                    survived = false;
                                    break;
                                }
                            }
                            scope.restore(&role, previous);
                            debug!(stage = stage.label(), %room_type, %role, %room, %object, survived, "candidate sampled");
                            journal.record(
                                JournalRecord::new(stage.phase(), survived)
                                    .room_type(room_type)
                                    .role(&role)
                                    .room_instance(room)
                                    .object(object),
                            );
                            if survived {
                                survivors.push(object);
                            }
                        }
                        if !survivors.is_empty() {
                            kept.insert(room.clone(), survivors);
                        }
                    }
                }
                filtered.insert(room_type.clone(), role, kept);
            }
        }
        Ok(filtered)
    }
}

/// Where the candidate under test sits
struct Pairing<'s> {
    room_type: &'s RoomType,
    room: &'s RoomInstanceId,
    object: ObjectId,
    source: &'s CandidateScope,
}

/// Sample `condition` for one candidate
///
/// An unbound room-anchored co-operand is bound in turn to each of its
/// partner candidates; the condition holds if any pairing samples true.
/// Conditions with any other unbound operand are not sampled.
fn sample_paired<B, R>(
    condition: &Condition,
    pairing: &Pairing<'_>,
    backend: &mut B,
    scope: &mut ObjectScope,
    sampler: &mut ConditionSampler<'_>,
    rng: &mut R,
) -> SamplingResult<bool>
where
    B: SceneBackend + ?Sized,
    R: Rng,
{
    let unbound: Vec<RoleId> = condition
        .body
        .iter()
        .filter(|r| scope.get(r).is_none())
        .cloned()
        .collect();
    let co_role = match unbound.as_slice() {
        [] => return sampler.sample(backend, scope, condition, rng),
        [co_role] => co_role,
        _ => {
            debug!(%condition, "several operands unbound, not sampled during filtering");
            return Ok(true);
        }
    };
    let Some(partners) = pairing
        .source
        .partner_candidates(pairing.room_type, pairing.room, co_role)
    else {
        debug!(%condition, role = %co_role, "operand not room-anchored, not sampled during filtering");
        return Ok(true);
    };

    for partner in partners {
        if partner == pairing.object {
            continue;
        }
        let previous = scope.bind(co_role, partner);
        let holds = sampler.sample(backend, scope, condition, rng);
        scope.restore(co_role, previous);
        if holds? {
            trace!(%condition, %partner, "paired candidate holds");
            return Ok(true);
        }
    }
    debug!(%condition, room = %pairing.room, object = %pairing.object, "no partner satisfies the condition");
    Ok(false)
}

fn goal_filter_conditions(goal: &[Condition]) -> Vec<&Condition> {
    goal.iter()
        .filter(|c| c.positive)
        .filter(|c| c.predicate().is_some_and(|p| p.constrains_room_filtering()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope_with(entries: &[(&str, &str, &str, &[u32])]) -> CandidateScope {
        let mut scope = CandidateScope::new();
        for (room_type, role, room, objects) in entries {
            let rt = RoomType::new(*room_type);
            let role = RoleId::new(*role);
            let mut current = scope.candidates(&rt, &role).cloned().unwrap_or_default();
            current.insert(
                RoomInstanceId::new(*room),
                objects.iter().map(|&o| ObjectId(o)).collect(),
            );
            scope.insert(rt, role, current);
        }
        scope
    }

    #[test]
    fn intersection_across_roles() {
        let scope = scope_with(&[
            ("kitchen", "a", "kitchen_0", &[1]),
            ("kitchen", "a", "kitchen_1", &[2]),
            ("kitchen", "b", "kitchen_1", &[3]),
        ]);
        assert_eq!(
            scope.room_instances(&RoomType::new("kitchen")),
            vec![RoomInstanceId::new("kitchen_1")]
        );
    }

    #[test]
    fn restrict_drops_other_rooms() {
        let mut scope = scope_with(&[
            ("kitchen", "a", "kitchen_0", &[1]),
            ("kitchen", "a", "kitchen_1", &[2]),
        ]);
        scope.restrict(&RoomType::new("kitchen"), &[RoomInstanceId::new("kitchen_1")]);
        assert_eq!(scope.candidate_count(), 1);
    }

    #[test]
    fn subset_detection() {
        let big = scope_with(&[("kitchen", "a", "kitchen_0", &[1, 2])]);
        let small = scope_with(&[("kitchen", "a", "kitchen_0", &[2])]);
        let other = scope_with(&[("kitchen", "a", "kitchen_0", &[3])]);
        assert!(small.is_subset_of(&big));
        assert!(!big.is_subset_of(&small));
        assert_eq!(other.first_not_subset_of(&big), Some(RoleId::new("a")));
    }

    #[test]
    fn empty_roles_are_reported() {
        let mut scope = scope_with(&[("kitchen", "a", "kitchen_0", &[1])]);
        scope.insert(RoomType::new("kitchen"), RoleId::new("b"), RoomCandidates::new());
        assert_eq!(scope.empty_roles(&RoomType::new("kitchen")), vec![RoleId::new("b")]);
        assert!(scope.room_instances(&RoomType::new("kitchen")).is_empty());
    }

    #[test]
    fn partners_come_from_the_same_room_instance() {
        let scope = scope_with(&[
            ("living_room", "chair", "living_room_0", &[1]),
            ("living_room", "chair", "living_room_1", &[2]),
            ("living_room", "table", "living_room_1", &[3]),
            ("kitchen", "stove", "kitchen_0", &[4]),
            ("kitchen", "stove", "kitchen_1", &[5]),
        ]);
        let living_room = RoomType::new("living_room");
        let partners = |room: &str, role: &str| {
            scope.partner_candidates(&living_room, &RoomInstanceId::new(room), &RoleId::new(role))
        };
        assert_eq!(partners("living_room_1", "table"), Some(vec![ObjectId(3)]));
        assert_eq!(partners("living_room_0", "table"), Some(Vec::new()));
        assert_eq!(partners("living_room_0", "stove"), Some(vec![ObjectId(4), ObjectId(5)]));
        assert_eq!(partners("living_room_0", "apple"), None);
    }

    #[test]
    fn goal_filter_uses_positive_support_predicates_only() {
        use crate::condition::Predicate;
        let goal = vec![
            Condition::kinematic(Predicate::OnTop, "a", "b"),
            Condition::kinematic(Predicate::NextTo, "a", "b"),
            Condition::kinematic(Predicate::Under, "a", "b"),
            Condition::kinematic(Predicate::Inside, "a", "b").negated(),
        ];
        let picked = goal_filter_conditions(&goal);
        assert_eq!(picked.len(), 2);
    }
}
