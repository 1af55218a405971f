//! Randomized scenario harness
//!
//! Generates seeded scenes and tasks, runs the sampler on each, and checks
//! the properties every attempt must satisfy whether it succeeds or not.
//! Failing to ground an infeasible task is fine; breaking an invariant is not.

use crate::scene::{ModelSpec, ObjectSpec, SceneDescription};
use crate::world::BoxWorld;
use indexmap::{IndexMap, IndexSet};
use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use scope_core::condition::{Condition, ObjectState, Predicate, SupportPredicate};
use scope_core::config::SamplerConfig;
use scope_core::controller::{SamplingReport, TaskSampler};
use scope_core::sampler::ConditionSampler;
use scope_core::task::{TaskDefinition, FLOOR_CATEGORY};
use scope_core::types::{Category, ObjectId, RoleId};
use std::fmt::Write as _;
use tracing::{debug, info};

const ROOM_SIZE: f64 = 6.0;
const ROOM_SPACING: f64 = 10.0;
const ROOM_TYPES: [&str; 2] = ["kitchen", "living_room"];
const TABLE_CATEGORY: &str = "table.n.02";
const APPLE_CATEGORY: &str = "apple.n.01";
const BOWL_CATEGORY: &str = "bowl.n.01";

/// Harness configuration
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Seed of the first episode; episode `i` uses `seed + i`
    pub seed: u64,
    /// Episodes to run
    pub episodes: u64,
    /// Most instances generated per room type
    pub max_rooms_per_type: usize,
    /// Most tables generated per room
    pub max_tables_per_room: usize,
    /// Most apple roles per task
    pub max_apples: usize,
    /// Re-run each episode and compare journal digests
    pub check_replay: bool,
    /// Stop at the first episode with a violation
    pub stop_on_first_violation: bool,
    /// Sampler settings
    pub sampler: SamplerConfig,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            episodes: 50,
            max_rooms_per_type: 3,
            max_tables_per_room: 3,
            max_apples: 3,
            check_replay: true,
            stop_on_first_violation: true,
            sampler: SamplerConfig::default(),
        }
    }
}

/// A generated scene and task pair
#[derive(Debug, Clone)]
pub struct Episode {
    /// Position in the batch
    pub index: u64,
    /// Seed driving generation and sampling
    pub seed: u64,
    /// Scene
    pub scene: SceneDescription,
    /// Task
    pub task: TaskDefinition,
}

/// Property checked after every attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvariantCheck {
    /// Finalized roles resolve to distinct objects unless sharing is allowed
    ExclusiveScope,
    /// At most `max_goal_condition_sets` goal sets tried
    BoundedGoalSets,
    /// No placement call takes more than `max_trials` trial steps
    BoundedPlacementSteps,
    /// The journal hash chain verifies
    JournalIntegrity,
    /// A successful attempt leaves every initial condition true
    FinalConditionsHold,
    /// The same seed reproduces the same journal
    ReplayDeterminism,
}

/// Something the harness caught
#[derive(Debug, Clone)]
pub enum Violation {
    /// A property did not hold
    Invariant {
        /// Episode
        episode: u64,
        /// Property
        check: InvariantCheck,
        /// What was observed
        details: String,
    },
    /// The sampler returned a fatal error on a well-formed task
    Fatal {
        /// Episode
        episode: u64,
        /// Error text
        error: String,
    },
    /// The generated scene was rejected
    Scene {
        /// Episode
        episode: u64,
        /// Error text
        error: String,
    },
}

/// Tallies over the batch
#[derive(Debug, Clone, Default)]
pub struct EpisodeStats {
    /// Episodes run
    pub episodes: u64,
    /// Attempts that grounded the task
    pub successes: u64,
    /// Attempts that ended with `success: false`
    pub failures: u64,
    /// Failures per error kind
    pub failures_by_kind: IndexMap<&'static str, u64>,
    /// Placement calls over all attempts
    pub placement_calls: usize,
    /// Goal sets tried over all attempts
    pub goal_sets_tried: usize,
}

impl EpisodeStats {
    fn record(&mut self, report: &SamplingReport) {
        self.episodes += 1;
        self.placement_calls += report.placement.calls;
        self.goal_sets_tried += report.goal_sets_tried;
        match &report.failure {
            None => self.successes += 1,
            Some(e) => {
                self.failures += 1;
                *self.failures_by_kind.entry(e.kind()).or_insert(0) += 1;
            }
        }
    }
}

/// Batch outcome
#[derive(Debug, Clone)]
pub struct SimulatorReport {
    /// Settings used
    pub config: SimulatorConfig,
    /// Tallies
    pub stats: EpisodeStats,
    /// Everything that went wrong
    pub violations: Vec<Violation>,
}

impl SimulatorReport {
    /// No violations
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Human-readable summary
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== Scope Simulator Report ===\n");
        let _ = writeln!(out, "Seed: {}", self.config.seed);
        let _ = writeln!(out, "Episodes: {}", self.stats.episodes);
        let _ = writeln!(out, "Grounded: {}", self.stats.successes);
        let _ = writeln!(out, "Not grounded: {}", self.stats.failures);
        for (kind, count) in &self.stats.failures_by_kind {
            let _ = writeln!(out, "  {kind}: {count}");
        }
        let _ = writeln!(out, "Placement calls: {}", self.stats.placement_calls);
        let _ = writeln!(out, "Goal sets tried: {}", self.stats.goal_sets_tried);
        let _ = writeln!(out, "Violations: {}", self.violations.len());

        if !self.violations.is_empty() {
            let _ = writeln!(out, "\n=== Violations ===");
            for (i, v) in self.violations.iter().enumerate() {
                let _ = writeln!(out, "{}. {v:?}", i + 1);
            }
        }

        let _ = writeln!(out, "\n=== Result: {} ===", if self.passed() { "PASS" } else { "FAIL" });
        out
    }
}

/// Run the batch
#[must_use]
pub fn run_simulator(config: SimulatorConfig) -> SimulatorReport {
    let mut stats = EpisodeStats::default();
    let mut violations = Vec::new();

    for index in 0..config.episodes {
        let episode = generate_episode(index, config.seed.wrapping_add(index), &config);
        let before = violations.len();
        match run_episode(&episode, &config.sampler) {
            Ok((world, report)) => {
                stats.record(&report);
                for (check, details) in check_report(&world, &episode.task, &report, &config.sampler) {
                    violations.push(Violation::Invariant {
                        episode: index,
                        check,
                        details,
                    });
                }
                if config.check_replay {
                    if let Ok((_, replay)) = run_episode(&episode, &config.sampler) {
                        if replay.journal.digest() != report.journal.digest() {
                            violations.push(Violation::Invariant {
                                episode: index,
                                check: InvariantCheck::ReplayDeterminism,
                                details: format!(
                                    "digest {} then {}",
                                    report.journal.digest(),
                                    replay.journal.digest()
                                ),
                            });
                        }
                    }
                }
            }
            Err(violation) => violations.push(violation),
        }

        if violations.len() > before {
            debug!(episode = index, new = violations.len() - before, "episode violated invariants");
            if config.stop_on_first_violation {
                break;
            }
        }
    }

    info!(
        episodes = stats.episodes,
        grounded = stats.successes,
        violations = violations.len(),
        "simulation finished"
    );
    SimulatorReport {
        config,
        stats,
        violations,
    }
}

/// Build the world for `episode` and run one attempt
///
/// # Errors
/// A [`Violation`] when the scene is rejected or the sampler fails fatally
pub fn run_episode(episode: &Episode, config: &SamplerConfig) -> Result<(BoxWorld, SamplingReport), Violation> {
    let mut world = BoxWorld::from_description(episode.scene.clone()).map_err(|e| Violation::Scene {
        episode: episode.index,
        error: e.to_string(),
    })?;
    let mut rng = StdRng::seed_from_u64(episode.seed);
    let report = TaskSampler::new(config.clone())
        .sample(&episode.task, &mut world, &mut rng)
        .map_err(|e| Violation::Fatal {
            episode: episode.index,
            error: e.to_string(),
        })?;
    Ok((world, report))
}

/// Every property violated by `report`
#[must_use]
pub fn check_report(
    world: &BoxWorld,
    task: &TaskDefinition,
    report: &SamplingReport,
    config: &SamplerConfig,
) -> Vec<(InvariantCheck, String)> {
    let mut out = Vec::new();

    if report.goal_sets_tried > config.max_goal_condition_sets.max(1) {
        out.push((
            InvariantCheck::BoundedGoalSets,
            format!("{} goal sets tried", report.goal_sets_tried),
        ));
    }
    if report.placement.max_trial_steps > config.placement.max_trials {
        out.push((
            InvariantCheck::BoundedPlacementSteps,
            format!("{} trial steps in one call", report.placement.max_trial_steps),
        ));
    }
    if let Err(e) = report.journal.verify_integrity() {
        out.push((InvariantCheck::JournalIntegrity, e.to_string()));
    }

    if report.success {
        if !task.allow_shared_objects {
            let mut seen: IndexMap<ObjectId, &RoleId> = IndexMap::new();
            for (role, object) in report.scope.iter() {
                if let Some(first) = seen.insert(object, role) {
                    out.push((
                        InvariantCheck::ExclusiveScope,
                        format!("{first} and {role} both bound to {object}"),
                    ));
                }
            }
        }
        for condition in &task.initial_conditions {
            match ConditionSampler::evaluate(world, &report.scope, condition) {
                Ok(true) => {}
                Ok(false) => out.push((InvariantCheck::FinalConditionsHold, format!("{condition} is false"))),
                Err(e) => out.push((InvariantCheck::FinalConditionsHold, format!("{condition}: {e}"))),
            }
        }
    }
    out
}

/// Generate the scene and task of one episode
#[must_use]
pub fn generate_episode(index: u64, seed: u64, config: &SimulatorConfig) -> Episode {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut scene = SceneDescription::new(&format!("generated_{index}"))
        .with_taxonomy(TABLE_CATEGORY, &["table"])
        .with_taxonomy(APPLE_CATEGORY, &["apple"])
        .with_taxonomy(BOWL_CATEGORY, &["bowl"])
        .with_model("apple", ModelSpec::cube("apple_001", Vector3::new(0.04, 0.04, 0.04)))
        .with_model("apple", ModelSpec::cube("apple_002", Vector3::new(0.035, 0.035, 0.045)))
        .with_model("bowl", ModelSpec::open_box("bowl_001", [0.15, 0.15], 0.01, 0.01, 0.12));

    let mut room_no = 0usize;
    for room_type in ROOM_TYPES {
        let instances = rng.gen_range(1..=config.max_rooms_per_type.max(1));
        for i in 0..instances {
            let room_id = format!("{room_type}_{i}");
            let x0 = room_no as f64 * ROOM_SPACING;
            room_no += 1;
            scene = scene.with_room(&room_id, room_type, [x0, 0.0], [x0 + ROOM_SIZE, ROOM_SIZE]);

            let tables = rng.gen_range(0..=config.max_tables_per_room);
            for t in 0..tables {
                let half = Vector3::new(rng.gen_range(0.3..0.8), rng.gen_range(0.3..0.6), rng.gen_range(0.35..0.45));
                let position = Vector3::new(x0 + 1.0 + 2.0 * t as f64, ROOM_SIZE / 2.0, half.z);
                scene = scene.with_object(
                    ObjectSpec::boxed(&format!("table_{room_id}_{t}"), "table", position, half)
                        .in_room(&room_id)
                        .fixed()
                        .supporting(SupportPredicate::OnTop),
                );
            }

            if rng.gen_bool(0.3) {
                let position = Vector3::new(x0 + ROOM_SIZE - 0.5, 0.5, 0.04);
                scene = scene.with_object(
                    ObjectSpec::boxed(&format!("apple_{room_id}"), "apple", position, Vector3::new(0.04, 0.04, 0.04))
                        .in_room(&room_id),
                );
            }
        }
    }

    let task = generate_task(&mut rng, index, config);
    Episode {
        index,
        seed,
        scene,
        task,
    }
}

fn generate_task(rng: &mut StdRng, index: u64, config: &SimulatorConfig) -> TaskDefinition {
    let room_type = *ROOM_TYPES.choose(rng).unwrap_or(&ROOM_TYPES[0]);
    let tables: Vec<RoleId> = (1..=rng.gen_range(1..=2))
        .map(|i| RoleId::new(format!("{TABLE_CATEGORY}_{i}")))
        .collect();
    let floor = RoleId::new(format!("{FLOOR_CATEGORY}_1"));
    let apples: Vec<RoleId> = (1..=rng.gen_range(1..=config.max_apples.max(1)))
        .map(|i| RoleId::new(format!("{APPLE_CATEGORY}_{i}")))
        .collect();
    let bowl = rng.gen_bool(0.4).then(|| RoleId::new(format!("{BOWL_CATEGORY}_1")));

    let mut supports: Vec<RoleId> = tables.clone();
    supports.push(floor.clone());

    let mut initial = Vec::new();
    for role in tables.iter().chain(std::iter::once(&floor)) {
        initial.push(Condition::in_room(role.clone(), room_type));
    }
    if let Some(bowl) = &bowl {
        initial.push(Condition::kinematic(Predicate::OnTop, bowl.clone(), tables[0].clone()));
    }
    for (i, apple) in apples.iter().enumerate() {
        let condition = match &bowl {
            Some(bowl) if i == 0 => Condition::kinematic(Predicate::Inside, apple.clone(), bowl.clone()),
            _ => {
                let support = supports.choose(rng).unwrap_or(&floor).clone();
                Condition::kinematic(Predicate::OnTop, apple.clone(), support)
            }
        };
        initial.push(condition);
    }
    if rng.gen_bool(0.3) {
        initial.push(Condition::state(ObjectState::Cooked, apples[0].clone()));
    }

    let goal_count = rng.gen_range(0..=3);
    let goals: Vec<Vec<Condition>> = (0..goal_count)
        .map(|_| {
            let apple = apples.choose(rng).unwrap_or(&apples[0]).clone();
            let support = supports.choose(rng).unwrap_or(&floor).clone();
            vec![Condition::kinematic(Predicate::OnTop, apple, support)]
        })
        .collect();

    let mut objects: IndexMap<Category, Vec<RoleId>> = IndexMap::new();
    objects.insert(Category::new(TABLE_CATEGORY), tables);
    objects.insert(Category::new(FLOOR_CATEGORY), vec![floor]);
    objects.insert(Category::new(APPLE_CATEGORY), apples);
    if let Some(bowl) = bowl {
        objects.insert(Category::new(BOWL_CATEGORY), vec![bowl]);
    }

    TaskDefinition {
        activity: "arranging_fruit".to_string(),
        instance: u32::try_from(index).unwrap_or(u32::MAX),
        objects,
        initial_conditions: initial,
        ground_goal_options: goals,
        non_sampleable_categories: IndexSet::from([Category::new(TABLE_CATEGORY), Category::new(FLOOR_CATEGORY)]),
        allow_shared_objects: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> SimulatorConfig {
        SimulatorConfig {
            episodes: 6,
            stop_on_first_violation: false,
            ..SimulatorConfig::default()
        }
    }

    #[test]
    fn generated_tasks_are_well_formed() {
        let config = small();
        for i in 0..20 {
            let episode = generate_episode(i, 1000 + i, &config);
            episode.task.validate().unwrap();
            BoxWorld::from_description(episode.scene).unwrap();
        }
    }

    #[test]
    fn generation_is_seeded() {
        let config = small();
        let a = generate_episode(3, 77, &config);
        let b = generate_episode(3, 77, &config);
        assert_eq!(a.task, b.task);
        assert_eq!(a.scene, b.scene);
    }

    #[test]
    fn small_batch_passes() {
        let report = run_simulator(small());
        assert_eq!(report.stats.episodes, 6);
        assert!(report.passed(), "{}", report.generate_text());
    }
}
