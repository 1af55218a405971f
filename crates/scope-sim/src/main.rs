use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use rand::rngs::StdRng;
use rand::SeedableRng;
use scope_core::config::{DebugMode, SamplerConfig};
use scope_core::controller::{SamplingReport, TaskSampler};
use scope_core::task::TaskDefinition;
use scope_core::SceneCatalog;
use scope_sim::harness::{run_simulator, SimulatorConfig};
use scope_sim::world::BoxWorld;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("scope-sim")
        .version(scope_core::VERSION)
        .about("Ground symbolic tasks in box-world scenes")
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .global(true)
                .default_value("text")
                .value_parser(["text", "json"])
                .help("Log output format (filter with RUST_LOG)"),
        )
        .subcommand(
            Command::new("sample")
                .about("Sample one task against one scene")
                .arg(Arg::new("scene").long("scene").required(true).help("Scene description (JSON)"))
                .arg(Arg::new("task").long("task").required(true).help("Task definition (JSON)"))
                .arg(Arg::new("config").long("config").help("Sampler configuration (TOML)"))
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .value_parser(value_parser!(u64))
                        .help("Random seed; overrides the configuration"),
                )
                .arg(
                    Arg::new("debug")
                        .long("debug")
                        .action(ArgAction::SetTrue)
                        .help("Re-sample roles emptied by goal filtering and log each outcome"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("simulate")
                .about("Run seeded randomized episodes and check invariants")
                .arg(
                    Arg::new("episodes")
                        .long("episodes")
                        .default_value("50")
                        .value_parser(value_parser!(u64))
                        .help("Number of episodes"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Seed of the first episode"),
                )
                .arg(
                    Arg::new("stop-on-violation")
                        .long("stop-on-violation")
                        .action(ArgAction::SetTrue)
                        .help("Stop at the first episode with a violation"),
                )
                .arg(
                    Arg::new("no-replay")
                        .long("no-replay")
                        .action(ArgAction::SetTrue)
                        .help("Skip the replay determinism check"),
                ),
        )
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> Result<ExitCode> {
    let matches = cli().get_matches();
    init_logging(matches.get_one::<String>("log-format").is_some_and(|f| f == "json"));

    match matches.subcommand() {
        Some(("sample", args)) => sample(args),
        Some(("simulate", args)) => Ok(simulate(args)),
        _ => {
            cli().print_help()?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn sample(args: &ArgMatches) -> Result<ExitCode> {
    let scene = args.get_one::<String>("scene").context("--scene is required")?;
    let task_path = args.get_one::<String>("task").context("--task is required")?;

    let mut config = match args.get_one::<String>("config") {
        Some(path) => SamplerConfig::load(path).with_context(|| format!("loading config {path}"))?,
        None => SamplerConfig::new(),
    };
    if let Some(seed) = args.get_one::<u64>("seed") {
        config = config.with_seed(*seed);
    }
    if args.get_flag("debug") {
        config = config.with_debug(DebugMode::Verbose);
    }

    let task = TaskDefinition::load(task_path).with_context(|| format!("loading task {task_path}"))?;
    let mut world = BoxWorld::load(scene).with_context(|| format!("loading scene {scene}"))?;
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let report = TaskSampler::new(config)
        .sample(&task, &mut world, &mut rng)
        .with_context(|| format!("sampling {}", task.activity))?;

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report_json(&report, &world))?);
    } else {
        print_report(&report, &world);
    }
    Ok(if report.success { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn object_name(world: &BoxWorld, id: scope_core::ObjectId) -> String {
    world
        .object(id)
        .map_or_else(|_| id.to_string(), |o| o.name.clone())
}

fn report_json(report: &SamplingReport, world: &BoxWorld) -> serde_json::Value {
    let scope: serde_json::Map<String, serde_json::Value> = report
        .scope
        .iter()
        .map(|(role, id)| (role.to_string(), object_name(world, id).into()))
        .collect();
    let rooms: serde_json::Map<String, serde_json::Value> = report
        .rooms
        .iter()
        .map(|(room_type, found)| (room_type.to_string(), found.room.to_string().into()))
        .collect();
    serde_json::json!({
        "scene": world.scene_id(),
        "success": report.success,
        "failure": report.failure.as_ref().map(ToString::to_string),
        "failed_conditions": report.failed_conditions.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "goal_set_index": report.goal_set_index,
        "goal_sets_tried": report.goal_sets_tried,
        "rooms": rooms,
        "scope": scope,
        "placement_calls": report.placement.calls,
        "journal_entries": report.journal.len(),
        "journal_digest": report.journal.digest(),
    })
}

fn print_report(report: &SamplingReport, world: &BoxWorld) {
    println!("Scene: {}", world.scene_id());
    println!("Success: {}", report.success);
    if let Some(failure) = &report.failure {
        println!("Failure: {failure}");
    }
    for condition in &report.failed_conditions {
        println!("  failed: {condition}");
    }
    match report.goal_set_index {
        Some(i) => println!("Goal set: {i} ({} tried)", report.goal_sets_tried),
        None => println!("Goal set: none ({} tried)", report.goal_sets_tried),
    }
    for (room_type, found) in &report.rooms {
        println!("Room {room_type}: {}", found.room);
    }
    println!("Scope:");
    for (role, id) in report.scope.iter() {
        println!("  {role} -> {}", object_name(world, id));
    }
    println!("Placement calls: {}", report.placement.calls);
    println!("Journal: {} entries, digest {}", report.journal.len(), report.journal.digest());
}

fn simulate(args: &ArgMatches) -> ExitCode {
    let config = SimulatorConfig {
        seed: args.get_one::<u64>("seed").copied().unwrap_or(42),
        episodes: args.get_one::<u64>("episodes").copied().unwrap_or(50),
        stop_on_first_violation: args.get_flag("stop-on-violation"),
        check_replay: !args.get_flag("no-replay"),
        ..SimulatorConfig::default()
    };

    println!("Running scope simulator...");
    println!("Episodes: {}", config.episodes);
    println!("Seed: {}", config.seed);
    println!();

    let report = run_simulator(config);
    println!("{}", report.generate_text());
    if report.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
