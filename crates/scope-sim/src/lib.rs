//! Scope Sim - reference backend for scope-core
//!
//! [`BoxWorld`] is a small rigid-box world that implements every backend
//! trait the sampler needs, loaded from a JSON [`SceneDescription`]. The
//! [`harness`] module runs seeded batches of generated scenes and tasks and
//! checks the sampler's invariants on each attempt.

pub mod harness;
pub mod scene;
pub mod world;

pub use harness::{run_simulator, InvariantCheck, SimulatorConfig, SimulatorReport, Violation};
pub use scene::{BoxSpec, ModelSpec, ObjectSpec, RoomSpec, SceneDescription, SceneError};
pub use world::BoxWorld;
