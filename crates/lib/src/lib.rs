//! datapack-lib: build orchestration for data packages
//!
//! A data package is a directory of processing scripts that each publish
//! named artifacts. This crate runs those scripts in declared order and
//! commits their artifacts behind a data version gate:
//! - `BuildConfig`: which scripts run, in what order, and which artifacts are expected
//! - `ObjectStore`: the in-memory exchange scripts write to and read from
//! - `ScriptRunner`: executes one script (Lua via [`runner::LuaRunner`])
//! - `DigestRecord`: the committed fingerprints and data version
//! - [`build::build`]: the orchestrator tying these together

pub mod artifacts;
pub mod build;
pub mod build_lock;
pub mod config;
pub mod consts;
pub mod digest;
pub mod lua;
pub mod objects;
pub mod project;
pub mod runner;
pub mod util;

pub use build::{BuildError, BuildOptions, BuildResult, CancelToken, build};
pub use config::{BuildConfig, ScriptEntry};
pub use project::Project;
