mod build;
mod config;
mod show;
mod status;

pub use build::{BuildArgs, cmd_build};
pub use config::{ConfigCommand, cmd_config};
pub use show::cmd_show;
pub use status::cmd_status;

use std::path::Path;

use anyhow::{Context, Result};
use datapack_lib::Project;

/// Open the project at `dir`, failing with a readable message.
fn open_project(dir: &Path) -> Result<Project> {
  Project::open(dir).with_context(|| format!("Failed to open project directory {}", dir.display()))
}
