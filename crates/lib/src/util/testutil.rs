//! Test utilities for datapack-lib.

use tempfile::TempDir;

use crate::config::{BuildConfig, ScriptEntry};
use crate::project::Project;

/// A throwaway project directory with a `data-raw/` folder.
pub struct TestProject {
  _temp: TempDir,
  pub project: Project,
}

impl TestProject {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("data-raw")).unwrap();
    let project = Project::open(temp.path()).unwrap();
    Self { _temp: temp, project }
  }

  /// Write `body` to `data-raw/<name>`.
  pub fn script(&self, name: &str, body: &str) -> &Self {
    std::fs::write(self.project.script_path(name), body).unwrap();
    self
  }
}

/// Config running `scripts` in order, all enabled.
pub fn config(scripts: &[&str], artifacts: &[&str]) -> BuildConfig {
  BuildConfig {
    scripts: scripts.iter().map(|s| ScriptEntry::new(*s)).collect(),
    expected_artifacts: artifacts.iter().map(|s| s.to_string()).collect(),
    working_root: Default::default(),
  }
}
