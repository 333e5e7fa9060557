//! Shared test helpers for CLI integration tests.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Get path to a fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

/// Read fixture content.
pub fn fixture_content(name: &str) -> String {
  std::fs::read_to_string(fixture_path(name)).unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", name, e))
}

/// Isolated data package.
///
/// Each test gets its own temporary project directory.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  /// Create an empty project with `data-raw/` and `extdata/`.
  pub fn empty() -> Self {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("data-raw")).unwrap();
    std::fs::create_dir_all(temp.path().join("extdata")).unwrap();
    Self { temp }
  }

  /// Create the two-script cars package from fixtures.
  pub fn cars() -> Self {
    let env = Self::empty();
    env.write_file("datapack.yml", &fixture_content("datapack.yml"));
    env.write_file("extdata/cars.csv", &fixture_content("cars.csv"));
    env.write_file("data-raw/cars.lua", &fixture_content("cars.lua"));
    env.write_file("data-raw/summary.lua", &fixture_content("summary.lua"));
    env
  }

  pub fn path(&self) -> &Path {
    self.temp.path()
  }

  /// Write a file relative to the project directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  pub fn read_file(&self, relative_path: &str) -> String {
    std::fs::read_to_string(self.temp.path().join(relative_path)).unwrap()
  }

  /// Parsed `data/digest.json`.
  pub fn digest(&self) -> serde_json::Value {
    serde_json::from_str(&self.read_file("data/digest.json")).unwrap()
  }

  /// Get a Command for the dpk binary pointed at this project.
  pub fn dpk_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("dpk");
    cmd.env_remove("RUST_LOG");
    cmd.arg("--project").arg(self.temp.path());
    cmd
  }
}
