use std::path::Path;

use anyhow::{Context, Result, bail};

use datapack_lib::build_lock::{BuildLock, LockMode};

use super::open_project;
use crate::output::print_json;

/// Print a committed artifact after verifying it against the digest.
pub fn cmd_show(project_dir: &Path, artifact: &str) -> Result<()> {
  let project = open_project(project_dir)?;
  let _lock = BuildLock::acquire(&project.data_dir(), LockMode::Shared, "dpk show")
    .context("Failed to acquire build lock")?;

  let digest = project.digest_store().load().context("Failed to load digest")?;
  let Some(expected) = digest.fingerprint(artifact) else {
    bail!("No committed artifact named '{}'", artifact);
  };

  let loaded = project
    .artifact_store()
    .read(digest.generation, artifact, expected)
    .with_context(|| format!("Failed to read artifact '{}'", artifact))?;

  print_json(&loaded.value)
}
