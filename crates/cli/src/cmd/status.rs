//! Status command implementation.
//!
//! Displays the committed data version, the committed artifacts and how the
//! scripts in `datapack.yml` relate to them.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use datapack_lib::build_lock::{BuildLock, LockMode};

use super::open_project;
use crate::output::{
  OutputFormat, format_bytes, print_artifact, print_info, print_json, print_script, print_stat, print_success, short_hash,
  symbols,
};

#[derive(Serialize)]
struct ArtifactStatus {
  name: String,
  fingerprint: Option<String>,
  producer: Option<String>,
  size: Option<u64>,
  declared: bool,
  /// Whether the payload on disk still matches the digest; `None` if never committed.
  intact: Option<bool>,
}

#[derive(Serialize)]
struct ScriptStatus {
  path: String,
  enabled: bool,
}

#[derive(Serialize)]
struct StatusReport {
  data_version: Option<String>,
  generation: u64,
  scripts: Vec<ScriptStatus>,
  artifacts: Vec<ArtifactStatus>,
}

pub fn cmd_status(project_dir: &Path, verbose: bool, output: OutputFormat) -> Result<()> {
  let project = open_project(project_dir)?;
  let config = project.load_config().context("Failed to load datapack.yml")?;

  let _lock = BuildLock::acquire(&project.data_dir(), LockMode::Shared, "dpk status")
    .context("Failed to acquire build lock")?;

  let digest = project.digest_store().load().context("Failed to load digest")?;
  let store = project.artifact_store();
  let index = store
    .read_index(digest.generation)
    .context("Failed to read committed artifact index")?;

  let mut names: Vec<&str> = config.list_artifacts().iter().map(String::as_str).collect();
  names.extend(digest.fingerprints.keys().map(String::as_str).filter(|n| !config.expects(n)));

  let artifacts: Vec<ArtifactStatus> = names
    .into_iter()
    .map(|name| {
      let entry = index.as_ref().and_then(|index| index.artifacts.get(name));
      let intact = digest
        .fingerprint(name)
        .map(|expected| store.verify(digest.generation, name, expected).is_ok());
      ArtifactStatus {
        name: name.to_string(),
        fingerprint: digest.fingerprint(name).map(|f| f.0.clone()),
        producer: entry.map(|e| e.producer.clone()),
        size: entry.map(|e| e.size),
        declared: config.expects(name),
        intact,
      }
    })
    .collect();

  let report = StatusReport {
    data_version: digest.data_version.as_ref().map(ToString::to_string),
    generation: digest.generation,
    scripts: config
      .list_scripts()
      .iter()
      .map(|s| ScriptStatus {
        path: s.path.clone(),
        enabled: s.enabled,
      })
      .collect(),
    artifacts,
  };

  if output.is_json() {
    return print_json(&report);
  }

  match &report.data_version {
    Some(version) => print_success(&format!("Data version {} (generation {})", version, report.generation)),
    None => print_info("Nothing committed yet. Run 'dpk build' to create the first commit."),
  }
  print_stat("Scripts", &format!("{} ({} enabled)", report.scripts.len(), config.enabled_scripts().count()));
  print_stat("Artifacts", &report.artifacts.len().to_string());

  if verbose {
    println!();
    println!("Scripts:");
    for script in &report.scripts {
      print_script(&script.path, script.enabled);
    }
  }

  println!();
  println!("Artifacts:");
  for artifact in &report.artifacts {
    let mut details = vec![artifact.fingerprint.as_deref().map_or("not committed", short_hash).to_string()];
    if let Some(producer) = &artifact.producer {
      details.push(format!("from {}", producer));
    }
    if let Some(size) = artifact.size {
      details.push(format_bytes(size));
    }
    if !artifact.declared {
      details.push("no longer declared".to_string());
    }
    if artifact.intact == Some(false) {
      details.push("corrupted".to_string());
    }
    let marker = match (artifact.intact, artifact.declared) {
      (Some(false), _) => symbols::ERROR,
      (_, false) => symbols::WARNING,
      _ => symbols::INFO,
    };
    print_artifact(marker, &artifact.name, &details);
  }

  Ok(())
}
