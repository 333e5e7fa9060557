//! Implementation of the `dpk build` command.
//!
//! Runs the enabled scripts of `datapack.yml` in order and commits their
//! artifacts if the data version gate allows it.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use datapack_lib::build::{BuildOptions, BuildResult, CancelToken, build};
use datapack_lib::runner::LuaRunner;

use super::open_project;
use crate::output::{
  OutputFormat, format_duration, print_artifact, print_info, print_json, print_stat, print_success, print_warning,
  symbols,
};

/// Exit status of a process killed by a second Ctrl-C.
const INTERRUPTED_EXIT_CODE: i32 = 130;

pub struct BuildArgs {
  pub data_version: Option<String>,
  pub isolated: bool,
  pub timeout: Option<Duration>,
  pub only: Vec<String>,
}

#[derive(Serialize)]
struct BuildReport<'a> {
  data_version: Option<String>,
  version_changed: bool,
  generation: u64,
  changed: &'a [String],
  carried: &'a [String],
  skipped_scripts: &'a [String],
  artifacts: Vec<datapack_lib::build::ArtifactSummary>,
  duration_ms: u128,
}

pub fn cmd_build(project_dir: &Path, args: BuildArgs, output: OutputFormat) -> Result<()> {
  let start = Instant::now();
  let project = open_project(project_dir)?;

  let mut config = project.load_config().context("Failed to load datapack.yml")?;
  if !args.only.is_empty() {
    config = config.with_only(&args.only).context("Invalid --only selection")?;
  }

  let cancel = CancelToken::new();
  watch_for_interrupt(cancel.clone())?;

  let options = BuildOptions {
    data_version: args.data_version,
    cross_script_access: !args.isolated,
    timeout: args.timeout,
    cancel,
  };
  let runner = LuaRunner::new(&project);

  let result = match build(&project, &config, &runner, &options) {
    Ok(result) => result,
    Err(err) => {
      let stage = err.stage();
      return Err(anyhow::Error::new(err).context(format!("Build failed during {} stage", stage)));
    }
  };

  let elapsed = start.elapsed();
  if output.is_json() {
    print_json(&BuildReport {
      data_version: result.data_version.as_ref().map(ToString::to_string),
      version_changed: result.version_changed,
      generation: result.generation,
      changed: &result.changed_artifacts,
      carried: &result.carried_artifacts,
      skipped_scripts: &result.skipped_scripts,
      artifacts: result.artifact_summaries(),
      duration_ms: elapsed.as_millis(),
    })?;
  } else {
    print_summary(&result, elapsed);
  }

  Ok(())
}

fn print_summary(result: &BuildResult, elapsed: Duration) {
  let version = result
    .data_version
    .as_ref()
    .map(ToString::to_string)
    .unwrap_or_else(|| "<none>".to_string());

  println!();
  if result.version_changed {
    print_success(&format!(
      "Build committed: data version {} (generation {})",
      version, result.generation
    ));
  } else {
    print_info(&format!("No artifact changed; data version {} kept", version));
  }

  print_stat("Artifacts", &result.committed_artifacts.len().to_string());
  if !result.changed_artifacts.is_empty() {
    print_stat("Changed", &result.changed_artifacts.join(", "));
  }
  if !result.skipped_scripts.is_empty() {
    print_stat("Skipped scripts", &result.skipped_scripts.join(", "));
  }
  if !result.carried_artifacts.is_empty() {
    print_stat("Carried forward", &result.carried_artifacts.join(", "));
  }
  print_stat("Duration", &format_duration(elapsed));

  if result.version_changed {
    println!();
    for name in &result.changed_artifacts {
      match result.fingerprints.get(name) {
        Some(fingerprint) => print_artifact(symbols::MODIFY, name, &[fingerprint.short().to_string()]),
        None => print_artifact(symbols::SKIPPED, name, &["removed".to_string()]),
      }
    }
    for name in &result.carried_artifacts {
      print_artifact(symbols::CARRIED, name, &[]);
    }
  }
}

/// Cancel the build on the first Ctrl-C; exit immediately on the second.
fn watch_for_interrupt(cancel: CancelToken) -> Result<()> {
  let rt = tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .context("Failed to create async runtime")?;

  std::thread::spawn(move || {
    rt.block_on(async {
      if tokio::signal::ctrl_c().await.is_err() {
        debug!("Ctrl-C handler unavailable");
        return;
      }
      print_warning("Interrupted; stopping after the current script (press Ctrl-C again to abort)");
      cancel.cancel();

      if tokio::signal::ctrl_c().await.is_ok() {
        std::process::exit(INTERRUPTED_EXIT_CODE);
      }
    });
  });

  Ok(())
}
