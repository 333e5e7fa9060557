//! `dpk config` subcommands for inspecting and editing `datapack.yml`.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::Serialize;

use datapack_lib::config::{BuildConfig, ScriptEntry};
use datapack_lib::project::Project;

use super::open_project;
use crate::output::{OutputFormat, print_json, print_script, print_success};

#[derive(Subcommand)]
pub enum ConfigCommand {
  /// List scripts in build order
  ListScripts {
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },
  /// List declared artifact names
  ListObjects {
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },
  /// Enable a script
  Enable { script: String },
  /// Disable a script; its committed artifacts are carried forward on the next build
  Disable { script: String },
  /// Append a script to the build order
  AddScript {
    script: String,
    /// Add the script disabled
    #[arg(long)]
    disabled: bool,
  },
  /// Remove a script from the build order
  RemoveScript { script: String },
  /// Declare an artifact the build must produce
  AddObject { name: String },
  /// Stop expecting an artifact
  RemoveObject { name: String },
}

#[derive(Serialize)]
struct ScriptRow<'a> {
  path: &'a str,
  enabled: bool,
}

pub fn cmd_config(project_dir: &Path, command: ConfigCommand) -> Result<()> {
  let project = open_project(project_dir)?;
  let config = project.load_config().context("Failed to load datapack.yml")?;

  match command {
    ConfigCommand::ListScripts { output } => {
      let rows: Vec<ScriptRow> = config
        .list_scripts()
        .iter()
        .map(|s| ScriptRow {
          path: &s.path,
          enabled: s.enabled,
        })
        .collect();
      if output.is_json() {
        return print_json(&rows);
      }
      for row in rows {
        print_script(row.path, row.enabled);
      }
      Ok(())
    }
    ConfigCommand::ListObjects { output } => {
      if output.is_json() {
        return print_json(&config.list_artifacts());
      }
      for name in config.list_artifacts() {
        println!("{}", name);
      }
      Ok(())
    }
    ConfigCommand::Enable { script } => {
      let updated = config.enable(&script)?;
      save(&project, &updated, &format!("Enabled {}", script))
    }
    ConfigCommand::Disable { script } => {
      let updated = config.disable(&script)?;
      save(&project, &updated, &format!("Disabled {}", script))
    }
    ConfigCommand::AddScript { script, disabled } => {
      let entry = if disabled {
        ScriptEntry::disabled(&script)
      } else {
        ScriptEntry::new(&script)
      };
      let updated = config.add_script(entry)?;
      save(&project, &updated, &format!("Added script {}", script))
    }
    ConfigCommand::RemoveScript { script } => {
      let updated = config.remove_script(&script)?;
      save(&project, &updated, &format!("Removed script {}", script))
    }
    ConfigCommand::AddObject { name } => {
      let updated = config.add_artifact(&name)?;
      save(&project, &updated, &format!("Declared artifact {}", name))
    }
    ConfigCommand::RemoveObject { name } => {
      let updated = config.remove_artifact(&name)?;
      save(&project, &updated, &format!("Removed artifact {}", name))
    }
  }
}

fn save(project: &Project, config: &BuildConfig, message: &str) -> Result<()> {
  project.save_config(config).context("Failed to save datapack.yml")?;
  print_success(message);
  Ok(())
}
