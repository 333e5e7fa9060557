//! dpk: build versioned data packages from processing scripts.

mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cmd::{BuildArgs, ConfigCommand};
use crate::output::{OutputFormat, print_error};

#[derive(Parser)]
#[command(name = "dpk")]
#[command(author, version, about = "Build versioned data packages from processing scripts", long_about = None)]
struct Cli {
  /// Project directory containing datapack.yml
  #[arg(short = 'C', long, global = true, default_value = ".")]
  project: PathBuf,

  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run the enabled scripts and commit their artifacts
  Build {
    /// Data version to commit under (defaults to the committed version)
    #[arg(long = "data-version", value_name = "VERSION")]
    data_version: Option<String>,

    /// Forbid scripts from reading artifacts written by other scripts
    #[arg(long)]
    isolated: bool,

    /// Abort any script running longer than this (e.g. "30s", "5m")
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Run only these scripts; every other script is treated as disabled
    #[arg(long, value_name = "SCRIPT", num_args = 1..)]
    only: Vec<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Show the committed data version and artifacts
  Status {
    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Print a committed artifact as JSON
  Show {
    /// Artifact name
    artifact: String,
  },

  /// Inspect or edit datapack.yml
  Config {
    #[command(subcommand)]
    command: ConfigCommand,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  let result = match cli.command {
    Commands::Build {
      data_version,
      isolated,
      timeout,
      only,
      output,
    } => cmd::cmd_build(
      &cli.project,
      BuildArgs {
        data_version,
        isolated,
        timeout,
        only,
      },
      output,
    ),
    Commands::Status { output } => cmd::cmd_status(&cli.project, cli.verbose, output),
    Commands::Show { artifact } => cmd::cmd_show(&cli.project, &artifact),
    Commands::Config { command } => cmd::cmd_config(&cli.project, command),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      print_error(&format!("{:#}", err));
      ExitCode::FAILURE
    }
  }
}

fn init_tracing(verbose: bool) {
  let default_level = if verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}
