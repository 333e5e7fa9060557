//! Terminal output for dpk.
//!
//! Status lines carry a leading marker symbol; colors are applied only when
//! the target stream supports them. Every command that reports structured
//! data also accepts `-o json`.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream, Style};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  /// Disabled script, or an artifact that was dropped.
  pub const SKIPPED: &str = "-";
  /// Artifact whose fingerprint changed in this build.
  pub const MODIFY: &str = "~";
  /// Artifact carried forward from the previous commit.
  pub const CARRIED: &str = "=";
}

/// Human-readable payload size.
pub fn format_bytes(bytes: u64) -> String {
  const UNITS: [&str; 3] = ["KB", "MB", "GB"];

  if bytes < 1024 {
    return format!("{} B", bytes);
  }
  let mut size = bytes as f64 / 1024.0;
  let mut unit = 0;
  while size >= 1024.0 && unit < UNITS.len() - 1 {
    size /= 1024.0;
    unit += 1;
  }
  format!("{:.1} {}", size, UNITS[unit])
}

/// Elapsed time rounded to milliseconds, e.g. "1s 500ms".
pub fn format_duration(duration: Duration) -> String {
  let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
  humantime::format_duration(Duration::from_millis(millis)).to_string()
}

/// First 12 characters of a fingerprint.
pub fn short_hash(hash: &str) -> &str {
  &hash[..hash.len().min(12)]
}

fn line(stderr: bool, symbol: &str, style: Style, message: &str, style_message: bool) {
  let stream = if stderr { Stream::Stderr } else { Stream::Stdout };
  let symbol = symbol.if_supports_color(stream, |s| s.style(style));
  if stderr {
    if style_message {
      eprintln!("{} {}", symbol, message.if_supports_color(stream, |s| s.style(style)));
    } else {
      eprintln!("{} {}", symbol, message);
    }
  } else {
    println!("{} {}", symbol, message);
  }
}

pub fn print_success(message: &str) {
  line(false, symbols::SUCCESS, Style::new().green(), message, false);
}

pub fn print_info(message: &str) {
  line(false, symbols::INFO, Style::new().blue(), message, false);
}

pub fn print_error(message: &str) {
  line(true, symbols::ERROR, Style::new().red(), message, true);
}

pub fn print_warning(message: &str) {
  line(true, symbols::WARNING, Style::new().yellow(), message, true);
}

/// Indented `label: value` line under a status message.
pub fn print_stat(label: &str, value: &str) {
  println!("  {}: {}", label.if_supports_color(Stream::Stdout, |s| s.dimmed()), value);
}

/// One script in build order, marked by whether it runs.
pub fn print_script(path: &str, enabled: bool) {
  if enabled {
    println!("{} {}", symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()), path);
  } else {
    println!(
      "{} {} {}",
      symbols::SKIPPED.if_supports_color(Stream::Stdout, |s| s.dimmed()),
      path,
      "(disabled)".if_supports_color(Stream::Stdout, |s| s.dimmed())
    );
  }
}

/// One artifact line: marker, name, and optional details joined by ", ".
pub fn print_artifact(marker: &str, name: &str, details: &[String]) {
  if details.is_empty() {
    println!("  {} {}", marker, name);
  } else {
    println!(
      "  {} {} {}",
      marker,
      name.if_supports_color(Stream::Stdout, |s| s.bold()),
      details.join(", ")
    );
  }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}
