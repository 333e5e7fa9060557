use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::objects::ObjectStoreError;

/// A processing script failed.
#[derive(Debug, Error)]
#[error("script '{script}' failed: {cause}")]
pub struct RunError {
  pub script: String,
  #[source]
  pub cause: RunFailure,
}

impl RunError {
  pub fn new(script: impl Into<String>, cause: RunFailure) -> Self {
    Self {
      script: script.into(),
      cause,
    }
  }

  /// The Object Store violation behind this failure, if any.
  pub fn object_store_error(&self) -> Option<&ObjectStoreError> {
    match &self.cause {
      RunFailure::ObjectStore(err) => Some(err),
      _ => None,
    }
  }
}

/// Why a script failed.
#[derive(Debug, Error)]
pub enum RunFailure {
  /// The script file does not exist under `data-raw/`.
  #[error("script file not found: {}", .0.display())]
  NotFound(PathBuf),

  /// The working root could not be entered.
  #[error("cannot enter working root {}: {source}", path.display())]
  WorkingRoot {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// The script broke an Object Store rule.
  #[error(transparent)]
  ObjectStore(ObjectStoreError),

  /// The script exceeded its time budget.
  #[error("timed out after {}", humantime::format_duration(*.0))]
  Timeout(Duration),

  /// The script raised an error or failed to compile.
  #[error("{0}")]
  Lua(String),
}

/// Raised from the instruction hook once a script's deadline passes.
#[derive(Debug, Clone, Copy, Error)]
#[error("script exceeded its {} time limit", humantime::format_duration(*limit))]
pub struct ScriptTimeout {
  pub limit: Duration,
}
