//! Types for running a build.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use semver::Version;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::artifacts::ArtifactError;
use crate::build_lock::BuildLockError;
use crate::config::ConfigError;
use crate::digest::DigestError;
use crate::objects::ObjectStoreError;
use crate::runner::RunError;
use crate::util::hash::Fingerprint;

/// Cooperative cancellation flag shared between a build and its caller.
///
/// Cancellation is observed between scripts; a running script always completes.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.0.store(true, Ordering::SeqCst);
  }

  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }
}

/// Caller-supplied settings for one build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
  /// Data version to commit under. `None` reuses the committed version
  /// (or the default version on the first build).
  pub data_version: Option<String>,
  /// Whether scripts may read artifacts written by earlier scripts.
  pub cross_script_access: bool,
  /// Per-script time limit, handed to the runner through `RunContext`.
  pub timeout: Option<Duration>,
  pub cancel: CancelToken,
}

impl Default for BuildOptions {
  fn default() -> Self {
    Self {
      data_version: None,
      cross_script_access: true,
      timeout: None,
      cancel: CancelToken::new(),
    }
  }
}

impl BuildOptions {
  pub fn with_data_version(mut self, version: impl Into<String>) -> Self {
    self.data_version = Some(version.into());
    self
  }

  pub fn isolated(mut self) -> Self {
    self.cross_script_access = false;
    self
  }
}

/// Outcome of a successful build.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildResult {
  /// Every committed artifact value, produced or carried forward.
  pub committed_artifacts: BTreeMap<String, Value>,
  /// True when this build wrote a new digest.
  pub version_changed: bool,
  /// Disabled scripts, in build order.
  pub skipped_scripts: Vec<String>,
  pub fingerprints: BTreeMap<String, Fingerprint>,
  /// Names whose fingerprint differs from the previous commit, including removed names.
  pub changed_artifacts: Vec<String>,
  /// Names carried forward from disabled scripts.
  pub carried_artifacts: Vec<String>,
  pub producers: BTreeMap<String, String>,
  pub data_version: Option<Version>,
  pub generation: u64,
}

/// Description of one committed artifact, for generated documentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactSummary {
  pub name: String,
  pub kind: &'static str,
  /// Element count for arrays and objects.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub len: Option<usize>,
  pub fingerprint: Fingerprint,
  pub producer: String,
}

impl BuildResult {
  pub fn artifact_summaries(&self) -> Vec<ArtifactSummary> {
    self
      .committed_artifacts
      .iter()
      .map(|(name, value)| ArtifactSummary {
        name: name.clone(),
        kind: json_kind(value),
        len: match value {
          Value::Array(items) => Some(items.len()),
          Value::Object(map) => Some(map.len()),
          _ => None,
        },
        fingerprint: self.fingerprints.get(name).cloned().unwrap_or_default(),
        producer: self.producers.get(name).cloned().unwrap_or_default(),
      })
      .collect()
  }
}

pub fn json_kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "boolean",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}

/// Errors that abort a build. No build error ever leaves a partial commit.
#[derive(Debug, Error)]
pub enum BuildError {
  #[error(transparent)]
  Lock(#[from] BuildLockError),

  #[error("invalid configuration: {0}")]
  Config(#[from] ConfigError),

  #[error("invalid data version '{version}': {source}")]
  InvalidVersion {
    version: String,
    #[source]
    source: semver::Error,
  },

  #[error("cannot create working root {}: {source}", path.display())]
  WorkingRoot {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  Execution(#[from] RunError),

  #[error("cannot carry forward artifacts of disabled script '{script}': {source}")]
  CarryForward {
    script: String,
    #[source]
    source: ArtifactError,
  },

  #[error(transparent)]
  Harvest(#[from] ObjectStoreError),

  #[error(
    "artifacts changed ({}) but data version {requested} is not greater than committed version {}; \
     increment the data version before building",
    changed.join(", "),
    committed.as_ref().map(ToString::to_string).unwrap_or_else(|| "<none>".to_string())
  )]
  VersionGate {
    changed: Vec<String>,
    committed: Option<Version>,
    requested: Version,
  },

  #[error("failed to read or write the digest: {0}")]
  Digest(#[from] DigestError),

  #[error("failed to persist artifacts: {0}")]
  Artifacts(#[from] ArtifactError),

  /// `before` names the step that did not start: a script path or `commit`.
  #[error("build cancelled before {before}")]
  Cancelled { before: String },
}

impl BuildError {
  /// Build phase the error came from.
  pub fn stage(&self) -> &'static str {
    match self {
      BuildError::Lock(_) => "lock",
      BuildError::Config(_) | BuildError::InvalidVersion { .. } | BuildError::WorkingRoot { .. } => "config",
      BuildError::Execution(_) => "execution",
      BuildError::CarryForward { .. } | BuildError::Harvest(_) => "harvest",
      BuildError::VersionGate { .. } => "version-gate",
      BuildError::Digest(_) | BuildError::Artifacts(_) => "commit",
      BuildError::Cancelled { .. } => "cancelled",
    }
  }
}
