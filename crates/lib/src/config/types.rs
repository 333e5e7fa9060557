use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Working root used when the configuration document does not name one.
pub const DEFAULT_WORKING_ROOT: &str = "{project}/data-raw";

/// Errors raised while reading, validating, or mutating a build configuration.
///
/// Each variant names the invariant that was violated so the user can fix
/// the configuration document directly.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("configuration declares no objects; at least one expected artifact is required")]
  NoArtifacts,

  #[error("script '{0}' is listed more than once")]
  DuplicateScript(String),

  #[error("object '{0}' is listed more than once")]
  DuplicateArtifact(String),

  #[error("script path must not be empty")]
  EmptyScriptPath,

  #[error("invalid object name '{name}': {reason}")]
  InvalidArtifactName { name: String, reason: &'static str },

  #[error("script '{0}' is not listed in the configuration")]
  UnknownScript(String),

  #[error("object '{0}' is not listed in the configuration")]
  UnknownArtifact(String),

  #[error("cannot resolve workingRoot '{template}': {reason}")]
  UnresolvableWorkingRoot { template: String, reason: String },

  #[error("invalid configuration document: {0}")]
  Parse(#[from] serde_yaml::Error),

  #[error("failed to read configuration {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to write configuration {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// One processing script in the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptEntry {
  /// Script path relative to the project's `data-raw/` directory.
  pub path: String,
  /// Disabled scripts are skipped; their previously committed artifacts are carried forward.
  pub enabled: bool,
}

impl ScriptEntry {
  pub fn new(path: impl Into<String>) -> Self {
    Self {
      path: path.into(),
      enabled: true,
    }
  }

  pub fn disabled(path: impl Into<String>) -> Self {
    Self {
      path: path.into(),
      enabled: false,
    }
  }
}

/// Directory in which every script of one build executes.
///
/// Either a plain path or a template containing `{project}` (the project
/// directory) and/or `{tmp}` (the system temp directory). Relative results
/// are resolved against the project directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkingRoot(pub String);

impl Default for WorkingRoot {
  fn default() -> Self {
    WorkingRoot(DEFAULT_WORKING_ROOT.to_string())
  }
}

impl fmt::Display for WorkingRoot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl WorkingRoot {
  /// Check the template without touching the filesystem.
  pub fn check(&self) -> Result<(), ConfigError> {
    self.expand_with(Path::new("."), Path::new(".")).map(|_| ())
  }

  /// Expand the template for a concrete project.
  pub fn resolve(&self, project_dir: &Path) -> Result<PathBuf, ConfigError> {
    self.expand_with(project_dir, &std::env::temp_dir())
  }

  fn expand_with(&self, project_dir: &Path, tmp_dir: &Path) -> Result<PathBuf, ConfigError> {
    let unresolvable = |reason: String| ConfigError::UnresolvableWorkingRoot {
      template: self.0.clone(),
      reason,
    };

    if self.0.trim().is_empty() {
      return Err(unresolvable("path is empty".to_string()));
    }

    let mut expanded = String::new();
    let mut rest = self.0.as_str();
    while let Some(start) = rest.find('{') {
      expanded.push_str(&rest[..start]);
      let after = &rest[start + 1..];
      let end = after
        .find('}')
        .ok_or_else(|| unresolvable("unterminated placeholder".to_string()))?;
      match &after[..end] {
        "project" => expanded.push_str(&project_dir.to_string_lossy()),
        "tmp" => expanded.push_str(&tmp_dir.to_string_lossy()),
        other => return Err(unresolvable(format!("unknown placeholder '{{{}}}'", other))),
      }
      rest = &after[end + 1..];
    }
    if rest.contains('}') {
      return Err(unresolvable("unbalanced '}'".to_string()));
    }
    expanded.push_str(rest);

    let path = PathBuf::from(expanded);
    if path.is_absolute() {
      Ok(path)
    } else {
      Ok(project_dir.join(path))
    }
  }
}

/// The recognized build configuration.
///
/// Serialized as a YAML document with top-level keys `files`, `objects`,
/// and `workingRoot`. Script order in `files` is build order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
  #[serde(rename = "files", default, with = "script_map")]
  pub scripts: Vec<ScriptEntry>,

  #[serde(rename = "objects")]
  pub expected_artifacts: Vec<String>,

  #[serde(rename = "workingRoot", default)]
  pub working_root: WorkingRoot,
}

#[derive(Serialize, Deserialize)]
struct FileSettings {
  #[serde(default = "enabled_by_default")]
  enabled: bool,
}

fn enabled_by_default() -> bool {
  true
}

/// Order-preserving (de)serialization of `files` as a YAML mapping.
mod script_map {
  use super::*;

  pub fn serialize<S: Serializer>(scripts: &[ScriptEntry], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_map(
      scripts
        .iter()
        .map(|s| (s.path.as_str(), FileSettings { enabled: s.enabled })),
    )
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<ScriptEntry>, D::Error> {
    struct ScriptMapVisitor;

    impl<'de> Visitor<'de> for ScriptMapVisitor {
      type Value = Vec<ScriptEntry>;

      fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a mapping of script path to { enabled: bool }")
      }

      fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut scripts = Vec::new();
        while let Some((path, settings)) = map.next_entry::<String, FileSettings>()? {
          scripts.push(ScriptEntry {
            path,
            enabled: settings.enabled,
          });
        }
        Ok(scripts)
      }
    }

    deserializer.deserialize_map(ScriptMapVisitor)
  }
}
