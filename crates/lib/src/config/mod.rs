//! Build configuration model.
//!
//! The configuration lists the processing scripts (in build order, each
//! enabled or disabled), the artifact names the build must produce, and the
//! working root every script runs in.
//!
//! Mutations never edit a configuration in place. Each one returns a new,
//! validated [`BuildConfig`] or a [`ConfigError`] naming the violated rule.

mod types;

pub use types::*;

use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;

use tracing::debug;

impl BuildConfig {
  /// Create a validated configuration.
  pub fn new(
    scripts: Vec<ScriptEntry>,
    expected_artifacts: Vec<String>,
    working_root: WorkingRoot,
  ) -> Result<Self, ConfigError> {
    let config = BuildConfig {
      scripts,
      expected_artifacts,
      working_root,
    };
    config.validate()?;
    Ok(config)
  }

  /// Parse and validate a YAML configuration document.
  pub fn parse(content: &str) -> Result<Self, ConfigError> {
    let config: BuildConfig = serde_yaml::from_str(content)?;
    config.validate()?;
    Ok(config)
  }

  /// Serialize to a YAML configuration document.
  pub fn to_yaml(&self) -> Result<String, ConfigError> {
    Ok(serde_yaml::to_string(self)?)
  }

  /// Load and validate the configuration at `path`.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    debug!(path = %path.display(), "loaded configuration");
    Self::parse(&content)
  }

  /// Write the configuration to `path`, replacing any previous file atomically.
  pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
    let content = self.to_yaml()?;
    let write_err = |source| ConfigError::Write {
      path: path.to_path_buf(),
      source,
    };

    let dir = match path.parent() {
      Some(parent) if !parent.as_os_str().is_empty() => parent,
      _ => Path::new("."),
    };
    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    temp.write_all(content.as_bytes()).map_err(write_err)?;
    temp.persist(path).map_err(|e| write_err(e.error))?;

    debug!(path = %path.display(), "saved configuration");
    Ok(())
  }

  /// Check every configuration invariant.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.expected_artifacts.is_empty() {
      return Err(ConfigError::NoArtifacts);
    }

    let mut seen = BTreeSet::new();
    for script in &self.scripts {
      if script.path.trim().is_empty() {
        return Err(ConfigError::EmptyScriptPath);
      }
      if !seen.insert(script.path.as_str()) {
        return Err(ConfigError::DuplicateScript(script.path.clone()));
      }
    }

    let mut seen = BTreeSet::new();
    for name in &self.expected_artifacts {
      validate_artifact_name(name)?;
      if !seen.insert(name.as_str()) {
        return Err(ConfigError::DuplicateArtifact(name.clone()));
      }
    }

    self.working_root.check()
  }

  /// Scripts in build order.
  pub fn list_scripts(&self) -> &[ScriptEntry] {
    &self.scripts
  }

  /// Expected artifact names in declaration order.
  pub fn list_artifacts(&self) -> &[String] {
    &self.expected_artifacts
  }

  /// Enabled scripts, in build order.
  pub fn enabled_scripts(&self) -> impl Iterator<Item = &ScriptEntry> {
    self.scripts.iter().filter(|s| s.enabled)
  }

  pub fn script(&self, path: &str) -> Option<&ScriptEntry> {
    self.scripts.iter().find(|s| s.path == path)
  }

  pub fn expects(&self, name: &str) -> bool {
    self.expected_artifacts.iter().any(|a| a == name)
  }

  pub fn enable(&self, path: &str) -> Result<Self, ConfigError> {
    self.set_enabled(path, true)
  }

  pub fn disable(&self, path: &str) -> Result<Self, ConfigError> {
    self.set_enabled(path, false)
  }

  fn set_enabled(&self, path: &str, enabled: bool) -> Result<Self, ConfigError> {
    let mut next = self.clone();
    let entry = next
      .scripts
      .iter_mut()
      .find(|s| s.path == path)
      .ok_or_else(|| ConfigError::UnknownScript(path.to_string()))?;
    entry.enabled = enabled;
    next.validate()?;
    Ok(next)
  }

  /// Append a script at the end of the build order.
  pub fn add_script(&self, entry: ScriptEntry) -> Result<Self, ConfigError> {
    let mut next = self.clone();
    next.scripts.push(entry);
    next.validate()?;
    Ok(next)
  }

  pub fn remove_script(&self, path: &str) -> Result<Self, ConfigError> {
    let mut next = self.clone();
    let before = next.scripts.len();
    next.scripts.retain(|s| s.path != path);
    if next.scripts.len() == before {
      return Err(ConfigError::UnknownScript(path.to_string()));
    }
    next.validate()?;
    Ok(next)
  }

  pub fn add_artifact(&self, name: &str) -> Result<Self, ConfigError> {
    let mut next = self.clone();
    next.expected_artifacts.push(name.to_string());
    next.validate()?;
    Ok(next)
  }

  pub fn remove_artifact(&self, name: &str) -> Result<Self, ConfigError> {
    let mut next = self.clone();
    let before = next.expected_artifacts.len();
    next.expected_artifacts.retain(|a| a != name);
    if next.expected_artifacts.len() == before {
      return Err(ConfigError::UnknownArtifact(name.to_string()));
    }
    next.validate()?;
    Ok(next)
  }

  /// Enable exactly the given scripts and disable every other one.
  ///
  /// Used for partial rebuilds without editing the document on disk.
  pub fn with_only<S: AsRef<str>>(&self, paths: &[S]) -> Result<Self, ConfigError> {
    for path in paths {
      if self.script(path.as_ref()).is_none() {
        return Err(ConfigError::UnknownScript(path.as_ref().to_string()));
      }
    }
    let mut next = self.clone();
    for script in &mut next.scripts {
      script.enabled = paths.iter().any(|p| p.as_ref() == script.path);
    }
    next.validate()?;
    Ok(next)
  }
}

/// Artifact names double as payload file names, so they must be path-safe.
fn validate_artifact_name(name: &str) -> Result<(), ConfigError> {
  let invalid = |reason| ConfigError::InvalidArtifactName {
    name: name.to_string(),
    reason,
  };

  if name.is_empty() {
    return Err(invalid("name is empty"));
  }
  if name.starts_with('.') {
    return Err(invalid("name must not start with '.'"));
  }
  if !name
    .chars()
    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
  {
    return Err(invalid("only ASCII letters, digits, '_', '-' and '.' are allowed"));
  }
  if name == "index" {
    return Err(invalid("'index' is reserved"));
  }
  Ok(())
}
