//! In-memory Object Store for one build.
//!
//! Scripts publish artifacts with `write` and consume artifacts of earlier
//! scripts with `read`. The store only ever sees scripts in build order, so
//! a successful `read` always observes a value produced strictly earlier in
//! the same build (or carried forward at a disabled script's position).

mod types;

pub use types::*;

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use tracing::debug;

use crate::util::hash::Fingerprint;

/// Writer name used for operations outside any script.
const NO_SCRIPT: &str = "<none>";

#[derive(Debug, Clone)]
pub struct ObjectStore {
  expected: BTreeSet<String>,
  objects: BTreeMap<String, StoredObject>,
  cross_script_access: bool,
  current_script: Option<String>,
}

impl ObjectStore {
  /// Create an empty store for a build that must produce `expected`.
  pub fn new<I, S>(expected: I, cross_script_access: bool) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      expected: expected.into_iter().map(Into::into).collect(),
      objects: BTreeMap::new(),
      cross_script_access,
      current_script: None,
    }
  }

  /// Mark `script` as the writer/reader for subsequent operations.
  pub fn begin_script(&mut self, script: &str) {
    self.current_script = Some(script.to_string());
  }

  pub fn end_script(&mut self) {
    self.current_script = None;
  }

  pub fn current_script(&self) -> &str {
    self.current_script.as_deref().unwrap_or(NO_SCRIPT)
  }

  /// Register an artifact produced by the current script.
  ///
  /// A script may re-produce a name it already owns; any other repeat write fails.
  pub fn write(&mut self, name: &str, value: Value) -> Result<(), ObjectStoreError> {
    let writer = self.current_script().to_string();

    if !self.expected.contains(name) {
      return Err(ObjectStoreError::Undeclared {
        name: name.to_string(),
        writer,
      });
    }

    if let Some(existing) = self.objects.get(name)
      && (existing.producer != writer || existing.is_carried())
    {
      return Err(ObjectStoreError::Duplicate {
        name: name.to_string(),
        owner: existing.producer.clone(),
        writer,
      });
    }

    debug!(name, script = %writer, "object written");
    self.objects.insert(
      name.to_string(),
      StoredObject {
        value,
        producer: writer,
        origin: Origin::Produced,
      },
    );
    Ok(())
  }

  /// Read an artifact written earlier in this build.
  pub fn read(&self, name: &str) -> Result<&Value, ObjectStoreError> {
    let reader = self.current_script().to_string();

    if !self.cross_script_access {
      return Err(ObjectStoreError::AccessDisabled {
        name: name.to_string(),
        reader,
      });
    }

    match self.objects.get(name) {
      Some(object) => {
        debug!(name, script = %reader, producer = %object.producer, "object read");
        Ok(&object.value)
      }
      None => Err(ObjectStoreError::NotFound {
        name: name.to_string(),
        reader,
      }),
    }
  }

  /// Seed a previously committed artifact whose producing script is disabled.
  ///
  /// Fails with [`ObjectStoreError::Duplicate`] if an earlier script in this
  /// build already wrote `name`; neither value may silently replace the other.
  pub fn carry_forward(
    &mut self,
    name: &str,
    value: Value,
    fingerprint: Fingerprint,
    producer: &str,
  ) -> Result<(), ObjectStoreError> {
    if let Some(existing) = self.objects.get(name) {
      return Err(ObjectStoreError::Duplicate {
        name: name.to_string(),
        owner: existing.producer.clone(),
        writer: producer.to_string(),
      });
    }

    debug!(name, producer, "object carried forward");
    self.objects.insert(
      name.to_string(),
      StoredObject {
        value,
        producer: producer.to_string(),
        origin: Origin::Carried { fingerprint },
      },
    );
    Ok(())
  }

  pub fn contains(&self, name: &str) -> bool {
    self.objects.contains_key(name)
  }

  /// Take every expected artifact out of the store.
  ///
  /// Fails with [`ObjectStoreError::Missing`] naming every expected artifact
  /// that was never written.
  pub fn harvest(&self) -> Result<BTreeMap<String, StoredObject>, ObjectStoreError> {
    let missing: Vec<String> = self
      .expected
      .iter()
      .filter(|name| !self.objects.contains_key(*name))
      .cloned()
      .collect();

    if !missing.is_empty() {
      return Err(ObjectStoreError::Missing { names: missing });
    }

    Ok(
      self
        .objects
        .iter()
        .filter(|(name, _)| self.expected.contains(*name))
        .map(|(name, object)| (name.clone(), object.clone()))
        .collect(),
    )
  }
}
