use serde_json::Value;
use thiserror::Error;

use crate::util::hash::Fingerprint;

/// Object Store misuse. Each of these indicates a bug in a processing script.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObjectStoreError {
  #[error("object '{name}' was already written by '{owner}'; '{writer}' may not overwrite it")]
  Duplicate {
    name: String,
    owner: String,
    writer: String,
  },

  #[error("object '{name}' has not been written by any earlier script (requested by '{reader}')")]
  NotFound { name: String, reader: String },

  #[error("cross-script object access is disabled; '{reader}' cannot read '{name}'")]
  AccessDisabled { name: String, reader: String },

  #[error("object '{name}' written by '{writer}' is not declared in the configuration objects")]
  Undeclared { name: String, writer: String },

  #[error("declared objects were never produced: {}", names.join(", "))]
  Missing { names: Vec<String> },
}

/// Where an object in the store came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
  /// Written by a script during this build.
  Produced,
  /// Carried over unchanged from the last commit because its producer is disabled.
  Carried { fingerprint: Fingerprint },
}

/// An artifact held by the Object Store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
  pub value: Value,
  /// Path of the script that produced the value.
  pub producer: String,
  pub origin: Origin,
}

impl StoredObject {
  pub fn is_carried(&self) -> bool {
    matches!(self.origin, Origin::Carried { .. })
  }
}
