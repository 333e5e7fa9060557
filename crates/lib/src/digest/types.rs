use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::hash::Fingerprint;

/// Current digest file format version.
pub const DIGEST_FORMAT_VERSION: u32 = 1;

/// Errors that can occur while loading or committing the digest.
#[derive(Debug, Error)]
pub enum DigestError {
  #[error("failed to read digest {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse digest {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to serialize digest: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("failed to write digest {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("unsupported digest format version: {0}")]
  UnsupportedVersion(u32),
}

/// Last-committed fingerprints plus the data version they were committed under.
///
/// Persisted as `data/digest.json`. The record and the artifact generation it
/// names are only ever replaced together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestRecord {
  pub version: u32,

  /// `None` until the first successful commit.
  #[serde(default)]
  pub data_version: Option<semver::Version>,

  /// Artifact generation directory holding the committed payloads.
  #[serde(default)]
  pub generation: u64,

  #[serde(default)]
  pub fingerprints: BTreeMap<String, Fingerprint>,
}

impl Default for DigestRecord {
  fn default() -> Self {
    Self {
      version: DIGEST_FORMAT_VERSION,
      data_version: None,
      generation: 0,
      fingerprints: BTreeMap::new(),
    }
  }
}

impl DigestRecord {
  /// True before anything has ever been committed.
  pub fn is_empty(&self) -> bool {
    self.data_version.is_none() && self.fingerprints.is_empty()
  }

  pub fn fingerprint(&self, name: &str) -> Option<&Fingerprint> {
    self.fingerprints.get(name)
  }
}
