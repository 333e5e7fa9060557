//! Content fingerprints for artifact change detection.
//!
//! This module provides:
//! - `Fingerprint`: A full 64-character SHA-256 hash of an artifact's serialized bytes
//! - `fingerprint()`: Arbitrary byte hashing
//! - `fingerprint_value()`: Canonical serialization plus hashing of an artifact value
//! - `fingerprint_file()`: Streaming hash of a persisted payload file

use std::fs;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A full 64-character SHA-256 hash used to detect whether an artifact changed.
///
/// # Format
///
/// The hash is a lowercase hexadecimal string (64 characters).
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub String);

impl Fingerprint {
  /// Shortened form for human-facing output.
  pub fn short(&self) -> &str {
    let len = self.0.len().min(12);
    &self.0[..len]
  }
}

impl std::fmt::Display for Fingerprint {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Error while reading a file to fingerprint it.
#[derive(Debug, thiserror::Error)]
#[error("failed to read {path}: {source}")]
pub struct FileHashError {
  pub path: String,
  #[source]
  pub source: std::io::Error,
}

/// Hash arbitrary bytes.
///
/// Returns the full 64-character SHA256 hash.
pub fn fingerprint(data: &[u8]) -> Fingerprint {
  let mut hasher = Sha256::new();
  hasher.update(data);
  Fingerprint(format!("{:x}", hasher.finalize()))
}

/// Serialize an artifact value canonically and hash the result.
///
/// Object keys are emitted in sorted order, so equal values always produce
/// equal bytes. Returns the bytes alongside their fingerprint because the
/// payload that gets persisted must be exactly what was hashed.
pub fn fingerprint_value(value: &serde_json::Value) -> Result<(Vec<u8>, Fingerprint), serde_json::Error> {
  let bytes = serde_json::to_vec(value)?;
  let hash = fingerprint(&bytes);
  Ok((bytes, hash))
}

/// Hash a file's contents.
///
/// Returns the full 64-character SHA256 hash of the file.
pub fn fingerprint_file(path: &Path) -> Result<Fingerprint, FileHashError> {
  let to_err = |source| FileHashError {
    path: path.display().to_string(),
    source,
  };

  let mut file = fs::File::open(path).map_err(to_err)?;
  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let bytes_read = file.read(&mut buffer).map_err(to_err)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(Fingerprint(format!("{:x}", hasher.finalize())))
}
