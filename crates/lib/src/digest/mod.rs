//! Digest storage.
//!
//! Reads and atomically replaces the digest file that records, per artifact,
//! the last-accepted fingerprint together with the data version.

mod types;

pub use types::*;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::consts::DIGEST_FILENAME;

/// Manages the digest file inside a project's data directory.
#[derive(Debug, Clone)]
pub struct DigestStore {
  base_path: PathBuf,
}

impl DigestStore {
  /// Create a digest store rooted at `base_path` (the project's `data/` dir).
  pub fn new(base_path: PathBuf) -> Self {
    Self { base_path }
  }

  pub fn base_path(&self) -> &Path {
    &self.base_path
  }

  pub fn path(&self) -> PathBuf {
    self.base_path.join(DIGEST_FILENAME)
  }

  /// Load the digest record.
  ///
  /// Returns an empty record if the file doesn't exist (first build).
  pub fn load(&self) -> Result<DigestRecord, DigestError> {
    let path = self.path();

    let content = match fs::read_to_string(&path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(DigestRecord::default()),
      Err(source) => return Err(DigestError::Read { path, source }),
    };

    let record: DigestRecord =
      serde_json::from_str(&content).map_err(|source| DigestError::Parse { path: path.clone(), source })?;

    if record.version != DIGEST_FORMAT_VERSION {
      return Err(DigestError::UnsupportedVersion(record.version));
    }

    Ok(record)
  }

  /// Replace the digest record.
  ///
  /// Writes to a temp file in the same directory and renames it over the
  /// digest, so readers observe either the old or the new record in full.
  pub fn commit(&self, record: &DigestRecord) -> Result<(), DigestError> {
    let path = self.path();
    let write_err = |source| DigestError::Write { path: path.clone(), source };

    fs::create_dir_all(&self.base_path).map_err(write_err)?;

    let content = serde_json::to_string_pretty(record).map_err(DigestError::Serialize)?;
    let mut temp = tempfile::NamedTempFile::new_in(&self.base_path).map_err(write_err)?;
    temp.write_all(content.as_bytes()).map_err(write_err)?;
    temp.write_all(b"\n").map_err(write_err)?;
    temp.as_file().sync_all().map_err(write_err)?;
    temp.persist(&path).map_err(|e| write_err(e.error))?;

    debug!(
      path = %path.display(),
      generation = record.generation,
      artifacts = record.fingerprints.len(),
      "digest committed"
    );
    Ok(())
  }
}
