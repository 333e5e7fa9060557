//! Persisted artifact storage.
//!
//! Committed artifacts live in numbered generation directories. A build
//! stages the complete artifact set into a fresh generation and only then
//! points the digest at it, so the payloads a digest names are always
//! present in full.
//!
//! # Storage Layout
//!
//! ```text
//! {data_dir}/objects/
//! ├── 3/
//! │   ├── index.json      # GenerationIndex: producer + fingerprint per artifact
//! │   └── <name>.json     # Serialized payload (exactly the fingerprinted bytes)
//! └── .stage-XXXX/        # In-flight generation, renamed into place when complete
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::util::hash::{FileHashError, Fingerprint, fingerprint, fingerprint_file};

/// Index file name inside each generation directory.
const INDEX_FILENAME: &str = "index.json";

/// Current generation index format version.
const INDEX_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ArtifactError {
  #[error("i/o error on {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("committed artifact '{name}' is corrupted: expected fingerprint {expected}, found {actual}")]
  Corrupted {
    name: String,
    expected: Fingerprint,
    actual: Fingerprint,
  },

  #[error("committed artifact '{name}' is not valid JSON: {source}")]
  Parse {
    name: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("generation {0} has no readable index")]
  MissingIndex(u64),

  #[error("failed to serialize generation index: {0}")]
  Serialize(#[source] serde_json::Error),
}

fn io_err(path: &Path) -> impl Fn(io::Error) -> ArtifactError + '_ {
  move |source| ArtifactError::Io {
    path: path.to_path_buf(),
    source,
  }
}

/// Per-artifact metadata recorded alongside the payloads of a generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
  pub producer: String,
  pub fingerprint: Fingerprint,
  pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationIndex {
  pub version: u32,
  pub generation: u64,
  pub artifacts: BTreeMap<String, IndexEntry>,
}

impl GenerationIndex {
  /// Name of the script that produced `name` in this generation.
  pub fn producer(&self, name: &str) -> Option<&str> {
    self.artifacts.get(name).map(|e| e.producer.as_str())
  }

  /// Artifacts produced by `script`, in sorted order.
  pub fn produced_by<'a>(&'a self, script: &'a str) -> impl Iterator<Item = (&'a str, &'a IndexEntry)> + 'a {
    self
      .artifacts
      .iter()
      .filter(move |(_, entry)| entry.producer == script)
      .map(|(name, entry)| (name.as_str(), entry))
  }
}

/// An artifact ready to be written into a new generation.
#[derive(Debug, Clone)]
pub struct StagedArtifact {
  pub name: String,
  pub producer: String,
  pub bytes: Vec<u8>,
  pub fingerprint: Fingerprint,
}

/// A committed artifact read back from disk and verified.
#[derive(Debug, Clone)]
pub struct LoadedArtifact {
  pub value: serde_json::Value,
  pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
  base_path: PathBuf,
}

impl ArtifactStore {
  /// Create an artifact store rooted at `base_path` (`data/objects`).
  pub fn new(base_path: PathBuf) -> Self {
    Self { base_path }
  }

  pub fn base_path(&self) -> &Path {
    &self.base_path
  }

  pub fn generation_dir(&self, generation: u64) -> PathBuf {
    self.base_path.join(generation.to_string())
  }

  /// Load the index of a committed generation.
  ///
  /// Generation 0 means nothing was ever committed and yields `None`.
  pub fn read_index(&self, generation: u64) -> Result<Option<GenerationIndex>, ArtifactError> {
    if generation == 0 {
      return Ok(None);
    }

    let path = self.generation_dir(generation).join(INDEX_FILENAME);
    let content = match fs::read_to_string(&path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(ArtifactError::MissingIndex(generation)),
      Err(e) => return Err(io_err(&path)(e)),
    };

    let index: GenerationIndex =
      serde_json::from_str(&content).map_err(|_| ArtifactError::MissingIndex(generation))?;
    if index.version != INDEX_VERSION || index.generation != generation {
      return Err(ArtifactError::MissingIndex(generation));
    }
    Ok(Some(index))
  }

  /// Read a committed artifact and check it against its recorded fingerprint.
  pub fn read(&self, generation: u64, name: &str, expected: &Fingerprint) -> Result<LoadedArtifact, ArtifactError> {
    let path = self.generation_dir(generation).join(payload_filename(name));
    let bytes = fs::read(&path).map_err(io_err(&path))?;

    let actual = fingerprint(&bytes);
    if &actual != expected {
      warn!(name, expected = %expected, actual = %actual, "committed artifact does not match digest");
      return Err(ArtifactError::Corrupted {
        name: name.to_string(),
        expected: expected.clone(),
        actual,
      });
    }

    let value = serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Parse {
      name: name.to_string(),
      source,
    })?;
    Ok(LoadedArtifact { value, bytes })
  }

  /// Check a committed payload against its fingerprint without parsing it.
  pub fn verify(&self, generation: u64, name: &str, expected: &Fingerprint) -> Result<(), ArtifactError> {
    let path = self.generation_dir(generation).join(payload_filename(name));
    let actual = fingerprint_file(&path).map_err(|FileHashError { source, .. }| io_err(&path)(source))?;
    if &actual != expected {
      return Err(ArtifactError::Corrupted {
        name: name.to_string(),
        expected: expected.clone(),
        actual,
      });
    }
    Ok(())
  }

  /// Write a complete generation.
  ///
  /// Payloads and index are written to a staging directory that is renamed
  /// to its final name only once everything is on disk.
  pub fn stage(&self, generation: u64, artifacts: &[StagedArtifact]) -> Result<PathBuf, ArtifactError> {
    fs::create_dir_all(&self.base_path).map_err(io_err(&self.base_path))?;

    let staging = tempfile::Builder::new()
      .prefix(".stage-")
      .tempdir_in(&self.base_path)
      .map_err(io_err(&self.base_path))?;

    let mut index = GenerationIndex {
      version: INDEX_VERSION,
      generation,
      artifacts: BTreeMap::new(),
    };

    for artifact in artifacts {
      let path = staging.path().join(payload_filename(&artifact.name));
      write_synced(&path, &artifact.bytes).map_err(io_err(&path))?;
      index.artifacts.insert(
        artifact.name.clone(),
        IndexEntry {
          producer: artifact.producer.clone(),
          fingerprint: artifact.fingerprint.clone(),
          size: artifact.bytes.len() as u64,
        },
      );
    }

    let index_path = staging.path().join(INDEX_FILENAME);
    let content = serde_json::to_string_pretty(&index).map_err(ArtifactError::Serialize)?;
    write_synced(&index_path, content.as_bytes()).map_err(io_err(&index_path))?;
    sync_dir(staging.path()).map_err(io_err(staging.path()))?;

    let final_dir = self.generation_dir(generation);
    // Leftover from an interrupted commit; the digest never pointed at it.
    if final_dir.exists() {
      fs::remove_dir_all(&final_dir).map_err(io_err(&final_dir))?;
    }
    fs::rename(staging.path(), &final_dir).map_err(io_err(&final_dir))?;
    sync_dir(&self.base_path).map_err(io_err(&self.base_path))?;

    debug!(generation, artifacts = artifacts.len(), path = %final_dir.display(), "generation staged");
    Ok(final_dir)
  }

  /// Remove every generation except `keep`, plus stale staging directories.
  ///
  /// Returns the number of entries removed.
  pub fn prune(&self, keep: u64) -> Result<usize, ArtifactError> {
    let entries = match fs::read_dir(&self.base_path) {
      Ok(entries) => entries,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
      Err(e) => return Err(io_err(&self.base_path)(e)),
    };

    let keep_name = keep.to_string();
    let mut removed = 0;
    for entry in entries {
      let entry = entry.map_err(io_err(&self.base_path))?;
      if entry.file_name().to_string_lossy() == keep_name {
        continue;
      }
      let path = entry.path();
      let result = if path.is_dir() {
        fs::remove_dir_all(&path)
      } else {
        fs::remove_file(&path)
      };
      match result {
        Ok(()) => removed += 1,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(io_err(&path)(e)),
      }
    }

    if removed > 0 {
      debug!(keep, removed, "pruned old generations");
    }
    Ok(removed)
  }
}

/// Write `bytes` to `path` and flush them to disk before returning.
///
/// The digest may point at a generation as soon as it is renamed into
/// place, so its files must be durable before the rename.
fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
  let mut file = fs::File::create(path)?;
  file.write_all(bytes)?;
  file.sync_all()
}

/// Persist directory entries (new files, renames) on platforms that allow it.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
  fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
  Ok(())
}

fn payload_filename(name: &str) -> String {
  format!("{}.json", name)
}
