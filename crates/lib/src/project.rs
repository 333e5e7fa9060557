//! Project directory layout.
//!
//! ```text
//! <project>/
//! ├── datapack.yml   # BuildConfig
//! ├── data-raw/      # processing scripts
//! ├── extdata/       # raw inputs read by scripts
//! └── data/          # digest.json, objects/<generation>/, .lock
//! ```

use std::io;
use std::path::{Path, PathBuf};

use crate::artifacts::ArtifactStore;
use crate::config::{BuildConfig, ConfigError};
use crate::consts::{CONFIG_FILENAME, DATA_DIR, EXTDATA_DIR, OBJECTS_DIR, SCRIPTS_DIR};
use crate::digest::DigestStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
  root: PathBuf,
}

impl Project {
  /// Open the project rooted at `dir`.
  ///
  /// The path is canonicalized so scripts see stable absolute paths no matter
  /// which directory they run in.
  pub fn open(dir: &Path) -> io::Result<Self> {
    let root = dunce::canonicalize(dir)?;
    Ok(Self { root })
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn config_path(&self) -> PathBuf {
    self.root.join(CONFIG_FILENAME)
  }

  pub fn scripts_dir(&self) -> PathBuf {
    self.root.join(SCRIPTS_DIR)
  }

  pub fn script_path(&self, script: &str) -> PathBuf {
    self.scripts_dir().join(script)
  }

  pub fn data_dir(&self) -> PathBuf {
    self.root.join(DATA_DIR)
  }

  pub fn extdata_dir(&self) -> PathBuf {
    self.root.join(EXTDATA_DIR)
  }

  pub fn digest_store(&self) -> DigestStore {
    DigestStore::new(self.data_dir())
  }

  pub fn artifact_store(&self) -> ArtifactStore {
    ArtifactStore::new(self.data_dir().join(OBJECTS_DIR))
  }

  pub fn load_config(&self) -> Result<BuildConfig, ConfigError> {
    BuildConfig::load(&self.config_path())
  }

  pub fn save_config(&self, config: &BuildConfig) -> Result<(), ConfigError> {
    config.save(&self.config_path())
  }
}
