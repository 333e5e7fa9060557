//! Build orchestration.
//!
//! A build runs the enabled scripts of a [`BuildConfig`] strictly in declared
//! order, harvests the expected artifacts from the Object Store, applies the
//! data version gate and commits the result.
//!
//! # Commit protocol
//!
//! 1. The complete artifact set is staged into a new generation directory.
//! 2. `digest.json` is atomically replaced to point at that generation.
//!    This is the only step that changes what is committed.
//! 3. Older generations are pruned.
//!
//! Any failure before step 2 leaves the previous commit untouched.

pub mod gate;
mod types;

pub use types::*;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use semver::Version;
use tracing::{debug, info, warn};

use crate::artifacts::{ArtifactError, ArtifactStore, GenerationIndex, StagedArtifact};
use crate::build_lock::{BuildLock, LockMode};
use crate::config::{BuildConfig, ScriptEntry};
use crate::consts::{APP_NAME, DEFAULT_DATA_VERSION};
use crate::digest::{DIGEST_FORMAT_VERSION, DigestRecord};
use crate::objects::{ObjectStore, Origin};
use crate::project::Project;
use crate::runner::{RunContext, ScriptRunner};
use crate::util::hash::fingerprint_value;

/// Run a build of `project` described by `config`.
///
/// Holds the project's exclusive build lock for the whole run.
pub fn build(
  project: &Project,
  config: &BuildConfig,
  runner: &dyn ScriptRunner,
  options: &BuildOptions,
) -> Result<BuildResult, BuildError> {
  config.validate()?;

  let _lock = BuildLock::acquire(&project.data_dir(), LockMode::Exclusive, &format!("{} build", APP_NAME))?;

  let digest_store = project.digest_store();
  let artifact_store = project.artifact_store();
  let committed = digest_store.load()?;
  let requested = requested_version(options, &committed)?;

  let working_root = config.working_root.resolve(project.root())?;
  std::fs::create_dir_all(&working_root).map_err(|source| BuildError::WorkingRoot {
    path: working_root.clone(),
    source,
  })?;

  let index = load_index_for_carry_forward(config, &committed, &artifact_store)?;
  let run_ctx = RunContext::new(&working_root).with_timeout(options.timeout);

  info!(
    scripts = config.scripts.len(),
    enabled = config.enabled_scripts().count(),
    data_version = %requested,
    working_root = %working_root.display(),
    "starting build"
  );

  let store = Rc::new(RefCell::new(ObjectStore::new(
    config.expected_artifacts.iter().cloned(),
    options.cross_script_access,
  )));
  let mut skipped_scripts = Vec::new();
  let mut carried_artifacts = Vec::new();
  let mut carried_bytes: BTreeMap<String, Vec<u8>> = BTreeMap::new();

  for entry in &config.scripts {
    if !entry.enabled {
      info!(script = %entry.path, "skipping disabled script");
      let carried = carry_forward(
        entry,
        config,
        &committed,
        index.as_ref(),
        &artifact_store,
        &mut store.borrow_mut(),
        &mut carried_bytes,
      )?;
      carried_artifacts.extend(carried);
      skipped_scripts.push(entry.path.clone());
      continue;
    }

    if options.cancel.is_cancelled() {
      info!(script = %entry.path, "build cancelled");
      return Err(BuildError::Cancelled {
        before: format!("script '{}'", entry.path),
      });
    }

    store.borrow_mut().begin_script(&entry.path);
    let result = runner.run(entry, &run_ctx, &store);
    store.borrow_mut().end_script();
    result?;
  }

  if options.cancel.is_cancelled() {
    info!("build cancelled");
    return Err(BuildError::Cancelled {
      before: "commit".to_string(),
    });
  }

  let harvested = store.borrow().harvest()?;

  let mut committed_artifacts = BTreeMap::new();
  let mut fingerprints = BTreeMap::new();
  let mut producers = BTreeMap::new();
  let mut staged = Vec::with_capacity(harvested.len());

  for (name, object) in harvested {
    let (bytes, fingerprint) = match object.origin {
      Origin::Carried { fingerprint } => {
        let bytes = match carried_bytes.remove(&name) {
          Some(bytes) => bytes,
          None => fingerprint_value(&object.value).map_err(ArtifactError::Serialize)?.0,
        };
        (bytes, fingerprint)
      }
      Origin::Produced => fingerprint_value(&object.value).map_err(ArtifactError::Serialize)?,
    };

    debug!(name = %name, fingerprint = %fingerprint.short(), producer = %object.producer, "harvested artifact");
    fingerprints.insert(name.clone(), fingerprint.clone());
    producers.insert(name.clone(), object.producer.clone());
    staged.push(StagedArtifact {
      name: name.clone(),
      producer: object.producer,
      bytes,
      fingerprint,
    });
    committed_artifacts.insert(name, object.value);
  }

  let changed_artifacts = gate::changed_artifacts(&committed.fingerprints, &fingerprints);

  if changed_artifacts.is_empty() {
    info!(data_version = ?committed.data_version.as_ref().map(ToString::to_string), "no artifact changed; digest left untouched");
    return Ok(BuildResult {
      committed_artifacts,
      version_changed: false,
      skipped_scripts,
      fingerprints,
      changed_artifacts,
      carried_artifacts,
      producers,
      data_version: committed.data_version,
      generation: committed.generation,
    });
  }

  if let Err(err) = gate::check(&changed_artifacts, committed.data_version.as_ref(), &requested) {
    warn!(changed = ?changed_artifacts, requested = %requested, "data version gate rejected build");
    return Err(err);
  }

  let generation = committed.generation + 1;
  artifact_store.stage(generation, &staged)?;

  let record = DigestRecord {
    version: DIGEST_FORMAT_VERSION,
    data_version: Some(requested.clone()),
    generation,
    fingerprints: fingerprints.clone(),
  };
  digest_store.commit(&record)?;

  info!(
    generation,
    data_version = %requested,
    changed = changed_artifacts.len(),
    artifacts = fingerprints.len(),
    "build committed"
  );

  // The commit is already durable; leftovers are removed by the next build.
  if let Err(err) = artifact_store.prune(generation) {
    warn!(error = %err, "failed to prune old artifact generations");
  }

  Ok(BuildResult {
    committed_artifacts,
    version_changed: true,
    skipped_scripts,
    fingerprints,
    changed_artifacts,
    carried_artifacts,
    producers,
    data_version: Some(requested),
    generation,
  })
}

/// The data version this build commits under.
fn requested_version(options: &BuildOptions, committed: &DigestRecord) -> Result<Version, BuildError> {
  match (&options.data_version, &committed.data_version) {
    (Some(requested), _) => parse_version(requested),
    (None, Some(committed)) => Ok(committed.clone()),
    (None, None) => parse_version(DEFAULT_DATA_VERSION),
  }
}

fn parse_version(version: &str) -> Result<Version, BuildError> {
  Version::parse(version.trim()).map_err(|source| BuildError::InvalidVersion {
    version: version.to_string(),
    source,
  })
}

/// Read the committed generation index, but only when some script is disabled.
fn load_index_for_carry_forward(
  config: &BuildConfig,
  committed: &DigestRecord,
  artifact_store: &ArtifactStore,
) -> Result<Option<GenerationIndex>, BuildError> {
  let Some(first_disabled) = config.scripts.iter().find(|entry| !entry.enabled) else {
    return Ok(None);
  };

  artifact_store
    .read_index(committed.generation)
    .map_err(|source| BuildError::CarryForward {
      script: first_disabled.path.clone(),
      source,
    })
}

/// Seed the store with the committed artifacts of the disabled script `entry`.
///
/// Each payload is verified against the digest before it is trusted.
fn carry_forward(
  entry: &ScriptEntry,
  config: &BuildConfig,
  committed: &DigestRecord,
  index: Option<&GenerationIndex>,
  artifact_store: &ArtifactStore,
  store: &mut ObjectStore,
  carried_bytes: &mut BTreeMap<String, Vec<u8>>,
) -> Result<Vec<String>, BuildError> {
  let Some(index) = index else {
    debug!(script = %entry.path, "nothing committed yet; no artifacts to carry forward");
    return Ok(Vec::new());
  };

  let mut carried = Vec::new();
  for (name, index_entry) in index.produced_by(&entry.path) {
    if !config.expects(name) {
      debug!(name, script = %entry.path, "artifact no longer declared; not carried forward");
      continue;
    }

    let Some(expected) = committed.fingerprint(name) else {
      warn!(name, script = %entry.path, "artifact missing from digest; not carried forward");
      continue;
    };
    if &index_entry.fingerprint != expected {
      warn!(
        name,
        index = %index_entry.fingerprint.short(),
        digest = %expected.short(),
        "generation index disagrees with digest; trusting digest"
      );
    }

    let loaded = artifact_store
      .read(committed.generation, name, expected)
      .map_err(|source| BuildError::CarryForward {
        script: entry.path.clone(),
        source,
      })?;

    store.carry_forward(name, loaded.value, expected.clone(), &entry.path)?;
    carried_bytes.insert(name.to_string(), loaded.bytes);
    carried.push(name.to_string());
  }

  Ok(carried)
}
