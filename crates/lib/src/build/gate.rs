//! The data version gate.
//!
//! Any change to the committed artifact set must come with a strictly greater
//! data version, so an unchanged version always means unchanged bytes.

use std::collections::BTreeMap;

use semver::Version;

use super::BuildError;
use crate::util::hash::Fingerprint;

/// Names that are new, whose fingerprint differs, or that were removed.
pub fn changed_artifacts(
  committed: &BTreeMap<String, Fingerprint>,
  next: &BTreeMap<String, Fingerprint>,
) -> Vec<String> {
  let mut changed: Vec<String> = next
    .iter()
    .filter(|(name, fingerprint)| committed.get(*name) != Some(*fingerprint))
    .map(|(name, _)| name.clone())
    .collect();

  changed.extend(committed.keys().filter(|name| !next.contains_key(*name)).cloned());
  changed.sort();
  changed
}

/// Check that `requested` may be committed over `committed` given `changed`.
///
/// Nothing changed always passes. With changes, the first commit accepts any
/// version; later commits need a strictly greater one.
pub fn check(changed: &[String], committed: Option<&Version>, requested: &Version) -> Result<(), BuildError> {
  if changed.is_empty() {
    return Ok(());
  }

  match committed {
    Some(committed) if requested <= committed => Err(BuildError::VersionGate {
      changed: changed.to_vec(),
      committed: Some(committed.clone()),
      requested: requested.clone(),
    }),
    _ => Ok(()),
  }
}
