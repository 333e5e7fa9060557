use std::time::{Duration, Instant};

use datapack_lib::build::{BuildError, BuildOptions};
use datapack_lib::objects::ObjectStoreError;
use datapack_lib::runner::RunFailure;
use serde_json::json;
use serial_test::serial;

use super::common::TestPackage;

const PIPELINE: &str = r#"
files:
  a.lua:
    enabled: true
  b.lua:
    enabled: true
objects:
  - x
  - y
"#;

const REVERSED: &str = r#"
files:
  b.lua:
    enabled: true
  a.lua:
    enabled: true
objects:
  - x
  - y
"#;

fn pipeline() -> TestPackage {
  let package = TestPackage::new();
  package
    .config(PIPELINE)
    .script("a.lua", r#"dpk.write("x", { value = 20 })"#)
    .script("b.lua", r#"local x = dpk.read("x"); dpk.write("y", x.value + 1)"#);
  package
}

fn store_error(err: &BuildError) -> Option<&ObjectStoreError> {
  match err {
    BuildError::Execution(run) => run.object_store_error(),
    _ => None,
  }
}

#[test]
#[serial]
fn rebuild_without_changes_is_idempotent() {
  let package = pipeline();

  let first = package.build_version("0.1.0").unwrap();
  let snapshot = package.data_snapshot();
  let second = package.build_version("0.1.0").unwrap();

  assert!(first.version_changed);
  assert!(!second.version_changed);
  assert_eq!(first.fingerprints, second.fingerprints);
  assert_eq!(package.data_snapshot(), snapshot);
}

#[test]
#[serial]
fn later_script_observes_earlier_write() {
  let package = pipeline();

  let result = package.build_version("0.1.0").unwrap();

  assert_eq!(result.committed_artifacts["x"], json!({ "value": 20 }));
  assert_eq!(result.committed_artifacts["y"], json!(21));
}

#[test]
#[serial]
fn reversed_order_fails_with_not_found() {
  let package = pipeline();
  package.config(REVERSED);

  let err = package.build_version("0.1.0").unwrap_err();

  assert_eq!(err.stage(), "execution");
  assert!(matches!(
    store_error(&err),
    Some(ObjectStoreError::NotFound { name, reader }) if name == "x" && reader == "b.lua"
  ));
  assert!(package.data_snapshot().is_empty());
}

#[test]
#[serial]
fn isolated_build_rejects_cross_script_reads() {
  for order in [PIPELINE, REVERSED] {
    let package = pipeline();
    package.config(order);

    let options = BuildOptions::default().with_data_version("0.1.0").isolated();
    let err = package.build(&options).unwrap_err();

    assert!(
      matches!(store_error(&err), Some(ObjectStoreError::AccessDisabled { name, .. }) if name == "x"),
      "unexpected error: {}",
      err
    );
  }
}

#[test]
#[serial]
fn gate_failure_leaves_no_trace() {
  let package = pipeline();
  package.build_version("1.0.0").unwrap();
  let snapshot = package.data_snapshot();

  package.script("a.lua", r#"dpk.write("x", { value = 30 })"#);
  let err = package.build_version("1.0.0").unwrap_err();

  match &err {
    BuildError::VersionGate {
      changed,
      committed,
      requested,
    } => {
      assert_eq!(changed, &["x", "y"]);
      assert_eq!(committed.as_ref().map(ToString::to_string).as_deref(), Some("1.0.0"));
      assert_eq!(requested.to_string(), "1.0.0");
    }
    other => panic!("expected VersionGate, got {:?}", other),
  }
  assert_eq!(package.data_snapshot(), snapshot);
}

#[test]
#[serial]
fn gate_success_commits_new_fingerprints() {
  let package = pipeline();
  let first = package.build_version("1.0.0").unwrap();

  package.script("a.lua", r#"dpk.write("x", { value = 30 })"#);
  let second = package.build_version("1.1.0").unwrap();

  let digest = package.digest();
  assert!(second.version_changed);
  assert_eq!(digest.data_version.map(|v| v.to_string()).as_deref(), Some("1.1.0"));
  assert_eq!(digest.fingerprints, second.fingerprints);
  assert_ne!(first.fingerprints["x"], second.fingerprints["x"]);
}

#[test]
#[serial]
fn build_without_version_reuses_committed_version() {
  let package = pipeline();
  package.build(&BuildOptions::default()).unwrap();
  assert_eq!(package.digest().data_version.map(|v| v.to_string()).as_deref(), Some("0.1.0"));

  package.script("a.lua", r#"dpk.write("x", { value = 21 })"#);
  let err = package.build(&BuildOptions::default()).unwrap_err();

  assert_eq!(err.stage(), "version-gate");
}

#[test]
#[serial]
fn disabled_script_is_preserved_byte_for_byte() {
  let package = pipeline();
  package.build_version("0.1.0").unwrap();
  let x_payload = |p: &TestPackage| {
    let digest = p.digest();
    std::fs::read(
      p.project
        .artifact_store()
        .generation_dir(digest.generation)
        .join("x.json"),
    )
    .unwrap()
  };
  let before_payload = x_payload(&package);
  let before_fingerprint = package.digest().fingerprints["x"].clone();

  let config = package.load_config().disable("a.lua").unwrap();
  package.save_config(&config);
  package.script("a.lua", r#"error("must not run")"#);
  package.script("b.lua", r#"local x = dpk.read("x"); dpk.write("y", x.value + 2)"#);

  let result = package.build_version("0.2.0").unwrap();

  assert_eq!(result.skipped_scripts, vec!["a.lua"]);
  assert_eq!(result.changed_artifacts, vec!["y"]);
  assert_eq!(result.committed_artifacts["y"], json!(22));
  assert_eq!(package.digest().fingerprints["x"], before_fingerprint);
  assert_eq!(x_payload(&package), before_payload);
}

#[test]
#[serial]
fn scripts_share_the_working_root() {
  let package = TestPackage::new();
  package
    .config(PIPELINE)
    .script(
      "a.lua",
      r#"
        local f = assert(io.open("handoff.txt", "w"))
        f:write("from a")
        f:close()
        dpk.write("x", true)
      "#,
    )
    .script(
      "b.lua",
      r#"
        local f = assert(io.open("handoff.txt", "r"))
        dpk.write("y", f:read("a"))
        f:close()
      "#,
    );

  let result = package.build_version("0.1.0").unwrap();

  assert_eq!(result.committed_artifacts["y"], json!("from a"));
  assert!(package.root().join("data-raw").join("handoff.txt").exists());
}

#[test]
#[serial]
fn custom_working_root_is_created() {
  let package = pipeline();
  let config = format!("{}workingRoot: \"{{project}}/scratch\"\n", PIPELINE);
  package.config(&config);
  package.script("a.lua", r#"dpk.write("x", { value = dpk.working_root })"#);
  package.script("b.lua", r#"dpk.write("y", 0)"#);

  let result = package.build_version("0.1.0").unwrap();

  let scratch = package.root().join("scratch");
  assert!(scratch.is_dir());
  assert_eq!(
    result.committed_artifacts["x"],
    json!({ "value": scratch.to_string_lossy() })
  );
}

#[cfg(unix)]
#[test]
#[serial]
fn tmp_working_root_follows_tmpdir() {
  let package = pipeline();
  let config = format!("{}workingRoot: \"{{tmp}}/datapack-work\"\n", PIPELINE);
  package.config(&config);
  package.script("a.lua", r#"dpk.write("x", { value = dpk.working_root })"#);
  package.script("b.lua", r#"dpk.write("y", 0)"#);
  let tmp = package.root().join("tmp");
  std::fs::create_dir_all(&tmp).unwrap();

  let result = temp_env::with_var("TMPDIR", Some(&tmp), || package.build_version("0.1.0")).unwrap();

  let work = tmp.join("datapack-work");
  assert!(work.is_dir());
  assert_eq!(result.committed_artifacts["x"], json!({ "value": work.to_string_lossy() }));
}

#[test]
#[serial]
fn undeclared_write_fails_the_build() {
  let package = pipeline();
  package.script("b.lua", r#"dpk.write("z", 1)"#);

  let err = package.build_version("0.1.0").unwrap_err();

  assert!(matches!(store_error(&err), Some(ObjectStoreError::Undeclared { name, writer }) if name == "z" && writer == "b.lua"));
}

#[test]
#[serial]
fn missing_artifact_fails_harvest() {
  let package = pipeline();
  package.script("b.lua", "-- produces nothing");

  let err = package.build_version("0.1.0").unwrap_err();

  assert_eq!(err.stage(), "harvest");
  assert!(matches!(err, BuildError::Harvest(ObjectStoreError::Missing { ref names }) if names == &["y"]));
  assert!(package.data_snapshot().is_empty());
}

#[test]
#[serial]
fn timeout_aborts_runaway_script() {
  let package = pipeline();
  package.script("a.lua", "while true do end");

  let options = BuildOptions {
    data_version: Some("0.1.0".to_string()),
    timeout: Some(Duration::from_millis(100)),
    ..BuildOptions::default()
  };
  let started = Instant::now();
  let err = package.build(&options).unwrap_err();

  assert!(started.elapsed() < Duration::from_secs(10));

  match err {
    BuildError::Execution(run) => {
      assert_eq!(run.script, "a.lua");
      assert!(matches!(run.cause, RunFailure::Timeout(_)));
    }
    other => panic!("expected execution error, got {:?}", other),
  }
}

#[test]
#[serial]
fn failing_script_keeps_previous_commit() {
  let package = pipeline();
  package.build_version("0.1.0").unwrap();
  let snapshot = package.data_snapshot();

  package.script("b.lua", r#"error("broken")"#);
  let err = package.build_version("0.2.0").unwrap_err();

  assert_eq!(err.stage(), "execution");
  assert!(err.to_string().contains("b.lua"));
  assert_eq!(package.data_snapshot(), snapshot);
}
