use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn status_before_first_build() {
  let env = TestEnv::cars();

  env
    .dpk_cmd()
    .arg("status")
    .assert()
    .success()
    .stdout(predicate::str::contains("Nothing committed yet"))
    .stdout(predicate::str::contains("not committed"));
}

#[test]
fn status_json_after_build() {
  let env = TestEnv::cars();
  env.dpk_cmd().args(["build", "--data-version", "1.2.3"]).assert().success();

  let output = env.dpk_cmd().args(["status", "-o", "json"]).output().unwrap();
  assert!(output.status.success());

  let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(report["data_version"], "1.2.3");
  assert_eq!(report["generation"], 1);
  assert_eq!(report["artifacts"][0]["name"], "cars_over_20");
  assert_eq!(report["artifacts"][0]["producer"], "cars.lua");
  assert_eq!(report["artifacts"][0]["declared"], true);
}

#[test]
fn show_prints_committed_artifact() {
  let env = TestEnv::cars();
  env.dpk_cmd().arg("build").assert().success();

  let output = env.dpk_cmd().args(["show", "cars_summary"]).output().unwrap();
  assert!(output.status.success());

  let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(summary["count"], 3);
}

#[test]
fn show_unknown_artifact_fails() {
  let env = TestEnv::cars();
  env.dpk_cmd().arg("build").assert().success();

  env
    .dpk_cmd()
    .args(["show", "nope"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("No committed artifact named 'nope'"));
}

#[test]
fn show_detects_tampered_payload() {
  let env = TestEnv::cars();
  env.dpk_cmd().arg("build").assert().success();
  env.write_file("data/objects/1/cars_summary.json", "{}");

  env
    .dpk_cmd()
    .args(["show", "cars_summary"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("corrupted"));
}

#[test]
fn status_flags_tampered_payload() {
  let env = TestEnv::cars();
  env.dpk_cmd().arg("build").assert().success();
  env.write_file("data/objects/1/cars_over_20.json", "[]");

  let output = env.dpk_cmd().args(["status", "-o", "json"]).output().unwrap();
  assert!(output.status.success());

  let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(report["artifacts"][0]["intact"], false);
  assert_eq!(report["artifacts"][1]["intact"], true);

  env
    .dpk_cmd()
    .arg("status")
    .assert()
    .success()
    .stdout(predicate::str::contains("corrupted"));
}
