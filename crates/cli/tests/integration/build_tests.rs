use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn first_build_commits_default_version() {
  let env = TestEnv::cars();

  env
    .dpk_cmd()
    .arg("build")
    .assert()
    .success()
    .stdout(predicate::str::contains("Build committed: data version 0.1.0"));

  let digest = env.digest();
  assert_eq!(digest["dataVersion"], "0.1.0");
  assert_eq!(digest["generation"], 1);
  assert_eq!(digest["fingerprints"]["cars_over_20"].as_str().map(str::len), Some(64));
  assert!(env.path().join("data/objects/1/cars_summary.json").exists());
}

#[test]
fn rebuild_reports_no_change() {
  let env = TestEnv::cars();
  env.dpk_cmd().arg("build").assert().success();
  let before = env.read_file("data/digest.json");

  env
    .dpk_cmd()
    .arg("build")
    .assert()
    .success()
    .stdout(predicate::str::contains("No artifact changed"));

  assert_eq!(env.read_file("data/digest.json"), before);
}

#[test]
fn changed_output_requires_version_bump() {
  let env = TestEnv::cars();
  env.dpk_cmd().args(["build", "--data-version", "0.1.0"]).assert().success();

  env.write_file(
    "data-raw/cars.lua",
    &env.read_file("data-raw/cars.lua").replace("mpg > 20", "mpg > 22"),
  );

  env
    .dpk_cmd()
    .args(["build", "--data-version", "0.1.0"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("version-gate"))
    .stderr(predicate::str::contains("cars_over_20"));
  assert_eq!(env.digest()["dataVersion"], "0.1.0");

  env
    .dpk_cmd()
    .args(["build", "--data-version", "0.2.0"])
    .assert()
    .success()
    .stdout(predicate::str::contains("data version 0.2.0"));
  assert_eq!(env.digest()["dataVersion"], "0.2.0");
  assert_eq!(env.digest()["generation"], 2);
}

#[test]
fn build_json_output_lists_artifacts() {
  let env = TestEnv::cars();

  let output = env
    .dpk_cmd()
    .args(["build", "-o", "json"])
    .output()
    .unwrap();
  assert!(output.status.success());

  let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(report["version_changed"], true);
  assert_eq!(report["artifacts"][0]["name"], "cars_over_20");
  assert_eq!(report["artifacts"][0]["kind"], "array");
  assert_eq!(report["artifacts"][0]["len"], 3);
  assert_eq!(report["artifacts"][1]["producer"], "summary.lua");
}

#[test]
fn isolated_build_fails_on_cross_script_read() {
  let env = TestEnv::cars();

  env
    .dpk_cmd()
    .args(["build", "--isolated"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("execution"))
    .stderr(predicate::str::contains("disabled"));

  assert!(!env.path().join("data/digest.json").exists());
}

#[test]
fn only_runs_selected_scripts() {
  let env = TestEnv::cars();
  env.dpk_cmd().arg("build").assert().success();

  env
    .dpk_cmd()
    .args(["build", "--only", "summary.lua"])
    .assert()
    .success()
    .stdout(predicate::str::contains("No artifact changed"));
}

#[test]
fn only_rejects_unknown_script() {
  let env = TestEnv::cars();

  env
    .dpk_cmd()
    .args(["build", "--only", "nope.lua"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("nope.lua"));
}

#[test]
fn timeout_stops_runaway_script() {
  let env = TestEnv::cars();
  env.write_file("data-raw/cars.lua", "while true do end");

  env
    .dpk_cmd()
    .args(["build", "--timeout", "200ms"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("timed out"));
}

#[test]
fn invalid_timeout_is_rejected_by_parser() {
  let env = TestEnv::cars();

  env.dpk_cmd().args(["build", "--timeout", "soon"]).assert().failure();
}

#[test]
fn script_error_names_script() {
  let env = TestEnv::cars();
  env.write_file("data-raw/summary.lua", r#"error("summary exploded")"#);

  env
    .dpk_cmd()
    .arg("build")
    .assert()
    .failure()
    .stderr(predicate::str::contains("summary.lua"))
    .stderr(predicate::str::contains("summary exploded"));
}
