use datapack_lib::build::BuildError;
use serde_json::json;
use serial_test::serial;

use super::common::TestPackage;

const CONFIG: &str = r#"
files:
  cars.lua:
    enabled: true
objects:
  - cars_over_20
"#;

const CARS_CSV: &str = "\
name,mpg,cyl
Mazda RX4,21.0,6
Datsun 710,22.8,4
Hornet Sportabout,18.7,8
Valiant,18.1,6
Merc 240D,24.4,4
";

const CARS_SCRIPT: &str = r#"
local rows = {}
local f = assert(io.open(dpk.extdata_path("cars.csv"), "r"))
f:read("l")
for line in f:lines() do
  local name, mpg, cyl = line:match("^([^,]+),([^,]+),([^,]+)$")
  mpg = tonumber(mpg)
  if mpg > 20 then
    rows[#rows + 1] = { name = name, mpg = mpg, cyl = math.tointeger(tonumber(cyl)) }
  end
end
f:close()
dpk.write("cars_over_20", rows)
"#;

fn cars_package() -> TestPackage {
  let package = TestPackage::new();
  package
    .config(CONFIG)
    .extdata("cars.csv", CARS_CSV)
    .script("cars.lua", CARS_SCRIPT);
  package
}

#[test]
#[serial]
fn cars_over_20_version_gate_lifecycle() {
  let package = cars_package();

  // Initial build commits h1 under 0.1.0.
  let first = package.build_version("0.1.0").unwrap();
  let h1 = first.fingerprints["cars_over_20"].clone();
  assert_eq!(h1.0.len(), 64);
  assert_eq!(
    first.committed_artifacts["cars_over_20"],
    json!([
      { "name": "Mazda RX4", "mpg": 21.0, "cyl": 6 },
      { "name": "Datsun 710", "mpg": 22.8, "cyl": 4 },
      { "name": "Merc 240D", "mpg": 24.4, "cyl": 4 },
    ])
  );
  let digest = package.digest();
  assert_eq!(digest.fingerprints["cars_over_20"], h1);
  assert_eq!(digest.data_version.map(|v| v.to_string()).as_deref(), Some("0.1.0"));

  // Editing the script changes the bytes; the same version is rejected.
  package.script("cars.lua", &CARS_SCRIPT.replace("cyl = math", "source = \"cars.csv\", cyl = math"));
  let err = package.build_version("0.1.0").unwrap_err();
  match &err {
    BuildError::VersionGate { changed, .. } => assert_eq!(changed, &["cars_over_20"]),
    other => panic!("expected VersionGate, got {:?}", other),
  }
  assert!(err.to_string().contains("cars_over_20"));
  let digest = package.digest();
  assert_eq!(digest.fingerprints["cars_over_20"], h1);
  assert_eq!(digest.data_version.map(|v| v.to_string()).as_deref(), Some("0.1.0"));

  // Bumping the version lets the build through with h2.
  let second = package.build_version("0.2.0").unwrap();
  let h2 = second.fingerprints["cars_over_20"].clone();
  assert_ne!(h1, h2);
  assert!(second.version_changed);
  let digest = package.digest();
  assert_eq!(digest.fingerprints["cars_over_20"], h2);
  assert_eq!(digest.data_version.map(|v| v.to_string()).as_deref(), Some("0.2.0"));
}

#[test]
#[serial]
fn cars_over_20_summary_describes_artifact() {
  let package = cars_package();

  let result = package.build_version("0.1.0").unwrap();
  let summaries = result.artifact_summaries();

  assert_eq!(summaries.len(), 1);
  let summary = &summaries[0];
  assert_eq!(summary.name, "cars_over_20");
  assert_eq!(summary.kind, "array");
  assert_eq!(summary.len, Some(3));
  assert_eq!(summary.producer, "cars.lua");
  assert_eq!(summary.fingerprint, result.fingerprints["cars_over_20"]);
}
