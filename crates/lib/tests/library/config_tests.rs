use datapack_lib::config::{BuildConfig, ConfigError, ScriptEntry};

use serial_test::serial;

use super::common::TestPackage;

const CONFIG: &str = r#"
files:
  subsetCars.lua:
    enabled: true
  iris.lua:
    enabled: false
objects:
  - cars_over_20
  - iris
workingRoot: "{project}/data-raw"
"#;

#[test]
#[serial]
fn load_preserves_declared_order() {
  let package = TestPackage::new();
  package.config(CONFIG);

  let config = package.load_config();

  let scripts: Vec<&str> = config.list_scripts().iter().map(|s| s.path.as_str()).collect();
  assert_eq!(scripts, vec!["subsetCars.lua", "iris.lua"]);
  assert!(!config.script("iris.lua").unwrap().enabled);
  assert_eq!(config.list_artifacts(), &["cars_over_20", "iris"]);
}

#[test]
#[serial]
fn mutations_persist_through_save() {
  let package = TestPackage::new();
  package.config(CONFIG);

  let config = package
    .load_config()
    .enable("iris.lua")
    .unwrap()
    .add_script(ScriptEntry::new("mtcars.lua"))
    .unwrap()
    .add_artifact("mtcars")
    .unwrap();
  package.save_config(&config);

  let reloaded = package.load_config();
  assert_eq!(reloaded, config);
  assert_eq!(reloaded.enabled_scripts().count(), 3);
  assert_eq!(reloaded.list_scripts().last().map(|s| s.path.as_str()), Some("mtcars.lua"));
}

#[test]
#[serial]
fn invalid_document_is_rejected() {
  let package = TestPackage::new();
  package.config("files: {}\nobjects: []\n");

  let err = package.project.load_config().unwrap_err();

  assert!(matches!(err, ConfigError::NoArtifacts));
}

#[test]
fn yaml_round_trip() {
  let config = BuildConfig::parse(CONFIG).unwrap();
  let yaml = config.to_yaml().unwrap();
  assert_eq!(BuildConfig::parse(&yaml).unwrap(), config);
}
