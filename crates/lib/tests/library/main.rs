mod build_tests;
mod config_tests;
mod scenario_tests;
