//! Well-known names shared across the crate.

pub const APP_NAME: &str = "datapack";

/// Build configuration document at the project root.
pub const CONFIG_FILENAME: &str = "datapack.yml";

/// Directory holding processing scripts, relative to the project root.
pub const SCRIPTS_DIR: &str = "data-raw";

/// Directory holding committed state, relative to the project root.
pub const DATA_DIR: &str = "data";

/// Directory holding raw input files scripts may read.
pub const EXTDATA_DIR: &str = "extdata";

/// Digest file name inside [`DATA_DIR`].
pub const DIGEST_FILENAME: &str = "digest.json";

/// Generation directories live under this directory inside [`DATA_DIR`].
pub const OBJECTS_DIR: &str = "objects";

/// Data version assumed when neither the caller nor the digest supplies one.
pub const DEFAULT_DATA_VERSION: &str = "0.1.0";
