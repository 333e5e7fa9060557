//! Global Lua values and the `dpk` table.
//!
//! This module registers the `dpk` global table which provides:
//! - `dpk.write(name, value)` - Publish an artifact to the Object Store
//! - `dpk.read(name)` - Read an artifact written by an earlier script
//! - `dpk.exists(name)` - Check whether an earlier script wrote an artifact
//! - `dpk.script` - Path of the running script, relative to `data-raw/`
//! - `dpk.root` - Absolute project root
//! - `dpk.working_root` - Shared working directory of the build
//! - `dpk.project_path(...)`, `dpk.data_path(...)`, `dpk.extdata_path(...)`,
//!   `dpk.raw_path(...)` - Absolute paths inside the project
//! - `dpk.path` - Path manipulation utilities

use std::cell::RefCell;
use std::collections::HashSet;
use std::ffi::c_void;
use std::path::PathBuf;
use std::rc::Rc;

use mlua::prelude::*;
use serde_json::Value;

use super::helpers;
use super::helpers::path::join_segments;
use crate::consts::{DATA_DIR, EXTDATA_DIR, SCRIPTS_DIR};
use crate::objects::ObjectStore;

/// Per-script values exposed through the `dpk` table.
#[derive(Debug, Clone)]
pub struct ScriptContext {
  pub script: String,
  pub project_root: PathBuf,
  pub working_root: PathBuf,
}

impl ScriptContext {
  /// Context whose working root is the project root.
  pub fn new(script: impl Into<String>, project_root: impl Into<PathBuf>) -> Self {
    let project_root = project_root.into();
    Self {
      script: script.into(),
      working_root: project_root.clone(),
      project_root,
    }
  }

  pub fn with_working_root(mut self, working_root: impl Into<PathBuf>) -> Self {
    self.working_root = working_root.into();
    self
  }
}

/// Register the `dpk` global table in the Lua runtime.
pub fn register_globals(lua: &Lua, ctx: &ScriptContext, store: Rc<RefCell<ObjectStore>>) -> LuaResult<()> {
  let dpk = lua.create_table()?;

  dpk.set("script", ctx.script.as_str())?;
  dpk.set("root", ctx.project_root.to_string_lossy().into_owned())?;
  dpk.set("working_root", ctx.working_root.to_string_lossy().into_owned())?;

  // Path utilities
  dpk.set("path", helpers::path::create_path_helpers(lua)?)?;
  register_project_path(lua, &dpk, "project_path", ctx.project_root.clone())?;
  register_project_path(lua, &dpk, "data_path", ctx.project_root.join(DATA_DIR))?;
  register_project_path(lua, &dpk, "extdata_path", ctx.project_root.join(EXTDATA_DIR))?;
  register_project_path(lua, &dpk, "raw_path", ctx.project_root.join(SCRIPTS_DIR))?;

  // dpk.write(name, value)
  let write_store = store.clone();
  let write = lua.create_function(move |lua, (name, value): (String, LuaValue)| {
    if value.is_nil() {
      return Err(LuaError::external(format!("cannot write nil to object '{}'", name)));
    }
    ensure_finite(&name, &value, &mut HashSet::new())?;
    let value: Value = lua.from_value(value)?;
    write_store.borrow_mut().write(&name, value).map_err(LuaError::external)
  })?;
  dpk.set("write", write)?;

  // dpk.read(name)
  let read_store = store.clone();
  let read = lua.create_function(move |lua, name: String| {
    let store = read_store.borrow();
    let value = store.read(&name).map_err(LuaError::external)?;
    lua.to_value(value)
  })?;
  dpk.set("read", read)?;

  // dpk.exists(name) follows the same access rules as dpk.read
  let exists = lua.create_function(move |_, name: String| {
    let store = store.borrow();
    match store.read(&name) {
      Ok(_) => Ok(true),
      Err(crate::objects::ObjectStoreError::NotFound { .. }) => Ok(false),
      Err(err) => Err(LuaError::external(err)),
    }
  })?;
  dpk.set("exists", exists)?;

  lua.globals().set("dpk", dpk)?;

  Ok(())
}

/// JSON has no NaN or infinity; serde would store them as `null`.
fn ensure_finite(name: &str, value: &LuaValue<'_>, seen: &mut HashSet<*const c_void>) -> LuaResult<()> {
  match value {
    LuaValue::Number(n) if !n.is_finite() => Err(LuaError::external(format!(
      "cannot write object '{}': it contains the non-finite number {}",
      name, n
    ))),
    LuaValue::Table(table) => {
      if !seen.insert(table.to_pointer()) {
        return Ok(());
      }
      for pair in table.clone().pairs::<LuaValue, LuaValue>() {
        let (key, item) = pair?;
        ensure_finite(name, &key, seen)?;
        ensure_finite(name, &item, seen)?;
      }
      Ok(())
    }
    _ => Ok(()),
  }
}

fn register_project_path(lua: &Lua, dpk: &LuaTable, key: &str, base: PathBuf) -> LuaResult<()> {
  let func = lua.create_function(move |_, segments: LuaMultiValue| {
    let path = join_segments(&base, segments)?;
    Ok(path.to_string_lossy().into_owned())
  })?;
  dpk.set(key, func)
}
