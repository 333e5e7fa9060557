use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use mlua::prelude::*;

use crate::lua::globals::{self, ScriptContext};
use crate::objects::ObjectStore;

/// Create a fresh Lua runtime for one processing script.
///
/// `require` resolves modules from the project's `data-raw/` directory, and
/// the `dpk` global is bound to `store`.
pub fn create_runtime(ctx: &ScriptContext, store: Rc<RefCell<ObjectStore>>, scripts_dir: &Path) -> LuaResult<Lua> {
  let lua = Lua::new();
  let package: LuaTable = lua.globals().get("package")?;
  let package_path: String = package.get("path")?;
  let scripts_dir = scripts_dir.to_string_lossy();
  let new_package_path = format!("{dir}/?.lua;{dir}/?/init.lua;{}", package_path, dir = scripts_dir);
  package.set("path", new_package_path)?;
  drop(package);

  globals::register_globals(&lua, ctx, store)?;

  Ok(lua)
}

/// Load and execute the Lua file at `path`.
pub fn load_file(lua: &Lua, path: &Path) -> LuaResult<()> {
  let content = std::fs::read_to_string(path)
    .map_err(|e| LuaError::external(format!("cannot read '{}': {}", path.display(), e)))?;

  lua.load(&content).set_name(format!("@{}", path.display())).exec()
}
