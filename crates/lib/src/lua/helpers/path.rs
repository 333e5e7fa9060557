use std::path::{Path, PathBuf};

use mlua::prelude::*;

/// Append string segments to `base`; non-string values are ignored.
pub fn join_segments(base: &Path, segments: LuaMultiValue) -> LuaResult<PathBuf> {
  let mut result = base.to_path_buf();
  for segment in segments {
    if let LuaValue::String(s) = segment {
      result.push(s.to_str()?);
    }
  }
  Ok(result)
}

/// Create the `dpk.path` table with path manipulation utilities.
pub fn create_path_helpers(lua: &Lua) -> LuaResult<LuaTable<'_>> {
  let path = lua.create_table()?;

  // dpk.path.join(...) - Join multiple path segments
  path.set(
    "join",
    lua.create_function(|_, segments: LuaMultiValue| {
      let result = join_segments(Path::new(""), segments)?;
      Ok(result.to_string_lossy().into_owned())
    })?,
  )?;

  // dpk.path.dirname(path) - Get parent directory
  path.set(
    "dirname",
    lua.create_function(|_, path_str: String| {
      let path = Path::new(&path_str);
      Ok(
        path
          .parent()
          .map(|p| p.to_string_lossy().into_owned())
          .unwrap_or_default(),
      )
    })?,
  )?;

  // dpk.path.basename(path) - Get file name
  path.set(
    "basename",
    lua.create_function(|_, path_str: String| {
      let path = Path::new(&path_str);
      Ok(
        path
          .file_name()
          .map(|n| n.to_string_lossy().into_owned())
          .unwrap_or_default(),
      )
    })?,
  )?;

  // dpk.path.extname(path) - Get file extension (including the dot)
  path.set(
    "extname",
    lua.create_function(|_, path_str: String| {
      let path = Path::new(&path_str);
      Ok(
        path
          .extension()
          .map(|e| format!(".{}", e.to_string_lossy()))
          .unwrap_or_default(),
      )
    })?,
  )?;

  Ok(path)
}
