use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};

use mlua::prelude::*;
use tracing::{debug, info};

use super::{RunContext, RunError, RunFailure, ScriptRunner, ScriptTimeout, WorkingDirGuard};
use crate::config::ScriptEntry;
use crate::lua::globals::ScriptContext;
use crate::lua::runtime;
use crate::objects::{ObjectStore, ObjectStoreError};
use crate::project::Project;

/// Instructions executed between deadline checks.
const HOOK_INSTRUCTION_INTERVAL: u32 = 1_000;

/// Runs processing scripts from a project's `data-raw/` directory.
#[derive(Debug, Clone)]
pub struct LuaRunner {
  project_root: PathBuf,
  scripts_dir: PathBuf,
}

impl LuaRunner {
  pub fn new(project: &Project) -> Self {
    Self {
      project_root: project.root().to_path_buf(),
      scripts_dir: project.scripts_dir(),
    }
  }
}

impl ScriptRunner for LuaRunner {
  fn run(&self, entry: &ScriptEntry, ctx: &RunContext<'_>, store: &Rc<RefCell<ObjectStore>>) -> Result<(), RunError> {
    let working_root = ctx.working_root;
    let script_path = self.scripts_dir.join(&entry.path);
    if !script_path.is_file() {
      return Err(RunError::new(&entry.path, RunFailure::NotFound(script_path)));
    }

    let script_ctx = ScriptContext::new(&entry.path, &self.project_root).with_working_root(working_root);
    let lua = runtime::create_runtime(&script_ctx, store.clone(), &self.scripts_dir)
      .map_err(|err| RunError::new(&entry.path, classify(&err)))?;

    let _cwd = WorkingDirGuard::enter(working_root).map_err(|source| {
      RunError::new(
        &entry.path,
        RunFailure::WorkingRoot {
          path: working_root.to_path_buf(),
          source,
        },
      )
    })?;

    info!(script = %entry.path, "running script");
    let started = Instant::now();
    if let Some(limit) = ctx.timeout {
      install_deadline(&lua, started + limit, limit);
    }

    runtime::load_file(&lua, &script_path).map_err(|err| RunError::new(&entry.path, classify(&err)))?;

    debug!(script = %entry.path, elapsed = ?started.elapsed(), "script finished");
    Ok(())
  }
}

fn install_deadline(lua: &Lua, deadline: Instant, limit: Duration) {
  lua.set_hook(
    LuaHookTriggers::new().every_nth_instruction(HOOK_INSTRUCTION_INTERVAL),
    move |_, _| {
      if Instant::now() >= deadline {
        Err(LuaError::external(ScriptTimeout { limit }))
      } else {
        Ok(())
      }
    },
  );
}

/// Map a Lua error to a failure, recovering typed errors raised from Rust callbacks.
fn classify(err: &LuaError) -> RunFailure {
  if let Some(timeout) = find_cause::<ScriptTimeout>(err) {
    return RunFailure::Timeout(timeout.limit);
  }
  if let Some(store_err) = find_cause::<ObjectStoreError>(err) {
    return RunFailure::ObjectStore(store_err.clone());
  }
  RunFailure::Lua(err.to_string())
}

fn find_cause<T: std::error::Error + 'static>(err: &LuaError) -> Option<&T> {
  match err {
    LuaError::CallbackError { cause, .. } => find_cause(cause),
    LuaError::WithContext { cause, .. } => find_cause(cause),
    _ => err.downcast_ref::<T>(),
  }
}
