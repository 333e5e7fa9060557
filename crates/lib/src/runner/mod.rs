//! Script execution.
//!
//! [`ScriptRunner`] is the seam between the build orchestrator and whatever
//! executes processing scripts. [`LuaRunner`] runs `data-raw/*.lua` files in an
//! embedded Lua 5.4 VM.

mod lua;
mod types;

pub use lua::LuaRunner;
pub use types::*;

use std::cell::RefCell;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use tracing::warn;

use crate::config::ScriptEntry;
use crate::objects::ObjectStore;

/// Per-build settings every script of the build runs under.
#[derive(Debug, Clone, Copy)]
pub struct RunContext<'a> {
  /// Process working directory while the script runs.
  pub working_root: &'a Path,
  /// Abort the script once it has run this long.
  pub timeout: Option<Duration>,
}

impl<'a> RunContext<'a> {
  pub fn new(working_root: &'a Path) -> Self {
    Self {
      working_root,
      timeout: None,
    }
  }

  pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.timeout = timeout;
    self
  }
}

/// Executes one processing script against the build's Object Store.
pub trait ScriptRunner {
  /// Run `entry` under `ctx`.
  ///
  /// The store's current script is already set to `entry.path`.
  fn run(&self, entry: &ScriptEntry, ctx: &RunContext<'_>, store: &Rc<RefCell<ObjectStore>>) -> Result<(), RunError>;
}

/// Switches the process working directory and restores it on drop.
pub(crate) struct WorkingDirGuard {
  previous: PathBuf,
}

impl WorkingDirGuard {
  pub(crate) fn enter(dir: &Path) -> io::Result<Self> {
    let previous = std::env::current_dir()?;
    std::env::set_current_dir(dir)?;
    Ok(Self { previous })
  }
}

impl Drop for WorkingDirGuard {
  fn drop(&mut self) {
    if let Err(err) = std::env::set_current_dir(&self.previous) {
      warn!(path = %self.previous.display(), error = %err, "failed to restore working directory");
    }
  }
}
