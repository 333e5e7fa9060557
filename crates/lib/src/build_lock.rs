//! Advisory lock on a project's `data/` directory.
//!
//! A build holds an exclusive lock on `data/.lock` from before it reads the
//! digest until after it commits, so two builds of one project never
//! interleave. Readers (`dpk status`, `dpk show`) take a shared lock and so
//! never observe a build between staging and committing.
//!
//! Acquisition never blocks. The exclusive holder records itself in the lock
//! file so a contending process can say who is in the way.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const LOCK_FILENAME: &str = ".lock";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
  Shared,
  Exclusive,
}

/// Process recorded in the lock file by the exclusive holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockHolder {
  pub pid: u32,
  pub command: String,
  pub started_at_unix: u64,
}

impl LockHolder {
  fn current(command: &str) -> Self {
    Self {
      pid: std::process::id(),
      command: command.to_string(),
      started_at_unix: SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default(),
    }
  }
}

impl fmt::Display for LockHolder {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{} (PID {}, started at Unix time {})",
      self.command, self.pid, self.started_at_unix
    )
  }
}

#[derive(Debug, Error)]
pub enum BuildLockError {
  #[error(
    "a build is already in progress{}\n\
     If no datapack process is running, remove the lock file:\n  {}",
    holder.as_ref().map(|h| format!(": {}", h)).unwrap_or_default(),
    lock_path.display()
  )]
  Held {
    holder: Option<LockHolder>,
    lock_path: PathBuf,
  },

  #[error("failed to {action} {}: {source}", path.display())]
  Io {
    action: &'static str,
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

impl BuildLockError {
  /// True when another process holds the lock, as opposed to an I/O failure.
  pub fn is_contention(&self) -> bool {
    matches!(self, BuildLockError::Held { .. })
  }

  fn io<'a>(action: &'static str, path: &'a Path) -> impl FnOnce(io::Error) -> Self + 'a {
    move |source| BuildLockError::Io {
      action,
      path: path.to_path_buf(),
      source,
    }
  }
}

/// Held lock; released when dropped.
#[derive(Debug)]
pub struct BuildLock {
  file: File,
  lock_path: PathBuf,
  mode: LockMode,
}

impl BuildLock {
  /// Acquire the lock for the project data directory `data_dir`, creating
  /// the directory if needed.
  pub fn acquire(data_dir: &Path, mode: LockMode, command: &str) -> Result<Self, BuildLockError> {
    std::fs::create_dir_all(data_dir).map_err(BuildLockError::io("create", data_dir))?;

    let lock_path = data_dir.join(LOCK_FILENAME);
    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(false)
      .open(&lock_path)
      .map_err(BuildLockError::io("open", &lock_path))?;

    if !sys::try_lock(&file, mode).map_err(BuildLockError::io("lock", &lock_path))? {
      return Err(BuildLockError::Held {
        holder: read_holder_at(&lock_path),
        lock_path,
      });
    }

    let lock = BuildLock { file, lock_path, mode };
    if mode == LockMode::Exclusive {
      lock.record_holder(&LockHolder::current(command))?;
    }
    Ok(lock)
  }

  pub fn mode(&self) -> LockMode {
    self.mode
  }

  pub fn lock_path(&self) -> &Path {
    &self.lock_path
  }

  /// Holder recorded in the lock file, read through the handle we already hold.
  ///
  /// A second handle would fail on Windows, where locks are mandatory.
  pub fn holder(&self) -> io::Result<LockHolder> {
    let mut file = &self.file;
    file.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    serde_json::from_str(&contents).map_err(io::Error::other)
  }

  fn record_holder(&self, holder: &LockHolder) -> Result<(), BuildLockError> {
    let write_err = BuildLockError::io("write", &self.lock_path);
    let json = serde_json::to_vec_pretty(holder).map_err(io::Error::other);
    let result = json.and_then(|json| {
      let mut file = &self.file;
      file.set_len(0)?;
      file.seek(SeekFrom::Start(0))?;
      file.write_all(&json)?;
      file.flush()
    });
    result.map_err(write_err)
  }
}

/// Best-effort read of the holder from a lock file we could not lock.
fn read_holder_at(lock_path: &Path) -> Option<LockHolder> {
  let contents = std::fs::read_to_string(lock_path).ok()?;
  serde_json::from_str(&contents).ok()
}

#[cfg(unix)]
mod sys {
  use std::fs::File;
  use std::io;
  use std::os::unix::io::AsFd;

  use rustix::fs::{FlockOperation, flock};

  use super::LockMode;

  /// Try to lock without blocking. `Ok(false)` means another process holds it.
  pub fn try_lock(file: &File, mode: LockMode) -> io::Result<bool> {
    let operation = match mode {
      LockMode::Shared => FlockOperation::NonBlockingLockShared,
      LockMode::Exclusive => FlockOperation::NonBlockingLockExclusive,
    };

    match flock(file.as_fd(), operation) {
      Ok(()) => Ok(true),
      Err(errno) if errno == rustix::io::Errno::WOULDBLOCK => Ok(false),
      Err(errno) => Err(io::Error::from_raw_os_error(errno.raw_os_error())),
    }
  }
}

#[cfg(windows)]
mod sys {
  use std::fs::File;
  use std::io;
  use std::os::windows::io::AsRawHandle;

  use windows_sys::Win32::Foundation::{ERROR_LOCK_VIOLATION, HANDLE};
  use windows_sys::Win32::Storage::FileSystem::{LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY, LockFileEx};

  use super::LockMode;

  /// Try to lock without blocking. `Ok(false)` means another process holds it.
  pub fn try_lock(file: &File, mode: LockMode) -> io::Result<bool> {
    let handle = file.as_raw_handle() as HANDLE;
    let flags = match mode {
      LockMode::Shared => LOCKFILE_FAIL_IMMEDIATELY,
      LockMode::Exclusive => LOCKFILE_FAIL_IMMEDIATELY | LOCKFILE_EXCLUSIVE_LOCK,
    };

    // SAFETY: OVERLAPPED is plain data and valid when zeroed; the handle is
    // owned by `file` and outlives the call.
    let result = unsafe {
      let mut overlapped = std::mem::zeroed();
      LockFileEx(handle, flags, 0, 1, 0, &mut overlapped)
    };

    if result != 0 {
      return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(ERROR_LOCK_VIOLATION as i32) {
      Ok(false)
    } else {
      Err(err)
    }
  }
}
