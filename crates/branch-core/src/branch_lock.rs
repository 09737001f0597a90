use crate::lockfile::{LockError, LockFile, LockMode};
use crate::model::BranchKind;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Per-branch advisory locks. Each branch is guarded in-process by a holder
/// table and across processes by `<lock_dir>/<branch>.lock`.
///
/// Transfers take a branch exclusively. Status scans share it, so any number
/// of scans run side by side while a transfer makes them report busy.
#[derive(Debug)]
pub struct BranchLocks {
    lock_dir: PathBuf,
    held: Mutex<HashMap<BranchKind, Holders>>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Holders {
    Writer,
    Readers(usize),
}

#[derive(Debug)]
pub struct BranchGuard<'a> {
    locks: &'a BranchLocks,
    branch: BranchKind,
    mode: LockMode,
    _file: Option<LockFile>,
}

impl BranchGuard<'_> {
    pub fn branch(&self) -> BranchKind {
        self.branch
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }
}

impl Drop for BranchGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut held) = self.locks.held.lock() {
            match held.get(&self.branch).copied() {
                Some(Holders::Readers(count)) if count > 1 => {
                    held.insert(self.branch, Holders::Readers(count - 1));
                }
                _ => {
                    held.remove(&self.branch);
                }
            }
        }
        debug!(branch = %self.branch, mode = ?self.mode, "released branch lock");
    }
}

impl BranchLocks {
    pub fn new(lock_dir: impl Into<PathBuf>) -> Self {
        Self {
            lock_dir: lock_dir.into(),
            held: Mutex::new(HashMap::new()),
        }
    }

    /// Lock directory inside a managed environment.
    pub fn for_environment(managed: &Path) -> Self {
        Self::new(managed.join(".locks"))
    }

    pub fn lock_path(&self, branch: BranchKind) -> PathBuf {
        self.lock_dir.join(format!("{}.lock", branch.folder_name()))
    }

    /// Takes `branch` for writing. Returns `None` when anyone else holds it.
    pub fn try_acquire(&self, branch: BranchKind) -> Result<Option<BranchGuard<'_>>, LockError> {
        let mut held = self.held.lock().map_err(|_| LockError::Poisoned)?;
        if held.contains_key(&branch) {
            return Ok(None);
        }
        let path = self.lock_path(branch);
        let Some(file) = LockFile::try_acquire(&path, LockMode::Exclusive)? else {
            return Ok(None);
        };
        held.insert(branch, Holders::Writer);
        debug!(branch = %branch, "acquired branch lock");
        Ok(Some(BranchGuard {
            locks: self,
            branch,
            mode: LockMode::Exclusive,
            _file: Some(file),
        }))
    }

    /// Takes `branch` for reading. Returns `None` only while a writer holds
    /// it. A branch that has never been written has no lock file yet; the
    /// guard then holds no file and nothing is created on disk.
    pub fn try_acquire_shared(
        &self,
        branch: BranchKind,
    ) -> Result<Option<BranchGuard<'_>>, LockError> {
        let mut held = self.held.lock().map_err(|_| LockError::Poisoned)?;
        let readers = match held.get(&branch) {
            Some(Holders::Writer) => return Ok(None),
            Some(Holders::Readers(count)) => *count,
            None => 0,
        };
        let file = match LockFile::try_acquire(&self.lock_path(branch), LockMode::Shared) {
            Ok(Some(file)) => Some(file),
            Ok(None) => return Ok(None),
            Err(LockError::Open { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                None
            }
            Err(err) => return Err(err),
        };
        held.insert(branch, Holders::Readers(readers + 1));
        debug!(branch = %branch, "acquired shared branch lock");
        Ok(Some(BranchGuard {
            locks: self,
            branch,
            mode: LockMode::Shared,
            _file: file,
        }))
    }

    /// Whether a writer currently holds `branch`.
    pub fn is_held(&self, branch: BranchKind) -> Result<bool, LockError> {
        Ok(self.try_acquire_shared(branch)?.is_none())
    }
}
