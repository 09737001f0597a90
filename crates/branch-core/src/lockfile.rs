use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("open lock file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("lock file {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("branch lock registry poisoned")]
    Poisoned,
}

/// Readers share a lock file; a writer needs it alone.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// Advisory cross-process lock held for as long as the value lives.
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
    mode: LockMode,
    file: File,
}

impl LockFile {
    /// Returns `None` when a conflicting holder owns the file.
    ///
    /// Exclusive locks create the file and its directory. Shared locks only
    /// open an existing file and fail with [`LockError::Open`] otherwise, so
    /// readers never leave lock files behind.
    pub fn try_acquire(path: &Path, mode: LockMode) -> Result<Option<Self>, LockError> {
        let open_error = |source| LockError::Open {
            path: path.to_path_buf(),
            source,
        };
        let exclusive = mode == LockMode::Exclusive;
        if exclusive {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(open_error)?;
            }
        }
        let file = OpenOptions::new()
            .create(exclusive)
            .read(true)
            .write(exclusive)
            .truncate(false)
            .open(path)
            .map_err(open_error)?;

        let locked = match mode {
            LockMode::Shared => FileExt::try_lock_shared(&file),
            LockMode::Exclusive => FileExt::try_lock_exclusive(&file),
        };
        match locked {
            Ok(()) => Ok(Some(Self {
                path: path.to_path_buf(),
                mode,
                file,
            })),
            Err(err) if is_lock_held(&err) => Ok(None),
            Err(source) => Err(LockError::Lock {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn is_lock_held(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::WouldBlock {
        return true;
    }
    // ERROR_LOCK_VIOLATION
    matches!(err.raw_os_error(), Some(33))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn exclusive_lock_is_taken_once() {
        let tmp = TempDir::new().unwrap();
        let lock_path = tmp.path().join("locks").join("main-branch.lock");
        let first = LockFile::try_acquire(&lock_path, LockMode::Exclusive).unwrap();
        assert!(first.is_some());
        assert_eq!(first.as_ref().unwrap().path(), lock_path.as_path());
        let second = LockFile::try_acquire(&lock_path, LockMode::Exclusive).unwrap();
        assert!(second.is_none());
        drop(first);
        assert!(
            LockFile::try_acquire(&lock_path, LockMode::Exclusive)
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn shared_locks_coexist_but_exclude_writers() {
        let tmp = TempDir::new().unwrap();
        let lock_path = tmp.path().join("beta-branch.lock");
        let writer = LockFile::try_acquire(&lock_path, LockMode::Exclusive)
            .unwrap()
            .unwrap();
        assert!(
            LockFile::try_acquire(&lock_path, LockMode::Shared)
                .unwrap()
                .is_none()
        );
        drop(writer);

        let first = LockFile::try_acquire(&lock_path, LockMode::Shared)
            .unwrap()
            .unwrap();
        let second = LockFile::try_acquire(&lock_path, LockMode::Shared)
            .unwrap()
            .unwrap();
        assert_eq!(first.mode(), LockMode::Shared);
        assert!(
            LockFile::try_acquire(&lock_path, LockMode::Exclusive)
                .unwrap()
                .is_none()
        );
        drop((first, second));
        assert!(
            LockFile::try_acquire(&lock_path, LockMode::Exclusive)
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn shared_lock_does_not_create_the_file() {
        let tmp = TempDir::new().unwrap();
        let lock_path = tmp.path().join(".locks").join("main-branch.lock");
        match LockFile::try_acquire(&lock_path, LockMode::Shared).unwrap_err() {
            LockError::Open { source, .. } => assert_eq!(source.kind(), io::ErrorKind::NotFound),
            other => panic!("expected an open error, got {other:?}"),
        }
        assert!(!tmp.path().join(".locks").exists());
    }
}
