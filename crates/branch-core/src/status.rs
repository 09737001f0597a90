use crate::branch_lock::BranchLocks;
use crate::config::{ConfigError, ConfigStore, DevEnvironmentConfig};
use crate::lockfile::LockError;
use crate::manifest::{ManifestError, ManifestRecord, manifest_file_name, manifest_path, read_manifest};
use crate::model::{BranchInfo, BranchKind, BranchStatus, GameProfile};
use crate::scan::{count_mod_dlls, scan_directory};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, mpsc};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StatusError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("branch {0} is busy with a transfer")]
    BranchBusy(BranchKind),
    #[error("scan {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where the upstream manifest comes from.
pub trait ManifestSource: Sync {
    fn manifest_path(&self) -> Option<PathBuf>;
    fn load(&self) -> Result<ManifestRecord, ManifestError>;
}

/// `<library>/steamapps/appmanifest_<app_id>.acf`, read fresh on every load.
#[derive(Clone, Debug)]
pub struct LibraryManifest {
    path: PathBuf,
}

impl LibraryManifest {
    pub fn new(library: &Path, app_id: u32) -> Self {
        Self {
            path: manifest_path(library, app_id),
        }
    }

    pub fn from_config(config: &DevEnvironmentConfig, profile: &GameProfile) -> Option<Self> {
        config
            .steam_library_path
            .as_deref()
            .map(|library| Self::new(library, profile.app_id))
    }
}

impl ManifestSource for LibraryManifest {
    fn manifest_path(&self) -> Option<PathBuf> {
        Some(self.path.clone())
    }

    fn load(&self) -> Result<ManifestRecord, ManifestError> {
        read_manifest(&self.path)
    }
}

/// Stand-in used when no library path is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoManifest;

impl ManifestSource for NoManifest {
    fn manifest_path(&self) -> Option<PathBuf> {
        None
    }

    fn load(&self) -> Result<ManifestRecord, ManifestError> {
        Err(ManifestError::Malformed {
            reason: "steam library path is not configured".to_string(),
        })
    }
}

/// The decision table for a branch.
pub fn classify(installed: bool, local: Option<&str>, upstream: Option<&str>) -> BranchStatus {
    if !installed {
        return BranchStatus::NotInstalled;
    }
    match (local, upstream) {
        (_, None) => BranchStatus::Error,
        (Some(local), Some(upstream)) if local == upstream => BranchStatus::UpToDate,
        _ => BranchStatus::UpdateAvailable,
    }
}

/// Maps the manifest's beta key to a branch; an empty key is the public branch.
pub fn detect_active_branch(record: &ManifestRecord) -> Option<BranchKind> {
    BranchKind::from_steam_key(record.beta_key.as_deref().unwrap_or_default())
}

/// True when the shadow manifest copied with the branch records a different
/// build than the live one.
pub fn manifest_drift(
    branch_dir: &Path,
    app_id: u32,
    live: &ManifestRecord,
) -> Result<bool, ManifestError> {
    let shadow = read_manifest(&branch_dir.join(manifest_file_name(app_id)))?;
    Ok(shadow.build_id != live.build_id)
}

/// Upstream facts shared by every branch in one refresh.
#[derive(Clone, Debug, Default)]
struct UpstreamView {
    build_id: Option<String>,
    error: Option<String>,
    active_branch: Option<BranchKind>,
}

pub struct StatusResolver<'a> {
    store: &'a ConfigStore,
    locks: &'a BranchLocks,
    manifest: &'a dyn ManifestSource,
    profile: &'a GameProfile,
}

impl<'a> StatusResolver<'a> {
    pub fn new(
        store: &'a ConfigStore,
        locks: &'a BranchLocks,
        manifest: &'a dyn ManifestSource,
        profile: &'a GameProfile,
    ) -> Self {
        Self {
            store,
            locks,
            manifest,
            profile,
        }
    }

    pub fn active_branch(&self) -> Result<Option<BranchKind>, StatusError> {
        let config = self.store.snapshot()?;
        Ok(self.upstream(&config).active_branch)
    }

    pub fn resolve(&self, branch: BranchKind) -> Result<BranchInfo, StatusError> {
        let config = self.store.snapshot()?;
        let upstream = self.upstream(&config);
        self.resolve_with(branch, &config, &upstream)
    }

    /// Resolves branches on parallel workers; results keep the input order.
    pub fn resolve_all(
        &self,
        branches: &[BranchKind],
    ) -> Result<Vec<(BranchKind, Result<BranchInfo, StatusError>)>, StatusError> {
        let config = self.store.snapshot()?;
        let upstream = self.upstream(&config);
        let jobs = std::thread::available_parallelism()
            .map(|value| value.get())
            .unwrap_or(1)
            .min(branches.len().max(1));
        let queue = Mutex::new(branches.iter().copied().enumerate().collect::<Vec<_>>());
        let (tx, rx) = mpsc::channel();

        std::thread::scope(|scope| {
            for _ in 0..jobs {
                let tx = tx.clone();
                let queue = &queue;
                let config = &config;
                let upstream = &upstream;
                scope.spawn(move || {
                    loop {
                        let next = match queue.lock() {
                            Ok(mut guard) => guard.pop(),
                            Err(_) => None,
                        };
                        let Some((index, branch)) = next else {
                            break;
                        };
                        let result = self.resolve_with(branch, config, upstream);
                        if tx.send((index, branch, result)).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(tx);

        let mut results: Vec<_> = rx.into_iter().collect();
        results.sort_by_key(|(index, _, _)| *index);
        Ok(results
            .into_iter()
            .map(|(_, branch, result)| (branch, result))
            .collect())
    }

    fn upstream(&self, config: &DevEnvironmentConfig) -> UpstreamView {
        match self.manifest.load() {
            Ok(record) => UpstreamView {
                build_id: record.build_id_string(),
                error: (record.build_id == 0).then(|| "manifest has no readable buildid".to_string()),
                active_branch: detect_active_branch(&record).or(config.installed_branch),
            },
            Err(err) => {
                warn!(error = %err, "upstream manifest unavailable");
                UpstreamView {
                    build_id: None,
                    error: Some(err.to_string()),
                    active_branch: config.installed_branch,
                }
            }
        }
    }

    fn resolve_with(
        &self,
        branch: BranchKind,
        config: &DevEnvironmentConfig,
        upstream: &UpstreamView,
    ) -> Result<BranchInfo, StatusError> {
        let folder = config
            .branch_folder(branch)
            .ok_or(StatusError::NotConfigured("managed environment path"))?;
        let Some(_guard) = self.locks.try_acquire_shared(branch)? else {
            return Err(StatusError::BranchBusy(branch));
        };

        let executable = folder.join(&self.profile.executable_name);
        let installed = folder.is_dir() && executable.is_file();
        let local = config
            .branch_build_ids
            .get(&branch)
            .map(|info| info.build_id.clone())
            .filter(|id| !id.trim().is_empty());
        let status = classify(installed, local.as_deref(), upstream.build_id.as_deref());

        let (stats, mods_dll_count) = if folder.is_dir() {
            let stats = scan_directory(&folder).map_err(|source| StatusError::Scan {
                path: folder.clone(),
                source,
            })?;
            let mods = count_mod_dlls(&folder.join(&self.profile.mods_dir)).map_err(|source| {
                StatusError::Scan {
                    path: folder.join(&self.profile.mods_dir),
                    source,
                }
            })?;
            (stats, mods)
        } else {
            Default::default()
        };
        debug!(branch = %branch, status = status.as_str(), files = stats.file_count, "resolved branch");

        Ok(BranchInfo {
            branch,
            display_name: branch.display_name().to_string(),
            folder_path: folder,
            executable_path: executable,
            mods_dll_count,
            directory_size: stats.size,
            file_count: stats.file_count,
            last_modified: stats.last_modified_local(),
            local_build_id: local.unwrap_or_default(),
            steam_build_id: upstream.build_id.clone().unwrap_or_default(),
            status,
            status_detail: match status {
                BranchStatus::Error => upstream.error.clone(),
                _ => None,
            },
            is_current_steam_branch: upstream.active_branch == Some(branch),
        })
    }
}
