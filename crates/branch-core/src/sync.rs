use crate::branch_lock::BranchLocks;
use crate::config::{ConfigError, ConfigStore};
use crate::lockfile::LockError;
use crate::model::{BranchKind, GameProfile};
use crate::registry::BuildRegistry;
use crate::status::{ManifestSource, detect_active_branch};
use crate::transfer::{
    TransferError, TransferKind, TransferOptions, TransferOutcome, delete_tree, install_tree,
    update_tree,
};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("branch {0} is busy")]
    BranchBusy(BranchKind),
    #[error("game install path {0} does not exist")]
    SourceMissing(PathBuf),
    #[error("steam currently has {active} installed, not {requested}")]
    BranchMismatch {
        requested: BranchKind,
        active: BranchKind,
    },
}

/// Runs install/update/delete for one branch under its lock and keeps the
/// build registry consistent with the outcome:
/// completed copies stamp the upstream build, completed deletes and failed
/// copies clear it, cancellations leave it untouched.
pub struct BranchSync<'a> {
    store: &'a ConfigStore,
    locks: &'a BranchLocks,
    manifest: &'a dyn ManifestSource,
    profile: &'a GameProfile,
    allow_branch_mismatch: bool,
}

impl<'a> BranchSync<'a> {
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
            allow_branch_mismatch: false,
        }
    }

    /// Copy even when the platform reports a different active branch.
    pub fn allow_branch_mismatch(mut self, allow: bool) -> Self {
        self.allow_branch_mismatch = allow;
        self
    }

    pub fn profile(&self) -> &GameProfile {
        self.profile
    }

    pub fn install(
        &self,
        branch: BranchKind,
        options: TransferOptions<'_>,
    ) -> Result<TransferOutcome, SyncError> {
        self.copy(TransferKind::Install, branch, options)
    }

    pub fn update(
        &self,
        branch: BranchKind,
        options: TransferOptions<'_>,
    ) -> Result<TransferOutcome, SyncError> {
        self.copy(TransferKind::Update, branch, options)
    }

    pub fn delete(
        &self,
        branch: BranchKind,
        options: TransferOptions<'_>,
    ) -> Result<TransferOutcome, SyncError> {
        let config = self.store.snapshot()?;
        let folder = config
            .branch_folder(branch)
            .ok_or(SyncError::NotConfigured("managed environment path"))?;
        let _guard = self
            .locks
            .try_acquire(branch)?
            .ok_or(SyncError::BranchBusy(branch))?;

        let registry = BuildRegistry::new(self.store);
        let outcome = delete_tree(&folder, options)?;
        if outcome.is_completed() {
            registry.clear_build_id(branch)?;
            info!(branch = %branch, "branch deleted");
        }
        Ok(outcome)
    }

    fn copy(
        &self,
        kind: TransferKind,
        branch: BranchKind,
        options: TransferOptions<'_>,
    ) -> Result<TransferOutcome, SyncError> {
        let config = self.store.snapshot()?;
        let source = config
            .game_install_path
            .clone()
            .ok_or(SyncError::NotConfigured("game install path"))?;
        let destination = config
            .branch_folder(branch)
            .ok_or(SyncError::NotConfigured("managed environment path"))?;
        if !source.is_dir() {
            return Err(SyncError::SourceMissing(source));
        }
        let _guard = self
            .locks
            .try_acquire(branch)?
            .ok_or(SyncError::BranchBusy(branch))?;

        let upstream = match self.manifest.load() {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(branch = %branch, error = %err, "manifest unavailable; build id will not be recorded");
                None
            }
        };
        if let Some(active) = upstream.as_ref().and_then(detect_active_branch)
            && active != branch
        {
            if !self.allow_branch_mismatch {
                return Err(SyncError::BranchMismatch {
                    requested: branch,
                    active,
                });
            }
            warn!(requested = %branch, active = %active, "copying while steam has another branch installed");
        }
        let build_id = upstream.as_ref().and_then(|record| record.build_id_string());
        let manifest_file = self
            .manifest
            .manifest_path()
            .filter(|path| path.is_file());

        let registry = BuildRegistry::new(self.store);
        let result = match kind {
            TransferKind::Update => {
                update_tree(&source, &destination, manifest_file.as_deref(), options)
            }
            _ => install_tree(&source, &destination, manifest_file.as_deref(), options),
        };

        match result {
            Ok(TransferOutcome::Completed(report)) => {
                match build_id.as_deref() {
                    Some(build_id) => {
                        registry.set_build_id(branch, build_id, None)?;
                    }
                    None => {
                        registry.clear_build_id(branch)?;
                    }
                }
                info!(
                    branch = %branch,
                    kind = kind.as_str(),
                    files = report.files,
                    build_id = build_id.as_deref().unwrap_or("unknown"),
                    "branch transfer finished"
                );
                Ok(TransferOutcome::Completed(report))
            }
            Ok(cancelled) => Ok(cancelled),
            Err(err) => {
                if let Err(clear_err) = registry.clear_build_id(branch) {
                    warn!(branch = %branch, error = %clear_err, "failed to clear build id after transfer failure");
                }
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{LibraryManifest, NoManifest};
    use crate::transfer::{CancelToken, RetryPolicy, TransferProgress};
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        tmp: TempDir,
        store: ConfigStore,
        locks: BranchLocks,
        profile: GameProfile,
        manifest: LibraryManifest,
    }

    impl Fixture {
        fn new(manifest_body: &str) -> Self {
            let tmp = TempDir::new().unwrap();
            let library = tmp.path().join("library");
            let game = tmp.path().join("game");
            let managed = tmp.path().join("managed");
            fs::create_dir_all(game.join("Data")).unwrap();
            fs::write(game.join("Game.exe"), b"exe").unwrap();
            fs::write(game.join("Data").join("one.bin"), b"1").unwrap();
            fs::write(game.join("Data").join("two.bin"), b"2").unwrap();

            let manifest = LibraryManifest::new(&library, 10);
            let path = manifest.manifest_path().unwrap();
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, manifest_body).unwrap();

            let store = ConfigStore::open(&tmp.path().join("config.json")).unwrap();
            store
                .set_paths(Some(library), Some(game), Some(managed.clone()))
                .unwrap();
            Self {
                locks: BranchLocks::for_environment(&managed),
                tmp,
                store,
                profile: GameProfile {
                    app_id: 10,
                    executable_name: "Game.exe".to_string(),
                    mods_dir: "Mods".to_string(),
                },
                manifest,
            }
        }

        fn sync(&self) -> BranchSync<'_> {
            BranchSync::new(&self.store, &self.locks, &self.manifest, &self.profile)
        }

        fn folder(&self, branch: BranchKind) -> PathBuf {
            self.tmp.path().join("managed").join(branch.folder_name())
        }

        fn build_id(&self, branch: BranchKind) -> Option<String> {
            BuildRegistry::new(&self.store).build_id(branch).unwrap()
        }
    }

    fn quick() -> TransferOptions<'static> {
        TransferOptions {
            retry: RetryPolicy::none(),
            progress_interval: Duration::ZERO,
            ..TransferOptions::default()
        }
    }

    const MAIN_MANIFEST: &str = r#""AppState" { "appid" "10" "buildid" "500" }"#;

    #[test]
    fn install_stamps_build_and_copies_manifest() {
        let fixture = Fixture::new(MAIN_MANIFEST);
        let outcome = fixture.sync().install(BranchKind::MainBranch, quick()).unwrap();
        assert!(outcome.is_completed());
        let folder = fixture.folder(BranchKind::MainBranch);
        assert!(folder.join("Game.exe").is_file());
        assert!(folder.join("appmanifest_10.acf").is_file());
        assert_eq!(
            fixture.build_id(BranchKind::MainBranch).as_deref(),
            Some("500")
        );
    }

    #[test]
    fn cancelled_install_leaves_registry_untouched() {
        let fixture = Fixture::new(MAIN_MANIFEST);
        BuildRegistry::new(&fixture.store)
            .set_build_id(BranchKind::MainBranch, "400", None)
            .unwrap();
        let before = fixture.store.snapshot().unwrap().branch_build_ids;

        let token = CancelToken::new();
        let report = |progress: TransferProgress| {
            if progress.completed_files == 1 {
                token.cancel();
            }
        };
        let options = TransferOptions {
            progress: Some(&report),
            cancel: Some(&token),
            ..quick()
        };
        let outcome = fixture.sync().update(BranchKind::MainBranch, options).unwrap();
        let TransferOutcome::Cancelled {
            files_completed,
            total_files,
            ..
        } = outcome
        else {
            panic!("expected cancellation");
        };
        assert_eq!((files_completed, total_files), (1, 3));
        assert_eq!(fixture.store.snapshot().unwrap().branch_build_ids, before);
    }

    #[test]
    fn failed_install_clears_build_id() {
        let fixture = Fixture::new(MAIN_MANIFEST);
        BuildRegistry::new(&fixture.store)
            .set_build_id(BranchKind::MainBranch, "400", None)
            .unwrap();
        let folder = fixture.folder(BranchKind::MainBranch);
        fs::create_dir_all(folder.parent().unwrap()).unwrap();
        fs::write(&folder, b"a file where the branch folder should be").unwrap();

        let err = fixture
            .sync()
            .install(BranchKind::MainBranch, quick())
            .unwrap_err();
        assert!(matches!(err, SyncError::Transfer(_)));
        assert_eq!(fixture.build_id(BranchKind::MainBranch), None);
    }

    #[test]
    fn refuses_when_steam_has_another_branch() {
        let fixture = Fixture::new(
            r#""AppState" { "appid" "10" "buildid" "9" "UserConfig" { "BetaKey" "beta" } }"#,
        );
        let err = fixture
            .sync()
            .install(BranchKind::MainBranch, quick())
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::BranchMismatch {
                requested: BranchKind::MainBranch,
                active: BranchKind::BetaBranch
            }
        ));
        let outcome = fixture
            .sync()
            .allow_branch_mismatch(true)
            .install(BranchKind::MainBranch, quick())
            .unwrap();
        assert!(outcome.is_completed());
    }

    #[test]
    fn busy_branch_is_rejected() {
        let fixture = Fixture::new(MAIN_MANIFEST);
        let _guard = fixture
            .locks
            .try_acquire(BranchKind::MainBranch)
            .unwrap()
            .unwrap();
        assert!(matches!(
            fixture.sync().install(BranchKind::MainBranch, quick()),
            Err(SyncError::BranchBusy(BranchKind::MainBranch))
        ));
    }

    #[test]
    fn install_without_manifest_records_nothing() {
        let fixture = Fixture::new(MAIN_MANIFEST);
        let sync = BranchSync::new(&fixture.store, &fixture.locks, &NoManifest, &fixture.profile);
        let outcome = sync.install(BranchKind::BetaBranch, quick()).unwrap();
        assert!(outcome.is_completed());
        assert_eq!(fixture.build_id(BranchKind::BetaBranch), None);
        assert!(
            !fixture
                .folder(BranchKind::BetaBranch)
                .join("appmanifest_10.acf")
                .exists()
        );
    }

    #[test]
    fn delete_clears_build_id() {
        let fixture = Fixture::new(MAIN_MANIFEST);
        let sync = fixture.sync();
        sync.install(BranchKind::MainBranch, quick()).unwrap();
        let outcome = sync.delete(BranchKind::MainBranch, quick()).unwrap();
        assert!(outcome.is_completed());
        assert!(!fixture.folder(BranchKind::MainBranch).exists());
        assert_eq!(fixture.build_id(BranchKind::MainBranch), None);
        assert_eq!(sync.profile().app_id, 10);
    }

    #[test]
    fn missing_game_install_is_reported() {
        let fixture = Fixture::new(MAIN_MANIFEST);
        fs::remove_dir_all(fixture.tmp.path().join("game")).unwrap();
        let err = fixture
            .sync()
            .install(BranchKind::MainBranch, quick())
            .unwrap_err();
        let expected = fixture.tmp.path().join("game");
        assert!(matches!(err, SyncError::SourceMissing(path) if path == expected));
    }
}
