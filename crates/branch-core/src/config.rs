use crate::model::{BranchBuildInfo, BranchKind};
use crate::timestamp;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use time::PrimitiveDateTime;
use tracing::{info, warn};

mod migration;

use migration::{BuildInfoV3, CURRENT_VERSION, ConfigV3, decode};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("config io failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("resolve config directory")]
    NoConfigDir,
    #[error("config store lock poisoned")]
    Poisoned,
}

impl ConfigError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// The persisted root. Mutated only through [`ConfigStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct DevEnvironmentConfig {
    pub steam_library_path: Option<PathBuf>,
    pub game_install_path: Option<PathBuf>,
    pub managed_environment_path: Option<PathBuf>,
    pub selected_branches: BTreeSet<BranchKind>,
    pub installed_branch: Option<BranchKind>,
    pub branch_build_ids: BTreeMap<BranchKind, BranchBuildInfo>,
    pub custom_launch_commands: BTreeMap<BranchKind, String>,
    pub last_updated: PrimitiveDateTime,
    pub config_version: u32,
}

impl DevEnvironmentConfig {
    pub fn new(now: PrimitiveDateTime) -> Self {
        Self {
            steam_library_path: None,
            game_install_path: None,
            managed_environment_path: None,
            selected_branches: BTreeSet::new(),
            installed_branch: None,
            branch_build_ids: BTreeMap::new(),
            custom_launch_commands: BTreeMap::new(),
            last_updated: now,
            config_version: CURRENT_VERSION,
        }
    }

    pub fn branch_folder(&self, branch: BranchKind) -> Option<PathBuf> {
        self.managed_environment_path
            .as_ref()
            .map(|root| root.join(branch.folder_name()))
    }

    /// Unknown branch names and unreadable timestamps are dropped or
    /// replaced with a warning rather than failing the load.
    fn from_wire(wire: ConfigV3, fallback: PrimitiveDateTime) -> Self {
        let last_updated = wire
            .last_updated
            .as_deref()
            .and_then(timestamp::parse)
            .unwrap_or(fallback);
        let branch_build_ids = wire
            .branch_build_ids
            .into_iter()
            .filter_map(|(name, info)| {
                let branch = known_branch(&name)?;
                let updated_time = timestamp::parse(&info.updated_time).unwrap_or_else(|| {
                    warn!(branch = %branch, raw = %info.updated_time, "unreadable build timestamp");
                    last_updated
                });
                Some((branch, BranchBuildInfo::new(info.build_id, updated_time)))
            })
            .collect();
        let custom_launch_commands = wire
            .custom_launch_commands
            .into_iter()
            .filter(|(_, command)| !command.trim().is_empty())
            .filter_map(|(name, command)| Some((known_branch(&name)?, command)))
            .collect();
        Self {
            steam_library_path: non_empty_path(wire.steam_library_path),
            game_install_path: non_empty_path(wire.game_install_path),
            managed_environment_path: non_empty_path(wire.managed_environment_path),
            selected_branches: wire
                .selected_branches
                .iter()
                .filter_map(|name| known_branch(name))
                .collect(),
            installed_branch: wire.installed_branch.as_deref().and_then(known_branch),
            branch_build_ids,
            custom_launch_commands,
            last_updated,
            config_version: CURRENT_VERSION,
        }
    }

    fn to_wire(&self) -> ConfigV3 {
        ConfigV3 {
            steam_library_path: path_string(&self.steam_library_path),
            game_install_path: path_string(&self.game_install_path),
            managed_environment_path: path_string(&self.managed_environment_path),
            selected_branches: self
                .selected_branches
                .iter()
                .map(|branch| branch.folder_name().to_string())
                .collect(),
            installed_branch: self
                .installed_branch
                .map(|branch| branch.folder_name().to_string()),
            branch_build_ids: self
                .branch_build_ids
                .iter()
                .map(|(branch, info)| {
                    (
                        branch.folder_name().to_string(),
                        BuildInfoV3 {
                            build_id: info.build_id.clone(),
                            updated_time: timestamp::format(&info.updated_time),
                        },
                    )
                })
                .collect(),
            custom_launch_commands: self
                .custom_launch_commands
                .iter()
                .map(|(branch, command)| (branch.folder_name().to_string(), command.clone()))
                .collect(),
            last_updated: Some(timestamp::format(&self.last_updated)),
            config_version: self.config_version,
        }
    }
}

fn known_branch(name: &str) -> Option<BranchKind> {
    match name.parse::<BranchKind>() {
        Ok(branch) => Some(branch),
        Err(err) => {
            warn!(error = %err, "ignoring unknown branch in config");
            None
        }
    }
}

fn non_empty_path(value: String) -> Option<PathBuf> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
}

fn path_string(value: &Option<PathBuf>) -> String {
    value
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_default()
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let project =
        ProjectDirs::from("com", "branch-sync", "branch-sync").ok_or(ConfigError::NoConfigDir)?;
    Ok(project.config_dir().join("config.json"))
}

/// Single-writer store for [`DevEnvironmentConfig`]. All mutations go through
/// [`ConfigStore::update`], which serializes them behind one mutex and writes
/// the file before committing the new state in memory.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    state: Mutex<DevEnvironmentConfig>,
    migrated: bool,
}

impl ConfigStore {
    /// Loads the config, migrating older versions, or creates defaults when
    /// no file exists. Unreadable files yield [`ConfigError::Corrupt`] and are
    /// left untouched.
    pub fn open(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!(path = %path.display(), "initializing new config");
            let store = Self {
                path: path.to_path_buf(),
                state: Mutex::new(DevEnvironmentConfig::new(timestamp::now())),
                migrated: false,
            };
            store.persist(&store.snapshot()?)?;
            return Ok(store);
        }

        let data = fs::read_to_string(path).map_err(|err| ConfigError::io(path, err))?;
        let fallback = file_modified(path).unwrap_or_else(timestamp::now);
        let (wire, migrated) =
            decode(&data, &timestamp::format(&fallback)).map_err(|reason| ConfigError::Corrupt {
                path: path.to_path_buf(),
                reason,
            })?;
        let config = DevEnvironmentConfig::from_wire(wire, fallback);
        let store = Self {
            path: path.to_path_buf(),
            state: Mutex::new(config),
            migrated,
        };
        if migrated {
            info!(path = %path.display(), version = CURRENT_VERSION, "migrated config");
            store.persist(&store.snapshot()?)?;
        }
        Ok(store)
    }

    /// Moves an unreadable file aside and starts over with defaults.
    pub fn reset(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let stamp = timestamp::format(&timestamp::now()).replace(':', "-");
            let mut backup = path.as_os_str().to_owned();
            backup.push(format!(".corrupt-{stamp}"));
            let backup = PathBuf::from(backup);
            fs::rename(path, &backup).map_err(|err| ConfigError::io(path, err))?;
            warn!(backup = %backup.display(), "moved previous config aside");
        }
        Self::open(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn was_migrated(&self) -> bool {
        self.migrated
    }

    pub fn snapshot(&self) -> Result<DevEnvironmentConfig, ConfigError> {
        self.state
            .lock()
            .map(|state| state.clone())
            .map_err(|_| ConfigError::Poisoned)
    }

    /// Applies `change` to a copy, stamps `last_updated`, writes the file and
    /// only then publishes the copy. A failed write leaves the store as it was.
    pub fn update<T>(
        &self,
        change: impl FnOnce(&mut DevEnvironmentConfig) -> T,
    ) -> Result<T, ConfigError> {
        let mut state = self.state.lock().map_err(|_| ConfigError::Poisoned)?;
        let mut next = state.clone();
        let result = change(&mut next);
        next.last_updated = timestamp::now();
        next.config_version = CURRENT_VERSION;
        self.persist(&next)?;
        *state = next;
        Ok(result)
    }

    pub fn set_paths(
        &self,
        steam_library: Option<PathBuf>,
        game_install: Option<PathBuf>,
        managed_environment: Option<PathBuf>,
    ) -> Result<(), ConfigError> {
        self.update(|config| {
            if let Some(path) = steam_library {
                config.steam_library_path = Some(path);
            }
            if let Some(path) = game_install {
                config.game_install_path = Some(path);
            }
            if let Some(path) = managed_environment {
                config.managed_environment_path = Some(path);
            }
        })
    }

    pub fn set_selected_branches(
        &self,
        branches: impl IntoIterator<Item = BranchKind>,
    ) -> Result<(), ConfigError> {
        let branches: BTreeSet<BranchKind> = branches.into_iter().collect();
        self.update(|config| config.selected_branches = branches)
    }

    pub fn set_installed_branch(&self, branch: Option<BranchKind>) -> Result<(), ConfigError> {
        self.update(|config| config.installed_branch = branch)
    }

    fn persist(&self, config: &DevEnvironmentConfig) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| ConfigError::io(parent, err))?;
        }
        let data = serde_json::to_string_pretty(&config.to_wire())?;
        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, data).map_err(|err| ConfigError::io(&tmp, err))?;
        fs::rename(&tmp, &self.path).map_err(|err| ConfigError::io(&self.path, err))?;
        Ok(())
    }
}

fn file_modified(path: &Path) -> Option<PrimitiveDateTime> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    let value = timestamp::to_local(time::OffsetDateTime::from(modified));
    Some(value.replace_nanosecond(0).unwrap_or(value))
}
