use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use time::PrimitiveDateTime;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BranchKind {
    MainBranch,
    BetaBranch,
    AlternateBranch,
    AlternateBetaBranch,
}

impl BranchKind {
    pub const ALL: [BranchKind; 4] = [
        BranchKind::MainBranch,
        BranchKind::BetaBranch,
        BranchKind::AlternateBranch,
        BranchKind::AlternateBetaBranch,
    ];

    /// Folder name under the managed environment, also the persisted key.
    pub fn folder_name(&self) -> &'static str {
        match self {
            BranchKind::MainBranch => "main-branch",
            BranchKind::BetaBranch => "beta-branch",
            BranchKind::AlternateBranch => "alternate-branch",
            BranchKind::AlternateBetaBranch => "alternate-beta-branch",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            BranchKind::MainBranch => "Main",
            BranchKind::BetaBranch => "Beta",
            BranchKind::AlternateBranch => "Alternate",
            BranchKind::AlternateBetaBranch => "Alternate Beta",
        }
    }

    /// Beta key the platform writes into the app manifest for this branch.
    pub fn steam_key(&self) -> &'static str {
        match self {
            BranchKind::MainBranch => "public",
            BranchKind::BetaBranch => "beta",
            BranchKind::AlternateBranch => "alternate",
            BranchKind::AlternateBetaBranch => "alternate-beta",
        }
    }

    pub fn from_steam_key(key: &str) -> Option<Self> {
        let key = key.trim();
        if key.is_empty() {
            return Some(BranchKind::MainBranch);
        }
        Self::ALL
            .into_iter()
            .find(|branch| branch.steam_key().eq_ignore_ascii_case(key))
    }
}

impl fmt::Display for BranchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.folder_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown branch `{0}`")]
pub struct UnknownBranch(pub String);

impl FromStr for BranchKind {
    type Err = UnknownBranch;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|branch| {
                branch.folder_name().eq_ignore_ascii_case(value)
                    || branch.steam_key().eq_ignore_ascii_case(value)
            })
            .ok_or_else(|| UnknownBranch(value.to_string()))
    }
}

/// Static facts about the managed game.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GameProfile {
    pub app_id: u32,
    pub executable_name: String,
    pub mods_dir: String,
}

impl Default for GameProfile {
    fn default() -> Self {
        Self {
            app_id: 3_164_500,
            executable_name: "Schedule I.exe".to_string(),
            mods_dir: "Mods".to_string(),
        }
    }
}

/// A build id as detected for a branch at a point in time. Superseded, never edited.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchBuildInfo {
    pub build_id: String,
    #[serde(with = "crate::timestamp")]
    pub updated_time: PrimitiveDateTime,
}

impl BranchBuildInfo {
    pub fn new(build_id: impl Into<String>, updated_time: PrimitiveDateTime) -> Self {
        Self {
            build_id: build_id.into(),
            updated_time,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum BranchStatus {
    UpToDate,
    UpdateAvailable,
    NotInstalled,
    Error,
}

impl BranchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BranchStatus::UpToDate => "up_to_date",
            BranchStatus::UpdateAvailable => "update_available",
            BranchStatus::NotInstalled => "not_installed",
            BranchStatus::Error => "error",
        }
    }
}

impl fmt::Display for BranchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived view of one branch, recomputed on every refresh.
#[derive(Clone, Debug, PartialEq)]
pub struct BranchInfo {
    pub branch: BranchKind,
    pub display_name: String,
    pub folder_path: PathBuf,
    pub executable_path: PathBuf,
    pub mods_dll_count: usize,
    pub directory_size: u64,
    pub file_count: u64,
    pub last_modified: Option<PrimitiveDateTime>,
    pub local_build_id: String,
    pub steam_build_id: String,
    pub status: BranchStatus,
    pub status_detail: Option<String>,
    pub is_current_steam_branch: bool,
}
