use crate::config::{ConfigError, ConfigStore};
use crate::model::{BranchBuildInfo, BranchKind};
use crate::timestamp;
use time::PrimitiveDateTime;
use tracing::info;

/// Per-branch build identity and launch commands, stored through the
/// [`ConfigStore`] so every change is serialized and stamps `last_updated`.
#[derive(Clone, Copy, Debug)]
pub struct BuildRegistry<'a> {
    store: &'a ConfigStore,
}

impl<'a> BuildRegistry<'a> {
    pub fn new(store: &'a ConfigStore) -> Self {
        Self { store }
    }

    pub fn build_info(&self, branch: BranchKind) -> Result<Option<BranchBuildInfo>, ConfigError> {
        Ok(self.store.snapshot()?.branch_build_ids.get(&branch).cloned())
    }

    pub fn build_id(&self, branch: BranchKind) -> Result<Option<String>, ConfigError> {
        Ok(self.build_info(branch)?.map(|info| info.build_id))
    }

    pub fn entries(&self) -> Result<Vec<(BranchKind, BranchBuildInfo)>, ConfigError> {
        Ok(self.store.snapshot()?.branch_build_ids.into_iter().collect())
    }

    /// Records a freshly detected build. `updated_time` defaults to now; this
    /// is the only place build stamps may use the current time.
    pub fn set_build_id(
        &self,
        branch: BranchKind,
        build_id: &str,
        updated_time: Option<PrimitiveDateTime>,
    ) -> Result<BranchBuildInfo, ConfigError> {
        let info = BranchBuildInfo::new(build_id.trim(), updated_time.unwrap_or_else(timestamp::now));
        let stored = info.clone();
        self.store.update(|config| {
            config.branch_build_ids.insert(branch, stored);
        })?;
        info!(branch = %branch, build_id = %info.build_id, "recorded branch build");
        Ok(info)
    }

    /// Returns the entry that was removed, if any.
    pub fn clear_build_id(&self, branch: BranchKind) -> Result<Option<BranchBuildInfo>, ConfigError> {
        let removed = self
            .store
            .update(|config| config.branch_build_ids.remove(&branch))?;
        if removed.is_some() {
            info!(branch = %branch, "cleared branch build");
        }
        Ok(removed)
    }

    pub fn custom_launch_command(&self, branch: BranchKind) -> Result<Option<String>, ConfigError> {
        Ok(self
            .store
            .snapshot()?
            .custom_launch_commands
            .get(&branch)
            .cloned())
    }

    /// Blank commands remove the entry instead of storing an empty string.
    pub fn set_custom_launch_command(
        &self,
        branch: BranchKind,
        command: &str,
    ) -> Result<(), ConfigError> {
        let command = command.trim().to_string();
        self.store.update(|config| {
            if command.is_empty() {
                config.custom_launch_commands.remove(&branch);
            } else {
                config.custom_launch_commands.insert(branch, command);
            }
        })
    }
}
