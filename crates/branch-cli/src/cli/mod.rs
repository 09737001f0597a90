use crate::logging;
use anyhow::Context;
use branch_core::branch_lock::BranchLocks;
use branch_core::config::{ConfigError, ConfigStore, DevEnvironmentConfig, default_config_path};
use branch_core::manifest::{ManifestRecord, read_manifest};
use branch_core::model::{BranchInfo, BranchKind, BranchStatus, GameProfile};
use branch_core::registry::BuildRegistry;
use branch_core::status::{
    LibraryManifest, ManifestSource, NoManifest, StatusError, StatusResolver,
    detect_active_branch, manifest_drift,
};
use branch_core::sync::BranchSync;
use branch_core::timestamp;
use branch_core::transfer::{
    CancelToken, TransferKind, TransferOptions, TransferOutcome, TransferProgress,
};
use clap::Parser;
use serde::Serialize;
use std::cell::Cell;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;

mod app;
mod args;
mod config_cmd;
mod launch_cmd;
mod manifest_cmd;
mod shared;
mod status_cmd;
#[cfg(test)]
mod tests;
mod transfer_cmd;

use args::*;

use config_cmd::handle_config;
use launch_cmd::handle_launch_command;
use manifest_cmd::handle_manifest;
use shared::{
    Session, branch_locks, format_size, format_time, manifest_source, outcome_summary,
    render_status_table, render_transfer_progress, status_rows,
};
use status_cmd::handle_status;
use transfer_cmd::handle_transfer;

pub async fn run() -> anyhow::Result<()> {
    app::run().await
}
