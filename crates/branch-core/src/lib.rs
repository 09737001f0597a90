pub mod branch_lock;
pub mod config;
pub mod lockfile;
pub mod manifest;
pub mod model;
pub mod registry;
pub mod scan;
pub mod status;
pub mod sync;
pub mod timestamp;
pub mod transfer;
mod transfer_progress;
mod transfer_retry;
pub mod transfer_types;
