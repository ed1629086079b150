//! Point-in-time captures of the managed database.
//!
//! Two backends share the [`SnapshotBackend`] contract:
//!
//! - [`BtrfsVolumeBackend`]: copy-on-write clone of the whole data volume.
//!   Every logical database on the volume moves together. The database
//!   service is stopped around create and restore.
//! - [`PlainCopyBackend`]: template clone of the one logical database. Only
//!   the connections to that database are dropped.
//!
//! The backend is picked once from configuration ([`select_backend`]) and the
//! [`SnapshotManager`] holds exactly that one for its lifetime.

pub mod btrfs;
pub mod manager;
pub mod mapping;
pub mod plain;

pub use btrfs::BtrfsVolumeBackend;
pub use manager::{SnapshotEntry, SnapshotManager};
pub use mapping::MappingStore;
pub use plain::PlainCopyBackend;

use crate::config_file::StackConfig;
use crate::error::StackError;
use crate::process_runner::ProcessRunner;
use crate::service_control::ComposeControl;
use crate::sql::PsqlGateway;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// Timestamp format embedded in backend ids.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Which storage mechanism realises snapshots.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    #[strum(serialize = "btrfs-volume")]
    BtrfsVolume,
    #[default]
    #[strum(serialize = "plain-copy")]
    PlainCopy,
}

#[derive(Error, Debug)]
pub enum SnapshotError {
    /// A label or id did not resolve to exactly one live snapshot.
    #[error("snapshot not found: {0}")]
    SnapshotNotFound(String),

    /// The backend object is gone or the backend cannot act on it.
    #[error("snapshot backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Required host tooling is missing.
    #[error("{backend} backend is not ready, missing tools: {}", .missing.join(", "))]
    EnvironmentUnready {
        backend: BackendKind,
        missing: Vec<String>,
    },

    /// The label mapping file could not be read or written.
    #[error("snapshot mapping file: {0}")]
    Mapping(#[source] StackError),

    /// A backend command failed.
    #[error("snapshot backend command failed: {0}")]
    Backend(#[source] StackError),
}

impl SnapshotError {
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::SnapshotNotFound(_) | Self::BackendUnavailable(_) | Self::EnvironmentUnready { .. }
        )
    }
}

pub type SnapshotResult<T> = std::result::Result<T, SnapshotError>;

/// Storage contract both backends implement.
///
/// Every call goes to the backend; nothing is cached.
pub trait SnapshotBackend {
    fn kind(&self) -> BackendKind;

    /// Fail with [`SnapshotError::EnvironmentUnready`] if host tooling is missing.
    fn preflight(&self) -> SnapshotResult<()>;

    /// Live backend ids.
    fn list_snapshots(&self) -> SnapshotResult<Vec<String>>;

    /// Capture the live database; returns the new backend id.
    ///
    /// Either a usable snapshot exists afterwards or none does.
    fn create(&self, source_label: &str) -> SnapshotResult<String>;

    /// Replace the live database with the snapshot's content.
    fn restore(&self, backend_id: &str) -> SnapshotResult<()>;

    fn delete(&self, backend_id: &str) -> SnapshotResult<()>;

    /// Creation time encoded in the id, if it can be read.
    fn created_at(&self, backend_id: &str) -> Option<NaiveDateTime>;
}

/// Parse the timestamp at the start of `raw`.
///
/// Trailing data (fractional seconds, suffixes) is ignored.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let head = raw.get(..19)?;
    NaiveDateTime::parse_from_str(head, TIMESTAMP_FORMAT).ok()
}

/// Build the configured backend.
pub fn select_backend<'a>(
    config: &StackConfig,
    runner: &'a dyn ProcessRunner,
) -> Box<dyn SnapshotBackend + 'a> {
    match config.snapshot.backend {
        BackendKind::BtrfsVolume => Box::new(BtrfsVolumeBackend::new(
            runner,
            config.snapshot.volume_tool.clone(),
            config.snapshot.volume_name.clone(),
            config.snapshot.db_service.clone(),
            Box::new(ComposeControl::new(runner, config.snapshot.compose_dir.clone())),
        )),
        BackendKind::PlainCopy => Box::new(PlainCopyBackend::new(
            runner,
            PsqlGateway::new(
                runner,
                config.database.connection.clone(),
                plain::ADMIN_DATABASE,
            ),
            config.database.connection.clone(),
            config.database.name.clone(),
        )),
    }
}
