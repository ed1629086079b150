//! Volume-level snapshots through the copy-on-write volume tool.
//!
//! Snapshot ids look like `<volume>@<YYYY-MM-DDTHH:MM:SS[.ffffff]>`. The
//! database service is stopped for the duration of every create and restore
//! and started again whether the tool succeeded or not.

use super::{BackendKind, SnapshotBackend, SnapshotError, SnapshotResult, parse_timestamp};
use crate::commands::volume::{VolumeOp, VolumeToolArgs};
use crate::error::StackError;
use crate::process_runner::{ProcessOutput, ProcessRunner, missing_binaries, run_args};
use crate::service_control::ServiceControl;
use chrono::NaiveDateTime;
use tracing::{error, info};

pub struct BtrfsVolumeBackend<'a> {
    runner: &'a dyn ProcessRunner,
    tool: Vec<String>,
    volume: String,
    service: String,
    control: Box<dyn ServiceControl + 'a>,
}

impl<'a> BtrfsVolumeBackend<'a> {
    pub fn new(
        runner: &'a dyn ProcessRunner,
        tool: Vec<String>,
        volume: String,
        service: String,
        control: Box<dyn ServiceControl + 'a>,
    ) -> Self {
        Self {
            runner,
            tool,
            volume,
            service,
            control,
        }
    }

    fn tool(&self, op: VolumeOp) -> SnapshotResult<ProcessOutput> {
        let args = VolumeToolArgs {
            tool: self.tool.clone(),
            op,
        };
        let output = run_args(self.runner, &args).map_err(SnapshotError::Backend)?;
        output
            .ensure_success("volume tool")
            .map_err(SnapshotError::Backend)?;
        Ok(output)
    }

    /// Run `op` with the database service stopped.
    fn with_service_stopped<T>(
        &self,
        op: impl FnOnce() -> SnapshotResult<T>,
    ) -> SnapshotResult<T> {
        self.control
            .stop(&self.service)
            .map_err(SnapshotError::Backend)?;
        let result = op();
        if let Err(e) = self.control.start(&self.service) {
            error!(service = %self.service, error = %e, "failed to restart service");
            if result.is_ok() {
                return Err(SnapshotError::Backend(e));
            }
        }
        result
    }

    fn own_prefix(&self) -> String {
        format!("{}@", self.volume)
    }
}

impl SnapshotBackend for BtrfsVolumeBackend<'_> {
    fn kind(&self) -> BackendKind {
        BackendKind::BtrfsVolume
    }

    fn preflight(&self) -> SnapshotResult<()> {
        let program = self.tool.first().map(String::as_str).unwrap_or("buttervolume");
        let missing = missing_binaries(&[program, "docker"]);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SnapshotError::EnvironmentUnready {
                backend: self.kind(),
                missing,
            })
        }
    }

    fn list_snapshots(&self) -> SnapshotResult<Vec<String>> {
        let output = self.tool(VolumeOp::List)?;
        let prefix = self.own_prefix();
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with(&prefix))
            .map(str::to_string)
            .collect())
    }

    fn create(&self, source_label: &str) -> SnapshotResult<String> {
        info!(volume = %self.volume, label = source_label, "creating volume snapshot");
        let output = self.with_service_stopped(|| {
            self.tool(VolumeOp::Snapshot {
                volume: self.volume.clone(),
            })
        })?;
        let id = output.stdout.trim().to_string();
        if id.is_empty() {
            return Err(SnapshotError::Backend(StackError::process(
                "volume tool printed no snapshot id",
            )));
        }
        Ok(id)
    }

    fn restore(&self, backend_id: &str) -> SnapshotResult<()> {
        if !self.list_snapshots()?.iter().any(|s| s == backend_id) {
            return Err(SnapshotError::BackendUnavailable(format!(
                "volume snapshot '{}' no longer exists",
                backend_id
            )));
        }
        info!(snapshot = backend_id, "restoring volume snapshot");
        // Stopping the service is what drops every connection on the volume.
        self.with_service_stopped(|| {
            self.tool(VolumeOp::Restore {
                snapshot: backend_id.to_string(),
            })
            .map(|_| ())
        })
    }

    fn delete(&self, backend_id: &str) -> SnapshotResult<()> {
        info!(snapshot = backend_id, "removing volume snapshot");
        self.tool(VolumeOp::Remove {
            snapshot: backend_id.to_string(),
        })
        .map(|_| ())
    }

    fn created_at(&self, backend_id: &str) -> Option<NaiveDateTime> {
        let (_, ts) = backend_id.split_once('@')?;
        parse_timestamp(ts)
    }
}
