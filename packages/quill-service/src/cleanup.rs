//! Periodic removal of stale job folders and their status entries.

use std::{
	fs,
	path::{Path, PathBuf},
	time::{Duration, SystemTime},
};

use time::OffsetDateTime;

use crate::{Result, StatusStore};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
	pub removed_folders: Vec<String>,
	pub skipped_active: Vec<String>,
	pub purged_statuses: Vec<String>,
}

/// Deletes job folders under `upload_root` older than `max_age`, skipping leased jobs.
///
/// A folder that cannot be removed is logged and left for the next sweep.
pub fn sweep_once(
	upload_root: &Path,
	status: &StatusStore,
	max_age: Duration,
	now: SystemTime,
) -> Result<SweepReport> {
	let mut report = SweepReport::default();

	if !upload_root.is_dir() {
		return Ok(report);
	}

	for entry in fs::read_dir(upload_root)? {
		let entry = entry?;
		let path = entry.path();

		if !entry.file_type()?.is_dir() {
			continue;
		}

		let modified = entry.metadata()?.modified()?;
		let age = now.duration_since(modified).unwrap_or_default();

		if age < max_age {
			continue;
		}

		let job_id = entry.file_name().to_string_lossy().into_owned();

		match status.sweep_if_idle(&job_id, || fs::remove_dir_all(&path)) {
			Ok(true) => {
				tracing::info!(job_id = %job_id, age_s = age.as_secs(), "Removed stale job folder.");

				report.removed_folders.push(job_id);
			},
			Ok(false) => {
				tracing::debug!(job_id = %job_id, "Skipped stale folder of an active job.");

				report.skipped_active.push(job_id);
			},
			Err(err) => {
				tracing::error!(job_id = %job_id, error = %err, "Failed to remove stale job folder.");
			},
		}
	}

	report.removed_folders.sort();
	report.skipped_active.sort();
	report.purged_statuses = status.purge_stale(OffsetDateTime::from(now), max_age);

	Ok(report)
}

/// Sweeps `upload_root` every `interval` until the task is dropped.
pub async fn run_sweeper(
	upload_root: PathBuf,
	status: StatusStore,
	interval: Duration,
	max_age: Duration,
) -> Result<()> {
	loop {
		tokio::time::sleep(interval).await;

		let root = upload_root.clone();
		let store = status.clone();
		let swept = tokio::task::spawn_blocking(move || {
			sweep_once(&root, &store, max_age, SystemTime::now())
		})
		.await;

		match swept {
			Ok(Ok(report)) =>
				if !report.removed_folders.is_empty() || !report.purged_statuses.is_empty() {
					tracing::info!(
						removed = report.removed_folders.len(),
						purged = report.purged_statuses.len(),
						skipped = report.skipped_active.len(),
						"Cleanup sweep finished."
					);
				},
			Ok(Err(err)) => {
				tracing::error!(error = %err, "Cleanup sweep failed.");
			},
			Err(err) => {
				tracing::error!(error = %err, "Cleanup sweep task panicked.");
			},
		}
	}
}
