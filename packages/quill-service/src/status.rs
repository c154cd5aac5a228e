//! Per-job status text shared between running jobs, status readers, and the cleanup sweeper.

use std::{
	collections::HashMap,
	sync::{Arc, Mutex, MutexGuard},
	time::Duration as StdDuration,
};

use time::{Duration, OffsetDateTime};

use crate::{Error, Result};

/// Text recorded for a job that has been created but not started.
pub const PENDING_STATUS: &str = "Not started";

#[derive(Debug)]
struct StatusEntry {
	text: String,
	leases: usize,
	// Set while the sweeper removes the job folder; no lease may be taken meanwhile.
	sweeping: bool,
	updated_at: OffsetDateTime,
}
impl StatusEntry {
	fn new(text: String) -> Self {
		Self { text, leases: 0, sweeping: false, updated_at: OffsetDateTime::now_utc() }
	}
}

/// Shared map from job id to its latest human-readable status.
///
/// Every operation takes the lock for a single step and never holds it across an await, so a
/// reader always sees a complete value. Entries held by a [`StatusLease`] are never removed by
/// [`StatusStore::sweep_if_idle`] or [`StatusStore::purge_stale`].
#[derive(Clone, Debug, Default)]
pub struct StatusStore {
	entries: Arc<Mutex<HashMap<String, StatusEntry>>>,
}
impl StatusStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set(&self, job_id: &str, text: impl Into<String>) {
		let mut entries = self.lock();
		let text = text.into();

		match entries.get_mut(job_id) {
			Some(entry) => {
				entry.text = text;
				entry.updated_at = OffsetDateTime::now_utc();
			},
			None => {
				entries.insert(job_id.to_string(), StatusEntry::new(text));
			},
		}
	}

	pub fn append(&self, job_id: &str, text: &str) {
		let mut entries = self.lock();
		let entry =
			entries.entry(job_id.to_string()).or_insert_with(|| StatusEntry::new(String::new()));

		entry.text.push_str(text);
		entry.updated_at = OffsetDateTime::now_utc();
	}

	pub fn get(&self, job_id: &str) -> Result<String> {
		self.lock()
			.get(job_id)
			.map(|entry| entry.text.clone())
			.ok_or_else(|| Error::NotFound { job_id: job_id.to_string() })
	}

	pub fn delete(&self, job_id: &str) -> bool {
		self.lock().remove(job_id).is_some()
	}

	/// Marks `job_id` as in use until the returned lease is dropped.
	///
	/// Fails with [`Error::Sweeping`] while the sweeper is removing the job's folder.
	pub fn lease(&self, job_id: &str) -> Result<StatusLease> {
		let mut entries = self.lock();
		let entry = entries
			.entry(job_id.to_string())
			.or_insert_with(|| StatusEntry::new(PENDING_STATUS.to_string()));

		if entry.sweeping {
			return Err(Error::Sweeping { job_id: job_id.to_string() });
		}

		entry.leases += 1;

		Ok(StatusLease { store: self.clone(), job_id: job_id.to_string() })
	}

	pub fn is_active(&self, job_id: &str) -> bool {
		self.lock().get(job_id).is_some_and(|entry| entry.leases > 0)
	}

	/// Runs `remove` and drops the entry, unless the job is leased or already being swept.
	///
	/// The entry is marked under the lock and `remove` runs without it, so status writers are
	/// not blocked by the removal and [`StatusStore::lease`] refuses the job until it finishes.
	/// Returns `Ok(false)` when the job was busy and nothing was touched.
	pub fn sweep_if_idle<F>(&self, job_id: &str, remove: F) -> std::io::Result<bool>
	where
		F: FnOnce() -> std::io::Result<()>,
	{
		let placeholder = {
			let mut entries = self.lock();

			match entries.get_mut(job_id) {
				Some(entry) if entry.leases > 0 || entry.sweeping => return Ok(false),
				Some(entry) => {
					entry.sweeping = true;

					false
				},
				None => {
					let mut entry = StatusEntry::new(String::new());

					entry.sweeping = true;
					entries.insert(job_id.to_string(), entry);

					true
				},
			}
		};
		let removed = remove();
		let mut entries = self.lock();

		match removed {
			Ok(()) => {
				entries.remove(job_id);

				Ok(true)
			},
			Err(err) => {
				if placeholder {
					entries.remove(job_id);
				} else if let Some(entry) = entries.get_mut(job_id) {
					entry.sweeping = false;
				}

				Err(err)
			},
		}
	}

	/// Drops idle entries last updated more than `max_age` before `now`.
	pub fn purge_stale(&self, now: OffsetDateTime, max_age: StdDuration) -> Vec<String> {
		let max_age = Duration::try_from(max_age).unwrap_or(Duration::MAX);
		let mut entries = self.lock();
		let mut purged = entries
			.iter()
			.filter(|(_, entry)| {
				entry.leases == 0 && !entry.sweeping && now - entry.updated_at > max_age
			})
			.map(|(job_id, _)| job_id.clone())
			.collect::<Vec<_>>();

		for job_id in &purged {
			entries.remove(job_id);
		}

		purged.sort();

		purged
	}

	fn lock(&self) -> MutexGuard<'_, HashMap<String, StatusEntry>> {
		self.entries.lock().unwrap_or_else(|err| err.into_inner())
	}
}

/// Keeps a job's status entry and folder safe from cleanup while held.
#[derive(Debug)]
pub struct StatusLease {
	store: StatusStore,
	job_id: String,
}
impl StatusLease {
	pub fn job_id(&self) -> &str {
		&self.job_id
	}
}
impl Drop for StatusLease {
	fn drop(&mut self) {
		let mut entries = self.store.lock();

		if let Some(entry) = entries.get_mut(&self.job_id) {
			entry.leases = entry.leases.saturating_sub(1);
			entry.updated_at = OffsetDateTime::now_utc();
		}
	}
}
