//! Drives one dataset through remote upload, file processing, and fine-tuning.

use std::{collections::HashSet, fmt, sync::Arc, time::Duration};

use quill_config::FineTuneProviderConfig;
use quill_dataset::DATASET_FILE_NAME;
use quill_providers::{
	ErrorClass,
	finetune::{FileStatus, JobEvent, RemoteJobStatus},
};

use crate::{AdminNotifier, Error, FineTuneApi, Result, RetryPolicy, StatusStore};

/// Prefix of every terminal failure status.
pub const ERROR_MARKUP: &str = r#"<img src="/static/alert-light.png" alt="error icon" id="endError">"#;
/// Shown when a failure was escalated to the administrator.
pub const CRITICAL_MESSAGE: &str =
	"A critical error has occurred. The administrator has been contacted. Sorry for the inconvenience.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FailureReason {
	/// Rejected because of something the submitter controls, such as the key or quota.
	User { message: String },
	/// A remote file or job vanished.
	NotFound { operation: &'static str, message: String },
	/// Transient failures outlasted the retry budget.
	Exhausted { operation: &'static str, attempts: u32, message: String },
	/// The remote side failed the uploaded file or the training job.
	Remote { message: String },
	/// The dataset could not be built.
	Preparation { message: String },
}
impl FailureReason {
	pub fn from_error(err: &Error) -> Self {
		match err {
			Error::Remote { operation, attempts, source, .. } => match source.class() {
				ErrorClass::User => Self::User { message: source.user_message() },
				ErrorClass::NotFound =>
					Self::NotFound { operation: *operation, message: source.to_string() },
				ErrorClass::Transient => Self::Exhausted {
					operation: *operation,
					attempts: *attempts,
					message: source.to_string(),
				},
			},
			Error::RemoteRejected { message } => Self::Remote { message: message.clone() },
			Error::JobFailed { reason, .. } => reason.clone(),
			other => Self::Preparation { message: other.to_string() },
		}
	}

	pub fn needs_admin(&self) -> bool {
		matches!(self, Self::NotFound { .. } | Self::Exhausted { .. })
	}

	/// Terminal status text shown to the submitter.
	pub fn status_text(&self) -> String {
		match self {
			Self::NotFound { .. } | Self::Exhausted { .. } =>
				format!("{ERROR_MARKUP} {CRITICAL_MESSAGE}"),
			Self::User { message } | Self::Remote { message } | Self::Preparation { message } =>
				format!("{ERROR_MARKUP} {}", escape_html(message)),
		}
	}
}
impl fmt::Display for FailureReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::User { message } => write!(f, "rejected: {message}"),
			Self::NotFound { operation, message } => write!(f, "{operation} not found: {message}"),
			Self::Exhausted { operation, attempts, message } =>
				write!(f, "{operation} gave up after {attempts} attempt(s): {message}"),
			Self::Remote { message } => write!(f, "remote failure: {message}"),
			Self::Preparation { message } => write!(f, "dataset preparation failed: {message}"),
		}
	}
}

/// Lifecycle of a job. States only move forward, one step at a time, or into `Failed`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobState {
	Created,
	FileUploaded,
	Processed,
	Training,
	Succeeded,
	Failed(FailureReason),
}
impl JobState {
	pub fn name(&self) -> &'static str {
		match self {
			Self::Created => "created",
			Self::FileUploaded => "file_uploaded",
			Self::Processed => "processed",
			Self::Training => "training",
			Self::Succeeded => "succeeded",
			Self::Failed(_) => "failed",
		}
	}

	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::Succeeded | Self::Failed(_))
	}

	fn successor(&self) -> Option<Self> {
		match self {
			Self::Created => Some(Self::FileUploaded),
			Self::FileUploaded => Some(Self::Processed),
			Self::Processed => Some(Self::Training),
			Self::Training => Some(Self::Succeeded),
			Self::Succeeded | Self::Failed(_) => None,
		}
	}
}

#[derive(Clone, Debug)]
pub struct Job {
	pub id: String,
	pub state: JobState,
	/// Remote calls made so far, retries included.
	pub attempts: u32,
	pub file_ref: Option<String>,
	pub job_ref: Option<String>,
	pub fine_tuned_model: Option<String>,
}
impl Job {
	pub fn new(id: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			state: JobState::Created,
			attempts: 0,
			file_ref: None,
			job_ref: None,
			fine_tuned_model: None,
		}
	}

	/// Moves to the next state in sequence.
	pub fn advance(&mut self, next: JobState) -> Result<()> {
		if self.state.successor().as_ref() != Some(&next) {
			return Err(Error::InvalidTransition { from: self.state.name(), to: next.name() });
		}

		tracing::debug!(
			job_id = %self.id,
			from = self.state.name(),
			to = next.name(),
			"Job state changed."
		);

		self.state = next;

		Ok(())
	}

	pub fn fail(&mut self, reason: FailureReason) -> Result<()> {
		if self.state.is_terminal() {
			return Err(Error::InvalidTransition { from: self.state.name(), to: "failed" });
		}

		self.state = JobState::Failed(reason);

		Ok(())
	}
}

#[derive(Clone, Debug)]
pub struct OrchestratorSettings {
	pub poll_interval: Duration,
	pub event_limit: u32,
	pub report_events: bool,
	pub download_prefix: String,
}
impl OrchestratorSettings {
	pub fn from_config(cfg: &quill_config::Config) -> Self {
		Self {
			poll_interval: Duration::from_millis(cfg.orchestrator.poll_interval_ms),
			event_limit: cfg.orchestrator.event_limit,
			report_events: cfg.orchestrator.report_events,
			download_prefix: cfg.service.download_prefix.clone(),
		}
	}
}

pub struct FineTuneOrchestrator {
	api: Arc<dyn FineTuneApi>,
	notifier: Arc<dyn AdminNotifier>,
	status: StatusStore,
	retry: RetryPolicy,
	settings: OrchestratorSettings,
}
impl FineTuneOrchestrator {
	pub fn new(
		api: Arc<dyn FineTuneApi>,
		notifier: Arc<dyn AdminNotifier>,
		status: StatusStore,
		retry: RetryPolicy,
		settings: OrchestratorSettings,
	) -> Self {
		Self { api, notifier, status, retry, settings }
	}

	/// Uploads `dataset`, trains `model` on it, and returns the fine-tuned model id.
	///
	/// Always leaves a terminal status for the job. On failure the job ends in
	/// [`JobState::Failed`] and the error is [`Error::JobFailed`].
	pub async fn run(
		&self,
		job: &mut Job,
		cfg: &FineTuneProviderConfig,
		model: &str,
		dataset: &[u8],
	) -> Result<String> {
		match self.drive(job, cfg, model, dataset).await {
			Ok(fine_tuned) => {
				job.advance(JobState::Succeeded)?;
				job.fine_tuned_model = Some(fine_tuned.clone());

				self.status.set(&job.id, self.success_text(&job.id, &fine_tuned));
				tracing::info!(
					job_id = %job.id,
					model = %fine_tuned,
					attempts = job.attempts,
					"Fine-tuning job succeeded."
				);

				Ok(fine_tuned)
			},
			Err(err) => Err(self.record_failure(job, &err)),
		}
	}

	/// Fails `job` for `err`, writes the terminal status, and escalates when needed.
	pub fn record_failure(&self, job: &mut Job, err: &Error) -> Error {
		let reason = FailureReason::from_error(err);

		if let Err(transition) = job.fail(reason.clone()) {
			tracing::warn!(job_id = %job.id, error = %transition, "Job already finished.");
		}

		self.status.set(&job.id, reason.status_text());
		tracing::error!(job_id = %job.id, reason = %reason, "Fine-tuning job failed.");

		if reason.needs_admin() {
			self.notifier.notify(
				&format!("Fine-tuning job {} failed", job.id),
				&format!("Job {} stopped in state {}: {reason}", job.id, job.state.name()),
			);
		}

		Error::JobFailed { job_id: job.id.clone(), reason }
	}

	async fn drive(
		&self,
		job: &mut Job,
		cfg: &FineTuneProviderConfig,
		model: &str,
		dataset: &[u8],
	) -> Result<String> {
		let api = self.api.as_ref();
		let file_id = self
			.retry
			.run_counted("upload_file", &mut job.attempts, move || {
				api.upload_file(cfg, DATASET_FILE_NAME, dataset)
			})
			.await?;

		job.file_ref = Some(file_id.clone());
		job.advance(JobState::FileUploaded)?;
		self.status.set(&job.id, format!("Uploaded file id {file_id}"));
		tracing::info!(job_id = %job.id, file_id = %file_id, "Dataset uploaded.");

		self.wait_for_file(job, cfg, &file_id).await?;
		job.advance(JobState::Processed)?;
		self.status.set(&job.id, "File processed");

		let file_ref = file_id.as_str();
		let remote_job_id = self
			.retry
			.run_counted("create_job", &mut job.attempts, move || {
				api.create_job(cfg, file_ref, model)
			})
			.await?;

		job.job_ref = Some(remote_job_id.clone());
		job.advance(JobState::Training)?;
		tracing::info!(
			job_id = %job.id,
			remote_job_id = %remote_job_id,
			model,
			"Fine-tuning job created."
		);

		self.wait_for_training(job, cfg, &remote_job_id).await
	}

	async fn wait_for_file(
		&self,
		job: &mut Job,
		cfg: &FineTuneProviderConfig,
		file_id: &str,
	) -> Result<()> {
		let api = self.api.as_ref();
		let mut frame = 0;

		loop {
			let status = self
				.retry
				.run_counted("file_status", &mut job.attempts, move || {
					api.file_status(cfg, file_id)
				})
				.await?;

			match status {
				FileStatus::Processed => return Ok(()),
				FileStatus::Failed { message } =>
					return Err(Error::RemoteRejected {
						message: format!("The uploaded dataset was rejected: {message}"),
					}),
				FileStatus::Processing => {
					self.status.set(&job.id, animate("Processing", frame));

					frame += 1;
				},
			}

			tokio::time::sleep(self.settings.poll_interval).await;
		}
	}

	async fn wait_for_training(
		&self,
		job: &mut Job,
		cfg: &FineTuneProviderConfig,
		remote_job_id: &str,
	) -> Result<String> {
		let api = self.api.as_ref();
		let limit = self.settings.event_limit;
		let mut events = EventLog::default();
		let mut frame = 0;

		loop {
			let remote = self
				.retry
				.run_counted("job_status", &mut job.attempts, move || {
					api.job_status(cfg, remote_job_id)
				})
				.await?;

			if self.settings.report_events {
				let latest = self
					.retry
					.run_counted("list_job_events", &mut job.attempts, move || {
						api.list_job_events(cfg, remote_job_id, limit)
					})
					.await?;

				events.record(latest);
			}

			match remote.status {
				RemoteJobStatus::Succeeded => {
					return remote.fine_tuned_model.ok_or_else(|| Error::RemoteRejected {
						message: "The fine-tuning job finished without a model id.".to_string(),
					});
				},
				RemoteJobStatus::Failed | RemoteJobStatus::Cancelled => {
					let outcome = if remote.status == RemoteJobStatus::Failed {
						"failed"
					} else {
						"was cancelled"
					};
					let detail = remote.error.map(|error| format!(": {error}")).unwrap_or_default();

					return Err(Error::RemoteRejected {
						message: format!("The fine-tuning job {outcome}{detail}"),
					});
				},
				RemoteJobStatus::Queued | RemoteJobStatus::Running => {
					self.status.set(&job.id, events.render(&animate("Fine-tuning", frame)));

					frame += 1;
				},
			}

			tokio::time::sleep(self.settings.poll_interval).await;
		}
	}

	fn success_text(&self, job_id: &str, model: &str) -> String {
		format!(
			"Fine-tuning complete. Model id {}. Download <a href='{}/{job_id}/{DATASET_FILE_NAME}'>JSONL file here</a>.",
			escape_html(model),
			self.settings.download_prefix,
		)
	}
}

/// Remote job events seen so far, oldest first, each reported once.
#[derive(Debug, Default)]
struct EventLog {
	seen: HashSet<String>,
	lines: Vec<String>,
}
impl EventLog {
	fn record(&mut self, events: Vec<JobEvent>) {
		for event in events {
			if self.seen.insert(event.id) {
				self.lines.push(event.message);
			}
		}
	}

	fn render(&self, tail: &str) -> String {
		let mut out = String::new();

		for line in &self.lines {
			out.push_str("<p>");
			out.push_str(&escape_html(line));
			out.push_str("</p>");
		}

		out.push_str(tail);

		out
	}
}

/// `label` followed by one to three dots, cycling with `frame`.
fn animate(label: &str, frame: usize) -> String {
	format!("{label}{}", ".".repeat(frame % 3 + 1))
}

fn escape_html(raw: &str) -> String {
	let mut out = String::with_capacity(raw.len());

	for ch in raw.chars() {
		match ch {
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			'&' => out.push_str("&amp;"),
			other => out.push(other),
		}
	}

	out
}
