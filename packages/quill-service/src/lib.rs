pub mod beats;
pub mod cleanup;
pub mod orchestrator;
pub mod pipeline;
pub mod retry;
pub mod status;

mod error;

pub use beats::{BEAT_SYSTEM_PROMPT, BeatGenerator};
pub use cleanup::{SweepReport, run_sweeper, sweep_once};
pub use error::{Error, Result};
pub use orchestrator::{
	CRITICAL_MESSAGE, ERROR_MARKUP, FailureReason, FineTuneOrchestrator, Job, JobState,
	OrchestratorSettings,
};
pub use pipeline::{FinetuneService, JobReport, JobWorkspace, SubmitRequest};
pub use retry::{Backoff, RetryPolicy};
pub use status::{PENDING_STATUS, StatusLease, StatusStore};

use std::{future::Future, pin::Pin, sync::Arc};

use quill_config::{CompletionProviderConfig, FineTuneProviderConfig};
use quill_providers::{
	completion,
	finetune::{self, FileStatus, JobEvent, RemoteJob},
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Remote fine-tuning surface: file upload, job creation, and polling.
pub trait FineTuneApi
where
	Self: Send + Sync,
{
	fn upload_file<'a>(
		&'a self,
		cfg: &'a FineTuneProviderConfig,
		file_name: &'a str,
		bytes: &'a [u8],
	) -> BoxFuture<'a, quill_providers::Result<String>>;

	fn file_status<'a>(
		&'a self,
		cfg: &'a FineTuneProviderConfig,
		file_id: &'a str,
	) -> BoxFuture<'a, quill_providers::Result<FileStatus>>;

	fn create_job<'a>(
		&'a self,
		cfg: &'a FineTuneProviderConfig,
		file_id: &'a str,
		model: &'a str,
	) -> BoxFuture<'a, quill_providers::Result<String>>;

	fn job_status<'a>(
		&'a self,
		cfg: &'a FineTuneProviderConfig,
		job_id: &'a str,
	) -> BoxFuture<'a, quill_providers::Result<RemoteJob>>;

	fn list_job_events<'a>(
		&'a self,
		cfg: &'a FineTuneProviderConfig,
		job_id: &'a str,
		limit: u32,
	) -> BoxFuture<'a, quill_providers::Result<Vec<JobEvent>>>;
}

pub trait TextGenerator
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a CompletionProviderConfig,
		system: &'a str,
		user: &'a str,
	) -> BoxFuture<'a, quill_providers::Result<String>>;
}

/// Receives failures that need an operator's attention.
pub trait AdminNotifier
where
	Self: Send + Sync,
{
	fn notify(&self, subject: &str, body: &str);
}

#[derive(Clone)]
pub struct Providers {
	pub finetune: Arc<dyn FineTuneApi>,
	pub text: Arc<dyn TextGenerator>,
	pub notifier: Arc<dyn AdminNotifier>,
}
impl Providers {
	pub fn new(
		finetune: Arc<dyn FineTuneApi>,
		text: Arc<dyn TextGenerator>,
		notifier: Arc<dyn AdminNotifier>,
	) -> Self {
		Self { finetune, text, notifier }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let remote = Arc::new(DefaultProviders);

		Self { finetune: remote.clone(), text: remote, notifier: Arc::new(TracingNotifier) }
	}
}

struct DefaultProviders;
impl FineTuneApi for DefaultProviders {
	fn upload_file<'a>(
		&'a self,
		cfg: &'a FineTuneProviderConfig,
		file_name: &'a str,
		bytes: &'a [u8],
	) -> BoxFuture<'a, quill_providers::Result<String>> {
		Box::pin(finetune::upload_file(cfg, file_name, bytes))
	}

	fn file_status<'a>(
		&'a self,
		cfg: &'a FineTuneProviderConfig,
		file_id: &'a str,
	) -> BoxFuture<'a, quill_providers::Result<FileStatus>> {
		Box::pin(finetune::file_status(cfg, file_id))
	}

	fn create_job<'a>(
		&'a self,
		cfg: &'a FineTuneProviderConfig,
		file_id: &'a str,
		model: &'a str,
	) -> BoxFuture<'a, quill_providers::Result<String>> {
		Box::pin(finetune::create_job(cfg, file_id, model))
	}

	fn job_status<'a>(
		&'a self,
		cfg: &'a FineTuneProviderConfig,
		job_id: &'a str,
	) -> BoxFuture<'a, quill_providers::Result<RemoteJob>> {
		Box::pin(finetune::job_status(cfg, job_id))
	}

	fn list_job_events<'a>(
		&'a self,
		cfg: &'a FineTuneProviderConfig,
		job_id: &'a str,
		limit: u32,
	) -> BoxFuture<'a, quill_providers::Result<Vec<JobEvent>>> {
		Box::pin(finetune::list_job_events(cfg, job_id, limit))
	}
}
impl TextGenerator for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a CompletionProviderConfig,
		system: &'a str,
		user: &'a str,
	) -> BoxFuture<'a, quill_providers::Result<String>> {
		Box::pin(completion::complete(cfg, system, user))
	}
}

/// Reports operator-facing failures through the error log.
pub struct TracingNotifier;
impl AdminNotifier for TracingNotifier {
	fn notify(&self, subject: &str, body: &str) {
		tracing::error!(subject, body, "Administrator notification.");
	}
}
