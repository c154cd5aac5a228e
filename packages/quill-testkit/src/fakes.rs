use std::{
	collections::{HashMap, VecDeque},
	sync::Mutex,
};

use quill_config::{CompletionProviderConfig, FineTuneProviderConfig};
use quill_providers::{
	Error as ProviderError, Result as ProviderResult,
	finetune::{FileStatus, JobEvent, RemoteJob, RemoteJobStatus},
};
use quill_service::{AdminNotifier, BoxFuture, FineTuneApi, TextGenerator};

pub const DEFAULT_FILE_ID: &str = "file-1";
pub const DEFAULT_REMOTE_JOB_ID: &str = "ftjob-1";
pub const DEFAULT_FINE_TUNED_MODEL: &str = "ft:base-model:quill:1";

/// A 503 reply, classified as transient.
pub fn transient_error() -> ProviderError {
	ProviderError::Status { status: 503, message: "The server is overloaded.".to_string() }
}

/// A 401 reply carrying `message`, classified as a user error.
pub fn user_error(message: &str) -> ProviderError {
	ProviderError::Status { status: 401, message: message.to_string() }
}

pub fn not_found_error() -> ProviderError {
	ProviderError::Status { status: 404, message: "No such object.".to_string() }
}

#[derive(Default)]
struct Script {
	uploads: VecDeque<ProviderResult<String>>,
	file_statuses: VecDeque<ProviderResult<FileStatus>>,
	creates: VecDeque<ProviderResult<String>>,
	job_statuses: VecDeque<ProviderResult<RemoteJob>>,
	events: VecDeque<ProviderResult<Vec<JobEvent>>>,
}

/// Fine-tuning API that replays queued replies, then succeeds.
///
/// Each operation pops its own queue. An empty queue yields the happy-path reply, so tests only
/// script the calls they care about.
#[derive(Default)]
pub struct ScriptedFineTuneApi {
	script: Mutex<Script>,
	calls: Mutex<HashMap<&'static str, usize>>,
	uploaded: Mutex<Vec<Vec<u8>>>,
	api_keys: Mutex<Vec<String>>,
	models: Mutex<Vec<String>>,
}
impl ScriptedFineTuneApi {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push_upload(&self, reply: ProviderResult<String>) -> &Self {
		self.script().uploads.push_back(reply);

		self
	}

	pub fn push_file_status(&self, reply: ProviderResult<FileStatus>) -> &Self {
		self.script().file_statuses.push_back(reply);

		self
	}

	pub fn push_create(&self, reply: ProviderResult<String>) -> &Self {
		self.script().creates.push_back(reply);

		self
	}

	pub fn push_job_status(&self, reply: ProviderResult<RemoteJob>) -> &Self {
		self.script().job_statuses.push_back(reply);

		self
	}

	pub fn push_events(&self, reply: ProviderResult<Vec<JobEvent>>) -> &Self {
		self.script().events.push_back(reply);

		self
	}

	/// Number of calls made to `operation`, named like the trait method.
	pub fn calls(&self, operation: &str) -> usize {
		lock(&self.calls).get(operation).copied().unwrap_or_default()
	}

	pub fn uploaded(&self) -> Vec<Vec<u8>> {
		lock(&self.uploaded).clone()
	}

	/// API keys seen by `upload_file`, in call order.
	pub fn api_keys(&self) -> Vec<String> {
		lock(&self.api_keys).clone()
	}

	/// Base models passed to `create_job`, in call order.
	pub fn models(&self) -> Vec<String> {
		lock(&self.models).clone()
	}

	pub fn remote_job(status: RemoteJobStatus) -> RemoteJob {
		RemoteJob {
			id: DEFAULT_REMOTE_JOB_ID.to_string(),
			status,
			fine_tuned_model: (status == RemoteJobStatus::Succeeded)
				.then(|| DEFAULT_FINE_TUNED_MODEL.to_string()),
			error: None,
		}
	}

	fn script(&self) -> std::sync::MutexGuard<'_, Script> {
		lock(&self.script)
	}

	fn record(&self, operation: &'static str) {
		*lock(&self.calls).entry(operation).or_default() += 1;
	}
}
impl FineTuneApi for ScriptedFineTuneApi {
	fn upload_file<'a>(
		&'a self,
		cfg: &'a FineTuneProviderConfig,
		_file_name: &'a str,
		bytes: &'a [u8],
	) -> BoxFuture<'a, ProviderResult<String>> {
		self.record("upload_file");
		lock(&self.uploaded).push(bytes.to_vec());
		lock(&self.api_keys).push(cfg.api_key.clone());

		let reply =
			self.script().uploads.pop_front().unwrap_or_else(|| Ok(DEFAULT_FILE_ID.to_string()));

		Box::pin(async move { reply })
	}

	fn file_status<'a>(
		&'a self,
		_cfg: &'a FineTuneProviderConfig,
		_file_id: &'a str,
	) -> BoxFuture<'a, ProviderResult<FileStatus>> {
		self.record("file_status");

		let reply = self.script().file_statuses.pop_front().unwrap_or(Ok(FileStatus::Processed));

		Box::pin(async move { reply })
	}

	fn create_job<'a>(
		&'a self,
		_cfg: &'a FineTuneProviderConfig,
		_file_id: &'a str,
		model: &'a str,
	) -> BoxFuture<'a, ProviderResult<String>> {
		self.record("create_job");
		lock(&self.models).push(model.to_string());

		let reply = self
			.script()
			.creates
			.pop_front()
			.unwrap_or_else(|| Ok(DEFAULT_REMOTE_JOB_ID.to_string()));

		Box::pin(async move { reply })
	}

	fn job_status<'a>(
		&'a self,
		_cfg: &'a FineTuneProviderConfig,
		_job_id: &'a str,
	) -> BoxFuture<'a, ProviderResult<RemoteJob>> {
		self.record("job_status");

		let reply = self
			.script()
			.job_statuses
			.pop_front()
			.unwrap_or_else(|| Ok(Self::remote_job(RemoteJobStatus::Succeeded)));

		Box::pin(async move { reply })
	}

	fn list_job_events<'a>(
		&'a self,
		_cfg: &'a FineTuneProviderConfig,
		_job_id: &'a str,
		_limit: u32,
	) -> BoxFuture<'a, ProviderResult<Vec<JobEvent>>> {
		self.record("list_job_events");

		let reply = self.script().events.pop_front().unwrap_or_else(|| Ok(Vec::new()));

		Box::pin(async move { reply })
	}
}

/// Text generator that replays queued replies and records every prompt it receives.
pub struct ScriptedGenerator {
	replies: Mutex<VecDeque<ProviderResult<String>>>,
	fallback: String,
	prompts: Mutex<Vec<(String, String)>>,
}
impl ScriptedGenerator {
	/// Answers every call with `fallback` once the queue is empty.
	pub fn new(fallback: &str) -> Self {
		Self {
			replies: Mutex::new(VecDeque::new()),
			fallback: fallback.to_string(),
			prompts: Mutex::new(Vec::new()),
		}
	}

	pub fn push_reply(&self, reply: ProviderResult<String>) -> &Self {
		lock(&self.replies).push_back(reply);

		self
	}

	/// `(system, user)` prompt pairs in call order.
	pub fn prompts(&self) -> Vec<(String, String)> {
		lock(&self.prompts).clone()
	}
}
impl TextGenerator for ScriptedGenerator {
	fn complete<'a>(
		&'a self,
		_cfg: &'a CompletionProviderConfig,
		system: &'a str,
		user: &'a str,
	) -> BoxFuture<'a, ProviderResult<String>> {
		lock(&self.prompts).push((system.to_string(), user.to_string()));

		let reply = lock(&self.replies).pop_front().unwrap_or_else(|| Ok(self.fallback.clone()));

		Box::pin(async move { reply })
	}
}

#[derive(Default)]
pub struct RecordingNotifier {
	messages: Mutex<Vec<(String, String)>>,
}
impl RecordingNotifier {
	pub fn new() -> Self {
		Self::default()
	}

	/// `(subject, body)` pairs in notification order.
	pub fn messages(&self) -> Vec<(String, String)> {
		lock(&self.messages).clone()
	}
}
impl AdminNotifier for RecordingNotifier {
	fn notify(&self, subject: &str, body: &str) {
		lock(&self.messages).push((subject.to_string(), body.to_string()));
	}
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(|err| err.into_inner())
}
