use std::{path::Path, sync::Arc, time::Duration};

use quill_providers::finetune::{FileStatus, JobEvent, RemoteJob, RemoteJobStatus};
use quill_service::{
	Backoff, CRITICAL_MESSAGE, ERROR_MARKUP, Error, FailureReason, FineTuneOrchestrator, Job,
	JobState, OrchestratorSettings, RetryPolicy, StatusStore,
};
use quill_testkit::{
	DEFAULT_FILE_ID, DEFAULT_FINE_TUNED_MODEL, DEFAULT_REMOTE_JOB_ID, RecordingNotifier,
	ScriptedFineTuneApi, not_found_error, test_config, transient_error, user_error,
};

struct Harness {
	api: Arc<ScriptedFineTuneApi>,
	notifier: Arc<RecordingNotifier>,
	status: StatusStore,
	orchestrator: FineTuneOrchestrator,
}

fn harness(max_attempts: u32) -> Harness {
	let api = Arc::new(ScriptedFineTuneApi::new());
	let notifier = Arc::new(RecordingNotifier::new());
	let status = StatusStore::new();
	let retry = RetryPolicy {
		max_attempts,
		backoff: Backoff::Offset { offset: 5 },
		unit: Duration::from_millis(1),
	};
	let settings = OrchestratorSettings {
		poll_interval: Duration::from_millis(1),
		event_limit: 10,
		report_events: true,
		download_prefix: "/download".to_string(),
	};
	let orchestrator =
		FineTuneOrchestrator::new(api.clone(), notifier.clone(), status.clone(), retry, settings);

	Harness { api, notifier, status, orchestrator }
}

async fn run(harness: &Harness, job: &mut Job) -> quill_service::Result<String> {
	let cfg = test_config(Path::new("unused")).providers.finetune;

	harness.orchestrator.run(job, &cfg, "base-model", b"{\"messages\":[]}\n").await
}

fn event(id: &str, message: &str) -> JobEvent {
	JobEvent { id: id.to_string(), created_at: 0, message: message.to_string() }
}

#[tokio::test]
async fn job_walks_every_state_and_links_the_dataset() {
	let harness = harness(5);

	harness
		.api
		.push_file_status(Ok(FileStatus::Processing))
		.push_file_status(Ok(FileStatus::Processed));
	harness.api.push_job_status(Ok(ScriptedFineTuneApi::remote_job(RemoteJobStatus::Running)));
	harness.api.push_events(Ok(vec![event("e1", "Fine-tuning job started")]));

	let mut job = Job::new("job-1");
	let model = run(&harness, &mut job).await.expect("Job should succeed.");

	assert_eq!(model, DEFAULT_FINE_TUNED_MODEL);
	assert_eq!(job.state, JobState::Succeeded);
	assert_eq!(job.file_ref.as_deref(), Some(DEFAULT_FILE_ID));
	assert_eq!(job.job_ref.as_deref(), Some(DEFAULT_REMOTE_JOB_ID));
	assert_eq!(job.fine_tuned_model.as_deref(), Some(DEFAULT_FINE_TUNED_MODEL));
	assert_eq!(harness.api.calls("file_status"), 2);
	assert_eq!(harness.api.calls("job_status"), 2);
	assert_eq!(harness.api.calls("list_job_events"), 2);
	assert_eq!(job.attempts, 8);
	assert_eq!(harness.api.models(), vec!["base-model".to_string()]);

	let status = harness.status.get("job-1").unwrap();

	assert!(status.contains(DEFAULT_FINE_TUNED_MODEL));
	assert!(status.contains("<a href='/download/job-1/fine_tune.jsonl'>JSONL file here</a>"));
	assert!(harness.notifier.messages().is_empty());
}

#[tokio::test]
async fn transient_failures_are_retried_until_success() {
	let harness = harness(5);

	harness.api.push_upload(Err(transient_error())).push_upload(Err(transient_error()));

	let mut job = Job::new("job-2");

	run(&harness, &mut job).await.expect("Job should recover.");

	assert_eq!(harness.api.calls("upload_file"), 3);
	assert_eq!(job.state, JobState::Succeeded);
}

#[tokio::test]
async fn retries_stop_at_the_attempt_cap() {
	let harness = harness(5);

	for _ in 0..6 {
		harness.api.push_upload(Err(transient_error()));
	}

	let mut job = Job::new("job-3");
	let err = run(&harness, &mut job).await.expect_err("Job should fail.");

	assert_eq!(harness.api.calls("upload_file"), 5);
	assert_eq!(harness.api.calls("create_job"), 0);
	assert!(matches!(
		err,
		Error::JobFailed { reason: FailureReason::Exhausted { attempts: 5, .. }, .. }
	));
	assert!(matches!(job.state, JobState::Failed(FailureReason::Exhausted { .. })));
	assert_eq!(harness.status.get("job-3").unwrap(), format!("{ERROR_MARKUP} {CRITICAL_MESSAGE}"));
	assert_eq!(harness.notifier.messages().len(), 1);
}

#[tokio::test]
async fn user_errors_fail_fast_with_the_remote_message() {
	let harness = harness(5);

	harness.api.push_create(Err(user_error("Incorrect API key provided.")));

	let mut job = Job::new("job-4");
	let err = run(&harness, &mut job).await.expect_err("Job should fail.");

	assert_eq!(harness.api.calls("create_job"), 1);
	assert!(matches!(err, Error::JobFailed { reason: FailureReason::User { .. }, .. }));
	assert_eq!(
		harness.status.get("job-4").unwrap(),
		format!("{ERROR_MARKUP} Incorrect API key provided.")
	);
	assert!(harness.notifier.messages().is_empty());
}

#[tokio::test]
async fn missing_remote_job_escalates_to_the_administrator() {
	let harness = harness(5);

	harness.api.push_job_status(Err(not_found_error()));

	let mut job = Job::new("job-5");

	run(&harness, &mut job).await.expect_err("Job should fail.");

	assert_eq!(harness.api.calls("job_status"), 1);
	assert!(matches!(job.state, JobState::Failed(FailureReason::NotFound { .. })));
	assert_eq!(harness.status.get("job-5").unwrap(), format!("{ERROR_MARKUP} {CRITICAL_MESSAGE}"));

	let messages = harness.notifier.messages();

	assert_eq!(messages.len(), 1);
	assert!(messages[0].0.contains("job-5"));
}

#[tokio::test]
async fn failed_remote_job_is_terminal_without_retry() {
	let harness = harness(5);

	harness.api.push_job_status(Ok(RemoteJob {
		error: Some("Training file has invalid rows.".to_string()),
		..ScriptedFineTuneApi::remote_job(RemoteJobStatus::Failed)
	}));

	let mut job = Job::new("job-6");

	run(&harness, &mut job).await.expect_err("Job should fail.");

	assert_eq!(harness.api.calls("job_status"), 1);
	assert!(matches!(job.state, JobState::Failed(FailureReason::Remote { .. })));
	assert_eq!(
		harness.status.get("job-6").unwrap(),
		format!("{ERROR_MARKUP} The fine-tuning job failed: Training file has invalid rows.")
	);
	assert!(harness.notifier.messages().is_empty());
}

#[tokio::test]
async fn rejected_file_stops_before_job_creation() {
	let harness = harness(5);

	harness
		.api
		.push_file_status(Ok(FileStatus::Failed { message: "Invalid file format.".to_string() }));

	let mut job = Job::new("job-7");

	run(&harness, &mut job).await.expect_err("Job should fail.");

	assert_eq!(harness.api.calls("create_job"), 0);
	assert_eq!(job.file_ref.as_deref(), Some(DEFAULT_FILE_ID));
	assert!(matches!(job.state, JobState::Failed(FailureReason::Remote { .. })));
}
