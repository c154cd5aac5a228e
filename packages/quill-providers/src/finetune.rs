//! Client for an OpenAI-compatible fine-tuning API.

use reqwest::multipart::{Form, Part};
use serde_json::Value;

use crate::{Error, Result};
use quill_config::FineTuneProviderConfig;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileStatus {
	Processing,
	Processed,
	Failed { message: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoteJobStatus {
	Queued,
	Running,
	Succeeded,
	Failed,
	Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteJob {
	pub id: String,
	pub status: RemoteJobStatus,
	pub fine_tuned_model: Option<String>,
	pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobEvent {
	pub id: String,
	pub created_at: i64,
	pub message: String,
}

pub async fn upload_file(
	cfg: &FineTuneProviderConfig,
	file_name: &str,
	bytes: &[u8],
) -> Result<String> {
	let client = crate::client(cfg.timeout_ms)?;
	let form = Form::new()
		.text("purpose", "fine-tune")
		.part("file", Part::bytes(bytes.to_vec()).file_name(file_name.to_string()));
	let res = client
		.post(format!("{}/files", cfg.api_base))
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.multipart(form)
		.send()
		.await?;
	let json = crate::read_json(res).await?;

	required_str(&json, "id", "File upload")
}

pub async fn file_status(cfg: &FineTuneProviderConfig, file_id: &str) -> Result<FileStatus> {
	let json = get_json(cfg, &format!("{}/files/{file_id}", cfg.api_base)).await?;

	parse_file_status(&json)
}

pub async fn create_job(
	cfg: &FineTuneProviderConfig,
	file_id: &str,
	model: &str,
) -> Result<String> {
	let client = crate::client(cfg.timeout_ms)?;
	let body = serde_json::json!({ "training_file": file_id, "model": model });
	let res = client
		.post(format!("{}/fine_tuning/jobs", cfg.api_base))
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json = crate::read_json(res).await?;

	required_str(&json, "id", "Job creation")
}

pub async fn job_status(cfg: &FineTuneProviderConfig, job_id: &str) -> Result<RemoteJob> {
	let json = get_json(cfg, &format!("{}/fine_tuning/jobs/{job_id}", cfg.api_base)).await?;

	parse_remote_job(&json)
}

pub async fn list_job_events(
	cfg: &FineTuneProviderConfig,
	job_id: &str,
	limit: u32,
) -> Result<Vec<JobEvent>> {
	let url = format!("{}/fine_tuning/jobs/{job_id}/events?limit={limit}", cfg.api_base);
	let json = get_json(cfg, &url).await?;

	parse_job_events(&json)
}

async fn get_json(cfg: &FineTuneProviderConfig, url: &str) -> Result<Value> {
	let client = crate::client(cfg.timeout_ms)?;
	let res = client
		.get(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.send()
		.await?;

	crate::read_json(res).await
}

fn required_str(json: &Value, field: &str, label: &str) -> Result<String> {
	json.get(field)
		.and_then(|v| v.as_str())
		.filter(|v| !v.is_empty())
		.map(str::to_string)
		.ok_or_else(|| Error::invalid_response(format!("{label} response is missing {field}.")))
}

fn parse_file_status(json: &Value) -> Result<FileStatus> {
	let status = required_str(json, "status", "File status")?;

	Ok(match status.as_str() {
		"processed" => FileStatus::Processed,
		"error" => FileStatus::Failed {
			message: json
				.get("status_details")
				.and_then(|v| v.as_str())
				.unwrap_or("The training file failed validation.")
				.to_string(),
		},
		_ => FileStatus::Processing,
	})
}

fn parse_remote_job(json: &Value) -> Result<RemoteJob> {
	let id = required_str(json, "id", "Job status")?;
	let status = match required_str(json, "status", "Job status")?.as_str() {
		"validating_files" | "queued" => RemoteJobStatus::Queued,
		"running" => RemoteJobStatus::Running,
		"succeeded" => RemoteJobStatus::Succeeded,
		"failed" => RemoteJobStatus::Failed,
		"cancelled" => RemoteJobStatus::Cancelled,
		other => {
			return Err(Error::invalid_response(format!("Unknown fine-tuning job status {other}.")));
		},
	};
	let fine_tuned_model =
		json.get("fine_tuned_model").and_then(|v| v.as_str()).map(str::to_string);
	let error = json
		.get("error")
		.and_then(|err| err.get("message"))
		.and_then(|msg| msg.as_str())
		.map(str::to_string);

	Ok(RemoteJob { id, status, fine_tuned_model, error })
}

/// Events arrive newest first; they are returned oldest first.
fn parse_job_events(json: &Value) -> Result<Vec<JobEvent>> {
	let data = json
		.get("data")
		.and_then(|v| v.as_array())
		.ok_or_else(|| Error::invalid_response("Job events response is missing data array."))?;
	let mut events = Vec::with_capacity(data.len());

	for item in data {
		let id = required_str(item, "id", "Job event")?;
		let message = required_str(item, "message", "Job event")?;
		let created_at = item.get("created_at").and_then(|v| v.as_i64()).unwrap_or_default();

		events.push(JobEvent { id, created_at, message });
	}

	events.sort_by_key(|event| event.created_at);

	Ok(events)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn maps_file_statuses() {
		let processed = serde_json::json!({ "id": "file-1", "status": "processed" });
		let pending = serde_json::json!({ "id": "file-1", "status": "uploaded" });
		let failed = serde_json::json!({
			"id": "file-1",
			"status": "error",
			"status_details": "Line 3 is missing messages."
		});

		assert_eq!(parse_file_status(&processed).unwrap(), FileStatus::Processed);
		assert_eq!(parse_file_status(&pending).unwrap(), FileStatus::Processing);
		assert_eq!(
			parse_file_status(&failed).unwrap(),
			FileStatus::Failed { message: "Line 3 is missing messages.".to_string() }
		);
	}

	#[test]
	fn parses_succeeded_job_with_model() {
		let json = serde_json::json!({
			"id": "ftjob-1",
			"status": "succeeded",
			"fine_tuned_model": "ft:gpt-3.5-turbo:org::abc",
			"error": null
		});
		let job = parse_remote_job(&json).unwrap();

		assert_eq!(job.status, RemoteJobStatus::Succeeded);
		assert_eq!(job.fine_tuned_model.as_deref(), Some("ft:gpt-3.5-turbo:org::abc"));
		assert!(job.error.is_none());
	}

	#[test]
	fn validating_files_counts_as_queued() {
		let json = serde_json::json!({ "id": "ftjob-1", "status": "validating_files" });

		assert_eq!(parse_remote_job(&json).unwrap().status, RemoteJobStatus::Queued);
	}

	#[test]
	fn unknown_job_status_is_malformed() {
		let json = serde_json::json!({ "id": "ftjob-1", "status": "exploded" });

		assert!(matches!(parse_remote_job(&json), Err(Error::InvalidResponse { .. })));
	}

	#[test]
	fn events_are_returned_oldest_first() {
		let json = serde_json::json!({
			"data": [
				{ "id": "ev-2", "created_at": 20, "message": "Step 10/100: training loss=1.2" },
				{ "id": "ev-1", "created_at": 10, "message": "Fine-tuning job started" }
			]
		});
		let events = parse_job_events(&json).unwrap();

		assert_eq!(events[0].id, "ev-1");
		assert_eq!(events[1].message, "Step 10/100: training loss=1.2");
	}
}
