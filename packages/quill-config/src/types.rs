use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub providers: Providers,
	#[serde(default)]
	pub chunking: Chunking,
	#[serde(default)]
	pub orchestrator: Orchestrator,
	#[serde(default)]
	pub retry: Retry,
	#[serde(default)]
	pub cleanup: Cleanup,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
	/// Root folder holding one sub-folder per submitted job.
	pub upload_root: PathBuf,
	/// URL prefix used when rendering dataset download links, e.g. "/download".
	#[serde(default = "default_download_prefix")]
	pub download_prefix: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Providers {
	pub finetune: FineTuneProviderConfig,
	pub beats: CompletionProviderConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FineTuneProviderConfig {
	pub api_base: String,
	pub api_key: String,
	/// Base model fine-tuned when a submission does not name one.
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CompletionProviderConfig {
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub max_tokens: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Chunking {
	pub tokenizer_repo: Option<String>,
	#[serde(default = "default_max_chunk_tokens")]
	pub max_chunk_tokens: u32,
	#[serde(default = "default_windows_per_chapter")]
	pub windows_per_chapter: u32,
	/// Optional. Overrides the paragraph-ending token ids derived from the tokenizer.
	pub boundary_token_ids: Option<Vec<u32>>,
}
impl Default for Chunking {
	fn default() -> Self {
		Self {
			tokenizer_repo: None,
			max_chunk_tokens: default_max_chunk_tokens(),
			windows_per_chapter: default_windows_per_chapter(),
			boundary_token_ids: None,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct Orchestrator {
	#[serde(default = "default_poll_interval_ms")]
	pub poll_interval_ms: u64,
	#[serde(default = "default_event_limit")]
	pub event_limit: u32,
	#[serde(default = "default_true")]
	pub report_events: bool,
}
impl Default for Orchestrator {
	fn default() -> Self {
		Self {
			poll_interval_ms: default_poll_interval_ms(),
			event_limit: default_event_limit(),
			report_events: true,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct Retry {
	#[serde(default = "default_max_attempts")]
	pub max_attempts: u32,
	/// One of "offset" or "power".
	#[serde(default = "default_backoff")]
	pub backoff: String,
	#[serde(default = "default_backoff_offset")]
	pub backoff_offset: u32,
	#[serde(default = "default_backoff_unit_ms")]
	pub backoff_unit_ms: u64,
}
impl Default for Retry {
	fn default() -> Self {
		Self {
			max_attempts: default_max_attempts(),
			backoff: default_backoff(),
			backoff_offset: default_backoff_offset(),
			backoff_unit_ms: default_backoff_unit_ms(),
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct Cleanup {
	#[serde(default = "default_cleanup_interval_seconds")]
	pub interval_seconds: u64,
	#[serde(default = "default_cleanup_max_age_seconds")]
	pub max_age_seconds: u64,
}
impl Default for Cleanup {
	fn default() -> Self {
		Self {
			interval_seconds: default_cleanup_interval_seconds(),
			max_age_seconds: default_cleanup_max_age_seconds(),
		}
	}
}

fn default_download_prefix() -> String {
	"/download".to_string()
}

fn default_max_chunk_tokens() -> u32 {
	4_096
}

fn default_windows_per_chapter() -> u32 {
	3
}

fn default_poll_interval_ms() -> u64 {
	3_000
}

fn default_event_limit() -> u32 {
	10
}

fn default_true() -> bool {
	true
}

fn default_max_attempts() -> u32 {
	5
}

fn default_backoff() -> String {
	"offset".to_string()
}

fn default_backoff_offset() -> u32 {
	5
}

fn default_backoff_unit_ms() -> u64 {
	1_000
}

fn default_cleanup_interval_seconds() -> u64 {
	3_600
}

fn default_cleanup_max_age_seconds() -> u64 {
	3_600
}
