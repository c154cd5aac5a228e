//! Fakes and fixtures shared by the workspace's integration tests.

mod codec;
mod error;
mod fakes;
mod scratch;

pub use codec::CharCodec;
pub use error::{Error, Result};
pub use fakes::{
	DEFAULT_FILE_ID, DEFAULT_FINE_TUNED_MODEL, DEFAULT_REMOTE_JOB_ID, RecordingNotifier,
	ScriptedFineTuneApi, ScriptedGenerator, not_found_error, transient_error, user_error,
};
pub use scratch::ScratchDir;

use std::path::Path;

use serde_json::Map;

use quill_config::{
	Chunking, Cleanup, CompletionProviderConfig, Config, FineTuneProviderConfig, Orchestrator,
	Providers, Retry, Service,
};

/// A complete config with millisecond timings, rooted at `upload_root`.
pub fn test_config(upload_root: &Path) -> Config {
	Config {
		service: Service {
			log_level: "debug".to_string(),
			upload_root: upload_root.to_path_buf(),
			download_prefix: "/download".to_string(),
		},
		providers: Providers {
			finetune: FineTuneProviderConfig {
				api_base: "http://127.0.0.1:1/v1".to_string(),
				api_key: "test-key".to_string(),
				model: "base-model".to_string(),
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			beats: CompletionProviderConfig {
				api_base: "http://127.0.0.1:1/v1".to_string(),
				api_key: "test-key".to_string(),
				path: "/chat/completions".to_string(),
				model: "beats-model".to_string(),
				temperature: 0.7,
				max_tokens: 1_000,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
		},
		chunking: Chunking {
			tokenizer_repo: None,
			max_chunk_tokens: 4_096,
			windows_per_chapter: 3,
			boundary_token_ids: None,
		},
		orchestrator: Orchestrator { poll_interval_ms: 1, event_limit: 10, report_events: true },
		retry: Retry {
			max_attempts: 5,
			backoff: "offset".to_string(),
			backoff_offset: 5,
			backoff_unit_ms: 1,
		},
		cleanup: Cleanup { interval_seconds: 3_600, max_age_seconds: 3_600 },
	}
}
