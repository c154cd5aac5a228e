use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use quill_config::{Config, Error};

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

fn sample_toml_with(section: &str, key: &str, value: Value) -> String {
	let mut root: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let mut table = root.as_table_mut().expect("Template config must be a table.");

	for part in section.split('.') {
		table = table
			.get_mut(part)
			.and_then(Value::as_table_mut)
			.unwrap_or_else(|| panic!("Template config must include [{section}]."));
	}

	table.insert(key.to_string(), value);

	toml::to_string(&root).expect("Failed to render template config.")
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("quill_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn load_payload(payload: String) -> quill_config::Result<Config> {
	let path = write_temp_config(payload);
	let result = quill_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	result
}

fn base_config() -> Config {
	load_payload(SAMPLE_CONFIG_TEMPLATE_TOML.to_string()).expect("Template config must load.")
}

#[test]
fn template_config_loads_and_normalizes() {
	let cfg = base_config();

	assert_eq!(cfg.providers.finetune.api_base, "https://api.openai.com/v1");
	assert_eq!(cfg.service.download_prefix, "/download");
	assert_eq!(cfg.chunking.max_chunk_tokens, 4_096);
	assert_eq!(cfg.retry.max_attempts, 5);
}

#[test]
fn missing_optional_sections_use_defaults() {
	let mut root: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let table = root.as_table_mut().expect("Template config must be a table.");

	for section in ["chunking", "orchestrator", "retry", "cleanup"] {
		table.remove(section);
	}

	let cfg = load_payload(toml::to_string(&root).expect("Failed to render config."))
		.expect("Config without optional sections must load.");

	assert_eq!(cfg.chunking.windows_per_chapter, 3);
	assert!(cfg.chunking.tokenizer_repo.is_none());
	assert_eq!(cfg.orchestrator.poll_interval_ms, 3_000);
	assert!(cfg.orchestrator.report_events);
	assert_eq!(cfg.retry.backoff, "offset");
	assert_eq!(cfg.cleanup.max_age_seconds, 3_600);
}

#[test]
fn blank_tokenizer_repo_is_treated_as_unset() {
	let payload = sample_toml_with("chunking", "tokenizer_repo", Value::String("  ".to_string()));
	let cfg = load_payload(payload).expect("Blank tokenizer repo must load.");

	assert!(cfg.chunking.tokenizer_repo.is_none());
}

#[test]
fn finetune_api_key_must_be_non_empty() {
	let payload = sample_toml_with("providers.finetune", "api_key", Value::String(" ".to_string()));
	let err = load_payload(payload).expect_err("Expected api_key validation error.");

	assert!(
		err.to_string().contains("providers.finetune.api_key must be non-empty."),
		"Unexpected error: {err}"
	);
}

#[test]
fn retry_attempt_cap_is_bounded() {
	for attempts in [0, 11] {
		let payload = sample_toml_with("retry", "max_attempts", Value::Integer(attempts));
		let err = load_payload(payload).expect_err("Expected max_attempts validation error.");

		assert!(
			err.to_string().contains("retry.max_attempts must be in the range 1-10."),
			"Unexpected error: {err}"
		);
	}
}

#[test]
fn backoff_name_is_case_insensitive_but_closed() {
	let payload = sample_toml_with("retry", "backoff", Value::String("POWER".to_string()));
	let cfg = load_payload(payload).expect("Uppercase backoff must load.");

	assert_eq!(cfg.retry.backoff, "power");

	let payload = sample_toml_with("retry", "backoff", Value::String("linear".to_string()));
	let err = load_payload(payload).expect_err("Expected backoff validation error.");

	assert!(matches!(err, Error::Validation { key: "retry.backoff", .. }), "Unexpected error: {err}");
}

#[test]
fn chunk_limits_must_be_positive() {
	let mut cfg = base_config();

	cfg.chunking.max_chunk_tokens = 0;

	let err = quill_config::validate(&cfg).expect_err("Expected max_chunk_tokens error.");

	assert!(err.to_string().contains("chunking.max_chunk_tokens must be greater than zero."));

	let mut cfg = base_config();

	cfg.chunking.windows_per_chapter = 0;

	let err = quill_config::validate(&cfg).expect_err("Expected windows_per_chapter error.");

	assert!(err.to_string().contains("chunking.windows_per_chapter must be greater than zero."));
}

#[test]
fn explicit_boundary_ids_must_not_be_empty() {
	let payload = sample_toml_with("chunking", "boundary_token_ids", Value::Array(Vec::new()));
	let err = load_payload(payload).expect_err("Expected boundary_token_ids error.");

	assert!(
		err.to_string().contains("chunking.boundary_token_ids must be non-empty when provided."),
		"Unexpected error: {err}"
	);
}

#[test]
fn event_limit_is_required_only_when_reporting() {
	let mut cfg = base_config();

	cfg.orchestrator.event_limit = 0;
	cfg.orchestrator.report_events = false;

	assert!(quill_config::validate(&cfg).is_ok());

	cfg.orchestrator.report_events = true;

	assert!(quill_config::validate(&cfg).is_err());
}

#[test]
fn unreadable_path_reports_read_error() {
	let err = quill_config::load(std::path::Path::new("/nonexistent/quill/config.toml"))
		.expect_err("Expected read error.");

	assert!(matches!(err, Error::ReadConfig { .. }));
}
