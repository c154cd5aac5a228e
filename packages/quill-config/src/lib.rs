mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Chunking, Cleanup, CompletionProviderConfig, Config, FineTuneProviderConfig, Orchestrator,
	Providers, Retry, Service,
};

use std::{fs, path::Path};

pub const MAX_RETRY_ATTEMPTS: u32 = 10;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.upload_root.as_os_str().is_empty() {
		return Err(Error::invalid("service.upload_root", "must be non-empty."));
	}

	for (key, value) in [
		("providers.finetune.api_key", &cfg.providers.finetune.api_key),
		("providers.finetune.api_base", &cfg.providers.finetune.api_base),
		("providers.finetune.model", &cfg.providers.finetune.model),
		("providers.beats.api_key", &cfg.providers.beats.api_key),
		("providers.beats.api_base", &cfg.providers.beats.api_base),
		("providers.beats.model", &cfg.providers.beats.model),
	] {
		if value.trim().is_empty() {
			return Err(Error::invalid(key, "must be non-empty."));
		}
	}

	if cfg.providers.beats.max_tokens == 0 {
		return Err(Error::invalid("providers.beats.max_tokens", "must be greater than zero."));
	}
	if !cfg.providers.beats.temperature.is_finite() {
		return Err(Error::invalid("providers.beats.temperature", "must be a finite number."));
	}
	if !(0.0..=2.0).contains(&cfg.providers.beats.temperature) {
		return Err(Error::invalid("providers.beats.temperature", "must be in the range 0.0-2.0."));
	}
	if cfg.chunking.max_chunk_tokens == 0 {
		return Err(Error::invalid("chunking.max_chunk_tokens", "must be greater than zero."));
	}
	if cfg.chunking.windows_per_chapter == 0 {
		return Err(Error::invalid("chunking.windows_per_chapter", "must be greater than zero."));
	}

	if let Some(ids) = cfg.chunking.boundary_token_ids.as_ref()
		&& ids.is_empty()
	{
		return Err(Error::invalid(
			"chunking.boundary_token_ids",
			"must be non-empty when provided.",
		));
	}

	if cfg.orchestrator.poll_interval_ms == 0 {
		return Err(Error::invalid("orchestrator.poll_interval_ms", "must be greater than zero."));
	}
	if cfg.orchestrator.report_events && cfg.orchestrator.event_limit == 0 {
		return Err(Error::invalid(
			"orchestrator.event_limit",
			"must be greater than zero when report_events is enabled.",
		));
	}
	if cfg.retry.max_attempts == 0 || cfg.retry.max_attempts > MAX_RETRY_ATTEMPTS {
		return Err(Error::Validation {
			key: "retry.max_attempts",
			message: format!("must be in the range 1-{MAX_RETRY_ATTEMPTS}."),
		});
	}
	if !matches!(cfg.retry.backoff.as_str(), "offset" | "power") {
		return Err(Error::invalid("retry.backoff", "must be one of offset or power."));
	}
	if cfg.cleanup.interval_seconds == 0 {
		return Err(Error::invalid("cleanup.interval_seconds", "must be greater than zero."));
	}
	if cfg.cleanup.max_age_seconds == 0 {
		return Err(Error::invalid("cleanup.max_age_seconds", "must be greater than zero."));
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.chunking.tokenizer_repo.as_deref().map(|repo| repo.trim().is_empty()).unwrap_or(false) {
		cfg.chunking.tokenizer_repo = None;
	}

	cfg.retry.backoff = cfg.retry.backoff.trim().to_ascii_lowercase();

	for api_base in [&mut cfg.providers.finetune.api_base, &mut cfg.providers.beats.api_base] {
		let trimmed = api_base.trim().trim_end_matches('/').to_string();

		*api_base = trimmed;
	}

	let prefix = cfg.service.download_prefix.trim().trim_end_matches('/').to_string();

	cfg.service.download_prefix = prefix;
}
