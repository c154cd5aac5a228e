use serde_json::Value;

use crate::{Error, Result};

pub async fn complete(
	cfg: &quill_config::CompletionProviderConfig,
	system: &str,
	user: &str,
) -> Result<String> {
	let client = crate::client(cfg.timeout_ms)?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"max_tokens": cfg.max_tokens,
		"messages": [
			{ "role": "system", "content": system },
			{ "role": "user", "content": user },
		],
	});
	let res = client
		.post(&url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json = crate::read_json(res).await?;

	parse_completion_content(&json)
}

fn parse_completion_content(json: &Value) -> Result<String> {
	let content = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
		.map(str::trim)
		.unwrap_or_default();

	if content.is_empty() {
		return Err(Error::invalid_response("Completion response has no message content."));
	}

	Ok(content.to_string())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ErrorClass;

	#[test]
	fn parses_trimmed_choice_content() {
		let json = serde_json::json!({
			"choices": [
				{ "message": { "role": "assistant", "content": "  1. Hero wakes.\n2. Storm hits.  " } }
			]
		});

		assert_eq!(parse_completion_content(&json).unwrap(), "1. Hero wakes.\n2. Storm hits.");
	}

	#[test]
	fn empty_content_is_a_retryable_error() {
		let json = serde_json::json!({ "choices": [ { "message": { "content": "   " } } ] });
		let err = parse_completion_content(&json).unwrap_err();

		assert_eq!(err.class(), ErrorClass::Transient);
		assert!(parse_completion_content(&serde_json::json!({})).is_err());
	}
}
