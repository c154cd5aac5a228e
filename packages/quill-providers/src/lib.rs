pub mod completion;
pub mod finetune;

mod error;

pub use error::{Error, ErrorClass, Result, classify_status};

use std::time::Duration;

use reqwest::{
	Client, Response,
	header::{AUTHORIZATION, HeaderMap, HeaderName},
};
use serde_json::{Map, Value};

pub fn auth_headers(api_key: &str, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::InvalidConfig {
				message: format!("Default header {key} must be a string."),
			});
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}

pub(crate) fn client(timeout_ms: u64) -> Result<Client> {
	Ok(Client::builder().timeout(Duration::from_millis(timeout_ms)).build()?)
}

/// Reads a JSON body, turning non-2xx replies into `Error::Status` with the remote message.
pub(crate) async fn read_json(res: Response) -> Result<Value> {
	let status = res.status();

	if !status.is_success() {
		let body = res.text().await.unwrap_or_default();

		return Err(Error::Status { status: status.as_u16(), message: remote_error_message(&body) });
	}

	Ok(res.json().await?)
}

pub(crate) fn remote_error_message(body: &str) -> String {
	let parsed = serde_json::from_str::<Value>(body).ok();
	let message = parsed
		.as_ref()
		.and_then(|json| json.get("error"))
		.and_then(|err| err.get("message"))
		.and_then(|msg| msg.as_str());

	match message {
		Some(message) => message.to_string(),
		None if body.trim().is_empty() => "Unknown error".to_string(),
		None => body.trim().to_string(),
	}
}
