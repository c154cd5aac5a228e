pub type Result<T, E = Error> = std::result::Result<T, E>;

const QUOTA_EXCEEDED: &str = "exceeded your current quota";

/// How a failed remote call should be handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
	/// Caller-side problem such as bad credentials or an exhausted quota. Never retried.
	User,
	/// The referenced remote file or job no longer exists. Never retried.
	NotFound,
	/// Connection trouble, throttling, server faults, or malformed replies. Retried.
	Transient,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Transport(#[from] reqwest::Error),
	#[error("Remote API returned status {status}: {message}")]
	Status { status: u16, message: String },
	#[error("{message}")]
	InvalidResponse { message: String },
	#[error("{message}")]
	InvalidConfig { message: String },
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error(transparent)]
	InvalidHeaderName(#[from] reqwest::header::InvalidHeaderName),
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
}
impl Error {
	pub fn invalid_response(message: impl Into<String>) -> Self {
		Self::InvalidResponse { message: message.into() }
	}

	pub fn class(&self) -> ErrorClass {
		match self {
			Self::Transport(err) =>
				if err.is_builder() {
					ErrorClass::User
				} else {
					ErrorClass::Transient
				},
			Self::Status { status, message } => classify_status(*status, message),
			Self::InvalidResponse { .. } | Self::SerdeJson(_) => ErrorClass::Transient,
			Self::InvalidConfig { .. } | Self::InvalidHeaderName(_) | Self::InvalidHeaderValue(_) =>
				ErrorClass::User,
		}
	}

	/// Text safe to show to the person who submitted the job.
	pub fn user_message(&self) -> String {
		match self {
			Self::Status { message, .. } | Self::InvalidConfig { message } => message.clone(),
			other => other.to_string(),
		}
	}
}

pub fn classify_status(status: u16, message: &str) -> ErrorClass {
	match status {
		404 => ErrorClass::NotFound,
		429 if message.contains(QUOTA_EXCEEDED) => ErrorClass::User,
		408 | 409 | 422 | 429 => ErrorClass::Transient,
		500..=599 => ErrorClass::Transient,
		_ => ErrorClass::User,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn classifies_status_codes() {
		for (status, class) in [
			(400, ErrorClass::User),
			(401, ErrorClass::User),
			(403, ErrorClass::User),
			(404, ErrorClass::NotFound),
			(408, ErrorClass::Transient),
			(409, ErrorClass::Transient),
			(422, ErrorClass::Transient),
			(429, ErrorClass::Transient),
			(500, ErrorClass::Transient),
			(503, ErrorClass::Transient),
		] {
			assert_eq!(classify_status(status, "boom"), class, "status {status}");
		}
	}

	#[test]
	fn exhausted_quota_is_not_retried() {
		let message = "You exceeded your current quota, please check your plan.";

		assert_eq!(classify_status(429, message), ErrorClass::User);
	}

	#[test]
	fn malformed_reply_is_transient() {
		assert_eq!(Error::invalid_response("missing content").class(), ErrorClass::Transient);
	}
}
