use std::{future::Future, time::Duration};

use quill_providers::ErrorClass;

use crate::{Error, Result};

/// Caps a single backoff sleep so the power curve stays bounded.
const MAX_BACKOFF_UNITS: u64 = 600;

/// Shape of the wait between attempts, in backoff units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backoff {
	/// `(offset - attempt) + attempt²`.
	Offset { offset: u32 },
	/// `attempt ^ attempt`.
	Power,
}

/// Bounded retry loop for remote calls. Only transient failures are retried.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
	pub max_attempts: u32,
	pub backoff: Backoff,
	pub unit: Duration,
}
impl RetryPolicy {
	pub fn from_config(cfg: &quill_config::Retry) -> Self {
		let backoff = match cfg.backoff.as_str() {
			"power" => Backoff::Power,
			_ => Backoff::Offset { offset: cfg.backoff_offset },
		};

		Self {
			max_attempts: cfg.max_attempts.max(1),
			backoff,
			unit: Duration::from_millis(cfg.backoff_unit_ms),
		}
	}

	/// Wait after the `attempt`-th failed call, counting from one.
	pub fn delay(&self, attempt: u32) -> Duration {
		let attempt = u64::from(attempt.max(1));
		let units = match self.backoff {
			Backoff::Offset { offset } => {
				let offset = u64::from(offset);

				offset.saturating_sub(attempt).saturating_add(attempt.saturating_mul(attempt))
			},
			Backoff::Power => attempt.checked_pow(attempt as u32).unwrap_or(MAX_BACKOFF_UNITS),
		};

		self.unit.saturating_mul(units.min(MAX_BACKOFF_UNITS) as u32)
	}

	pub async fn run<T, F, Fut>(&self, operation: &'static str, call: F) -> Result<T>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = quill_providers::Result<T>>,
	{
		let mut attempts = 0;

		self.run_counted(operation, &mut attempts, call).await
	}

	/// Like [`RetryPolicy::run`], adding every call made to `attempts`.
	pub async fn run_counted<T, F, Fut>(
		&self,
		operation: &'static str,
		attempts: &mut u32,
		mut call: F,
	) -> Result<T>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = quill_providers::Result<T>>,
	{
		let mut attempt = 0;

		loop {
			attempt += 1;
			*attempts += 1;

			let err = match call().await {
				Ok(value) => {
					if attempt > 1 {
						tracing::info!(operation, attempt, "Remote call recovered after retry.");
					}

					return Ok(value);
				},
				Err(err) => err,
			};
			let class = err.class();

			if class != ErrorClass::Transient || attempt >= self.max_attempts {
				let exhausted = class == ErrorClass::Transient;

				tracing::warn!(
					operation,
					attempt,
					class = ?class,
					exhausted,
					error = %err,
					"Remote call failed."
				);

				return Err(Error::Remote { operation, attempts: attempt, exhausted, source: err });
			}

			let delay = self.delay(attempt);

			tracing::warn!(
				operation,
				attempt,
				delay_ms = delay.as_millis() as u64,
				error = %err,
				"Transient remote failure. Retrying."
			);
			tokio::time::sleep(delay).await;
		}
	}
}
