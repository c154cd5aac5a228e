use std::path::PathBuf;

use quill_providers::ErrorClass;

use crate::FailureReason;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("No status recorded for job {job_id}.")]
	NotFound { job_id: String },
	#[error("Job {job_id} is being removed by the cleanup sweeper.")]
	Sweeping { job_id: String },
	#[error("Job folder {path:?} holds no manuscripts or datasets.")]
	EmptyWorkspace { path: PathBuf },
	#[error("Dataset for job {job_id} has no training examples.")]
	EmptyDataset { job_id: String },
	#[error("Job cannot move from {from} to {to}.")]
	InvalidTransition { from: &'static str, to: &'static str },
	#[error("Remote call {operation} failed after {attempts} attempt(s): {source}")]
	Remote {
		operation: &'static str,
		attempts: u32,
		exhausted: bool,
		source: quill_providers::Error,
	},
	#[error("{message}")]
	RemoteRejected { message: String },
	#[error("Job {job_id} failed: {reason}")]
	JobFailed { job_id: String, reason: FailureReason },
	#[error(transparent)]
	Chunking(#[from] quill_chunking::Error),
	#[error(transparent)]
	Dataset(#[from] quill_dataset::Error),
	#[error(transparent)]
	Io(#[from] std::io::Error),
}
impl Error {
	/// Classification of the remote failure behind this error, if any.
	pub fn remote_class(&self) -> Option<ErrorClass> {
		match self {
			Self::Remote { source, .. } => Some(source.class()),
			_ => None,
		}
	}
}
