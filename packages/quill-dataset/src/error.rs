pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Dataset line {line} is not valid JSON.")]
	ParseLine { line: usize, source: serde_json::Error },
	#[error("Dataset line {line} is not a training example: {message}")]
	InvalidExample { line: usize, message: String },
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error(transparent)]
	Io(#[from] std::io::Error),
}
