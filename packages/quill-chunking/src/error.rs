pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Tokenizer failed to {op}: {message}")]
	Codec { op: &'static str, message: String },
	#[error("Tokenizer has no single-token paragraph ending; configure boundary ids explicitly.")]
	NoBoundaryTokens,
	#[error("Unknown chunk strategy {0:?}.")]
	UnknownStrategy(String),
}
