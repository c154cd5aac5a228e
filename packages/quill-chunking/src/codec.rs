use tokenizers::Tokenizer;

use crate::{Error, Result};

/// Encodes text into token ids and back.
///
/// Implementations must round-trip: `decode(encode(text)) == text` for any UTF-8 input.
pub trait TokenCodec
where
	Self: Send + Sync,
{
	fn encode(&self, text: &str) -> Result<Vec<u32>>;

	fn decode(&self, ids: &[u32]) -> Result<String>;

	fn count(&self, text: &str) -> Result<TokenSequence> {
		Ok(TokenSequence { ids: self.encode(text)? })
	}
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenSequence {
	ids: Vec<u32>,
}
impl TokenSequence {
	pub fn ids(&self) -> &[u32] {
		&self.ids
	}

	pub fn len(&self) -> usize {
		self.ids.len()
	}

	pub fn is_empty(&self) -> bool {
		self.ids.is_empty()
	}
}

/// Codec backed by a Hugging Face tokenizer.
pub struct HfCodec {
	tokenizer: Tokenizer,
}
impl HfCodec {
	pub fn new(tokenizer: Tokenizer) -> Self {
		Self { tokenizer }
	}

	pub fn from_pretrained(repo: &str) -> Result<Self> {
		let tokenizer = Tokenizer::from_pretrained(repo, None)
			.map_err(|err| Error::Codec { op: "load", message: err.to_string() })?;

		Ok(Self::new(tokenizer))
	}
}

impl TokenCodec for HfCodec {
	fn encode(&self, text: &str) -> Result<Vec<u32>> {
		let encoding = self
			.tokenizer
			.encode(text, false)
			.map_err(|err| Error::Codec { op: "encode", message: err.to_string() })?;

		Ok(encoding.get_ids().to_vec())
	}

	fn decode(&self, ids: &[u32]) -> Result<String> {
		self.tokenizer
			.decode(ids, false)
			.map_err(|err| Error::Codec { op: "decode", message: err.to_string() })
	}
}
