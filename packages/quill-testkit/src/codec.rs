use quill_chunking::{Error, Result, TokenCodec};

/// One token per Unicode scalar value, so counts and boundaries are easy to reason about.
///
/// A newline is token `10`, which makes it the only single-token paragraph ending.
#[derive(Clone, Copy, Debug, Default)]
pub struct CharCodec;
impl TokenCodec for CharCodec {
	fn encode(&self, text: &str) -> Result<Vec<u32>> {
		Ok(text.chars().map(u32::from).collect())
	}

	fn decode(&self, ids: &[u32]) -> Result<String> {
		ids.iter()
			.map(|id| {
				char::from_u32(*id).ok_or_else(|| Error::Codec {
					op: "decode",
					message: format!("{id} is not a scalar value."),
				})
			})
			.collect()
	}
}
