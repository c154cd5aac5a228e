use std::collections::HashSet;

use crate::{Error, Result, TokenCodec};

/// Text fragments that end a paragraph. Each one that the codec maps to a single token id joins
/// the boundary set.
pub const PARAGRAPH_END_MARKERS: [&str; 16] = [
	"\n", "\n\n", "\n\n\n", ".\n", "?\n", "!\n", ":\n", "\"\n", ".\"\n", "?\"\n", "!\"\n", ".\n\n",
	"?\n\n", "!\n\n", "\"\n\n", ".\"\n\n",
];

#[derive(Clone, Debug)]
pub struct BoundaryAligner {
	ids: HashSet<u32>,
}
impl BoundaryAligner {
	pub fn new(ids: impl IntoIterator<Item = u32>) -> Self {
		Self { ids: ids.into_iter().collect() }
	}

	pub fn from_codec(codec: &dyn TokenCodec) -> Result<Self> {
		let mut ids = HashSet::new();

		for marker in PARAGRAPH_END_MARKERS {
			if let [id] = codec.encode(marker)?.as_slice() {
				ids.insert(*id);
			}
		}

		if ids.is_empty() {
			return Err(Error::NoBoundaryTokens);
		}

		tracing::debug!(count = ids.len(), "Derived paragraph boundary token ids.");

		Ok(Self { ids })
	}

	pub fn is_boundary(&self, id: u32) -> bool {
		self.ids.contains(&id)
	}

	/// Walks `end` back until the token before it ends a paragraph, stopping at zero.
	pub fn align(&self, tokens: &[u32], end: usize) -> usize {
		let mut end = end.min(tokens.len());

		while end > 0 && !self.is_boundary(tokens[end - 1]) {
			end -= 1;
		}

		end
	}
}
