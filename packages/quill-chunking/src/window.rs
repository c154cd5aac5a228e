use crate::{BoundaryAligner, Result, TokenCodec};

/// A span of text together with its length in tokens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
	pub text: String,
	pub token_count: usize,
}

/// Token windows over a manuscript, with window ends pulled back to paragraph boundaries.
pub struct SlidingWindowChunker<'a> {
	codec: &'a dyn TokenCodec,
	aligner: &'a BoundaryAligner,
	max_chunk_tokens: usize,
	windows_per_chapter: usize,
}
impl<'a> SlidingWindowChunker<'a> {
	pub fn new(
		codec: &'a dyn TokenCodec,
		aligner: &'a BoundaryAligner,
		max_chunk_tokens: usize,
		windows_per_chapter: usize,
	) -> Self {
		Self {
			codec,
			aligner,
			max_chunk_tokens: max_chunk_tokens.max(1),
			windows_per_chapter: windows_per_chapter.max(1),
		}
	}

	/// Fixed-size windows of `max_chunk_tokens` over the whole text.
	pub fn book_chunks(&self, text: &str) -> Result<Vec<Chunk>> {
		let tokens = self.codec.count(text)?;

		self.decode_windows(tokens.ids(), self.max_chunk_tokens)
	}

	/// Roughly `windows_per_chapter` windows per chapter, each capped at `max_chunk_tokens`.
	pub fn chapter_chunks(&self, chapter: &str) -> Result<Vec<Chunk>> {
		let tokens = self.codec.count(chapter)?;
		let chunk_size = self.chapter_chunk_size(tokens.len());

		self.decode_windows(tokens.ids(), chunk_size)
	}

	pub fn chapter_chunk_size(&self, token_count: usize) -> usize {
		token_count.div_ceil(self.windows_per_chapter).min(self.max_chunk_tokens)
	}

	fn decode_windows(&self, tokens: &[u32], chunk_size: usize) -> Result<Vec<Chunk>> {
		let mut chunks = Vec::new();

		for (start, end) in window_bounds(tokens, chunk_size, self.aligner) {
			let slice = &tokens[start..end];

			chunks.push(Chunk { text: self.codec.decode(slice)?, token_count: slice.len() });
		}

		Ok(chunks)
	}
}

/// Computes `[start, end)` windows covering `tokens` without gaps or overlap.
///
/// A window end short of the sequence end is aligned to a paragraph boundary. Alignment that
/// would not move past `start` is discarded so every window makes progress.
pub fn window_bounds(
	tokens: &[u32],
	chunk_size: usize,
	aligner: &BoundaryAligner,
) -> Vec<(usize, usize)> {
	let total = tokens.len();
	let mut bounds = Vec::new();

	if chunk_size == 0 {
		return bounds;
	}

	let mut start = 0_usize;

	while start < total {
		let mut end = start.saturating_add(chunk_size).min(total);

		if end < total {
			let aligned = aligner.align(tokens, end);

			if aligned > start {
				end = aligned;
			} else {
				tracing::trace!(start, end, "No paragraph boundary inside window.");
			}
		}

		bounds.push((start, end));

		start = end;
	}

	bounds
}
