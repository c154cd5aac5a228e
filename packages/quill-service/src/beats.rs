use quill_chunking::{Chunk, InstructedChunk, TokenCodec};
use quill_config::CompletionProviderConfig;

use crate::{Result, RetryPolicy, TextGenerator};

pub const BEAT_SYSTEM_PROMPT: &str = "You are an expert developmental editor who specializes in writing scene beats that are clear and concise. For the following chapter, please reverse engineer the scene beats for the author. Provide only the beats and not any commentary at the beginning or end.";

/// Turns chapters into training chunks whose instruction carries model-written scene beats.
pub struct BeatGenerator<'a> {
	generator: &'a dyn TextGenerator,
	cfg: &'a CompletionProviderConfig,
	retry: &'a RetryPolicy,
	codec: &'a dyn TokenCodec,
}
impl<'a> BeatGenerator<'a> {
	pub fn new(
		generator: &'a dyn TextGenerator,
		cfg: &'a CompletionProviderConfig,
		retry: &'a RetryPolicy,
		codec: &'a dyn TokenCodec,
	) -> Self {
		Self { generator, cfg, retry, codec }
	}

	/// One chunk per non-blank chapter, in order.
	pub async fn generate(&self, chapters: &[&str]) -> Result<Vec<InstructedChunk>> {
		let mut out = Vec::with_capacity(chapters.len());

		for (index, chapter) in chapters.iter().enumerate() {
			if chapter.trim().is_empty() {
				continue;
			}

			let beats = self.beats_for(chapter).await?;
			let words = chapter.split_whitespace().count();
			let token_count = self.codec.count(chapter)?.len();

			tracing::debug!(chapter = index, words, token_count, "Generated scene beats.");

			out.push(InstructedChunk {
				chunk: Chunk { text: chapter.to_string(), token_count },
				instruction: beat_instruction(words, &beats),
			});
		}

		Ok(out)
	}

	async fn beats_for(&self, chapter: &str) -> Result<String> {
		let generator = self.generator;
		let cfg = self.cfg;
		let prompt = format!("Chapter: {chapter}");
		let prompt = prompt.as_str();

		self.retry
			.run("complete", move || generator.complete(cfg, BEAT_SYSTEM_PROMPT, prompt))
			.await
	}
}

pub(crate) fn beat_instruction(words: usize, beats: &str) -> String {
	format!("Write {words} words for a chapter with the following scene beats:\n{beats}")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn instruction_names_word_count_and_beats() {
		assert_eq!(
			beat_instruction(1200, "1. Ana leaves home."),
			"Write 1200 words for a chapter with the following scene beats:\n1. Ana leaves home."
		);
	}
}
