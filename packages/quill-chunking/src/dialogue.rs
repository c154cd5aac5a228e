use crate::{Chunk, Result, TokenCodec};

const TERMINAL_PUNCTUATION: [char; 3] = ['.', '?', '!'];

/// A chunk paired with the instruction that asks a model to write it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstructedChunk {
	pub chunk: Chunk,
	pub instruction: String,
}

/// Narrative and quoted text separated out of one paragraph.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParagraphSplit {
	pub prose: String,
	pub dialogue: String,
}

#[derive(Default)]
struct SentenceScanner {
	buffer: String,
	quotes: usize,
	in_dialogue: bool,
	// Quotation state captured at the terminal mark of a sentence awaiting confirmation.
	pending_end: Option<bool>,
	prose: Vec<String>,
	dialogue: Vec<String>,
}
impl SentenceScanner {
	fn scan(mut self, paragraph: &str) -> ParagraphSplit {
		let mut chars = paragraph.chars().peekable();

		while let Some(ch) = chars.next() {
			let is_last = chars.peek().is_none();

			if let Some(was_dialogue) = self.pending_end {
				if TERMINAL_PUNCTUATION.contains(&ch) {
					self.buffer.push(ch);

					if is_last {
						self.finish(was_dialogue);
					}

					continue;
				}

				self.pending_end = None;

				if ch == '"' {
					self.buffer.push(ch);
					self.toggle_quote();
					self.finish(was_dialogue);

					continue;
				}

				self.finish(was_dialogue);
			}

			self.buffer.push(ch);

			if ch == '"' {
				self.toggle_quote();
			} else if TERMINAL_PUNCTUATION.contains(&ch) {
				if is_last {
					self.finish(self.in_dialogue);
				} else {
					self.pending_end = Some(self.in_dialogue);
				}
			}
		}

		if !self.buffer.trim().is_empty() {
			tracing::trace!(fragment = %self.buffer.trim(), "Dropping unterminated sentence fragment.");
		}

		ParagraphSplit { prose: self.prose.join(" "), dialogue: self.dialogue.join(" ") }
	}

	fn toggle_quote(&mut self) {
		self.quotes += 1;
		self.in_dialogue = self.quotes % 2 == 1;
	}

	fn finish(&mut self, dialogue: bool) {
		self.pending_end = None;

		let sentence = self.buffer.trim();

		if !sentence.is_empty() {
			let target = if dialogue { &mut self.dialogue } else { &mut self.prose };

			target.push(sentence.to_string());
		}

		self.buffer.clear();
	}
}

/// Separates a paragraph into narrative prose and quoted dialogue, sentence by sentence.
///
/// A sentence belongs to dialogue when its terminal mark falls inside a quotation. Text after the
/// last terminal mark is not part of any sentence and is dropped.
pub fn split_paragraph(paragraph: &str) -> ParagraphSplit {
	SentenceScanner::default().scan(paragraph)
}

pub fn count_sentences(text: &str) -> usize {
	text.chars().filter(|ch| TERMINAL_PUNCTUATION.contains(ch)).count()
}

/// Builds one instructed chunk per non-empty prose run and per non-empty dialogue run, paragraph
/// by paragraph.
///
/// Each instruction carries the number of terminal marks seen so far in its category across the
/// whole chapter, not only in the run it pairs with.
pub fn dialogue_prose_chunks(
	chapter: &str,
	codec: &dyn TokenCodec,
) -> Result<Vec<InstructedChunk>> {
	let mut out = Vec::new();
	let mut prose_sentences = 0;
	let mut dialogue_sentences = 0;

	for paragraph in chapter.split('\n') {
		let split = split_paragraph(paragraph);

		prose_sentences += count_sentences(&split.prose);
		dialogue_sentences += count_sentences(&split.dialogue);

		let runs = [
			(split.prose, prose_sentences, "description and action"),
			(split.dialogue, dialogue_sentences, "dialogue"),
		];

		for (text, sentences, kind) in runs {
			if text.is_empty() {
				continue;
			}

			let instruction = sentence_instruction(sentences, kind);
			let token_count = codec.count(&text)?.len();

			out.push(InstructedChunk { chunk: Chunk { text, token_count }, instruction });
		}
	}

	Ok(out)
}

fn sentence_instruction(count: usize, kind: &str) -> String {
	let noun = if count == 1 { "sentence" } else { "sentences" };

	format!("Write {count} {noun} of {kind}")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn separates_quoted_sentence_from_narration() {
		let split = split_paragraph(r#"He said, "Hello there." She smiled."#);

		assert_eq!(split.dialogue, r#"He said, "Hello there.""#);
		assert_eq!(split.prose, "She smiled.");
		assert_eq!(count_sentences(&split.dialogue), 1);
		assert_eq!(count_sentences(&split.prose), 1);
	}

	#[test]
	fn closing_quote_after_question_stays_with_dialogue() {
		let split = split_paragraph(r#""Where are you?" he asked. The door creaked."#);

		assert_eq!(split.dialogue, r#""Where are you?""#);
		assert_eq!(split.prose, "he asked. The door creaked.");
	}

	#[test]
	fn ellipsis_is_one_sentence_end() {
		let split = split_paragraph("She waited... Nothing came!");

		assert_eq!(split.prose, "She waited... Nothing came!");
		assert!(split.dialogue.is_empty());
	}

	#[test]
	fn unterminated_fragment_is_dropped() {
		let split = split_paragraph("Chapter One");

		assert_eq!(split, ParagraphSplit::default());
	}

	#[test]
	fn instruction_agrees_with_count() {
		assert_eq!(sentence_instruction(1, "dialogue"), "Write 1 sentence of dialogue");
		assert_eq!(
			sentence_instruction(3, "description and action"),
			"Write 3 sentences of description and action"
		);
	}
}
