use quill_chunking::{Chunk, InstructedChunk};

use crate::TrainingExample;

/// One example per chunk: the instruction is the user turn and the chunk is the reply.
pub fn instruction_pairs(system: &str, chunks: &[InstructedChunk]) -> Vec<TrainingExample> {
	chunks
		.iter()
		.map(|item| {
			TrainingExample::new(system, item.instruction.as_str(), item.chunk.text.as_str())
		})
		.collect()
}

/// Pairs each chunk with its successor, giving `n - 1` examples for `n` chunks.
pub fn sliding_pairs(system: &str, chunks: &[Chunk]) -> Vec<TrainingExample> {
	chunks
		.windows(2)
		.map(|pair| TrainingExample::new(system, pair[0].text.as_str(), pair[1].text.as_str()))
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn chunk(text: &str) -> Chunk {
		Chunk { text: text.to_string(), token_count: text.len() }
	}

	#[test]
	fn sliding_pairs_use_each_successor_once() {
		let examples = sliding_pairs("sys", &[chunk("A"), chunk("B"), chunk("C")]);

		assert_eq!(
			examples,
			vec![TrainingExample::new("sys", "A", "B"), TrainingExample::new("sys", "B", "C")]
		);
	}

	#[test]
	fn sliding_pairs_need_two_chunks() {
		assert!(sliding_pairs("sys", &[]).is_empty());
		assert!(sliding_pairs("sys", &[chunk("only")]).is_empty());
	}

	#[test]
	fn instruction_pairs_put_chunk_in_assistant_turn() {
		let item = InstructedChunk {
			chunk: chunk("She smiled."),
			instruction: "Write 1 sentence of description and action".to_string(),
		};
		let examples = instruction_pairs("sys", &[item]);

		assert_eq!(examples.len(), 1);
		assert_eq!(examples[0].user(), "Write 1 sentence of description and action");
		assert_eq!(examples[0].assistant(), "She smiled.");
	}
}
