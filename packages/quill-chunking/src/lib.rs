mod boundary;
mod chapters;
mod codec;
mod dialogue;
mod error;
mod strategy;
mod window;

pub use boundary::{BoundaryAligner, PARAGRAPH_END_MARKERS};
pub use chapters::split_chapters;
pub use codec::{HfCodec, TokenCodec, TokenSequence};
pub use dialogue::{
	InstructedChunk, ParagraphSplit, count_sentences, dialogue_prose_chunks, split_paragraph,
};
pub use error::{Error, Result};
pub use strategy::ChunkStrategy;
pub use tokenizers::Tokenizer;
pub use window::{Chunk, SlidingWindowChunker, window_bounds};
