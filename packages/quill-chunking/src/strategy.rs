use std::{fmt, str::FromStr};

use crate::Error;

/// How a manuscript is cut into training material.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChunkStrategy {
	/// About three windows per chapter, paired with their successors.
	SlidingWindowSmall,
	/// Fixed 4096-token windows per chapter, paired with their successors.
	SlidingWindowLarge,
	/// Prose and dialogue runs, each with a sentence-count instruction.
	DialogueProse,
	/// Whole chapters, each with generated scene beats as the instruction.
	GenerateBeats,
}
impl ChunkStrategy {
	pub const ALL: [Self; 4] = [
		Self::SlidingWindowSmall,
		Self::SlidingWindowLarge,
		Self::DialogueProse,
		Self::GenerateBeats,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::SlidingWindowSmall => "sliding_window_small",
			Self::SlidingWindowLarge => "sliding_window_large",
			Self::DialogueProse => "dialogue_prose",
			Self::GenerateBeats => "generate_beats",
		}
	}
}

impl fmt::Display for ChunkStrategy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ChunkStrategy {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		let tag = raw.trim();

		Self::ALL
			.into_iter()
			.find(|strategy| strategy.as_str().eq_ignore_ascii_case(tag))
			.ok_or_else(|| Error::UnknownStrategy(raw.to_string()))
	}
}
