use std::sync::LazyLock;

use regex::Regex;

static CHAPTER_MARKER: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"\s*\*\*\s*").expect("Chapter marker pattern must compile.")
});

/// Splits a manuscript on `**` chapter markers, consuming the whitespace around each marker.
///
/// Always returns `markers + 1` segments. Leading, trailing, and back-to-back markers produce
/// empty chapters; callers decide whether to skip them.
pub fn split_chapters(text: &str) -> Vec<&str> {
	CHAPTER_MARKER.split(text).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn splits_on_marker_and_trims_surrounding_whitespace() {
		let chapters = split_chapters("Ch1 text **\nCh2 text");

		assert_eq!(chapters, vec!["Ch1 text", "Ch2 text"]);
	}

	#[test]
	fn returns_one_more_segment_than_markers() {
		for (text, markers) in [
			("no markers here", 0),
			("a ** b ** c", 2),
			("**leading", 1),
			("trailing **", 1),
			("a ****b", 2),
			("", 0),
		] {
			assert_eq!(split_chapters(text).len(), markers + 1, "text: {text:?}");
		}
	}

	#[test]
	fn keeps_empty_edge_chapters() {
		let chapters = split_chapters("** middle **");

		assert_eq!(chapters, vec!["", "middle", ""]);
	}
}
