use std::{fs, io::Write, path::Path};

use crate::{Error, Result, TrainingExample};

/// Ordered, append-only collection of training examples.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Dataset {
	examples: Vec<TrainingExample>,
}
impl Dataset {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&mut self, example: TrainingExample) {
		self.examples.push(example);
	}

	pub fn extend(&mut self, examples: impl IntoIterator<Item = TrainingExample>) {
		self.examples.extend(examples);
	}

	pub fn examples(&self) -> &[TrainingExample] {
		&self.examples
	}

	pub fn len(&self) -> usize {
		self.examples.len()
	}

	pub fn is_empty(&self) -> bool {
		self.examples.is_empty()
	}

	pub fn to_jsonl(&self) -> Result<String> {
		let mut out = String::new();

		for example in &self.examples {
			out.push_str(&serde_json::to_string(example)?);
			out.push('\n');
		}

		Ok(out)
	}

	/// Parses JSONL text, skipping blank lines. Line numbers in errors are one-based.
	pub fn from_jsonl(raw: &str) -> Result<Self> {
		let mut dataset = Self::new();

		for (idx, line) in raw.lines().enumerate() {
			if line.trim().is_empty() {
				continue;
			}

			let value: serde_json::Value = serde_json::from_str(line)
				.map_err(|err| Error::ParseLine { line: idx + 1, source: err })?;
			let example = serde_json::from_value(value)
				.map_err(|err| Error::InvalidExample { line: idx + 1, message: err.to_string() })?;

			dataset.push(example);
		}

		Ok(dataset)
	}

	pub fn write_jsonl(&self, path: &Path) -> Result<()> {
		let mut file = fs::File::create(path)?;

		file.write_all(self.to_jsonl()?.as_bytes())?;
		file.flush()?;

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn serializes_one_object_per_line_in_order() {
		let mut dataset = Dataset::new();

		dataset.push(TrainingExample::new("sys", "A", "B"));
		dataset.push(TrainingExample::new("sys", "B", "C"));

		let jsonl = dataset.to_jsonl().unwrap();
		let lines: Vec<&str> = jsonl.lines().collect();

		assert_eq!(lines.len(), 2);
		assert_eq!(
			lines[0],
			r#"{"messages":[{"role":"system","content":"sys"},{"role":"user","content":"A"},{"role":"assistant","content":"B"}]}"#
		);
		assert!(lines[1].contains(r#"{"role":"user","content":"B"}"#));
		assert!(jsonl.ends_with('\n'));
	}

	#[test]
	fn parses_pre_formatted_lines() {
		let raw = concat!(
			r#"{"messages":[{"role":"system","content":"s"},{"role":"user","content":"u"},{"role":"assistant","content":"a"}]}"#,
			"\n\n"
		);
		let dataset = Dataset::from_jsonl(raw).unwrap();

		assert_eq!(dataset.examples(), &[TrainingExample::new("s", "u", "a")]);
	}

	#[test]
	fn rejects_out_of_order_roles_with_line_number() {
		let raw = concat!(
			r#"{"messages":[{"role":"system","content":"s"},{"role":"user","content":"u"},{"role":"assistant","content":"a"}]}"#,
			"\n",
			r#"{"messages":[{"role":"user","content":"u"},{"role":"assistant","content":"a"}]}"#,
		);
		let err = Dataset::from_jsonl(raw).unwrap_err();

		assert!(matches!(err, Error::InvalidExample { line: 2, .. }), "Unexpected error: {err}");
	}

	#[test]
	fn rejects_broken_json() {
		let err = Dataset::from_jsonl("{not json").unwrap_err();

		assert!(matches!(err, Error::ParseLine { line: 1, .. }));
	}
}
