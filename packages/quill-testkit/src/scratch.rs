use std::{
	env, fs,
	path::{Path, PathBuf},
};

use uuid::Uuid;

use crate::Result;

/// A unique directory under the system temp dir, removed on drop.
pub struct ScratchDir {
	path: PathBuf,
}
impl ScratchDir {
	pub fn new(prefix: &str) -> Result<Self> {
		let path = env::temp_dir().join(format!("{prefix}_{}", Uuid::new_v4().simple()));

		fs::create_dir_all(&path)?;

		Ok(Self { path })
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn write(&self, relative: impl AsRef<Path>, contents: &str) -> Result<PathBuf> {
		let path = self.path.join(relative);

		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)?;
		}

		fs::write(&path, contents)?;

		Ok(path)
	}
}
impl Drop for ScratchDir {
	fn drop(&mut self) {
		if let Err(err) = fs::remove_dir_all(&self.path) {
			eprintln!("Failed to remove scratch dir {}: {err}.", self.path.display());
		}
	}
}
