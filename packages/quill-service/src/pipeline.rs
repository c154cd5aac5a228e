//! Job folders, dataset preparation, and background submission.

use std::{
	fs,
	path::{Path, PathBuf},
	sync::Arc,
};

use tokio::task::JoinHandle;
use uuid::Uuid;

use quill_chunking::{
	BoundaryAligner, ChunkStrategy, SlidingWindowChunker, TokenCodec, dialogue_prose_chunks,
	split_chapters,
};
use quill_config::{Config, FineTuneProviderConfig};
use quill_dataset::{
	DATASET_FILE_NAME, Dataset, TrainingExample, instruction_pairs, sliding_pairs,
};

use crate::{
	BeatGenerator, Error, FineTuneOrchestrator, Job, OrchestratorSettings, Providers, Result,
	RetryPolicy, StatusLease, StatusStore,
};

/// Window size used by [`ChunkStrategy::SlidingWindowLarge`], before boundary alignment.
const LARGE_WINDOW_TOKENS: usize = 4_096;

/// A leased folder under the upload root that holds one job's input files.
#[derive(Debug)]
pub struct JobWorkspace {
	path: PathBuf,
	lease: StatusLease,
}
impl JobWorkspace {
	pub fn id(&self) -> &str {
		self.lease.job_id()
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

#[derive(Clone, Debug)]
pub struct SubmitRequest {
	pub system_message: String,
	pub strategy: ChunkStrategy,
	/// Base model to train. Falls back to the configured model.
	pub model: Option<String>,
	/// Key used for this job only. Falls back to the configured key.
	pub api_key: Option<String>,
}

#[derive(Clone, Debug)]
pub struct JobReport {
	pub job: Job,
	pub fine_tuned_model: String,
	pub dataset_path: PathBuf,
}

#[derive(Clone)]
pub struct FinetuneService {
	cfg: Arc<Config>,
	codec: Arc<dyn TokenCodec>,
	aligner: Arc<BoundaryAligner>,
	providers: Providers,
	status: StatusStore,
	retry: RetryPolicy,
}
impl FinetuneService {
	/// Uses the configured boundary ids, or derives them from `codec` when none are set.
	pub fn new(cfg: Config, codec: Arc<dyn TokenCodec>, providers: Providers) -> Result<Self> {
		let aligner = match &cfg.chunking.boundary_token_ids {
			Some(ids) => BoundaryAligner::new(ids.iter().copied()),
			None => BoundaryAligner::from_codec(codec.as_ref())?,
		};
		let retry = RetryPolicy::from_config(&cfg.retry);

		Ok(Self {
			cfg: Arc::new(cfg),
			codec,
			aligner: Arc::new(aligner),
			providers,
			status: StatusStore::new(),
			retry,
		})
	}

	pub fn config(&self) -> &Config {
		&self.cfg
	}

	pub fn status_store(&self) -> &StatusStore {
		&self.status
	}

	pub fn status(&self, job_id: &str) -> Result<String> {
		self.status.get(job_id)
	}

	/// Creates a fresh job folder under the upload root and leases its id.
	pub fn create_workspace(&self) -> Result<JobWorkspace> {
		let root = &self.cfg.service.upload_root;
		let job_id = Uuid::new_v4().simple().to_string();
		let lease = self.status.lease(&job_id)?;
		let path = root.join(&job_id);

		fs::create_dir_all(root)?;
		fs::create_dir(&path)?;
		tracing::debug!(job_id = %job_id, path = %path.display(), "Created job workspace.");

		Ok(JobWorkspace { path, lease })
	}

	/// Builds training examples from one manuscript.
	pub async fn build_examples(
		&self,
		text: &str,
		strategy: ChunkStrategy,
		system: &str,
	) -> Result<Vec<TrainingExample>> {
		let chapters = split_chapters(text)
			.into_iter()
			.filter(|chapter| !chapter.trim().is_empty())
			.collect::<Vec<_>>();
		let codec = self.codec.as_ref();
		let chunking = &self.cfg.chunking;

		let examples = match strategy {
			ChunkStrategy::SlidingWindowSmall | ChunkStrategy::SlidingWindowLarge => {
				let chunker = SlidingWindowChunker::new(
					codec,
					&self.aligner,
					chunking.max_chunk_tokens as usize,
					chunking.windows_per_chapter as usize,
				);
				let large = SlidingWindowChunker::new(codec, &self.aligner, LARGE_WINDOW_TOKENS, 1);
				let mut chunks = Vec::new();

				for chapter in &chapters {
					if strategy == ChunkStrategy::SlidingWindowLarge {
						chunks.extend(large.book_chunks(chapter)?);
					} else {
						chunks.extend(chunker.chapter_chunks(chapter)?);
					}
				}

				sliding_pairs(system, &chunks)
			},
			ChunkStrategy::DialogueProse => {
				let mut chunks = Vec::new();

				for chapter in &chapters {
					chunks.extend(dialogue_prose_chunks(chapter, codec)?);
				}

				instruction_pairs(system, &chunks)
			},
			ChunkStrategy::GenerateBeats => {
				let generator = BeatGenerator::new(
					self.providers.text.as_ref(),
					&self.cfg.providers.beats,
					&self.retry,
					codec,
				);

				instruction_pairs(system, &generator.generate(&chapters).await?)
			},
		};

		tracing::debug!(
			strategy = strategy.as_str(),
			chapters = chapters.len(),
			examples = examples.len(),
			"Built training examples."
		);

		Ok(examples)
	}

	/// Turns every manuscript and dataset file in the workspace into `fine_tune.jsonl`.
	///
	/// `.txt` files are chunked with `strategy`. `.jsonl` files are taken as already formatted.
	/// Files are handled in name order and each one appends a progress line to the status.
	pub async fn prepare_dataset(
		&self,
		workspace: &JobWorkspace,
		system: &str,
		strategy: ChunkStrategy,
	) -> Result<PathBuf> {
		let job_id = workspace.id();
		let inputs = input_files(workspace.path())?;

		if inputs.is_empty() {
			return Err(Error::EmptyWorkspace { path: workspace.path().to_path_buf() });
		}

		self.status.set(job_id, "Preparing dataset");

		let mut dataset = Dataset::new();

		for input in &inputs {
			let raw = tokio::fs::read_to_string(input).await?;
			let name = input
				.file_name()
				.map(|name| name.to_string_lossy().into_owned())
				.unwrap_or_default();

			if is_jsonl(input) {
				dataset.extend(Dataset::from_jsonl(&raw)?.examples().iter().cloned());
			} else {
				dataset.extend(self.build_examples(&raw, strategy, system).await?);
			}

			self.status.append(job_id, &format!("<p>{name} processed</p>"));
			tracing::info!(job_id, file = %name, examples = dataset.len(), "Processed input file.");
		}

		if dataset.is_empty() {
			return Err(Error::EmptyDataset { job_id: job_id.to_string() });
		}

		let path = workspace.path().join(DATASET_FILE_NAME);

		dataset.write_jsonl(&path)?;
		self.status.set(job_id, "All files processed");

		Ok(path)
	}

	/// Prepares the dataset and runs fine-tuning on a background task.
	///
	/// The workspace lease is held until the task ends.
	pub fn submit(
		&self,
		workspace: JobWorkspace,
		request: SubmitRequest,
	) -> JoinHandle<Result<JobReport>> {
		let service = self.clone();

		tracing::info!(job_id = %workspace.id(), strategy = %request.strategy, "Job submitted.");

		tokio::spawn(async move { service.run_job(workspace, request).await })
	}

	pub async fn run_job(
		&self,
		workspace: JobWorkspace,
		request: SubmitRequest,
	) -> Result<JobReport> {
		let mut job = Job::new(workspace.id());
		let orchestrator = FineTuneOrchestrator::new(
			self.providers.finetune.clone(),
			self.providers.notifier.clone(),
			self.status.clone(),
			self.retry,
			OrchestratorSettings::from_config(&self.cfg),
		);
		let prepared =
			self.prepare_dataset(&workspace, &request.system_message, request.strategy).await;
		let dataset_path = match prepared {
			Ok(path) => path,
			Err(err) => return Err(orchestrator.record_failure(&mut job, &err)),
		};
		let bytes = match tokio::fs::read(&dataset_path).await {
			Ok(bytes) => bytes,
			Err(err) => return Err(orchestrator.record_failure(&mut job, &Error::Io(err))),
		};
		let cfg = self.finetune_config(request.api_key.as_deref());
		let model = request.model.as_deref().unwrap_or(&cfg.model);
		let fine_tuned_model = orchestrator.run(&mut job, &cfg, model, &bytes).await?;

		drop(workspace);

		Ok(JobReport { job, fine_tuned_model, dataset_path })
	}

	fn finetune_config(&self, api_key: Option<&str>) -> FineTuneProviderConfig {
		let mut cfg = self.cfg.providers.finetune.clone();

		if let Some(key) = api_key.map(str::trim).filter(|key| !key.is_empty()) {
			cfg.api_key = key.to_string();
		}

		cfg
	}
}

fn input_files(dir: &Path) -> Result<Vec<PathBuf>> {
	let mut files = Vec::new();

	for entry in fs::read_dir(dir)? {
		let path = entry?.path();
		let is_output = path.file_name().is_some_and(|name| name == DATASET_FILE_NAME);

		if path.is_file() && !is_output && (is_jsonl(&path) || has_extension(&path, "txt")) {
			files.push(path);
		}
	}

	files.sort();

	Ok(files)
}

fn is_jsonl(path: &Path) -> bool {
	has_extension(path, "jsonl")
}

fn has_extension(path: &Path, ext: &str) -> bool {
	path.extension().is_some_and(|found| found.eq_ignore_ascii_case(ext))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::FailureReason;

	#[test]
	fn failure_reason_for_preparation_errors() {
		let reason = FailureReason::from_error(&Error::EmptyDataset { job_id: "job".to_string() });

		assert!(matches!(reason, FailureReason::Preparation { .. }));
		assert!(!reason.needs_admin());
	}
}
