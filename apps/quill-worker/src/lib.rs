use std::{fs, path::PathBuf, sync::Arc, time::Duration};

use clap::{
	Parser,
	builder::{Styles, styling::AnsiColor},
};
use color_eyre::eyre;
use tracing_subscriber::EnvFilter;

use quill_chunking::{ChunkStrategy, HfCodec, TokenCodec};
use quill_service::{FinetuneService, JobWorkspace, Providers, SubmitRequest, run_sweeper};

/// cl100k-compatible tokenizer used when the config names none.
const DEFAULT_TOKENIZER_REPO: &str = "Xenova/gpt-4";

const VERSION: &str = concat!(
	env!("CARGO_PKG_VERSION"),
	"-",
	env!("VERGEN_GIT_SHA"),
	"-",
	env!("VERGEN_CARGO_TARGET_TRIPLE"),
);
const STYLES: Styles = Styles::styled()
	.header(AnsiColor::Yellow.on_default().bold())
	.usage(AnsiColor::Yellow.on_default().bold())
	.literal(AnsiColor::Cyan.on_default().bold())
	.placeholder(AnsiColor::Green.on_default())
	.error(AnsiColor::Red.on_default().bold())
	.invalid(AnsiColor::Red.on_default());

#[derive(Debug, Parser)]
#[command(
	version = VERSION,
	rename_all = "kebab",
	styles = STYLES,
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
	/// Build the training dataset without contacting the fine-tuning API.
	Prepare(PrepareArgs),
	/// Build the dataset and run a fine-tuning job to completion.
	Train(TrainArgs),
}

#[derive(Debug, clap::Args)]
pub struct JobArgs {
	/// One of sliding_window_small, sliding_window_large, dialogue_prose, generate_beats.
	#[arg(long, short = 's', default_value = "sliding_window_small")]
	pub strategy: ChunkStrategy,
	/// System message placed in every training example.
	#[arg(long)]
	pub system: String,
	/// Manuscripts (.txt) and ready-made datasets (.jsonl).
	#[arg(required = true, value_name = "FILE")]
	pub inputs: Vec<PathBuf>,
}

#[derive(Debug, clap::Args)]
pub struct PrepareArgs {
	#[command(flatten)]
	pub job: JobArgs,
	#[arg(long, short = 'o', value_name = "FILE")]
	pub out: PathBuf,
}

#[derive(Debug, clap::Args)]
pub struct TrainArgs {
	#[command(flatten)]
	pub job: JobArgs,
	/// Base model to fine-tune instead of the configured one.
	#[arg(long)]
	pub model: Option<String>,
	/// API key for this job instead of the configured one.
	#[arg(long)]
	pub api_key: Option<String>,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = quill_config::load(&args.config)?;

	init_tracing(&config)?;

	let codec = load_codec(&config)?;
	let service = FinetuneService::new(config, codec, Providers::default())?;

	match args.command {
		Command::Prepare(prepare_args) => prepare(&service, prepare_args).await,
		Command::Train(train_args) => train(&service, train_args).await,
	}
}

fn init_tracing(config: &quill_config::Config) -> color_eyre::Result<()> {
	let from_env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
	let directives = filter_directives(from_env, &config.service.log_level);
	let filter = EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();

	Ok(())
}

/// `RUST_LOG` wins over the configured level when it holds any directive.
fn filter_directives(from_env: Option<String>, log_level: &str) -> String {
	match from_env {
		Some(directives) if !directives.trim().is_empty() => directives,
		_ => log_level.to_string(),
	}
}

fn load_codec(config: &quill_config::Config) -> color_eyre::Result<Arc<dyn TokenCodec>> {
	let repo = config.chunking.tokenizer_repo.as_deref().unwrap_or(DEFAULT_TOKENIZER_REPO);
	let codec = HfCodec::from_pretrained(repo)?;

	tracing::info!(repo, "Tokenizer loaded.");

	Ok(Arc::new(codec))
}

async fn prepare(service: &FinetuneService, args: PrepareArgs) -> color_eyre::Result<()> {
	let workspace = service.create_workspace()?;

	stage_inputs(&workspace, &args.job.inputs)?;

	let prepared =
		service.prepare_dataset(&workspace, &args.job.system, args.job.strategy).await;
	let copied = prepared.map_err(eyre::Report::from).and_then(|path| {
		fs::copy(&path, &args.out)?;

		Ok(())
	});

	fs::remove_dir_all(workspace.path())?;
	service.status_store().delete(workspace.id());
	copied?;
	tracing::info!(out = %args.out.display(), "Dataset written.");

	Ok(())
}

async fn train(service: &FinetuneService, args: TrainArgs) -> color_eyre::Result<()> {
	let cfg = service.config();
	let sweeper = tokio::spawn(run_sweeper(
		cfg.service.upload_root.clone(),
		service.status_store().clone(),
		Duration::from_secs(cfg.cleanup.interval_seconds),
		Duration::from_secs(cfg.cleanup.max_age_seconds),
	));
	let mut ticker =
		tokio::time::interval(Duration::from_millis(cfg.orchestrator.poll_interval_ms));
	let workspace = service.create_workspace()?;
	let job_id = workspace.id().to_string();

	stage_inputs(&workspace, &args.job.inputs)?;

	let request = SubmitRequest {
		system_message: args.job.system,
		strategy: args.job.strategy,
		model: args.model,
		api_key: args.api_key,
	};
	let mut handle = service.submit(workspace, request);
	let mut shown = String::new();
	let outcome = loop {
		tokio::select! {
			joined = &mut handle => break joined?,
			_ = ticker.tick() => show_status(service, &job_id, &mut shown),
		}
	};

	show_status(service, &job_id, &mut shown);
	sweeper.abort();

	let report = outcome?;

	tracing::info!(
		job_id = %job_id,
		model = %report.fine_tuned_model,
		attempts = report.job.attempts,
		"Training finished."
	);
	println!("{}", report.fine_tuned_model);

	Ok(())
}

fn show_status(service: &FinetuneService, job_id: &str, shown: &mut String) {
	if let Ok(status) = service.status(job_id)
		&& status != *shown
	{
		println!("{status}");

		*shown = status;
	}
}

fn stage_inputs(workspace: &JobWorkspace, inputs: &[PathBuf]) -> color_eyre::Result<()> {
	for input in inputs {
		let name = input
			.file_name()
			.ok_or_else(|| eyre::eyre!("{} does not name a file.", input.display()))?;

		fs::copy(input, workspace.path().join(name))?;
		tracing::debug!(input = %input.display(), job_id = workspace.id(), "Staged input file.");
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use clap::CommandFactory;

	use quill_testkit::{CharCodec, ScratchDir, test_config};

	use super::*;

	#[test]
	fn version_carries_package_version() {
		let command = Args::command();
		let version = command.get_version().unwrap_or_default();

		assert!(version.starts_with(concat!(env!("CARGO_PKG_VERSION"), "-")));
		assert!(version.ends_with(env!("VERGEN_CARGO_TARGET_TRIPLE")));
	}

	#[test]
	fn rust_log_overrides_configured_level() {
		let directives = filter_directives(Some("quill_service=trace".into()), "info");

		assert_eq!(directives, "quill_service=trace");
		assert_eq!(filter_directives(Some("  ".into()), "warn"), "warn");
		assert_eq!(filter_directives(None, "debug"), "debug");
	}

	#[test]
	fn train_command_parses_overrides() {
		let args = Args::try_parse_from([
			"quill-worker",
			"--config",
			"quill.toml",
			"train",
			"--strategy",
			"dialogue_prose",
			"--system",
			"You are a novelist.",
			"--model",
			"custom-model",
			"book.txt",
			"extra.jsonl",
		])
		.unwrap();
		let Command::Train(train) = args.command else {
			panic!("Expected the train command.");
		};

		assert_eq!(train.job.strategy, ChunkStrategy::DialogueProse);
		assert_eq!(train.model.as_deref(), Some("custom-model"));
		assert_eq!(train.api_key, None);
		assert_eq!(train.job.inputs, vec![PathBuf::from("book.txt"), PathBuf::from("extra.jsonl")]);
	}

	#[test]
	fn unknown_strategy_is_rejected() {
		let parsed = Args::try_parse_from([
			"quill-worker",
			"-c",
			"quill.toml",
			"prepare",
			"--strategy",
			"chapters",
			"--system",
			"s",
			"-o",
			"out.jsonl",
			"book.txt",
		]);

		assert!(parsed.is_err());
	}

	#[test]
	fn staged_inputs_keep_their_names() {
		let scratch = ScratchDir::new("quill_worker_stage").unwrap();
		let source = scratch.write("source/book.txt", "Ch1 text **\nCh2 text").unwrap();
		let service = FinetuneService::new(
			test_config(&scratch.path().join("uploads")),
			Arc::new(CharCodec),
			Providers::default(),
		)
		.unwrap();
		let workspace = service.create_workspace().unwrap();

		stage_inputs(&workspace, &[source]).unwrap();

		assert_eq!(
			fs::read_to_string(workspace.path().join("book.txt")).unwrap(),
			"Ch1 text **\nCh2 text"
		);
	}
}
