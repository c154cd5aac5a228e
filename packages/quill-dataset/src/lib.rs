mod dataset;
mod error;
mod example;
mod format;

pub use dataset::Dataset;
pub use error::{Error, Result};
pub use example::{Message, Role, TrainingExample};
pub use format::{instruction_pairs, sliding_pairs};

/// File name of the dataset written into each job folder.
pub const DATASET_FILE_NAME: &str = "fine_tune.jsonl";
