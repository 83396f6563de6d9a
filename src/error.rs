use thiserror::Error;

/// Result type for training, prediction and persistence
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by classifiers, configs, datasets and checkpoints
#[derive(Error, Debug)]
pub enum Error {
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("Checkpoint encoding error: {0}")]
  Checkpoint(#[from] postcard::Error),

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("Shape mismatch for {name}: expected {expected:?}, got {actual:?}")]
  ShapeMismatch {
    name: String,
    expected: Vec<usize>,
    actual: Vec<usize>,
  },

  #[error("Checkpoint has no parameter named {0}")]
  MissingParameter(String),

  #[error("Invalid configuration: {0}")]
  InvalidConfig(String),

  #[error("Invalid input: {0}")]
  InvalidInput(String),

  #[error("Got {inputs} inputs but {labels} labels")]
  LengthMismatch { inputs: usize, labels: usize },

  #[error("Input is empty")]
  EmptyInput,

  #[error("Malformed dataset {path}: {reason}")]
  Dataset { path: String, reason: String },
}
