//! Model and training configuration.
//!
//! Every config derives `serde` traits, so it can be read from JSON:
//!
//! ```json
//! {
//!   "n_epoch": 5,
//!   "batch_size": 64,
//!   "keep_prob": 0.8
//! }
//! ```
//!
//! Missing fields fall back to their defaults.

use std::{ fs, path::Path };

use serde::{ Serialize, Deserialize, de::DeserializeOwned };

use crate::{
  error::{ Error, Result },
  layers::Padding,
};


/// Parse a config from a JSON file and validate it.

pub fn load_config<C: DeserializeOwned + Validate>(path: impl AsRef<Path>) -> Result<C> {
  let contents = fs::read_to_string(path)?;
  let config: C = serde_json::from_str(&contents)?;
  config.validate()?;
  Ok(config)
}


pub trait Validate {
  fn validate(&self) -> Result<()>;
}


/// Settings of a single `fit` run.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
  pub n_epoch: usize,
  pub batch_size: usize,
  /// Probability of keeping a value in dropout layers.
  pub keep_prob: f64,
  pub en_exp_decay: bool,
  pub en_shuffle: bool,
  /// Log progress every this many batches.
  pub log_every: usize,
  /// Seed for parameter initialization and shuffling. Drawn from entropy when absent.
  pub seed: Option<u64>,
  /// Continue from the current parameters instead of re-initializing them.
  pub warm_start: bool,
}

impl Default for FitConfig {
  fn default() -> Self {
    Self {
      n_epoch: 10,
      batch_size: 128,
      keep_prob: 0.5,
      en_exp_decay: true,
      en_shuffle: true,
      log_every: 50,
      seed: None,
      warm_start: false,
    }
  }
}

impl FitConfig {
  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    load_config(path)
  }
}

impl Validate for FitConfig {
  fn validate(&self) -> Result<()> {
    if self.n_epoch == 0 {
      return Err(Error::InvalidConfig("n_epoch must be positive".into()))
    }
    if self.batch_size == 0 {
      return Err(Error::InvalidConfig("batch_size must be positive".into()))
    }
    if !(self.keep_prob > 0.0 && self.keep_prob <= 1.0) {
      return Err(Error::InvalidConfig(format!("keep_prob must be in (0, 1], got {}", self.keep_prob)))
    }
    if self.log_every == 0 {
      return Err(Error::InvalidConfig("log_every must be positive".into()))
    }
    Ok(())
  }
}


/// Shape of a [Conv1dClassifier](crate::models::Conv1dClassifier).

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conv1dConfig {
  pub seq_len: usize,
  pub vocab_size: usize,
  pub n_out: usize,
  #[serde(default = "Conv1dConfig::default_embedding_dims")]
  pub embedding_dims: usize,
  #[serde(default = "Conv1dConfig::default_n_filters")]
  pub n_filters: usize,
  #[serde(default = "Conv1dConfig::default_kernel_size")]
  pub kernel_size: usize,
  #[serde(default = "Conv1dConfig::default_padding")]
  pub padding: Padding,
  #[serde(default = "Conv1dConfig::default_hidden_dims")]
  pub hidden_dims: usize,
}

impl Conv1dConfig {
  pub fn new(seq_len: usize, vocab_size: usize, n_out: usize) -> Self {
    Self {
      seq_len,
      vocab_size,
      n_out,
      embedding_dims: Self::default_embedding_dims(),
      n_filters: Self::default_n_filters(),
      kernel_size: Self::default_kernel_size(),
      padding: Self::default_padding(),
      hidden_dims: Self::default_hidden_dims(),
    }
  }

  fn default_embedding_dims() -> usize { 50 }
  fn default_n_filters() -> usize { 250 }
  fn default_kernel_size() -> usize { 3 }
  fn default_padding() -> Padding { Padding::Valid }
  fn default_hidden_dims() -> usize { 250 }
}

impl Validate for Conv1dConfig {
  fn validate(&self) -> Result<()> {
    positive(&[
      ("seq_len", self.seq_len),
      ("vocab_size", self.vocab_size),
      ("n_out", self.n_out),
      ("embedding_dims", self.embedding_dims),
      ("n_filters", self.n_filters),
      ("kernel_size", self.kernel_size),
      ("hidden_dims", self.hidden_dims),
    ])?;
    if self.padding == Padding::Valid && self.kernel_size > self.seq_len {
      return Err(Error::InvalidConfig(format!(
        "kernel_size {} exceeds seq_len {} with VALID padding", self.kernel_size, self.seq_len)))
    }
    Ok(())
  }
}


/// Shape of an [RnnTextClassifier](crate::models::RnnTextClassifier).

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RnnConfig {
  pub seq_len: usize,
  pub vocab_size: usize,
  pub n_out: usize,
  #[serde(default = "RnnConfig::default_embedding_dims")]
  pub embedding_dims: usize,
  #[serde(default = "RnnConfig::default_cell_size")]
  pub cell_size: usize,
  /// Maximum global norm of all gradients.
  #[serde(default = "RnnConfig::default_grad_clip")]
  pub grad_clip: f64,
  /// Carry the final state of a batch over into the next one.
  #[serde(default)]
  pub stateful: bool,
}

impl RnnConfig {
  pub fn new(seq_len: usize, vocab_size: usize, n_out: usize) -> Self {
    Self {
      seq_len,
      vocab_size,
      n_out,
      embedding_dims: Self::default_embedding_dims(),
      cell_size: Self::default_cell_size(),
      grad_clip: Self::default_grad_clip(),
      stateful: false,
    }
  }

  fn default_embedding_dims() -> usize { 128 }
  fn default_cell_size() -> usize { 128 }
  fn default_grad_clip() -> f64 { 5.0 }
}

impl Validate for RnnConfig {
  fn validate(&self) -> Result<()> {
    positive(&[
      ("seq_len", self.seq_len),
      ("vocab_size", self.vocab_size),
      ("n_out", self.n_out),
      ("embedding_dims", self.embedding_dims),
      ("cell_size", self.cell_size),
    ])?;
    if self.grad_clip <= 0.0 {
      return Err(Error::InvalidConfig(format!("grad_clip must be positive, got {}", self.grad_clip)))
    }
    Ok(())
  }
}


/// Shape of an [MlpClassifier](crate::models::MlpClassifier).

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpConfig {
  pub n_in: usize,
  #[serde(default = "MlpConfig::default_hidden_unit_list")]
  pub hidden_unit_list: Vec<usize>,
  pub n_out: usize,
}

impl MlpConfig {
  pub fn new(n_in: usize, n_out: usize) -> Self {
    Self { n_in, hidden_unit_list: Self::default_hidden_unit_list(), n_out }
  }

  fn default_hidden_unit_list() -> Vec<usize> { vec![100, 200, 100] }
}

impl Validate for MlpConfig {
  fn validate(&self) -> Result<()> {
    positive(&[("n_in", self.n_in), ("n_out", self.n_out)])?;
    if self.hidden_unit_list.contains(&0) {
      return Err(Error::InvalidConfig("hidden layers need at least one unit".into()))
    }
    Ok(())
  }
}

fn positive(fields: &[(&str, usize)]) -> Result<()> {
  match fields.iter().find(|(_, value)| *value == 0 ) {
    Some((name, _)) => Err(Error::InvalidConfig(format!("{} must be positive", name))),
    None => Ok(()),
  }
}
