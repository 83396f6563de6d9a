use std::path::Path;

use serde::{ Serialize, de::DeserializeOwned };

use crate::{
  checkpoint,
  classifier::Classifier,
  config::{ Conv1dConfig, Validate },
  error::Result,
  layers::{ Module, Param, Embedding, Conv1d, Dense, Init },
  schedule::LearningRates,
  scalar::Real,
  ops::*,
  Layer,
  Tensor,
  Variable,
};
use super::{ check_ids, expect_width };


/// Embedding, one convolution with global max pooling and
/// a hidden dense layer over sequences of token ids.
///
/// Labels are one-hot rows of width `n_out`.

#[derive(Debug, Clone)]
pub struct Conv1dClassifier<T: Real> {
  pub config: Conv1dConfig,
  embedding: Embedding<T>,
  conv: Conv1d<T>,
  hidden: Dense<T>,
  output: Dense<T>,
}

impl<T: Real> Conv1dClassifier<T> {
  pub fn new(config: Conv1dConfig) -> Result<Self> {
    config.validate()?;
    let embedding = Embedding::new("embedding", config.vocab_size, config.embedding_dims, Init::Normal);
    let conv = Conv1d::new(
      "conv1d",
      config.kernel_size,
      config.embedding_dims,
      config.n_filters,
      config.padding,
      1,
      Init::TruncatedNormal(0.1),
      Init::Constant(0.1),
    );
    let hidden = Dense::new("hidden", config.n_filters, config.hidden_dims, Init::TruncatedNormal(0.1), Init::Constant(0.1));
    let output = Dense::new("output", config.hidden_dims, config.n_out, Init::TruncatedNormal(0.1), Init::Constant(0.1));
    Ok(Self { config, embedding, conv, hidden, output })
  }

  /// Logits of shape `[n, n_out]`.

  pub fn predict(&self, inputs: &Tensor<usize>, batch_size: usize) -> Result<Tensor<T>> {
    self.logits(inputs, batch_size)
  }

  pub fn save(&self, path: impl AsRef<Path>) -> Result<()> where T: Serialize {
    checkpoint::save(self, path)
  }

  pub fn load(&self, path: impl AsRef<Path>) -> Result<()> where T: DeserializeOwned {
    checkpoint::load(self, path)
  }
}

impl<T: Real> Module<T> for Conv1dClassifier<T> {
  fn params(&self) -> Vec<&Param<T>> {
    let mut params = self.embedding.params();
    params.extend(self.conv.params());
    params.extend(self.hidden.params());
    params.extend(self.output.params());
    params
  }
}

impl<T: Real> Classifier<T> for Conv1dClassifier<T> {
  type Input = usize;
  type Label = T;

  fn learning_rates(&self) -> LearningRates {
    LearningRates { max_lr: 0.003, min_lr: 0.0001, constant_lr: 0.001 }
  }

  fn check_input(&self, inputs: &Tensor<usize>) -> Result<()> {
    check_ids(inputs, self.config.seq_len, self.config.vocab_size)
  }

  fn check_labels(&self, labels: &Tensor<T>) -> Result<()> {
    expect_width("Labels", labels, self.config.n_out)
  }

  fn targets(&self, labels: &Tensor<T>) -> Result<Tensor<T>> {
    Ok(labels.clone())
  }

  fn forward(&self, inputs: &Tensor<usize>, keep_prob: T, train: bool) -> Variable<T> {
    let embedded = self.embedding.run(inputs);
    let pooled = self.conv.run(&embedded).relu().global_max_pool();
    let hidden = self.hidden.run(&pooled).relu().dropout(keep_prob, train);
    self.output.run(&hidden)
  }
}
