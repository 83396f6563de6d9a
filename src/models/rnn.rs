use std::{ cell::{ Cell, RefCell }, path::Path };

use log::debug;
use serde::{ Serialize, de::DeserializeOwned };

use crate::{
  checkpoint,
  classifier::Classifier,
  config::{ RnnConfig, FitConfig, Validate },
  data::one_hot,
  error::{ Error, Result },
  layers::{ Module, Param, Embedding, LstmCell, LstmState, Dense, Init },
  schedule::LearningRates,
  scalar::Real,
  Layer,
  Tensor,
  Variable,
};
use super::{ check_ids, expect_rank };


/// LSTM over embedded token ids, pooled by attention against
/// the final hidden state.
///
/// Labels are class ids. When the config is `stateful`, the final
/// state of every full batch seeds the next batch of the same pass.

#[derive(Debug)]
pub struct RnnTextClassifier<T: Real> {
  pub config: RnnConfig,
  embedding: Embedding<T>,
  cell: LstmCell<T>,
  output: Dense<T>,
  carry: RefCell<Option<LstmState<T>>>,
  full_batch: Cell<usize>,
}

impl<T: Real> RnnTextClassifier<T> {
  pub fn new(config: RnnConfig) -> Result<Self> {
    config.validate()?;
    Ok(Self {
      embedding: Embedding::new("embedding", config.vocab_size, config.embedding_dims, Init::Uniform(-1.0, 1.0)),
      cell: LstmCell::new("lstm", config.embedding_dims, config.cell_size),
      output: Dense::new("output", config.cell_size, config.n_out, Init::GlorotUniform, Init::Constant(0.0)),
      carry: RefCell::new(None),
      full_batch: Cell::new(0),
      config,
    })
  }

  /// Most likely class of every sequence.

  pub fn predict(&self, inputs: &Tensor<usize>, batch_size: usize) -> Result<Tensor<usize>> {
    Ok(self.logits(inputs, batch_size)?.argmax(-1))
  }

  /// Forget any carried state and expect batches of `batch_size`.

  pub fn reset_state(&self, batch_size: usize) {
    *self.carry.borrow_mut() = None;
    self.full_batch.set(batch_size);
  }

  pub fn save(&self, path: impl AsRef<Path>) -> Result<()> where T: Serialize {
    checkpoint::save(self, path)
  }

  pub fn load(&self, path: impl AsRef<Path>) -> Result<()> where T: DeserializeOwned {
    checkpoint::load(self, path)
  }

  /// Unroll the LSTM over embedded ids, dropping out cell inputs at every position.

  fn encode(&self, inputs: &Tensor<usize>, keep_prob: T, train: bool) -> (Variable<T>, LstmState<T>) {
    let batch_size = inputs.dims()[0];
    let embedded = self.embedding.run(inputs).dropout(keep_prob, train);
    let (outputs, last) = self.cell.run(&embedded, self.initial_state(batch_size));
    if self.config.stateful && batch_size == self.full_batch.get() {
      *self.carry.borrow_mut() = Some(last.detached());
    }
    (outputs, last)
  }

  fn initial_state(&self, batch_size: usize) -> LstmState<T> {
    if self.config.stateful && batch_size == self.full_batch.get() {
      if let Some(state) = self.carry.borrow().as_ref() {
        return state.clone()
      }
    }
    self.cell.zero_state(batch_size)
  }
}

impl<T: Real> Module<T> for RnnTextClassifier<T> {
  fn params(&self) -> Vec<&Param<T>> {
    let mut params = self.embedding.params();
    params.extend(self.cell.params());
    params.extend(self.output.params());
    params
  }
}

impl<T: Real> Classifier<T> for RnnTextClassifier<T> {
  type Input = usize;
  type Label = usize;

  fn learning_rates(&self) -> LearningRates {
    LearningRates { max_lr: 0.005, min_lr: 0.001, constant_lr: 0.001 }
  }

  fn clip_norm(&self) -> Option<T> {
    T::from(self.config.grad_clip)
  }

  fn default_fit(&self) -> FitConfig {
    FitConfig { keep_prob: 1.0, ..FitConfig::default() }
  }

  fn check_input(&self, inputs: &Tensor<usize>) -> Result<()> {
    check_ids(inputs, self.config.seq_len, self.config.vocab_size)
  }

  fn check_labels(&self, labels: &Tensor<usize>) -> Result<()> {
    expect_rank("Labels", labels, 1)?;
    match labels.param_iter().find(|&label| label >= self.config.n_out ) {
      Some(label) => Err(Error::InvalidInput(format!("Label {} out of range for {} classes", label, self.config.n_out))),
      None => Ok(()),
    }
  }

  fn targets(&self, labels: &Tensor<usize>) -> Result<Tensor<T>> {
    one_hot(&labels.to_vec(), self.config.n_out)
  }

  fn begin_pass(&self, batch_size: usize) {
    if self.config.stateful {
      debug!("Resetting carried state for batches of {}", batch_size);
    }
    self.reset_state(batch_size);
  }

  fn forward(&self, inputs: &Tensor<usize>, keep_prob: T, train: bool) -> Variable<T> {
    let (outputs, last) = self.encode(inputs, keep_prob, train);
    let (context, _) = outputs.attention_pool(&last.h);
    self.output.run(&context)
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::ops::*;
  use rand::{ SeedableRng, rngs::StdRng };

  fn small_config(stateful: bool) -> RnnConfig {
    RnnConfig {
      embedding_dims: 6,
      cell_size: 8,
      stateful,
      ..RnnConfig::new(5, 12, 3)
    }
  }

  // The label is the first token modulo three
  fn toy_data(n: usize) -> (Tensor<usize>, Tensor<usize>) {
    let ids: Vec<usize> = (0..n * 5).map(|i| (i * 7 + i / 5 * 3) % 12 ).collect();
    let labels = (0..n).map(|row| ids[row * 5] % 3 ).collect();
    (Tensor::new(&[n, 5], ids), Tensor::from_vec(labels))
  }

  #[test]
  fn forward_shapes() {
    let model = RnnTextClassifier::<f32>::new(small_config(false)).unwrap();
    let (x, _) = toy_data(7);
    assert_eq!(model.forward(&x, 0.8, true).dims(), &[7, 3]);
    let predictions = model.predict(&x, 3).unwrap();
    assert_eq!(predictions.dims(), &[7]);
    assert!(predictions.param_iter().all(|class| class < 3 ));
  }

  #[test]
  fn dropout_reaches_final_state() {
    let model = RnnTextClassifier::<f64>::new(small_config(false)).unwrap();
    let (x, _) = toy_data(4);
    let (outputs, dropped) = model.encode(&x, 0.5, true);
    let (_, clean) = model.encode(&x, 1.0, false);
    // Inputs get dropped, so the query state changes while outputs stay undropped
    assert_ne!(dropped.h.tensor(), clean.h.tensor());
    assert_eq!(outputs.tensor().select(1, 4), *dropped.h.tensor());
  }

  #[test]
  fn defaults() {
    let model = RnnTextClassifier::<f32>::new(small_config(false)).unwrap();
    assert_eq!(model.default_fit().keep_prob, 1.0);
    assert_eq!(model.clip_norm(), Some(5.0));
    assert_eq!(model.learning_rates().max_lr, 0.005);
    assert_eq!(model.params().len(), 5);
  }

  #[test]
  fn rejects_bad_labels() {
    let model = RnnTextClassifier::<f32>::new(small_config(false)).unwrap();
    let (x, _) = toy_data(2);
    let labels = Tensor::vec(&[0, 3]);
    assert!(matches!(model.evaluate(&x, &labels, 2), Err(Error::InvalidInput(_))));
    let labels = Tensor::<usize>::zeros(&[2, 1]);
    assert!(matches!(model.evaluate(&x, &labels, 2), Err(Error::InvalidInput(_))));
  }

  #[test]
  fn carries_state_across_full_batches() {
    let model = RnnTextClassifier::<f32>::new(small_config(true)).unwrap();
    let (x, _) = toy_data(7);
    let batches = x.chunk_rows(4);
    model.reset_state(4);
    assert!(model.carry.borrow().is_none());

    let first = model.forward(&batches[0], 1.0, false);
    let carried = model.carry.borrow().clone().unwrap();
    assert_eq!(carried.batch_size(), 4);
    assert!(!carried.h.trainable());

    // The carried state changes what the same batch produces
    let second = model.forward(&batches[0], 1.0, false);
    assert_ne!(first.tensor(), second.tensor());

    // Partial batches start from zeros and leave the carry alone
    let before = model.carry.borrow().clone().unwrap();
    model.forward(&batches[1], 1.0, false);
    let after = model.carry.borrow().clone().unwrap();
    assert!(after.h.shared_with(&before.h));

    model.reset_state(4);
    let fresh = model.forward(&batches[0], 1.0, false);
    assert_eq!(fresh.tensor(), first.tensor());
  }

  #[test]
  fn fresh_state_every_pass() {
    let model = RnnTextClassifier::<f64>::new(small_config(true)).unwrap();
    let (x, y) = toy_data(8);
    model.fit(&x, &y, None, &FitConfig { n_epoch: 2, batch_size: 4, seed: Some(1), ..model.default_fit() }).unwrap();
    assert!(model.carry.borrow().is_some());

    let first = model.logits(&x, 4).unwrap();
    assert_eq!(model.logits(&x, 4).unwrap(), first);
    let first = model.evaluate(&x, &y, 4).unwrap();
    assert_eq!(model.evaluate(&x, &y, 4).unwrap(), first);
  }

  #[test]
  fn stateless_ignores_history() {
    let model = RnnTextClassifier::<f32>::new(small_config(false)).unwrap();
    let (x, _) = toy_data(4);
    model.reset_state(4);
    let first = model.forward(&x, 1.0, false);
    let second = model.forward(&x, 1.0, false);
    assert_eq!(first.tensor(), second.tensor());
    assert!(model.carry.borrow().is_none());
  }

  #[test]
  fn learns_first_token() {
    let model = RnnTextClassifier::<f32>::new(small_config(false)).unwrap();
    model.reinit_with(&mut StdRng::seed_from_u64(5));
    let (x, y) = toy_data(48);
    let (loss_before, _) = model.evaluate(&x, &y, 16).unwrap();
    let config = FitConfig {
      n_epoch: 25,
      batch_size: 16,
      seed: Some(5),
      warm_start: true,
      ..model.default_fit()
    };
    let log = model.fit(&x, &y, None, &config).unwrap();
    assert_eq!(log.acc.len(), 25);
    assert!(log.val_loss.is_empty());
    let (loss_after, _) = model.evaluate(&x, &y, 16).unwrap();
    assert!(loss_after < loss_before);
  }
}
