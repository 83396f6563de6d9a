use std::{ fs, path::Path };

use itertools::izip;
use log::{ info, debug, warn };
use num_traits::ToPrimitive;
use rand::{ SeedableRng, rngs::StdRng };
use serde::{ Serialize, Deserialize };

use crate::{
  config::{ FitConfig, Validate },
  data::{ gen_batch, shuffle_rows, check_rows, list_avg },
  error::{ Error, Result },
  layers::Module,
  optimize::{ Optimizer, Adam },
  schedule::LearningRates,
  scalar::{ Inner, Real },
  Layer,
  Tensor,
  Variable,
};


/// Per-epoch training history.

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainLog {
  pub loss: Vec<f64>,
  pub acc: Vec<f64>,
  pub val_loss: Vec<f64>,
  pub val_acc: Vec<f64>,
  /// Learning rate of the last update in each epoch.
  #[serde(default)]
  pub lr: Vec<f64>,
}

impl TrainLog {
  pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
    let file = fs::File::create(path)?;
    serde_json::to_writer_pretty(file, self)?;
    Ok(())
  }
}


fn to_f64<T: Real>(value: T) -> f64 {
  value.to_f64().unwrap_or(f64::NAN)
}


/// A network that maps batches of inputs to class logits.
///
/// Implementors describe their graph through [forward](Classifier::forward)
/// and get minibatch training with learning rate decay, validation
/// and batched inference for free.

pub trait Classifier<T: Real>: Module<T> {
  /// Element type of input rows.
  type Input: Inner;
  /// Element type of label rows.
  type Label: Inner;

  fn learning_rates(&self) -> LearningRates;

  /// Maximum global gradient norm, if gradients get clipped.
  fn clip_norm(&self) -> Option<T> {
    None
  }

  /// Fit settings this classifier is usually trained with.
  fn default_fit(&self) -> FitConfig {
    FitConfig::default()
  }

  fn check_input(&self, inputs: &Tensor<Self::Input>) -> Result<()>;
  fn check_labels(&self, labels: &Tensor<Self::Label>) -> Result<()>;

  /// Dense `[batch, n_out]` targets for a batch of labels.
  fn targets(&self, labels: &Tensor<Self::Label>) -> Result<Tensor<T>>;

  /// Called before every training epoch, validation run and prediction.
  fn begin_pass(&self, _batch_size: usize) {}

  /// Logits for a batch of inputs.
  fn forward(&self, inputs: &Tensor<Self::Input>, keep_prob: T, train: bool) -> Variable<T>;

  /// Train on `inputs` and `labels`, scoring `val_data` after every epoch.

  fn fit(
    &self,
    inputs: &Tensor<Self::Input>,
    labels: &Tensor<Self::Label>,
    val_data: Option<(&Tensor<Self::Input>, &Tensor<Self::Label>)>,
    config: &FitConfig,
  ) -> Result<TrainLog> {
    config.validate()?;
    check_rows(inputs, labels)?;
    self.check_input(inputs)?;
    self.check_labels(labels)?;
    if let Some((val_inputs, val_labels)) = val_data {
      check_rows(val_inputs, val_labels)?;
      self.check_input(val_inputs)?;
      self.check_labels(val_labels)?;
    }

    let n_samples = inputs.dims()[0];
    if config.batch_size > n_samples {
      warn!("Batch size {} exceeds the {} training samples", config.batch_size, n_samples);
    }
    match val_data {
      Some((val_inputs, _)) => info!("Train {} samples | Test {} samples", n_samples, val_inputs.dims()[0]),
      None => info!("Train {} samples", n_samples),
    }

    let schedule = self.learning_rates()
      .schedule(config.en_exp_decay, config.n_epoch, n_samples, config.batch_size);
    let mut optimizer = Optimizer::new(cast::<T>(schedule.rate(0))?, Adam::default());
    if let Some(clip_norm) = self.clip_norm() {
      optimizer = optimizer.with_clipping(clip_norm);
    }
    let mut rng = match config.seed {
      Some(seed) => StdRng::seed_from_u64(seed),
      None => StdRng::from_entropy(),
    };
    if !config.warm_start { self.reinit_with(&mut rng) }
    let keep_prob: T = cast(config.keep_prob)?;
    let params: Vec<Variable<T>> = self.params().iter().map(|param| param.value.clone() ).collect();
    let n_batch = n_samples / config.batch_size;

    let mut log = TrainLog::default();
    let mut global_step = 0;
    for epoch in 1..=config.n_epoch {
      let (epoch_inputs, epoch_labels) = if config.en_shuffle {
        debug!("Shuffling {} samples for epoch {}", n_samples, epoch);
        shuffle_rows(inputs, labels, &mut rng)
      } else {
        (inputs.clone(), labels.clone())
      };
      self.begin_pass(config.batch_size);

      let mut last = (f64::NAN, f64::NAN);
      let mut lr = schedule.rate(global_step);
      let batches = izip!(
        0..,
        gen_batch(&epoch_inputs, config.batch_size),
        gen_batch(&epoch_labels, config.batch_size)
      );
      for (local_step, batch_inputs, batch_labels) in batches {
        lr = schedule.rate(global_step);
        optimizer.learning_rate = cast(lr)?;

        let targets = self.targets(&batch_labels)?;
        let logits = self.forward(&batch_inputs, keep_prob, true);
        let loss = logits.softmax_cross_entropy(&targets);
        last = (to_f64(loss.item()), to_f64(logits.accuracy(&targets)));
        optimizer.minimize(&loss, &params);
        global_step += 1;

        if (local_step + 1) % config.log_every == 0 {
          info!("Epoch {}/{} | Step {}/{} | train_loss: {:.4} | train_acc: {:.4} | lr: {:.4}",
            epoch, config.n_epoch, local_step + 1, n_batch, last.0, last.1, lr);
        }
      }
      log.loss.push(last.0);
      log.acc.push(last.1);
      log.lr.push(lr);

      if let Some((val_inputs, val_labels)) = val_data {
        let (val_loss, val_acc) = self.evaluate(val_inputs, val_labels, config.batch_size)?;
        log.val_loss.push(val_loss);
        log.val_acc.push(val_acc);
        info!("Epoch {}/{} | train_loss: {:.4} | train_acc: {:.4} | test_loss: {:.4} | test_acc: {:.4} | lr: {:.4}",
          epoch, config.n_epoch, last.0, last.1, val_loss, val_acc, lr);
      } else {
        info!("Epoch {}/{} | train_loss: {:.4} | train_acc: {:.4} | lr: {:.4}",
          epoch, config.n_epoch, last.0, last.1, lr);
      }
    }
    Ok(log)
  }

  /// Mean loss and accuracy over batches, without dropout.

  fn evaluate(
    &self,
    inputs: &Tensor<Self::Input>,
    labels: &Tensor<Self::Label>,
    batch_size: usize,
  ) -> Result<(f64, f64)> {
    if batch_size == 0 { return Err(Error::InvalidConfig("batch_size must be positive".into())) }
    check_rows(inputs, labels)?;
    self.check_input(inputs)?;
    self.check_labels(labels)?;
    self.begin_pass(batch_size);
    let mut losses = vec![];
    let mut accs = vec![];
    for (batch_inputs, batch_labels) in izip!(gen_batch(inputs, batch_size), gen_batch(labels, batch_size)) {
      let targets = self.targets(&batch_labels)?;
      let logits = self.forward(&batch_inputs, T::one(), false);
      losses.push(to_f64(logits.softmax_cross_entropy(&targets).item()));
      accs.push(to_f64(logits.accuracy(&targets)));
    }
    Ok((list_avg(&losses), list_avg(&accs)))
  }

  /// Logits of all `inputs`, computed batch by batch.

  fn logits(&self, inputs: &Tensor<Self::Input>, batch_size: usize) -> Result<Tensor<T>> {
    if batch_size == 0 { return Err(Error::InvalidConfig("batch_size must be positive".into())) }
    if inputs.rank() == 0 || inputs.dims()[0] == 0 { return Err(Error::EmptyInput) }
    self.check_input(inputs)?;
    self.begin_pass(batch_size);
    let outputs: Vec<Tensor<T>> = gen_batch(inputs, batch_size).iter()
      .map(|batch| self.forward(batch, T::one(), false).tensor().clone() )
      .collect();
    Ok(Tensor::concat_rows(&outputs))
  }
}

fn cast<T: Real>(value: f64) -> Result<T> {
  T::from(value).ok_or_else(|| Error::InvalidConfig(format!("{} is not representable", value)) )
}
