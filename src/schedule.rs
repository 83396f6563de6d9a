use serde::{ Serialize, Deserialize };


/// Learning rate bounds of a classifier.

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LearningRates {
  pub max_lr: f64,
  pub min_lr: f64,
  /// Rate used when decay is disabled.
  pub constant_lr: f64,
}

impl LearningRates {
  /// Pick a schedule for a run of `n_epoch` epochs over `n_samples`.

  pub fn schedule(&self, decay: bool, n_epoch: usize, n_samples: usize, batch_size: usize) -> Schedule {
    if decay {
      Schedule::exponential(self.max_lr, self.min_lr, n_epoch, n_samples, batch_size)
    } else {
      Schedule::Constant(self.constant_lr)
    }
  }
}


/// Learning rate as a function of the global step.

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Schedule {
  Constant(f64),
  /// `max_lr · exp(-decay_rate · step)`
  Exponential { max_lr: f64, decay_rate: f64 },
}

impl Schedule {
  /// Decay from `max_lr` so that `min_lr` is reached after
  /// `n_epoch · n_samples / batch_size` steps.

  pub fn exponential(max_lr: f64, min_lr: f64, n_epoch: usize, n_samples: usize, batch_size: usize) -> Self {
    let total_steps = n_epoch as f64 * n_samples as f64 / batch_size as f64;
    let decay_rate = (min_lr / max_lr).ln() / -total_steps;
    Self::Exponential { max_lr, decay_rate }
  }

  pub fn rate(&self, step: usize) -> f64 {
    match *self {
      Self::Constant(lr) => lr,
      Self::Exponential { max_lr, decay_rate } => max_lr * (-decay_rate * step as f64).exp(),
    }
  }
}
