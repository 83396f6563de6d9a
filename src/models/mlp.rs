use std::path::Path;

use serde::{ Serialize, de::DeserializeOwned };

use crate::{
  checkpoint,
  classifier::Classifier,
  config::{ MlpConfig, Validate },
  error::Result,
  layers::{ Module, Param, Dense, Init },
  schedule::LearningRates,
  scalar::Real,
  ops::*,
  Layer,
  Tensor,
  Variable,
};
use super::expect_width;


/// Stack of ReLU layers with dropout, ending in a linear output layer.

#[derive(Debug, Clone)]
pub struct MlpClassifier<T: Real> {
  pub config: MlpConfig,
  hidden: Vec<Dense<T>>,
  output: Dense<T>,
}

impl<T: Real> MlpClassifier<T> {
  pub fn new(config: MlpConfig) -> Result<Self> {
    config.validate()?;
    let mut n_in = config.n_in;
    let mut hidden = vec![];
    for (i, &units) in config.hidden_unit_list.iter().enumerate() {
      hidden.push(Dense::new(&format!("hidden{}", i), n_in, units, Init::TruncatedNormal(0.1), Init::Constant(0.1)));
      n_in = units;
    }
    let output = Dense::new("output", n_in, config.n_out, Init::TruncatedNormal(0.1), Init::Constant(0.1));
    Ok(Self { config, hidden, output })
  }

  /// Logits of shape `[n, n_out]`.

  pub fn predict(&self, inputs: &Tensor<T>, batch_size: usize) -> Result<Tensor<T>> {
    self.logits(inputs, batch_size)
  }

  pub fn save(&self, path: impl AsRef<Path>) -> Result<()> where T: Serialize {
    checkpoint::save(self, path)
  }

  pub fn load(&self, path: impl AsRef<Path>) -> Result<()> where T: DeserializeOwned {
    checkpoint::load(self, path)
  }
}

impl<T: Real> Module<T> for MlpClassifier<T> {
  fn params(&self) -> Vec<&Param<T>> {
    self.hidden.iter()
      .chain(std::iter::once(&self.output))
      .flat_map(|layer| layer.params() )
      .collect()
  }
}

impl<T: Real> Classifier<T> for MlpClassifier<T> {
  type Input = T;
  type Label = T;

  fn learning_rates(&self) -> LearningRates {
    LearningRates { max_lr: 0.003, min_lr: 0.0001, constant_lr: 0.001 }
  }

  fn check_input(&self, inputs: &Tensor<T>) -> Result<()> {
    expect_width("Inputs", inputs, self.config.n_in)
  }

  fn check_labels(&self, labels: &Tensor<T>) -> Result<()> {
    expect_width("Labels", labels, self.config.n_out)
  }

  fn targets(&self, labels: &Tensor<T>) -> Result<Tensor<T>> {
    Ok(labels.clone())
  }

  fn forward(&self, inputs: &Tensor<T>, keep_prob: T, train: bool) -> Variable<T> {
    let mut x = inputs.tracked();
    for layer in &self.hidden {
      x = layer.run(&x).relu().dropout(keep_prob, train);
    }
    self.output.run(&x)
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::{ config::FitConfig, data::one_hot, error::Error };

  fn config() -> MlpConfig {
    MlpConfig { hidden_unit_list: vec![8, 8], ..MlpConfig::new(2, 2) }
  }

  // Points above the diagonal belong to class one
  fn toy_data() -> (Tensor<f64>, Tensor<f64>) {
    let mut points = vec![];
    let mut labels = vec![];
    for i in 0..8 {
      for j in 0..8 {
        if i == j { continue }
        points.extend([i as f64 / 7.0, j as f64 / 7.0]);
        labels.push((j > i) as usize);
      }
    }
    (Tensor::new(&[labels.len(), 2], points), one_hot(&labels, 2).unwrap())
  }

  #[test]
  fn layer_sizes() {
    let model = MlpClassifier::<f32>::new(MlpConfig::new(784, 10)).unwrap();
    let dims: Vec<Vec<usize>> = model.params().iter().map(|param| param.value.dims().to_vec() ).collect();
    assert_eq!(dims, vec![
      vec![784, 100], vec![100],
      vec![100, 200], vec![200],
      vec![200, 100], vec![100],
      vec![100, 10], vec![10],
    ]);
    assert_eq!(model.params()[6].name, "output/weights");
  }

  #[test]
  fn without_hidden_layers() {
    let model = MlpClassifier::<f32>::new(MlpConfig { hidden_unit_list: vec![], ..MlpConfig::new(3, 2) }).unwrap();
    assert_eq!(model.params().len(), 2);
    let logits = model.predict(&Tensor::zeros(&[4, 3]), 3).unwrap();
    assert_eq!(logits.dims(), &[4, 2]);
  }

  #[test]
  fn rejects_wrong_width() {
    let model = MlpClassifier::<f64>::new(config()).unwrap();
    assert!(matches!(model.predict(&Tensor::zeros(&[4, 3]), 2), Err(Error::ShapeMismatch { .. })));
    assert!(matches!(model.predict(&Tensor::zeros(&[0, 2]), 2), Err(Error::EmptyInput)));
  }

  #[test]
  fn separates_diagonal() {
    let model = MlpClassifier::<f64>::new(config()).unwrap();
    let (x, y) = toy_data();
    let log = model.fit(&x, &y, Some((&x, &y)), &FitConfig {
      n_epoch: 200,
      batch_size: 14,
      keep_prob: 1.0,
      en_exp_decay: false,
      seed: Some(3),
      ..FitConfig::default()
    }).unwrap();
    assert!(log.val_loss[199] < log.val_loss[0]);
    assert!(log.val_acc[199] > 0.8);
  }

  #[test]
  fn checkpoint_round_trip() {
    let path = std::env::temp_dir().join(format!("microclassifier-mlp-{}.bin", std::process::id()));
    let (x, _) = toy_data();
    let model = MlpClassifier::<f64>::new(config()).unwrap();
    model.save(&path).unwrap();
    let restored = MlpClassifier::<f64>::new(config()).unwrap();
    restored.load(&path).unwrap();
    assert_eq!(model.predict(&x, 10).unwrap(), restored.predict(&x, 10).unwrap());

    let other = MlpClassifier::<f64>::new(MlpConfig { hidden_unit_list: vec![4], ..config() }).unwrap();
    assert!(matches!(other.load(&path), Err(Error::ShapeMismatch { .. })));
    std::fs::remove_file(path).unwrap();
  }
}
