//! Sentiment-style classification of synthetic token sequences.
//!
//! Sequences containing any of the "positive" tokens belong to class one.

use log::info;
use rand::{ Rng, SeedableRng, rngs::StdRng };

use microclassifier::{
  Classifier,
  Result,
  Tensor,
  config::{ Conv1dConfig, FitConfig },
  data::one_hot,
  layers::Padding,
  models::Conv1dClassifier,
};

const SEQ_LEN: usize = 20;
const VOCAB_SIZE: usize = 100;
const POSITIVE: [usize; 3] = [7, 42, 77];

fn make_data(n: usize, rng: &mut impl Rng) -> Result<(Tensor<usize>, Tensor<f32>)> {
  let mut ids = Vec::with_capacity(n * SEQ_LEN);
  let mut labels = Vec::with_capacity(n);
  for _ in 0..n {
    let row: Vec<usize> = (0..SEQ_LEN).map(|_| loop {
      let id = rng.gen_range(0, VOCAB_SIZE);
      if !POSITIVE.contains(&id) { break id }
    }).collect();
    ids.extend(row);
    let label = rng.gen_range(0, 2);
    if label == 1 {
      let position = ids.len() - SEQ_LEN + rng.gen_range(0, SEQ_LEN);
      ids[position] = POSITIVE[rng.gen_range(0, POSITIVE.len())];
    }
    labels.push(label);
  }
  Ok((Tensor::new(&[n, SEQ_LEN], ids), one_hot(&labels, 2)?))
}

fn main() -> Result<()> {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
  let mut rng = StdRng::seed_from_u64(1);
  let (x_train, y_train) = make_data(2000, &mut rng)?;
  let (x_test, y_test) = make_data(500, &mut rng)?;

  let model = Conv1dClassifier::<f32>::new(Conv1dConfig {
    embedding_dims: 32,
    n_filters: 64,
    hidden_dims: 64,
    padding: Padding::Same,
    ..Conv1dConfig::new(SEQ_LEN, VOCAB_SIZE, 2)
  })?;

  let config = FitConfig { n_epoch: 4, batch_size: 64, log_every: 10, seed: Some(1), ..model.default_fit() };
  model.fit(&x_train, &y_train, Some((&x_test, &y_test)), &config)?;

  let (loss, acc) = model.evaluate(&x_test, &y_test, 64)?;
  info!("Test loss {:.4} | accuracy {:.4}", loss, acc);
  Ok(())
}
