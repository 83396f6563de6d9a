//! LSTM with attention on synthetic sequences, where the class is
//! whichever marker token appears most often.

use log::info;
use rand::{ Rng, SeedableRng, rngs::StdRng };

use microclassifier::{
  Classifier,
  Result,
  Tensor,
  config::{ RnnConfig, FitConfig },
  models::RnnTextClassifier,
};

const SEQ_LEN: usize = 15;
const VOCAB_SIZE: usize = 50;
const N_CLASSES: usize = 3;

fn make_data(n: usize, rng: &mut impl Rng) -> (Tensor<usize>, Tensor<usize>) {
  let mut ids = Vec::with_capacity(n * SEQ_LEN);
  let mut labels = Vec::with_capacity(n);
  for _ in 0..n {
    let label = rng.gen_range(0, N_CLASSES);
    let row: Vec<usize> = (0..SEQ_LEN).map(|_| {
      if rng.gen_range(0.0, 1.0) < 0.3 { label } else { rng.gen_range(N_CLASSES, VOCAB_SIZE) }
    }).collect();
    ids.extend(row);
    labels.push(label);
  }
  (Tensor::new(&[n, SEQ_LEN], ids), Tensor::from_vec(labels))
}

fn main() -> Result<()> {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
  let mut rng = StdRng::seed_from_u64(2);
  let (x_train, y_train) = make_data(1500, &mut rng);
  let (x_test, y_test) = make_data(300, &mut rng);

  let model = RnnTextClassifier::<f32>::new(RnnConfig {
    embedding_dims: 32,
    cell_size: 32,
    ..RnnConfig::new(SEQ_LEN, VOCAB_SIZE, N_CLASSES)
  })?;

  let config = FitConfig { n_epoch: 3, batch_size: 32, log_every: 10, seed: Some(2), ..model.default_fit() };
  model.fit(&x_train, &y_train, Some((&x_test, &y_test)), &config)?;

  let predictions = model.predict(&x_test, 32)?;
  let hits = predictions.param_iter().zip(y_test.param_iter()).filter(|(a, b)| a == b ).count();
  info!("Test accuracy {:.4}", hits as f64 / y_test.size() as f64);
  Ok(())
}
