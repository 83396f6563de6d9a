use std::{ fs, path::PathBuf };

use clap::Parser;
use log::info;

use microclassifier::{
  Classifier,
  Layer,
  Result,
  Tensor,
  config::{ FitConfig, MlpConfig },
  data::{ Mnist, one_hot },
  layers::Module,
  models::MlpClassifier,
};

/// Train a multilayer perceptron on MNIST and report its test accuracy.
#[derive(Parser)]
#[command(name = "mnist-mlp", version, about)]
struct Cli {
  /// Directory holding the four uncompressed MNIST IDX files.
  #[arg(long, default_value = "data/mnist")]
  data_dir: PathBuf,

  /// Where to write the training history as JSON.
  #[arg(long, default_value = "logs")]
  log_dir: PathBuf,

  #[arg(long, default_value_t = 10)]
  epochs: usize,

  #[arg(long, default_value_t = 128)]
  batch_size: usize,

  /// Comma separated hidden layer widths.
  #[arg(long, value_delimiter = ',', default_value = "100,200,100")]
  hidden: Vec<usize>,

  /// JSON file with fit settings, overriding the flags above.
  #[arg(long)]
  fit_config: Option<PathBuf>,

  /// Save trained parameters to this file.
  #[arg(long)]
  save: Option<PathBuf>,
}

fn main() -> Result<()> {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
  let cli = Cli::parse();

  let mnist = Mnist::load(&cli.data_dir)?;
  let y_train: Tensor<f32> = one_hot(&mnist.train_labels, 10)?;
  let y_test: Tensor<f32> = one_hot(&mnist.test_labels, 10)?;

  let model = MlpClassifier::<f32>::new(MlpConfig { n_in: 784, hidden_unit_list: cli.hidden, n_out: 10 })?;
  info!("{} trainable parameters", model.num_trainable());

  let fit = match &cli.fit_config {
    Some(path) => FitConfig::load(path)?,
    None => FitConfig {
      n_epoch: cli.epochs,
      batch_size: cli.batch_size,
      keep_prob: 1.0,
      ..model.default_fit()
    },
  };
  let log = model.fit(
    &mnist.train_images,
    &y_train,
    Some((&mnist.test_images, &y_test)),
    &fit,
  )?;

  let logits = model.predict(&mnist.test_images, fit.batch_size)?;
  let accuracy = logits.tracked().accuracy(&y_test);
  info!("final testing accuracy: {:.4}", accuracy);

  fs::create_dir_all(&cli.log_dir)?;
  let log_path = cli.log_dir.join("mnist_mlp.json");
  log.save(&log_path)?;
  info!("Wrote training history to {}", log_path.display());

  if let Some(path) = &cli.save {
    model.save(path)?;
    info!("Saved parameters to {}", path.display());
  }
  Ok(())
}
