//! Text and image classifiers, trained with a tiny automatic
//! differentiation engine. CPU only.
//!
//! # Features
//!
//! - **Auto-grad** — Operations on [Variable]s get recorded eagerly and
//! back-propagated to every trainable parameter involved.
//!
//! - **Broadcasting** — Tensors with differing but compatible shapes get
//! broadcasted to matching dimensions automatically for most operations.
//!
//! - **Ready-made models** — A convolutional and a recurrent text classifier
//! working on token ids, plus a multilayer perceptron for dense features.
//!
//! - **Training loop** — Minibatches, shuffling, exponential learning rate decay,
//! gradient clipping and per-epoch validation through [Classifier::fit].
//!
//! - **Checkpoints** — Parameters are saved by name and restored only when
//! every shape matches.
//!
//! # Examples
//!
//! Fitting a small perceptron:
//! ```
//! use microclassifier::{ Tensor, Classifier, config::{ MlpConfig, FitConfig }, models::MlpClassifier };
//!
//! let model = MlpClassifier::<f32>::new(MlpConfig { hidden_unit_list: vec![8], ..MlpConfig::new(2, 2) }).unwrap();
//!
//! let x = Tensor::new(&[4, 2], vec![0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0]);
//! let y = Tensor::new(&[4, 2], vec![1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0]);
//!
//! let config = FitConfig { n_epoch: 3, batch_size: 2, keep_prob: 1.0, ..FitConfig::default() };
//! let log = model.fit(&x, &y, None, &config).unwrap();
//! assert_eq!(log.loss.len(), 3);
//!
//! let logits = model.predict(&x, 2).unwrap();
//! assert_eq!(logits.dims(), &[4, 2]);
//! ```
//!
//! Minimizing a function by hand:
//! ```
//! use microclassifier::{ ops::*, Tensor, optimize::{ Optimizer, Adam } };
//!
//! let w = Tensor::<f32>::randn(&[2, 8]).trained();
//! let b = Tensor::<f32>::zeros(&[8]).trained();
//! let mut optimizer = Optimizer::new(0.001, Adam::default());
//!
//! for _ in 0..10 {
//!   let x = Tensor::new(&[1, 2], vec![1.0, 2.0]).tracked();
//!   let error = (x.mm(&w) + &b).tanh() - 0.5;
//!   let loss = (&error * &error).mean(-1).mean(0);
//!   optimizer.minimize(&loss, &loss.parameters());
//! }
//! ```
//!
//! # Optional features
//!
//! - `unsafe` *(default)* — Accelerated matrix math using [matrixmultiply] crate.
//! - `rayon` — Parallel batched matrix multiplication.

mod internal;
mod shape;
mod tensor;
mod variable;

pub mod ops;
pub mod scalar;
pub mod optimize;
pub mod layers;
pub mod schedule;
pub mod data;
pub mod config;
pub mod checkpoint;
pub mod classifier;
pub mod models;
pub mod error;

pub use shape::Shape;
pub use tensor::Tensor;
pub use variable::{ Variable, Layer, UnaryOp, BinaryOp, MultiOp };
pub use classifier::{ Classifier, TrainLog };
pub use error::{ Error, Result };
