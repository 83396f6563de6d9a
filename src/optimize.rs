use std::collections::HashMap;

use crate::{
  scalar::Real,
  tensor::Tensor,
  variable::Variable,
};


/// An optimization strategy to be used with [Optimizer].

pub trait Strategy<R: Real> {
  fn update(&mut self, param: &Variable<R>, grad: &Tensor<R>, rate: R, step: usize) -> Tensor<R>;
}


/// Generic optimizer that applies a [Strategy] to every trainable
/// parameter, optionally clipping gradients by their global norm first.

#[derive(Debug)]
pub struct Optimizer<R: Real, S: Strategy<R>> {
  strategy: S,
  pub learning_rate: R,
  pub clip_norm: Option<R>,
  step: usize,
}

impl<R: Real, S: Strategy<R>> Optimizer<R, S> {
  pub fn new(learning_rate: R, strategy: S) -> Self {
    Self { strategy, learning_rate, clip_norm: None, step: 1 }
  }

  pub fn with_clipping(mut self, clip_norm: R) -> Self {
    self.clip_norm = Some(clip_norm);
    self
  }

  pub fn step(&self) -> usize {
    self.step
  }

  /// Back-propagate `loss`, update `params` and reset all gradients.

  pub fn minimize(&mut self, loss: &Variable<R>, params: &[Variable<R>]) {
    // Compute gradients
    loss.backward();

    let scale = match self.clip_norm {
      Some(clip_norm) => clip_factor(global_norm(params), clip_norm),
      None => R::one(),
    };

    // Optimize individual parameters
    for param in params {
      let grad = param.grad().expect("Non-trainable parameters cannot be optimized");
      let grad = if scale < R::one() { grad * scale } else { grad.clone() };

      // Execute strategy
      let change = self.strategy.update(param, &grad, self.learning_rate, self.step);

      // Apply change
      let weights = param.tensor();
      weights.assign(&(weights + change));
    }

    // Reset gradients
    loss.reset();

    self.step += 1;
  }
}


/// Euclidean norm over the gradients of all `params` together.

pub fn global_norm<R: Real>(params: &[Variable<R>]) -> R {
  params.iter()
    .filter_map(|param| param.grad() )
    .flat_map(|grad| grad.to_vec() )
    .fold(R::zero(), |acc, g| acc + g * g )
    .sqrt()
}

/// Factor that scales gradients of global norm `norm`
/// down to at most `clip_norm`.

pub fn clip_factor<R: Real>(norm: R, clip_norm: R) -> R {
  if norm > clip_norm { clip_norm / norm } else { R::one() }
}


/// Adaptive Movement Estimation strategy (ADAM)

#[derive(Debug, Clone)]
pub struct Adam<R: Real> {
  pub beta1: R,
  pub beta2: R,
  pub epsilon: R,
  m: HashMap<usize, Tensor<R>>,
  v: HashMap<usize, Tensor<R>>,
}

impl<R: Real> Adam<R> {
  pub fn new(beta1: R, beta2: R, epsilon: R) -> Self {
    Self {
      beta1,
      beta2,
      epsilon,
      m: HashMap::new(),
      v: HashMap::new(),
    }
  }
}

impl<R: Real> Default for Adam<R> {
  fn default() -> Self {
    Self::new(R::from(0.9).unwrap(), R::from(0.999).unwrap(), R::from(1e-8).unwrap())
  }
}

impl<R: Real> Strategy<R> for Adam<R> {
  fn update(&mut self, param: &Variable<R>, grad: &Tensor<R>, rate: R, step: usize) -> Tensor<R> {
    let id = param.id();
    let m = self.m.entry(id).or_insert_with(|| Tensor::zeros(param.dims()) );
    m.assign(&(&*m * self.beta1 + grad * (R::one() - self.beta1)));
    let v = self.v.entry(id).or_insert_with(|| Tensor::zeros(param.dims()) );
    v.assign(&(&*v * self.beta2 + grad.sqr() * (R::one() - self.beta2)));
    let step = R::from(step).unwrap();
    let mt = &self.m[&id] / (R::one() - self.beta1.powf(step));
    let vt = &self.v[&id] / (R::one() - self.beta2.powf(step));
    mt * -rate / (vt.sqrt() + self.epsilon)
  }
}
