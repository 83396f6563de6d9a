//! Parameter-owning network layers.
//!
//! Every layer keeps its trainable [Param]s under stable names, so
//! models can list them for optimization and checkpoints.

use rand::Rng;
use serde::{ Serialize, Deserialize };

use crate::{
  ops::*,
  scalar::Real,
  Tensor,
  Variable,
};


/// How a parameter gets (re-)initialized.

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Init {
  /// Standard normal distribution.
  Normal,
  Uniform(f64, f64),
  /// Normal distribution with given standard deviation,
  /// cut off at two standard deviations.
  TruncatedNormal(f64),
  GlorotUniform,
  Orthogonal,
  Constant(f64),
}

impl Init {
  pub fn generate<T: Real>(&self, dims: &[usize]) -> Tensor<T> {
    self.generate_with(dims, &mut rand::thread_rng())
  }

  pub fn generate_with<T: Real>(&self, dims: &[usize], rng: &mut impl Rng) -> Tensor<T> {
    let cast = |value: f64| T::from(value).unwrap();
    match *self {
      Self::Normal => Tensor::randn_with(dims, rng),
      Self::Uniform(low, high) => Tensor::uniform_with(dims, cast(low), cast(high), rng),
      Self::TruncatedNormal(std) => Tensor::truncated_normal_with(dims, cast(std), rng),
      Self::GlorotUniform => Tensor::glorot_uniform_with(dims, rng),
      Self::Orthogonal => {
        assert_eq!(dims.len(), 2, "Orthogonal initialization needs a matrix, got {:?}", dims);
        Tensor::orthogonal_with(dims[0], dims[1], rng)
      },
      Self::Constant(value) => Tensor::fill(dims, cast(value)),
    }
  }
}


/// A named, trainable tensor together with its initializer.

#[derive(Debug, Clone)]
pub struct Param<T: Real> {
  pub name: String,
  pub init: Init,
  pub value: Variable<T>,
}

impl<T: Real> Param<T> {
  pub fn new(name: &str, dims: &[usize], init: Init) -> Self {
    Self {
      name: name.to_string(),
      init,
      value: init.generate(dims).trained(),
    }
  }

  /// Draw fresh initial values in place.

  pub fn reinit(&self) {
    self.value.assign(&self.init.generate(self.value.dims()));
  }

  pub fn reinit_with(&self, rng: &mut impl Rng) {
    self.value.assign(&self.init.generate_with(self.value.dims(), rng));
  }
}


/// Anything that owns trainable parameters.

pub trait Module<T: Real> {
  fn params(&self) -> Vec<&Param<T>>;

  fn reinit(&self) {
    for param in self.params() {
      param.reinit();
    }
  }

  /// Re-initialize from `rng`, visiting parameters in [params](Module::params) order.

  fn reinit_with(&self, rng: &mut impl Rng) {
    for param in self.params() {
      param.reinit_with(rng);
    }
  }

  fn num_trainable(&self) -> usize {
    self.params().iter().map(|param| param.value.size() ).sum()
  }
}


/// Token embedding table of shape `[vocab, dims]`.

#[derive(Debug, Clone)]
pub struct Embedding<T: Real> {
  pub table: Param<T>,
}

impl<T: Real> Embedding<T> {
  pub fn new(name: &str, vocab_size: usize, dims: usize, init: Init) -> Self {
    Self { table: Param::new(&format!("{name}/table"), &[vocab_size, dims], init) }
  }

  /// Embed `[batch, len]` ids as `[batch, len, dims]`.

  pub fn run(&self, ids: &Tensor<usize>) -> Variable<T> {
    self.table.value.look_up(ids)
  }
}

impl<T: Real> Module<T> for Embedding<T> {
  fn params(&self) -> Vec<&Param<T>> {
    vec![&self.table]
  }
}


/// Fully connected layer computing `x·W + b`.

#[derive(Debug, Clone)]
pub struct Dense<T: Real> {
  pub weights: Param<T>,
  pub bias: Param<T>,
}

impl<T: Real> Dense<T> {
  pub fn new(name: &str, n_in: usize, n_out: usize, weight_init: Init, bias_init: Init) -> Self {
    Self {
      weights: Param::new(&format!("{name}/weights"), &[n_in, n_out], weight_init),
      bias: Param::new(&format!("{name}/bias"), &[n_out], bias_init),
    }
  }

  pub fn run(&self, input: &Variable<T>) -> Variable<T> {
    input.mm(&self.weights.value) + &self.bias.value
  }
}

impl<T: Real> Module<T> for Dense<T> {
  fn params(&self) -> Vec<&Param<T>> {
    vec![&self.weights, &self.bias]
  }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Padding {
  /// No padding, windows stay inside the input.
  Valid,
  /// Zero padding so that the output length is `ceil(len / stride)`.
  Same,
}


/// One dimensional convolution over `[batch, len, channels]`.

#[derive(Debug, Clone)]
pub struct Conv1d<T: Real> {
  pub kernel: Param<T>,
  pub bias: Param<T>,
  pub kernel_size: usize,
  pub stride: usize,
  pub padding: Padding,
}

impl<T: Real> Conv1d<T> {
  #[allow(clippy::too_many_arguments)]
  pub fn new(
    name: &str,
    kernel_size: usize,
    in_channels: usize,
    filters: usize,
    padding: Padding,
    stride: usize,
    kernel_init: Init,
    bias_init: Init,
  ) -> Self {
    assert!(kernel_size > 0 && stride > 0);
    Self {
      kernel: Param::new(&format!("{name}/kernel"), &[kernel_size, in_channels, filters], kernel_init),
      bias: Param::new(&format!("{name}/bias"), &[filters], bias_init),
      kernel_size,
      stride,
      padding,
    }
  }

  /// Output length and left padding for an input of `len` positions,
  /// or `None` if the input is too short for a valid convolution.

  pub fn geometry(&self, len: usize) -> Option<(usize, usize)> {
    match self.padding {
      Padding::Valid => {
        if len < self.kernel_size { return None }
        Some(((len - self.kernel_size) / self.stride + 1, 0))
      },
      Padding::Same => {
        if len == 0 { return None }
        let out_len = (len + self.stride - 1) / self.stride;
        let total = ((out_len - 1) * self.stride + self.kernel_size).saturating_sub(len);
        Some((out_len, total / 2))
      },
    }
  }

  pub fn run(&self, input: &Variable<T>) -> Variable<T> {
    let (kernel_size, in_channels, filters) = (self.kernel.value.dim(0), self.kernel.value.dim(1), self.kernel.value.dim(2));
    let (out_len, pad_left) = self.geometry(input.dim(1))
      .unwrap_or_else(|| panic!("Input of length {} is too short for a kernel of {}", input.dim(1), kernel_size) );
    let kernel = self.kernel.value.reshape(&[kernel_size * in_channels, filters]);
    input
      .windows(kernel_size, self.stride, pad_left, out_len)
      .mm(&kernel)
      + &self.bias.value
  }
}

impl<T: Real> Module<T> for Conv1d<T> {
  fn params(&self) -> Vec<&Param<T>> {
    vec![&self.kernel, &self.bias]
  }
}


/// Cell and hidden state of an [LstmCell].

#[derive(Debug, Clone)]
pub struct LstmState<T: Real> {
  pub c: Variable<T>,
  pub h: Variable<T>,
}

impl<T: Real> LstmState<T> {
  pub fn zeros(batch_size: usize, hidden: usize) -> Self {
    let zeros = Tensor::zeros(&[batch_size, hidden]).tracked();
    Self { c: zeros.clone(), h: zeros }
  }

  /// Constant copy that no gradient flows back through.

  pub fn detached(&self) -> Self {
    Self { c: self.c.detached(), h: self.h.detached() }
  }

  pub fn batch_size(&self) -> usize {
    self.h.dim(0)
  }
}


/// Long short-term memory cell with gates ordered input, candidate,
/// forget, output. The forget gate is biased by one.

#[derive(Debug, Clone)]
pub struct LstmCell<T: Real> {
  pub kernel: Param<T>,
  pub bias: Param<T>,
  pub input_size: usize,
  pub hidden_size: usize,
}

impl<T: Real> LstmCell<T> {
  pub fn new(name: &str, input_size: usize, hidden_size: usize) -> Self {
    Self {
      kernel: Param::new(&format!("{name}/kernel"), &[input_size + hidden_size, 4 * hidden_size], Init::Orthogonal),
      bias: Param::new(&format!("{name}/bias"), &[4 * hidden_size], Init::Constant(0.0)),
      input_size,
      hidden_size,
    }
  }

  pub fn zero_state(&self, batch_size: usize) -> LstmState<T> {
    LstmState::zeros(batch_size, self.hidden_size)
  }

  /// Advance by one position, given `[batch, input]` values.

  pub fn step(&self, input: &Variable<T>, state: &LstmState<T>) -> LstmState<T> {
    let split = self.input_size as isize;
    let kernel = &self.kernel.value;
    let gates = input.mm(&kernel.range(&[0..split]))
      + state.h.mm(&kernel.range(&[split..kernel.dim(0) as isize]))
      + &self.bias.value;
    let chunks = gates.chunks(4, -1);
    let (i, j, f, o) = (&chunks[0], &chunks[1], &chunks[2], &chunks[3]);
    let c = &state.c * (f + T::one()).sigmoid() + i.sigmoid() * j.tanh();
    let h = o.sigmoid() * c.tanh();
    LstmState { c, h }
  }

  /// Unroll over `[batch, len, input]`, returning all hidden
  /// outputs as `[batch, len, hidden]` and the final state.

  pub fn run(&self, inputs: &Variable<T>, initial: LstmState<T>) -> (Variable<T>, LstmState<T>) {
    let len = inputs.dim(1);
    assert!(len > 0, "Cannot unroll over empty sequences");
    let mut state = initial;
    let mut outputs = Vec::with_capacity(len);
    for t in 0..len {
      state = self.step(&inputs.select(1, t), &state);
      outputs.push(state.h.clone());
    }
    (Variable::stack(&outputs, 1), state)
  }
}

impl<T: Real> Module<T> for LstmCell<T> {
  fn params(&self) -> Vec<&Param<T>> {
    vec![&self.kernel, &self.bias]
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dense() {
    let dense = Dense::<f64>::new("dense", 3, 2, Init::Constant(1.0), Init::Constant(0.5));
    let x = Tensor::new(&[2,3], vec![1.0, 2.0, 3.0, 0.0, 0.0, 1.0]).tracked();
    assert_eq!(dense.run(&x).tensor(), &Tensor::new(&[2,2], vec![6.5, 6.5, 1.5, 1.5]));
    assert_eq!(dense.num_trainable(), 8);
    let names: Vec<_> = dense.params().iter().map(|p| p.name.clone() ).collect();
    assert_eq!(names, vec!["dense/weights", "dense/bias"]);
  }

  #[test]
  fn reinit_keeps_storage() {
    let dense = Dense::<f64>::new("dense", 4, 4, Init::TruncatedNormal(0.1), Init::Constant(0.1));
    let before = dense.weights.value.tensor().clone();
    dense.weights.value.assign(&Tensor::zeros(&[4,4]));
    dense.reinit();
    assert!(dense.weights.value.tensor().shared_with(&before));
    assert!(dense.weights.value.param_iter().any(|a| a != 0.0 ));
    assert!(dense.bias.value.param_iter().all(|a| a == 0.1 ));
  }

  #[test]
  fn seeded_reinit() {
    use rand::{ SeedableRng, rngs::StdRng };
    let cell = LstmCell::<f64>::new("cell", 3, 4);
    let other = LstmCell::<f64>::new("cell", 3, 4);
    cell.reinit_with(&mut StdRng::seed_from_u64(7));
    other.reinit_with(&mut StdRng::seed_from_u64(7));
    assert_eq!(cell.kernel.value.tensor(), other.kernel.value.tensor());
    other.reinit_with(&mut StdRng::seed_from_u64(8));
    assert_ne!(cell.kernel.value.tensor(), other.kernel.value.tensor());
  }

  #[test]
  fn embedding() {
    let embedding = Embedding::<f32>::new("embedding", 10, 4, Init::Uniform(-1.0, 1.0));
    let ids = Tensor::new(&[2,3], vec![0, 1, 2, 9, 9, 9]);
    let out = embedding.run(&ids);
    assert_eq!(out.dims(), &[2,3,4]);
    assert!(out.param_iter().all(|a| (-1.0..1.0).contains(&a) ));
    assert_eq!(out.tensor().at(&[1,0]), out.tensor().at(&[1,2]));
  }

  #[test]
  fn conv_geometry() {
    let conv = |padding, stride| Conv1d::<f32>::new("conv", 3, 2, 4, padding, stride, Init::Normal, Init::Constant(0.0));
    assert_eq!(conv(Padding::Valid, 1).geometry(10), Some((8, 0)));
    assert_eq!(conv(Padding::Valid, 2).geometry(10), Some((4, 0)));
    assert_eq!(conv(Padding::Valid, 1).geometry(2), None);
    assert_eq!(conv(Padding::Same, 1).geometry(10), Some((10, 1)));
    assert_eq!(conv(Padding::Same, 2).geometry(10), Some((5, 0)));
    assert_eq!(conv(Padding::Same, 3).geometry(7), Some((3, 1)));
  }

  #[test]
  fn conv_values() {
    // Summing kernel over two positions of one channel
    let conv = Conv1d::<f64>::new("conv", 2, 1, 1, Padding::Valid, 1, Init::Constant(1.0), Init::Constant(0.0));
    let x = Tensor::new(&[1,4,1], vec![1.0, 2.0, 3.0, 4.0]).tracked();
    assert_eq!(conv.run(&x).tensor(), &Tensor::new(&[1,3,1], vec![3.0, 5.0, 7.0]));
    let conv = Conv1d::<f64>::new("conv", 3, 1, 1, Padding::Same, 1, Init::Constant(1.0), Init::Constant(1.0));
    assert_eq!(conv.run(&x).tensor(), &Tensor::new(&[1,4,1], vec![4.0, 7.0, 10.0, 8.0]));
  }

  #[test]
  fn conv_gradient() {
    let conv = Conv1d::<f64>::new("conv", 3, 2, 3, Padding::Same, 2, Init::Normal, Init::Normal);
    let diff = Variable::<f64>::check_gradients(&[2,5,2], |x| conv.run(x) );
    assert!(diff < 1e-6);
  }

  #[test]
  fn lstm_shapes() {
    let cell = LstmCell::<f64>::new("lstm", 3, 5);
    assert_eq!(cell.kernel.value.dims(), &[8, 20]);
    let x = Tensor::randn(&[2,4,3]).tracked();
    let (outputs, state) = cell.run(&x, cell.zero_state(2));
    assert_eq!(outputs.dims(), &[2,4,5]);
    assert_eq!(state.h.dims(), &[2,5]);
    assert_eq!(outputs.tensor().select(1, 3), *state.h.tensor());
    assert!(state.h.param_iter().all(|a| a > -1.0 && a < 1.0 ));
  }

  #[test]
  fn lstm_forget_bias() {
    // With zero weights every gate sees only its bias
    let cell = LstmCell::<f64>::new("lstm", 1, 1);
    cell.kernel.value.assign(&Tensor::zeros(&[2,4]));
    let state = LstmState {
      c: Tensor::new(&[1,1], vec![2.0]).tracked(),
      h: Tensor::zeros(&[1,1]).tracked(),
    };
    let next = cell.step(&Tensor::zeros(&[1,1]).tracked(), &state);
    let forget = 1.0 / (1.0 + (-1.0f64).exp());
    approx::assert_relative_eq!(next.c.item(), 2.0 * forget, epsilon = 1e-12);
    approx::assert_relative_eq!(next.h.item(), 0.5 * (2.0 * forget).tanh(), epsilon = 1e-12);
  }

  #[test]
  fn lstm_gradient() {
    let cell = LstmCell::<f64>::new("lstm", 2, 3);
    let diff = Variable::<f64>::check_gradients(&[2,3,2], |x| cell.run(x, cell.zero_state(2)).0 );
    assert!(diff < 1e-6);
  }
}
