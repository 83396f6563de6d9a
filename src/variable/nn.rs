use crate::{
  internal::*,
  tensor::Tensor,
  variable::{ Variable, UnaryOp, MultiOp },
  scalar::Real,
  ops::{ BaseOps, NumericOps, RealOps },
};


impl<T: Real> Variable<T> {
  /// Stack equally shaped variables along a new dimension.

  pub fn stack(inputs: &[Self], dim: isize) -> Self {
    assert!(!inputs.is_empty(), "Cannot stack zero variables");
    let refs: Vec<&Self> = inputs.iter().collect();
    Self::multi_op(Stack { dim }, &refs)
  }

  /// Gather rows of this `[vocab, dims]` table for every id,
  /// producing a tensor of shape `[...ids, dims]`.

  pub fn look_up(&self, ids: &Tensor<usize>) -> Self {
    self.unary_op(LookUp { ids: ids.to_vec(), dims: ids.dims().to_vec() })
  }

  /// Unfold `[batch, len, channels]` into overlapping windows of
  /// `kernel` positions, zero padded by `pad_left` in front.
  /// Produces `[batch, out_len, kernel * channels]`.

  pub fn windows(&self, kernel: usize, stride: usize, pad_left: usize, out_len: usize) -> Self {
    self.unary_op(Windows { kernel, stride, pad_left, out_len })
  }

  /// Per row cross-entropy between `softmax(self)` and `targets`,
  /// both shaped `[batch, classes]`.

  pub fn softmax_cross_entropy_rows(&self, targets: &Tensor<T>) -> Self {
    self.unary_op(SoftmaxCrossEntropy { targets: targets.clone() })
  }
}


#[derive(Debug, Clone)]
pub struct Stack {
  dim: isize,
}

impl Stack {
  fn position(&self, rank: usize) -> usize {
    negative_index(self.dim, rank, true)
  }
}

impl<T: Real> MultiOp<T> for Stack {
  fn run(&self, inputs: &[&Tensor<T>]) -> Tensor<T> {
    let dim = self.position(inputs[0].rank());
    let mut dims = inputs[0].dims().to_vec();
    dims.insert(dim, inputs.len());
    let out = Tensor::zeros(&dims);
    for (i, input) in inputs.iter().enumerate() {
      assert_eq!(input.dims(), inputs[0].dims(), "Cannot stack differently shaped tensors");
      out.select(dim as isize, i).assign(input);
    }
    out
  }

  fn derive(&self, inputs: &[&Tensor<T>], grad: &Tensor<T>) -> Vec<Tensor<T>> {
    let dim = self.position(inputs[0].rank()) as isize;
    (0..inputs.len())
      .map(|i| grad.select(dim, i) )
      .collect()
  }
}


#[derive(Debug, Clone)]
pub struct LookUp {
  ids: Vec<usize>,
  dims: Vec<usize>,
}

impl<T: Real> UnaryOp<T> for LookUp {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    let vocab = lhs.dim(0);
    if let Some(id) = self.ids.iter().find(|&&id| id >= vocab ) {
      panic!("Id {} out of range for vocabulary of {}", id, vocab);
    }
    let mut dims = self.dims.clone();
    dims.push(lhs.dim(1));
    lhs.select_rows(&self.ids).reshape(&dims)
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    let width = lhs.dim(1);
    let out = Tensor::zeros(lhs.dims());
    {
      let grad = grad.to_vec();
      let mut raw = out.raw_mut();
      for (row, &id) in self.ids.iter().enumerate() {
        for j in 0..width {
          raw[id * width + j] += grad[row * width + j];
        }
      }
    }
    out
  }
}


#[derive(Debug, Clone)]
pub struct Windows {
  kernel: usize,
  stride: usize,
  pad_left: usize,
  out_len: usize,
}

impl Windows {
  // Calls `cb(source, target, channels)` for every window row that
  // overlaps the unpadded input
  fn for_each_window(&self, dims: &[usize], mut cb: impl FnMut(usize, usize, usize)) {
    let (batch, len, channels) = (dims[0], dims[1], dims[2]);
    let width = self.kernel * channels;
    for b in 0..batch {
      for t in 0..self.out_len {
        for k in 0..self.kernel {
          let pos = (t * self.stride + k) as isize - self.pad_left as isize;
          if pos < 0 || pos >= len as isize { continue }
          let source = (b * len + pos as usize) * channels;
          let target = (b * self.out_len + t) * width + k * channels;
          cb(source, target, channels);
        }
      }
    }
  }
}

impl<T: Real> UnaryOp<T> for Windows {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    assert_eq!(lhs.rank(), 3, "Windows expect [batch, len, channels], got {}", lhs.shape());
    let input = lhs.to_vec();
    let width = self.kernel * lhs.dim(2);
    let mut out = vec![T::zero(); lhs.dim(0) * self.out_len * width];
    self.for_each_window(lhs.dims(), |source, target, n| {
      out[target..target + n].copy_from_slice(&input[source..source + n]);
    });
    Tensor::new(&[lhs.dim(0), self.out_len, width], out)
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    let grad = grad.to_vec();
    let mut out = vec![T::zero(); lhs.size()];
    self.for_each_window(lhs.dims(), |source, target, n| {
      for i in 0..n {
        out[source + i] += grad[target + i];
      }
    });
    Tensor::new(lhs.dims(), out)
  }
}


#[derive(Debug, Clone)]
pub struct SoftmaxCrossEntropy<T: Real> {
  targets: Tensor<T>,
}

fn log_softmax<T: Real>(logits: &Tensor<T>) -> Tensor<T> {
  let shifted = logits - &logits.max(-1).unsqueeze(-1);
  let normalizer = shifted.exp().sum(-1).log().unsqueeze(-1);
  shifted - normalizer
}

impl<T: Real> UnaryOp<T> for SoftmaxCrossEntropy<T> {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    assert_eq!(lhs.dims(), self.targets.dims(),
      "Logits {} don't match targets {}", lhs.shape(), self.targets.shape());
    -(&self.targets * &log_softmax(lhs)).sum(-1)
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    let probs = log_softmax(lhs).exp();
    let mass = self.targets.sum_over(-1);
    (probs * mass - &self.targets) * grad.unsqueeze(-1)
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_relative_eq;

  const TOLERANCE: f64 = 1e-6;

  #[test]
  fn stack() {
    let a = Tensor::vec(&[1.0, 2.0]).trained();
    let b = Tensor::vec(&[3.0, 4.0]).trained();
    let rows = Variable::stack(&[a.clone(), b.clone()], 0);
    assert_eq!(rows.tensor(), &Tensor::new(&[2,2], vec![1.0, 2.0, 3.0, 4.0]));
    let cols = Variable::stack(&[a.clone(), b.clone()], -1);
    assert_eq!(cols.tensor(), &Tensor::new(&[2,2], vec![1.0, 3.0, 2.0, 4.0]));
    (cols * Tensor::vec(&[1.0, 10.0]).tracked()).sum(-1).sum(0).backward();
    assert_eq!(a.grad().unwrap(), &Tensor::vec(&[1.0, 1.0]));
    assert_eq!(b.grad().unwrap(), &Tensor::vec(&[10.0, 10.0]));
  }

  #[test]
  fn check_stack() {
    let diff = Variable::<f64>::check_gradients(&[2,3], |x| {
      let y = x * 2.0;
      Variable::stack(&[x.clone(), y, x.exp()], 1)
    });
    assert!(diff < TOLERANCE);
  }

  #[test]
  fn look_up() {
    let table = Tensor::arrange(&[4,2], 0.0, 1.0).trained();
    let ids = Tensor::new(&[2,2], vec![3, 0, 3, 1]);
    let rows = table.look_up(&ids);
    assert_eq!(rows.dims(), &[2,2,2]);
    assert_eq!(rows.tensor().at(&[0,0]), Tensor::vec(&[6.0, 7.0]));
    let size = rows.size();
    rows.reshape(&[size]).sum(0).backward();
    assert_eq!(table.grad().unwrap(), &Tensor::new(&[4,2], vec![1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 2.0, 2.0]));
  }

  #[test]
  #[should_panic]
  fn look_up_out_of_range() {
    let table = Tensor::<f32>::zeros(&[3,2]).trained();
    table.look_up(&Tensor::vec(&[3]));
  }

  #[test]
  fn windows() {
    // Two positions of two channels, kernel of two, padded by one in front
    let x = Tensor::new(&[1,2,2], vec![1.0, 2.0, 3.0, 4.0]).trained();
    let w = x.windows(2, 1, 1, 2);
    assert_eq!(w.tensor(), &Tensor::new(&[1,2,4], vec![
      0.0, 0.0, 1.0, 2.0,
      1.0, 2.0, 3.0, 4.0,
    ]));
  }

  #[test]
  fn check_windows() {
    let diff = Variable::<f64>::check_gradients(&[2,5,3], |x| x.windows(3, 2, 1, 3) * x.windows(3, 2, 1, 3) );
    assert!(diff < TOLERANCE);
    let diff = Variable::<f64>::check_gradients(&[1,4,2], |x| x.windows(2, 1, 0, 3).exp() );
    assert!(diff < TOLERANCE);
  }

  #[test]
  fn cross_entropy_value() {
    let logits = Tensor::new(&[1,3], vec![1.0, 2.0, 3.0]).trained();
    let targets = Tensor::new(&[1,3], vec![0.0, 0.0, 1.0]);
    let loss = logits.softmax_cross_entropy_rows(&targets);
    let expected = -(3.0f64.exp() / (1.0f64.exp() + 2.0f64.exp() + 3.0f64.exp())).ln();
    assert_relative_eq!(loss.item(), expected, epsilon = 1e-12);
  }

  #[test]
  fn cross_entropy_is_stable() {
    let logits = Tensor::<f64>::new(&[1,2], vec![1000.0, 0.0]).tracked();
    let targets = Tensor::new(&[1,2], vec![1.0, 0.0]);
    let loss = logits.softmax_cross_entropy_rows(&targets);
    assert!(loss.item().is_finite());
    assert_relative_eq!(loss.item(), 0.0, epsilon = 1e-12);
  }

  #[test]
  fn check_cross_entropy() {
    let targets = Tensor::new(&[3,4], vec![
      1.0, 0.0, 0.0, 0.0,
      0.0, 0.0, 1.0, 0.0,
      0.0, 0.5, 0.0, 0.5,
    ]);
    let diff = Variable::<f64>::check_gradients(&[3,4], |x| x.softmax_cross_entropy_rows(&targets) * 3.0 );
    assert!(diff < TOLERANCE);
  }
}
