use std::ops::Range;

use crate::internal::*;
use crate::Shape;
use crate::scalar::{ Inner, Numeric, Real };


/// Low-level matrix kernel.
///
/// Computes `a · b` for an `m×k` and a `k×n` matrix given as
/// strided slices, returning a contiguous `m×n` result.

pub trait Gemm: Sized {
  #[allow(clippy::too_many_arguments)]
  fn gemm(
    m: usize, k: usize, n: usize,
    a: &[Self], rsa: isize, csa: isize,
    b: &[Self], rsb: isize, csb: isize,
  ) -> Vec<Self>;
}


/// Differentiable mid-level operations that are also implemented
/// for non-differentiable [Inner] types.

pub trait BaseOps<I: Inner>: Clone {
  fn scalar(item: I) -> Self;
  fn shape(&self) -> &Shape;
  fn range(&self, ranges: &[Range<isize>]) -> Self;
  fn broadcast(&self, shape: &Shape) -> Self;
  fn reshape(&self, dims: &[usize]) -> Self;
  fn transpose(&self, dim1: isize, dim2: isize) -> Self;

  fn dim(&self, dim: isize) -> usize {
    self.shape()[dim]
  }

  fn unsqueeze(&self, dim: isize) -> Self {
    self.reshape(&self.shape().unsqueeze(dim).dims)
  }

  fn squeeze_only(&self, dim: isize) -> Self {
    self.reshape(&self.shape().squeeze_only(dim).dims)
  }

  /// Slice a single position out of `dim`, removing that dimension.

  fn select(&self, dim: isize, index: usize) -> Self {
    let dim = negative_index(dim, self.shape().rank(), false);
    let mut ranges: Vec<Range<isize>> = self.shape().dims[..=dim].iter()
      .map(|&n| 0..n as isize )
      .collect();
    ranges[dim] = index as isize..index as isize + 1;
    self.range(&ranges).squeeze_only(dim as isize)
  }

  /// Split the last dimension into `n` equally sized parts.

  fn chunks(&self, n: usize, dim: isize) -> Vec<Self> {
    let dim = negative_index(dim, self.shape().rank(), false);
    let size = self.shape().dims[dim];
    assert_eq!(size % n, 0, "Cannot split {} into {} chunks", self.shape(), n);
    let step = size / n;
    (0..n).map(|i| {
      let mut ranges: Vec<Range<isize>> = self.shape().dims[..=dim].iter()
        .map(|&n| 0..n as isize )
        .collect();
      ranges[dim] = (i * step) as isize..((i + 1) * step) as isize;
      self.range(&ranges)
    }).collect()
  }
}


/// Differentiable mid-level operations that are also implemented
/// for non-differentiable [Numeric] inner types.
///
/// Reductions remove the reduced dimension.

pub trait NumericOps<I: Numeric>: Sized {
  fn sum(&self, dim: isize) -> Self;
  fn max(&self, dim: isize) -> Self;
}


/// Differentiable mid-level operations.

pub trait RealOps<I: Real>: std::ops::Neg {
  fn mm(&self, rhs: &Self) -> Self;
  fn exp(&self) -> Self;
  fn log(&self) -> Self;
  fn tanh(&self) -> Self;
  fn relu(&self) -> Self;
  fn sigmoid(&self) -> Self;
}


/// High-level operations, implemented exclusively on top of
/// mid-level operations. As a result, these are all
/// differentiable when called on a [Variable](crate::Variable).

pub trait Hops<I>: BaseOps<I> + NumericOps<I> + RealOps<I>
where
  I: Real,
  Self: std::ops::Div<I, Output = Self>,
  for<'a> &'a Self:
    std::ops::Sub<&'a Self, Output = Self> +
    std::ops::Mul<&'a Self, Output = Self> +
    std::ops::Div<&'a Self, Output = Self>,
{
  fn mean(&self, dim: isize) -> Self {
    let n = I::from(self.dim(dim)).unwrap();
    self.sum(dim) / n
  }

  fn softmax(&self, dim: isize) -> Self {
    let dim = negative_index(dim, self.shape().rank(), false) as isize;
    let exp = (self - &self.max(dim).unsqueeze(dim)).exp();
    &exp / &exp.sum(dim).unsqueeze(dim)
  }

  fn dot(&self, rhs: &Self, dim: isize) -> Self {
    (self * rhs).sum(dim)
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::Tensor;
  use approx::assert_relative_eq;

  #[test]
  fn mean() {
    let a = Tensor::new(&[3,2], vec![1., 2., 3., 4., 5., 6.]).trained();
    assert_eq!(a.mean(0).tensor(), &Tensor::vec(&[3.0, 4.0]));
    assert_eq!(a.mean(-1).tensor(), &Tensor::vec(&[1.5, 3.5, 5.5]));
  }

  #[test]
  fn softmax() {
    let a = Tensor::arrange(&[3,2], 1.0, 1.0).softmax(-1);
    for row in a.iter(0) {
      assert_relative_eq!(row.sum(0).item(), 1.0, epsilon = 1e-6);
    }
  }

  #[test]
  fn softmax_first_dim() {
    let a = Tensor::<f64>::arrange(&[2,3], 0.0, 1.0).softmax(0);
    let totals = a.sum(0);
    for total in totals.param_iter() {
      assert_relative_eq!(total, 1.0, epsilon = 1e-9);
    }
  }

  #[test]
  fn select_and_chunks() {
    let a = Tensor::arrange(&[2,3,4], 0.0, 1.0);
    assert_eq!(a.select(1, 2), Tensor::new(&[2,4], vec![8., 9., 10., 11., 20., 21., 22., 23.]));
    let parts = a.chunks(2, -1);
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[1].shape().dims, vec![2,3,2]);
    assert_eq!(parts[1].at(&[0,0]), Tensor::vec(&[2., 3.]));
  }
}
