use std::ops::Range;

use crate::{
  internal::*,
  shape::Shape,
  tensor::Tensor,
  scalar::{ Inner, Numeric, Signed, Real },
  ops::{ Gemm, BaseOps, NumericOps, RealOps },
};


impl<T: Inner> BaseOps<T> for Tensor<T> {
  fn scalar(item: T) -> Self {
    Self::new(&[], vec![item])
  }

  fn shape(&self) -> &Shape {
    &self.shape
  }

  fn range(&self, ranges: &[Range<isize>]) -> Self {
    let shape = self.shape.range(ranges);
    Self { shape, data: self.data.clone() }
  }

  fn broadcast(&self, shape: &Shape) -> Self {
    Self {
      shape: self.shape.broadcast(shape),
      data: self.data.clone(),
    }
  }

  fn reshape(&self, dims: &[usize]) -> Self {
    self.contiguous().view(dims)
  }

  fn transpose(&self, dim1: isize, dim2: isize) -> Self {
    let shape = self.shape.transpose(dim1, dim2);
    Self { shape, data: self.data.clone() }
  }

  fn unsqueeze(&self, dim: isize) -> Self {
    let shape = self.shape.unsqueeze(dim);
    Self { shape, data: self.data.clone() }
  }

  fn squeeze_only(&self, dim: isize) -> Self {
    let shape = self.shape.squeeze_only(dim);
    Self { shape, data: self.data.clone() }
  }
}

impl<T: Numeric> NumericOps<T> for Tensor<T> {
  fn sum(&self, dim: isize) -> Self {
    self.collapse(dim, |lane| lane.iter().copied().sum() )
  }

  fn max(&self, dim: isize) -> Self {
    self.collapse(dim, |lane| {
      lane.iter()
        .copied()
        .reduce(|acc, a| if a > acc { a } else { acc } )
        .unwrap()
    })
  }
}

impl<T: Real> RealOps<T> for Tensor<T> {
  /// Multiply matrices. Supports `[m,k]·[k,n]` as well as batched
  /// `[b,m,k]·[b,k,n]` and `[b,m,k]·[k,n]`.

  fn mm(&self, rhs: &Self) -> Self {
    match (self.rank(), rhs.rank()) {
      (2, 2) => {
        let (m, k, n) = (self.shape[0], self.shape[1], rhs.shape[1]);
        assert_eq!(k, rhs.shape[0], "Cannot multiply {} with {}", self.shape, rhs.shape);
        let data = matmul(self, rhs);
        Self::new(&[m, n], data)
      },
      (3, 2) | (3, 3) => {
        let rhs = if rhs.rank() == 2 { rhs.unsqueeze(0).broadcast(&Shape::new(&[self.shape[0], 1, 1])) } else { rhs.clone() };
        assert_eq!(self.shape[0], rhs.shape[0], "Batch sizes of {} and {} differ", self.shape, rhs.shape);
        assert_eq!(self.shape[2], rhs.shape[1], "Cannot multiply {} with {}", self.shape, rhs.shape);
        let (b, m, n) = (self.shape[0], self.shape[1], rhs.shape[2]);
        let data = batched_matmul(self, &rhs);
        Self::new(&[b, m, n], data)
      },
      _ => panic!("Cannot multiply {} with {}", self.shape, rhs.shape),
    }
  }

  fn exp(&self) -> Self {
    self.vectorize(|a| a.exp() )
  }

  fn log(&self) -> Self {
    self.vectorize(|a| a.ln() )
  }

  fn tanh(&self) -> Self {
    self.vectorize(|a| a.tanh() )
  }

  fn relu(&self) -> Self {
    self.vectorize(|a| if a > T::zero() { a } else { T::zero() } )
  }

  fn sigmoid(&self) -> Self {
    self.vectorize(|a| T::one() / (T::one() + (-a).exp()) )
  }
}

fn matmul<T: Real>(lhs: &Tensor<T>, rhs: &Tensor<T>) -> Vec<T> {
  let data_l = lhs.raw();
  let data_r = rhs.raw();
  T::gemm(
    lhs.shape[0], lhs.shape[1], rhs.shape[1],
    &data_l[lhs.shape.offset..], lhs.shape.strides[0], lhs.shape.strides[1],
    &data_r[rhs.shape.offset..], rhs.shape.strides[0], rhs.shape.strides[1],
  )
}

fn batched_matmul<T: Real>(lhs: &Tensor<T>, rhs: &Tensor<T>) -> Vec<T> {
  let (m, k, n) = (lhs.shape[1], lhs.shape[2], rhs.shape[2]);
  let data_l = lhs.raw();
  let data_r = rhs.raw();
  let (data_l, data_r): (&[T], &[T]) = (&data_l, &data_r);
  let (shape_l, shape_r) = (&lhs.shape, &rhs.shape);

  let entry = |i: usize| {
    let offset_l = (shape_l.offset as isize + i as isize * shape_l.strides[0]) as usize;
    let offset_r = (shape_r.offset as isize + i as isize * shape_r.strides[0]) as usize;
    T::gemm(
      m, k, n,
      &data_l[offset_l..], shape_l.strides[1], shape_l.strides[2],
      &data_r[offset_r..], shape_r.strides[1], shape_r.strides[2],
    )
  };

  #[cfg(feature = "rayon")]
  let data = {
    use rayon::prelude::*;
    (0..lhs.shape[0]).into_par_iter()
      .map(entry)
      .collect::<Vec<_>>()
      .concat()
  };

  #[cfg(not(feature = "rayon"))]
  let data = (0..lhs.shape[0])
    .flat_map(entry)
    .collect();

  data
}

impl<T: Signed> std::ops::Neg for &Tensor<T> {
  type Output = Tensor<T>;

  fn neg(self) -> Self::Output {
    self.vectorize(|a| -a )
  }
}

impl<T: Signed> std::ops::Neg for Tensor<T> {
  type Output = Tensor<T>;

  fn neg(self) -> Self::Output {
    -&self
  }
}

macro_rules! add_operator {
  ($trait:ident, $meth:ident, $symbol:tt) => {
    impl<T: Numeric> std::ops::$trait for &Tensor<T> { // &self * &other
      type Output = Tensor<T>;

      fn $meth(self, rhs: Self) -> Tensor<T> {
        self.zip(rhs, |(a, b)| a $symbol b )
      }
    }

    impl<T: Numeric> std::ops::$trait for Tensor<T> { // tensor * other
      type Output = Tensor<T>;

      fn $meth(self, rhs: Self) -> Tensor<T> {
        &self $symbol &rhs
      }
    }

    impl<T: Numeric> std::ops::$trait<Tensor<T>> for &Tensor<T> { // &tensor * other
      type Output = Tensor<T>;

      fn $meth(self, rhs: Tensor<T>) -> Tensor<T> {
        self $symbol &rhs
      }
    }

    impl<T: Numeric> std::ops::$trait<&Tensor<T>> for Tensor<T> { // tensor * &other
      type Output = Tensor<T>;

      fn $meth(self, rhs: &Tensor<T>) -> Tensor<T> {
        &self $symbol rhs
      }
    }

    impl<T: Numeric> std::ops::$trait<T> for &Tensor<T> { // &tensor * T
      type Output = Tensor<T>;

      fn $meth(self, rhs: T) -> Tensor<T> {
        self.vectorize(|a| a $symbol rhs )
      }
    }

    impl<T: Numeric> std::ops::$trait<T> for Tensor<T> { // tensor * T
      type Output = Tensor<T>;

      fn $meth(self, rhs: T) -> Tensor<T> {
        &self $symbol rhs
      }
    }
  };
}

add_operator!(Add, add, +);
add_operator!(Sub, sub, -);
add_operator!(Mul, mul, *);
add_operator!(Div, div, /);
