use std::rc::Rc;
use std::cell::{Ref, RefMut, RefCell};
use std::fmt::Debug;

use rand::Rng;
use serde::{Serialize, Deserialize};

mod cops;
mod lops;

use crate::{
  internal::*,
  shape::Shape,
  variable::Variable,
  scalar::{ Inner, Numeric, Real },
  ops::{ BaseOps, Hops },
};


/// Multidimensional array.
///
/// Tensors may contain any type that satisfies [Inner], but
/// additional methods are available for [Numeric], [Real]
/// and [boolean](bool) inner types.
///
/// Storage is shared between a tensor and all views created from it.
/// Writing to a view through [assign](Tensor::assign) is visible in the original.
///
/// [Real] tensor types can be wrapped in a [Variable] by
/// calling [tracked](Tensor::tracked) or [trained](Tensor::trained).

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tensor<T: Inner> {
  shape: Shape,
  data: Rc<RefCell<Vec<T>>>,
}

impl<T: Real> Hops<T> for Tensor<T> {}

impl<T: Inner> PartialEq for Tensor<T> {
  fn eq(&self, rhs: &Self) -> bool {
    if self.shape.dims != rhs.shape.dims { return false }
    self.param_iter().zip(rhs.param_iter()).all(|(a, b)| a == b )
  }
}

impl<T: Inner> Tensor<T> {
  pub fn from_shape(shape: Shape, data: Vec<T>) -> Self {
    assert_eq!(shape.size(), data.len(),
      "{} doesn't match data length {}", shape, data.len());
    Self { shape, data: Rc::new(RefCell::new(data)) }
  }

  pub fn new(dims: &[usize], data: Vec<T>) -> Self {
    Self::from_shape(Shape::new(dims), data)
  }

  pub fn vec(vec: &[T]) -> Self {
    Self::new(&[vec.len()], vec.to_vec())
  }

  pub fn from_vec(vec: Vec<T>) -> Self {
    Self::new(&[vec.len()], vec)
  }

  pub fn fill(dims: &[usize], filler: T) -> Self {
    Self::new(dims, vec![filler; dims.iter().product()])
  }

  /// Stack equally shaped tensors along a new leading dimension.

  pub fn rows(rows: &[Tensor<T>]) -> Self {
    assert!(!rows.is_empty(), "Cannot stack zero rows");
    let mut dims = rows[0].shape.dims.clone();
    dims.insert(0, rows.len());
    let data = rows.iter()
      .flat_map(|row| row.param_iter().collect::<Vec<_>>() )
      .collect();
    Self::new(&dims, data)
  }

  /// Concatenate tensors along their existing first dimension.

  pub fn concat_rows(rows: &[Tensor<T>]) -> Self {
    assert!(!rows.is_empty(), "Cannot concatenate zero tensors");
    let mut dims = rows[0].shape.dims.clone();
    dims[0] = rows.iter().map(|row| row.shape[0] ).sum();
    let data = rows.iter()
      .flat_map(|row| {
        assert_eq!(row.shape.dims[1..], dims[1..], "Cannot concatenate {} with {:?}", row.shape, dims);
        row.param_iter().collect::<Vec<_>>()
      })
      .collect();
    Self::new(&dims, data)
  }

  pub fn raw(&self) -> Ref<Vec<T>> {
    self.data.borrow()
  }

  pub(crate) fn raw_mut(&self) -> RefMut<Vec<T>> {
    self.data.borrow_mut()
  }

  /// Values in logical order.

  pub fn to_vec(&self) -> Vec<T> {
    self.param_iter().collect()
  }

  pub fn into_raw(self) -> Vec<T> {
    let whole = self.shape.contiguous()
      && self.shape.offset == 0
      && self.shape.size() == self.data.borrow().len();
    if whole {
      Rc::try_unwrap(self.data)
        .map(|cell| cell.into_inner() )
        .unwrap_or_else(|data| {
          let values = data.borrow().clone();
          values
        })
    } else {
      self.to_vec()
    }
  }

  pub fn dims(&self) -> &[usize] {
    &self.shape.dims
  }

  pub fn size(&self) -> usize {
    self.shape.size()
  }

  pub fn rank(&self) -> usize {
    self.shape.rank()
  }

  pub fn shared_with(&self, other: &Self) -> bool {
    Rc::ptr_eq(&self.data, &other.data)
  }

  /// Overwrite this tensor's values in place, broadcasting `other` if needed.

  pub fn assign(&self, other: &Self) {
    // Avoid clashing borrow when tensors share storage
    let other = if self.shared_with(other) { other.detach() } else { other.clone() };
    let other = other.broadcast(&self.shape);
    assert_eq!(other.shape.dims, self.shape.dims,
      "Could not assign {} tensor to {} tensor", other.shape, self.shape);
    let values = other.to_vec();
    let mut data = self.data.borrow_mut();
    for (i, value) in self.shape.iter().zip(values) {
      data[i] = value;
    }
  }

  pub fn refill(&self, filler: T) {
    let mut data = self.data.borrow_mut();
    for i in self.shape.iter() {
      data[i] = filler;
    }
  }

  pub fn contiguous(&self) -> Self {
    if self.shape.contiguous() {
      self.clone()
    } else {
      self.detach()
    }
  }

  /// Copy into fresh storage.

  pub fn detach(&self) -> Self {
    self.vectorize(|a| a )
  }

  pub fn zip<O,F>(&self, rhs: &Self, cb: F) -> Tensor<O>
  where
    O: Inner,
    F: Fn((T, T)) -> O,
  {
    let lhs = self.broadcast(&rhs.shape);
    let rhs = rhs.broadcast(&lhs.shape);
    let data: Vec<O> = lhs.param_iter()
      .zip(rhs.param_iter())
      .map(cb)
      .collect();
    Tensor::new(&lhs.shape.dims, data)
  }

  pub fn vectorize<O,F>(&self, cb: F) -> Tensor<O>
  where
    O: Inner,
    F: FnMut(T) -> O,
  {
    let data = self.param_iter().map(cb).collect();
    Tensor::new(&self.shape.dims, data)
  }

  /// Reduce dimension `dim` by applying `cb` to every lane along it.

  pub fn collapse<O,F>(&self, dim: isize, cb: F) -> Tensor<O>
  where
    O: Inner,
    F: Fn(&[T]) -> O,
  {
    let dim = negative_index(dim, self.rank(), false);
    let n = self.shape.dims[dim];
    assert!(n > 0, "Cannot collapse empty dimension of {}", self.shape);
    let moved = Self { shape: self.shape.move_to_end(dim as isize), data: self.data.clone() };
    let data = moved.to_vec()
      .chunks(n)
      .map(cb)
      .collect();
    let mut dims = self.shape.dims.clone();
    dims.remove(dim);
    Tensor::new(&dims, data)
  }

  /// Iterate over slices along `dim`.

  pub fn iter(&self, dim: isize) -> TensorSliceIterator<T> {
    TensorSliceIterator::new(self, dim)
  }

  pub fn param_iter(&self) -> TensorIterator<T> {
    TensorIterator::new(self)
  }

  pub fn at(&self, indices: &[usize]) -> Self {
    let shape = self.shape.take(indices);
    Self { shape, data: self.data.clone() }
  }

  pub fn item(&self) -> T {
    assert!(self.size() == 1,
      "Can't extract item from non-scalar {}", self.shape);
    self.raw()[self.shape.offset]
  }

  pub fn view(&self, dims: &[usize]) -> Self {
    let shape = self.shape.view(dims);
    Self { shape, data: self.data.clone() }
  }

  pub fn equal(&self, rhs: &Self) -> Tensor<bool> {
    self.zip(rhs, |(a, b)| a == b )
  }

  /// Split along the first dimension into pieces of `size` rows.
  /// The last piece holds the remainder.

  pub fn chunk_rows(&self, size: usize) -> Vec<Tensor<T>> {
    assert!(size > 0);
    let n = self.shape[0];
    (0..n).step_by(size)
      .map(|start| {
        let end = (start + size).min(n);
        self.range(&[start as isize..end as isize])
      })
      .collect()
  }

  /// Gather rows along the first dimension into a new tensor.

  pub fn select_rows(&self, indices: &[usize]) -> Self {
    let mut dims = self.shape.dims.clone();
    dims[0] = indices.len();
    let data = indices.iter()
      .flat_map(|&i| self.at(&[i]).to_vec() )
      .collect();
    Self::new(&dims, data)
  }
}

impl<T: Numeric> std::iter::Sum for Tensor<T> {
  fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
    iter.fold(Self::zeros(&[]), |acc, a| acc.add(&a) )
  }
}

impl<T: Numeric> Tensor<T> {
  pub fn ones(dims: &[usize]) -> Self {
    Self::fill(dims, T::one())
  }

  pub fn zeros(dims: &[usize]) -> Self {
    Self::fill(dims, T::zero())
  }

  pub fn arrange(dims: &[usize], start: T, step: T) -> Self {
    Self::new(dims, (0..dims.iter().product())
      .map(|i| T::from(i).unwrap() * step + start )
      .collect())
  }

  pub fn hot_encode(idx: usize, size: usize) -> Self {
    let mut a = vec![T::zero(); size];
    a[idx] = T::one();
    Self::from_vec(a)
  }

  pub fn add(&self, rhs: &Self) -> Self {
    self.zip(rhs, |(a, b)| a + b )
  }

  pub fn sub(&self, rhs: &Self) -> Self {
    self.zip(rhs, |(a, b)| a - b )
  }

  pub fn mul(&self, rhs: &Self) -> Self {
    self.zip(rhs, |(a, b)| a * b )
  }

  pub fn div(&self, rhs: &Self) -> Self {
    self.zip(rhs, |(a, b)| a / b )
  }

  /// Sum over `dim`, keeping it with size one.

  pub fn sum_over(&self, dim: isize) -> Self {
    let dim = negative_index(dim, self.rank(), false) as isize;
    self.collapse(dim, |lane| lane.iter().copied().sum() )
      .unsqueeze(dim)
  }

  pub fn gt(&self, rhs: &Self) -> Tensor<bool> {
    self.zip(rhs, |(a, b)| a > b )
  }

  /// Collapse dimension using index of its greatest value.
  /// Ties resolve to the first occurrence.

  pub fn argmax(&self, dim: isize) -> Tensor<usize> {
    self.collapse(dim, |lane| {
      let mut index = 0;
      for (i, &value) in lane.iter().enumerate() {
        if value > lane[index] { index = i }
      }
      index
    })
  }

  pub fn cast<I: Numeric>(&self) -> Tensor<I> {
    self.vectorize(|a| I::from(a).unwrap() )
  }
}

impl<T: Numeric> std::ops::AddAssign for Tensor<T> {
  fn add_assign(&mut self, rhs: Self) {
    self.assign(&Tensor::add(self, &rhs));
  }
}

impl<T: Numeric> std::ops::SubAssign for Tensor<T> {
  fn sub_assign(&mut self, rhs: Self) {
    self.assign(&Tensor::sub(self, &rhs));
  }
}

impl<T: Real> Tensor<T> {
  pub fn randn(dims: &[usize]) -> Self {
    Self::randn_with(dims, &mut rand::thread_rng())
  }

  pub fn randn_with(dims: &[usize], rng: &mut impl Rng) -> Self {
    let len: usize = dims.iter().product();
    let mut data = Vec::with_capacity(len + 1);
    while data.len() < len {
      let (r1, r2): (T, T) = randn(rng);
      data.push(r1);
      data.push(r2);
    }
    data.truncate(len);
    Self::new(dims, data)
  }

  pub fn uniform(dims: &[usize], low: T, high: T) -> Self {
    Self::uniform_with(dims, low, high, &mut rand::thread_rng())
  }

  pub fn uniform_with(dims: &[usize], low: T, high: T, rng: &mut impl Rng) -> Self {
    let len = dims.iter().product();
    Self::new(dims, (0..len).map(|_| rng.gen_range(low, high) ).collect())
  }

  /// Normally distributed values, redrawn when further than two
  /// standard deviations from zero.

  pub fn truncated_normal(dims: &[usize], std: T) -> Self {
    Self::truncated_normal_with(dims, std, &mut rand::thread_rng())
  }

  pub fn truncated_normal_with(dims: &[usize], std: T, rng: &mut impl Rng) -> Self {
    let two = T::from(2.0).unwrap();
    let len: usize = dims.iter().product();
    let mut data = Vec::with_capacity(len + 1);
    while data.len() < len {
      let (r1, r2): (T, T) = randn(rng);
      for r in [r1, r2] {
        if r < two && r > -two { data.push(r * std) }
      }
    }
    data.truncate(len);
    Self::new(dims, data)
  }

  pub fn glorot_uniform(dims: &[usize]) -> Self {
    Self::glorot_uniform_with(dims, &mut rand::thread_rng())
  }

  pub fn glorot_uniform_with(dims: &[usize], rng: &mut impl Rng) -> Self {
    let fan_in = dims[0];
    let fan_out = dims[dims.len() - 1];
    let limit = T::from(6.0 / (fan_in + fan_out) as f64).unwrap().sqrt();
    Self::uniform_with(dims, -limit, limit, rng)
  }

  /// Matrix with orthonormal rows or columns, whichever are fewer.

  pub fn orthogonal(rows: usize, cols: usize) -> Self {
    Self::orthogonal_with(rows, cols, &mut rand::thread_rng())
  }

  pub fn orthogonal_with(rows: usize, cols: usize, rng: &mut impl Rng) -> Self {
    // Orthonormalize the longer side's vectors using Gram-Schmidt
    let (n, len) = if rows < cols { (rows, cols) } else { (cols, rows) };
    let mut basis: Vec<Vec<T>> = Vec::with_capacity(n);
    while basis.len() < n {
      let mut v = Self::randn_with(&[len], rng).into_raw();
      for b in &basis {
        let proj = v.iter().zip(b).fold(T::zero(), |acc, (&x, &y)| acc + x * y );
        for (x, &y) in v.iter_mut().zip(b) { *x -= proj * y }
      }
      let norm = v.iter().fold(T::zero(), |acc, &x| acc + x * x ).sqrt();
      // Redraw degenerate vectors
      if norm < T::from(1e-6).unwrap() { continue }
      for x in v.iter_mut() { *x /= norm }
      basis.push(v);
    }
    let q = Self::new(&[n, len], basis.concat());
    if rows < cols { q } else { q.transpose(0, 1).contiguous() }
  }

  /// Mask of ones drawn with probability `p`, zeros otherwise.

  pub fn bernoulli(dims: &[usize], p: T) -> Self {
    let mut rng = rand::thread_rng();
    let len = dims.iter().product();
    Self::new(dims, (0..len).map(|_| {
      if rng.gen_range(T::zero(), T::one()) < p { T::one() } else { T::zero() }
    }).collect())
  }

  pub fn sqrt(&self) -> Self {
    self.vectorize(|a| a.sqrt() )
  }

  pub fn sqr(&self) -> Self {
    self.vectorize(|a| a * a )
  }

  pub fn trained(&self) -> Variable<T> {
    Variable::from_tensor(self.clone(), true)
  }

  pub fn tracked(&self) -> Variable<T> {
    Variable::from_tensor(self.clone(), false)
  }
}

impl Tensor<bool> {
  pub fn numeric<O: Numeric>(&self) -> Tensor<O> {
    self.vectorize(|a| if a { O::one() } else { O::zero() })
  }

  pub fn all(&self) -> bool {
    self.param_iter().all(|a| a )
  }

  pub fn any(&self) -> bool {
    self.param_iter().any(|a| a )
  }
}

impl<T: Inner> std::fmt::Display for Tensor<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "Tensor{:?} ", self.shape.dims)?;
    print_chunks(0, &self.shape, &self.to_vec(), f)
  }
}

fn print_chunks<T: std::fmt::Debug>(idx: usize, shape: &Shape, vec: &[T], f: &mut std::fmt::Formatter) -> std::fmt::Result {
  let indent = " ".repeat(idx * 2);
  if shape.rank() == 0 {
    write!(f, "{indent}{:?}", vec[0])?;
  } else if idx == shape.rank() - 1 {
    writeln!(f, "{indent}{:?}", vec)?;
  } else {
    writeln!(f, "{indent}[")?;
    for chunk in vec.chunks((vec.len() / shape.dims[idx]).max(1)) {
      print_chunks(idx + 1, shape, chunk, f)?;
    }
    writeln!(f, "{indent}]")?;
  }
  Ok(())
}


pub struct TensorSliceIterator<T: Inner> {
  tensor: Tensor<T>,
  index: usize,
}

impl<T: Inner> TensorSliceIterator<T> {
  fn new(tensor: &Tensor<T>, dim: isize) -> Self {
    Self {
      tensor: tensor.transpose(0, dim),
      index: 0,
    }
  }
}

impl<T: Inner> Iterator for TensorSliceIterator<T> {
  type Item = Tensor<T>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.index == self.tensor.shape[0] { return None }
    let out = self.tensor.at(&[self.index]);
    self.index += 1;
    Some(out)
  }
}


pub struct TensorIterator<'a, T: Inner> {
  data: Ref<'a, Vec<T>>,
  shape_iter: Box<dyn Iterator<Item=usize> + 'a>,
}

impl<'a, T: Inner> TensorIterator<'a, T> {
  fn new(tensor: &'a Tensor<T>) -> Self {
    Self {
      data: tensor.data.borrow(),
      shape_iter: tensor.shape.iter(),
    }
  }
}

impl<T: Inner> Iterator for TensorIterator<'_, T> {
  type Item = T;

  fn next(&mut self) -> Option<Self::Item> {
    self.shape_iter.next().map(|i| self.data[i] )
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::ops::{ NumericOps, RealOps };
  use approx::assert_relative_eq;

  #[test]
  fn index() {
    let x = Tensor::new(&[2,2,2], vec![1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(x.at(&[0,0]), Tensor::vec(&[1, 2]));
    assert_eq!(x.at(&[1,1]), Tensor::vec(&[7, 8]));
    assert_eq!(x.at(&[0]), Tensor::new(&[2,2], vec![1, 2, 3, 4]));
    assert_eq!(x.at(&[0,1,1]).item(), 4);
  }

  #[test]
  fn range() {
    let x = Tensor::vec(&[3, 5, 6]);
    assert_eq!(x.range(&[1..-1]), Tensor::vec(&[5, 6]));
  }

  #[test]
  fn assign_view() {
    let x = Tensor::<i32>::zeros(&[2,3]);
    x.at(&[1]).assign(&Tensor::vec(&[1, 2, 3]));
    assert_eq!(x, Tensor::new(&[2,3], vec![0, 0, 0, 1, 2, 3]));
    x.at(&[0]).assign(&Tensor::scalar(7));
    assert_eq!(x.at(&[0]), Tensor::vec(&[7, 7, 7]));
  }

  #[test]
  fn assign_shared() {
    let x = Tensor::new(&[2,2], vec![1, 2, 3, 4]);
    x.assign(&x.transpose(0, 1));
    assert_eq!(x, Tensor::new(&[2,2], vec![1, 3, 2, 4]));
  }

  #[test]
  fn broadcast() {
    let x = Tensor::new(&[1,2,3], vec![1, 2, 3, 4, 5, 6]);

    let y = Tensor::new(&[    1], vec![1]);
    assert_eq!(x.add(&y), Tensor::new(&[1,2,3], vec![2, 3, 4, 5, 6, 7]));

    let y = Tensor::new(&[    3], vec![1, 2, 3]);
    assert_eq!(x.add(&y), Tensor::new(&[1,2,3], vec![2, 4, 6, 5, 7, 9]));

    let y = Tensor::new(&[  2,1], vec![1, 2]);
    assert_eq!(x.add(&y), Tensor::new(&[1,2,3], vec![2, 3, 4, 6, 7, 8]));
  }

  #[test]
  fn sum_over() {
    let a = Tensor::arrange(&[3,2,2], 0, 1).sum_over(1);
    assert_eq!(a, Tensor::new(&[3,1,2], vec![2, 4, 10, 12, 18, 20]));
  }

  #[test]
  fn argmax() {
    let a = Tensor::new(&[3,3], vec![-3.0, -1.0, -2.0, 0.0, 0.0, 0.0, 1.0, 5.0, 5.0]);
    assert_eq!(a.argmax(-1), Tensor::vec(&[1, 0, 1]));
    assert_eq!(a.argmax(0), Tensor::vec(&[2, 2, 2]));
  }

  #[test]
  fn rows_and_chunks() {
    let a = Tensor::arrange(&[5,2], 0, 1);
    let chunks = a.chunk_rows(2);
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[2], Tensor::new(&[1,2], vec![8, 9]));
    assert_eq!(Tensor::concat_rows(&chunks), a);
    let picked = a.select_rows(&[4, 0]);
    assert_eq!(picked, Tensor::new(&[2,2], vec![8, 9, 0, 1]));
    let stacked = Tensor::rows(&[Tensor::vec(&[1, 2]), Tensor::vec(&[3, 4])]);
    assert_eq!(stacked.dims(), &[2, 2]);
  }

  #[test]
  fn iterate_dim() {
    let a = Tensor::arrange(&[2,3], 0, 1);
    let columns: Vec<_> = a.iter(1).collect();
    assert_eq!(columns.len(), 3);
    assert_eq!(columns[1], Tensor::vec(&[1, 4]));
  }

  #[test]
  fn truncated_normal_bounds() {
    let t = Tensor::<f32>::truncated_normal(&[1000], 0.1);
    assert!(t.param_iter().all(|a| a.abs() < 0.2 ));
  }

  #[test]
  fn orthogonal() {
    for (rows, cols) in [(4, 4), (3, 6), (6, 3)] {
      let q = Tensor::<f64>::orthogonal(rows, cols);
      assert_eq!(q.dims(), &[rows, cols]);
      let gram = if rows < cols { q.mm(&q.transpose(0, 1)) } else { q.transpose(0, 1).mm(&q) };
      let n = rows.min(cols);
      for i in 0..n {
        for j in 0..n {
          let expected = if i == j { 1.0 } else { 0.0 };
          assert_relative_eq!(gram.at(&[i, j]).item(), expected, epsilon = 1e-9);
        }
      }
    }
  }

  #[test]
  fn glorot_limits() {
    let t = Tensor::<f32>::glorot_uniform(&[10, 20]);
    let limit = (6.0f32 / 30.0).sqrt();
    assert!(t.param_iter().all(|a| a.abs() <= limit ));
  }

  #[test]
  fn bernoulli_extremes() {
    assert!(Tensor::<f32>::bernoulli(&[64], 1.0).param_iter().all(|a| a == 1.0 ));
    assert!(Tensor::<f32>::bernoulli(&[64], 0.0).param_iter().all(|a| a == 0.0 ));
  }

  #[test]
  fn max_reduction() {
    let a = Tensor::new(&[2,3], vec![1, 7, 3, 4, 2, 9]);
    assert_eq!(a.max(-1), Tensor::vec(&[7, 9]));
    assert_eq!(a.max(0), Tensor::vec(&[4, 7, 9]));
  }
}
