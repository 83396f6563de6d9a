use std::ops::Range;
use std::fmt::Debug;

use serde::{Serialize, Deserialize};

use crate::internal::*;


/// The shape of a [Tensor](crate::Tensor).
///
/// Shapes describe how a tensor's flat storage is laid out. Views such as
/// ranges, transpositions and broadcasts only produce a new shape and never
/// touch the underlying data.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
  pub dims: Vec<usize>,
  pub(crate) strides: Vec<isize>,
  pub(crate) offset: usize,
}

impl Shape {
  pub fn new(dims: &[usize]) -> Self {
    Self {
      dims: dims.to_vec(),
      strides: Self::make_strides(dims),
      offset: 0,
    }
  }

  fn make_strides(dims: &[usize]) -> Vec<isize> {
    if dims.is_empty() { return vec![] }
    let mut strides = vec![0; dims.len()];
    strides[dims.len() - 1] = 1;
    for i in (1..dims.len()).rev() {
      strides[i - 1] = dims[i] as isize * strides[i];
    }
    strides
  }

  pub fn size(&self) -> usize {
    self.dims.iter().product()
  }

  pub fn rank(&self) -> usize {
    self.dims.len()
  }

  pub(crate) fn index(&self, indices: &[usize]) -> usize {
    assert!(indices.len() <= self.rank());
    (indices.iter()
      .zip(&self.strides)
      .map(|(&i, &s)| i as isize * s )
      .sum::<isize>() + self.offset as isize
    ) as usize
  }

  /// Whether iterating this shape walks storage in order, without gaps.
  /// Dimensions of size one may carry any stride.

  pub fn contiguous(&self) -> bool {
    let mut expected = 1;
    for (&n, &stride) in self.dims.iter().zip(&self.strides).rev() {
      if n == 1 { continue }
      if stride != expected { return false }
      expected *= n as isize;
    }
    true
  }

  pub fn iter(&self) -> Box<dyn Iterator<Item=usize> + '_> {
    if self.contiguous() {
      Box::new(self.offset..self.offset + self.size())
    } else {
      Box::new(ShapeIterator::new(self))
    }
  }

  /// Reinterpret contiguous storage with new dimensions.
  /// A single `0` acts as a placeholder for the remaining size.

  pub fn view(&self, dims: &[usize]) -> Self {
    assert!(self.contiguous(), "Cannot view non-contiguous {}", self);
    let known: usize = dims.iter().filter(|&&n| n != 0 ).product();
    let dims: Vec<usize> = dims.iter()
      .map(|&n| if n == 0 { self.size() / known.max(1) } else { n } )
      .collect();
    assert_eq!(dims.iter().product::<usize>(), self.size(),
      "Cannot view {} as {:?}", self, dims);
    Self {
      strides: Self::make_strides(&dims),
      dims,
      offset: self.offset,
    }
  }

  pub fn take(&self, indices: &[usize]) -> Self {
    for (&i, &n) in indices.iter().zip(&self.dims) {
      assert!(i < n, "Index {} out of bounds for {}", i, self);
    }
    Self {
      dims: self.dims[indices.len()..].to_vec(),
      strides: self.strides[indices.len()..].to_vec(),
      offset: self.index(indices),
    }
  }

  pub fn range(&self, ranges: &[Range<isize>]) -> Self {
    assert!(ranges.len() <= self.rank());
    let mut offset = self.offset as isize;
    let mut dims = self.dims.clone();
    for (d, range) in ranges.iter().enumerate() {
      let n = self.dims[d];
      let start = negative_index(range.start, n, true);
      let end = negative_index(range.end, n, true);
      assert!(start <= end && end <= n,
        "Range {:?} out of bounds for dimension {} of {}", range, d, self);
      offset += self.strides[d] * start as isize;
      dims[d] = end - start;
    }
    Self { dims, strides: self.strides.clone(), offset: offset as usize }
  }

  pub fn squeeze_only(&self, dim: isize) -> Self {
    let dim = negative_index(dim, self.rank(), false);
    assert_eq!(self.dims[dim], 1, "Cannot squeeze dimension {} of {}", dim, self);
    let mut shape = self.clone();
    shape.dims.remove(dim);
    shape.strides.remove(dim);
    shape
  }

  pub fn unsqueeze(&self, dim: isize) -> Self {
    let d = negative_index(dim, self.rank(), true);
    let mut shape = self.clone();
    let stride = if d < shape.rank() {
      shape.strides[d] * shape.dims[d] as isize
    } else { 1 };
    shape.strides.insert(d, stride);
    shape.dims.insert(d, 1);
    shape
  }

  /// Expand to the common shape of `self` and `other`, following numpy rules.
  /// Expanded dimensions get a stride of zero.

  pub fn broadcast(&self, other: &Self) -> Self {
    let rank = self.rank().max(other.rank());
    let mut dims = vec![0; rank];
    let mut strides = vec![0; rank];
    for i in 0..rank {
      let dl = self.dims.len().checked_sub(i + 1).map(|d| self.dims[d] ).unwrap_or(1);
      let dr = other.dims.len().checked_sub(i + 1).map(|d| other.dims[d] ).unwrap_or(1);
      assert!(dl == dr || dl == 1 || dr == 1, "Could not broadcast {} & {}", self, other);
      let stride = self.strides.len().checked_sub(i + 1).map(|d| self.strides[d] ).unwrap_or(0);
      dims[rank - 1 - i] = dl.max(dr);
      strides[rank - 1 - i] = if dl == 1 && dr != 1 { 0 } else { stride };
    }
    Self { dims, strides, offset: self.offset }
  }

  pub fn transpose(&self, dim1: isize, dim2: isize) -> Self {
    let dim1 = negative_index(dim1, self.rank(), false);
    let dim2 = negative_index(dim2, self.rank(), false);
    let mut shape = self.clone();
    shape.dims.swap(dim1, dim2);
    shape.strides.swap(dim1, dim2);
    shape
  }

  /// Move a dimension behind all others, keeping their order.

  pub fn move_to_end(&self, dim: isize) -> Self {
    let dim = negative_index(dim, self.rank(), false);
    let mut shape = self.clone();
    let n = shape.dims.remove(dim);
    let stride = shape.strides.remove(dim);
    shape.dims.push(n);
    shape.strides.push(stride);
    shape
  }
}

impl std::ops::Index<isize> for Shape {
  type Output = usize;

  fn index(&self, i: isize) -> &usize {
    let idx = negative_index(i, self.rank(), false);
    &self.dims[idx]
  }
}

impl std::fmt::Display for Shape {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "Shape{:?}", self.dims)
  }
}


/// Iterate through a [Shape]'s storage indices in logical order.

pub struct ShapeIterator<'a> {
  shape: &'a Shape,
  counter: Vec<usize>,
  idx: isize,
  finished: bool,
}

impl<'a> ShapeIterator<'a> {
  fn new(shape: &'a Shape) -> Self {
    Self {
      counter: vec![0; shape.rank()],
      idx: shape.offset as isize,
      finished: shape.size() == 0,
      shape,
    }
  }
}

impl<'a> Iterator for ShapeIterator<'a> {
  type Item = usize;

  fn next(&mut self) -> Option<Self::Item> {
    if self.finished { return None }
    let out = self.idx as usize;
    // Walk backward through dimensions
    for d in (0..self.counter.len()).rev() {
      self.counter[d] += 1;
      self.idx += self.shape.strides[d];
      if self.counter[d] < self.shape.dims[d] { return Some(out) }
      // Full turn
      self.idx -= self.shape.strides[d] * self.shape.dims[d] as isize;
      self.counter[d] = 0;
    }
    self.finished = true;
    Some(out)
  }
}
