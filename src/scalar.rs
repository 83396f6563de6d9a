use rand::distributions::uniform::SampleUniform;
use num_traits::{ NumAssignOps, Num, NumCast };

use crate::ops::Gemm;


/// All types that may be used in a [Tensor](crate::Tensor).
///
/// This trait gets implemented automatically for all types
/// that satisfy its dependent traits.

pub trait Inner: PartialEq + Clone + Copy + Send + Sync + std::fmt::Debug {}
impl<T: PartialEq + Clone + Copy + Send + Sync + std::fmt::Debug> Inner for T {}


/// All numeric types.
///
/// This trait gets implemented automatically for all types
/// that satisfy its dependent traits.

pub trait Numeric: Inner + PartialOrd + Num + NumCast + NumAssignOps + std::iter::Sum {}
impl<T: Inner + PartialOrd + Num + NumCast + NumAssignOps + std::iter::Sum> Numeric for T {}


/// All signed numeric types.
///
/// This trait gets implemented automatically for all types
/// that satisfy its dependent traits.

pub trait Signed: Numeric + num_traits::Signed {}
impl<T: Numeric + num_traits::Signed> Signed for T {}


/// All continuous numeric types that gradients can be computed for.
///
/// Implemented for [f32] and [f64], the types [Gemm] provides
/// matrix kernels for.

pub trait Real: Signed + num_traits::real::Real + SampleUniform + Gemm + 'static {}
impl<T: Signed + num_traits::real::Real + SampleUniform + Gemm + 'static> Real for T {}


#[cfg(test)]
mod tests {
  use super::*;
  use std::any::TypeId;

  // Boxed graph ops need owned, 'static element types
  fn type_of<T: Real>() -> TypeId {
    TypeId::of::<T>()
  }

  #[test]
  fn reals_are_static() {
    assert_eq!(type_of::<f32>(), TypeId::of::<f32>());
    assert_ne!(type_of::<f64>(), TypeId::of::<f32>());
  }
}
