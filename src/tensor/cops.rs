use crate::{
  scalar::Numeric,
  ops::Gemm,
};


#[cfg_attr(feature = "unsafe", allow(dead_code))]
#[allow(clippy::too_many_arguments)]
fn gemm_loop<T: Numeric>(
  m: usize, k: usize, n: usize,
  a: &[T], rsa: isize, csa: isize,
  b: &[T], rsb: isize, csb: isize,
) -> Vec<T> {
  let mut c = vec![T::zero(); m * n];
  for i in 0..m {
    for kk in 0..k {
      let lhs = a[(i as isize * rsa + kk as isize * csa) as usize];
      for j in 0..n {
        c[i * n + j] += lhs * b[(kk as isize * rsb + j as isize * csb) as usize];
      }
    }
  }
  c
}

macro_rules! impl_gemm {
  ($type:ty, $kernel:ident) => {
    impl Gemm for $type {
      #[cfg(feature = "unsafe")]
      fn gemm(
        m: usize, k: usize, n: usize,
        a: &[Self], rsa: isize, csa: isize,
        b: &[Self], rsb: isize, csb: isize,
      ) -> Vec<Self> {
        let mut c = vec![0.0; m * n];
        if m == 0 || n == 0 || k == 0 { return c }
        unsafe {
          matrixmultiply::$kernel(
            m, k, n,
            1.0,
            a.as_ptr(), rsa, csa,
            b.as_ptr(), rsb, csb,
            0.0,
            c.as_mut_ptr(), n as isize, 1,
          );
        }
        c
      }

      #[cfg(not(feature = "unsafe"))]
      fn gemm(
        m: usize, k: usize, n: usize,
        a: &[Self], rsa: isize, csa: isize,
        b: &[Self], rsb: isize, csb: isize,
      ) -> Vec<Self> {
        gemm_loop(m, k, n, a, rsa, csa, b, rsb, csb)
      }
    }
  };
}

impl_gemm!(f32, sgemm);
impl_gemm!(f64, dgemm);
