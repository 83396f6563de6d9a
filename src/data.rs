//! Batching, shuffling and label helpers, plus an MNIST reader.

use std::path::Path;

use rand::{ Rng, seq::SliceRandom };

use crate::{
  error::{ Error, Result },
  scalar::{ Inner, Numeric },
  Tensor,
};


/// Split `rows` into consecutive batches of `batch_size`.
/// The last batch holds the remainder.

pub fn gen_batch<I: Inner>(rows: &Tensor<I>, batch_size: usize) -> Vec<Tensor<I>> {
  rows.chunk_rows(batch_size)
}

/// Random order of `n` row indices.

pub fn permutation(n: usize, rng: &mut impl Rng) -> Vec<usize> {
  let mut indices: Vec<usize> = (0..n).collect();
  indices.shuffle(rng);
  indices
}

/// Reorder inputs and labels with the same permutation.

pub fn shuffle_rows<X: Inner, Y: Inner>(
  inputs: &Tensor<X>,
  labels: &Tensor<Y>,
  rng: &mut impl Rng,
) -> (Tensor<X>, Tensor<Y>) {
  let order = permutation(inputs.dims()[0], rng);
  (inputs.select_rows(&order), labels.select_rows(&order))
}

/// One-hot encode class ids as `[len, n_classes]`.

pub fn one_hot<T: Numeric>(labels: &[usize], n_classes: usize) -> Result<Tensor<T>> {
  let mut data = vec![T::zero(); labels.len() * n_classes];
  for (row, &label) in labels.iter().enumerate() {
    if label >= n_classes {
      return Err(Error::InvalidInput(format!("Label {} out of range for {} classes", label, n_classes)))
    }
    data[row * n_classes + label] = T::one();
  }
  Ok(Tensor::new(&[labels.len(), n_classes], data))
}

/// Unweighted mean, zero for empty lists.

pub fn list_avg(values: &[f64]) -> f64 {
  if values.is_empty() { return 0.0 }
  values.iter().sum::<f64>() / values.len() as f64
}

/// Make sure inputs and labels describe the same, non-empty set of rows.

pub fn check_rows<X: Inner, Y: Inner>(inputs: &Tensor<X>, labels: &Tensor<Y>) -> Result<()> {
  if inputs.rank() == 0 || inputs.dims()[0] == 0 { return Err(Error::EmptyInput) }
  let (n_inputs, n_labels) = (inputs.dims()[0], labels.dims().first().copied().unwrap_or(0));
  if n_inputs != n_labels {
    return Err(Error::LengthMismatch { inputs: n_inputs, labels: n_labels })
  }
  Ok(())
}


const IMAGES_MAGIC: u32 = 0x0000_0803;
const LABELS_MAGIC: u32 = 0x0000_0801;

/// MNIST images scaled to `[0, 1]` alongside their digit labels.

#[derive(Debug, Clone)]
pub struct Mnist {
  pub train_images: Tensor<f32>,
  pub train_labels: Vec<usize>,
  pub test_images: Tensor<f32>,
  pub test_labels: Vec<usize>,
}

impl Mnist {
  /// Load the four uncompressed IDX files from `dir`.

  pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
    let dir = dir.as_ref();
    let mnist = Self {
      train_images: read_idx_images(dir.join("train-images-idx3-ubyte"))?,
      train_labels: read_idx_labels(dir.join("train-labels-idx1-ubyte"))?,
      test_images: read_idx_images(dir.join("t10k-images-idx3-ubyte"))?,
      test_labels: read_idx_labels(dir.join("t10k-labels-idx1-ubyte"))?,
    };
    check_rows(&mnist.train_images, &Tensor::from_vec(mnist.train_labels.clone()))?;
    check_rows(&mnist.test_images, &Tensor::from_vec(mnist.test_labels.clone()))?;
    Ok(mnist)
  }
}

fn read_be_u32(data: &[u8], offset: &mut usize) -> Option<u32> {
  let bytes = data.get(*offset..*offset + 4)?;
  *offset += 4;
  Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn malformed(path: &Path, reason: &str) -> Error {
  Error::Dataset { path: path.display().to_string(), reason: reason.to_string() }
}

/// Read an IDX image file into `[count, rows * cols]` pixels in `[0, 1]`.

pub fn read_idx_images(path: impl AsRef<Path>) -> Result<Tensor<f32>> {
  let path = path.as_ref();
  let data = std::fs::read(path)?;
  parse_idx_images(&data).map_err(|reason| malformed(path, reason) )
}

fn parse_idx_images(data: &[u8]) -> std::result::Result<Tensor<f32>, &'static str> {
  let mut offset = 0;
  let mut header = || read_be_u32(data, &mut offset).ok_or("header is truncated");
  if header()? != IMAGES_MAGIC { return Err("not an image file") }
  let count = header()? as usize;
  let rows = header()? as usize;
  let cols = header()? as usize;
  let size = rows.checked_mul(cols).ok_or("header is inconsistent")?;
  let end = count.checked_mul(size)
    .and_then(|len| len.checked_add(16) )
    .ok_or("header is inconsistent")?;
  let pixels = data.get(16..end).ok_or("pixel data is truncated")?;
  let pixels = pixels.iter().map(|&pixel| pixel as f32 / 255.0 ).collect();
  Ok(Tensor::new(&[count, size], pixels))
}

/// Read an IDX label file.

pub fn read_idx_labels(path: impl AsRef<Path>) -> Result<Vec<usize>> {
  let path = path.as_ref();
  let data = std::fs::read(path)?;
  parse_idx_labels(&data).map_err(|reason| malformed(path, reason) )
}

fn parse_idx_labels(data: &[u8]) -> std::result::Result<Vec<usize>, &'static str> {
  let mut offset = 0;
  if read_be_u32(data, &mut offset).ok_or("header is truncated")? != LABELS_MAGIC {
    return Err("not a label file")
  }
  let count = read_be_u32(data, &mut offset).ok_or("header is truncated")? as usize;
  let end = count.checked_add(8).ok_or("header is inconsistent")?;
  let labels = data.get(8..end).ok_or("label data is truncated")?;
  Ok(labels.iter().map(|&label| label as usize ).collect())
}


#[cfg(test)]
mod tests {
  use super::*;
  use rand::{ SeedableRng, rngs::StdRng };

  #[test]
  fn batches() {
    let rows = Tensor::arrange(&[5,2], 0, 1);
    let batches = gen_batch(&rows, 2);
    assert_eq!(batches.len(), 3);
    assert_eq!(batches[0].dims(), &[2,2]);
    assert_eq!(batches[2], Tensor::new(&[1,2], vec![8, 9]));
    assert_eq!(gen_batch(&rows, 10).len(), 1);
  }

  #[test]
  fn shuffle_keeps_pairs() {
    let mut rng = StdRng::seed_from_u64(7);
    let inputs = Tensor::arrange(&[6,2], 0, 1);
    let labels = Tensor::vec(&[0, 1, 2, 3, 4, 5]);
    let (x, y) = shuffle_rows(&inputs, &labels, &mut rng);
    for (row, label) in x.iter(0).zip(y.param_iter()) {
      assert_eq!(row, Tensor::vec(&[label * 2, label * 2 + 1]));
    }
    let mut sorted = y.to_vec();
    sorted.sort();
    assert_eq!(sorted, vec![0, 1, 2, 3, 4, 5]);
  }

  #[test]
  fn seeded_permutations_repeat() {
    let first = permutation(20, &mut StdRng::seed_from_u64(3));
    let second = permutation(20, &mut StdRng::seed_from_u64(3));
    assert_eq!(first, second);
  }

  #[test]
  fn one_hot_labels() {
    let encoded: Tensor<f32> = one_hot(&[2, 0], 3).unwrap();
    assert_eq!(encoded, Tensor::new(&[2,3], vec![0.0, 0.0, 1.0, 1.0, 0.0, 0.0]));
    assert!(matches!(one_hot::<f32>(&[3], 3), Err(Error::InvalidInput(_))));
  }

  #[test]
  fn averages() {
    assert_eq!(list_avg(&[1.0, 2.0, 6.0]), 3.0);
    assert_eq!(list_avg(&[]), 0.0);
  }

  #[test]
  fn row_checks() {
    let inputs = Tensor::<f32>::zeros(&[3,2]);
    assert!(check_rows(&inputs, &Tensor::vec(&[0, 1, 2])).is_ok());
    assert!(matches!(
      check_rows(&inputs, &Tensor::vec(&[0, 1])),
      Err(Error::LengthMismatch { inputs: 3, labels: 2 })
    ));
    assert!(matches!(check_rows(&Tensor::<f32>::zeros(&[0,2]), &Tensor::<usize>::zeros(&[0])), Err(Error::EmptyInput)));
  }

  #[test]
  fn idx_files() {
    let mut images = vec![0, 0, 8, 3, 0, 0, 0, 2, 0, 0, 0, 1, 0, 0, 0, 2];
    images.extend([0, 255, 51, 102]);
    let parsed = parse_idx_images(&images).unwrap();
    assert_eq!(parsed, Tensor::new(&[2,2], vec![0.0, 1.0, 0.2, 0.4]));

    let labels = vec![0, 0, 8, 1, 0, 0, 0, 3, 7, 0, 9];
    assert_eq!(parse_idx_labels(&labels).unwrap(), vec![7, 0, 9]);

    assert_eq!(parse_idx_labels(&images).unwrap_err(), "not a label file");
    assert_eq!(parse_idx_images(&images[..18]).unwrap_err(), "pixel data is truncated");
  }

  #[test]
  fn huge_image_header() {
    let mut images = vec![0, 0, 8, 3];
    images.extend([0xff; 12]);
    assert_eq!(parse_idx_images(&images).unwrap_err(), "header is inconsistent");
    let mut images = vec![0, 0, 8, 3, 0xff, 0xff, 0xff, 0xff];
    images.extend([0, 0, 0, 1, 0, 0, 0, 1]);
    assert_eq!(parse_idx_images(&images).unwrap_err(), "pixel data is truncated");
  }

  #[test]
  fn missing_file() {
    assert!(matches!(read_idx_labels("/nonexistent/labels"), Err(Error::Io(_))));
  }
}
