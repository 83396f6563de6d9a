//! Named parameter snapshots, encoded with `postcard`.

use std::{ fs, path::Path };

use log::debug;
use serde::{ Serialize, Deserialize, de::DeserializeOwned };

use crate::{
  error::{ Error, Result },
  layers::Module,
  scalar::Real,
  Tensor,
};


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Entry<T> {
  name: String,
  dims: Vec<usize>,
  values: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Checkpoint<T> {
  params: Vec<Entry<T>>,
}

/// Encode all parameters of `module`.

pub fn to_bytes<T: Real + Serialize>(module: &impl Module<T>) -> Result<Vec<u8>> {
  let checkpoint = Checkpoint {
    params: module.params().into_iter().map(|param| Entry {
      name: param.name.clone(),
      dims: param.value.dims().to_vec(),
      values: param.value.to_vec(),
    }).collect(),
  };
  Ok(postcard::to_allocvec(&checkpoint)?)
}

/// Overwrite the parameters of `module` with encoded values.
///
/// Every parameter must be present with matching shape. Nothing
/// gets assigned unless all of them are.

pub fn from_bytes<T: Real + DeserializeOwned>(module: &impl Module<T>, bytes: &[u8]) -> Result<()> {
  let mut checkpoint: Checkpoint<T> = postcard::from_bytes(bytes)?;
  let mut updates = vec![];
  for param in module.params() {
    let index = checkpoint.params.iter()
      .position(|entry| entry.name == param.name )
      .ok_or_else(|| Error::MissingParameter(param.name.clone()) )?;
    let entry = checkpoint.params.swap_remove(index);
    if entry.dims != param.value.dims() || entry.values.len() != param.value.size() {
      return Err(Error::ShapeMismatch {
        name: entry.name,
        expected: param.value.dims().to_vec(),
        actual: entry.dims,
      })
    }
    updates.push((param, Tensor::new(&entry.dims, entry.values)));
  }
  for entry in &checkpoint.params {
    debug!("Ignoring unknown checkpoint parameter {}", entry.name);
  }
  for (param, values) in updates {
    param.value.assign(&values);
  }
  Ok(())
}

pub fn save<T: Real + Serialize>(module: &impl Module<T>, path: impl AsRef<Path>) -> Result<()> {
  let bytes = to_bytes(module)?;
  fs::write(&path, &bytes)?;
  debug!("Saved {} bytes of parameters to {}", bytes.len(), path.as_ref().display());
  Ok(())
}

pub fn load<T: Real + DeserializeOwned>(module: &impl Module<T>, path: impl AsRef<Path>) -> Result<()> {
  let bytes = fs::read(&path)?;
  from_bytes(module, &bytes)?;
  debug!("Loaded parameters from {}", path.as_ref().display());
  Ok(())
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::layers::{ Dense, Init };

  #[test]
  fn restore_parameters() {
    let source = Dense::<f32>::new("dense", 3, 2, Init::Normal, Init::Normal);
    let target = Dense::<f32>::new("dense", 3, 2, Init::Constant(0.0), Init::Constant(0.0));
    let bytes = to_bytes(&source).unwrap();
    from_bytes(&target, &bytes).unwrap();
    assert_eq!(target.weights.value.tensor(), source.weights.value.tensor());
    assert_eq!(target.bias.value.tensor(), source.bias.value.tensor());
  }

  #[test]
  fn reject_wrong_shape() {
    let source = Dense::<f32>::new("dense", 3, 2, Init::Normal, Init::Normal);
    let target = Dense::<f32>::new("dense", 4, 2, Init::Constant(0.0), Init::Constant(0.0));
    let bytes = to_bytes(&source).unwrap();
    let result = from_bytes(&target, &bytes);
    assert!(matches!(result, Err(Error::ShapeMismatch { ref name, .. }) if name == "dense/weights"));
    // Untouched on failure
    assert!(target.bias.value.param_iter().all(|a| a == 0.0 ));
  }

  #[test]
  fn reject_missing_name() {
    let source = Dense::<f32>::new("first", 3, 2, Init::Normal, Init::Normal);
    let target = Dense::<f32>::new("second", 3, 2, Init::Normal, Init::Normal);
    let bytes = to_bytes(&source).unwrap();
    assert!(matches!(from_bytes(&target, &bytes), Err(Error::MissingParameter(_))));
  }

  #[test]
  fn reject_garbage() {
    let target = Dense::<f32>::new("dense", 3, 2, Init::Normal, Init::Normal);
    assert!(matches!(from_bytes(&target, &[0xff, 0xff, 0xff]), Err(Error::Checkpoint(_))));
  }

  #[test]
  fn file_round_trip() {
    let path = std::env::temp_dir().join(format!("microclassifier-ckpt-{}.bin", std::process::id()));
    let source = Dense::<f64>::new("dense", 2, 2, Init::Normal, Init::Normal);
    let target = Dense::<f64>::new("dense", 2, 2, Init::Normal, Init::Normal);
    save(&source, &path).unwrap();
    load(&target, &path).unwrap();
    assert_eq!(target.weights.value.tensor(), source.weights.value.tensor());
    std::fs::remove_file(path).unwrap();
  }
}
