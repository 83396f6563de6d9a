//! Ready-made text and image classifiers.

mod conv1d;
mod rnn;
mod mlp;

pub use conv1d::Conv1dClassifier;
pub use rnn::RnnTextClassifier;
pub use mlp::MlpClassifier;

use crate::{
  error::{ Error, Result },
  Tensor,
};


fn expect_rank<I: crate::scalar::Inner>(what: &str, tensor: &Tensor<I>, rank: usize) -> Result<()> {
  if tensor.rank() != rank {
    return Err(Error::InvalidInput(format!("{} need rank {}, got shape {:?}", what, rank, tensor.dims())))
  }
  Ok(())
}

fn expect_width<I: crate::scalar::Inner>(what: &str, tensor: &Tensor<I>, width: usize) -> Result<()> {
  expect_rank(what, tensor, 2)?;
  if tensor.dims()[1] != width {
    return Err(Error::ShapeMismatch {
      name: what.to_string(),
      expected: vec![tensor.dims()[0], width],
      actual: tensor.dims().to_vec(),
    })
  }
  Ok(())
}

/// Token ids must address rows of a `vocab_size` embedding table.

fn check_ids(ids: &Tensor<usize>, seq_len: usize, vocab_size: usize) -> Result<()> {
  expect_width("Token ids", ids, seq_len)?;
  match ids.param_iter().find(|&id| id >= vocab_size ) {
    Some(id) => Err(Error::InvalidInput(format!("Token id {} out of range for vocabulary of {}", id, vocab_size))),
    None => Ok(()),
  }
}
