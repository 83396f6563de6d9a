use crate::{
  ops::*,
  scalar::Real,
  Variable,
  Tensor,
};


/// Stateless network building blocks, available on every [Variable].

pub trait Layer<I: Real>: Sized {
  /// Inverted dropout: keep each value with probability `keep_prob`
  /// and scale survivors by `1 / keep_prob`.
  fn dropout(&self, keep_prob: I, train: bool) -> Self;

  /// Maximum over the position dimension of `[batch, len, channels]`.
  fn global_max_pool(&self) -> Self;

  /// Weigh `[batch, len, hidden]` outputs by their similarity to a
  /// `[batch, hidden]` query, returning the pooled context and the weights.
  fn attention_pool(&self, query: &Self) -> (Self, Self);

  /// Mean softmax cross-entropy of `[batch, classes]` logits.
  fn softmax_cross_entropy(&self, targets: &Tensor<I>) -> Self;

  /// Fraction of rows whose greatest logit matches the greatest target.
  fn accuracy(&self, targets: &Tensor<I>) -> I;
}

impl<I: Real> Layer<I> for Variable<I> {
  fn dropout(&self, keep_prob: I, train: bool) -> Self {
    if !train || keep_prob >= I::one() { return self.clone() }
    let mask = Tensor::bernoulli(self.dims(), keep_prob) / keep_prob;
    self * mask.tracked()
  }

  fn global_max_pool(&self) -> Self {
    self.max(1)
  }

  fn attention_pool(&self, query: &Self) -> (Self, Self) {
    let (batch, len) = (self.dim(0), self.dim(1));
    let scores = self.mm(&query.unsqueeze(-1)).reshape(&[batch, len]);
    let weights = scores.tanh().softmax(-1);
    let context = (self * weights.unsqueeze(-1)).sum(1);
    (context, weights)
  }

  fn softmax_cross_entropy(&self, targets: &Tensor<I>) -> Self {
    self.softmax_cross_entropy_rows(targets).mean(0)
  }

  fn accuracy(&self, targets: &Tensor<I>) -> I {
    let hits = self.argmax(-1).equal(&targets.argmax(-1));
    let hits: Tensor<I> = hits.numeric();
    hits.sum(0).item() / I::from(hits.size()).unwrap()
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_relative_eq;

  #[test]
  fn dropout() {
    let x = Tensor::<f64>::ones(&[1000]).tracked();
    assert_eq!(x.dropout(0.5, false), x);
    assert_eq!(x.dropout(1.0, true), x);
    let dropped = x.dropout(0.5, true);
    assert!(dropped.param_iter().all(|a| a == 0.0 || a == 2.0 ));
    let kept = dropped.param_iter().filter(|&a| a > 0.0 ).count();
    assert!(kept > 350 && kept < 650);
  }

  #[test]
  fn global_max_pool() {
    let x = Tensor::new(&[1,3,2], vec![1.0, 6.0, 4.0, 2.0, 3.0, 5.0]).tracked();
    assert_eq!(x.global_max_pool().tensor(), &Tensor::new(&[1,2], vec![4.0, 6.0]));
  }

  #[test]
  fn attention_weights_sum_to_one() {
    let outputs = Tensor::<f64>::randn(&[2,5,3]).tracked();
    let query = Tensor::randn(&[2,3]).tracked();
    let (context, weights) = outputs.attention_pool(&query);
    assert_eq!(context.dims(), &[2,3]);
    assert_eq!(weights.dims(), &[2,5]);
    for total in weights.sum(-1).param_iter() {
      assert_relative_eq!(total, 1.0, epsilon = 1e-9);
    }
  }

  #[test]
  fn attention_uniform_scores() {
    // Zero query scores every position equally
    let outputs = Tensor::new(&[1,2,2], vec![1.0, 2.0, 3.0, 4.0]).tracked();
    let query = Tensor::zeros(&[1,2]).tracked();
    let (context, _) = outputs.attention_pool(&query);
    assert_eq!(context.tensor(), &Tensor::new(&[1,2], vec![2.0, 3.0]));
  }

  #[test]
  fn check_attention() {
    let query = Tensor::<f64>::randn(&[2,3]);
    let diff = Variable::<f64>::check_gradients(&[2,4,3], |x| x.attention_pool(&query.tracked()).0 );
    assert!(diff < 1e-6);
    let outputs = Tensor::<f64>::randn(&[2,4,3]);
    let diff = Variable::<f64>::check_gradients(&[2,3], |q| outputs.tracked().attention_pool(q).0 );
    assert!(diff < 1e-6);
  }

  #[test]
  fn loss_and_accuracy() {
    let logits = Tensor::new(&[2,2], vec![2.0, 0.0, 0.0, 2.0]).trained();
    let targets = Tensor::new(&[2,2], vec![1.0, 0.0, 1.0, 0.0]);
    assert_relative_eq!(logits.accuracy(&targets), 0.5);
    let loss = logits.softmax_cross_entropy(&targets);
    let p = 1.0 / (1.0 + (-2.0f64).exp());
    assert_relative_eq!(loss.item(), -(p.ln() + (1.0 - p).ln()) / 2.0, epsilon = 1e-12);
  }
}
