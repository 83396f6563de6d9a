use std::rc::Rc;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::fmt::Debug;

mod mops;
mod nn;
mod layer;

pub use layer::Layer;

use crate::{
  tensor::Tensor,
  scalar::Real,
  ops::{ BaseOps, NumericOps, Hops },
};


pub fn make_id() -> usize {
  static LAST_ID: AtomicUsize = AtomicUsize::new(0);
  LAST_ID.fetch_add(1, Ordering::Relaxed)
}


/// Unary computational operation that can also compute its derivative.

pub trait UnaryOp<T: Real>: Debug {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T>;
  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T>;
}


/// Binary computational operation that can also compute its derivative.

pub trait BinaryOp<T: Real>: Debug {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T>;
  fn derive(&self, lhs: &Tensor<T>, rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>);
}


/// Computational operation with any number of inputs that can also compute its derivative.

pub trait MultiOp<T: Real>: Debug {
  fn run(&self, inputs: &[&Tensor<T>]) -> Tensor<T>;
  fn derive(&self, inputs: &[&Tensor<T>], grad: &Tensor<T>) -> Vec<Tensor<T>>;
}


#[derive(Debug)]
enum Op<T: Real> {
  Unary(Box<dyn UnaryOp<T>>),
  Binary(Box<dyn BinaryOp<T>>),
  Multi(Box<dyn MultiOp<T>>),
}


/// Node in a computation graph, containing a [Variable]'s data and gradient,
/// as well as the operation used to create it.

#[derive(Debug)]
struct Node<T: Real> {
  id: usize,
  data: Tensor<T>,
  grad: Option<Tensor<T>>,
  op: Option<Op<T>>,
  previous: Vec<Rc<Self>>,
  trainable: bool,
}

impl<T: Real> Node<T> {
  fn reset_gradient(&self, filler: T) {
    if let Some(grad) = &self.grad {
      grad.refill(filler);
    }
  }

  fn backward(&self) {
    if let (Some(op), Some(grad)) = (&self.op, &self.grad) {
      let inputs: Vec<&Tensor<T>> = self.previous.iter().map(|prev| &prev.data ).collect();
      let changes = match op {
        Op::Unary(op) => vec![op.derive(inputs[0], grad)],
        Op::Binary(op) => {
          let (lhs, rhs) = op.derive(inputs[0], inputs[1], grad);
          vec![lhs, rhs]
        },
        Op::Multi(op) => op.derive(&inputs, grad),
      };
      for (change, prev) in changes.iter().zip(&self.previous) {
        if let Some(grad) = &prev.grad {
          assert_eq!(change.dims(), grad.dims(), "Gradient of {:?} has wrong shape", op);
          grad.assign(&grad.add(change));
        }
      }
    }
  }
}


/// Variables track the computational operations used to create them and allow
/// for computing their gradient with respect to all input variables involved.
///
/// They get created by calling [tracked](Tensor::tracked) or
/// [trained](Tensor::trained) on any differentiable [Tensor] type.
///
/// Variables dereference to their underlying [Tensor] automatically for
/// non-differentiable operations. Differentiable operations, on the other hand,
/// will always return another Variable.

#[derive(Debug, Clone)]
pub struct Variable<T: Real> {
  node: Rc<Node<T>>,
}

impl<T: Real> Hops<T> for Variable<T> {}

impl<T: Real> std::ops::Deref for Variable<T> {
  type Target = Tensor<T>;

  fn deref(&self) -> &Self::Target {
    &self.node.data
  }
}

impl<T: Real> PartialEq for Variable<T> {
  fn eq(&self, rhs: &Self) -> bool {
    self.node.data == rhs.node.data
  }
}

impl<T: Real> Variable<T> {
  pub(crate) fn from_tensor(tensor: Tensor<T>, trainable: bool) -> Self {
    Self {
      node: Rc::new(Node {
        id: make_id(),
        grad: trainable.then(|| Tensor::zeros(tensor.dims()) ),
        data: tensor,
        op: None,
        previous: vec![],
        trainable,
      }),
    }
  }

  fn operation(op: Op<T>, data: Tensor<T>, grad: bool, previous: Vec<Rc<Node<T>>>) -> Self {
    Self {
      node: Rc::new(Node {
        id: make_id(),
        grad: grad.then(|| Tensor::zeros(data.dims()) ),
        data,
        op: Some(op),
        previous,
        trainable: false,
      }),
    }
  }

  pub fn id(&self) -> usize {
    self.node.id
  }

  pub fn tensor(&self) -> &Tensor<T> {
    &self.node.data
  }

  pub fn grad(&self) -> Option<&Tensor<T>> {
    self.node.grad.as_ref()
  }

  pub fn trainable(&self) -> bool {
    self.node.trainable
  }

  pub fn unary_op(&self, op: impl UnaryOp<T> + 'static) -> Self {
    let data = op.run(&self.node.data);
    Self::operation(
      Op::Unary(Box::new(op)),
      data,
      self.grad().is_some(),
      vec![self.node.clone()],
    )
  }

  pub fn binary_op(&self, op: impl BinaryOp<T> + 'static, rhs: &Self) -> Self {
    let data = op.run(&self.node.data, &rhs.node.data);
    Self::operation(
      Op::Binary(Box::new(op)),
      data,
      self.grad().is_some() || rhs.grad().is_some(),
      vec![self.node.clone(), rhs.node.clone()],
    )
  }

  pub fn multi_op(op: impl MultiOp<T> + 'static, inputs: &[&Self]) -> Self {
    let tensors: Vec<&Tensor<T>> = inputs.iter().map(|input| &input.node.data ).collect();
    let data = op.run(&tensors);
    Self::operation(
      Op::Multi(Box::new(op)),
      data,
      inputs.iter().any(|input| input.grad().is_some() ),
      inputs.iter().map(|input| input.node.clone() ).collect(),
    )
  }

  /// Compute gradients across this Variable's entire graph.
  ///
  /// Gradients accumulate until [reset](Variable::reset) gets called.

  pub fn backward(&self) {
    if self.grad().is_none() { panic!("Cannot compute gradients for constant {self}") }
    self.node.reset_gradient(T::one());
    for node in self.history().iter().rev() {
      node.backward();
    }
  }

  /// List all trainable parameters in this Variable's graph.

  pub fn parameters(&self) -> Vec<Self> {
    self.history()
      .into_iter()
      .filter(|node| node.trainable )
      .map(|node| Self { node } )
      .collect()
  }

  /// Set gradients to zero for this Variable's entire graph.

  pub fn reset(&self) {
    for node in self.history() {
      node.reset_gradient(T::zero());
    }
  }

  /// A constant copy of this Variable's current value, cut off from its graph.

  pub fn detached(&self) -> Self {
    self.node.data.detach().tracked()
  }

  // Depth-first topological order, inputs before outputs
  fn history(&self) -> Vec<Rc<Node<T>>> {
    let mut history = vec![];
    let mut visited = HashSet::new();
    let mut stack = vec![(self.node.clone(), false)];
    while let Some((node, expanded)) = stack.pop() {
      if expanded {
        history.push(node);
        continue
      }
      if !visited.insert(node.id) { continue }
      stack.push((node.clone(), true));
      for prev in node.previous.iter().rev() {
        if !visited.contains(&prev.id) {
          stack.push((prev.clone(), false));
        }
      }
    }
    history
  }

  /// Compute a function's gradient with respect to a generated
  /// input numerically and compare it to the automatically derived
  /// solution.
  ///
  /// Returns the mean absolute difference between both gradients.

  pub fn check_gradients<F>(shape: &[usize], generator: F) -> T
  where
    F: Fn(&Self) -> Self
  {
    let eps = T::from(1e-4).unwrap();
    let two = T::from(2.0).unwrap();
    let total = |var: &Self| {
      let size = var.size();
      var.reshape(&[size]).sum(0)
    };
    // Generate random input
    let input = Tensor::randn(shape);
    let var = input.trained();
    // Compute gradient using auto diff
    let output = total(&generator(&var));
    output.backward();
    let grad = var.grad().unwrap().detach();
    // Compute gradient numerically for every param in input
    let len = input.size();
    let num_grad: Vec<T> = (0..len).map(|i| {
      let epst = Tensor::hot_encode(i, len).reshape(shape) * eps;
      let prev = total(&generator(&(&input - &epst).tracked())).item();
      let next = total(&generator(&(&input + &epst).tracked())).item();
      (next - prev) / (two * eps)
    }).collect();
    let num_grad = Tensor::new(grad.dims(), num_grad);
    let diff = (grad - num_grad).vectorize(|a| if a < T::zero() { -a } else { a } );
    diff.param_iter().fold(T::zero(), |acc, a| acc + a ) / T::from(len).unwrap()
  }

  /// Number of nodes, operations and trainable values in this Variable's graph.

  pub fn statistics(&self) -> (usize, usize, usize) {
    let history = self.history();
    let num_nodes = history.len();
    let num_ops = history.iter().filter(|node| node.op.is_some() ).count();
    let num_trainable = self.parameters().iter().map(|param| param.size() ).sum();
    (num_nodes, num_ops, num_trainable)
  }
}

impl<T: Real> std::fmt::Display for Variable<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    let title = if self.node.trainable { "Trainable" } else if self.node.grad.is_some() {
      "Computed"
    } else {
      "Tracked"
    };
    write!(f, "{title} {}", self.tensor())
  }
}
