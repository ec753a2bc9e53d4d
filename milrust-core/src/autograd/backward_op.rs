use crate::autograd::graph::NodeId;
use crate::error::MilRustError;
use crate::tensor::Tensor;
use std::fmt::Debug;

/// Interface for the backward pass of a differentiable tensor operation.
///
/// Any operation producing a non-leaf tensor stores one of these in the output
/// tensor's `grad_fn`. During `backward()` the traversal calls it to propagate
/// gradients by the chain rule.
///
/// `Debug + Send + Sync` bounds are required because the `Arc<dyn BackwardOp>`
/// holding the node may be shared across threads.
pub trait BackwardOp: Debug + Send + Sync {
    /// Computes the gradients of the operation's inputs, given the gradient of
    /// its output.
    ///
    /// # Arguments
    /// * `grad_output`: gradient flowing into this operation's output node;
    ///   same shape, dtype, and device as the forward output.
    ///
    /// # Returns
    /// One gradient tensor per forward input, in the same order as
    /// [`inputs`](Self::inputs), each shaped like the corresponding input.
    fn backward(&self, grad_output: &Tensor) -> Result<Vec<Tensor>, MilRustError>;

    /// Identities of the input `TensorData` nodes of the forward operation.
    ///
    /// The raw pointers give a stable node identity even as `Tensor` handles
    /// are cloned or dropped, which makes them usable as graph keys. They stay
    /// valid during a backward pass because every implementor holds an `Arc`
    /// to each of its input nodes.
    ///
    /// The order must match the gradients returned by
    /// [`backward`](Self::backward).
    fn inputs(&self) -> Vec<NodeId>;
}
