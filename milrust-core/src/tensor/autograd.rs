// src/tensor/autograd.rs

use crate::autograd::graph::{topological_sort, NodeId};
use crate::autograd::BackwardOp;
use crate::error::MilRustError;
use crate::tensor::Tensor;
use crate::tensor_data::TensorData;
use crate::types::DType;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

impl Tensor {
    /// Whether this tensor requires gradient computation.
    pub fn requires_grad(&self) -> bool {
        self.read_data().requires_grad
    }

    /// Sets the `requires_grad` flag in place. Only allowed on leaf tensors.
    pub fn requires_grad_(&self, requires_grad: bool) -> Result<(), MilRustError> {
        let mut guard = self.write_data();
        if guard.grad_fn.is_some() {
            return Err(MilRustError::RequiresGradOnNonLeaf);
        }
        guard.requires_grad = requires_grad;
        Ok(())
    }

    /// A clone of the gradient tensor, if one has been accumulated.
    pub fn grad(&self) -> Option<Tensor> {
        self.read_data().grad.clone()
    }

    /// A clone of the backward node that produced this tensor, if any.
    pub fn grad_fn(&self) -> Option<Arc<dyn BackwardOp + Send + Sync>> {
        self.read_data().grad_fn.clone()
    }

    /// A new tensor sharing the same buffer but detached from the graph.
    pub fn detach(&self) -> Tensor {
        let guard = self.read_data();
        let detached_data = TensorData {
            buffer: Arc::clone(&guard.buffer),
            device: guard.device,
            dtype: guard.dtype,
            shape: guard.shape.clone(),
            strides: guard.strides.clone(),
            offset: guard.offset,
            requires_grad: false,
            grad: None,
            grad_fn: None,
        };
        Tensor {
            data: Arc::new(RwLock::new(detached_data)),
        }
    }

    /// Resets the accumulated gradient to `None`.
    pub fn zero_grad(&self) {
        let mut guard = self.write_data();
        guard.grad = None;
    }

    /// Accumulates `grad_to_add` into this tensor's `grad` field, adding to an
    /// existing gradient element-wise.
    pub fn acc_grad(&self, grad_to_add: Tensor) -> Result<(), MilRustError> {
        accumulate_grad(&self.data, grad_to_add)
    }

    /// Performs the backward pass starting from this tensor.
    ///
    /// Walks the graph in reverse topological order, calls each node's
    /// `BackwardOp`, and accumulates the resulting gradients into the leaf
    /// tensors that require them.
    ///
    /// # Arguments
    /// * `gradient`: initial gradient for this tensor (dL/dself). If `None`
    ///   the tensor must hold a single element and the seed defaults to one.
    ///
    /// # Errors
    /// * `RequiresGradNotMet` if this tensor does not require gradients.
    /// * `ShapeMismatch` / `UnsupportedOperation` if the provided seed does not
    ///   match this tensor's shape or dtype.
    /// * `BackwardNonScalar` if `gradient` is `None` on a multi-element tensor.
    pub fn backward(&self, gradient: Option<Tensor>) -> Result<(), MilRustError> {
        if !self.requires_grad() {
            return Err(MilRustError::RequiresGradNotMet);
        }

        let grad_init = match gradient {
            Some(g) => {
                if g.shape() != self.shape() {
                    return Err(MilRustError::ShapeMismatch {
                        expected: self.shape(),
                        actual: g.shape(),
                        operation: "backward".to_string(),
                    });
                }
                if g.dtype() != self.dtype() {
                    return Err(MilRustError::UnsupportedOperation(format!(
                        "backward seed dtype {:?} does not match tensor dtype {:?}",
                        g.dtype(),
                        self.dtype()
                    )));
                }
                g
            }
            None => {
                if self.numel() != 1 {
                    return Err(MilRustError::BackwardNonScalar);
                }
                crate::tensor::create::ones_like(self)?
            }
        };

        log::debug!(
            "backward: traversal from node {:?} (shape {:?})",
            Arc::as_ptr(&self.data),
            self.shape()
        );

        let order = topological_sort(self)?;
        let mut grad_map: HashMap<NodeId, Tensor> = HashMap::new();
        grad_map.insert(Arc::as_ptr(&self.data), grad_init);

        for node_id in order {
            let node_grad = match grad_map.remove(&node_id) {
                Some(g) => g,
                // No gradient flowed back to this node.
                None => continue,
            };

            // SAFETY: nodes in `order` are kept alive by `self` (the root) or
            // by the Arcs their consumers' BackwardOps hold; see graph module.
            let node_lock = unsafe { &*node_id };
            let (grad_fn, accumulate_here) = {
                let guard = node_lock.read().map_err(|_| {
                    MilRustError::InternalError(
                        "RwLock poisoned during backward traversal".to_string(),
                    )
                })?;
                (
                    guard.grad_fn.clone(),
                    guard.requires_grad && guard.grad_fn.is_none(),
                )
            };

            if accumulate_here {
                // Leaf that requires grad: this is where gradients land.
                accumulate_grad(node_lock, node_grad)?;
                continue;
            }

            let op = match grad_fn {
                Some(op) => op,
                None => continue,
            };

            let input_grads = op.backward(&node_grad)?;
            let input_ids = op.inputs();
            if input_grads.len() != input_ids.len() {
                return Err(MilRustError::InternalError(format!(
                    "BackwardOp returned {} gradients for {} inputs",
                    input_grads.len(),
                    input_ids.len()
                )));
            }

            for (input_id, grad_to_add) in input_ids.into_iter().zip(input_grads) {
                match grad_map.remove(&input_id) {
                    Some(existing) => {
                        let merged =
                            add_same_shape(&existing, &grad_to_add, "grad accumulation")?;
                        grad_map.insert(input_id, merged);
                    }
                    None => {
                        grad_map.insert(input_id, grad_to_add);
                    }
                }
            }
        }

        Ok(())
    }
}

impl Clone for Tensor {
    fn clone(&self) -> Self {
        Tensor {
            data: Arc::clone(&self.data), // clones the handle, not the data
        }
    }
}

/// Adds two tensors of identical shape and dtype element-wise.
///
/// This is all the arithmetic the backward traversal needs; there is no general
/// broadcasting add in this crate.
pub(crate) fn add_same_shape(
    a: &Tensor,
    b: &Tensor,
    operation: &str,
) -> Result<Tensor, MilRustError> {
    let a_shape = a.shape();
    let b_shape = b.shape();
    if a_shape != b_shape {
        return Err(MilRustError::ShapeMismatch {
            expected: a_shape,
            actual: b_shape,
            operation: operation.to_string(),
        });
    }
    if a.dtype() != b.dtype() {
        return Err(MilRustError::UnsupportedOperation(format!(
            "{}: dtype mismatch ({:?} vs {:?})",
            operation,
            a.dtype(),
            b.dtype()
        )));
    }
    match a.dtype() {
        DType::F32 => {
            let a_data = a.get_f32_data()?;
            let b_data = b.get_f32_data()?;
            let sum: Vec<f32> = a_data.iter().zip(b_data.iter()).map(|(x, y)| x + y).collect();
            Tensor::new(sum, a.shape())
        }
        DType::F64 => {
            let a_data = a.get_f64_data()?;
            let b_data = b.get_f64_data()?;
            let sum: Vec<f64> = a_data.iter().zip(b_data.iter()).map(|(x, y)| x + y).collect();
            Tensor::new_f64(sum, a.shape())
        }
    }
}

/// Accumulates `grad_to_add` into the `grad` field behind `tensor_data_lock`.
///
/// Operates on the lock directly so the backward traversal, which only has
/// `NodeId`s, can accumulate without reconstructing a `Tensor` handle.
fn accumulate_grad(
    tensor_data_lock: &RwLock<TensorData>,
    grad_to_add: Tensor,
) -> Result<(), MilRustError> {
    let existing = {
        let mut guard = tensor_data_lock.write().map_err(|_| {
            MilRustError::InternalError(
                "RwLock poisoned during gradient accumulation".to_string(),
            )
        })?;

        if guard.device != grad_to_add.device() {
            return Err(MilRustError::DeviceMismatch {
                expected: guard.device,
                actual: grad_to_add.device(),
                operation: "acc_grad".to_string(),
            });
        }
        if guard.shape != grad_to_add.shape() {
            return Err(MilRustError::GradientAccumulationShapeMismatch {
                expected: guard.shape.clone(),
                actual: grad_to_add.shape(),
            });
        }
        guard.grad.take()
    };

    let new_grad = match existing {
        Some(existing_grad) => add_same_shape(&existing_grad, &grad_to_add, "acc_grad")?,
        None => grad_to_add,
    };

    let mut guard = tensor_data_lock.write().map_err(|_| {
        MilRustError::InternalError("RwLock poisoned during gradient accumulation".to_string())
    })?;
    guard.grad = Some(new_grad);
    Ok(())
}
