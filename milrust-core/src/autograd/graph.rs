use crate::error::MilRustError;
use crate::tensor::Tensor;
use crate::tensor_data::TensorData;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

/// Stable identity of a node in the computation graph.
///
/// A raw pointer to the shared `TensorData` lock: identity survives `Tensor`
/// handle clones and is hashable, unlike the handles themselves. Dereferencing
/// is only sound while the node is kept alive, which the backward traversal
/// guarantees (see `topological_sort`).
pub type NodeId = *const RwLock<TensorData>;

/// Returns the graph nodes reachable from `root` in reverse topological order
/// (root first, leaves last), following `grad_fn` input edges.
///
/// Detects cycles and reports them as `MilRustError::CycleDetected` instead of
/// recursing forever; a well-formed forward pass can never build one, so a
/// cycle means the graph was corrupted.
///
/// Pointer validity: `root` is borrowed for the whole walk, and every interior
/// node is owned by an `Arc` inside the `BackwardOp` of its consumer, so each
/// node reached through `inputs()` outlives the traversal.
pub(crate) fn topological_sort(root: &Tensor) -> Result<Vec<NodeId>, MilRustError> {
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut on_stack: HashSet<NodeId> = HashSet::new();
    let mut postorder: Vec<NodeId> = Vec::new();

    visit(
        Arc::as_ptr(&root.data),
        &mut visited,
        &mut on_stack,
        &mut postorder,
    )?;

    postorder.reverse();
    Ok(postorder)
}

fn visit(
    node: NodeId,
    visited: &mut HashSet<NodeId>,
    on_stack: &mut HashSet<NodeId>,
    postorder: &mut Vec<NodeId>,
) -> Result<(), MilRustError> {
    if visited.contains(&node) {
        return Ok(());
    }
    if !on_stack.insert(node) {
        return Err(MilRustError::CycleDetected);
    }

    // SAFETY: `node` is kept alive by the root borrow or by an Arc held in
    // the BackwardOp we reached it through (see function docs).
    let grad_fn = {
        let guard = unsafe { &*node }.read().map_err(|_| {
            MilRustError::InternalError(
                "RwLock poisoned during graph traversal".to_string(),
            )
        })?;
        guard.grad_fn.clone()
    };

    if let Some(op) = grad_fn {
        for input in op.inputs() {
            visit(input, visited, on_stack, postorder)?;
        }
    }

    on_stack.remove(&node);
    visited.insert(node);
    postorder.push(node);
    Ok(())
}
