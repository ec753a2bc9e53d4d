use crate::autograd::graph::NodeId;
use crate::autograd::BackwardOp;
use crate::error::MilRustError;
use crate::ops::segment::check_segment_args;
use crate::ops::segment::partition::BagPartition;
use crate::tensor::Tensor;
use crate::tensor_data::TensorData;
use crate::types::DType;
use num_traits::{Float, FromPrimitive};
use std::sync::{Arc, RwLock};

/// Backward operation context for `segment_mean`.
///
/// The mean gradient is uniform within a bag: `∂mean/∂x_c = 1/len(bag)` for
/// every column `c` the bag owns. The backward therefore needs only the
/// partition and the input shape, no values from the forward pass.
#[derive(Debug)]
struct SegmentMeanBackward {
    input_node: Arc<RwLock<TensorData>>,
    input_shape: Vec<usize>, // [features, instances]
    bags: BagPartition,
}

impl BackwardOp for SegmentMeanBackward {
    fn backward(&self, grad_output: &Tensor) -> Result<Vec<Tensor>, MilRustError> {
        let nfeatures = self.input_shape[0];
        let ninstances = self.input_shape[1];
        let nbags = self.bags.num_bags();

        let actual = grad_output.shape();
        if actual != [nfeatures, nbags] {
            return Err(MilRustError::ShapeMismatch {
                expected: vec![nfeatures, nbags],
                actual,
                operation: "segment_mean_backward".to_string(),
            });
        }

        let grad_input = match grad_output.dtype() {
            DType::F32 => {
                let grad = grad_output.get_f32_data()?;
                let data =
                    segment_mean_grad_kernel(&grad, nfeatures, ninstances, &self.bags)?;
                Tensor::new(data, self.input_shape.clone())?
            }
            DType::F64 => {
                let grad = grad_output.get_f64_data()?;
                let data =
                    segment_mean_grad_kernel(&grad, nfeatures, ninstances, &self.bags)?;
                Tensor::new_f64(data, self.input_shape.clone())?
            }
        };

        Ok(vec![grad_input])
    }

    fn inputs(&self) -> Vec<NodeId> {
        vec![Arc::as_ptr(&self.input_node)]
    }
}

/// Round-based per-bag mean kernel: accumulate per round, then divide each
/// output column by its bag length.
fn segment_mean_kernel<T: Float + FromPrimitive>(
    input: &[T],
    nfeatures: usize,
    ninstances: usize,
    bags: &BagPartition,
) -> Result<Vec<T>, MilRustError> {
    let nbags = bags.num_bags();
    let mut out = vec![T::zero(); nfeatures * nbags];

    for r in 0..bags.max_len() {
        for (bag, col) in bags.round(r) {
            for f in 0..nfeatures {
                let cell = f * nbags + bag;
                out[cell] = out[cell] + input[f * ninstances + col];
            }
        }
    }

    for (bag, &len) in bags.lengths().iter().enumerate() {
        let len_t = T::from_usize(len).ok_or_else(|| {
            MilRustError::InternalError(
                "Failed to convert bag length to the tensor element type".to_string(),
            )
        })?;
        for f in 0..nfeatures {
            let cell = f * nbags + bag;
            out[cell] = out[cell] / len_t;
        }
    }

    Ok(out)
}

/// Two-pass mean gradient kernel.
///
/// Pass 1 broadcasts: round `r` assigns `grad[f, bag]` to every active bag's
/// round-`r` column. Direct assignment is enough: each column is a
/// representative in exactly one round, so rounds touch disjoint columns.
///
/// Pass 2 normalizes, keyed by owning-bag *length* rather than by round:
/// every column of a bag of length `len >= 2` is divided by `len` exactly
/// once, no matter how many rounds revisited the bag. Length-1 bags skip the
/// division entirely.
fn segment_mean_grad_kernel<T: Float + FromPrimitive>(
    grad: &[T],
    nfeatures: usize,
    ninstances: usize,
    bags: &BagPartition,
) -> Result<Vec<T>, MilRustError> {
    let nbags = bags.num_bags();
    let mut grad_input = vec![T::zero(); nfeatures * ninstances];

    for r in 0..bags.max_len() {
        for (bag, col) in bags.round(r) {
            for f in 0..nfeatures {
                grad_input[f * ninstances + col] = grad[f * nbags + bag];
            }
        }
    }

    for (len, bag_ids) in bags.bags_by_len() {
        if len < 2 {
            continue;
        }
        let len_t = T::from_usize(len).ok_or_else(|| {
            MilRustError::InternalError(
                "Failed to convert bag length to the tensor element type".to_string(),
            )
        })?;
        for &bag in &bag_ids {
            for col in bags.range(bag) {
                for f in 0..nfeatures {
                    let idx = f * ninstances + col;
                    grad_input[idx] = grad_input[idx] / len_t;
                }
            }
        }
    }

    Ok(grad_input)
}

/// Per-bag mean over the instance axis.
///
/// `Y[f, b] = mean(X[f, c] for c in bag b)`, one output column per bag,
/// computed as `bags.max_len()` lock-step accumulation rounds followed by a
/// broadcast division by the bag lengths.
///
/// When `input` requires grad, the attached backward distributes the upstream
/// gradient uniformly over each bag's columns (factor `1/len`). The partition
/// is structural and never receives a gradient.
pub fn segment_mean(input: &Tensor, bags: &BagPartition) -> Result<Tensor, MilRustError> {
    let guard = input.read_data();
    let (nfeatures, ninstances) = check_segment_args(&guard, bags, "segment_mean")?;
    let nbags = bags.num_bags();

    let requires_grad = guard.requires_grad;
    let input_node_arc = if requires_grad {
        Some(Arc::clone(&input.data))
    } else {
        None
    };

    log::trace!(
        "segment_mean: [{}, {}] -> [{}, {}], {} rounds",
        nfeatures,
        ninstances,
        nfeatures,
        nbags,
        bags.max_len()
    );

    let output = match guard.dtype {
        DType::F32 => {
            let buffer = guard.buffer().try_get_cpu_f32()?;
            let data = &buffer[guard.offset..guard.offset + guard.numel()];
            let values = segment_mean_kernel(data, nfeatures, ninstances, bags)?;
            Tensor::new(values, vec![nfeatures, nbags])?
        }
        DType::F64 => {
            let buffer = guard.buffer().try_get_cpu_f64()?;
            let data = &buffer[guard.offset..guard.offset + guard.numel()];
            let values = segment_mean_kernel(data, nfeatures, ninstances, bags)?;
            Tensor::new_f64(values, vec![nfeatures, nbags])?
        }
    };
    drop(guard);

    if requires_grad {
        if let Some(input_node) = input_node_arc {
            let grad_fn = SegmentMeanBackward {
                input_node,
                input_shape: vec![nfeatures, ninstances],
                bags: bags.clone(),
            };
            let mut output_guard = output.write_data();
            output_guard.requires_grad = true;
            output_guard.grad_fn = Some(Arc::new(grad_fn));
        } else {
            return Err(MilRustError::InternalError(
                "segment_mean requires grad but input node is unavailable".to_string(),
            ));
        }
    }

    Ok(output)
}

#[cfg(test)]
#[path = "mean_test.rs"]
mod tests;
