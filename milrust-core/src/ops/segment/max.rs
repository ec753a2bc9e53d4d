use crate::autograd::graph::NodeId;
use crate::autograd::BackwardOp;
use crate::error::MilRustError;
use crate::ops::segment::check_segment_args;
use crate::ops::segment::partition::BagPartition;
use crate::tensor::Tensor;
use crate::tensor_data::TensorData;
use crate::types::DType;
use num_traits::Float;
use std::sync::{Arc, RwLock};

/// Backward operation context for `segment_max`.
///
/// Max has a winner-take-all gradient: for every `(feature, bag)` cell, only
/// the instance column that attained the maximum receives the upstream
/// gradient. The forward pass records those columns in `winners` (a private
/// cache, never exposed to callers), so the backward is a plain scatter with
/// no recomputation and, since winners are unique per cell, no accumulation.
#[derive(Debug)]
struct SegmentMaxBackward {
    input_node: Arc<RwLock<TensorData>>,
    input_shape: Vec<usize>, // [features, instances]
    bags: BagPartition,
    /// Winning column per `(feature, bag)` cell, row-major `[features, bags]`.
    winners: Vec<usize>,
}

impl BackwardOp for SegmentMaxBackward {
    fn backward(&self, grad_output: &Tensor) -> Result<Vec<Tensor>, MilRustError> {
        let nfeatures = self.input_shape[0];
        let ninstances = self.input_shape[1];
        let nbags = self.bags.num_bags();

        let actual = grad_output.shape();
        if actual != [nfeatures, nbags] {
            return Err(MilRustError::ShapeMismatch {
                expected: vec![nfeatures, nbags],
                actual,
                operation: "segment_max_backward".to_string(),
            });
        }

        let grad_input = match grad_output.dtype() {
            DType::F32 => {
                let grad = grad_output.get_f32_data()?;
                let mut grad_input = vec![0.0f32; nfeatures * ninstances];
                scatter_winner_grad(&grad, &self.winners, nbags, ninstances, &mut grad_input);
                Tensor::new(grad_input, self.input_shape.clone())?
            }
            DType::F64 => {
                let grad = grad_output.get_f64_data()?;
                let mut grad_input = vec![0.0f64; nfeatures * ninstances];
                scatter_winner_grad(&grad, &self.winners, nbags, ninstances, &mut grad_input);
                Tensor::new_f64(grad_input, self.input_shape.clone())?
            }
        };

        Ok(vec![grad_input])
    }

    fn inputs(&self) -> Vec<NodeId> {
        vec![Arc::as_ptr(&self.input_node)]
    }
}

/// Scatters `grad[f, b]` to `grad_input[f, winners[f, b]]`.
fn scatter_winner_grad<T: Copy>(
    grad: &[T],
    winners: &[usize],
    nbags: usize,
    ninstances: usize,
    grad_input: &mut [T],
) {
    debug_assert_eq!(grad.len(), winners.len());
    for (cell, (&g, &winner)) in grad.iter().zip(winners.iter()).enumerate() {
        let feature = cell / nbags;
        grad_input[feature * ninstances + winner] = g;
    }
}

/// Round-based per-bag maximum kernel.
///
/// Running maxima start at `-inf` (the reduction identity, valid for any
/// finite input) and advance on strict `>` only, so ties resolve to the
/// earliest column. After `max_len` rounds every bag has been visited exactly
/// `len(bag)` times.
fn segment_max_kernel<T: Float>(
    input: &[T],
    nfeatures: usize,
    ninstances: usize,
    bags: &BagPartition,
) -> Vec<T> {
    let nbags = bags.num_bags();
    let mut out = vec![T::neg_infinity(); nfeatures * nbags];
    for r in 0..bags.max_len() {
        for (bag, col) in bags.round(r) {
            for f in 0..nfeatures {
                let cell = f * nbags + bag;
                let v = input[f * ninstances + col];
                if v > out[cell] {
                    out[cell] = v;
                }
            }
        }
    }
    out
}

/// Round-based maximum kernel that also locates each cell's winning column.
///
/// Two running-value buffers alternate roles by round parity: each round reads
/// the previous round's values and writes the next, so the comparison never
/// races the update it feeds. `increases` counts strict increases per cell;
/// the running maximum is monotone and advances only at the round holding the
/// first occurrence of the bag maximum, so after the last round the count *is*
/// that round's 1-based index, and the winning column is
/// `start(bag) + count - 1`. No per-round history is stored.
///
/// The count is at least 1 for every cell because the first active round
/// strictly raises the running value from `-inf`; this is why finite inputs
/// are a precondition (NaN comparisons would leave cells uncounted).
fn segment_max_track_kernel<T: Float>(
    input: &[T],
    nfeatures: usize,
    ninstances: usize,
    bags: &BagPartition,
) -> (Vec<T>, Vec<usize>) {
    let nbags = bags.num_bags();
    let ncells = nfeatures * nbags;
    let mlen = bags.max_len();

    let mut bufs = [
        vec![T::neg_infinity(); ncells],
        vec![T::neg_infinity(); ncells],
    ];
    let mut increases = vec![0usize; ncells];

    for r in 0..mlen {
        let (left, right) = bufs.split_at_mut(1);
        let (cur, next) = if r % 2 == 0 {
            (&mut left[0], &mut right[0])
        } else {
            (&mut right[0], &mut left[0])
        };
        // Inactive bags carry their running value forward unchanged.
        next.copy_from_slice(cur);
        for (bag, col) in bags.round(r) {
            for f in 0..nfeatures {
                let cell = f * nbags + bag;
                let v = input[f * ninstances + col];
                if v > cur[cell] {
                    next[cell] = v;
                    increases[cell] += 1;
                }
            }
        }
    }

    let values = std::mem::take(&mut bufs[mlen % 2]);

    let mut winners = vec![0usize; ncells];
    for (bag, range) in bags.ranges().iter().enumerate() {
        for f in 0..nfeatures {
            let cell = f * nbags + bag;
            winners[cell] = range.start + increases[cell] - 1;
        }
    }
    (values, winners)
}

/// Per-bag maximum over the instance axis.
///
/// `Y[f, b] = max(X[f, c] for c in bag b)`, with one output column per bag.
/// Computed in `bags.max_len()` lock-step rounds over all still-active bags
/// rather than one variable-length loop per bag. When several columns of a bag
/// share the maximum for a feature, the earliest column wins.
///
/// When `input` requires grad, the forward additionally tracks each cell's
/// winning column and attaches a backward node that scatters the upstream
/// gradient to exactly those columns. The partition is structural and never
/// receives a gradient.
///
/// Inputs must be finite; NaN/Inf values break winner tracking and are a
/// caller precondition, not checked at runtime.
pub fn segment_max(input: &Tensor, bags: &BagPartition) -> Result<Tensor, MilRustError> {
    let guard = input.read_data();
    let (nfeatures, ninstances) = check_segment_args(&guard, bags, "segment_max")?;
    let nbags = bags.num_bags();

    let requires_grad = guard.requires_grad;
    let input_node_arc = if requires_grad {
        Some(Arc::clone(&input.data))
    } else {
        None
    };

    log::trace!(
        "segment_max: [{}, {}] -> [{}, {}], {} rounds",
        nfeatures,
        ninstances,
        nfeatures,
        nbags,
        bags.max_len()
    );

    let (output, winners) = match guard.dtype {
        DType::F32 => {
            let buffer = guard.buffer().try_get_cpu_f32()?;
            let data = &buffer[guard.offset..guard.offset + guard.numel()];
            if requires_grad {
                let (values, winners) =
                    segment_max_track_kernel(data, nfeatures, ninstances, bags);
                (Tensor::new(values, vec![nfeatures, nbags])?, Some(winners))
            } else {
                let values = segment_max_kernel(data, nfeatures, ninstances, bags);
                (Tensor::new(values, vec![nfeatures, nbags])?, None)
            }
        }
        DType::F64 => {
            let buffer = guard.buffer().try_get_cpu_f64()?;
            let data = &buffer[guard.offset..guard.offset + guard.numel()];
            if requires_grad {
                let (values, winners) =
                    segment_max_track_kernel(data, nfeatures, ninstances, bags);
                (
                    Tensor::new_f64(values, vec![nfeatures, nbags])?,
                    Some(winners),
                )
            } else {
                let values = segment_max_kernel(data, nfeatures, ninstances, bags);
                (Tensor::new_f64(values, vec![nfeatures, nbags])?, None)
            }
        }
    };
    drop(guard);

    if requires_grad {
        if let (Some(input_node), Some(winners)) = (input_node_arc, winners) {
            let grad_fn = SegmentMaxBackward {
                input_node,
                input_shape: vec![nfeatures, ninstances],
                bags: bags.clone(),
                winners,
            };
            let mut output_guard = output.write_data();
            output_guard.requires_grad = true;
            output_guard.grad_fn = Some(Arc::new(grad_fn));
        } else {
            return Err(MilRustError::InternalError(
                "segment_max requires grad but the winner cache is unavailable".to_string(),
            ));
        }
    }

    Ok(output)
}

#[cfg(test)]
#[path = "max_test.rs"]
mod tests;
