//! Reference implementations of the segmented reductions.
//!
//! One scalar loop per bag, slicing the bag's columns and reducing them
//! directly. These exist to validate the round-based kernels and their
//! gradients (via finite differences); they attach no backward nodes and are
//! not meant for production use.

use crate::error::MilRustError;
use crate::ops::segment::check_segment_args;
use crate::ops::segment::partition::BagPartition;
use crate::tensor::Tensor;
use crate::types::DType;
use num_traits::{Float, FromPrimitive};

fn naive_max_kernel<T: Float>(
    input: &[T],
    nfeatures: usize,
    ninstances: usize,
    bags: &BagPartition,
) -> Vec<T> {
    let nbags = bags.num_bags();
    let mut out = vec![T::neg_infinity(); nfeatures * nbags];
    for (bag, range) in bags.ranges().iter().enumerate() {
        for f in 0..nfeatures {
            let mut best = T::neg_infinity();
            for col in range.clone() {
                let v = input[f * ninstances + col];
                if v > best {
                    best = v;
                }
            }
            out[f * nbags + bag] = best;
        }
    }
    out
}

fn naive_mean_kernel<T: Float + FromPrimitive>(
    input: &[T],
    nfeatures: usize,
    ninstances: usize,
    bags: &BagPartition,
) -> Result<Vec<T>, MilRustError> {
    let nbags = bags.num_bags();
    let mut out = vec![T::zero(); nfeatures * nbags];
    for (bag, range) in bags.ranges().iter().enumerate() {
        let len_t = T::from_usize(range.len()).ok_or_else(|| {
            MilRustError::InternalError(
                "Failed to convert bag length to the tensor element type".to_string(),
            )
        })?;
        for f in 0..nfeatures {
            let mut acc = T::zero();
            for col in range.clone() {
                acc = acc + input[f * ninstances + col];
            }
            out[f * nbags + bag] = acc / len_t;
        }
    }
    Ok(out)
}

/// Per-bag maximum, reference semantics. Same contract as
/// [`segment_max`](crate::ops::segment::segment_max) but computed with a
/// direct per-bag loop and without autograd support.
pub fn segment_max_naive(input: &Tensor, bags: &BagPartition) -> Result<Tensor, MilRustError> {
    let guard = input.read_data();
    let (nfeatures, ninstances) = check_segment_args(&guard, bags, "segment_max_naive")?;
    let nbags = bags.num_bags();

    match guard.dtype {
        DType::F32 => {
            let buffer = guard.buffer().try_get_cpu_f32()?;
            let data = &buffer[guard.offset..guard.offset + guard.numel()];
            let values = naive_max_kernel(data, nfeatures, ninstances, bags);
            Tensor::new(values, vec![nfeatures, nbags])
        }
        DType::F64 => {
            let buffer = guard.buffer().try_get_cpu_f64()?;
            let data = &buffer[guard.offset..guard.offset + guard.numel()];
            let values = naive_max_kernel(data, nfeatures, ninstances, bags);
            Tensor::new_f64(values, vec![nfeatures, nbags])
        }
    }
}

/// Per-bag mean, reference semantics. Same contract as
/// [`segment_mean`](crate::ops::segment::segment_mean) but computed with a
/// direct per-bag loop and without autograd support.
pub fn segment_mean_naive(input: &Tensor, bags: &BagPartition) -> Result<Tensor, MilRustError> {
    let guard = input.read_data();
    let (nfeatures, ninstances) = check_segment_args(&guard, bags, "segment_mean_naive")?;
    let nbags = bags.num_bags();

    match guard.dtype {
        DType::F32 => {
            let buffer = guard.buffer().try_get_cpu_f32()?;
            let data = &buffer[guard.offset..guard.offset + guard.numel()];
            let values = naive_mean_kernel(data, nfeatures, ninstances, bags)?;
            Tensor::new(values, vec![nfeatures, nbags])
        }
        DType::F64 => {
            let buffer = guard.buffer().try_get_cpu_f64()?;
            let data = &buffer[guard.offset..guard.offset + guard.numel()];
            let values = naive_mean_kernel(data, nfeatures, ninstances, bags)?;
            Tensor::new_f64(values, vec![nfeatures, nbags])
        }
    }
}

#[cfg(test)]
#[path = "naive_test.rs"]
mod tests;
