use crate::device::StorageDevice;
use thiserror::Error;

/// Crate-wide error type.
#[derive(Error, Debug, PartialEq, Clone)] // PartialEq/Clone for easier testing
pub enum MilRustError {
    #[error("Shape mismatch: expected {expected:?}, got {actual:?} during operation {operation}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
        operation: String,
    },

    #[error("Rank mismatch: expected a tensor of rank {expected}, got rank {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Tensor creation error: data length {data_len} does not match shape {shape:?}")]
    TensorCreationError { data_len: usize, shape: Vec<usize> },

    #[error("Bag {bag_index} is empty: every bag must cover at least one instance")]
    EmptyBag { bag_index: usize },

    #[error("Bag {bag_index} ({start}..{end}) overlaps or precedes the previous bag (which ends at {prev_end})")]
    UnorderedBags {
        bag_index: usize,
        start: usize,
        end: usize,
        prev_end: usize,
    },

    #[error("Bag {bag_index} ends at column {end}, but the instance axis only has {ninstances} columns")]
    BagOutOfBounds {
        bag_index: usize,
        end: usize,
        ninstances: usize,
    },

    #[error("Operation requires tensor to require grad, but it doesn't.")]
    RequiresGradNotMet,

    #[error("Cannot set requires_grad on a non-leaf tensor; detach() it first.")]
    RequiresGradOnNonLeaf,

    #[error("Backward called on non-scalar tensor without explicit gradient.")]
    BackwardNonScalar,

    #[error("Shape mismatch during gradient accumulation: expected {expected:?}, got {actual:?}")]
    GradientAccumulationShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Device mismatch for operation '{operation}': expected {expected:?}, got {actual:?}")]
    DeviceMismatch {
        expected: StorageDevice,
        actual: StorageDevice,
        operation: String,
    },

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Cycle detected in the computation graph during backward pass.")]
    CycleDetected,
}
