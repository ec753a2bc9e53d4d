//! # milrust-core
//!
//! Segmented (ragged-batch) max/mean pooling over bags of instances
//! (Multiple-Instance-Learning style aggregation), with hand-derived
//! gradients registered as custom autograd nodes.
//!
//! The instance tensor is a dense `[features, instances]` matrix; a
//! [`BagPartition`] groups its columns into contiguous variable-length bags;
//! [`segment_max`] / [`segment_mean`] collapse each bag into one output column
//! and participate in `backward()` like any other differentiable operation.

pub mod autograd;
pub mod buffer;
pub mod device;
pub mod error;
pub mod model;
pub mod ops;
pub mod tensor;
pub mod tensor_data;
pub mod types;
pub mod utils;

pub use error::MilRustError;
pub use tensor::Tensor;

pub use ops::segment::{
    segment_max, segment_max_naive, segment_mean, segment_mean_naive, BagPartition,
};

pub use device::StorageDevice;
pub use types::DType;

// Re-export traits required by public generic surfaces.
pub use num_traits;
