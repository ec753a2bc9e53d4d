//! Segmented (ragged-batch) reductions over bags of instances.
//!
//! The instance tensor is a dense `[features, instances]` matrix whose columns
//! are grouped into contiguous, variable-length bags by a [`BagPartition`].
//! [`segment_max`] and [`segment_mean`] collapse each bag into one output
//! column using a round-based algorithm: round `r` applies one dense update to
//! every bag that still has an `r`-th column, so the ragged reduction becomes
//! `max_len` regular vector operations with no data-dependent trip counts in
//! the inner body.
//!
//! Both ops attach hand-derived `BackwardOp` nodes when their input requires
//! grad. [`segment_max_naive`] and [`segment_mean_naive`] are straightforward
//! per-bag loops kept as correctness oracles for the vectorized kernels.

pub mod max;
pub mod mean;
pub mod naive;
pub mod partition;

pub use max::segment_max;
pub use mean::segment_mean;
pub use naive::{segment_max_naive, segment_mean_naive};
pub use partition::BagPartition;

use crate::device::StorageDevice;
use crate::error::MilRustError;
use crate::tensor_data::TensorData;

/// Shared entry checks for the segmented reductions.
///
/// Validates device, rank (must be a `[features, instances]` matrix),
/// contiguity, and that every bag fits the instance axis. Returns
/// `(nfeatures, ninstances)`.
pub(crate) fn check_segment_args(
    data: &TensorData,
    bags: &partition::BagPartition,
    op_name: &str,
) -> Result<(usize, usize), MilRustError> {
    if data.device != StorageDevice::CPU {
        return Err(MilRustError::DeviceMismatch {
            expected: StorageDevice::CPU,
            actual: data.device,
            operation: op_name.to_string(),
        });
    }
    if data.shape.len() != 2 {
        return Err(MilRustError::DimensionMismatch {
            expected: 2,
            actual: data.shape.len(),
        });
    }
    if !data.is_contiguous() {
        return Err(MilRustError::UnsupportedOperation(format!(
            "{} requires a contiguous input tensor",
            op_name
        )));
    }
    let nfeatures = data.shape[0];
    let ninstances = data.shape[1];
    bags.check_instances(ninstances)?;
    Ok((nfeatures, ninstances))
}
