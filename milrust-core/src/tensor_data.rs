// src/tensor_data.rs
use std::sync::Arc;

use crate::autograd::BackwardOp;
use crate::buffer::{Buffer, CpuBuffer};
use crate::device::StorageDevice;
use crate::error::MilRustError;
use crate::tensor::utils::calculate_strides;
use crate::tensor::Tensor;
use crate::types::DType;

/// Internal storage and metadata for a `Tensor`.
///
/// Holds the data buffer, shape, strides, device, data type, and the autograd
/// bookkeeping. Always wrapped in `Arc<RwLock<TensorData>>` by the `Tensor`
/// struct so handles share ownership and mutate metadata through the lock.
#[derive(Debug)]
pub struct TensorData {
    /// The typed data buffer, shared via `Arc` so clones stay cheap.
    pub(crate) buffer: Arc<Buffer>,
    /// Device where the buffer resides.
    pub(crate) device: StorageDevice,
    /// Element type of the buffer.
    pub(crate) dtype: DType,

    /// The shape (dimensions) of the tensor.
    pub(crate) shape: Vec<usize>,
    /// Memory stride per dimension, in elements.
    pub(crate) strides: Vec<usize>,
    /// Offset of the first element within the buffer. Constructors always
    /// produce 0; the field exists so strided access stays uniform.
    pub(crate) offset: usize,

    /// Whether operations on this tensor are tracked for autograd.
    pub(crate) requires_grad: bool,
    /// Gradient accumulated into this tensor during `backward()`, if any.
    pub(crate) grad: Option<Tensor>,
    /// Backward node of the operation that produced this tensor. Leaf tensors
    /// have `None` here.
    pub(crate) grad_fn: Option<Arc<dyn BackwardOp + Send + Sync>>,
}

impl TensorData {
    /// Creates F32 tensor data on the CPU from a flat row-major vector.
    ///
    /// # Errors
    /// Returns `MilRustError::TensorCreationError` if `data_vec.len()` does not
    /// equal the number of elements implied by `shape`.
    pub fn new(data_vec: Vec<f32>, shape: Vec<usize>) -> Result<Self, MilRustError> {
        let numel: usize = shape.iter().product();
        let data_len = data_vec.len();
        if data_len != numel {
            return Err(MilRustError::TensorCreationError { data_len, shape });
        }

        let strides = calculate_strides(&shape);
        let buffer = Arc::new(Buffer::Cpu(CpuBuffer::F32(Arc::new(data_vec))));

        Ok(TensorData {
            buffer,
            device: StorageDevice::CPU,
            dtype: DType::F32,
            offset: 0,
            shape,
            strides,
            requires_grad: false,
            grad: None,
            grad_fn: None,
        })
    }

    /// Creates F64 tensor data on the CPU from a flat row-major vector.
    ///
    /// # Errors
    /// Returns `MilRustError::TensorCreationError` if data length mismatches
    /// the shape's element count.
    pub fn new_f64(data_vec: Vec<f64>, shape: Vec<usize>) -> Result<Self, MilRustError> {
        let numel: usize = shape.iter().product();
        let data_len = data_vec.len();
        if data_len != numel {
            return Err(MilRustError::TensorCreationError { data_len, shape });
        }

        let strides = calculate_strides(&shape);
        let buffer = Arc::new(Buffer::Cpu(CpuBuffer::F64(Arc::new(data_vec))));

        Ok(TensorData {
            buffer,
            device: StorageDevice::CPU,
            dtype: DType::F64,
            offset: 0,
            shape,
            strides,
            requires_grad: false,
            grad: None,
            grad_fn: None,
        })
    }

    /// Immutable access to the shared data buffer.
    pub fn buffer(&self) -> &Arc<Buffer> {
        &self.buffer
    }

    /// Number of elements in the tensor.
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    /// Linear offset into the underlying buffer for the given multi-dimensional
    /// indices. Panics if the index rank or any index is out of bounds; callers
    /// validate shapes before indexing.
    pub fn get_offset(&self, indices: &[usize]) -> usize {
        assert_eq!(
            indices.len(),
            self.shape.len(),
            "Number of indices ({}) does not match tensor rank ({}) for shape {:?}",
            indices.len(),
            self.shape.len(),
            self.shape
        );

        let mut relative_offset = 0;
        for i in 0..self.shape.len() {
            assert!(
                indices[i] < self.shape[i],
                "Index {} is out of bounds for dimension {} with size {} (shape: {:?})",
                indices[i],
                i,
                self.shape[i],
                self.shape
            );
            relative_offset += indices[i] * self.strides[i];
        }
        self.offset + relative_offset
    }

    /// Whether the elements are laid out in standard row-major order without
    /// gaps. Constructors only produce contiguous tensors, but op entry points
    /// still check so strided tensors added later fail loudly, not silently.
    pub fn is_contiguous(&self) -> bool {
        if self.shape.is_empty() {
            return true;
        }
        let mut current_stride = 1;
        for i in (0..self.shape.len()).rev() {
            let shape_i = self.shape[i];
            if shape_i == 0 {
                return true;
            }
            if shape_i != 1 {
                if self.strides[i] != current_stride {
                    return false;
                }
                current_stride *= shape_i;
            }
        }
        true
    }
}
