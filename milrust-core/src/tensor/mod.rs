// src/tensor/mod.rs

use crate::device::StorageDevice;
use crate::error::MilRustError;
use crate::tensor_data::TensorData;
use crate::types::DType;
use std::sync::{Arc, RwLock};

mod autograd;
pub mod create;
pub(crate) mod utils;

// Re-export creation functions so `tensor::zeros(...)` etc. work directly.
pub use create::{full, full_f64, ones, ones_f64, ones_like, zeros, zeros_f64, zeros_like};

/// A multi-dimensional array handle.
///
/// `Tensor` wraps `Arc<RwLock<TensorData>>`:
/// 1. **Shared ownership**: clones are cheap and point at the same storage.
/// 2. **Interior mutability**: autograd metadata (`requires_grad`, `grad`,
///    `grad_fn`) can be updated through an immutable handle, guarded by the
///    `RwLock`.
///
/// The element type (`DType`) and device live inside `TensorData`; the handle
/// itself is untyped.
pub struct Tensor {
    pub(crate) data: Arc<RwLock<TensorData>>,
}

impl Tensor {
    /// Creates a new F32 CPU tensor from a flat row-major vector and a shape.
    pub fn new(data_vec: Vec<f32>, shape: Vec<usize>) -> Result<Self, MilRustError> {
        let tensor_data = TensorData::new(data_vec, shape)?;
        Ok(Tensor {
            data: Arc::new(RwLock::new(tensor_data)),
        })
    }

    /// Creates a new F64 CPU tensor from a flat row-major vector and a shape.
    pub fn new_f64(data_vec: Vec<f64>, shape: Vec<usize>) -> Result<Self, MilRustError> {
        let tensor_data = TensorData::new_f64(data_vec, shape)?;
        Ok(Tensor {
            data: Arc::new(RwLock::new(tensor_data)),
        })
    }

    /// Element type of the tensor.
    pub fn dtype(&self) -> DType {
        self.read_data().dtype
    }

    /// Device the tensor's data resides on.
    pub fn device(&self) -> StorageDevice {
        self.read_data().device
    }

    /// A clone of the tensor's shape.
    pub fn shape(&self) -> Vec<usize> {
        self.read_data().shape.clone()
    }

    /// A clone of the tensor's strides.
    pub fn strides(&self) -> Vec<usize> {
        self.read_data().strides.clone()
    }

    /// Number of elements.
    pub fn numel(&self) -> usize {
        self.read_data().numel()
    }

    /// Whether the tensor is contiguous in memory.
    pub fn is_contiguous(&self) -> bool {
        self.read_data().is_contiguous()
    }

    /// Acquires a read lock on the tensor's data.
    ///
    /// Panics if the `RwLock` is poisoned.
    pub fn read_data(&self) -> std::sync::RwLockReadGuard<'_, TensorData> {
        self.data.read().expect("RwLock poisoned")
    }

    /// Acquires a write lock on the tensor's data.
    ///
    /// Panics if the `RwLock` is poisoned.
    pub fn write_data(&self) -> std::sync::RwLockWriteGuard<'_, TensorData> {
        self.data.write().expect("RwLock poisoned")
    }

    /// Copies the tensor's elements into a `Vec<f32>`.
    ///
    /// Requires an F32 CPU contiguous tensor.
    pub fn get_f32_data(&self) -> Result<Vec<f32>, MilRustError> {
        let guard = self.read_data();
        if guard.device != StorageDevice::CPU {
            return Err(MilRustError::DeviceMismatch {
                expected: StorageDevice::CPU,
                actual: guard.device,
                operation: "get_f32_data".to_string(),
            });
        }
        if guard.dtype != DType::F32 {
            return Err(MilRustError::UnsupportedOperation(format!(
                "get_f32_data requires DType::F32, got {:?}",
                guard.dtype
            )));
        }
        if !guard.is_contiguous() {
            return Err(MilRustError::UnsupportedOperation(
                "get_f32_data on non-contiguous tensor not implemented.".to_string(),
            ));
        }
        let buffer_arc = guard.buffer().try_get_cpu_f32()?;
        let start = guard.offset;
        let end = start + guard.numel();
        Ok(buffer_arc[start..end].to_vec())
    }

    /// Copies the tensor's elements into a `Vec<f64>`.
    ///
    /// Requires an F64 CPU contiguous tensor.
    pub fn get_f64_data(&self) -> Result<Vec<f64>, MilRustError> {
        let guard = self.read_data();
        if guard.device != StorageDevice::CPU {
            return Err(MilRustError::DeviceMismatch {
                expected: StorageDevice::CPU,
                actual: guard.device,
                operation: "get_f64_data".to_string(),
            });
        }
        if guard.dtype != DType::F64 {
            return Err(MilRustError::UnsupportedOperation(format!(
                "get_f64_data requires DType::F64, got {:?}",
                guard.dtype
            )));
        }
        if !guard.is_contiguous() {
            return Err(MilRustError::UnsupportedOperation(
                "get_f64_data on non-contiguous tensor not implemented.".to_string(),
            ));
        }
        let buffer_arc = guard.buffer().try_get_cpu_f64()?;
        let start = guard.offset;
        let end = start + guard.numel();
        Ok(buffer_arc[start..end].to_vec())
    }
}

impl std::fmt::Debug for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = self.read_data();
        f.debug_struct("Tensor")
            .field("shape", &guard.shape)
            .field("dtype", &guard.dtype)
            .field("device", &guard.device)
            .field("requires_grad", &guard.requires_grad)
            .field("grad_fn", &guard.grad_fn.as_ref().map(|_| "..."))
            .finish()
    }
}
