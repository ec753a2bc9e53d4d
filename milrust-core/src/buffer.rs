use std::sync::Arc;

use crate::device::StorageDevice;
use crate::error::MilRustError;

/// Typed storage behind a tensor.
///
/// A level of indirection between `TensorData` and the raw element vector, so
/// metadata stays untyped while the payload keeps its concrete element type.
#[derive(Debug, Clone)]
pub enum Buffer {
    /// Data resides in main memory.
    Cpu(CpuBuffer),
}

/// CPU payload variants, one per supported `DType`.
#[derive(Debug, Clone)]
pub enum CpuBuffer {
    F32(Arc<Vec<f32>>),
    F64(Arc<Vec<f64>>),
}

impl Buffer {
    /// Returns the underlying `Arc<Vec<f32>>`, or an error if the buffer holds
    /// a different element type.
    pub fn try_get_cpu_f32(&self) -> Result<&Arc<Vec<f32>>, MilRustError> {
        match self {
            Buffer::Cpu(CpuBuffer::F32(data_arc)) => Ok(data_arc),
            Buffer::Cpu(_) => Err(MilRustError::UnsupportedOperation(
                "Buffer is CPU but not F32 type".to_string(),
            )),
        }
    }

    /// Returns the underlying `Arc<Vec<f64>>`, or an error if the buffer holds
    /// a different element type.
    pub fn try_get_cpu_f64(&self) -> Result<&Arc<Vec<f64>>, MilRustError> {
        match self {
            Buffer::Cpu(CpuBuffer::F64(data_arc)) => Ok(data_arc),
            Buffer::Cpu(_) => Err(MilRustError::UnsupportedOperation(
                "Buffer is CPU but not F64 type".to_string(),
            )),
        }
    }

    /// Number of elements in the buffer.
    pub fn len(&self) -> usize {
        match self {
            Buffer::Cpu(CpuBuffer::F32(data)) => data.len(),
            Buffer::Cpu(CpuBuffer::F64(data)) => data.len(),
        }
    }

    /// Whether the buffer holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Device this buffer resides on.
    pub fn device(&self) -> StorageDevice {
        match self {
            Buffer::Cpu(_) => StorageDevice::CPU,
        }
    }
}
