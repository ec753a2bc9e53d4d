use std::fmt::Debug;

/// Physical location of a tensor's storage.
///
/// Every `TensorData` records where its buffer lives so that operations can
/// refuse mixed-device inputs early instead of failing deep inside a kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Default)]
pub enum StorageDevice {
    /// Main system memory. The only device tensors can currently be created on.
    #[default]
    CPU,
    /// CUDA device memory. Declared ahead of an actual GPU backend (see the
    /// `gpu` crate feature); no constructor produces it today.
    GPU,
}
