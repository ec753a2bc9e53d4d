/// Element types a tensor buffer can hold.
///
/// The segmented reductions are defined for floating-point data only, so the
/// enum is restricted to the two float widths the kernels dispatch over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// 32-bit floating point.
    F32,
    /// 64-bit floating point.
    F64,
}
