// src/tensor/create.rs

use crate::error::MilRustError;
use crate::tensor::Tensor;
use crate::types::DType;
use rand::Rng;
use rand_distr::StandardNormal;

/// Creates a new F32 tensor filled with zeros.
pub fn zeros(shape: &[usize]) -> Result<Tensor, MilRustError> {
    let numel = shape.iter().product();
    let data_vec: Vec<f32> = vec![0.0; numel];
    Tensor::new(data_vec, shape.to_vec())
}

/// Creates a new F64 tensor filled with zeros.
pub fn zeros_f64(shape: &[usize]) -> Result<Tensor, MilRustError> {
    let numel = shape.iter().product();
    let data_vec: Vec<f64> = vec![0.0; numel];
    Tensor::new_f64(data_vec, shape.to_vec())
}

/// Creates a new F32 tensor filled with ones.
pub fn ones(shape: &[usize]) -> Result<Tensor, MilRustError> {
    let numel = shape.iter().product();
    let data_vec: Vec<f32> = vec![1.0; numel];
    Tensor::new(data_vec, shape.to_vec())
}

/// Creates a new F64 tensor filled with ones.
pub fn ones_f64(shape: &[usize]) -> Result<Tensor, MilRustError> {
    let numel = shape.iter().product();
    let data_vec: Vec<f64> = vec![1.0; numel];
    Tensor::new_f64(data_vec, shape.to_vec())
}

/// Creates a new F32 tensor filled with a specific value.
pub fn full(shape: &[usize], value: f32) -> Result<Tensor, MilRustError> {
    let numel = shape.iter().product();
    let data_vec: Vec<f32> = vec![value; numel];
    Tensor::new(data_vec, shape.to_vec())
}

/// Creates a new F64 tensor filled with a specific value.
pub fn full_f64(shape: &[usize], value: f64) -> Result<Tensor, MilRustError> {
    let numel = shape.iter().product();
    let data_vec: Vec<f64> = vec![value; numel];
    Tensor::new_f64(data_vec, shape.to_vec())
}

/// Creates a new F32 CPU tensor from a `Vec<f32>` and shape.
pub fn from_vec_f32(data_vec: Vec<f32>, shape: Vec<usize>) -> Result<Tensor, MilRustError> {
    Tensor::new(data_vec, shape)
}

/// Creates a new F64 CPU tensor from a `Vec<f64>` and shape.
pub fn from_vec_f64(data_vec: Vec<f64>, shape: Vec<usize>) -> Result<Tensor, MilRustError> {
    Tensor::new_f64(data_vec, shape)
}

/// Creates a tensor of zeros with the same shape and dtype as `tensor`.
pub fn zeros_like(tensor: &Tensor) -> Result<Tensor, MilRustError> {
    let shape = tensor.shape();
    let numel = shape.iter().product();
    match tensor.dtype() {
        DType::F32 => Tensor::new(vec![0.0f32; numel], shape),
        DType::F64 => Tensor::new_f64(vec![0.0f64; numel], shape),
    }
}

/// Creates a tensor of ones with the same shape and dtype as `tensor`.
pub fn ones_like(tensor: &Tensor) -> Result<Tensor, MilRustError> {
    let shape = tensor.shape();
    let numel = shape.iter().product();
    match tensor.dtype() {
        DType::F32 => Tensor::new(vec![1.0f32; numel], shape),
        DType::F64 => Tensor::new_f64(vec![1.0f64; numel], shape),
    }
}

/// Creates a new F32 tensor with elements drawn from the standard normal
/// distribution.
pub fn randn(shape: &[usize]) -> Result<Tensor, MilRustError> {
    let numel: usize = shape.iter().product();
    let mut rng = rand::thread_rng();
    let data_vec: Vec<f32> = (0..numel)
        .map(|_| rng.sample::<f32, _>(StandardNormal))
        .collect();
    Tensor::new(data_vec, shape.to_vec())
}

/// Creates a new F64 tensor with elements drawn from the standard normal
/// distribution.
pub fn randn_f64(shape: &[usize]) -> Result<Tensor, MilRustError> {
    let numel: usize = shape.iter().product();
    let mut rng = rand::thread_rng();
    let data_vec: Vec<f64> = (0..numel)
        .map(|_| rng.sample::<f64, _>(StandardNormal))
        .collect();
    Tensor::new_f64(data_vec, shape.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DType;

    #[test]
    fn test_zeros_and_ones() -> Result<(), MilRustError> {
        let z = zeros(&[2, 3])?;
        assert_eq!(z.shape(), vec![2, 3]);
        assert_eq!(z.get_f32_data()?, vec![0.0; 6]);

        let o = ones_f64(&[4])?;
        assert_eq!(o.dtype(), DType::F64);
        assert_eq!(o.get_f64_data()?, vec![1.0; 4]);
        Ok(())
    }

    #[test]
    fn test_full_and_like() -> Result<(), MilRustError> {
        let t = full(&[2, 2], 7.5)?;
        assert_eq!(t.get_f32_data()?, vec![7.5; 4]);

        let z = zeros_like(&t)?;
        assert_eq!(z.shape(), t.shape());
        assert_eq!(z.dtype(), DType::F32);

        let t64 = full_f64(&[3], -1.0)?;
        let o = ones_like(&t64)?;
        assert_eq!(o.dtype(), DType::F64);
        assert_eq!(o.get_f64_data()?, vec![1.0; 3]);
        Ok(())
    }

    #[test]
    fn test_creation_shape_mismatch() {
        let result = Tensor::new(vec![1.0, 2.0, 3.0], vec![2, 2]);
        assert!(matches!(
            result,
            Err(MilRustError::TensorCreationError { data_len: 3, .. })
        ));
    }

    #[test]
    fn test_randn_shape() -> Result<(), MilRustError> {
        let t = randn(&[3, 5])?;
        assert_eq!(t.shape(), vec![3, 5]);
        assert_eq!(t.numel(), 15);
        Ok(())
    }
}
