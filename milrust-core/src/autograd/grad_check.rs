use crate::device::StorageDevice;
use crate::error::MilRustError;
use crate::tensor::Tensor;
use crate::types::DType;
use thiserror::Error;

/// Error type specifically for gradient-checking failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GradCheckError {
    #[error("Gradient check failed for input tensor at index {input_index}, element index {element_index}: Analytical grad {analytical_grad:?} != Numerical grad {numerical_grad:?}. Difference: {difference:?}")]
    GradientMismatch {
        input_index: usize,
        element_index: usize,
        analytical_grad: f64,
        numerical_grad: f64,
        difference: f64,
    },

    #[error("Forward function execution failed during gradient check: {0}")]
    ForwardPassError(MilRustError),

    #[error("Backward pass execution failed during gradient check: {0}")]
    BackwardPassError(MilRustError),

    #[error("Tensor error during intermediate calculation: {0}")]
    TensorError(MilRustError),

    #[error("Unsupported data type for gradient check: expected F32, got {0:?}")]
    UnsupportedDType(DType),

    #[error("Gradient checking only supported on CPU tensors (Input {input_index}). Got: {device:?}")]
    NonCpuInput {
        input_index: usize,
        device: StorageDevice,
    },

    #[error("Gradient check input tensor must be a leaf node (no grad_fn). Input index: {input_index}")]
    InputNotLeaf { input_index: usize },

    #[error("Input tensor {input_index} requires grad but has no gradient after backward pass.")]
    MissingAnalyticalGrad { input_index: usize },

    #[error("Numerical gradient is NaN or infinite for input {input_index}, element {element_index}. Details: Loss+: {loss_plus:?}, Loss-: {loss_minus:?}")]
    NumericalGradNaNOrInfinite {
        input_index: usize,
        element_index: usize,
        loss_plus: f64,
        loss_minus: f64,
    },

    #[error("Analytical gradient is NaN or infinite for input {input_index}, element {element_index}. Value: {value:?}")]
    AnalyticalGradNaNOrInfinite {
        input_index: usize,
        element_index: usize,
        value: f64,
    },

    #[error("Function did not propagate requires_grad correctly.")]
    RequiresGradPropagationError,
}

impl From<MilRustError> for GradCheckError {
    fn from(err: MilRustError) -> Self {
        GradCheckError::TensorError(err)
    }
}

/// Checks analytical gradients against central finite differences.
///
/// `func` is evaluated at perturbed copies of each input element; the scalar
/// loss is the contraction `sum(output * output_grad)`, so the numerical
/// quotient approximates exactly the gradient that `backward(output_grad)`
/// computes analytically.
///
/// Inputs must be F32 CPU leaf tensors. The comparison passes when either the
/// absolute or the relative difference stays within `tolerance`.
pub fn check_grad<F>(
    func: F,
    inputs: &[Tensor],
    output_grad: &Tensor,
    epsilon: f64,
    tolerance: f64,
) -> Result<(), GradCheckError>
where
    F: Fn(&[Tensor]) -> Result<Tensor, MilRustError>,
{
    // --- Initial checks ---
    for (i, input) in inputs.iter().enumerate() {
        let dtype = input.dtype();
        let device = input.device();
        if dtype != DType::F32 {
            return Err(GradCheckError::UnsupportedDType(dtype));
        }
        if device != StorageDevice::CPU {
            return Err(GradCheckError::NonCpuInput {
                input_index: i,
                device,
            });
        }
        if input.requires_grad() && input.grad_fn().is_some() {
            return Err(GradCheckError::InputNotLeaf { input_index: i });
        }
    }
    let output_grad_dtype = output_grad.dtype();
    if output_grad_dtype != DType::F32 {
        return Err(GradCheckError::UnsupportedDType(output_grad_dtype));
    }

    // --- 1. Forward and backward at the unperturbed point ---
    for input in inputs.iter() {
        if input.requires_grad() {
            input.zero_grad();
        }
    }

    let output = func(inputs).map_err(GradCheckError::ForwardPassError)?;

    let any_input_requires_grad = inputs.iter().any(|t| t.requires_grad());
    if any_input_requires_grad && !output.requires_grad() {
        return Err(GradCheckError::RequiresGradPropagationError);
    }

    if output.requires_grad() {
        output
            .backward(Some(output_grad.clone()))
            .map_err(GradCheckError::BackwardPassError)?;
    }

    let analytical_grads_opt: Vec<Option<Tensor>> = inputs.iter().map(|t| t.grad()).collect();

    // --- 2. Per input, per element: central difference of the scalar loss ---
    for (i, original_input) in inputs.iter().enumerate() {
        if !original_input.requires_grad() {
            continue;
        }

        let analytical_grad_tensor = match analytical_grads_opt[i].as_ref() {
            Some(grad) => grad,
            None => return Err(GradCheckError::MissingAnalyticalGrad { input_index: i }),
        };
        let analytical_grad_data: Vec<f64> = analytical_grad_tensor
            .get_f32_data()?
            .iter()
            .map(|&x| x as f64)
            .collect();

        let original_data_f64: Vec<f64> = original_input
            .get_f32_data()?
            .iter()
            .map(|&x| x as f64)
            .collect();
        let input_shape = original_input.shape();

        for elem_idx in 0..original_input.numel() {
            let loss_plus = loss_at_perturbation(
                &func,
                inputs,
                i,
                &original_data_f64,
                &input_shape,
                elem_idx,
                epsilon,
                output_grad,
            )?;
            let loss_minus = loss_at_perturbation(
                &func,
                inputs,
                i,
                &original_data_f64,
                &input_shape,
                elem_idx,
                -epsilon,
                output_grad,
            )?;

            let numerical_grad = (loss_plus - loss_minus) / (2.0 * epsilon);
            let analytical_grad = analytical_grad_data[elem_idx];

            if numerical_grad.is_nan() || numerical_grad.is_infinite() {
                return Err(GradCheckError::NumericalGradNaNOrInfinite {
                    input_index: i,
                    element_index: elem_idx,
                    loss_plus,
                    loss_minus,
                });
            }
            if analytical_grad.is_nan() || analytical_grad.is_infinite() {
                return Err(GradCheckError::AnalyticalGradNaNOrInfinite {
                    input_index: i,
                    element_index: elem_idx,
                    value: analytical_grad,
                });
            }

            let difference = (analytical_grad - numerical_grad).abs();
            if difference > tolerance
                && (difference / (analytical_grad.abs() + epsilon)) > tolerance
            {
                return Err(GradCheckError::GradientMismatch {
                    input_index: i,
                    element_index: elem_idx,
                    analytical_grad,
                    numerical_grad,
                    difference,
                });
            }
        }
    }

    Ok(())
}

/// Evaluates `func` with input `i`'s element `elem_idx` shifted by `delta` and
/// returns the scalar loss `sum(output * output_grad)`.
#[allow(clippy::too_many_arguments)]
fn loss_at_perturbation<F>(
    func: &F,
    inputs: &[Tensor],
    i: usize,
    original_data_f64: &[f64],
    input_shape: &[usize],
    elem_idx: usize,
    delta: f64,
    output_grad: &Tensor,
) -> Result<f64, GradCheckError>
where
    F: Fn(&[Tensor]) -> Result<Tensor, MilRustError>,
{
    let mut perturbed_data = original_data_f64.to_vec();
    perturbed_data[elem_idx] += delta;
    let perturbed_f32: Vec<f32> = perturbed_data.iter().map(|&x| x as f32).collect();
    let perturbed_tensor = Tensor::new(perturbed_f32, input_shape.to_vec())?;

    let mut perturbed_inputs: Vec<Tensor> = inputs.to_vec();
    perturbed_inputs[i] = perturbed_tensor;

    let output = func(&perturbed_inputs).map_err(GradCheckError::ForwardPassError)?;
    weighted_loss(&output, output_grad)
}

/// Scalar loss for gradient checking: the sum of the output tensor weighted
/// element-wise by the provided output gradient.
fn weighted_loss(output: &Tensor, output_grad: &Tensor) -> Result<f64, GradCheckError> {
    if output.shape() != output_grad.shape() {
        return Err(GradCheckError::TensorError(MilRustError::ShapeMismatch {
            expected: output.shape(),
            actual: output_grad.shape(),
            operation: "weighted_loss (grad_check)".to_string(),
        }));
    }
    let out_data = output.get_f32_data()?;
    let weight_data = output_grad.get_f32_data()?;
    Ok(out_data
        .iter()
        .zip(weight_data.iter())
        .map(|(&o, &w)| o as f64 * w as f64)
        .sum())
}
