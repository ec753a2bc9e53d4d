//! End-to-end tests of the segmented pooling surface: forward equivalence with
//! the naive oracles, gradient flow through `backward()`, and the three-stage
//! bag pipeline.

use approx::assert_relative_eq;
use milrust_core::model::{BagModel, Identity, SegmentMaxPool, Transform};
use milrust_core::tensor::create::{randn, randn_f64};
use milrust_core::utils::testing::check_tensor_near;
use milrust_core::{
    segment_max, segment_max_naive, segment_mean, segment_mean_naive, BagPartition, MilRustError,
    Tensor,
};

#[test]
fn vectorized_ops_match_naive_oracles() -> Result<(), MilRustError> {
    let bags = BagPartition::from_lengths(&[3, 5, 2, 6, 4])?;

    let x32 = randn(&[8, 20])?;
    let max_fast = segment_max(&x32, &bags)?.get_f32_data()?;
    let max_slow = segment_max_naive(&x32, &bags)?.get_f32_data()?;
    for (a, b) in max_fast.iter().zip(max_slow.iter()) {
        assert_relative_eq!(a, b, epsilon = 1e-6);
    }
    let mean_fast = segment_mean(&x32, &bags)?.get_f32_data()?;
    let mean_slow = segment_mean_naive(&x32, &bags)?.get_f32_data()?;
    for (a, b) in mean_fast.iter().zip(mean_slow.iter()) {
        assert_relative_eq!(a, b, epsilon = 1e-5);
    }

    let x64 = randn_f64(&[8, 20])?;
    let max_fast = segment_max(&x64, &bags)?.get_f64_data()?;
    let max_slow = segment_max_naive(&x64, &bags)?.get_f64_data()?;
    for (a, b) in max_fast.iter().zip(max_slow.iter()) {
        assert_relative_eq!(a, b, epsilon = 1e-12);
    }
    Ok(())
}

#[test]
fn literal_examples_from_both_reductions() -> Result<(), MilRustError> {
    let x = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![1, 4])?;
    let bags = BagPartition::new(vec![0..2, 2..4])?;

    let y_max = segment_max(&x, &bags)?;
    check_tensor_near(&y_max, &[1, 2], &[2.0, 4.0], 1e-6);

    let y_mean = segment_mean(&x, &bags)?;
    check_tensor_near(&y_mean, &[1, 2], &[1.5, 3.5], 1e-6);
    Ok(())
}

#[test]
fn mean_pipeline_gradients_scale_by_bag_length() -> Result<(), MilRustError> {
    let lengths = [3usize, 5, 2, 6, 4];
    let bags = BagPartition::from_lengths(&lengths)?;
    let x = randn(&[8, 20])?;
    x.requires_grad_(true)?;

    let model = BagModel::mean_pooling();
    let y = model.forward(&x, &bags)?;
    assert_eq!(y.shape(), vec![8, 5]);
    assert!(y.requires_grad());

    let seed = Tensor::new(vec![1.0; 8 * 5], vec![8, 5])?;
    y.backward(Some(seed))?;

    let grad = x.grad().expect("input grad should exist");
    assert_eq!(grad.shape(), vec![8, 20]);

    // With an all-ones seed, every column's gradient is 1/len of its bag.
    let grad_data = grad.get_f32_data()?;
    for (bag, range) in bags.ranges().iter().enumerate() {
        let expected = 1.0 / lengths[bag] as f32;
        for col in range.clone() {
            for f in 0..8 {
                assert_relative_eq!(grad_data[f * 20 + col], expected, epsilon = 1e-6);
            }
        }
    }
    Ok(())
}

#[test]
fn max_pipeline_scatters_gradient_to_winners() -> Result<(), MilRustError> {
    let x = Tensor::new(vec![1.0, 3.0, 2.0, 0.0, 5.0, 4.0], vec![1, 6])?;
    x.requires_grad_(true)?;
    let bags = BagPartition::from_lengths(&[3, 3])?;

    let model = BagModel::new(
        Box::new(Identity),
        Box::new(SegmentMaxPool),
        Box::new(Identity),
    );
    let y = model.forward(&x, &bags)?;
    check_tensor_near(&y, &[1, 2], &[3.0, 5.0], 1e-6);

    y.backward(Some(Tensor::new(vec![1.0, 1.0], vec![1, 2])?))?;
    let grad = x.grad().expect("input grad should exist");
    check_tensor_near(&grad, &[1, 6], &[0.0, 1.0, 0.0, 0.0, 1.0, 0.0], 1e-6);
    Ok(())
}

#[test]
fn tie_break_lands_on_earliest_instance() -> Result<(), MilRustError> {
    let x = Tensor::new(vec![2.0, 7.0, 7.0, 7.0], vec![1, 4])?;
    x.requires_grad_(true)?;
    let bags = BagPartition::new(vec![0..4])?;

    let y = segment_max(&x, &bags)?;
    y.backward(Some(Tensor::new(vec![1.0], vec![1, 1])?))?;

    let grad = x.grad().expect("input grad should exist");
    check_tensor_near(&grad, &[1, 4], &[0.0, 1.0, 0.0, 0.0], 1e-6);
    Ok(())
}

#[test]
fn malformed_partitions_are_rejected_before_numeric_work() {
    assert!(matches!(
        BagPartition::new(vec![0..0]),
        Err(MilRustError::EmptyBag { bag_index: 0 })
    ));
    assert!(matches!(
        BagPartition::new(vec![0..3, 1..4]),
        Err(MilRustError::UnorderedBags { .. })
    ));
}

#[test]
fn custom_transform_stages_compose_with_pooling() -> Result<(), MilRustError> {
    #[derive(Debug)]
    struct Shift(f32);
    impl Transform for Shift {
        fn transform(&self, input: &Tensor) -> Result<Tensor, MilRustError> {
            let data: Vec<f32> = input.get_f32_data()?.iter().map(|v| v + self.0).collect();
            Tensor::new(data, input.shape())
        }
    }

    let x = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![1, 4])?;
    let bags = BagPartition::new(vec![0..2, 2..4])?;
    let model = BagModel::new(
        Box::new(Shift(10.0)),
        Box::new(SegmentMaxPool),
        Box::new(Shift(-10.0)),
    );
    let y = model.forward(&x, &bags)?;
    check_tensor_near(&y, &[1, 2], &[2.0, 4.0], 1e-5);
    Ok(())
}
