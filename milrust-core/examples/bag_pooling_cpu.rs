//! # Segmented Pooling on CPU
//!
//! Demonstrates the core surface of `milrust-core`:
//! 1. **Building a bag partition** over the instance axis of a
//!    `[features, instances]` tensor.
//! 2. **Max and mean pooling** through the three-stage `BagModel` pipeline.
//! 3. **Backpropagation** through the pooling operation: the max gradient
//!    lands only on the winning instances, the mean gradient spreads uniformly
//!    over each bag.
//!
//! Run with: `cargo run --example bag_pooling_cpu`

use milrust_core::model::BagModel;
use milrust_core::tensor::create::randn;
use milrust_core::{segment_max_naive, BagPartition, MilRustError, Tensor};

fn print_matrix(label: &str, tensor: &Tensor) -> Result<(), MilRustError> {
    let shape = tensor.shape();
    let data = tensor.get_f32_data()?;
    println!("{} (shape {:?}):", label, shape);
    for row in data.chunks(shape[1]) {
        let cells: Vec<String> = row.iter().map(|v| format!("{:7.3}", v)).collect();
        println!("  [{}]", cells.join(", "));
    }
    Ok(())
}

fn main() -> Result<(), MilRustError> {
    // 4 features, 10 instances, split into bags of lengths 3, 2, 5.
    let bags = BagPartition::from_lengths(&[3, 2, 5])?;
    let x = randn(&[4, 10])?;
    x.requires_grad_(true)?;

    print_matrix("instances X", &x)?;
    println!(
        "bags: {:?} (lengths {:?}, {} pooling rounds)\n",
        bags.ranges(),
        bags.lengths(),
        bags.max_len()
    );

    // --- Max pooling ---
    let max_model = BagModel::max_pooling();
    let y_max = max_model.forward(&x, &bags)?;
    print_matrix("segment_max(X)", &y_max)?;

    // Cross-check against the per-bag reference loop.
    let y_ref = segment_max_naive(&x, &bags)?;
    let diff: f32 = y_max
        .get_f32_data()?
        .iter()
        .zip(y_ref.get_f32_data()?.iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f32::max);
    println!("max abs difference vs naive oracle: {:e}\n", diff);

    // Backward: each (feature, bag) cell routes its gradient to the single
    // winning instance column.
    let seed = Tensor::new(vec![1.0; 4 * 3], vec![4, 3])?;
    y_max.backward(Some(seed))?;
    print_matrix("d(sum segment_max)/dX", &x.grad().expect("grad"))?;

    // --- Mean pooling ---
    x.zero_grad();
    let mean_model = BagModel::mean_pooling();
    let y_mean = mean_model.forward(&x, &bags)?;
    println!();
    print_matrix("segment_mean(X)", &y_mean)?;

    // Backward: each instance receives 1/len(bag) of its bag's gradient.
    let seed = Tensor::new(vec![1.0; 4 * 3], vec![4, 3])?;
    y_mean.backward(Some(seed))?;
    print_matrix("d(sum segment_mean)/dX", &x.grad().expect("grad"))?;

    Ok(())
}
