use crate::error::MilRustError;
use crate::ops::segment::{segment_max, segment_mean, BagPartition};
use crate::tensor::Tensor;
use std::fmt::Debug;

/// An instance-wise stage of a bag pipeline: maps a tensor to a tensor without
/// touching the bag structure. Used for the pre- and post-aggregation stages.
pub trait Transform: Debug + Send + Sync {
    fn transform(&self, input: &Tensor) -> Result<Tensor, MilRustError>;
}

/// The aggregation stage of a bag pipeline: collapses the instance axis of a
/// `[features, instances]` tensor into one column per bag.
pub trait Aggregation: Debug + Send + Sync {
    fn aggregate(&self, input: &Tensor, bags: &BagPartition) -> Result<Tensor, MilRustError>;
}

/// Pass-through transform, for pipelines that only aggregate.
#[derive(Debug, Default)]
pub struct Identity;

impl Transform for Identity {
    fn transform(&self, input: &Tensor) -> Result<Tensor, MilRustError> {
        Ok(input.clone())
    }
}

/// Binds [`segment_max`] as a pipeline aggregation stage.
#[derive(Debug, Default)]
pub struct SegmentMaxPool;

impl Aggregation for SegmentMaxPool {
    fn aggregate(&self, input: &Tensor, bags: &BagPartition) -> Result<Tensor, MilRustError> {
        segment_max(input, bags)
    }
}

/// Binds [`segment_mean`] as a pipeline aggregation stage.
#[derive(Debug, Default)]
pub struct SegmentMeanPool;

impl Aggregation for SegmentMeanPool {
    fn aggregate(&self, input: &Tensor, bags: &BagPartition) -> Result<Tensor, MilRustError> {
        segment_mean(input, bags)
    }
}

/// A three-stage bag pipeline: `premodel -> aggregation -> postmodel`.
///
/// The stages are capability-typed trait objects and the composition is a
/// fixed sequential call. The pipeline owns no parameters and attaches no
/// backward nodes of its own; gradients flow through whatever nodes the
/// stages themselves register.
#[derive(Debug)]
pub struct BagModel {
    premodel: Box<dyn Transform>,
    aggregation: Box<dyn Aggregation>,
    postmodel: Box<dyn Transform>,
}

impl BagModel {
    pub fn new(
        premodel: Box<dyn Transform>,
        aggregation: Box<dyn Aggregation>,
        postmodel: Box<dyn Transform>,
    ) -> Self {
        BagModel {
            premodel,
            aggregation,
            postmodel,
        }
    }

    /// A bare max-pooling pipeline with pass-through pre/post stages.
    pub fn max_pooling() -> Self {
        Self::new(Box::new(Identity), Box::new(SegmentMaxPool), Box::new(Identity))
    }

    /// A bare mean-pooling pipeline with pass-through pre/post stages.
    pub fn mean_pooling() -> Self {
        Self::new(Box::new(Identity), Box::new(SegmentMeanPool), Box::new(Identity))
    }

    /// Runs the three stages in order: the premodel sees the raw instance
    /// tensor, the aggregation stage sees `(premodel output, bags)`, and the
    /// postmodel sees the pooled `[features, bags]` tensor.
    pub fn forward(&self, input: &Tensor, bags: &BagPartition) -> Result<Tensor, MilRustError> {
        let pre = self.premodel.transform(input)?;
        let pooled = self.aggregation.aggregate(&pre, bags)?;
        self.postmodel.transform(&pooled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::testing::check_tensor_near;

    #[test]
    fn test_identity_passthrough() -> Result<(), MilRustError> {
        let t = Tensor::new(vec![1.0, 2.0], vec![1, 2])?;
        let out = Identity.transform(&t)?;
        assert_eq!(out.get_f32_data()?, t.get_f32_data()?);
        Ok(())
    }

    #[test]
    fn test_max_pooling_pipeline() -> Result<(), MilRustError> {
        let x = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![1, 4])?;
        let bags = BagPartition::new(vec![0..2, 2..4])?;
        let model = BagModel::max_pooling();
        let y = model.forward(&x, &bags)?;
        check_tensor_near(&y, &[1, 2], &[2.0, 4.0], 1e-6);
        Ok(())
    }

    #[test]
    fn test_mean_pooling_pipeline() -> Result<(), MilRustError> {
        let x = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![1, 4])?;
        let bags = BagPartition::new(vec![0..2, 2..4])?;
        let model = BagModel::mean_pooling();
        let y = model.forward(&x, &bags)?;
        check_tensor_near(&y, &[1, 2], &[1.5, 3.5], 1e-6);
        Ok(())
    }

    #[test]
    fn test_custom_stages_compose_in_order() -> Result<(), MilRustError> {
        #[derive(Debug)]
        struct Scale(f32);
        impl Transform for Scale {
            fn transform(&self, input: &Tensor) -> Result<Tensor, MilRustError> {
                let data: Vec<f32> =
                    input.get_f32_data()?.iter().map(|v| v * self.0).collect();
                Tensor::new(data, input.shape())
            }
        }

        let x = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![1, 4])?;
        let bags = BagPartition::new(vec![0..2, 2..4])?;
        let model = BagModel::new(
            Box::new(Scale(2.0)),
            Box::new(SegmentMeanPool),
            Box::new(Scale(10.0)),
        );
        // mean(2x) * 10 => [30, 70]
        let y = model.forward(&x, &bags)?;
        check_tensor_near(&y, &[1, 2], &[30.0, 70.0], 1e-5);
        Ok(())
    }
}
