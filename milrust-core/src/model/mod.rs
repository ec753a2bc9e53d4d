//! Model composition: the three-stage bag pipeline.

pub mod pipeline;

pub use pipeline::{Aggregation, BagModel, Identity, SegmentMaxPool, SegmentMeanPool, Transform};
