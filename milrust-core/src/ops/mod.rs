//! # Tensor Operations Module (`ops`)
//!
//! Operations follow one pattern: a forward function validates its inputs,
//! dispatches a dtype-generic kernel, and, when an input requires grad,
//! attaches a `Backward` struct implementing
//! [`BackwardOp`](crate::autograd::BackwardOp) to the output tensor. The
//! backward struct captures whatever forward context the gradient needs
//! (and nothing more).
//!
//! This crate's operation surface is the segmented reductions in [`segment`].

pub mod segment;
