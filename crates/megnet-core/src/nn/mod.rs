//! # Neural Network Layers
//!
//! The layers MEGNet is built from, operating on row-major feature matrices
//! (`nalgebra::DMatrix<f64>`, one row per node, edge or graph). Only inference is
//! supported; dropout is the identity.
//!
//! - [`activation`] - Supported activation functions
//! - [`linear`], [`mlp`], [`embedding`], [`dropout`] - Dense building blocks
//! - [`lstm`], [`set2set`] - Order-invariant pooling of node and edge sets
//! - [`conv`], [`block`] - The MEGNet graph convolution and the residual block around it
//! - [`params`] - Named parameters, weight dictionaries and initialization
//! - [`ops`] - Gather/scatter and concatenation helpers

pub mod activation;
pub mod block;
pub mod conv;
pub mod dropout;
pub mod embedding;
pub mod error;
pub mod linear;
pub mod lstm;
pub mod mlp;
pub mod ops;
pub mod params;
pub mod set2set;
