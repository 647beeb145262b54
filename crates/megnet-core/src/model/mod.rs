//! # MEGNet Model
//!
//! Assembles the [`nn`](crate::nn) layers into the full network.
//!
//! - [`config`] - Construction arguments and their builder
//! - [`megnet`] - The network, its forward pass and weight dictionaries
//! - [`predictor`] - Property prediction straight from a converted graph
//! - [`error`] - Errors raised while building or evaluating a model

pub mod config;
pub mod error;
pub mod megnet;
pub mod predictor;
