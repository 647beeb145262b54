//! # MEGNet Core Library
//!
//! A Rust implementation of the MatErials Graph Network (MEGNet) for predicting
//! properties of crystals and molecules, together with the converters that turn
//! an atomic structure into the graph the network consumes.
//!
//! ## Architectural Philosophy
//!
//! The library follows a layered layout so that each concern can be tested on its own.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Structure`, `Lattice`, `Element`),
//!   structure file readers, and the structure-to-graph converters with their bond expansion.
//!
//! - **[`nn`]: The Building Blocks.** Dense layers, activations, LSTM-based Set2Set pooling,
//!   and the MEGNet graph convolution and block, all operating on `nalgebra` matrices.
//!
//! - **[`model`]: The Network.** The `Megnet` model assembled from a `MegnetConfig`,
//!   in-memory weight dictionaries, and the `MegnetCalculator` that rescales predictions.
//!
//! - **[`workflows`]: The Public API.** End-to-end pipelines from a structure (or a batch of
//!   structures) to predicted properties, with progress reporting.

pub mod core;
pub mod model;
pub mod nn;
pub mod workflows;
