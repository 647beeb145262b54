//! # Workflows Module
//!
//! High-level entry points that take structures all the way to graphs or
//! predicted properties.
//!
//! - **Graph Workflow** ([`graph`]) - Converts one structure and summarizes the
//!   resulting graph (nodes, bonds, periodic images and bond lengths).
//! - **Prediction Workflow** ([`predict`]) - Converts a batch of structures and
//!   evaluates a [`MegnetCalculator`](crate::model::predictor::MegnetCalculator)
//!   on each, in parallel when the `parallel` feature is enabled.
//!
//! Both report their phases through [`progress::ProgressReporter`] and fail with
//! [`error::WorkflowError`].

pub mod error;
pub mod graph;
pub mod predict;
pub mod progress;
