//! # Graph Construction
//!
//! Turns a [`Structure`](crate::core::models::structure::Structure) into a
//! [`CrystalGraph`](crystal_graph::CrystalGraph) the MEGNet model can consume.
//!
//! - [`neighbors`] - Cutoff neighbor search for periodic and molecular structures
//! - [`crystal_graph`] - The directed graph with per-edge image offsets and per-node types
//! - [`converter`] - The [`GraphConverter`](converter::GraphConverter) trait and its crystal/molecule implementations
//! - [`expansion`] - Gaussian expansion of bond distances into edge features
//! - [`transform`] - Graph transformations applied before each MEGNet block

pub mod converter;
pub mod crystal_graph;
pub mod expansion;
pub mod neighbors;
pub mod transform;
