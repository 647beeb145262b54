//! # Core Module
//!
//! Fundamental data structures and algorithms for representing atomic structures
//! and converting them into graphs.
//!
//! ## Architecture
//!
//! - **Structure Representation** ([`models`]) - Elements, lattices, sites and structures
//! - **File I/O** ([`io`]) - Readers for POSCAR and (extended) XYZ files
//! - **Graph Construction** ([`graph`]) - Neighbor search, graph converters and bond expansion

pub mod graph;
pub mod io;
pub mod models;
