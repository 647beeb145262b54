//! # Core Models Module
//!
//! Data structures describing atomic structures, both periodic crystals and
//! isolated molecules.
//!
//! ## Key Components
//!
//! - [`element`] - Chemical elements backed by a static symbol table
//! - [`lattice`] - Periodic lattice with fractional/Cartesian conversion
//! - [`structure`] - Sites and structures, with an optional lattice
//!
//! ## Usage
//!
//! ```ignore
//! use megnet::core::models::{lattice::Lattice, structure::Structure};
//!
//! let lattice = Lattice::cubic(3.0);
//! let structure = Structure::from_fractional(lattice, &["Cs", "Cl"], &[[0.0; 3], [0.5; 3]])?;
//! assert!(structure.is_periodic());
//! ```

pub mod element;
pub mod lattice;
pub mod structure;
