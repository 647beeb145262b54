//! # Structure File I/O
//!
//! Readers that turn structure files into [`Structure`](crate::core::models::structure::Structure)
//! values.
//!
//! - [`poscar`] - VASP POSCAR/CONTCAR files (periodic)
//! - [`xyz`] - XYZ files; extended XYZ with a `Lattice="..."` comment is read as a crystal
//! - [`traits`] - The shared [`StructureFile`](traits::StructureFile) interface and format detection

pub mod poscar;
pub mod traits;
pub mod xyz;
