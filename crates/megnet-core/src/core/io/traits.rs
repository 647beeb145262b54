use super::poscar::{PoscarError, PoscarFile};
use super::xyz::{XyzError, XyzFile};
use crate::core::models::structure::Structure;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

/// Defines the interface for reading structure file formats.
///
/// Implementors handle format-specific parsing; opening files is shared.
pub trait StructureFile {
    /// The error type for parsing and I/O.
    type Error: Error + From<io::Error>;

    /// Reads a structure from a buffered reader.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails or the reader fails.
    fn read_from(reader: &mut impl BufRead) -> Result<Structure, Self::Error>;

    /// Reads a structure from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsing fails.
    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Structure, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }
}

/// Structure file formats recognized from a file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureFormat {
    Poscar,
    Xyz,
}

impl StructureFormat {
    /// Guesses the format from a path.
    ///
    /// `*.xyz` / `*.extxyz` are XYZ; `*.vasp`, `*.poscar` and names containing
    /// `POSCAR` or `CONTCAR` are POSCAR.
    pub fn from_path(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_string_lossy();
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase());

        match extension.as_deref() {
            Some("xyz") | Some("extxyz") => return Some(Self::Xyz),
            Some("vasp") | Some("poscar") => return Some(Self::Poscar),
            _ => {}
        }

        let upper = file_name.to_ascii_uppercase();
        if upper.contains("POSCAR") || upper.contains("CONTCAR") {
            Some(Self::Poscar)
        } else {
            None
        }
    }
}

#[derive(Debug, Error)]
pub enum ReadStructureError {
    #[error("Cannot determine the structure format of '{0}'")]
    UnknownFormat(String),
    #[error(transparent)]
    Poscar(#[from] PoscarError),
    #[error(transparent)]
    Xyz(#[from] XyzError),
}

/// Reads a structure, choosing the reader from the file name.
pub fn read_structure_path(path: &Path) -> Result<Structure, ReadStructureError> {
    match StructureFormat::from_path(path) {
        Some(StructureFormat::Poscar) => Ok(PoscarFile::read_from_path(path)?),
        Some(StructureFormat::Xyz) => Ok(XyzFile::read_from_path(path)?),
        None => Err(ReadStructureError::UnknownFormat(
            path.to_string_lossy().to_string(),
        )),
    }
}
