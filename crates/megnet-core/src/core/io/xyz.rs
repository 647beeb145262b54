use crate::core::io::traits::StructureFile;
use crate::core::models::element::Element;
use crate::core::models::lattice::{Lattice, LatticeError};
use crate::core::models::structure::{Site, Structure};
use nalgebra::{Matrix3, Point3};
use std::io::{self, BufRead};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XyzError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: XyzParseErrorKind },
    #[error("Invalid lattice: {0}")]
    Lattice(#[from] LatticeError),
    #[error("Expected {expected} atoms, found {found}")]
    AtomCountMismatch { expected: usize, found: usize },
    #[error("File is empty")]
    Empty,
}

#[derive(Debug, Error)]
pub enum XyzParseErrorKind {
    #[error("Invalid atom count '{0}'")]
    InvalidCount(String),
    #[error("Invalid coordinate '{0}'")]
    InvalidFloat(String),
    #[error("Atom line needs a symbol and three coordinates")]
    TooFewFields,
    #[error("Unknown element '{0}'")]
    UnknownElement(String),
    #[error("Lattice property must hold nine numbers")]
    InvalidLattice,
}

/// Sites reserved up front; a header count is only trusted as far as this.
const PREALLOCATED_SITES: usize = 4096;

/// Reader for XYZ files.
///
/// Only the first frame is read. When the comment line carries an extended-XYZ
/// `Lattice="ax ay az bx by bz cx cy cz"` property the structure is periodic,
/// otherwise it is a molecule.
pub struct XyzFile;

/// Extracts the nine lattice numbers from an extended-XYZ comment line.
fn parse_lattice_property(comment: &str, line: usize) -> Result<Option<Matrix3<f64>>, XyzError> {
    let Some(start) = comment.find("Lattice=\"") else {
        return Ok(None);
    };
    let rest = &comment[start + "Lattice=\"".len()..];
    let invalid = || XyzError::Parse {
        line,
        kind: XyzParseErrorKind::InvalidLattice,
    };
    let end = rest.find('"').ok_or_else(invalid)?;
    let values: Vec<f64> = rest[..end]
        .split_whitespace()
        .map(|token| token.parse::<f64>().map_err(|_| invalid()))
        .collect::<Result<_, _>>()?;
    if values.len() != 9 {
        return Err(invalid());
    }
    Ok(Some(Matrix3::from_row_slice(&values)))
}

impl StructureFile for XyzFile {
    type Error = XyzError;

    fn read_from(reader: &mut impl BufRead) -> Result<Structure, Self::Error> {
        let mut lines = reader.lines();

        let count_line = lines.next().ok_or(XyzError::Empty)??;
        let count_token = count_line.trim();
        let expected: usize = count_token.parse().map_err(|_| XyzError::Parse {
            line: 1,
            kind: XyzParseErrorKind::InvalidCount(count_token.to_string()),
        })?;

        let comment = lines.next().transpose()?.unwrap_or_default();
        let lattice = parse_lattice_property(&comment, 2)?
            .map(Lattice::new)
            .transpose()?;

        let mut sites = Vec::with_capacity(expected.min(PREALLOCATED_SITES));
        for (index, line_res) in lines.enumerate() {
            if sites.len() == expected {
                break;
            }
            let line = line_res?;
            let line_num = index + 3;
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.is_empty() {
                continue;
            }
            if fields.len() < 4 {
                return Err(XyzError::Parse {
                    line: line_num,
                    kind: XyzParseErrorKind::TooFewFields,
                });
            }
            let element: Element = fields[0].parse().map_err(|_| XyzError::Parse {
                line: line_num,
                kind: XyzParseErrorKind::UnknownElement(fields[0].to_string()),
            })?;
            let mut coords = [0.0; 3];
            for (slot, token) in coords.iter_mut().zip(&fields[1..4]) {
                *slot = token.parse().map_err(|_| XyzError::Parse {
                    line: line_num,
                    kind: XyzParseErrorKind::InvalidFloat(token.to_string()),
                })?;
            }
            sites.push(Site::new(element, Point3::from(coords)));
        }

        if sites.len() != expected {
            return Err(XyzError::AtomCountMismatch {
                expected,
                found: sites.len(),
            });
        }

        Ok(match lattice {
            Some(lattice) => Structure::crystal(lattice, sites),
            None => Structure::molecule(sites),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read(content: &str) -> Result<Structure, XyzError> {
        XyzFile::read_from(&mut Cursor::new(content))
    }

    #[test]
    fn plain_xyz_is_read_as_molecule() {
        let structure = read("3\nwater\nO 0.0 0.0 0.0\nH 0.96 0.0 0.0\nH -0.24 0.93 0.0\n").unwrap();
        assert!(!structure.is_periodic());
        assert_eq!(structure.formula(), "H2O");
        assert_eq!(structure.sites()[2].position, Point3::new(-0.24, 0.93, 0.0));
    }

    #[test]
    fn extended_xyz_lattice_makes_a_crystal() {
        let content = "2\nLattice=\"4.0 0.0 0.0 0.0 4.0 0.0 0.0 0.0 4.0\" Properties=species:S:1:pos:R:3\n\
                       Cs 0.0 0.0 0.0\nCl 2.0 2.0 2.0\n";
        let structure = read(content).unwrap();
        assert!(structure.is_periodic());
        assert!((structure.lattice().unwrap().volume() - 64.0).abs() < 1e-9);
    }

    #[test]
    fn reading_stops_after_first_frame() {
        let content = "1\nframe 1\nHe 0 0 0\n1\nframe 2\nNe 0 0 0\n";
        let structure = read(content).unwrap();
        assert_eq!(structure.len(), 1);
        assert_eq!(structure.sites()[0].symbol(), "He");
    }

    #[test]
    fn missing_atoms_are_reported() {
        let result = read("3\nshort\nH 0 0 0\n");
        assert!(matches!(
            result,
            Err(XyzError::AtomCountMismatch {
                expected: 3,
                found: 1
            })
        ));
    }

    #[test]
    fn malformed_lattice_property_is_rejected() {
        let result = read("1\nLattice=\"1 0 0 0 1 0\"\nH 0 0 0\n");
        assert!(matches!(
            result,
            Err(XyzError::Parse {
                line: 2,
                kind: XyzParseErrorKind::InvalidLattice
            })
        ));
    }

    #[test]
    fn bad_coordinate_reports_line_number() {
        let result = read("1\n\nH 0 zero 0\n");
        assert!(matches!(
            result,
            Err(XyzError::Parse {
                line: 3,
                kind: XyzParseErrorKind::InvalidFloat(_)
            })
        ));
    }

    #[test]
    fn oversized_atom_count_is_a_mismatch_not_a_panic() {
        let result = read("18446744073709551615\ncomment\nH 0 0 0\n");
        assert!(matches!(
            result,
            Err(XyzError::AtomCountMismatch {
                expected: usize::MAX,
                found: 1
            })
        ));
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(read(""), Err(XyzError::Empty)));
    }
}
