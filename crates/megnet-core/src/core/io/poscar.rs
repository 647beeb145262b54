use crate::core::io::traits::StructureFile;
use crate::core::models::element::Element;
use crate::core::models::lattice::{Lattice, LatticeError};
use crate::core::models::structure::{Site, Structure};
use nalgebra::{Matrix3, Point3, Vector3};
use std::io::{self, BufRead};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoscarError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse {
        line: usize,
        kind: PoscarParseErrorKind,
    },
    #[error("Invalid lattice: {0}")]
    Lattice(#[from] LatticeError),
    #[error("Unexpected end of file while reading {0}")]
    UnexpectedEof(&'static str),
}

#[derive(Debug, Error)]
pub enum PoscarParseErrorKind {
    #[error("Invalid float '{value}'")]
    InvalidFloat { value: String },
    #[error("Invalid atom count '{value}'")]
    InvalidCount { value: String },
    #[error("Expected {expected} values, found {found}")]
    TooFewValues { expected: usize, found: usize },
    #[error("Unknown element '{0}'")]
    UnknownElement(String),
    #[error("Species line is missing (VASP 4 format is not supported)")]
    MissingSpecies,
    #[error("{species} species but {counts} atom counts")]
    SpeciesCountMismatch { species: usize, counts: usize },
    #[error("Total atom count overflows")]
    CountOverflow,
}

/// Sites reserved up front; a header count is only trusted as far as this.
const PREALLOCATED_SITES: usize = 4096;

/// Reader for VASP POSCAR/CONTCAR files.
///
/// Supports the VASP 5 layout: comment, scale (negative means target volume),
/// three lattice vectors, species symbols, atom counts, an optional
/// `Selective dynamics` line, then `Direct` or `Cartesian` positions.
pub struct PoscarFile;

struct LineCursor<R> {
    lines: io::Lines<R>,
    line_num: usize,
}

impl<R: BufRead> LineCursor<R> {
    fn next_line(&mut self, what: &'static str) -> Result<(usize, String), PoscarError> {
        loop {
            let line = self.lines.next().ok_or(PoscarError::UnexpectedEof(what))??;
            self.line_num += 1;
            if !line.trim().is_empty() {
                return Ok((self.line_num, line));
            }
        }
    }
}

fn parse_floats(line: &str, line_num: usize, expected: usize) -> Result<Vec<f64>, PoscarError> {
    let tokens: Vec<&str> = line.split_whitespace().take(expected).collect();
    if tokens.len() < expected {
        return Err(PoscarError::Parse {
            line: line_num,
            kind: PoscarParseErrorKind::TooFewValues {
                expected,
                found: tokens.len(),
            },
        });
    }
    tokens
        .iter()
        .map(|token| {
            token.parse::<f64>().map_err(|_| PoscarError::Parse {
                line: line_num,
                kind: PoscarParseErrorKind::InvalidFloat {
                    value: token.to_string(),
                },
            })
        })
        .collect()
}

impl StructureFile for PoscarFile {
    type Error = PoscarError;

    fn read_from(reader: &mut impl BufRead) -> Result<Structure, Self::Error> {
        let mut cursor = LineCursor {
            lines: reader.lines(),
            line_num: 0,
        };

        let _comment = cursor.lines.next().ok_or(PoscarError::UnexpectedEof("comment"))??;
        cursor.line_num += 1;

        let (scale_line_num, scale_line) = cursor.next_line("scale factor")?;
        let scale = parse_floats(&scale_line, scale_line_num, 1)?[0];

        let mut rows = [Vector3::zeros(); 3];
        for row in rows.iter_mut() {
            let (line_num, line) = cursor.next_line("lattice vectors")?;
            let values = parse_floats(&line, line_num, 3)?;
            *row = Vector3::new(values[0], values[1], values[2]);
        }
        let raw = Matrix3::from_columns(&rows).transpose();
        let factor = if scale < 0.0 {
            (-scale / raw.determinant().abs()).cbrt()
        } else {
            scale
        };
        let lattice = Lattice::new(raw * factor)?;

        let (species_line_num, species_line) = cursor.next_line("species")?;
        let species: Vec<Element> = if species_line
            .split_whitespace()
            .next()
            .is_some_and(|token| token.parse::<usize>().is_ok())
        {
            return Err(PoscarError::Parse {
                line: species_line_num,
                kind: PoscarParseErrorKind::MissingSpecies,
            });
        } else {
            species_line
                .split_whitespace()
                .map(|token| {
                    // POTCAR-style labels such as "Fe_pv" or "O/abc" carry a suffix.
                    let symbol = token.split(['_', '/']).next().unwrap_or(token);
                    symbol.parse::<Element>().map_err(|_| PoscarError::Parse {
                        line: species_line_num,
                        kind: PoscarParseErrorKind::UnknownElement(token.to_string()),
                    })
                })
                .collect::<Result<_, _>>()?
        };

        let (counts_line_num, counts_line) = cursor.next_line("atom counts")?;
        let counts: Vec<usize> = counts_line
            .split_whitespace()
            .map(|token| {
                token.parse::<usize>().map_err(|_| PoscarError::Parse {
                    line: counts_line_num,
                    kind: PoscarParseErrorKind::InvalidCount {
                        value: token.to_string(),
                    },
                })
            })
            .collect::<Result<_, _>>()?;
        if counts.len() != species.len() {
            return Err(PoscarError::Parse {
                line: counts_line_num,
                kind: PoscarParseErrorKind::SpeciesCountMismatch {
                    species: species.len(),
                    counts: counts.len(),
                },
            });
        }
        let total = counts
            .iter()
            .try_fold(0usize, |acc, &count| acc.checked_add(count))
            .ok_or(PoscarError::Parse {
                line: counts_line_num,
                kind: PoscarParseErrorKind::CountOverflow,
            })?;

        let (_, mut mode_line) = cursor.next_line("coordinate mode")?;
        if mode_line.trim_start().starts_with(['S', 's']) {
            mode_line = cursor.next_line("coordinate mode")?.1;
        }
        let cartesian = mode_line.trim_start().starts_with(['C', 'c', 'K', 'k']);

        let mut sites = Vec::with_capacity(total.min(PREALLOCATED_SITES));
        for (element, &count) in species.iter().zip(&counts) {
            for _ in 0..count {
                let (line_num, line) = cursor.next_line("atomic positions")?;
                let values = parse_floats(&line, line_num, 3)?;
                let coords = Vector3::new(values[0], values[1], values[2]);
                let position = if cartesian {
                    Point3::from(coords * factor)
                } else {
                    lattice.fractional_to_cartesian(&coords)
                };
                sites.push(Site::new(*element, position));
            }
        }

        Ok(Structure::crystal(lattice, sites))
    }
}
