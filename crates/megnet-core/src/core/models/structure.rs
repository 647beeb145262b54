use super::element::{Element, ElementError};
use super::lattice::{Lattice, LatticeError};
use nalgebra::{Point3, Vector3};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum StructureError {
    #[error(transparent)]
    Element(#[from] ElementError),
    #[error(transparent)]
    Lattice(#[from] LatticeError),
    #[error("Got {species} species but {positions} positions")]
    LengthMismatch { species: usize, positions: usize },
}

/// A single atomic site: a species at a Cartesian position (Å).
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    pub species: Element,
    pub position: Point3<f64>,
}

impl Site {
    pub fn new(species: Element, position: Point3<f64>) -> Self {
        Self { species, position }
    }

    pub fn symbol(&self) -> &'static str {
        self.species.symbol()
    }
}

/// An atomic structure: an ordered list of sites and, for crystals, a lattice.
///
/// Site order is significant; it fixes the node indices of every graph built from
/// the structure.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Structure {
    lattice: Option<Lattice>,
    sites: Vec<Site>,
}

impl Structure {
    /// Creates an isolated molecule (no periodicity).
    pub fn molecule(sites: Vec<Site>) -> Self {
        Self {
            lattice: None,
            sites,
        }
    }

    /// Creates a periodic crystal from sites given in Cartesian coordinates.
    pub fn crystal(lattice: Lattice, sites: Vec<Site>) -> Self {
        Self {
            lattice: Some(lattice),
            sites,
        }
    }

    /// Creates a periodic crystal from species symbols and fractional coordinates.
    ///
    /// # Errors
    ///
    /// Returns an error if a symbol is unknown or if the two slices differ in length.
    pub fn from_fractional<S: AsRef<str>>(
        lattice: Lattice,
        species: &[S],
        fractional: &[[f64; 3]],
    ) -> Result<Self, StructureError> {
        if species.len() != fractional.len() {
            return Err(StructureError::LengthMismatch {
                species: species.len(),
                positions: fractional.len(),
            });
        }
        let sites = species
            .iter()
            .zip(fractional)
            .map(|(symbol, frac)| -> Result<Site, StructureError> {
                let element: Element = symbol.as_ref().parse()?;
                let position = lattice.fractional_to_cartesian(&Vector3::from(*frac));
                Ok(Site::new(element, position))
            })
            .collect::<Result<Vec<_>, StructureError>>()?;
        Ok(Self::crystal(lattice, sites))
    }

    /// Creates a molecule from species symbols and Cartesian coordinates.
    pub fn from_cartesian<S: AsRef<str>>(
        species: &[S],
        cartesian: &[[f64; 3]],
    ) -> Result<Self, StructureError> {
        if species.len() != cartesian.len() {
            return Err(StructureError::LengthMismatch {
                species: species.len(),
                positions: cartesian.len(),
            });
        }
        let sites = species
            .iter()
            .zip(cartesian)
            .map(|(symbol, pos)| -> Result<Site, StructureError> {
                let element: Element = symbol.as_ref().parse()?;
                Ok(Site::new(element, Point3::from(*pos)))
            })
            .collect::<Result<Vec<_>, StructureError>>()?;
        Ok(Self::molecule(sites))
    }

    pub fn lattice(&self) -> Option<&Lattice> {
        self.lattice.as_ref()
    }

    pub fn is_periodic(&self) -> bool {
        self.lattice.is_some()
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn cart_coords(&self) -> Vec<Point3<f64>> {
        self.sites.iter().map(|site| site.position).collect()
    }

    /// Fractional coordinates of every site, or `None` for a molecule.
    pub fn frac_coords(&self) -> Option<Vec<Vector3<f64>>> {
        let lattice = self.lattice.as_ref()?;
        Some(
            self.sites
                .iter()
                .map(|site| lattice.cartesian_to_fractional(&site.position))
                .collect(),
        )
    }

    /// Unique elements present, in order of atomic number.
    pub fn elements(&self) -> Vec<Element> {
        let mut elements: Vec<Element> = self.sites.iter().map(|site| site.species).collect();
        elements.sort();
        elements.dedup();
        elements
    }

    /// Unreduced chemical formula with elements in order of atomic number, e.g. `"Na4Cl4"`.
    pub fn formula(&self) -> String {
        let mut counts: BTreeMap<Element, usize> = BTreeMap::new();
        for site in &self.sites {
            *counts.entry(site.species).or_insert(0) += 1;
        }
        counts
            .into_iter()
            .map(|(element, count)| {
                if count == 1 {
                    element.symbol().to_string()
                } else {
                    format!("{}{}", element.symbol(), count)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cscl() -> Structure {
        Structure::from_fractional(
            Lattice::cubic(4.0).unwrap(),
            &["Cs", "Cl"],
            &[[0.0, 0.0, 0.0], [0.5, 0.5, 0.5]],
        )
        .unwrap()
    }

    #[test]
    fn from_fractional_places_sites_in_cartesian_space() {
        let structure = cscl();
        assert!(structure.is_periodic());
        assert_eq!(structure.len(), 2);
        assert_eq!(structure.sites()[1].position, Point3::new(2.0, 2.0, 2.0));
        assert_eq!(structure.sites()[1].symbol(), "Cl");
    }

    #[test]
    fn frac_coords_round_trip_through_lattice() {
        let frac = cscl().frac_coords().unwrap();
        assert!((frac[1] - Vector3::new(0.5, 0.5, 0.5)).norm() < 1e-12);
    }

    #[test]
    fn molecule_has_no_fractional_coordinates() {
        let water =
            Structure::from_cartesian(&["O", "H", "H"], &[[0.0; 3], [0.96, 0.0, 0.0], [-0.24, 0.93, 0.0]])
                .unwrap();
        assert!(!water.is_periodic());
        assert!(water.frac_coords().is_none());
        assert_eq!(water.formula(), "H2O");
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let result = Structure::from_cartesian(&["O", "H"], &[[0.0; 3]]);
        assert_eq!(
            result,
            Err(StructureError::LengthMismatch {
                species: 2,
                positions: 1
            })
        );
    }

    #[test]
    fn unknown_species_is_reported() {
        let result = Structure::from_cartesian(&["Qq"], &[[0.0; 3]]);
        assert!(matches!(result, Err(StructureError::Element(_))));
    }

    #[test]
    fn elements_are_unique_and_sorted_by_atomic_number() {
        let structure =
            Structure::from_cartesian(&["S", "Mo", "S"], &[[0.0; 3], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]])
                .unwrap();
        let symbols: Vec<&str> = structure.elements().iter().map(Element::symbol).collect();
        assert_eq!(symbols, vec!["S", "Mo"]);
        assert_eq!(structure.formula(), "S2Mo");
    }
}
