use crate::core::models::lattice::Lattice;
use kiddo::{ImmutableKdTree, SquaredEuclidean};
use nalgebra::Point3;
use thiserror::Error;
use tracing::{instrument, trace};

/// Distances below this are treated as the same point and never become bonds.
pub const NUMERICAL_TOLERANCE: f64 = 1e-8;

/// Most periodic images a single neighbor search may scan.
pub const MAX_PERIODIC_IMAGES: f64 = 1.0e6;

#[derive(Debug, Error, PartialEq, Clone)]
#[error("A cutoff of {cutoff} Å spans {images:.0} periodic images (limit {limit:.0}); the cutoff is too large for this cell")]
pub struct ImageLimitError {
    pub cutoff: f64,
    pub images: f64,
    pub limit: f64,
}

/// A flat list of (center, neighbor, image) pairs within a cutoff.
///
/// Entry `k` says that site `neighbor_indices[k]`, translated by
/// `images[k]` lattice vectors, lies `distances[k]` Å from site `center_indices[k]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NeighborList {
    pub center_indices: Vec<usize>,
    pub neighbor_indices: Vec<usize>,
    pub images: Vec<[i32; 3]>,
    pub distances: Vec<f64>,
}

impl NeighborList {
    pub fn len(&self) -> usize {
        self.center_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.center_indices.is_empty()
    }

    fn from_entries(mut entries: Vec<(usize, usize, [i32; 3], f64)>) -> Self {
        entries.sort_by(|a, b| (a.0, a.1, a.2).cmp(&(b.0, b.1, b.2)));
        let mut list = Self {
            center_indices: Vec::with_capacity(entries.len()),
            neighbor_indices: Vec::with_capacity(entries.len()),
            images: Vec::with_capacity(entries.len()),
            distances: Vec::with_capacity(entries.len()),
        };
        for (center, neighbor, image, distance) in entries {
            list.center_indices.push(center);
            list.neighbor_indices.push(neighbor);
            list.images.push(image);
            list.distances.push(distance);
        }
        list
    }
}

fn build_tree(positions: &[Point3<f64>]) -> ImmutableKdTree<f64, 3> {
    let points: Vec<[f64; 3]> = positions.iter().map(|p| [p.x, p.y, p.z]).collect();
    ImmutableKdTree::new_from_slice(&points)
}

/// Number of periodic images to scan along each lattice vector.
///
/// Sites are not assumed to be wrapped into the cell, so the spread of the
/// fractional coordinates is added to the cutoff reach.
fn image_ranges(
    lattice: &Lattice,
    positions: &[Point3<f64>],
    cutoff: f64,
) -> Result<[i32; 3], ImageLimitError> {
    let heights = lattice.perpendicular_heights();
    let mut min = [f64::INFINITY; 3];
    let mut max = [f64::NEG_INFINITY; 3];
    for position in positions {
        let frac = lattice.cartesian_to_fractional(position);
        for axis in 0..3 {
            min[axis] = min[axis].min(frac[axis]);
            max[axis] = max[axis].max(frac[axis]);
        }
    }
    let reach = [0, 1, 2].map(|axis| {
        let spread = (max[axis] - min[axis]).max(0.0);
        (cutoff / heights[axis] + spread).ceil()
    });

    let images: f64 = reach.iter().map(|n| 2.0 * n + 1.0).product();
    if !images.is_finite() || images > MAX_PERIODIC_IMAGES {
        return Err(ImageLimitError {
            cutoff,
            images,
            limit: MAX_PERIODIC_IMAGES,
        });
    }
    Ok(reach.map(|n| n as i32))
}

/// Finds all neighbors within `cutoff` in a periodic structure.
///
/// Every pair is reported in both directions: if `j` at image `t` neighbors `i`,
/// then `i` at image `-t` neighbors `j`. A site's own periodic images are
/// included; the site itself (zero distance) is not. Entries are sorted by
/// `(center, neighbor, image)`.
///
/// # Errors
///
/// Fails when the cutoff would require scanning more than
/// [`MAX_PERIODIC_IMAGES`] cells.
#[instrument(level = "debug", skip_all, fields(num_sites = positions.len(), cutoff = cutoff))]
pub fn periodic_neighbors(
    lattice: &Lattice,
    positions: &[Point3<f64>],
    cutoff: f64,
) -> Result<NeighborList, ImageLimitError> {
    if positions.is_empty() || cutoff <= 0.0 {
        return Ok(NeighborList::default());
    }

    let [na, nb, nc] = image_ranges(lattice, positions, cutoff)?;
    let tree = build_tree(positions);
    trace!(na, nb, nc, "Scanning periodic images.");

    let query_radius_sq = (cutoff + NUMERICAL_TOLERANCE).powi(2);
    let mut entries = Vec::new();
    for a in -na..=na {
        for b in -nb..=nb {
            for c in -nc..=nc {
                let image = [a, b, c];
                let shift = lattice.image_shift(&image);
                for (neighbor, position) in positions.iter().enumerate() {
                    let query = position + shift;
                    let found = tree.within_unsorted::<SquaredEuclidean>(
                        &[query.x, query.y, query.z],
                        query_radius_sq,
                    );
                    for hit in found {
                        let center = hit.item as usize;
                        let distance = (query - positions[center]).norm();
                        if distance > NUMERICAL_TOLERANCE && distance <= cutoff {
                            entries.push((center, neighbor, image, distance));
                        }
                    }
                }
            }
        }
    }

    Ok(NeighborList::from_entries(entries))
}

/// Finds all ordered pairs `i != j` of a non-periodic structure within `cutoff`.
#[instrument(level = "debug", skip_all, fields(num_sites = positions.len(), cutoff = cutoff))]
pub fn molecule_neighbors(positions: &[Point3<f64>], cutoff: f64) -> NeighborList {
    if positions.is_empty() || cutoff <= 0.0 {
        return NeighborList::default();
    }

    let tree = build_tree(positions);
    let query_radius_sq = (cutoff + NUMERICAL_TOLERANCE).powi(2);
    let mut entries = Vec::new();
    for (neighbor, position) in positions.iter().enumerate() {
        let found = tree.within_unsorted::<SquaredEuclidean>(
            &[position.x, position.y, position.z],
            query_radius_sq,
        );
        for hit in found {
            let center = hit.item as usize;
            if center == neighbor {
                continue;
            }
            let distance = (position - positions[center]).norm();
            if distance <= cutoff {
                entries.push((center, neighbor, [0, 0, 0], distance));
            }
        }
    }

    NeighborList::from_entries(entries)
}
