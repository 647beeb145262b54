use nalgebra::{Matrix3, Point3, Vector3};
use thiserror::Error;

const MIN_CELL_VOLUME: f64 = 1e-8;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum LatticeError {
    #[error("Lattice vectors are degenerate (cell volume {volume:.3e} Å³)")]
    Degenerate { volume: f64 },
    #[error("Invalid lattice parameters: {0}")]
    InvalidParameters(String),
}

/// A periodic lattice described by three lattice vectors.
///
/// The vectors are stored as the rows of a 3×3 matrix, so a fractional row vector
/// `f` maps to Cartesian coordinates as `f · L`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lattice {
    matrix: Matrix3<f64>,
    inverse: Matrix3<f64>,
}

impl Lattice {
    /// Creates a lattice from a matrix whose rows are the lattice vectors.
    ///
    /// # Errors
    ///
    /// Returns [`LatticeError::Degenerate`] if the vectors span (almost) no volume.
    pub fn new(matrix: Matrix3<f64>) -> Result<Self, LatticeError> {
        let volume = matrix.determinant().abs();
        if volume < MIN_CELL_VOLUME {
            return Err(LatticeError::Degenerate { volume });
        }
        let inverse = matrix
            .try_inverse()
            .ok_or(LatticeError::Degenerate { volume })?;
        Ok(Self { matrix, inverse })
    }

    pub fn from_vectors(
        a: Vector3<f64>,
        b: Vector3<f64>,
        c: Vector3<f64>,
    ) -> Result<Self, LatticeError> {
        Self::new(Matrix3::from_rows(&[a.transpose(), b.transpose(), c.transpose()]))
    }

    pub fn cubic(a: f64) -> Result<Self, LatticeError> {
        Self::new(Matrix3::from_diagonal_element(a))
    }

    /// Builds a lattice from cell lengths (Å) and angles (degrees).
    ///
    /// Uses the usual convention: `a` along x, `b` in the xy-plane.
    pub fn from_parameters(
        a: f64,
        b: f64,
        c: f64,
        alpha: f64,
        beta: f64,
        gamma: f64,
    ) -> Result<Self, LatticeError> {
        if a <= 0.0 || b <= 0.0 || c <= 0.0 {
            return Err(LatticeError::InvalidParameters(format!(
                "cell lengths must be positive (got {a}, {b}, {c})"
            )));
        }
        let (alpha, beta, gamma) = (alpha.to_radians(), beta.to_radians(), gamma.to_radians());
        let (cos_a, cos_b, cos_g) = (alpha.cos(), beta.cos(), gamma.cos());
        let sin_g = gamma.sin();
        if sin_g.abs() < 1e-12 {
            return Err(LatticeError::InvalidParameters(
                "gamma must not be 0 or 180 degrees".to_string(),
            ));
        }

        let cx = c * cos_b;
        let cy = c * (cos_a - cos_b * cos_g) / sin_g;
        let cz_sq = c * c - cx * cx - cy * cy;
        if cz_sq <= 0.0 {
            return Err(LatticeError::InvalidParameters(
                "cell angles do not describe a valid cell".to_string(),
            ));
        }

        Self::from_vectors(
            Vector3::new(a, 0.0, 0.0),
            Vector3::new(b * cos_g, b * sin_g, 0.0),
            Vector3::new(cx, cy, cz_sq.sqrt()),
        )
    }

    /// The lattice matrix; row `i` is lattice vector `i`.
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    pub fn vector(&self, index: usize) -> Vector3<f64> {
        self.matrix.row(index).transpose()
    }

    pub fn volume(&self) -> f64 {
        self.matrix.determinant().abs()
    }

    pub fn lengths(&self) -> [f64; 3] {
        [0, 1, 2].map(|i| self.vector(i).norm())
    }

    /// Distances between opposite faces of the cell, one per lattice vector.
    ///
    /// The height along vector `i` is `V / |a_j × a_k|`; a sphere of radius `r`
    /// around any point in the cell reaches at most `ceil(r / h_i)` cells away
    /// along that direction.
    pub fn perpendicular_heights(&self) -> [f64; 3] {
        let volume = self.volume();
        [(1, 2), (2, 0), (0, 1)].map(|(j, k)| volume / self.vector(j).cross(&self.vector(k)).norm())
    }

    pub fn fractional_to_cartesian(&self, fractional: &Vector3<f64>) -> Point3<f64> {
        Point3::from(self.matrix.transpose() * fractional)
    }

    pub fn cartesian_to_fractional(&self, cartesian: &Point3<f64>) -> Vector3<f64> {
        self.inverse.transpose() * cartesian.coords
    }

    /// Cartesian translation of the periodic image `image` (integer multiples of the lattice vectors).
    pub fn image_shift(&self, image: &[i32; 3]) -> Vector3<f64> {
        self.matrix.transpose() * Vector3::new(image[0] as f64, image[1] as f64, image[2] as f64)
    }
}
