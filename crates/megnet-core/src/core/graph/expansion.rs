use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Expands bond distances on a set of evenly spaced Gaussians.
///
/// With centers `c_k = linspace(initial, final, num_centers)`, the feature of a
/// bond of length `d` is `φ_k(d) = exp(-width · (d - c_k)²)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GaussianExpansion {
    pub initial: f64,
    #[serde(rename = "final")]
    pub final_: f64,
    pub num_centers: usize,
    pub width: f64,
}

impl Default for GaussianExpansion {
    fn default() -> Self {
        Self {
            initial: 0.0,
            final_: 5.0,
            num_centers: 100,
            width: 0.5,
        }
    }
}

impl GaussianExpansion {
    pub fn new(initial: f64, final_: f64, num_centers: usize, width: f64) -> Self {
        Self {
            initial,
            final_,
            num_centers,
            width,
        }
    }

    pub fn centers(&self) -> Vec<f64> {
        match self.num_centers {
            0 => Vec::new(),
            1 => vec![self.initial],
            n => {
                let step = (self.final_ - self.initial) / (n - 1) as f64;
                (0..n).map(|k| self.initial + step * k as f64).collect()
            }
        }
    }

    /// Returns a `distances.len() × num_centers` feature matrix.
    pub fn expand(&self, distances: &[f64]) -> DMatrix<f64> {
        let centers = self.centers();
        DMatrix::from_fn(distances.len(), centers.len(), |row, col| {
            let diff = distances[row] - centers[col];
            (-self.width * diff * diff).exp()
        })
    }
}
