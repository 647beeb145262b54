use nalgebra::DMatrix;

/// Dropout with probability `p`.
///
/// Models here only run inference, where dropout passes its input through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dropout {
    pub p: f64,
}

impl Dropout {
    pub fn new(p: f64) -> Self {
        Self { p }
    }

    pub fn forward(&self, x: DMatrix<f64>) -> DMatrix<f64> {
        x
    }
}
