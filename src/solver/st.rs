use nalgebra::DVector;
use num_complex::Complex64;

use super::ksp::{Factorization, LinearSolver};
use crate::error::Result;
use crate::linalg::AIJMatrix;

/// Spectral transformation type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StType {
    /// Op = A - σI
    Shift,
    /// Op = (A - σI)^-1; eigenvalues near σ become the largest in magnitude
    ShiftInvert,
}

/// Spectral transformation applied to the operator before the Krylov iteration
#[derive(Debug, Clone)]
pub struct SpectralTransform {
    st_type: StType,
    shift: f64,
    ksp: LinearSolver,
}

impl Default for SpectralTransform {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectralTransform {
    pub fn new() -> Self {
        Self {
            st_type: StType::Shift,
            shift: 0.0,
            ksp: LinearSolver::new(),
        }
    }

    pub fn set_type(&mut self, st_type: StType) {
        self.st_type = st_type;
    }

    pub fn st_type(&self) -> StType {
        self.st_type
    }

    pub fn set_shift(&mut self, shift: f64) {
        self.shift = shift;
    }

    pub fn shift(&self) -> f64 {
        self.shift
    }

    /// Linear solver used by [`StType::ShiftInvert`]
    pub fn set_ksp(&mut self, ksp: LinearSolver) {
        self.ksp = ksp;
    }

    pub fn ksp(&self) -> &LinearSolver {
        &self.ksp
    }

    /// Build the transformed operator for `matrix`
    pub(crate) fn setup<'a>(&self, matrix: &'a AIJMatrix) -> Result<StOperator<'a>> {
        Ok(match self.st_type {
            StType::Shift => StOperator::Shifted {
                matrix,
                shift: self.shift,
            },
            StType::ShiftInvert => StOperator::Inverted {
                factorization: self.ksp.setup(&matrix.shifted(self.shift))?,
                dim: matrix.rows(),
                shift: self.shift,
            },
        })
    }
}

/// Operator seen by the Krylov iteration
pub(crate) enum StOperator<'a> {
    Shifted {
        matrix: &'a AIJMatrix,
        shift: f64,
    },
    Inverted {
        factorization: Factorization,
        dim: usize,
        shift: f64,
    },
}

impl<'a> StOperator<'a> {
    pub fn dim(&self) -> usize {
        match self {
            Self::Shifted { matrix, .. } => matrix.rows(),
            Self::Inverted { dim, .. } => *dim,
        }
    }

    /// y = Op x
    pub fn apply(&self, x: &DVector<f64>, y: &mut DVector<f64>) {
        match self {
            Self::Shifted { matrix, shift } => {
                matrix.mult(x.as_slice(), y.as_mut_slice());
                if *shift != 0.0 {
                    y.axpy(-*shift, x, 1.0);
                }
            }
            Self::Inverted { factorization, .. } => {
                y.copy_from(x);
                factorization.solve_in_place(y);
            }
        }
    }

    /// Map an eigenvalue of Op back to an eigenvalue of A
    pub fn back_transform(&self, theta: Complex64) -> Complex64 {
        match self {
            Self::Shifted { shift, .. } => theta + *shift,
            Self::Inverted { shift, .. } => {
                if theta.norm() == 0.0 {
                    Complex64::new(f64::INFINITY, 0.0)
                } else {
                    theta.inv() + *shift
                }
            }
        }
    }
}
