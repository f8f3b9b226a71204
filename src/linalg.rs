/// Compressed-row input matrices and a BTreeMap backed assembler
pub mod sparse_matrix;
/// AIJ Sparse Matrix format native to the eigensolver
pub mod aij_matrix;
/// Direct LU factorization of sparse matrices
pub mod factor;

use std::path::Path;

use crate::error::Result;

pub use aij_matrix::AIJMatrix;
pub use factor::SparseLu;
pub use sparse_matrix::{CsrMatrix, SparseMatrix};

/// Solution to an Eigenvalue Problem
#[derive(Debug, Clone)]
pub struct EigenPair {
    /// Eigenvalue (real part)
    pub value: f64,
    /// Eigenvector (real part)
    pub vector: Vec<f64>,
}

impl EigenPair {
    /// L2 normalized vector
    pub fn normalized_eigenvector(&self) -> Vec<f64> {
        let norm = self.vector.iter().map(|x| x.powi(2)).sum::<f64>().sqrt();
        if norm == 0.0 {
            return self.vector.clone();
        }
        self.vector.iter().map(|x| x / norm).collect()
    }

    /// Write the normalized eigenvector as a PETSc binary `Vec`
    pub fn write_petsc_binary(&self, path: impl AsRef<Path>) -> Result<()> {
        aij_matrix::write_petsc_binary_vector(&self.normalized_eigenvector(), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_eigenvector() {
        let pair = EigenPair {
            value: 1.0,
            vector: vec![3.0, 0.0, -4.0],
        };

        let v = pair.normalized_eigenvector();
        assert!((v[0] - 0.6).abs() < 1e-15);
        assert!(v[1].abs() < 1e-15);
        assert!((v[2] + 0.8).abs() < 1e-15);
    }

    #[test]
    fn eigenvector_to_petsc_binary() {
        let pair = EigenPair {
            value: -2.0,
            vector: vec![0.0, 2.0],
        };
        let path = std::env::temp_dir().join("eigsys_eigenvector_test.dat");
        pair.write_petsc_binary(&path).unwrap();

        let v = aij_matrix::read_petsc_binary_vector(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(v, vec![0.0, 1.0]);
    }
}
