use log::debug;
use nalgebra::linalg::LU;
use nalgebra::{DVector, Dynamic};

use crate::error::{EigsysError, Result};
use crate::linalg::{AIJMatrix, SparseLu};

/// Krylov linear solver type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KspType {
    /// Apply the preconditioner once and nothing else (exact when the preconditioner is a direct factorization)
    PreOnly,
}

/// Preconditioner type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcType {
    /// Direct LU factorization of the operator
    Lu,
}

/// Package that performs a factorization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactorPackage {
    /// Sparse row-pivoted LU ([`SparseLu`])
    SparseLu,
    /// Dense LU via Nalgebra (only reasonable for small operators)
    DenseLu,
}

/// Preconditioner configuration
#[derive(Debug, Clone)]
pub struct Preconditioner {
    pc_type: PcType,
    package: FactorPackage,
}

impl Default for Preconditioner {
    fn default() -> Self {
        Self::new()
    }
}

impl Preconditioner {
    pub fn new() -> Self {
        Self {
            pc_type: PcType::Lu,
            package: FactorPackage::SparseLu,
        }
    }

    pub fn set_type(&mut self, pc_type: PcType) {
        self.pc_type = pc_type;
    }

    pub fn pc_type(&self) -> PcType {
        self.pc_type
    }

    pub fn set_factor_package(&mut self, package: FactorPackage) {
        self.package = package;
    }

    pub fn factor_package(&self) -> FactorPackage {
        self.package
    }
}

/// Linear solver configuration
#[derive(Debug, Clone)]
pub struct LinearSolver {
    ksp_type: KspType,
    pc: Preconditioner,
}

impl Default for LinearSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearSolver {
    pub fn new() -> Self {
        Self {
            ksp_type: KspType::PreOnly,
            pc: Preconditioner::new(),
        }
    }

    pub fn set_type(&mut self, ksp_type: KspType) {
        self.ksp_type = ksp_type;
    }

    pub fn ksp_type(&self) -> KspType {
        self.ksp_type
    }

    pub fn set_pc(&mut self, pc: Preconditioner) {
        self.pc = pc;
    }

    pub fn pc(&self) -> &Preconditioner {
        &self.pc
    }

    /// Factorize `matrix` so that it can be solved against repeatedly
    pub(crate) fn setup(&self, matrix: &AIJMatrix) -> Result<Factorization> {
        let factorization = match (self.ksp_type, self.pc.pc_type, self.pc.package) {
            (KspType::PreOnly, PcType::Lu, FactorPackage::SparseLu) => {
                Factorization::Sparse(SparseLu::factorize(matrix)?)
            }
            (KspType::PreOnly, PcType::Lu, FactorPackage::DenseLu) => {
                if !matrix.is_square() {
                    return Err(EigsysError::InvalidArgument(format!(
                        "cannot LU factorize a {}x{} matrix",
                        matrix.rows(),
                        matrix.cols()
                    )));
                }
                let lu = matrix.to_dense().lu();
                let u = lu.u();
                if let Some(column) = (0..u.nrows()).find(|&k| u[(k, k)] == 0.0) {
                    return Err(EigsysError::SingularFactor { column });
                }
                Factorization::Dense(lu)
            }
        };

        debug!(
            "factorized {}x{} operator with {:?}",
            matrix.rows(),
            matrix.cols(),
            self.pc.package
        );

        Ok(factorization)
    }
}

/// A factorized operator produced by [`LinearSolver::setup`]
pub(crate) enum Factorization {
    Sparse(SparseLu),
    Dense(LU<f64, Dynamic, Dynamic>),
}

impl Factorization {
    /// Overwrite `x` with the solution of `A y = x`
    pub fn solve_in_place(&self, x: &mut DVector<f64>) {
        match self {
            Self::Sparse(lu) => lu.solve_in_place(x.as_mut_slice()),
            Self::Dense(lu) => {
                let solved = lu.solve_mut(x);
                debug_assert!(solved, "dense LU factor is singular");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::{CsrMatrix, SparseMatrix};
    use std::convert::TryFrom;

    fn test_matrix() -> AIJMatrix {
        let mut sm = SparseMatrix::square(4);
        sm.insert_group((0..4).map(|i| ([i, i], 4.0 + i as f64)));
        sm.insert_symmetric([0, 3], 1.0);
        sm.insert([1, 2], -2.0);
        AIJMatrix::try_from(&CsrMatrix::from(sm)).unwrap()
    }

    #[test]
    fn sparse_and_dense_packages_agree() {
        let a = test_matrix();
        let rhs = DVector::from_vec(vec![1.0, -1.0, 2.0, 0.5]);

        let mut ksp = LinearSolver::new();
        let mut x_sparse = rhs.clone();
        ksp.setup(&a).unwrap().solve_in_place(&mut x_sparse);

        let mut pc = Preconditioner::new();
        pc.set_factor_package(FactorPackage::DenseLu);
        ksp.set_pc(pc);
        let mut x_dense = rhs.clone();
        ksp.setup(&a).unwrap().solve_in_place(&mut x_dense);

        assert!((&x_sparse - &x_dense).norm() < 1e-13);
        assert!((a.to_dense() * &x_sparse - &rhs).norm() < 1e-13);
    }

    #[test]
    fn dense_singular() {
        let a = AIJMatrix::try_from(&CsrMatrix::from_diagonal(&[1.0, 2.0, 0.0])).unwrap();

        let mut pc = Preconditioner::new();
        pc.set_factor_package(FactorPackage::DenseLu);
        let mut ksp = LinearSolver::new();
        ksp.set_pc(pc);

        assert!(matches!(
            ksp.setup(&a),
            Err(EigsysError::SingularFactor { column: 2 })
        ));
    }

    #[test]
    fn dense_solve_repeated() {
        let a = test_matrix();
        let mut pc = Preconditioner::new();
        pc.set_factor_package(FactorPackage::DenseLu);
        let mut ksp = LinearSolver::new();
        ksp.set_pc(pc);
        let factorization = ksp.setup(&a).unwrap();

        for k in 0..4 {
            let mut rhs = DVector::zeros(4);
            rhs[k] = 1.0;
            let mut x = rhs.clone();
            factorization.solve_in_place(&mut x);
            assert!((a.to_dense() * &x - &rhs).norm() < 1e-13);
        }
    }
}
