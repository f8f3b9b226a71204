/// Spectrum selection criteria, problem types, and convergence tests
pub mod which;

/// Direct linear solvers used by spectral transformations
pub mod ksp;

/// Shift and Shift-and-Invert spectral transformations
pub mod st;

/// Restarted Krylov-Schur iteration
mod krylov_schur;

/// Eigenvalue Problem Solver handle
pub mod eps;

pub use eps::{EigenSolver, SolveReport, DEFAULT_TOLERANCE};
pub use ksp::{FactorPackage, KspType, LinearSolver, PcType, Preconditioner};
pub use st::{SpectralTransform, StType};
pub use which::{ConvergedReason, ConvergenceTest, EpsType, ProblemType, Which};
