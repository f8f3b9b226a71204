//! Eigenvalues of large sparse real matrices.
//!
//! A compressed-row matrix is converted into the solver's native [`AIJMatrix`] format and handed
//! to a restarted Krylov-Schur [`EigenSolver`]. The [`advanced`] module wraps the whole procedure
//! in two calls:
//!
//! * [`aeigsys`]: eigenvalues selected by magnitude, real part, imaginary part, or proximity to a target
//! * [`internal_eigvals`]: eigenvalues of a symmetric matrix closest to a shift, using shift-and-invert
//!
//! ```
//! use eigsys::{aeigsys, AeigsysOptions, CsrMatrix};
//!
//! let a = CsrMatrix::from_diagonal(&[1.0, -4.0, 2.0, 3.0]);
//! let largest = aeigsys(&a, 2, &AeigsysOptions::default()).unwrap();
//!
//! assert!((largest[0] + 4.0).abs() < 1e-10);
//! assert!((largest[1] - 3.0).abs() < 1e-10);
//! ```

/// Error type shared by the whole crate
pub mod error;

/// Sparse matrix formats, PETSc binary I/O, and sparse LU factorization
pub mod linalg;

/// Krylov-Schur eigensolver with spectral transformations
pub mod solver;

/// High level eigenvalue solves over compressed-row matrices
pub mod advanced;

pub use advanced::{
    aeigsys, aeigsys_pairs, aeigsys_solver, csr_to_aij, internal_eigpairs, internal_eigsys_solver,
    internal_eigvals, AeigsysOptions, InternalOptions, DEFAULT_K,
};
pub use error::{EigsysError, Result};
pub use linalg::{AIJMatrix, CsrMatrix, EigenPair, SparseMatrix};
pub use solver::{EigenSolver, ProblemType, Which};
