/// Option sets for the eigenvalue solves, loadable from JSON
pub mod options;

use std::cmp::Ordering;
use std::convert::TryFrom;

use log::{debug, warn};

pub use options::{AeigsysOptions, InternalOptions};

use crate::error::{EigsysError, Result};
use crate::linalg::{AIJMatrix, CsrMatrix, EigenPair};
use crate::solver::{
    ConvergenceTest, EigenSolver, EpsType, FactorPackage, KspType, LinearSolver, PcType,
    Preconditioner, ProblemType, SpectralTransform, StType, Which,
};

/// Number of eigenvalues computed when the caller has no preference
pub const DEFAULT_K: usize = 6;

/// Convert a compressed-row matrix into the solver's native AIJ format.
///
/// Every stored entry (explicit zeros included) is carried over unchanged; column indices are
/// sorted within each row.
pub fn csr_to_aij(a: &CsrMatrix) -> Result<AIJMatrix> {
    AIJMatrix::try_from(a)
}

/// Configure (but do not run) a Krylov-Schur eigensolver for a general eigenvalue problem.
///
/// A supplied `sigma` overrides `which` with [`Which::TargetMagnitude`] and becomes the target.
/// The operator is the matrix itself (no spectral transformation) and Ritz pairs are
/// accepted on their absolute residual.
pub fn aeigsys_solver(opts: &AeigsysOptions) -> EigenSolver {
    let mut eps = EigenSolver::new();

    eps.set_type(EpsType::KrylovSchur);
    eps.set_problem_type(ProblemType::from_hermitian_flag(opts.isherm));
    eps.set_convergence_test(ConvergenceTest::Absolute);

    match opts.sigma {
        Some(sigma) => {
            if opts.which != Which::TargetMagnitude {
                debug!(
                    "target {} supplied; selecting TM instead of {}",
                    sigma, opts.which
                );
            }
            eps.set_which_eigenpairs(Which::TargetMagnitude);
            eps.set_target(sigma);
        }
        None => eps.set_which_eigenpairs(opts.which),
    }

    eps
}

/// Compute `k` eigenvalues of `a` from the portion of the spectrum selected by `opts`.
///
/// Only the real part of each eigenvalue is returned, sorted in ascending order. With
/// `opts.extra_evals` every converged eigenvalue is returned instead of exactly `k`.
///
/// Returns [`EigsysError::NotConverged`] when fewer than `k` eigenvalues converge.
pub fn aeigsys(a: &CsrMatrix, k: usize, opts: &AeigsysOptions) -> Result<Vec<f64>> {
    let eps = solve_general(a, k, opts)?;
    let values = converged_eigenvalues(&eps, k, opts.extra_evals)?;
    eps.destroy();
    Ok(values)
}

/// [`aeigsys`], also returning the (real part of the) eigenvectors
pub fn aeigsys_pairs(a: &CsrMatrix, k: usize, opts: &AeigsysOptions) -> Result<Vec<EigenPair>> {
    let eps = solve_general(a, k, opts)?;
    let pairs = converged_eigenpairs(&eps, k, opts.extra_evals)?;
    eps.destroy();
    Ok(pairs)
}

/// Configure (but do not run) a shift-and-invert eigensolver that finds the `k` eigenvalues of a
/// symmetric matrix closest to `sigma`.
///
/// (A - σI) is factorized once with a sparse LU and each Krylov step applies its inverse.
pub fn internal_eigsys_solver(k: usize, sigma: f64, tol: Option<f64>) -> EigenSolver {
    let mut pc = Preconditioner::new();
    pc.set_type(PcType::Lu);
    pc.set_factor_package(FactorPackage::SparseLu);

    let mut ksp = LinearSolver::new();
    ksp.set_type(KspType::PreOnly);
    ksp.set_pc(pc);

    let mut st = SpectralTransform::new();
    st.set_type(StType::ShiftInvert);
    st.set_shift(sigma);
    st.set_ksp(ksp);

    let mut eps = EigenSolver::new();
    eps.set_st(st);
    eps.set_problem_type(ProblemType::Hermitian);
    eps.set_type(EpsType::KrylovSchur);
    eps.set_which_eigenpairs(Which::TargetMagnitude);
    eps.set_target(sigma);
    eps.set_dimensions(k, None);
    eps.set_convergence_test(ConvergenceTest::Absolute);
    eps.set_tolerances(tol, None);

    eps
}

/// Compute the `k` eigenvalues of the symmetric matrix `a` closest to `opts.sigma`.
///
/// Same result conventions as [`aeigsys`]. Fails with [`EigsysError::SingularFactor`] when
/// `sigma` is (numerically) an eigenvalue of `a`.
pub fn internal_eigvals(a: &CsrMatrix, k: usize, opts: &InternalOptions) -> Result<Vec<f64>> {
    let eps = solve_internal(a, k, opts)?;
    let values = converged_eigenvalues(&eps, k, opts.extra_evals)?;
    eps.destroy();
    Ok(values)
}

/// [`internal_eigvals`], also returning the eigenvectors
pub fn internal_eigpairs(
    a: &CsrMatrix,
    k: usize,
    opts: &InternalOptions,
) -> Result<Vec<EigenPair>> {
    let eps = solve_internal(a, k, opts)?;
    let pairs = converged_eigenpairs(&eps, k, opts.extra_evals)?;
    eps.destroy();
    Ok(pairs)
}

fn solve_general(a: &CsrMatrix, k: usize, opts: &AeigsysOptions) -> Result<EigenSolver> {
    let mut eps = aeigsys_solver(opts);
    eps.set_operators(csr_to_aij(a)?);
    eps.set_dimensions(k, None);
    eps.solve()?;
    Ok(eps)
}

fn solve_internal(a: &CsrMatrix, k: usize, opts: &InternalOptions) -> Result<EigenSolver> {
    let mut eps = internal_eigsys_solver(k, opts.sigma, opts.tol);
    eps.set_operators(csr_to_aij(a)?);
    eps.solve()?;
    Ok(eps)
}

/// Number of eigenpairs to extract: all converged pairs or exactly `k`
fn extraction_count(eps: &EigenSolver, k: usize, extra_evals: bool) -> Result<usize> {
    let nconv = eps.converged();
    if nconv < k {
        return Err(EigsysError::NotConverged {
            requested: k,
            converged: nconv,
        });
    }

    Ok(if extra_evals { nconv } else { k })
}

/// Real part of the `i`th eigenvalue; the spectrum is expected to be real
fn real_eigenvalue(eps: &EigenSolver, i: usize) -> Result<f64> {
    let lambda = eps.eigenvalue(i)?;
    let (tol, _) = eps.tolerances();
    if lambda.im.abs() > tol * lambda.norm().max(1.0) {
        warn!(
            "discarding imaginary part of eigenvalue {} + {}i",
            lambda.re, lambda.im
        );
    }
    Ok(lambda.re)
}

fn converged_eigenvalues(eps: &EigenSolver, k: usize, extra_evals: bool) -> Result<Vec<f64>> {
    let count = extraction_count(eps, k, extra_evals)?;

    let mut values = (0..count)
        .map(|i| real_eigenvalue(eps, i))
        .collect::<Result<Vec<f64>>>()?;
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    Ok(values)
}

fn converged_eigenpairs(eps: &EigenSolver, k: usize, extra_evals: bool) -> Result<Vec<EigenPair>> {
    let count = extraction_count(eps, k, extra_evals)?;

    let mut pairs = (0..count)
        .map(|i| {
            let value = real_eigenvalue(eps, i)?;
            let (vector, _) = eps.eigenvector(i)?;
            Ok(EigenPair { value, vector })
        })
        .collect::<Result<Vec<EigenPair>>>()?;
    pairs.sort_by(|a, b| a.value.partial_cmp(&b.value).unwrap_or(Ordering::Equal));

    Ok(pairs)
}
