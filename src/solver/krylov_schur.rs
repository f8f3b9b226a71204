//! Krylov-Schur iteration with thick restarts
//!
//! The Krylov relation `Op V = V H + f e^T` is expanded with Arnoldi steps (full
//! reorthogonalization) up to `ncv` columns. The projected matrix `H` is then diagonalized,
//! the wanted Ritz pairs are sorted to the front, and the basis is compressed onto the leading
//! wanted Ritz vectors before expanding again. Keeping an invariant subspace of `H` preserves
//! the Krylov relation across restarts, with `H` no longer Hessenberg in its leading block.
//!
//! Hermitian problems diagonalize the (symmetric) projected matrix directly. Non-Hermitian
//! problems use a complex Schur form; complex conjugate Ritz pairs are restarted together through
//! the real and imaginary parts of their vectors so the basis stays real.

use log::{debug, trace};
use nalgebra::linalg::{Schur, SymmetricEigen};
use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::st::StOperator;
use super::which::{ConvergedReason, ConvergenceTest, ProblemType, Which};

const START_VECTOR_SEED: u64 = 0x5EED_E165;
/// ||Op v|| is reduced by more than this factor during orthogonalization: invariant subspace found
const BREAKDOWN_TOL: f64 = 1e-12;
/// Ritz values with a relative imaginary part below this are treated as real
const REAL_RITZ_TOL: f64 = 1e-10;
const MAX_RANDOM_ATTEMPTS: usize = 4;

pub(crate) struct KrylovSchurParams {
    pub nev: usize,
    pub ncv: usize,
    pub max_it: usize,
    pub tol: f64,
    pub which: Which,
    pub target: f64,
    pub problem_type: ProblemType,
    pub conv_test: ConvergenceTest,
    pub norm_a: f64,
}

/// Outcome of a Krylov-Schur run; Ritz data is stored in wanted order
pub(crate) struct KrylovSolution {
    /// eigenvalues of A (back-transformed)
    pub eigenvalues: Vec<Complex64>,
    /// residual estimates of the Ritz pairs of Op
    pub residuals: Vec<f64>,
    pub nconv: usize,
    pub iterations: usize,
    pub reason: ConvergedReason,
    basis: Vec<DVector<f64>>,
    ritz_vectors: DMatrix<Complex64>,
}

impl KrylovSolution {
    fn empty() -> Self {
        Self {
            eigenvalues: Vec::new(),
            residuals: Vec::new(),
            nconv: 0,
            iterations: 0,
            reason: ConvergedReason::Converged,
            basis: Vec::new(),
            ritz_vectors: DMatrix::zeros(0, 0),
        }
    }

    /// Ritz vector `V y_i` in the original space (real and imaginary parts)
    pub fn eigenvector(&self, i: usize) -> (DVector<f64>, DVector<f64>) {
        let n = self.basis.first().map_or(0, |v| v.len());
        let mut re = DVector::zeros(n);
        let mut im = DVector::zeros(n);

        for (row, v) in self.basis.iter().enumerate() {
            let y = self.ritz_vectors[(row, i)];
            re.axpy(y.re, v, 1.0);
            im.axpy(y.im, v, 1.0);
        }

        (re, im)
    }
}

/// Eigen-decomposition of the projected matrix
struct RitzDecomposition {
    values: Vec<Complex64>,
    /// unit-norm eigenvectors as columns, phase fixed so the largest component is real positive
    vectors: DMatrix<Complex64>,
}

pub(crate) fn krylov_schur(op: &StOperator, params: &KrylovSchurParams) -> KrylovSolution {
    let n = op.dim();
    if n == 0 || params.nev == 0 {
        return KrylovSolution::empty();
    }

    let nev = params.nev.min(n);
    let m = params.ncv.max(nev + 1).min(n);

    let mut rng = StdRng::seed_from_u64(START_VECTOR_SEED);
    let mut basis: Vec<DVector<f64>> = Vec::with_capacity(m + 1);
    let v0 = random_orthonormal(n, &basis, &mut rng).unwrap_or_else(|| unit_vector(n, 0));
    basis.push(v0);

    let mut h = DMatrix::<f64>::zeros(m, m);
    let mut kept = 0;
    let mut iterations = 0;

    loop {
        iterations += 1;

        let mut beta = arnoldi_expand(op, &mut basis, &mut h, kept, m, &mut rng);
        if m == n {
            // the basis spans the whole space
            beta = 0.0;
        }

        let ritz = ritz_decomposition(&h, params.problem_type);
        let lambdas: Vec<Complex64> = ritz.values.iter().map(|&t| op.back_transform(t)).collect();

        let mut order: Vec<usize> = (0..m).collect();
        order.sort_by(|&a, &b| params.which.compare(lambdas[a], lambdas[b], params.target));

        let residuals: Vec<f64> = order
            .iter()
            .map(|&i| beta * ritz.vectors[(m - 1, i)].norm())
            .collect();

        let nconv = order
            .iter()
            .zip(residuals.iter())
            .take_while(|&(&i, &res)| {
                params
                    .conv_test
                    .is_converged(res, ritz.values[i], params.tol, params.norm_a)
            })
            .count();

        trace!(
            "krylov-schur restart {}: {} of {} wanted pairs converged",
            iterations,
            nconv,
            nev
        );

        if nconv >= nev || iterations >= params.max_it {
            let reason = if nconv >= nev {
                ConvergedReason::Converged
            } else {
                ConvergedReason::DivergedIterations
            };
            debug!(
                "krylov-schur stopped after {} restarts ({}); nconv = {}",
                iterations, reason, nconv
            );

            let ritz_vectors = DMatrix::from_fn(m, m, |r, c| ritz.vectors[(r, order[c])]);
            basis.truncate(m);

            return KrylovSolution {
                eigenvalues: order.iter().map(|&i| lambdas[i]).collect(),
                residuals,
                nconv,
                iterations,
                reason,
                basis,
                ritz_vectors,
            };
        }

        // thick restart onto the leading wanted Ritz vectors
        let keep = (nconv + (m - nconv) / 2).clamp(1, m - 1);
        let z = restart_vectors(&ritz, &order, keep, m);
        let q = z.qr().q();
        let p = q.ncols();

        let h_kept = q.transpose() * &h * &q;
        let coupling = q.row(m - 1) * beta;

        let residual_direction = basis[m].clone();
        let mut compressed: Vec<DVector<f64>> = (0..p)
            .map(|c| {
                let mut v = DVector::zeros(n);
                for (row, b) in basis.iter().take(m).enumerate() {
                    v.axpy(q[(row, c)], b, 1.0);
                }
                v
            })
            .collect();
        compressed.push(residual_direction);
        basis = compressed;

        h.fill(0.0);
        h.slice_mut((0, 0), (p, p)).copy_from(&h_kept);
        for c in 0..p {
            h[(p, c)] = coupling[c];
        }
        kept = p;
    }
}

/// Expand the Krylov relation from column `start` up to `m` columns. Returns the norm of the
/// final residual; `basis` ends with `m + 1` vectors, the last being the residual direction.
fn arnoldi_expand(
    op: &StOperator,
    basis: &mut Vec<DVector<f64>>,
    h: &mut DMatrix<f64>,
    start: usize,
    m: usize,
    rng: &mut StdRng,
) -> f64 {
    let n = op.dim();
    let mut w = DVector::zeros(n);
    let mut beta = 0.0;

    basis.truncate(start + 1);
    for j in start..m {
        op.apply(&basis[j], &mut w);
        let norm_before = w.norm();

        let coeffs = orthogonalize(&basis[..=j], &mut w);
        for (i, c) in coeffs.iter().enumerate() {
            h[(i, j)] = *c;
        }

        beta = w.norm();
        let next = if beta > BREAKDOWN_TOL * norm_before {
            w.unscale(beta)
        } else {
            debug!("krylov-schur found an invariant subspace of dimension {}", j + 1);
            beta = 0.0;
            random_orthonormal(n, basis, rng).unwrap_or_else(|| DVector::zeros(n))
        };

        if j + 1 < m {
            h[(j + 1, j)] = beta;
        }
        basis.push(next);
    }

    beta
}

/// Classical Gram-Schmidt, applied twice. Returns the accumulated projection coefficients.
fn orthogonalize(basis: &[DVector<f64>], w: &mut DVector<f64>) -> Vec<f64> {
    let mut coeffs = vec![0.0; basis.len()];

    for _ in 0..2 {
        let projections: Vec<f64> = basis.iter().map(|v| v.dot(w)).collect();
        for ((v, p), c) in basis.iter().zip(projections.iter()).zip(coeffs.iter_mut()) {
            w.axpy(-*p, v, 1.0);
            *c += *p;
        }
    }

    coeffs
}

fn random_orthonormal(
    n: usize,
    basis: &[DVector<f64>],
    rng: &mut StdRng,
) -> Option<DVector<f64>> {
    if basis.len() >= n {
        return None;
    }

    for _ in 0..MAX_RANDOM_ATTEMPTS {
        let mut v = DVector::from_fn(n, |_, _| rng.gen::<f64>() - 0.5);
        let norm_before = v.norm();
        orthogonalize(basis, &mut v);
        let norm = v.norm();
        if norm > 1e-8 * norm_before {
            return Some(v.unscale(norm));
        }
    }

    None
}

fn unit_vector(n: usize, i: usize) -> DVector<f64> {
    let mut v = DVector::zeros(n);
    v[i] = 1.0;
    v
}

fn ritz_decomposition(h: &DMatrix<f64>, problem_type: ProblemType) -> RitzDecomposition {
    match problem_type {
        ProblemType::Hermitian => {
            let symmetric = (h + h.transpose()) * 0.5;
            let eigen = SymmetricEigen::new(symmetric);
            RitzDecomposition {
                values: eigen
                    .eigenvalues
                    .iter()
                    .map(|&v| Complex64::new(v, 0.0))
                    .collect(),
                vectors: eigen.eigenvectors.map(|v| Complex64::new(v, 0.0)),
            }
        }
        ProblemType::NonHermitian => {
            let (q, t) = Schur::new(h.map(|v| Complex64::new(v, 0.0))).unpack();
            let y = triangular_eigenvectors(&t);
            let mut vectors = q * y;
            fix_phase(&mut vectors);

            RitzDecomposition {
                values: t.diagonal().iter().copied().collect(),
                vectors,
            }
        }
    }
}

/// Eigenvectors of an upper triangular matrix by back substitution (one per diagonal entry)
fn triangular_eigenvectors(t: &DMatrix<Complex64>) -> DMatrix<Complex64> {
    let m = t.nrows();
    let scale = t.iter().map(|v| v.norm()).fold(0.0, f64::max).max(f64::MIN_POSITIVE);
    let smallest_pivot = f64::EPSILON * scale;

    let mut y = DMatrix::<Complex64>::zeros(m, m);
    for i in 0..m {
        let lambda = t[(i, i)];
        y[(i, i)] = Complex64::new(1.0, 0.0);

        for r in (0..i).rev() {
            let mut sum = Complex64::new(0.0, 0.0);
            for c in r + 1..=i {
                sum += t[(r, c)] * y[(c, i)];
            }
            let mut pivot = t[(r, r)] - lambda;
            if pivot.norm() < smallest_pivot {
                pivot = Complex64::new(smallest_pivot, 0.0);
            }
            y[(r, i)] = -sum / pivot;
        }
    }

    y
}

/// Normalize each column and rotate it so its largest entry is real and positive
fn fix_phase(vectors: &mut DMatrix<Complex64>) {
    for c in 0..vectors.ncols() {
        let mut column = vectors.column_mut(c);
        let norm = column.iter().map(|v| v.norm_sqr()).sum::<f64>().sqrt();
        if norm == 0.0 {
            continue;
        }

        let largest = column
            .iter()
            .copied()
            .fold(Complex64::new(0.0, 0.0), |acc, v| if v.norm() > acc.norm() { v } else { acc });
        let rotation = largest.conj() / (largest.norm() * norm);

        for v in column.iter_mut() {
            *v *= rotation;
        }
    }
}

/// Real basis for the invariant subspace of `H` spanned by the first `keep` wanted Ritz vectors
fn restart_vectors(
    ritz: &RitzDecomposition,
    order: &[usize],
    keep: usize,
    m: usize,
) -> DMatrix<f64> {
    let mut columns: Vec<DVector<f64>> = Vec::with_capacity(keep + 1);
    let mut complex_taken: Vec<Complex64> = Vec::new();

    for &i in order {
        if columns.len() >= keep {
            break;
        }

        let theta = ritz.values[i];
        let y = ritz.vectors.column(i);
        let scale = theta.norm().max(1.0);

        if theta.im.abs() <= REAL_RITZ_TOL * scale {
            columns.push(y.map(|c| c.re));
        } else {
            // the conjugate partner is already represented
            if complex_taken
                .iter()
                .any(|t| (*t - theta.conj()).norm() <= REAL_RITZ_TOL * scale)
            {
                continue;
            }
            if columns.len() + 2 > m - 1 {
                break;
            }
            columns.push(y.map(|c| c.re));
            columns.push(y.map(|c| c.im));
            complex_taken.push(theta);
        }
    }

    if columns.is_empty() {
        columns.push(ritz.vectors.column(order[0]).map(|c| c.re + c.im));
    }

    DMatrix::from_columns(&columns)
}
