use log::{debug, info};
#[cfg(feature = "json_export")]
use json::{object, JsonValue};
use num_complex::Complex64;

use super::krylov_schur::{krylov_schur, KrylovSchurParams, KrylovSolution};
use super::st::SpectralTransform;
use super::which::{ConvergedReason, ConvergenceTest, EpsType, ProblemType, Which};
use crate::error::{EigsysError, Result};
use crate::linalg::AIJMatrix;

/// Tolerance used when none is set
pub const DEFAULT_TOLERANCE: f64 = 1e-8;

/// Eigenvalue Problem Solver
///
/// Owns its operator and the Krylov basis of the last solve. Both are released when the solver is
/// dropped (or explicitly with [`EigenSolver::destroy`]).
pub struct EigenSolver {
    eps_type: EpsType,
    problem_type: ProblemType,
    which: Which,
    target: f64,
    nev: usize,
    ncv: Option<usize>,
    tol: Option<f64>,
    max_it: Option<usize>,
    conv_test: ConvergenceTest,
    st: SpectralTransform,
    operator: Option<AIJMatrix>,
    solution: Option<KrylovSolution>,
}

impl Default for EigenSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl EigenSolver {
    pub fn new() -> Self {
        #[cfg(test)]
        tests::LIVE_SOLVERS.with(|live| live.set(live.get() + 1));

        Self {
            eps_type: EpsType::KrylovSchur,
            problem_type: ProblemType::NonHermitian,
            which: Which::LargestMagnitude,
            target: 0.0,
            nev: 1,
            ncv: None,
            tol: None,
            max_it: None,
            conv_test: ConvergenceTest::Relative,
            st: SpectralTransform::new(),
            operator: None,
            solution: None,
        }
    }

    pub fn set_type(&mut self, eps_type: EpsType) {
        self.eps_type = eps_type;
    }

    pub fn eps_type(&self) -> EpsType {
        self.eps_type
    }

    pub fn set_problem_type(&mut self, problem_type: ProblemType) {
        self.problem_type = problem_type;
    }

    pub fn problem_type(&self) -> ProblemType {
        self.problem_type
    }

    pub fn set_which_eigenpairs(&mut self, which: Which) {
        self.which = which;
    }

    pub fn which_eigenpairs(&self) -> Which {
        self.which
    }

    /// Value used by the target based selection criteria
    pub fn set_target(&mut self, target: f64) {
        self.target = target;
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    /// Number of requested eigenpairs and (optionally) the working subspace dimension
    pub fn set_dimensions(&mut self, nev: usize, ncv: Option<usize>) {
        self.nev = nev;
        self.ncv = ncv;
    }

    pub fn dimensions(&self) -> (usize, Option<usize>) {
        (self.nev, self.ncv)
    }

    /// Convergence tolerance and maximum number of restarts; `None` keeps the defaults
    pub fn set_tolerances(&mut self, tol: Option<f64>, max_it: Option<usize>) {
        self.tol = tol;
        self.max_it = max_it;
    }

    pub fn tolerances(&self) -> (f64, Option<usize>) {
        (self.tol.unwrap_or(DEFAULT_TOLERANCE), self.max_it)
    }

    pub fn set_convergence_test(&mut self, conv_test: ConvergenceTest) {
        self.conv_test = conv_test;
    }

    pub fn convergence_test(&self) -> ConvergenceTest {
        self.conv_test
    }

    pub fn set_st(&mut self, st: SpectralTransform) {
        self.st = st;
    }

    pub fn st(&self) -> &SpectralTransform {
        &self.st
    }

    /// Attach the operator of the standard eigenproblem Ax = λx. Discards any previous solution.
    pub fn set_operators(&mut self, a: AIJMatrix) {
        self.operator = Some(a);
        self.solution = None;
    }

    /// Run the Krylov-Schur iteration on the attached operator
    pub fn solve(&mut self) -> Result<()> {
        let matrix = self.operator.as_ref().ok_or(EigsysError::MissingOperator)?;
        if !matrix.is_square() {
            return Err(EigsysError::InvalidArgument(format!(
                "eigenproblems require a square operator; found {}x{}",
                matrix.rows(),
                matrix.cols()
            )));
        }
        if self.nev == 0 {
            return Err(EigsysError::InvalidArgument(
                "the number of requested eigenpairs must be positive".to_string(),
            ));
        }

        let n = matrix.rows();
        let nev = self.nev.min(n);
        let ncv = self
            .ncv
            .unwrap_or_else(|| (2 * nev).max(nev + 15))
            .max(nev + 1)
            .min(n);
        let max_it = self
            .max_it
            .unwrap_or_else(|| (2 * n / ncv.max(1)).max(100));

        let params = KrylovSchurParams {
            nev,
            ncv,
            max_it,
            tol: self.tol.unwrap_or(DEFAULT_TOLERANCE),
            which: self.which,
            target: self.target,
            problem_type: self.problem_type,
            conv_test: self.conv_test,
            norm_a: matrix.norm_inf(),
        };

        info!(
            "solving {:?} eigenproblem of dimension {} for {} ({}) eigenpairs; ncv = {}, st = {:?}, shift = {}",
            self.problem_type,
            n,
            self.nev,
            self.which,
            ncv,
            self.st.st_type(),
            self.st.shift()
        );

        let operator = self.st.setup(matrix)?;
        let solution = krylov_schur(&operator, &params);

        info!(
            "{} of {} requested eigenpairs converged after {} restarts ({})",
            solution.nconv, self.nev, solution.iterations, solution.reason
        );

        self.solution = Some(solution);
        Ok(())
    }

    /// Number of converged eigenpairs of the last solve
    pub fn converged(&self) -> usize {
        self.solution.as_ref().map_or(0, |s| s.nconv)
    }

    /// Number of restarts performed by the last solve
    pub fn iterations(&self) -> usize {
        self.solution.as_ref().map_or(0, |s| s.iterations)
    }

    pub fn converged_reason(&self) -> Option<ConvergedReason> {
        self.solution.as_ref().map(|s| s.reason)
    }

    /// The `i`th converged eigenvalue (in the order given by the selection criterion)
    pub fn eigenvalue(&self, i: usize) -> Result<Complex64> {
        let solution = self.converged_solution(i)?;
        Ok(solution.eigenvalues[i])
    }

    /// Residual estimate of the `i`th converged eigenpair
    pub fn error_estimate(&self, i: usize) -> Result<f64> {
        let solution = self.converged_solution(i)?;
        Ok(solution.residuals[i])
    }

    /// Real and imaginary parts of the `i`th converged eigenvector (unit 2-norm)
    pub fn eigenvector(&self, i: usize) -> Result<(Vec<f64>, Vec<f64>)> {
        let solution = self.converged_solution(i)?;
        let (re, im) = solution.eigenvector(i);
        Ok((re.data.into(), im.data.into()))
    }

    fn converged_solution(&self, i: usize) -> Result<&KrylovSolution> {
        match &self.solution {
            Some(solution) if i < solution.nconv => Ok(solution),
            Some(solution) => Err(EigsysError::InvalidArgument(format!(
                "eigenpair {} requested but only {} converged",
                i, solution.nconv
            ))),
            None => Err(EigsysError::InvalidArgument(
                "the eigensolver has not been solved".to_string(),
            )),
        }
    }

    /// Summary of the last solve
    pub fn report(&self) -> Option<SolveReport> {
        self.solution.as_ref().map(|s| SolveReport {
            requested: self.nev,
            converged: s.nconv,
            iterations: s.iterations,
            reason: s.reason,
            eigenvalues: s.eigenvalues[..s.nconv].to_vec(),
            error_estimates: s.residuals[..s.nconv].to_vec(),
        })
    }

    /// Release the operator, factorization and basis now
    pub fn destroy(self) {}
}

impl Drop for EigenSolver {
    fn drop(&mut self) {
        debug!(
            "releasing eigensolver (operator attached: {}, solved: {})",
            self.operator.is_some(),
            self.solution.is_some()
        );

        #[cfg(test)]
        tests::LIVE_SOLVERS.with(|live| live.set(live.get() - 1));
    }
}

/// Summary of an eigensolve
#[derive(Debug, Clone)]
pub struct SolveReport {
    pub requested: usize,
    pub converged: usize,
    pub iterations: usize,
    pub reason: ConvergedReason,
    /// converged eigenvalues, in selection order
    pub eigenvalues: Vec<Complex64>,
    pub error_estimates: Vec<f64>,
}

impl SolveReport {
    /// Produce a Json Object that describes this solve
    #[cfg(feature = "json_export")]
    pub fn to_json(&self) -> JsonValue {
        let eigenvalues = JsonValue::Array(
            self.eigenvalues
                .iter()
                .map(|lambda| object! { "re": lambda.re, "im": lambda.im })
                .collect(),
        );

        object! {
            "requested": self.requested,
            "converged": self.converged,
            "iterations": self.iterations,
            "reason": self.reason.to_string(),
            "eigenvalues": eigenvalues,
            "error_estimates": self.error_estimates.clone(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::linalg::CsrMatrix;
    use std::cell::Cell;
    use std::convert::TryFrom;

    thread_local! {
        /// Solvers created and not yet dropped on this thread
        pub(crate) static LIVE_SOLVERS: Cell<isize> = Cell::new(0);
    }

    pub(crate) fn live_solvers() -> isize {
        LIVE_SOLVERS.with(|live| live.get())
    }

    fn diagonal(values: &[f64]) -> AIJMatrix {
        AIJMatrix::try_from(&CsrMatrix::from_diagonal(values)).unwrap()
    }

    #[test]
    fn solve_without_operator() {
        let mut eps = EigenSolver::new();
        assert!(matches!(eps.solve(), Err(EigsysError::MissingOperator)));
    }

    #[test]
    fn solve_non_square() {
        let csr = CsrMatrix::new([2, 3], vec![0, 1, 2], vec![0, 1], vec![1.0, 1.0]).unwrap();
        let mut eps = EigenSolver::new();
        eps.set_operators(AIJMatrix::try_from(&csr).unwrap());
        assert!(matches!(eps.solve(), Err(EigsysError::InvalidArgument(_))));
    }

    #[test]
    fn default_configuration() {
        let eps = EigenSolver::new();
        assert_eq!(eps.eps_type(), EpsType::KrylovSchur);
        assert_eq!(eps.which_eigenpairs(), Which::LargestMagnitude);
        assert_eq!(eps.dimensions(), (1, None));
        assert_eq!(eps.tolerances(), (DEFAULT_TOLERANCE, None));
        assert_eq!(eps.converged(), 0);
        assert!(eps.report().is_none());
        assert!(eps.eigenvalue(0).is_err());
    }

    #[test]
    fn largest_magnitude_of_diagonal() {
        let mut eps = EigenSolver::new();
        eps.set_problem_type(ProblemType::Hermitian);
        eps.set_dimensions(2, None);
        eps.set_operators(diagonal(&[1.0, -9.0, 3.0, 4.0, 0.5, 8.0]));
        eps.solve().unwrap();

        assert!(eps.converged() >= 2);
        assert!((eps.eigenvalue(0).unwrap().re + 9.0).abs() < 1e-10);
        assert!((eps.eigenvalue(1).unwrap().re - 8.0).abs() < 1e-10);
        assert!(eps.error_estimate(0).unwrap() < DEFAULT_TOLERANCE);
        assert_eq!(eps.converged_reason(), Some(ConvergedReason::Converged));

        let (v, v_im) = eps.eigenvector(0).unwrap();
        assert!((v[1].abs() - 1.0).abs() < 1e-10);
        assert!(v_im.iter().all(|x| x.abs() < 1e-12));
    }

    #[test]
    fn resetting_operator_discards_solution() {
        let mut eps = EigenSolver::new();
        eps.set_operators(diagonal(&[1.0, 2.0]));
        eps.solve().unwrap();
        assert!(eps.converged() > 0);

        eps.set_operators(diagonal(&[3.0, 4.0]));
        assert_eq!(eps.converged(), 0);
    }

    #[test]
    fn drop_releases_solver() {
        let before = live_solvers();
        {
            let mut eps = EigenSolver::new();
            eps.set_operators(diagonal(&[1.0, 2.0, 3.0]));
            assert_eq!(live_solvers(), before + 1);
        }
        assert_eq!(live_solvers(), before);

        let eps = EigenSolver::new();
        eps.destroy();
        assert_eq!(live_solvers(), before);
    }

    #[cfg(feature = "json_export")]
    #[test]
    fn report_to_json() {
        use crate::linalg::SparseMatrix;

        let mut sm = SparseMatrix::square(3);
        sm.insert_group([([0, 0], 2.0), ([1, 1], 5.0), ([2, 2], -1.0)]);

        let mut eps = EigenSolver::new();
        eps.set_dimensions(1, None);
        eps.set_operators(AIJMatrix::try_from(&CsrMatrix::from(sm)).unwrap());
        eps.solve().unwrap();

        let report = eps.report().unwrap();
        let report_json = report.to_json();
        assert_eq!(report_json["requested"].as_usize(), Some(1));
        assert_eq!(report_json["reason"].as_str(), Some("converged"));
        assert!((report_json["eigenvalues"][0]["re"].as_f64().unwrap() - 5.0).abs() < 1e-10);
        assert_eq!(
            report_json["error_estimates"].len(),
            report.converged
        );
        assert!(report_json["eigenvalues"].is_array());
        assert_eq!(report_json["eigenvalues"].len(), report.converged);
        assert_eq!(report_json["eigenvalues"][0]["im"].as_f64(), Some(0.0));
    }

    #[test]
    fn operator_from_raw_arrays() {
        let a = AIJMatrix::new([3, 3], vec![0, 1, 2, 3], vec![0, 1, 2], vec![-2.0, 1.0, 6.0]).unwrap();

        let mut eps = EigenSolver::new();
        eps.set_operators(a);
        eps.solve().unwrap();
        assert!((eps.eigenvalue(0).unwrap().re - 6.0).abs() < 1e-10);
    }
}
