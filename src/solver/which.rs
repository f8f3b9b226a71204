use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use num_complex::Complex64;

use crate::error::EigsysError;

/// Which portion of the spectrum to compute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Which {
    /// `"LM"`: largest magnitude
    LargestMagnitude,
    /// `"SM"`: smallest magnitude
    SmallestMagnitude,
    /// `"LR"`: largest real part
    LargestReal,
    /// `"SR"`: smallest real part
    SmallestReal,
    /// `"LI"`: largest imaginary part
    LargestImaginary,
    /// `"SI"`: smallest imaginary part
    SmallestImaginary,
    /// `"TM"`: closest to the target in magnitude
    TargetMagnitude,
    /// `"TR"`: real part closest to the target
    TargetReal,
    /// `"TI"`: imaginary part closest to the target
    TargetImaginary,
}

impl Which {
    pub const ALL: [Which; 9] = [
        Which::LargestMagnitude,
        Which::SmallestMagnitude,
        Which::LargestReal,
        Which::SmallestReal,
        Which::LargestImaginary,
        Which::SmallestImaginary,
        Which::TargetMagnitude,
        Which::TargetReal,
        Which::TargetImaginary,
    ];

    /// Two letter tag used by the option files and the string API
    pub fn tag(&self) -> &'static str {
        match self {
            Self::LargestMagnitude => "LM",
            Self::SmallestMagnitude => "SM",
            Self::LargestReal => "LR",
            Self::SmallestReal => "SR",
            Self::LargestImaginary => "LI",
            Self::SmallestImaginary => "SI",
            Self::TargetMagnitude => "TM",
            Self::TargetReal => "TR",
            Self::TargetImaginary => "TI",
        }
    }

    pub fn is_target_based(&self) -> bool {
        matches!(
            self,
            Self::TargetMagnitude | Self::TargetReal | Self::TargetImaginary
        )
    }

    /// Order two eigenvalues: `Less` means `a` is wanted before `b`.
    ///
    /// Ties on the criterion are broken by real part then imaginary part (both descending)
    /// so that sorting is deterministic.
    pub fn compare(&self, a: Complex64, b: Complex64, target: f64) -> Ordering {
        let primary = match self {
            Self::LargestMagnitude => cmp_f64(b.norm(), a.norm()),
            Self::SmallestMagnitude => cmp_f64(a.norm(), b.norm()),
            Self::LargestReal => cmp_f64(b.re, a.re),
            Self::SmallestReal => cmp_f64(a.re, b.re),
            Self::LargestImaginary => cmp_f64(b.im, a.im),
            Self::SmallestImaginary => cmp_f64(a.im, b.im),
            Self::TargetMagnitude => cmp_f64((a - target).norm(), (b - target).norm()),
            Self::TargetReal => cmp_f64((a.re - target).abs(), (b.re - target).abs()),
            Self::TargetImaginary => cmp_f64(a.im.abs(), b.im.abs()),
        };

        primary
            .then_with(|| cmp_f64(b.re, a.re))
            .then_with(|| cmp_f64(b.im, a.im))
    }
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

impl FromStr for Which {
    type Err = EigsysError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|w| w.tag() == tag)
            .copied()
            .ok_or_else(|| {
                EigsysError::InvalidArgument(format!(
                    "'{}' is not an eigenvalue selection criterion (expected one of LM, SM, LR, SR, LI, SI, TM, TR, TI)",
                    tag
                ))
            })
    }
}

impl fmt::Display for Which {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Symmetry of the standard eigenproblem Ax = λx
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemType {
    /// A is symmetric (Hermitian); the spectrum is real
    Hermitian,
    /// No symmetry assumed
    NonHermitian,
}

impl ProblemType {
    pub fn from_hermitian_flag(isherm: bool) -> Self {
        if isherm {
            Self::Hermitian
        } else {
            Self::NonHermitian
        }
    }
}

/// Eigensolver method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpsType {
    KrylovSchur,
}

/// How a Ritz pair's residual estimate is judged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceTest {
    /// residual <= tol
    Absolute,
    /// residual <= tol * |θ|
    Relative,
    /// residual <= tol * ||A||_inf
    Norm,
}

impl ConvergenceTest {
    pub fn is_converged(&self, residual: f64, ritz_value: Complex64, tol: f64, norm_a: f64) -> bool {
        match self {
            Self::Absolute => residual <= tol,
            Self::Relative => residual <= tol * ritz_value.norm(),
            Self::Norm => residual <= tol * norm_a,
        }
    }
}

/// Why the last solve stopped iterating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergedReason {
    /// At least the requested number of eigenpairs converged
    Converged,
    /// The restart limit was reached first
    DivergedIterations,
}

impl fmt::Display for ConvergedReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Converged => write!(f, "converged"),
            Self::DivergedIterations => write!(f, "diverged_its"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    fn sorted(which: Which, target: f64) -> Vec<Complex64> {
        let mut values = vec![c(-3.0, 0.0), c(0.5, 2.0), c(0.5, -2.0), c(1.0, 0.0), c(2.5, 0.0)];
        values.sort_by(|a, b| which.compare(*a, *b, target));
        values
    }

    #[test]
    fn parse_every_tag() {
        for which in Which::ALL.iter() {
            assert_eq!(which.tag().parse::<Which>().unwrap(), *which);
            assert_eq!(format!("{}", which), which.tag());
        }
    }

    #[test]
    fn reject_unknown_tag() {
        assert!(matches!(
            "XX".parse::<Which>(),
            Err(EigsysError::InvalidArgument(_))
        ));
        assert!("lm".parse::<Which>().is_err());
        assert!("".parse::<Which>().is_err());
    }

    #[test]
    fn extremal_orderings() {
        assert_eq!(sorted(Which::LargestMagnitude, 0.0)[0], c(-3.0, 0.0));
        assert_eq!(sorted(Which::SmallestMagnitude, 0.0)[0], c(1.0, 0.0));
        assert_eq!(sorted(Which::LargestReal, 0.0)[0], c(2.5, 0.0));
        assert_eq!(sorted(Which::SmallestReal, 0.0)[0], c(-3.0, 0.0));
        assert_eq!(sorted(Which::LargestImaginary, 0.0)[0], c(0.5, 2.0));
        assert_eq!(sorted(Which::SmallestImaginary, 0.0)[0], c(0.5, -2.0));
    }

    #[test]
    fn target_orderings() {
        let tm = sorted(Which::TargetMagnitude, 2.0);
        assert_eq!(tm[0], c(2.5, 0.0));
        assert_eq!(tm[1], c(1.0, 0.0));

        // both complex values have real part 0.5; tie broken by imaginary part
        let tr = sorted(Which::TargetReal, 0.4);
        assert_eq!(tr[0], c(0.5, 2.0));
        assert_eq!(tr[1], c(0.5, -2.0));

        let ti = sorted(Which::TargetImaginary, 0.0);
        assert_eq!(ti[0], c(2.5, 0.0));
        assert_eq!(ti[4], c(0.5, -2.0));
    }

    #[test]
    fn convergence_tests() {
        let theta = c(10.0, 0.0);
        assert!(ConvergenceTest::Absolute.is_converged(1e-9, theta, 1e-8, 1.0));
        assert!(!ConvergenceTest::Absolute.is_converged(1e-7, theta, 1e-8, 1.0));
        assert!(ConvergenceTest::Relative.is_converged(5e-8, theta, 1e-8, 1.0));
        assert!(ConvergenceTest::Norm.is_converged(1e-6, theta, 1e-8, 1e3));
        assert!(!ConvergenceTest::Norm.is_converged(1e-6, theta, 1e-8, 1.0));
    }
}
