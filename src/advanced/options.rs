use std::fs::read_to_string;
use std::path::Path;

use json::JsonValue;

use crate::error::{EigsysError, Result};
use crate::solver::Which;

/// Selection parameters of a general eigenvalue solve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AeigsysOptions {
    /// Portion of the spectrum to compute; ignored when `sigma` is set
    pub which: Which,
    /// Target value; forces [`Which::TargetMagnitude`]
    pub sigma: Option<f64>,
    /// Is the matrix symmetric
    pub isherm: bool,
    /// Return every converged eigenvalue instead of exactly `k`
    pub extra_evals: bool,
}

impl Default for AeigsysOptions {
    fn default() -> Self {
        Self {
            which: Which::LargestMagnitude,
            sigma: None,
            isherm: true,
            extra_evals: false,
        }
    }
}

impl AeigsysOptions {
    /// Default options selecting the spectrum by its two letter tag
    pub fn with_tag(which: &str) -> Result<Self> {
        Ok(Self {
            which: which.parse()?,
            ..Self::default()
        })
    }

    /// Read options from a JSON object; missing keys keep their defaults
    ///
    /// ``` json
    /// {
    ///     "which": "SR",
    ///     "sigma": 0.25,
    ///     "isherm": false,
    ///     "extra_evals": true
    /// }
    /// ```
    pub fn from_json(options: &JsonValue) -> Result<Self> {
        expect_object(options)?;
        let defaults = Self::default();

        let which = match optional_str(options, "which")? {
            Some(tag) => tag.parse()?,
            None => defaults.which,
        };

        Ok(Self {
            which,
            sigma: optional_f64(options, "sigma")?,
            isherm: optional_bool(options, "isherm")?.unwrap_or(defaults.isherm),
            extra_evals: optional_bool(options, "extra_evals")?.unwrap_or(defaults.extra_evals),
        })
    }

    /// Read options from a JSON file (see [`AeigsysOptions::from_json`])
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = read_to_string(path)?;
        Self::from_json(&json::parse(&contents)?)
    }
}

/// Parameters of a shift-and-invert eigenvalue solve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InternalOptions {
    /// Eigenvalues closest to this value are computed
    pub sigma: f64,
    /// Convergence tolerance; the solver default when `None`
    pub tol: Option<f64>,
    /// Return every converged eigenvalue instead of exactly `k`
    pub extra_evals: bool,
}

impl Default for InternalOptions {
    fn default() -> Self {
        Self {
            sigma: 0.0,
            tol: None,
            extra_evals: false,
        }
    }
}

impl InternalOptions {
    pub fn with_sigma(sigma: f64) -> Self {
        Self {
            sigma,
            ..Self::default()
        }
    }

    /// Read options from a JSON object; missing keys keep their defaults
    ///
    /// ``` json
    /// {
    ///     "sigma": 1.5,
    ///     "tol": 1e-10,
    ///     "extra_evals": false
    /// }
    /// ```
    pub fn from_json(options: &JsonValue) -> Result<Self> {
        expect_object(options)?;
        let defaults = Self::default();

        let tol = optional_f64(options, "tol")?;
        if let Some(tol) = tol {
            if tol.is_nan() || tol <= 0.0 {
                return Err(EigsysError::InvalidArgument(format!(
                    "'tol' must be positive; found {}",
                    tol
                )));
            }
        }

        Ok(Self {
            sigma: optional_f64(options, "sigma")?.unwrap_or(defaults.sigma),
            tol,
            extra_evals: optional_bool(options, "extra_evals")?.unwrap_or(defaults.extra_evals),
        })
    }

    /// Read options from a JSON file (see [`InternalOptions::from_json`])
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = read_to_string(path)?;
        Self::from_json(&json::parse(&contents)?)
    }
}

fn expect_object(options: &JsonValue) -> Result<()> {
    if options.is_object() {
        Ok(())
    } else {
        Err(EigsysError::InvalidArgument(
            "solver options must be a JSON object".to_string(),
        ))
    }
}

fn wrong_type(key: &str, expected: &str) -> EigsysError {
    EigsysError::InvalidArgument(format!("option '{}' must be {}", key, expected))
}

fn optional_f64(options: &JsonValue, key: &str) -> Result<Option<f64>> {
    let value = &options[key];
    if value.is_null() {
        return Ok(None);
    }
    value
        .as_f64()
        .map(Some)
        .ok_or_else(|| wrong_type(key, "a number"))
}

fn optional_bool(options: &JsonValue, key: &str) -> Result<Option<bool>> {
    let value = &options[key];
    if value.is_null() {
        return Ok(None);
    }
    value
        .as_bool()
        .map(Some)
        .ok_or_else(|| wrong_type(key, "true or false"))
}

fn optional_str<'a>(options: &'a JsonValue, key: &str) -> Result<Option<&'a str>> {
    let value = &options[key];
    if value.is_null() {
        return Ok(None);
    }
    value
        .as_str()
        .map(Some)
        .ok_or_else(|| wrong_type(key, "a string"))
}
