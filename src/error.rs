use thiserror::Error;

/// Result type alias using [`EigsysError`]
pub type Result<T> = std::result::Result<T, EigsysError>;

/// Errors produced while converting matrices, configuring, or running an eigensolve
#[derive(Error, Debug)]
pub enum EigsysError {
    /// An argument was outside of its accepted set of values
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Compressed-row arrays do not describe a valid matrix
    #[error("Malformed sparse matrix: {0}")]
    MalformedMatrix(String),

    /// LU factorization encountered a zero pivot
    #[error("Shifted operator is singular; zero pivot found in column {column}!")]
    SingularFactor { column: usize },

    /// Fewer eigenpairs converged than were requested
    #[error("Only {converged} of the {requested} requested eigenpairs converged!")]
    NotConverged { requested: usize, converged: usize },

    /// Solver was used before an operator was attached
    #[error("No operator has been attached to the eigensolver!")]
    MissingOperator,

    /// Failure reading or writing PETSc binary or options files
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Options file was not valid JSON
    #[error("Unable to parse options as JSON: {0}")]
    Json(#[from] json::Error),
}
