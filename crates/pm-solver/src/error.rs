//! Error types for solver operations.

use pm_model::ModelError;
use thiserror::Error;

/// Errors that terminate a `solve()` call. The handler's state vector is
/// left at the last accepted step in every case.
#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Non-square system: {residuals} residuals for {variables} variables")]
    NonSquareSystem { residuals: usize, variables: usize },

    #[error("Singular Jacobian; likely offending variables: {}", variables.join(", "))]
    SingularJacobian { variables: Vec<String> },

    #[error("Iteration limit of {iterations} reached")]
    IterationLimit { iterations: usize },

    #[error("Step factor underflow (alpha = {alpha:.3e}) at iteration {iteration}")]
    StepUnderflow { alpha: f64, iteration: usize },

    #[error("Numeric break: {what}")]
    NumericBreak { what: String },

    #[error("Linear solve failed: {what}")]
    Linear { what: String },

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type SolverResult<T> = Result<T, SolverError>;
