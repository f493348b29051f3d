//! pm-solver: bound-aware Newton solver for flattened process models.
//!
//! Consumes the symbolic Jacobians of the residual and bound vectors from a
//! [`pm_model::NumericHandler`], relaxes every step so the model stays
//! strictly inside its domain, and reports per-iteration diagnostics.

pub mod error;
pub mod linalg;
pub mod newton;

pub use error::{SolverError, SolverResult};
pub use linalg::{init_parallelism, DenseLu, FaerLu, LinearBackend};
pub use newton::{
    IterationCallback, IterationRecord, NewtonSolver, SolveReport, SolveStatus, SolverConfig,
};
