//! Bound-aware Newton iteration.
//!
//! Each step solves the sparse linear system on the exact symbolic
//! Jacobian, then relaxes the step length so every bound expression stays
//! strictly positive, applies the update, and lets the contributions'
//! relax hooks project the new state onto their physical branches.

use crate::error::{SolverError, SolverResult};
use crate::linalg::{near_null_variables, FaerLu, LinearBackend};
use pm_core::{first_non_finite, log_max_error, max_abs_entry};
use pm_model::NumericHandler;
use std::fmt;
use std::io;
use std::time::{Duration, Instant};
use tracing::debug;

/// Solver configuration.
#[derive(Clone, Copy, Debug)]
pub struct SolverConfig {
    /// Hard iteration budget.
    pub max_iterations: usize,
    /// Margin γ applied to the bound-limited step factor.
    pub bound_margin: f64,
    /// Step factors below this abort with `StepUnderflow`.
    pub alpha_min: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            bound_margin: 0.9,
            alpha_min: 1e-10,
        }
    }
}

/// One line of the iteration report.
#[derive(Debug, Clone)]
pub struct IterationRecord {
    pub iteration: usize,
    /// `log10 max_i |r_i|` of the scaled residuals.
    pub lmet: f64,
    /// Applied step factor; `None` on the converged evaluation.
    pub alpha: Option<f64>,
    pub wallclock: Duration,
    pub limiting_bound: Option<String>,
    pub max_residual: String,
}

/// Outcome of a completed `solve()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    Converged,
    /// The user callback returned `false`; the state keeps the last
    /// accepted step.
    Interrupted,
}

/// Iteration history plus the final state.
#[derive(Debug, Clone)]
pub struct SolveReport {
    pub status: SolveStatus,
    pub iterations: Vec<IterationRecord>,
    pub final_state: Vec<f64>,
}

impl SolveReport {
    pub fn converged(&self) -> bool {
        self.status == SolveStatus::Converged
    }

    /// Render the `Iter LMET Alpha Time Limit-on-bound Max-residual` table.
    pub fn write_table(&self, w: &mut dyn io::Write) -> io::Result<()> {
        writeln!(
            w,
            "{:>4}  {:>8}  {:>9}  {:>9}  {:<28}  {:<28}",
            "Iter", "LMET", "Alpha", "Time", "Limit on bound", "Max residual"
        )?;
        for rec in &self.iterations {
            let alpha = rec
                .alpha
                .map(|a| format!("{a:.3e}"))
                .unwrap_or_else(|| "-".to_string());
            writeln!(
                w,
                "{:>4}  {:>8.3}  {:>9}  {:>8.1?}  {:<28}  {:<28}",
                rec.iteration,
                rec.lmet,
                alpha,
                rec.wallclock,
                rec.limiting_bound.as_deref().unwrap_or("-"),
                rec.max_residual,
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for SolveReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = Vec::new();
        self.write_table(&mut buf).map_err(|_| fmt::Error)?;
        f.write_str(&String::from_utf8_lossy(&buf))
    }
}

/// Per-iteration user callback: `(record, x, handler) → continue?`.
pub type IterationCallback<'a> = dyn FnMut(&IterationRecord, &[f64], &NumericHandler) -> bool + 'a;

/// Newton solver over a numeric handler.
pub struct NewtonSolver<'a> {
    handler: &'a mut NumericHandler,
    config: SolverConfig,
    backend: Box<dyn LinearBackend>,
}

impl<'a> NewtonSolver<'a> {
    pub fn new(handler: &'a mut NumericHandler) -> Self {
        NewtonSolver {
            handler,
            config: SolverConfig::default(),
            backend: Box::new(FaerLu),
        }
    }

    pub fn with_config(mut self, config: SolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_backend(mut self, backend: Box<dyn LinearBackend>) -> Self {
        self.backend = backend;
        self
    }

    /// Iterate to convergence (`LMET < 0` on every scaled residual).
    pub fn solve(&mut self) -> SolverResult<SolveReport> {
        self.solve_with_callback(&mut |_, _, _| true)
    }

    /// Iterate with a user callback after every accepted step. A `false`
    /// return interrupts the solve; the report keeps the partial state.
    pub fn solve_with_callback(
        &mut self,
        callback: &mut (dyn FnMut(&IterationRecord, &[f64], &NumericHandler) -> bool),
    ) -> SolverResult<SolveReport> {
        let n = self.handler.n_vars();
        let m = self.handler.n_residuals();
        if n != m {
            return Err(SolverError::NonSquareSystem {
                residuals: m,
                variables: n,
            });
        }

        let mut iterations: Vec<IterationRecord> = Vec::new();
        let mut iteration = 0usize;
        // the state to fall back to when an accepted step turns out to
        // evaluate non-finite
        let mut last_accepted: Option<Vec<f64>> = None;

        loop {
            let tick = Instant::now();
            let residuals = self.handler.residuals()?;
            if let Err(e) = ensure_finite(&residuals, "residual vector") {
                if let Some(prev) = last_accepted {
                    self.handler.set_x(prev);
                }
                return Err(e);
            }

            let lmet = log_max_error(&residuals);
            let max_residual = max_abs_entry(&residuals)
                .map(|(idx, _)| self.handler.residual_names()[idx].clone())
                .unwrap_or_else(|| "-".to_string());

            if lmet < 0.0 {
                let record = IterationRecord {
                    iteration,
                    lmet,
                    alpha: None,
                    wallclock: tick.elapsed(),
                    limiting_bound: None,
                    max_residual,
                };
                debug!(iteration, lmet, "converged");
                iterations.push(record);
                return Ok(SolveReport {
                    status: SolveStatus::Converged,
                    iterations,
                    final_state: self.handler.x().to_vec(),
                });
            }
            if iteration >= self.config.max_iterations {
                return Err(SolverError::IterationLimit {
                    iterations: self.config.max_iterations,
                });
            }

            let jac = self.handler.residual_jacobian()?;
            if let Err(e) = ensure_finite(&jac.values, "residual Jacobian") {
                if let Some(prev) = last_accepted {
                    self.handler.set_x(prev);
                }
                return Err(e);
            }

            let rhs: Vec<f64> = residuals.iter().map(|r| -r).collect();
            let dx = match self.backend.solve(&jac, &rhs) {
                Ok(dx) => dx,
                Err(SolverError::Linear { .. }) => {
                    let variables = near_null_variables(&jac)
                        .into_iter()
                        .map(|i| self.handler.x_names()[i].clone())
                        .collect();
                    return Err(SolverError::SingularJacobian { variables });
                }
                Err(other) => return Err(other),
            };

            // Bound-limited step factor.
            let bounds = self.handler.bounds()?;
            let jb = self.handler.bound_jacobian()?;
            let db = jb.matvec(&dx);
            let mut alpha_bound = f64::INFINITY;
            let mut limiting_bound = None;
            for (i, (&b_i, &db_i)) in bounds.iter().zip(&db).enumerate() {
                if db_i < 0.0 {
                    let ratio = -b_i / db_i;
                    if ratio < alpha_bound {
                        alpha_bound = ratio;
                        limiting_bound = Some(self.handler.bound_names()[i].clone());
                    }
                }
            }
            let alpha = 1.0_f64.min(self.config.bound_margin * alpha_bound);
            if alpha < self.config.alpha_min {
                return Err(SolverError::StepUnderflow { alpha, iteration });
            }

            let previous: Vec<f64> = self.handler.x().to_vec();
            let stepped: Vec<f64> = previous
                .iter()
                .zip(&dx)
                .map(|(x, d)| x + alpha * d)
                .collect();
            self.handler.set_x(stepped);
            if let Err(e) = self.handler.relax() {
                self.handler.set_x(previous);
                return Err(e.into());
            }

            let record = IterationRecord {
                iteration,
                lmet,
                alpha: Some(alpha),
                wallclock: tick.elapsed(),
                limiting_bound,
                max_residual,
            };
            debug!(
                iteration,
                lmet,
                alpha,
                limiting = record.limiting_bound.as_deref().unwrap_or("-"),
                "newton step"
            );
            let go_on = callback(&record, self.handler.x(), self.handler);
            iterations.push(record);
            if !go_on {
                debug!(iteration, "interrupted by callback");
                return Ok(SolveReport {
                    status: SolveStatus::Interrupted,
                    iterations,
                    final_state: self.handler.x().to_vec(),
                });
            }
            last_accepted = Some(previous);
            iteration += 1;
        }
    }
}

fn ensure_finite(values: &[f64], what: &str) -> SolverResult<()> {
    if let Some((idx, value)) = first_non_finite(values) {
        return Err(SolverError::NumericBreak {
            what: format!("{what} entry {idx} is {value}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_contract() {
        let config = SolverConfig::default();
        assert_eq!(config.bound_margin, 0.9);
        assert!(config.max_iterations > 0);
    }
}
