//! Pluggable sparse linear backends.
//!
//! The contract is `solve(A: CSC, b) -> x`. The reference backend is faer's
//! direct sparse LU with its parallel factorization and triangular solves;
//! the fallback is a single-threaded dense LU through nalgebra, which also
//! powers the near-null-vector diagnostics when a factorization reports a
//! singular matrix.

use crate::error::{SolverError, SolverResult};
use faer::linalg::solvers::Solve;
use faer::sparse::linalg::solvers::{Lu, SymbolicLu};
use faer::sparse::{SparseColMat, Triplet};
use nalgebra::{DMatrix, DVector};
use pm_expr::CscMatrix;
use std::num::NonZeroUsize;
use std::sync::OnceLock;

/// A direct linear solver consuming the canonical CSC format.
pub trait LinearBackend {
    fn name(&self) -> &'static str;
    fn solve(&self, a: &CscMatrix, b: &[f64]) -> SolverResult<Vec<f64>>;
}

/// Reference backend: faer sparse LU. Factorization and triangular solves
/// use faer's global parallelism (see [`init_parallelism`]).
#[derive(Default)]
pub struct FaerLu;

impl LinearBackend for FaerLu {
    fn name(&self) -> &'static str {
        "faer-sparse-lu"
    }

    fn solve(&self, a: &CscMatrix, b: &[f64]) -> SolverResult<Vec<f64>> {
        let mut triplets = Vec::with_capacity(a.nnz());
        for col in 0..a.ncols {
            for k in a.col_ptr[col]..a.col_ptr[col + 1] {
                triplets.push(Triplet::new(a.row_idx[k], col, a.values[k]));
            }
        }
        let mat = SparseColMat::<usize, f64>::try_new_from_triplets(a.nrows, a.ncols, &triplets)
            .map_err(|e| SolverError::Linear {
                what: format!("sparse assembly: {e:?}"),
            })?;
        let symbolic = SymbolicLu::try_new(mat.symbolic()).map_err(|e| SolverError::Linear {
            what: format!("symbolic factorization: {e:?}"),
        })?;
        let lu = Lu::try_new_with_symbolic(symbolic, mat.as_ref()).map_err(|e| {
            SolverError::Linear {
                what: format!("numeric factorization: {e:?}"),
            }
        })?;
        let rhs = faer::Mat::<f64>::from_fn(b.len(), 1, |i, _| b[i]);
        let sol = lu.solve(&rhs);
        let x: Vec<f64> = (0..b.len()).map(|i| sol[(i, 0)]).collect();
        if x.iter().any(|v| !v.is_finite()) {
            return Err(SolverError::Linear {
                what: "factorization produced non-finite solution".into(),
            });
        }
        Ok(x)
    }
}

/// Fallback backend: dense LU through nalgebra. Single-threaded.
#[derive(Default)]
pub struct DenseLu;

impl LinearBackend for DenseLu {
    fn name(&self) -> &'static str {
        "nalgebra-dense-lu"
    }

    fn solve(&self, a: &CscMatrix, b: &[f64]) -> SolverResult<Vec<f64>> {
        let dense = to_dense(a);
        let rhs = DVector::from_column_slice(b);
        let solution = dense.lu().solve(&rhs).ok_or(SolverError::Linear {
            what: "dense LU found a zero pivot".into(),
        })?;
        Ok(solution.iter().copied().collect())
    }
}

pub(crate) fn to_dense(a: &CscMatrix) -> DMatrix<f64> {
    let mut dense = DMatrix::zeros(a.nrows, a.ncols);
    for col in 0..a.ncols {
        for k in a.col_ptr[col]..a.col_ptr[col + 1] {
            dense[(a.row_idx[k], col)] = a.values[k];
        }
    }
    dense
}

/// Indices of the dominant entries of the right singular vector belonging
/// to the smallest singular value, i.e. the variables most likely involved in a
/// singular Jacobian.
pub(crate) fn near_null_variables(a: &CscMatrix) -> Vec<usize> {
    let dense = to_dense(a);
    let svd = dense.svd(false, true);
    let Some(v_t) = svd.v_t else {
        return Vec::new();
    };
    let mut smallest = 0usize;
    for (i, s) in svd.singular_values.iter().enumerate() {
        if *s < svd.singular_values[smallest] {
            smallest = i;
        }
    }
    let row = v_t.row(smallest);
    let max = row.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    if max == 0.0 {
        return Vec::new();
    }
    row.iter()
        .enumerate()
        .filter(|(_, v)| v.abs() > 0.3 * max)
        .map(|(i, _)| i)
        .collect()
}

static PARALLELISM: OnceLock<usize> = OnceLock::new();

/// Pin the global thread budget used by the sparse backend. Zero means all
/// available cores. Returns the effective count; only the first call takes
/// effect.
pub fn init_parallelism(threads: usize) -> usize {
    *PARALLELISM.get_or_init(|| {
        let target = if threads == 0 {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        } else {
            threads
        };
        let _ = rayon::ThreadPoolBuilder::new()
            .num_threads(target)
            .build_global();
        target
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system() -> (CscMatrix, Vec<f64>) {
        // [2 1; 1 3] x = [5; 10] => x = [1; 3]
        let a = CscMatrix::from_triplets(
            2,
            2,
            &[(0, 0, 2.0), (1, 0, 1.0), (0, 1, 1.0), (1, 1, 3.0)],
        );
        (a, vec![5.0, 10.0])
    }

    #[test]
    fn faer_solves_a_small_system() {
        let (a, b) = system();
        let x = FaerLu.solve(&a, &b).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn dense_fallback_agrees_with_faer() {
        let (a, b) = system();
        let x1 = FaerLu.solve(&a, &b).unwrap();
        let x2 = DenseLu.solve(&a, &b).unwrap();
        for (u, v) in x1.iter().zip(&x2) {
            assert!((u - v).abs() < 1e-12);
        }
    }

    #[test]
    fn singular_matrix_is_reported() {
        let a = CscMatrix::from_triplets(
            2,
            2,
            &[(0, 0, 1.0), (1, 0, 2.0), (0, 1, 2.0), (1, 1, 4.0)],
        );
        assert!(DenseLu.solve(&a, &[1.0, 2.0]).is_err());
        let vars = near_null_variables(&a);
        assert!(!vars.is_empty());
    }
}
