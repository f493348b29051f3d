//! pm-expr: symbolic expression graph with exact-derivative support.
//!
//! Expressions live in an arena graph behind a shared handle; arithmetic
//! builds new nodes bottom-up, so the graph is a DAG by construction.
//! Reverse-mode accumulation produces derivative *expressions* in the same
//! graph, which keeps Jacobian sparsity structural and lets one compiled tape
//! evaluate values and derivatives alike.
//!
//! Contains:
//! - graph (arena, `Expr` handles, operator overloads, constant folding)
//! - diff (reverse-mode symbolic Jacobians)
//! - compile (tape compilation and evaluation)
//! - sparse (compressed sparse column matrices, the one Jacobian format)
//! - error (graph error types)

pub mod compile;
pub mod diff;
pub mod error;
pub mod graph;
pub mod sparse;

pub use compile::{CompiledFn, CompiledJacobian};
pub use diff::jacobian;
pub use error::{ExprError, ExprResult};
pub use graph::{cond, Expr, Graph, NodeId, SymId};
pub use sparse::{CscMatrix, SparseExprMatrix};
