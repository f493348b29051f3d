//! pm-model: hierarchical model graph and the flat numeric problem.
//!
//! Models declare their interface (parameters, properties, material ports,
//! child slots), then build symbolic expressions in a bottom-up define pass.
//! Flattening produces disjoint namespaces with `parent/child/leaf`
//! qualified names; the numeric handler assembles the state, residual and
//! bound vectors with their sparse Jacobians.

pub mod build;
pub mod error;
pub mod model;
pub mod numeric;

pub use build::{flatten, DefineContext, FlatModel};
pub use error::{ModelError, ModelResult};
pub use model::{Interface, ProcessModel};
pub use numeric::NumericHandler;
