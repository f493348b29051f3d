//! pm-core: stable foundation for procmod.
//!
//! Contains:
//! - nested (nested string-keyed trees + flatten/unflatten transforms)
//! - mcounter (mergeable sparse counters for symbolic assembly)
//! - numeric (residual-vector diagnostics: worst entry, non-finite entries)
//! - error (shared error types)

pub mod error;
pub mod mcounter;
pub mod nested;
pub mod numeric;

pub use error::{CoreError, CoreResult};
pub use mcounter::MCounter;
pub use nested::{flatten_dictionary, unflatten_dictionary, Nested};
pub use numeric::*;
