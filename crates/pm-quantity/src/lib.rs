//! pm-quantity: dimensioned scalar quantities over numeric or symbolic
//! magnitudes.
//!
//! A [`Quantity`] pairs a magnitude (a plain `f64` or a [`pm_expr::Expr`]
//! node, through the shared [`Magnitude`] trait) with a [`Dimension`], a
//! vector of rational exponents over the seven SI base units. All storage and
//! arithmetic is in offset-free base SI; display units and offsets exist only
//! in the [`unit`] registry at the I/O boundary.
//!
//! Contains:
//! - dim (rational exponents, dimensional algebra)
//! - unit (unit registry, quantity-string parsing and formatting)
//! - quantity (`Quantity<M>`, the `Magnitude` trait)
//! - qdict (species-keyed quantity dictionaries)
//! - qfunction (compiled callables over nested quantity dictionaries)
//! - error

pub mod dim;
pub mod error;
pub mod qdict;
pub mod qfunction;
pub mod quantity;
pub mod unit;

pub use dim::{Dimension, Rat};
pub use error::{QuantityError, QuantityResult};
pub use qdict::QuantityDict;
pub use qfunction::QFunction;
pub use quantity::{Magnitude, NumQuantity, Quantity, SymQuantity};
pub use unit::{
    format_quantity, parse_quantities_in_struct, parse_quantity, unit_registry, UnitDef,
    UnitRegistry,
};
