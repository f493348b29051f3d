//! Dimensioned quantities over numeric or symbolic magnitudes.

use crate::dim::{Dimension, Rat};
use crate::error::{QuantityError, QuantityResult};
use pm_expr::{Expr, Graph};
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// The arithmetic a magnitude must support. One implementation is plain
/// `f64`, the other a symbolic [`Expr`]; the unit-checking code above them is
/// shared, which is what keeps the numeric and symbolic paths identical.
///
/// Methods that introduce literals (`mul_f64`, …) take `&self` so the
/// symbolic implementation can allocate constants in its own graph.
pub trait Magnitude: Clone {
    fn add(&self, rhs: &Self) -> Self;
    fn sub(&self, rhs: &Self) -> Self;
    fn mul(&self, rhs: &Self) -> Self;
    fn div(&self, rhs: &Self) -> Self;
    fn neg(&self) -> Self;
    fn mul_f64(&self, f: f64) -> Self;
    fn powf(&self, e: f64) -> Self;
    fn ln(&self) -> Self;
    fn exp(&self) -> Self;
    fn sqrt(&self) -> Self;
    fn sq(&self) -> Self;
}

impl Magnitude for f64 {
    fn add(&self, rhs: &Self) -> Self {
        self + rhs
    }
    fn sub(&self, rhs: &Self) -> Self {
        self - rhs
    }
    fn mul(&self, rhs: &Self) -> Self {
        self * rhs
    }
    fn div(&self, rhs: &Self) -> Self {
        self / rhs
    }
    fn neg(&self) -> Self {
        -self
    }
    fn mul_f64(&self, f: f64) -> Self {
        self * f
    }
    fn powf(&self, e: f64) -> Self {
        f64::powf(*self, e)
    }
    fn ln(&self) -> Self {
        f64::ln(*self)
    }
    fn exp(&self) -> Self {
        f64::exp(*self)
    }
    fn sqrt(&self) -> Self {
        f64::sqrt(*self)
    }
    fn sq(&self) -> Self {
        self * self
    }
}

impl Magnitude for Expr {
    fn add(&self, rhs: &Self) -> Self {
        self + rhs
    }
    fn sub(&self, rhs: &Self) -> Self {
        self - rhs
    }
    fn mul(&self, rhs: &Self) -> Self {
        self * rhs
    }
    fn div(&self, rhs: &Self) -> Self {
        self / rhs
    }
    fn neg(&self) -> Self {
        -self
    }
    fn mul_f64(&self, f: f64) -> Self {
        self.scale(f)
    }
    fn powf(&self, e: f64) -> Self {
        Expr::powf(self, e)
    }
    fn ln(&self) -> Self {
        Expr::ln(self)
    }
    fn exp(&self) -> Self {
        Expr::exp(self)
    }
    fn sqrt(&self) -> Self {
        Expr::sqrt(self)
    }
    fn sq(&self) -> Self {
        Expr::sq(self)
    }
}

/// An immutable `(magnitude, dimension)` pair in base SI.
///
/// `+`, `-` and comparisons require equal dimensions; `*`, `/`, `powr` and
/// `sqrt` derive the result dimension; `ln`/`exp` demand dimensionless
/// input. A mismatch in operator position is a construction-time programming
/// bug and panics with the `DimensionMismatch` category; data-driven entry
/// points use [`Quantity::checked_add`]/[`Quantity::require_dim`] and return
/// `Result` instead.
#[derive(Debug, Clone)]
pub struct Quantity<M: Magnitude> {
    mag: M,
    dim: Dimension,
}

/// Numeric quantity (parameters, initial states, tolerances).
pub type NumQuantity = Quantity<f64>;
/// Symbolic quantity (everything inside frames and models).
pub type SymQuantity = Quantity<Expr>;

impl<M: Magnitude> Quantity<M> {
    pub fn new(mag: M, dim: Dimension) -> Self {
        Quantity { mag, dim }
    }

    pub fn dimensionless(mag: M) -> Self {
        Quantity {
            mag,
            dim: Dimension::NONE,
        }
    }

    pub fn magnitude(&self) -> M
    where
        M: Copy,
    {
        self.mag
    }

    pub fn mag_ref(&self) -> &M {
        &self.mag
    }

    pub fn into_magnitude(self) -> M {
        self.mag
    }

    pub fn dim(&self) -> Dimension {
        self.dim
    }

    fn assert_dim(&self, other: &Dimension, op: &str) {
        assert!(
            self.dim == *other,
            "DimensionMismatch in {op}: [{}] vs [{}]",
            self.dim,
            other
        );
    }

    /// Fallible addition for data-driven call sites.
    pub fn checked_add(&self, rhs: &Self) -> QuantityResult<Self> {
        if self.dim != rhs.dim {
            return Err(QuantityError::DimensionMismatch {
                context: "addition".into(),
                expected: format!("{}", self.dim),
                got: format!("{}", rhs.dim),
            });
        }
        Ok(Quantity::new(self.mag.add(&rhs.mag), self.dim))
    }

    /// Fail unless this quantity has dimension `dim`.
    pub fn require_dim(&self, dim: Dimension, context: &str) -> QuantityResult<()> {
        if self.dim != dim {
            return Err(QuantityError::DimensionMismatch {
                context: context.to_string(),
                expected: format!("{dim}"),
                got: format!("{}", self.dim),
            });
        }
        Ok(())
    }

    /// Multiply by a dimensionless float.
    pub fn scale(&self, f: f64) -> Self {
        Quantity::new(self.mag.mul_f64(f), self.dim)
    }

    /// Raise to a rational power; the dimension follows.
    pub fn powr(&self, e: Rat) -> Self {
        Quantity::new(self.mag.powf(e.as_f64()), self.dim.pow(e))
    }

    /// Raise a dimensionless quantity to an arbitrary float power.
    pub fn powf(&self, e: f64) -> Self {
        self.assert_dim(&Dimension::NONE, "powf");
        Quantity::new(self.mag.powf(e), Dimension::NONE)
    }

    pub fn sqrt(&self) -> Self {
        Quantity::new(self.mag.sqrt(), self.dim.sqrt())
    }

    pub fn sq(&self) -> Self {
        Quantity::new(self.mag.sq(), self.dim.pow(Rat::int(2)))
    }

    pub fn ln(&self) -> Self {
        self.assert_dim(&Dimension::NONE, "ln");
        Quantity::new(self.mag.ln(), Dimension::NONE)
    }

    pub fn exp(&self) -> Self {
        self.assert_dim(&Dimension::NONE, "exp");
        Quantity::new(self.mag.exp(), Dimension::NONE)
    }
}

impl NumQuantity {
    /// Strictly-ordered comparison; dimensions must agree.
    pub fn lt(&self, rhs: &NumQuantity) -> bool {
        self.assert_dim(&rhs.dim, "comparison");
        self.mag < rhs.mag
    }

    pub fn gt(&self, rhs: &NumQuantity) -> bool {
        self.assert_dim(&rhs.dim, "comparison");
        self.mag > rhs.mag
    }
}

impl SymQuantity {
    /// Lift a numeric quantity into a graph as a literal.
    pub fn constant(graph: &Graph, q: &NumQuantity) -> SymQuantity {
        Quantity::new(graph.constant(q.magnitude()), q.dim())
    }

    /// A literal with an explicit dimension.
    pub fn literal(graph: &Graph, value: f64, dim: Dimension) -> SymQuantity {
        Quantity::new(graph.constant(value), dim)
    }
}

impl<M: Magnitude> Add for &Quantity<M> {
    type Output = Quantity<M>;
    fn add(self, rhs: &Quantity<M>) -> Quantity<M> {
        self.assert_dim(&rhs.dim, "addition");
        Quantity::new(self.mag.add(&rhs.mag), self.dim)
    }
}

impl<M: Magnitude> Sub for &Quantity<M> {
    type Output = Quantity<M>;
    fn sub(self, rhs: &Quantity<M>) -> Quantity<M> {
        self.assert_dim(&rhs.dim, "subtraction");
        Quantity::new(self.mag.sub(&rhs.mag), self.dim)
    }
}

impl<M: Magnitude> Mul for &Quantity<M> {
    type Output = Quantity<M>;
    fn mul(self, rhs: &Quantity<M>) -> Quantity<M> {
        Quantity::new(self.mag.mul(&rhs.mag), self.dim.mul(&rhs.dim))
    }
}

impl<M: Magnitude> Div for &Quantity<M> {
    type Output = Quantity<M>;
    fn div(self, rhs: &Quantity<M>) -> Quantity<M> {
        Quantity::new(self.mag.div(&rhs.mag), self.dim.div(&rhs.dim))
    }
}

impl<M: Magnitude> Neg for &Quantity<M> {
    type Output = Quantity<M>;
    fn neg(self) -> Quantity<M> {
        Quantity::new(self.mag.neg(), self.dim)
    }
}

macro_rules! forward_owned_qbinop {
    ($trait:ident, $method:ident) => {
        impl<M: Magnitude> $trait for Quantity<M> {
            type Output = Quantity<M>;
            fn $method(self, rhs: Quantity<M>) -> Quantity<M> {
                $trait::$method(&self, &rhs)
            }
        }
        impl<M: Magnitude> $trait<&Quantity<M>> for Quantity<M> {
            type Output = Quantity<M>;
            fn $method(self, rhs: &Quantity<M>) -> Quantity<M> {
                $trait::$method(&self, rhs)
            }
        }
        impl<M: Magnitude> $trait<Quantity<M>> for &Quantity<M> {
            type Output = Quantity<M>;
            fn $method(self, rhs: Quantity<M>) -> Quantity<M> {
                $trait::$method(self, &rhs)
            }
        }
    };
}

forward_owned_qbinop!(Add, add);
forward_owned_qbinop!(Sub, sub);
forward_owned_qbinop!(Mul, mul);
forward_owned_qbinop!(Div, div);

impl<M: Magnitude> Neg for Quantity<M> {
    type Output = Quantity<M>;
    fn neg(self) -> Quantity<M> {
        -&self
    }
}

impl fmt::Display for NumQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dim.is_dimensionless() {
            write!(f, "{}", self.mag)
        } else {
            write!(f, "{} {}", self.mag, self.dim)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::parse_quantity;

    #[test]
    fn arithmetic_derives_dimensions() {
        let d = parse_quantity("100 m").unwrap();
        let t = parse_quantity("20 s").unwrap();
        let v = &d / &t;
        assert_eq!(v.magnitude(), 5.0);
        assert_eq!(v.dim(), d.dim().div(&t.dim()));

        let back = &v * &t;
        assert_eq!(back.dim(), d.dim());
        assert_eq!((&back - &d).magnitude(), 0.0);
    }

    #[test]
    #[should_panic(expected = "DimensionMismatch")]
    fn adding_apples_to_oranges_panics() {
        let d = parse_quantity("1 m").unwrap();
        let t = parse_quantity("1 s").unwrap();
        let _ = &d + &t;
    }

    #[test]
    fn checked_add_reports_mismatch() {
        let d = parse_quantity("1 m").unwrap();
        let t = parse_quantity("1 s").unwrap();
        assert!(matches!(
            d.checked_add(&t),
            Err(QuantityError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn sqrt_halves_exponents() {
        let area = parse_quantity("9 m^2").unwrap();
        let side = area.sqrt();
        assert_eq!(side.magnitude(), 3.0);
        assert_eq!(side.dim(), parse_quantity("1 m").unwrap().dim());
    }

    #[test]
    #[should_panic(expected = "DimensionMismatch")]
    fn ln_of_dimensioned_quantity_panics() {
        let d = parse_quantity("1 m").unwrap();
        let _ = d.ln();
    }

    #[test]
    fn symbolic_and_numeric_share_unit_rules() {
        let g = Graph::new();
        let t_sym = Quantity::new(g.symbol("T").unwrap(), parse_quantity("1 K").unwrap().dim());
        let t_ref = SymQuantity::constant(&g, &parse_quantity("298.15 K").unwrap());
        let ratio = &t_sym / &t_ref;
        assert!(ratio.dim().is_dimensionless());
        let _ok = ratio.ln();
    }

    #[test]
    fn comparisons_check_dimensions() {
        let a = parse_quantity("1 bar").unwrap();
        let b = parse_quantity("2 bar").unwrap();
        assert!(a.lt(&b));
        assert!(b.gt(&a));
    }
}
