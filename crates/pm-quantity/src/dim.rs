//! Dimensional signatures: rational exponents over the 7 SI base units.

use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

/// A reduced rational number. Square roots of quantities make integer
/// exponents insufficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rat {
    num: i32,
    den: i32,
}

impl Rat {
    pub const ZERO: Rat = Rat { num: 0, den: 1 };
    pub const ONE: Rat = Rat { num: 1, den: 1 };

    pub fn new(num: i32, den: i32) -> Rat {
        assert!(den != 0, "rational with zero denominator");
        let sign = if den < 0 { -1 } else { 1 };
        let (num, den) = (num * sign, den * sign);
        let g = gcd(num.unsigned_abs(), den.unsigned_abs()).max(1) as i32;
        Rat {
            num: num / g,
            den: den / g,
        }
    }

    pub fn int(n: i32) -> Rat {
        Rat { num: n, den: 1 }
    }

    pub fn is_zero(self) -> bool {
        self.num == 0
    }

    pub fn num(self) -> i32 {
        self.num
    }

    pub fn den(self) -> i32 {
        self.den
    }

    pub fn as_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

impl Add for Rat {
    type Output = Rat;
    fn add(self, rhs: Rat) -> Rat {
        Rat::new(self.num * rhs.den + rhs.num * self.den, self.den * rhs.den)
    }
}

impl Sub for Rat {
    type Output = Rat;
    fn sub(self, rhs: Rat) -> Rat {
        self + (-rhs)
    }
}

impl Mul for Rat {
    type Output = Rat;
    fn mul(self, rhs: Rat) -> Rat {
        Rat::new(self.num * rhs.num, self.den * rhs.den)
    }
}

impl Neg for Rat {
    type Output = Rat;
    fn neg(self) -> Rat {
        Rat {
            num: -self.num,
            den: self.den,
        }
    }
}

impl fmt::Display for Rat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

const BASE_SYMBOLS: [&str; 7] = ["m", "kg", "s", "A", "K", "mol", "cd"];

/// Dimensional signature: one rational exponent per SI base unit, in the
/// order `m, kg, s, A, K, mol, cd`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimension {
    exps: [Rat; 7],
}

impl Dimension {
    pub const NONE: Dimension = Dimension {
        exps: [Rat::ZERO; 7],
    };

    pub fn base(index: usize) -> Dimension {
        let mut exps = [Rat::ZERO; 7];
        exps[index] = Rat::ONE;
        Dimension { exps }
    }

    pub const LENGTH: usize = 0;
    pub const MASS: usize = 1;
    pub const TIME: usize = 2;
    pub const CURRENT: usize = 3;
    pub const TEMPERATURE: usize = 4;
    pub const AMOUNT: usize = 5;
    pub const LUMINOUS: usize = 6;

    pub fn from_exps(exps: [Rat; 7]) -> Dimension {
        Dimension { exps }
    }

    pub fn is_dimensionless(&self) -> bool {
        self.exps.iter().all(|e| e.is_zero())
    }

    pub fn mul(&self, rhs: &Dimension) -> Dimension {
        let mut exps = [Rat::ZERO; 7];
        for i in 0..7 {
            exps[i] = self.exps[i] + rhs.exps[i];
        }
        Dimension { exps }
    }

    pub fn div(&self, rhs: &Dimension) -> Dimension {
        let mut exps = [Rat::ZERO; 7];
        for i in 0..7 {
            exps[i] = self.exps[i] - rhs.exps[i];
        }
        Dimension { exps }
    }

    pub fn pow(&self, e: Rat) -> Dimension {
        let mut exps = [Rat::ZERO; 7];
        for i in 0..7 {
            exps[i] = self.exps[i] * e;
        }
        Dimension { exps }
    }

    pub fn recip(&self) -> Dimension {
        self.pow(Rat::int(-1))
    }

    pub fn sqrt(&self) -> Dimension {
        self.pow(Rat::new(1, 2))
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dimensionless() {
            return write!(f, "1");
        }
        let mut first = true;
        for (i, e) in self.exps.iter().enumerate() {
            if e.is_zero() {
                continue;
            }
            if !first {
                write!(f, " ")?;
            }
            first = false;
            if *e == Rat::ONE {
                write!(f, "{}", BASE_SYMBOLS[i])?;
            } else {
                write!(f, "{}^{}", BASE_SYMBOLS[i], e)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rational_reduction() {
        assert_eq!(Rat::new(2, 4), Rat::new(1, 2));
        assert_eq!(Rat::new(-3, -6), Rat::new(1, 2));
        assert_eq!(Rat::new(3, -6), Rat::new(-1, 2));
        assert_eq!(Rat::new(1, 2) + Rat::new(1, 2), Rat::ONE);
    }

    #[test]
    fn dimension_algebra() {
        let length = Dimension::base(Dimension::LENGTH);
        let time = Dimension::base(Dimension::TIME);
        let velocity = length.div(&time);
        let area = length.pow(Rat::int(2));
        assert_eq!(area.sqrt(), length);
        assert_eq!(velocity.mul(&time), length);
        assert!(length.div(&length).is_dimensionless());
    }

    #[test]
    fn display_reads_naturally() {
        let energy = Dimension::from_exps([
            Rat::int(2),
            Rat::ONE,
            Rat::int(-2),
            Rat::ZERO,
            Rat::ZERO,
            Rat::ZERO,
            Rat::ZERO,
        ]);
        assert_eq!(format!("{energy}"), "m^2 kg s^-2");
        assert_eq!(format!("{}", Dimension::NONE), "1");
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn dim_strategy() -> impl Strategy<Value = Dimension> {
        proptest::array::uniform7((-4i32..=4, 1i32..=3))
            .prop_map(|parts| Dimension::from_exps(parts.map(|(n, d)| Rat::new(n, d))))
    }

    proptest! {
        #[test]
        fn mul_div_roundtrip(a in dim_strategy(), b in dim_strategy()) {
            prop_assert_eq!(a.mul(&b).div(&b), a);
        }

        #[test]
        fn pow_two_then_sqrt(a in dim_strategy()) {
            prop_assert_eq!(a.pow(Rat::int(2)).sqrt(), a);
        }
    }
}
