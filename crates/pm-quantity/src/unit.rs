//! Unit registry: parsing and formatting of unit strings.
//!
//! Units exist only at the I/O boundary. Parsing converts to offset-free
//! base SI immediately; formatting converts back on request. Offsets (°C,
//! gauge pressures) apply only when the unit string is a single plain name;
//! inside compound expressions such names contribute factor and dimension
//! only.

use crate::dim::{Dimension, Rat};
use crate::error::{QuantityError, QuantityResult};
use crate::quantity::NumQuantity;
use pm_core::Nested;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// One registered unit: dimension, scale factor to base SI, display offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitDef {
    pub dim: Dimension,
    pub factor: f64,
    pub offset: f64,
}

impl UnitDef {
    fn plain(dim: Dimension, factor: f64) -> UnitDef {
        UnitDef {
            dim,
            factor,
            offset: 0.0,
        }
    }
}

/// Registry of named units. Append-only: built once at process start and
/// read-only afterwards.
pub struct UnitRegistry {
    units: BTreeMap<String, UnitDef>,
}

fn dim_pow(base: usize, e: i32) -> Dimension {
    Dimension::base(base).pow(Rat::int(e))
}

impl Default for UnitRegistry {
    fn default() -> Self {
        let m = Dimension::base(Dimension::LENGTH);
        let kg = Dimension::base(Dimension::MASS);
        let s = Dimension::base(Dimension::TIME);
        let amp = Dimension::base(Dimension::CURRENT);
        let kelvin = Dimension::base(Dimension::TEMPERATURE);
        let mol = Dimension::base(Dimension::AMOUNT);
        let cd = Dimension::base(Dimension::LUMINOUS);

        let newton = kg.mul(&m).mul(&dim_pow(Dimension::TIME, -2));
        let pascal = newton.div(&m.pow(Rat::int(2)));
        let joule = newton.mul(&m);
        let watt = joule.div(&s);
        let volume = m.pow(Rat::int(3));

        let mut reg = UnitRegistry {
            units: BTreeMap::new(),
        };
        let mut add = |name: &str, def: UnitDef| {
            reg.units.insert(name.to_string(), def);
        };

        // SI bases
        add("m", UnitDef::plain(m, 1.0));
        add("kg", UnitDef::plain(kg, 1.0));
        add("s", UnitDef::plain(s, 1.0));
        add("A", UnitDef::plain(amp, 1.0));
        add("K", UnitDef::plain(kelvin, 1.0));
        add("mol", UnitDef::plain(mol, 1.0));
        add("cd", UnitDef::plain(cd, 1.0));

        // scaled length/mass/amount/time
        add("mm", UnitDef::plain(m, 1e-3));
        add("cm", UnitDef::plain(m, 1e-2));
        add("dm", UnitDef::plain(m, 1e-1));
        add("km", UnitDef::plain(m, 1e3));
        add("g", UnitDef::plain(kg, 1e-3));
        add("mg", UnitDef::plain(kg, 1e-6));
        add("t", UnitDef::plain(kg, 1e3));
        add("mmol", UnitDef::plain(mol, 1e-3));
        add("kmol", UnitDef::plain(mol, 1e3));
        add("min", UnitDef::plain(s, 60.0));
        add("h", UnitDef::plain(s, 3600.0));
        add("day", UnitDef::plain(s, 86400.0));

        // mechanics & energy
        add("N", UnitDef::plain(newton, 1.0));
        add("kN", UnitDef::plain(newton, 1e3));
        add("Pa", UnitDef::plain(pascal, 1.0));
        add("kPa", UnitDef::plain(pascal, 1e3));
        add("MPa", UnitDef::plain(pascal, 1e6));
        add("bar", UnitDef::plain(pascal, 1e5));
        add("mbar", UnitDef::plain(pascal, 1e2));
        add("atm", UnitDef::plain(pascal, 101_325.0));
        add("J", UnitDef::plain(joule, 1.0));
        add("kJ", UnitDef::plain(joule, 1e3));
        add("MJ", UnitDef::plain(joule, 1e6));
        add("W", UnitDef::plain(watt, 1.0));
        add("kW", UnitDef::plain(watt, 1e3));
        add("MW", UnitDef::plain(watt, 1e6));
        add("L", UnitDef::plain(volume, 1e-3));
        add("mL", UnitDef::plain(volume, 1e-6));

        // offset units
        add(
            "degC",
            UnitDef {
                dim: kelvin,
                factor: 1.0,
                offset: 273.15,
            },
        );
        let gauge = |factor: f64| UnitDef {
            dim: pascal,
            factor,
            offset: 101_325.0,
        };
        add("bar_gauge", gauge(1e5));
        add("barg", gauge(1e5));
        add("atm_gauge", gauge(101_325.0));
        add("atmg", gauge(101_325.0));
        add("kilo_pascal_gauge", gauge(1e3));
        add("kPag", gauge(1e3));

        // dimless = m/m
        add("dimless", UnitDef::plain(Dimension::NONE, 1.0));

        reg
    }
}

impl UnitRegistry {
    pub fn lookup(&self, name: &str) -> QuantityResult<&UnitDef> {
        self.units.get(name).ok_or_else(|| QuantityError::UnknownUnit {
            name: name.to_string(),
        })
    }

    /// Parse a unit expression: names combined with `*`, `/`, whitespace
    /// (multiplication), parentheses and integer exponents (`^-2`, `²`, `³`).
    pub fn parse_unit(&self, text: &str) -> QuantityResult<UnitDef> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(UnitDef::plain(Dimension::NONE, 1.0));
        }
        // A single plain name keeps its offset; compounds are offset-free.
        if let Ok(def) = self.lookup(text) {
            return Ok(*def);
        }
        let tokens = tokenize(text).map_err(|reason| QuantityError::ParseQuantity {
            text: text.to_string(),
            reason,
        })?;
        let mut parser = UnitParser {
            registry: self,
            tokens,
            pos: 0,
        };
        let def = parser.expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(QuantityError::ParseQuantity {
                text: text.to_string(),
                reason: "trailing tokens in unit expression".into(),
            });
        }
        Ok(def)
    }

    /// Parse `"<number> <unit>"` (unit optional ⇒ dimensionless) into a
    /// base-SI quantity.
    pub fn parse_quantity(&self, text: &str) -> QuantityResult<NumQuantity> {
        let text = text.trim();
        let (num_part, unit_part) = match text.find(char::is_whitespace) {
            Some(split) => (&text[..split], text[split..].trim_start()),
            None => (text, ""),
        };
        let value: f64 = num_part.parse().map_err(|_| QuantityError::ParseQuantity {
            text: text.to_string(),
            reason: format!("invalid number '{num_part}'"),
        })?;
        let unit = self.parse_unit(unit_part)?;
        Ok(NumQuantity::new(value * unit.factor + unit.offset, unit.dim))
    }

    /// Render a base-SI quantity in the requested unit.
    pub fn format_quantity(&self, q: &NumQuantity, unit: &str) -> QuantityResult<String> {
        let def = self.parse_unit(unit)?;
        if def.dim != q.dim() {
            return Err(QuantityError::DimensionMismatch {
                context: format!("format in '{unit}'"),
                expected: format!("{}", def.dim),
                got: format!("{}", q.dim()),
            });
        }
        let value = (q.magnitude() - def.offset) / def.factor;
        Ok(format!("{value} {unit}"))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Name(String),
    Star,
    Slash,
    LParen,
    RParen,
    Exponent(i32),
}

fn tokenize(text: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
                // whitespace between factors means multiplication
                if matches!(tokens.last(), Some(Token::Name(_) | Token::RParen | Token::Exponent(_)))
                {
                    if let Some(&next) = chars.peek() {
                        if next != '*' && next != '/' && next != ')' && next != '^' {
                            tokens.push(Token::Star);
                        }
                    }
                }
            }
            '*' => {
                chars.next();
                if chars.peek() == Some(&'*') {
                    chars.next();
                    tokens.push(Token::Exponent(read_int(&mut chars)?));
                } else {
                    tokens.push(Token::Star);
                }
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '^' => {
                chars.next();
                tokens.push(Token::Exponent(read_int(&mut chars)?));
            }
            '²' => {
                chars.next();
                tokens.push(Token::Exponent(2));
            }
            '³' => {
                chars.next();
                tokens.push(Token::Exponent(3));
            }
            c if c.is_alphabetic() || c == '_' || c == '°' => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '°' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Name(name));
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }
    Ok(tokens)
}

fn read_int(chars: &mut std::iter::Peekable<std::str::Chars>) -> Result<i32, String> {
    let mut text = String::new();
    if chars.peek() == Some(&'-') {
        text.push('-');
        chars.next();
    }
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() {
            text.push(c);
            chars.next();
        } else {
            break;
        }
    }
    text.parse().map_err(|_| format!("invalid exponent '{text}'"))
}

struct UnitParser<'a> {
    registry: &'a UnitRegistry,
    tokens: Vec<Token>,
    pos: usize,
}

impl UnitParser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn expr(&mut self) -> QuantityResult<UnitDef> {
        let mut acc = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    let rhs = self.term()?;
                    acc = UnitDef::plain(acc.dim.mul(&rhs.dim), acc.factor * rhs.factor);
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let rhs = self.term()?;
                    acc = UnitDef::plain(acc.dim.div(&rhs.dim), acc.factor / rhs.factor);
                }
                _ => return Ok(acc),
            }
        }
    }

    fn term(&mut self) -> QuantityResult<UnitDef> {
        let base = match self.peek().cloned() {
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.expr()?;
                match self.peek() {
                    Some(Token::RParen) => self.pos += 1,
                    _ => {
                        return Err(QuantityError::ParseQuantity {
                            text: String::new(),
                            reason: "unbalanced parenthesis in unit".into(),
                        })
                    }
                }
                inner
            }
            Some(Token::Name(name)) => {
                self.pos += 1;
                // offsets only survive as a lone top-level factor, which is
                // handled before tokenization; here we take factor+dim.
                let def = *self.registry.lookup(&name)?;
                UnitDef::plain(def.dim, def.factor)
            }
            _ => {
                return Err(QuantityError::ParseQuantity {
                    text: String::new(),
                    reason: "expected unit name".into(),
                })
            }
        };
        if let Some(Token::Exponent(e)) = self.peek().cloned() {
            self.pos += 1;
            return Ok(UnitDef::plain(
                base.dim.pow(Rat::int(e)),
                base.factor.powi(e),
            ));
        }
        Ok(base)
    }
}

static REGISTRY: OnceLock<UnitRegistry> = OnceLock::new();

/// The process-wide unit registry.
pub fn unit_registry() -> &'static UnitRegistry {
    REGISTRY.get_or_init(UnitRegistry::default)
}

/// Parse `"<number> <unit>"` through the process-wide registry.
pub fn parse_quantity(text: &str) -> QuantityResult<NumQuantity> {
    unit_registry().parse_quantity(text)
}

/// Render a quantity in the requested unit through the process-wide registry.
pub fn format_quantity(q: &NumQuantity, unit: &str) -> QuantityResult<String> {
    unit_registry().format_quantity(q, unit)
}

/// Recursively convert string leaves like `"25 degC"` into quantities.
pub fn parse_quantities_in_struct(
    tree: &Nested<String>,
) -> QuantityResult<Nested<NumQuantity>> {
    tree.try_map(&mut |_, text| parse_quantity(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_si_roundtrip() {
        let q = parse_quantity("2.5 m").unwrap();
        assert_eq!(q.magnitude(), 2.5);
        assert_eq!(format_quantity(&q, "m").unwrap(), "2.5 m");
    }

    #[test]
    fn compound_units() {
        let q = parse_quantity("-241.826 kJ/mol").unwrap();
        assert!((q.magnitude() + 241_826.0).abs() < 1e-9);

        let flow = parse_quantity("10 m³/h").unwrap();
        assert!((flow.magnitude() - 10.0 / 3600.0).abs() < 1e-12);

        let caret = parse_quantity("10 m^3/h").unwrap();
        assert_eq!(caret.dim(), flow.dim());
        assert_eq!(caret.magnitude(), flow.magnitude());
    }

    #[test]
    fn parenthesized_denominator() {
        let a = parse_quantity("8.31446 J/(mol K)").unwrap();
        let b = parse_quantity("8.31446 J/mol/K").unwrap();
        assert_eq!(a.dim(), b.dim());
        assert!((a.magnitude() - b.magnitude()).abs() < 1e-15);
    }

    #[test]
    fn celsius_offset() {
        let q = parse_quantity("25 degC").unwrap();
        assert!((q.magnitude() - 298.15).abs() < 1e-12);
        let back = parse_quantity(&format_quantity(&q, "degC").unwrap()).unwrap();
        assert!((back.magnitude() - q.magnitude()).abs() < 1e-9);
    }

    #[test]
    fn gauge_pressures_share_one_offset() {
        for (text, expected) in [
            ("0 barg", 101_325.0),
            ("0 atmg", 101_325.0),
            ("0 kPag", 101_325.0),
            ("1 bar_gauge", 201_325.0),
        ] {
            let q = parse_quantity(text).unwrap();
            assert!(
                (q.magnitude() - expected).abs() < 1e-9,
                "{text}: {}",
                q.magnitude()
            );
        }
    }

    #[test]
    fn offsets_vanish_in_compounds() {
        // degC inside a compound is a temperature interval
        let rate = parse_quantity("2 degC/min").unwrap();
        assert!((rate.magnitude() - 2.0 / 60.0).abs() < 1e-12);
    }

    #[test]
    fn dimless_alias() {
        let q = parse_quantity("0.3 dimless").unwrap();
        assert!(q.dim().is_dimensionless());
        assert_eq!(q.magnitude(), 0.3);
    }

    #[test]
    fn bare_number_is_dimensionless() {
        let q = parse_quantity("42").unwrap();
        assert!(q.dim().is_dimensionless());
    }

    #[test]
    fn unknown_unit_is_reported() {
        assert!(matches!(
            parse_quantity("1 parsec"),
            Err(QuantityError::UnknownUnit { .. })
        ));
    }

    #[test]
    fn exponent_variants() {
        let a = unit_registry().parse_unit("m^2").unwrap();
        let b = unit_registry().parse_unit("m²").unwrap();
        let c = unit_registry().parse_unit("m**2").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        let inv = unit_registry().parse_unit("s^-1").unwrap();
        assert_eq!(inv.dim, Dimension::base(Dimension::TIME).recip());
    }
}
