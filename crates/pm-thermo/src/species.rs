//! Chemical species and the formula parser.

use crate::error::{ThermoError, ThermoResult};
use pm_core::MCounter;
use pm_quantity::{parse_quantity, NumQuantity};

/// Standard atomic weights in g/mol for the elements the formula parser
/// accepts. Values from standard reference data.
const ATOMIC_WEIGHTS: &[(&str, f64)] = &[
    ("H", 1.008),
    ("He", 4.003),
    ("Li", 6.941),
    ("Be", 9.012),
    ("B", 10.811),
    ("C", 12.011),
    ("N", 14.007),
    ("O", 15.999),
    ("F", 18.998),
    ("Ne", 20.180),
    ("Na", 22.990),
    ("Mg", 24.305),
    ("Al", 26.982),
    ("Si", 28.086),
    ("P", 30.974),
    ("S", 32.066),
    ("Cl", 35.453),
    ("Ar", 39.948),
    ("K", 39.098),
    ("Ca", 40.078),
    ("Ti", 47.867),
    ("Cr", 51.996),
    ("Mn", 54.938),
    ("Fe", 55.845),
    ("Ni", 58.693),
    ("Cu", 63.546),
    ("Zn", 65.380),
    ("Br", 79.904),
    ("Kr", 83.798),
    ("Ag", 107.868),
    ("Sn", 118.710),
    ("I", 126.904),
    ("Xe", 131.293),
    ("Ba", 137.327),
    ("Pt", 195.084),
    ("Au", 196.967),
    ("Hg", 200.592),
    ("Pb", 207.210),
];

fn atomic_weight(symbol: &str) -> Option<f64> {
    ATOMIC_WEIGHTS
        .iter()
        .find(|(s, _)| *s == symbol)
        .map(|(_, w)| *w)
}

/// A chemical species: a name plus everything derived from its formula.
#[derive(Debug, Clone)]
pub struct Species {
    name: String,
    formula: String,
    elements: MCounter,
    molecular_weight: NumQuantity,
    charge: i32,
}

impl Species {
    /// Parse `formula` and derive element counts, molecular weight and
    /// charge.
    ///
    /// The grammar accepts element tokens (`C`, `Cl`), integer multipliers
    /// (`H2`), parenthesized groups (`(OH)2`), hyphen separators between
    /// structural groups (`CH3-CH2-OH`) and trailing charge marks (`+`,
    /// `--`).
    pub fn new(name: impl Into<String>, formula: impl Into<String>) -> ThermoResult<Species> {
        let name = name.into();
        let formula = formula.into();
        let (elements, charge) = parse_formula(&formula)?;

        let mut grams = 0.0;
        for (symbol, count) in elements.iter() {
            let w = atomic_weight(symbol).ok_or_else(|| ThermoError::UnknownElement {
                symbol: symbol.to_string(),
                formula: formula.clone(),
            })?;
            grams += w * count;
        }
        let molecular_weight =
            parse_quantity(&format!("{} kg/mol", grams * 1e-3)).expect("kg/mol is registered");

        Ok(Species {
            name,
            formula,
            elements,
            molecular_weight,
            charge,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn formula(&self) -> &str {
        &self.formula
    }

    /// Element symbol → atom count.
    pub fn elements(&self) -> &MCounter {
        &self.elements
    }

    /// Molecular weight in kg/mol.
    pub fn molecular_weight(&self) -> NumQuantity {
        self.molecular_weight.clone()
    }

    pub fn charge(&self) -> i32 {
        self.charge
    }
}

fn parse_formula(formula: &str) -> ThermoResult<(MCounter, i32)> {
    let err = |reason: &str| ThermoError::FormulaParse {
        formula: formula.to_string(),
        reason: reason.to_string(),
    };
    let chars: Vec<char> = formula.chars().collect();
    let mut pos = 0usize;
    let mut counts = MCounter::new();
    let mut charge = 0i32;

    fn read_count(chars: &[char], pos: &mut usize) -> f64 {
        let start = *pos;
        while *pos < chars.len() && chars[*pos].is_ascii_digit() {
            *pos += 1;
        }
        if start == *pos {
            1.0
        } else {
            chars[start..*pos].iter().collect::<String>().parse().unwrap_or(1.0)
        }
    }

    // Recursive descent over groups; returns counts of one bracketed scope.
    fn parse_scope(
        chars: &[char],
        pos: &mut usize,
        formula: &str,
        depth: usize,
    ) -> ThermoResult<MCounter> {
        let err = |reason: &str| ThermoError::FormulaParse {
            formula: formula.to_string(),
            reason: reason.to_string(),
        };
        let mut counts = MCounter::new();
        while *pos < chars.len() {
            match chars[*pos] {
                '(' => {
                    *pos += 1;
                    let inner = parse_scope(chars, pos, formula, depth + 1)?;
                    if *pos >= chars.len() || chars[*pos] != ')' {
                        return Err(err("unbalanced parenthesis"));
                    }
                    *pos += 1;
                    let mult = read_count(chars, pos);
                    for (k, v) in (&inner * mult).iter() {
                        counts.add_count(k, v);
                    }
                }
                ')' => {
                    if depth == 0 {
                        return Err(err("unbalanced parenthesis"));
                    }
                    return Ok(counts);
                }
                '-' | '+' => {
                    // separator or charge: handled by the caller at depth 0
                    if depth == 0 {
                        return Ok(counts);
                    }
                    return Err(err("charge marks are only allowed at the end"));
                }
                c if c.is_ascii_uppercase() => {
                    *pos += 1;
                    let mut symbol = c.to_string();
                    if *pos < chars.len() && chars[*pos].is_ascii_lowercase() {
                        symbol.push(chars[*pos]);
                        *pos += 1;
                    }
                    let count = read_count(chars, pos);
                    counts.add_count(symbol, count);
                }
                c => return Err(err(&format!("unexpected character '{c}'"))),
            }
        }
        Ok(counts)
    }

    while pos < chars.len() {
        match chars[pos] {
            '-' => {
                // hyphen followed by a token is a separator, otherwise the
                // start of the negative-charge suffix
                let next = chars.get(pos + 1);
                if matches!(next, Some(c) if c.is_ascii_uppercase() || *c == '(') {
                    pos += 1;
                } else {
                    while pos < chars.len() {
                        match chars[pos] {
                            '-' => charge -= 1,
                            _ => return Err(err("trailing characters after charge marks")),
                        }
                        pos += 1;
                    }
                }
            }
            '+' => {
                while pos < chars.len() {
                    match chars[pos] {
                        '+' => charge += 1,
                        _ => return Err(err("trailing characters after charge marks")),
                    }
                    pos += 1;
                }
            }
            _ => {
                let scope = parse_scope(&chars, &mut pos, formula, 0)?;
                if scope.is_empty() {
                    return Err(err("empty group"));
                }
                for (k, v) in scope.iter() {
                    counts.add_count(k, v);
                }
            }
        }
    }

    if counts.is_empty() {
        return Err(err("no elements"));
    }
    Ok((counts, charge))
}
