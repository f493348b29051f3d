//! Diagnostics over residual and bound vectors.
//!
//! The solver works on flat vectors of scaled, dimensionless values; the
//! helpers here locate the worst entry (the convergence measure is the
//! log10 of its magnitude) and the first non-finite entry, so error
//! messages can name the offending row.

pub type Real = f64;

/// Index and magnitude of the largest-magnitude entry. `None` on an empty
/// vector.
pub fn max_abs_entry(values: &[Real]) -> Option<(usize, Real)> {
    values
        .iter()
        .map(|v| v.abs())
        .enumerate()
        .fold(None, |best, (i, v)| match best {
            Some((_, bv)) if bv >= v => best,
            _ => Some((i, v)),
        })
}

/// `log10 max_i |v_i|` of a scaled residual vector. Negative once every
/// entry is below its tolerance; negative infinity on an all-zero or empty
/// vector.
pub fn log_max_error(values: &[Real]) -> Real {
    match max_abs_entry(values) {
        Some((_, worst)) => worst.log10(),
        None => Real::NEG_INFINITY,
    }
}

/// First NaN or infinite entry, with its index.
pub fn first_non_finite(values: &[Real]) -> Option<(usize, Real)> {
    values
        .iter()
        .enumerate()
        .find(|(_, v)| !v.is_finite())
        .map(|(i, v)| (i, *v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worst_entry_is_found_by_magnitude() {
        assert_eq!(max_abs_entry(&[0.5, -3.0, 2.0]), Some((1, 3.0)));
        assert_eq!(max_abs_entry(&[]), None);
        // ties keep the first index
        assert_eq!(max_abs_entry(&[2.0, -2.0]), Some((0, 2.0)));
    }

    #[test]
    fn log_max_error_signals_convergence() {
        assert!(log_max_error(&[0.5, -0.099]) < 0.0);
        assert!(log_max_error(&[0.5, 10.0]) > 0.0);
        assert_eq!(log_max_error(&[0.0, 0.0]), Real::NEG_INFINITY);
        assert_eq!(log_max_error(&[]), Real::NEG_INFINITY);
    }

    #[test]
    fn non_finite_entries_are_located() {
        assert_eq!(first_non_finite(&[1.0, 2.0]), None);
        let (idx, v) = first_non_finite(&[1.0, Real::NAN, Real::INFINITY]).unwrap();
        assert_eq!(idx, 1);
        assert!(v.is_nan());
        let (idx, v) = first_non_finite(&[Real::NEG_INFINITY]).unwrap();
        assert_eq!(idx, 0);
        assert!(v.is_infinite());
    }
}
