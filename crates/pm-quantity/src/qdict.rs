//! Species-keyed quantity dictionaries.

use crate::dim::Dimension;
use crate::quantity::{Magnitude, Quantity};
use std::collections::BTreeMap;
use std::ops::{Add, Sub};

/// Mapping from species name to magnitude, all entries sharing one
/// dimension.
///
/// Element-wise `+`/`-` treats absent keys as zero and produces the union
/// key set. Both sides must carry the same dimension.
#[derive(Debug, Clone)]
pub struct QuantityDict<M: Magnitude> {
    dim: Dimension,
    entries: BTreeMap<String, M>,
}

impl<M: Magnitude> QuantityDict<M> {
    pub fn new(dim: Dimension) -> Self {
        QuantityDict {
            dim,
            entries: BTreeMap::new(),
        }
    }

    pub fn from_entries<I, K>(dim: Dimension, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, M)>,
        K: Into<String>,
    {
        QuantityDict {
            dim,
            entries: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn dim(&self) -> Dimension {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, key: impl Into<String>, mag: M) {
        self.entries.insert(key.into(), mag);
    }

    pub fn get(&self, key: &str) -> Option<Quantity<M>> {
        self.entries
            .get(key)
            .map(|m| Quantity::new(m.clone(), self.dim))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Quantity<M>)> {
        self.entries
            .iter()
            .map(|(k, m)| (k.as_str(), Quantity::new(m.clone(), self.dim)))
    }

    pub fn magnitudes(&self) -> &BTreeMap<String, M> {
        &self.entries
    }

    /// Sum over all entries. `None` for an empty dictionary.
    pub fn sum(&self) -> Option<Quantity<M>> {
        let mut acc: Option<M> = None;
        for m in self.entries.values() {
            acc = Some(match acc {
                Some(a) => a.add(m),
                None => m.clone(),
            });
        }
        acc.map(|m| Quantity::new(m, self.dim))
    }

    /// Apply `f` to every entry, producing a dictionary of dimension
    /// `new_dim`.
    pub fn map(&self, new_dim: Dimension, mut f: impl FnMut(&str, Quantity<M>) -> Quantity<M>) -> Self {
        let mut out = QuantityDict::new(new_dim);
        for (k, q) in self.iter() {
            let v = f(k, q);
            assert!(
                v.dim() == new_dim,
                "DimensionMismatch in QuantityDict::map: [{}] vs [{}]",
                v.dim(),
                new_dim
            );
            out.insert(k, v.into_magnitude());
        }
        out
    }

    fn zip(&self, rhs: &Self, op: impl Fn(&M, &M) -> M, neg_missing: bool) -> Self {
        assert!(
            self.dim == rhs.dim,
            "DimensionMismatch in QuantityDict element-wise op: [{}] vs [{}]",
            self.dim,
            rhs.dim
        );
        let mut out = QuantityDict::new(self.dim);
        for (k, a) in &self.entries {
            match rhs.entries.get(k) {
                Some(b) => out.insert(k.clone(), op(a, b)),
                None => out.insert(k.clone(), a.clone()),
            }
        }
        for (k, b) in &rhs.entries {
            if !self.entries.contains_key(k) {
                let v = if neg_missing { b.neg() } else { b.clone() };
                out.insert(k.clone(), v);
            }
        }
        out
    }
}

impl<M: Magnitude> Add for &QuantityDict<M> {
    type Output = QuantityDict<M>;
    fn add(self, rhs: &QuantityDict<M>) -> QuantityDict<M> {
        self.zip(rhs, |a, b| a.add(b), false)
    }
}

impl<M: Magnitude> Sub for &QuantityDict<M> {
    type Output = QuantityDict<M>;
    fn sub(self, rhs: &QuantityDict<M>) -> QuantityDict<M> {
        self.zip(rhs, |a, b| a.sub(b), true)
    }
}

impl<M: Magnitude> Add for QuantityDict<M> {
    type Output = QuantityDict<M>;
    fn add(self, rhs: QuantityDict<M>) -> QuantityDict<M> {
        &self + &rhs
    }
}

impl<M: Magnitude> Sub for QuantityDict<M> {
    type Output = QuantityDict<M>;
    fn sub(self, rhs: QuantityDict<M>) -> QuantityDict<M> {
        &self - &rhs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::parse_quantity;

    fn flow_dim() -> Dimension {
        parse_quantity("1 mol/s").unwrap().dim()
    }

    #[test]
    fn union_with_missing_as_zero() {
        let a = QuantityDict::from_entries(flow_dim(), [("CH4", 1.0), ("H2O", 2.0)]);
        let b = QuantityDict::from_entries(flow_dim(), [("H2O", 0.5), ("CO2", 3.0)]);
        let sum = &a + &b;
        assert_eq!(sum.len(), 3);
        assert_eq!(sum.get("CH4").unwrap().magnitude(), 1.0);
        assert_eq!(sum.get("H2O").unwrap().magnitude(), 2.5);
        assert_eq!(sum.get("CO2").unwrap().magnitude(), 3.0);

        let diff = &a - &b;
        assert_eq!(diff.get("CO2").unwrap().magnitude(), -3.0);
        assert_eq!(diff.get("CH4").unwrap().magnitude(), 1.0);
    }

    #[test]
    #[should_panic(expected = "DimensionMismatch")]
    fn mixed_dimensions_panic() {
        let a = QuantityDict::from_entries(flow_dim(), [("CH4", 1.0)]);
        let b = QuantityDict::from_entries(Dimension::NONE, [("CH4", 1.0)]);
        let _ = &a + &b;
    }

    #[test]
    fn sum_totals_entries() {
        let a = QuantityDict::from_entries(flow_dim(), [("CH4", 1.0), ("H2O", 2.0)]);
        assert_eq!(a.sum().unwrap().magnitude(), 3.0);
        let empty: QuantityDict<f64> = QuantityDict::new(flow_dim());
        assert!(empty.sum().is_none());
    }

    #[test]
    fn keys_are_ordered() {
        let a = QuantityDict::from_entries(flow_dim(), [("H2O", 1.0), ("CH4", 1.0)]);
        let keys: Vec<&str> = a.keys().collect();
        assert_eq!(keys, vec!["CH4", "H2O"]);
    }
}
