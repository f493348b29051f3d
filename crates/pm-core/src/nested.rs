//! Nested string-keyed trees and the flat-dictionary transforms.
//!
//! Qualified names throughout the engine are `/`-separated paths; this module
//! owns the canonical nested↔flat conversion so every consumer agrees on key
//! order and separator handling.

use crate::error::{CoreError, CoreResult};
use std::collections::BTreeMap;

/// Canonical path separator for qualified names.
pub const SEP: char = '/';

/// A nested string-keyed tree with values of type `T` at the leaves.
///
/// Maps are ordered, so leaf iteration and flattening are deterministic.
#[derive(Debug, Clone, PartialEq)]
pub enum Nested<T> {
    Leaf(T),
    Map(BTreeMap<String, Nested<T>>),
}

impl<T> Default for Nested<T> {
    fn default() -> Self {
        Nested::Map(BTreeMap::new())
    }
}

impl<T> Nested<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Nested::Leaf(_) => false,
            Nested::Map(m) => m.values().all(|v| v.is_empty()),
        }
    }

    /// Look up a leaf by `/`-separated path.
    pub fn get(&self, path: &str) -> Option<&T> {
        let mut node = self;
        for part in path.split(SEP) {
            match node {
                Nested::Map(m) => node = m.get(part)?,
                Nested::Leaf(_) => return None,
            }
        }
        match node {
            Nested::Leaf(v) => Some(v),
            Nested::Map(_) => None,
        }
    }

    /// Insert a leaf at a `/`-separated path, creating intermediate maps.
    ///
    /// Fails if the path runs through an existing leaf.
    pub fn insert(&mut self, path: &str, value: T) -> CoreResult<()> {
        let mut node = self;
        let parts: Vec<&str> = path.split(SEP).collect();
        for (i, part) in parts.iter().enumerate() {
            let map = match node {
                Nested::Map(m) => m,
                Nested::Leaf(_) => {
                    return Err(CoreError::KeyConflict {
                        path: parts[..i].join("/"),
                    })
                }
            };
            if i + 1 == parts.len() {
                if matches!(map.get(*part), Some(Nested::Map(_))) {
                    return Err(CoreError::KeyConflict {
                        path: path.to_string(),
                    });
                }
                map.insert((*part).to_string(), Nested::Leaf(value));
                return Ok(());
            }
            node = map
                .entry((*part).to_string())
                .or_insert_with(|| Nested::Map(BTreeMap::new()));
        }
        unreachable!("path has at least one segment")
    }

    /// Depth-first leaf visit with joined path names.
    pub fn for_each_leaf<'a>(&'a self, mut f: impl FnMut(&str, &'a T)) {
        fn walk<'a, T>(node: &'a Nested<T>, prefix: &str, f: &mut impl FnMut(&str, &'a T)) {
            match node {
                Nested::Leaf(v) => f(prefix, v),
                Nested::Map(m) => {
                    for (k, v) in m {
                        let child = if prefix.is_empty() {
                            k.clone()
                        } else {
                            format!("{prefix}{SEP}{k}")
                        };
                        walk(v, &child, f);
                    }
                }
            }
        }
        walk(self, "", &mut f)
    }

    /// Collect `(path, &T)` pairs in deterministic order.
    pub fn leaves(&self) -> Vec<(String, &T)> {
        let mut out = Vec::new();
        self.for_each_leaf(|path, v| out.push((path.to_string(), v)));
        out
    }

    /// Map leaf values, keeping the tree shape.
    pub fn map<U>(&self, f: &mut impl FnMut(&str, &T) -> U) -> Nested<U> {
        fn walk<T, U>(
            node: &Nested<T>,
            prefix: &str,
            f: &mut impl FnMut(&str, &T) -> U,
        ) -> Nested<U> {
            match node {
                Nested::Leaf(v) => Nested::Leaf(f(prefix, v)),
                Nested::Map(m) => Nested::Map(
                    m.iter()
                        .map(|(k, v)| {
                            let child = if prefix.is_empty() {
                                k.clone()
                            } else {
                                format!("{prefix}{SEP}{k}")
                            };
                            (k.clone(), walk(v, &child, f))
                        })
                        .collect(),
                ),
            }
        }
        walk(self, "", f)
    }

    /// Fallible leaf map, keeping the tree shape.
    pub fn try_map<U, E>(
        &self,
        f: &mut impl FnMut(&str, &T) -> Result<U, E>,
    ) -> Result<Nested<U>, E> {
        fn walk<T, U, E>(
            node: &Nested<T>,
            prefix: &str,
            f: &mut impl FnMut(&str, &T) -> Result<U, E>,
        ) -> Result<Nested<U>, E> {
            match node {
                Nested::Leaf(v) => Ok(Nested::Leaf(f(prefix, v)?)),
                Nested::Map(m) => {
                    let mut out = BTreeMap::new();
                    for (k, v) in m {
                        let child = if prefix.is_empty() {
                            k.clone()
                        } else {
                            format!("{prefix}{SEP}{k}")
                        };
                        out.insert(k.clone(), walk(v, &child, f)?);
                    }
                    Ok(Nested::Map(out))
                }
            }
        }
        walk(self, "", f)
    }
}

/// Flatten a nested tree into `path → value` with `/`-joined keys.
pub fn flatten_dictionary<T: Clone>(nested: &Nested<T>) -> BTreeMap<String, T> {
    let mut out = BTreeMap::new();
    nested.for_each_leaf(|path, v| {
        out.insert(path.to_string(), v.clone());
    });
    out
}

/// Rebuild a nested tree from `/`-joined keys. Inverse of [`flatten_dictionary`].
pub fn unflatten_dictionary<T>(flat: BTreeMap<String, T>) -> CoreResult<Nested<T>> {
    let mut root = Nested::new();
    for (path, value) in flat {
        root.insert(&path, value)?;
    }
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Nested<i32> {
        let mut n = Nested::new();
        n.insert("a/b", 1).unwrap();
        n.insert("a/c", 2).unwrap();
        n.insert("d", 3).unwrap();
        n
    }

    #[test]
    fn get_by_path() {
        let n = sample();
        assert_eq!(n.get("a/b"), Some(&1));
        assert_eq!(n.get("a"), None);
        assert_eq!(n.get("a/b/c"), None);
        assert_eq!(n.get("missing"), None);
    }

    #[test]
    fn flatten_is_ordered() {
        let flat = flatten_dictionary(&sample());
        let keys: Vec<&str> = flat.keys().map(|s| s.as_str()).collect();
        assert_eq!(keys, vec!["a/b", "a/c", "d"]);
    }

    #[test]
    fn unflatten_inverts_flatten() {
        let n = sample();
        let back = unflatten_dictionary(flatten_dictionary(&n)).unwrap();
        assert_eq!(n, back);
    }

    #[test]
    fn insert_through_leaf_conflicts() {
        let mut n = sample();
        let err = n.insert("d/e", 4).unwrap_err();
        assert!(format!("{err}").contains("conflict"));
    }

    #[test]
    fn leaf_order_is_depth_first() {
        let leaves = sample()
            .leaves()
            .into_iter()
            .map(|(k, v)| (k, *v))
            .collect::<Vec<_>>();
        assert_eq!(
            leaves,
            vec![
                ("a/b".to_string(), 1),
                ("a/c".to_string(), 2),
                ("d".to_string(), 3)
            ]
        );
    }
}
