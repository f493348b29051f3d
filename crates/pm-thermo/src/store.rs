//! Thermodynamic parameter stores.
//!
//! A store is an ordered list of sources; lookup walks the list and the
//! first source that knows a path wins. Sources added later are
//! lower-priority fallbacks, so resolved lookups never change when a source
//! is appended.

use crate::error::{ThermoError, ThermoResult};
use pm_core::Nested;
use pm_quantity::{parse_quantity, Dimension, NumQuantity};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One provider of `"<number> <unit>"` parameter leaves, addressed by
/// `/`-separated paths (`H0S0ReferenceState/dh_form/H2O`).
pub trait ParameterSource {
    fn name(&self) -> &str;
    fn get(&self, path: &str) -> Option<String>;
}

/// A source backed by a nested string tree, typically deserialized from a
/// parameter document.
pub struct NestedSource {
    name: String,
    tree: Nested<String>,
}

impl NestedSource {
    pub fn new(name: impl Into<String>, tree: Nested<String>) -> Self {
        NestedSource {
            name: name.into(),
            tree,
        }
    }

    /// Build from a YAML mapping with string leaves.
    pub fn from_yaml_str(name: impl Into<String>, text: &str) -> ThermoResult<Self> {
        let value: serde_yaml::Value =
            serde_yaml::from_str(text).map_err(|e| ThermoError::Document {
                path: String::new(),
                reason: e.to_string(),
            })?;
        let mut tree = Nested::new();
        fn walk(
            value: &serde_yaml::Value,
            prefix: &str,
            tree: &mut Nested<String>,
        ) -> ThermoResult<()> {
            match value {
                serde_yaml::Value::Mapping(map) => {
                    for (k, v) in map {
                        let key = k.as_str().unwrap_or_default();
                        let path = if prefix.is_empty() {
                            key.to_string()
                        } else {
                            format!("{prefix}/{key}")
                        };
                        walk(v, &path, tree)?;
                    }
                    Ok(())
                }
                serde_yaml::Value::String(s) => {
                    tree.insert(prefix, s.clone())?;
                    Ok(())
                }
                serde_yaml::Value::Number(n) => {
                    tree.insert(prefix, n.to_string())?;
                    Ok(())
                }
                other => Err(ThermoError::Document {
                    path: prefix.to_string(),
                    reason: format!("unsupported parameter leaf {other:?}"),
                }),
            }
        }
        walk(&value, "", &mut tree)?;
        Ok(NestedSource::new(name, tree))
    }

    pub fn from_entries<I, K, V>(name: impl Into<String>, entries: I) -> ThermoResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut tree = Nested::new();
        for (k, v) in entries {
            tree.insert(k.as_ref(), v.into())?;
        }
        Ok(NestedSource::new(name, tree))
    }
}

impl ParameterSource for NestedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, path: &str) -> Option<String> {
        self.tree.get(path).cloned()
    }
}

/// A required parameter: path plus the dimension the value must carry.
#[derive(Debug, Clone)]
pub struct ParamRequirement {
    pub path: String,
    pub dim: Dimension,
}

/// Ordered multi-source parameter lookup.
#[derive(Default)]
pub struct ThermoParameterStore {
    sources: Vec<Arc<dyn ParameterSource>>,
}

impl ThermoParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source as the lowest-priority fallback.
    pub fn add_source(&mut self, source: Arc<dyn ParameterSource>) {
        self.sources.push(source);
    }

    /// First-match-wins lookup; returns the providing source and the raw
    /// leaf.
    pub fn lookup(&self, path: &str) -> Option<(&str, String)> {
        for source in &self.sources {
            if let Some(value) = source.get(path) {
                return Some((source.name(), value));
            }
        }
        None
    }

    /// Paths of `required` that no source covers.
    pub fn get_missing_symbols(&self, required: &[ParamRequirement]) -> Vec<String> {
        required
            .iter()
            .filter(|req| self.lookup(&req.path).is_none())
            .map(|req| req.path.clone())
            .collect()
    }

    /// Resolve every requirement to a base-SI quantity, checking dimensions.
    pub fn resolve(
        &self,
        required: &[ParamRequirement],
    ) -> ThermoResult<BTreeMap<String, NumQuantity>> {
        let missing = self.get_missing_symbols(required);
        if !missing.is_empty() {
            return Err(ThermoError::MissingParameter { paths: missing });
        }
        let mut out = BTreeMap::new();
        for req in required {
            let (_, raw) = self.lookup(&req.path).expect("missing checked above");
            let q = parse_quantity(&raw)?;
            q.require_dim(req.dim, &req.path)?;
            out.insert(req.path.clone(), q);
        }
        Ok(out)
    }
}
