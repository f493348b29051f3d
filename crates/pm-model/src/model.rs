//! The model trait and its declarative interface records.

use crate::error::{ModelError, ModelResult};
use pm_quantity::{unit_registry, Dimension, NumQuantity};
use pm_thermo::{MaterialDefinition, MaterialKind, MaterialSpec};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A reusable model module.
///
/// The engine runs two passes over the model tree: `interface` (top-down,
/// declarative: record what exists) and `define` (bottom-up, constructive:
/// build property expressions and residuals). A model must declare in
/// `interface` everything it touches in `define`.
pub trait ProcessModel {
    fn interface(&self, ifc: &mut Interface) -> ModelResult<()>;
    fn define(&self, ctx: &mut crate::build::DefineContext<'_>) -> ModelResult<()>;
}

/// Declaration record of one child slot: the child model plus the
/// connection table routing this node's materials to the child's ports.
pub struct ChildDecl {
    pub name: String,
    pub model: Box<dyn ProcessModel>,
    pub connections: BTreeMap<String, String>,
}

/// Declaration collector for the interface pass.
#[derive(Default)]
pub struct Interface {
    pub(crate) params: Vec<(String, NumQuantity)>,
    pub(crate) props: Vec<(String, Dimension)>,
    pub(crate) states: Vec<(String, NumQuantity)>,
    pub(crate) ports: Vec<(String, MaterialSpec)>,
    pub(crate) materials: Vec<(String, Arc<MaterialDefinition>, MaterialKind)>,
    pub(crate) children: Vec<ChildDecl>,
    pub(crate) path: String,
}

impl Interface {
    pub(crate) fn new(path: &str) -> Self {
        Interface {
            path: path.to_string(),
            ..Default::default()
        }
    }

    fn check_unique(&self, kind: &'static str, name: &str) -> ModelResult<()> {
        let taken = self.params.iter().any(|(n, _)| n == name)
            || self.props.iter().any(|(n, _)| n == name)
            || self.states.iter().any(|(n, _)| n == name)
            || self.ports.iter().any(|(n, _)| n == name)
            || self.materials.iter().any(|(n, _, _)| n == name)
            || self.children.iter().any(|c| c.name == name);
        if taken {
            return Err(ModelError::DuplicateDeclaration {
                path: self.path.clone(),
                kind,
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Declare a parameter with its default quantity (the default fixes the
    /// unit dimension).
    pub fn parameter(&mut self, name: &str, default: NumQuantity) -> ModelResult<()> {
        self.check_unique("parameter", name)?;
        self.params.push((name.to_string(), default));
        Ok(())
    }

    /// Declare a published property with its unit.
    pub fn property(&mut self, name: &str, unit: &str) -> ModelResult<()> {
        self.check_unique("property", name)?;
        let dim = unit_registry().parse_unit(unit)?.dim;
        self.props.push((name.to_string(), dim));
        Ok(())
    }

    /// Declare a non-canonical state variable with its initial value.
    pub fn state(&mut self, name: &str, initial: NumQuantity) -> ModelResult<()> {
        self.check_unique("state", name)?;
        self.states.push((name.to_string(), initial));
        Ok(())
    }

    /// Declare an abstract material port.
    pub fn material_port(&mut self, name: &str, spec: MaterialSpec) -> ModelResult<()> {
        self.check_unique("material port", name)?;
        self.ports.push((name.to_string(), spec));
        Ok(())
    }

    /// Declare a material owned by this model, instantiated from a shared
    /// definition.
    pub fn material(
        &mut self,
        name: &str,
        definition: Arc<MaterialDefinition>,
        kind: MaterialKind,
    ) -> ModelResult<()> {
        self.check_unique("material", name)?;
        self.materials
            .push((name.to_string(), definition, kind));
        Ok(())
    }

    /// Declare a child model slot. `connections` routes this node's
    /// materials (by name) to the child's ports.
    pub fn child(
        &mut self,
        name: &str,
        model: Box<dyn ProcessModel>,
        connections: &[(&str, &str)],
    ) -> ModelResult<()> {
        self.check_unique("child", name)?;
        self.children.push(ChildDecl {
            name: name.to_string(),
            model,
            connections: connections
                .iter()
                .map(|(port, material)| (port.to_string(), material.to_string()))
                .collect(),
        });
        Ok(())
    }
}
