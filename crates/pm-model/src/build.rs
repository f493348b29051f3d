//! Flattening: interface pass, define pass, and the flat model record.

use crate::error::{ModelError, ModelResult};
use crate::model::{Interface, ProcessModel};
use pm_expr::{Expr, Graph};
use pm_quantity::{Dimension, NumQuantity, SymQuantity};
use pm_thermo::Material;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug)]
pub(crate) struct ParamDecl {
    pub name: String,
    pub default: NumQuantity,
    pub sym: Expr,
}

#[derive(Debug)]
pub(crate) struct StateDecl {
    pub name: String,
    pub initial: NumQuantity,
    pub sym: Expr,
}

/// One flattened model node. Parents precede children (pre-order).
#[derive(Debug)]
pub(crate) struct ModelNode {
    pub path: String,
    pub params: Vec<ParamDecl>,
    pub declared_props: BTreeMap<String, Dimension>,
    pub props: BTreeMap<String, SymQuantity>,
    pub states: Vec<StateDecl>,
    pub materials: BTreeMap<String, usize>,
    pub children: BTreeMap<String, usize>,
}

/// The flat numeric problem inputs: the expression graph, the node tree,
/// the material table and the scaled residuals in deterministic tree order.
#[derive(Debug)]
pub struct FlatModel {
    pub(crate) graph: Graph,
    pub(crate) nodes: Vec<ModelNode>,
    pub(crate) materials: Vec<Material>,
    pub(crate) residuals: Vec<(String, Expr)>,
}

impl FlatModel {
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn n_residuals(&self) -> usize {
        self.residuals.len()
    }
}

/// Run both passes over a model tree and produce the flat record.
///
/// The interface pass walks top-down assigning qualified `parent/child/leaf`
/// names and instantiating materials; the define pass walks bottom-up so
/// every node sees its children's published properties.
pub fn flatten(name: &str, model: Box<dyn ProcessModel>) -> ModelResult<FlatModel> {
    let graph = Graph::new();
    let mut nodes: Vec<ModelNode> = Vec::new();
    let mut models: Vec<Box<dyn ProcessModel>> = Vec::new();
    let mut materials: Vec<Material> = Vec::new();

    expand(name, model, None, &graph, &mut nodes, &mut models, &mut materials)?;
    debug!(
        nodes = nodes.len(),
        materials = materials.len(),
        "interface pass complete"
    );

    // Define bottom-up: pre-order guarantees children have higher indices.
    let mut residuals_per_node: Vec<Vec<(String, Expr)>> = vec![Vec::new(); nodes.len()];
    for idx in (0..nodes.len()).rev() {
        let mut local = Vec::new();
        {
            let mut ctx = DefineContext {
                nodes: &mut nodes,
                node_idx: idx,
                materials: &materials,
                graph: &graph,
                residuals: &mut local,
            };
            models[idx].define(&mut ctx)?;
        }
        residuals_per_node[idx] = local;
    }

    // Residual order: deterministic depth-first (pre-order) over the tree,
    // definition order within a node.
    let residuals: Vec<(String, Expr)> = residuals_per_node.into_iter().flatten().collect();
    debug!(residuals = residuals.len(), "define pass complete");

    Ok(FlatModel {
        graph,
        nodes,
        materials,
        residuals,
    })
}

/// Bindings available to a child: the parent's material table slice.
struct PortBindings<'a> {
    parent_materials: &'a BTreeMap<String, usize>,
    connections: &'a BTreeMap<String, String>,
    parent_path: String,
}

fn expand(
    path: &str,
    model: Box<dyn ProcessModel>,
    bindings: Option<PortBindings<'_>>,
    graph: &Graph,
    nodes: &mut Vec<ModelNode>,
    models: &mut Vec<Box<dyn ProcessModel>>,
    materials: &mut Vec<Material>,
) -> ModelResult<usize> {
    let mut ifc = Interface::new(path);
    model.interface(&mut ifc)?;

    let mut node = ModelNode {
        path: path.to_string(),
        params: Vec::new(),
        declared_props: BTreeMap::new(),
        props: BTreeMap::new(),
        states: Vec::new(),
        materials: BTreeMap::new(),
        children: BTreeMap::new(),
    };

    for (name, default) in &ifc.params {
        let sym = graph.symbol(&format!("{path}/param/{name}"))?;
        node.params.push(ParamDecl {
            name: name.clone(),
            default: default.clone(),
            sym,
        });
    }
    for (name, dim) in &ifc.props {
        node.declared_props.insert(name.clone(), *dim);
    }
    for (name, initial) in &ifc.states {
        let sym = graph.symbol(&format!("{path}/state/{name}"))?;
        node.states.push(StateDecl {
            name: name.clone(),
            initial: initial.clone(),
            sym,
        });
    }

    // Owned materials first, then ports resolved against the parent table.
    for (name, definition, kind) in &ifc.materials {
        let material =
            definition.create_instance(graph, &format!("{path}/{name}"), *kind)?;
        materials.push(material);
        node.materials.insert(name.clone(), materials.len() - 1);
    }
    for (port, spec) in &ifc.ports {
        let Some(b) = &bindings else {
            return Err(ModelError::UnboundPort {
                path: path.to_string(),
                port: port.clone(),
            });
        };
        let Some(material_name) = b.connections.get(port) else {
            return Err(ModelError::UnboundPort {
                path: path.to_string(),
                port: port.clone(),
            });
        };
        let Some(&mat_idx) = b.parent_materials.get(material_name) else {
            return Err(ModelError::UnknownConnection {
                path: b.parent_path.clone(),
                child: path.to_string(),
                port: port.clone(),
                material: material_name.clone(),
            });
        };
        spec.accept(&materials[mat_idx])?;
        node.materials.insert(port.clone(), mat_idx);
    }

    let node_idx = nodes.len();
    nodes.push(node);
    models.push(model);

    for child in ifc.children {
        let child_path = format!("{path}/{}", child.name);
        let parent_materials = nodes[node_idx].materials.clone();
        let child_idx = expand(
            &child_path,
            child.model,
            Some(PortBindings {
                parent_materials: &parent_materials,
                connections: &child.connections,
                parent_path: path.to_string(),
            }),
            graph,
            nodes,
            models,
            materials,
        )?;
        nodes[node_idx].children.insert(child.name, child_idx);
    }
    Ok(node_idx)
}

/// Typed handles for the define pass of one node.
pub struct DefineContext<'a> {
    nodes: &'a mut Vec<ModelNode>,
    node_idx: usize,
    materials: &'a [Material],
    graph: &'a Graph,
    residuals: &'a mut Vec<(String, Expr)>,
}

impl DefineContext<'_> {
    fn node(&self) -> &ModelNode {
        &self.nodes[self.node_idx]
    }

    fn unknown(&self, kind: &'static str, name: &str) -> ModelError {
        ModelError::UnknownDeclaration {
            path: self.node().path.clone(),
            kind,
            name: name.to_string(),
        }
    }

    pub fn graph(&self) -> &Graph {
        self.graph
    }

    /// Lift a numeric quantity into the graph.
    pub fn constant(&self, q: &NumQuantity) -> SymQuantity {
        SymQuantity::constant(self.graph, q)
    }

    /// Symbol of a declared parameter, carrying the default's dimension.
    pub fn param(&self, name: &str) -> ModelResult<SymQuantity> {
        let decl = self
            .node()
            .params
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| self.unknown("parameter", name))?;
        Ok(SymQuantity::new(decl.sym.clone(), decl.default.dim()))
    }

    /// Symbol of a declared non-canonical state variable.
    pub fn state(&self, name: &str) -> ModelResult<SymQuantity> {
        let decl = self
            .node()
            .states
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| self.unknown("state", name))?;
        Ok(SymQuantity::new(decl.sym.clone(), decl.initial.dim()))
    }

    /// A connected or owned material.
    pub fn material(&self, name: &str) -> ModelResult<&Material> {
        let idx = self
            .node()
            .materials
            .get(name)
            .copied()
            .ok_or_else(|| self.unknown("material", name))?;
        Ok(&self.materials[idx])
    }

    /// A property published by a direct child.
    pub fn child_prop(&self, child: &str, prop: &str) -> ModelResult<SymQuantity> {
        let child_idx = self
            .node()
            .children
            .get(child)
            .copied()
            .ok_or_else(|| self.unknown("child", child))?;
        let child_node = &self.nodes[child_idx];
        if let Some(q) = child_node.props.get(prop) {
            return Ok(q.clone());
        }
        if child_node.declared_props.contains_key(prop) {
            return Err(ModelError::DataFlowError {
                path: child_node.path.clone(),
                property: prop.to_string(),
            });
        }
        Err(ModelError::UnknownDeclaration {
            path: child_node.path.clone(),
            kind: "property",
            name: prop.to_string(),
        })
    }

    /// Publish a declared property.
    pub fn set_prop(&mut self, name: &str, value: SymQuantity) -> ModelResult<()> {
        let path = self.node().path.clone();
        let Some(&dim) = self.node().declared_props.get(name) else {
            return Err(ModelError::UndeclaredProperty {
                path,
                property: name.to_string(),
            });
        };
        value.require_dim(dim, &format!("{path}/{name}"))?;
        self.nodes[self.node_idx]
            .props
            .insert(name.to_string(), value);
        Ok(())
    }

    /// Register a residual with its tolerance quantity. The stored value is
    /// dimensionless: magnitude over tolerance, both in base SI.
    pub fn add_residual(
        &mut self,
        name: &str,
        expr: SymQuantity,
        tolerance: NumQuantity,
    ) -> ModelResult<()> {
        let qualified = format!("{}/{name}", self.node().path);
        if tolerance.magnitude() <= 0.0 {
            return Err(ModelError::BadResidual {
                name: qualified,
                reason: "tolerance must be strictly positive".into(),
            });
        }
        expr.require_dim(tolerance.dim(), &qualified)?;
        let scaled = expr.mag_ref().scale(1.0 / tolerance.magnitude());
        self.residuals.push((qualified, scaled));
        Ok(())
    }
}
