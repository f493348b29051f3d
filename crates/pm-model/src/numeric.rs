//! The numeric handler: global vectors, compiled callables and state I/O.

use crate::build::FlatModel;
use crate::error::{ModelError, ModelResult};
use pm_core::Nested;
use pm_expr::{jacobian, CompiledFn, CompiledJacobian, CscMatrix, Expr};
use pm_quantity::{parse_quantity, Dimension, NumQuantity, QuantityDict};
use pm_thermo::{InitialState, PropValue};
use std::collections::BTreeMap;
use std::ops::Range;
use tracing::debug;

struct ParamSlot {
    path: String,
    dim: Dimension,
}

struct MaterialMeta {
    name: String,
    range: Range<usize>,
    species: Vec<String>,
}

struct CompiledRelax {
    material: usize,
    unit: usize,
    needed: CompiledFn,
}

/// Owns the state vector `x`, the parameter values, and every compiled
/// callable of the flattened problem. The solver holds a mutable reference
/// to this handler; nothing else mutates `x`.
pub struct NumericHandler {
    flat: FlatModel,
    x: Vec<f64>,
    x_names: Vec<String>,
    param_values: Vec<f64>,
    param_slots: Vec<ParamSlot>,
    residual_names: Vec<String>,
    bound_names: Vec<String>,
    r_fn: CompiledFn,
    jr: CompiledJacobian,
    b_fn: CompiledFn,
    jb: CompiledJacobian,
    props_fn: CompiledFn,
    prop_layout: Vec<(String, Dimension)>,
    relax_plan: Vec<CompiledRelax>,
    materials_meta: Vec<MaterialMeta>,
}

impl NumericHandler {
    pub fn new(flat: FlatModel) -> ModelResult<NumericHandler> {
        let graph = flat.graph().clone();

        // --- independent variables -----------------------------------------
        let mut x_syms: Vec<Expr> = Vec::new();
        let mut x_names: Vec<String> = Vec::new();
        let mut x0: Vec<f64> = Vec::new();
        let mut materials_meta = Vec::new();

        for material in &flat.materials {
            let start = x_syms.len();
            for sym in &material.instance().state_syms {
                x_names.push(graph.symbol_name(sym.as_symbol().expect("state symbols")));
                x_syms.push(sym.clone());
            }
            x0.extend(material.initial_state_vector()?);
            materials_meta.push(MaterialMeta {
                name: material.name().to_string(),
                range: start..x_syms.len(),
                species: material.species_names(),
            });
        }
        for node in &flat.nodes {
            for state in &node.states {
                x_names.push(format!("{}/{}", node.path, state.name));
                x_syms.push(state.sym.clone());
                x0.push(state.initial.magnitude());
            }
        }

        // --- parameters ----------------------------------------------------
        let mut param_syms: Vec<Expr> = Vec::new();
        let mut param_values: Vec<f64> = Vec::new();
        let mut param_slots: Vec<ParamSlot> = Vec::new();

        for node in &flat.nodes {
            for p in &node.params {
                param_syms.push(p.sym.clone());
                param_values.push(p.default.magnitude());
                param_slots.push(ParamSlot {
                    path: format!("model_params/{}/{}", node.path, p.name),
                    dim: p.default.dim(),
                });
            }
        }
        for material in &flat.materials {
            let requirements = material.parameter_requirements();
            let resolved = material.definition().store().resolve(&requirements)?;
            for entry in &material.instance().params {
                let value = &resolved[&entry.path];
                param_syms.push(entry.sym.clone());
                param_values.push(value.magnitude());
                param_slots.push(ParamSlot {
                    path: format!("thermo_params/{}/{}", material.name(), entry.path),
                    dim: entry.dim,
                });
            }
        }

        let inputs: Vec<Expr> = x_syms.iter().chain(param_syms.iter()).cloned().collect();

        // --- residuals and bounds ------------------------------------------
        let residual_names: Vec<String> =
            flat.residuals.iter().map(|(n, _)| n.clone()).collect();
        let residual_exprs: Vec<Expr> =
            flat.residuals.iter().map(|(_, e)| e.clone()).collect();
        let r_fn = CompiledFn::new(&inputs, &residual_exprs)?;
        let jr = CompiledJacobian::new(&inputs, jacobian(&residual_exprs, &x_syms))?;

        let mut bound_names = Vec::new();
        let mut bound_exprs = Vec::new();
        for material in &flat.materials {
            for (name, q) in &material.instance().bounds {
                bound_names.push(format!("{}/{}", material.name(), name));
                bound_exprs.push(q.mag_ref().clone());
            }
        }
        let b_fn = CompiledFn::new(&inputs, &bound_exprs)?;
        let jb = CompiledJacobian::new(&inputs, jacobian(&bound_exprs, &x_syms))?;

        // --- relax plan ----------------------------------------------------
        let mut relax_plan = Vec::new();
        for (m_idx, material) in flat.materials.iter().enumerate() {
            for (u_idx, unit) in material.instance().relax_units.iter().enumerate() {
                relax_plan.push(CompiledRelax {
                    material: m_idx,
                    unit: u_idx,
                    needed: CompiledFn::new(&inputs, &unit.needed)?,
                });
            }
        }

        // --- property evaluator --------------------------------------------
        let mut prop_layout: Vec<(String, Dimension)> = Vec::new();
        let mut prop_exprs: Vec<Expr> = Vec::new();
        for node in &flat.nodes {
            for (name, q) in &node.props {
                prop_layout.push((format!("{}/{name}", node.path), q.dim()));
                prop_exprs.push(q.mag_ref().clone());
            }
        }
        for material in &flat.materials {
            for (name, value) in &material.instance().props {
                match value {
                    PropValue::Scalar(q) => {
                        prop_layout.push((format!("{}/{name}", material.name()), q.dim()));
                        prop_exprs.push(q.mag_ref().clone());
                    }
                    PropValue::PerSpecies(dict) => {
                        for (species, q) in dict.iter() {
                            prop_layout
                                .push((format!("{}/{name}/{species}", material.name()), q.dim()));
                            prop_exprs.push(q.mag_ref().clone());
                        }
                    }
                    PropValue::Raw(_) => {}
                }
            }
        }
        let props_fn = CompiledFn::new(&inputs, &prop_exprs)?;

        debug!(
            n_x = x_syms.len(),
            n_residuals = residual_names.len(),
            n_bounds = bound_names.len(),
            n_params = param_slots.len(),
            "numeric handler assembled"
        );

        let mut handler = NumericHandler {
            flat,
            x: x0,
            x_names,
            param_values,
            param_slots,
            residual_names,
            bound_names,
            r_fn,
            jr,
            b_fn,
            jb,
            props_fn,
            prop_layout,
            relax_plan,
            materials_meta,
        };
        // project seed volumes onto their phase roots
        handler.relax()?;
        Ok(handler)
    }

    pub fn n_vars(&self) -> usize {
        self.x.len()
    }

    pub fn n_residuals(&self) -> usize {
        self.residual_names.len()
    }

    pub fn n_bounds(&self) -> usize {
        self.bound_names.len()
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn set_x(&mut self, x: Vec<f64>) {
        debug_assert_eq!(x.len(), self.x.len());
        self.x = x;
    }

    pub fn x_names(&self) -> &[String] {
        &self.x_names
    }

    pub fn residual_names(&self) -> &[String] {
        &self.residual_names
    }

    pub fn bound_names(&self) -> &[String] {
        &self.bound_names
    }

    fn full_args(&self) -> Vec<f64> {
        let mut args = Vec::with_capacity(self.x.len() + self.param_values.len());
        args.extend_from_slice(&self.x);
        args.extend_from_slice(&self.param_values);
        args
    }

    /// Scaled residual vector at the current state.
    pub fn residuals(&self) -> ModelResult<Vec<f64>> {
        Ok(self.r_fn.eval(&self.full_args())?)
    }

    /// Sparse residual Jacobian `∂r/∂x` at the current state.
    pub fn residual_jacobian(&self) -> ModelResult<CscMatrix> {
        Ok(self.jr.eval(&self.full_args())?)
    }

    /// Bound vector at the current state; every entry must stay strictly
    /// positive.
    pub fn bounds(&self) -> ModelResult<Vec<f64>> {
        Ok(self.b_fn.eval(&self.full_args())?)
    }

    /// Sparse bound Jacobian `∂b/∂x` at the current state.
    pub fn bound_jacobian(&self) -> ModelResult<CscMatrix> {
        Ok(self.jb.eval(&self.full_args())?)
    }

    /// Run every contribution's relax hook in frame order, letting it
    /// project its material's state slice in place.
    pub fn relax(&mut self) -> ModelResult<()> {
        for entry in &self.relax_plan {
            let vals = entry.needed.eval(&self.full_args())?;
            let meta = &self.materials_meta[entry.material];
            let unit =
                &self.flat.materials[entry.material].instance().relax_units[entry.unit];
            (unit.apply)(&mut self.x[meta.range.clone()], &vals);
        }
        Ok(())
    }

    /// Editable argument structure: `model_params` and `thermo_params` with
    /// their current values.
    pub fn arguments(&self) -> Nested<NumQuantity> {
        let mut tree = Nested::new();
        for (slot, value) in self.param_slots.iter().zip(&self.param_values) {
            tree.insert(&slot.path, NumQuantity::new(*value, slot.dim))
                .expect("parameter paths are disjoint");
        }
        tree
    }

    /// Replace parameter values from an edited argument structure.
    pub fn set_arguments(&mut self, args: &Nested<NumQuantity>) -> ModelResult<()> {
        let mut slots: BTreeMap<&str, usize> = BTreeMap::new();
        for (i, slot) in self.param_slots.iter().enumerate() {
            slots.insert(&slot.path, i);
        }
        for (path, q) in args.leaves() {
            let Some(&slot) = slots.get(path.as_str()) else {
                return Err(pm_quantity::QuantityError::UnexpectedArgument { path }.into());
            };
            q.require_dim(self.param_slots[slot].dim, &path)?;
            self.param_values[slot] = q.magnitude();
        }
        Ok(())
    }

    /// All published properties (model and material) at the current state.
    pub fn properties(&self) -> ModelResult<Nested<NumQuantity>> {
        let values = self.props_fn.eval(&self.full_args())?;
        let mut tree = Nested::new();
        for ((path, dim), value) in self.prop_layout.iter().zip(values) {
            tree.insert(path, NumQuantity::new(value, *dim))
                .expect("property paths are disjoint");
        }
        Ok(tree)
    }

    /// Evaluate the property set for an explicit argument structure without
    /// touching the stored defaults.
    pub fn function(&self, args: &Nested<NumQuantity>) -> ModelResult<Nested<NumQuantity>> {
        let mut values = self.param_values.clone();
        let mut slots: BTreeMap<&str, usize> = BTreeMap::new();
        for (i, slot) in self.param_slots.iter().enumerate() {
            slots.insert(&slot.path, i);
        }
        for (path, q) in args.leaves() {
            let Some(&slot) = slots.get(path.as_str()) else {
                return Err(pm_quantity::QuantityError::UnexpectedArgument { path }.into());
            };
            q.require_dim(self.param_slots[slot].dim, &path)?;
            values[slot] = q.magnitude();
        }
        let mut full = Vec::with_capacity(self.x.len() + values.len());
        full.extend_from_slice(&self.x);
        full.extend_from_slice(&values);
        let out = self.props_fn.eval(&full)?;
        let mut tree = Nested::new();
        for ((path, dim), value) in self.prop_layout.iter().zip(out) {
            tree.insert(path, NumQuantity::new(value, *dim))
                .expect("property paths are disjoint");
        }
        Ok(tree)
    }

    /// Serialize the current state as `{thermo: {material: {T, p, n}},
    /// states: {…}}` with quantity strings.
    pub fn export_state(&self) -> ModelResult<Nested<String>> {
        let props = self.properties()?;
        let mut out = Nested::new();
        for meta in &self.materials_meta {
            for key in ["T", "p"] {
                let q = props
                    .get(&format!("{}/{key}", meta.name))
                    .ok_or_else(|| ModelError::BadStateDocument {
                        reason: format!("material '{}' lacks property {key}", meta.name),
                    })?;
                out.insert(&format!("thermo/{}/{key}", meta.name), q.to_string())?;
            }
            for species in &meta.species {
                let q = props
                    .get(&format!("{}/n/{species}", meta.name))
                    .ok_or_else(|| ModelError::BadStateDocument {
                        reason: format!("material '{}' lacks amount {species}", meta.name),
                    })?;
                out.insert(
                    &format!("thermo/{}/n/{species}", meta.name),
                    q.to_string(),
                )?;
            }
        }
        let n_material_vars: usize = self
            .materials_meta
            .iter()
            .map(|m| m.range.len())
            .sum();
        let mut cursor = n_material_vars;
        for node in &self.flat.nodes {
            for state in &node.states {
                let q = NumQuantity::new(self.x[cursor], state.initial.dim());
                out.insert(&format!("states/{}/{}", node.path, state.name), q.to_string())?;
                cursor += 1;
            }
        }
        Ok(out)
    }

    /// Restore a state produced by [`NumericHandler::export_state`].
    /// Quantity strings round-trip through the unit parser; the relax chain
    /// runs afterwards so projected coordinates land on their roots.
    pub fn import_state(&mut self, doc: &Nested<String>) -> ModelResult<()> {
        for (m_idx, meta) in self.materials_meta.iter().enumerate() {
            let read = |key: &str| -> ModelResult<NumQuantity> {
                let text = doc
                    .get(&format!("thermo/{}/{key}", meta.name))
                    .ok_or_else(|| ModelError::BadStateDocument {
                        reason: format!("missing thermo/{}/{key}", meta.name),
                    })?;
                Ok(parse_quantity(text)?)
            };
            let t = read("T")?;
            let p = read("p")?;
            let mut amounts: Vec<(String, f64)> = Vec::new();
            let mut dim: Option<Dimension> = None;
            for species in &meta.species {
                let q = read(&format!("n/{species}"))?;
                match dim {
                    Some(d) => q.require_dim(d, species)?,
                    None => dim = Some(q.dim()),
                }
                amounts.push((species.clone(), q.magnitude()));
            }
            let dim = dim.ok_or_else(|| ModelError::BadStateDocument {
                reason: format!("material '{}' has no species amounts", meta.name),
            })?;
            let init = InitialState::new(t, p, QuantityDict::from_entries(dim, amounts))?;
            let vector = self.flat.materials[m_idx].state_vector_from(&init)?;
            self.x[meta.range.clone()].copy_from_slice(&vector);
        }

        let n_material_vars: usize = self
            .materials_meta
            .iter()
            .map(|m| m.range.len())
            .sum();
        let mut cursor = n_material_vars;
        for node in &self.flat.nodes {
            for state in &node.states {
                let text = doc
                    .get(&format!("states/{}/{}", node.path, state.name))
                    .ok_or_else(|| ModelError::BadStateDocument {
                        reason: format!("missing states/{}/{}", node.path, state.name),
                    })?;
                let q = parse_quantity(text)?;
                q.require_dim(state.initial.dim(), &state.name)?;
                self.x[cursor] = q.magnitude();
                cursor += 1;
            }
        }
        self.relax()?;
        Ok(())
    }
}
