//! Thermodynamic frames: ordered contribution stacks over a state
//! definition.
//!
//! A frame is a recipe. Instantiating it for a material runs the state
//! definition and every contribution in declared order against a shared
//! property table; the result is a bundle of symbolic properties, parameter
//! symbols, positivity bounds and relax hooks, all expressed in one
//! expression graph.

use crate::contrib::SharedContribution;
use crate::error::{ThermoError, ThermoResult};
use crate::species::Species;
use crate::state::SharedState;
use crate::store::ParamRequirement;
use pm_expr::{Expr, Graph};
use pm_quantity::{unit_registry, Dimension, QuantityDict, SymQuantity};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

/// Universal gas constant in J/(mol·K), as used by the reference
/// expressions.
pub const GAS_CONSTANT: f64 = 8.31446;

/// Whether a material carries amounts (`mol`) or flows (`mol/s`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialKind {
    Flow,
    State,
}

/// Dimension of a registered unit expression. Only for statically known
/// unit strings.
pub(crate) fn unit_dim(unit: &str) -> Dimension {
    unit_registry()
        .parse_unit(unit)
        .expect("statically known unit")
        .dim
}

/// One published property: a scalar quantity, a per-species dictionary, or
/// the raw state vector.
#[derive(Clone)]
pub enum PropValue {
    Scalar(SymQuantity),
    PerSpecies(QuantityDict<Expr>),
    Raw(Vec<Expr>),
}

impl PropValue {
    fn kind_name(&self) -> &'static str {
        match self {
            PropValue::Scalar(_) => "scalar",
            PropValue::PerSpecies(_) => "per-species",
            PropValue::Raw(_) => "raw state",
        }
    }
}

/// Structural kind of a property, for [`PropertyStructure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropKind {
    Scalar,
    PerSpecies,
    Raw,
}

/// The properties a frame publishes, by name and kind.
#[derive(Debug, Clone)]
pub struct PropertyStructure {
    pub props: Vec<(String, PropKind)>,
}

impl PropertyStructure {
    pub fn contains(&self, name: &str) -> bool {
        self.props.iter().any(|(n, _)| n == name)
    }
}

/// A declared frame parameter: relative path, required dimension, and the
/// symbol standing for it in the instance graph.
#[derive(Clone)]
pub struct ParamEntry {
    pub path: String,
    pub dim: Dimension,
    pub sym: Expr,
}

/// A relax hook: expressions the solver must evaluate at the stepped state,
/// and a projection applied to the material's state slice in place.
pub struct RelaxUnit {
    pub name: String,
    pub needed: Vec<Expr>,
    pub apply: Box<dyn Fn(&mut [f64], &[f64])>,
}

/// Mutable assembly context handed to the state definition and to each
/// contribution in declared order.
pub struct FrameContext<'a> {
    graph: Graph,
    prefix: String,
    kind: MaterialKind,
    species: &'a [Species],
    pub(crate) props: BTreeMap<String, PropValue>,
    pub(crate) state_syms: Vec<Expr>,
    pub(crate) bounds: Vec<(String, SymQuantity)>,
    pub(crate) params: Vec<ParamEntry>,
    param_paths: BTreeSet<String>,
    pub(crate) relax_units: Vec<RelaxUnit>,
    current: String,
}

impl<'a> FrameContext<'a> {
    pub(crate) fn new(
        graph: &Graph,
        prefix: &str,
        kind: MaterialKind,
        species: &'a [Species],
    ) -> Self {
        FrameContext {
            graph: graph.clone(),
            prefix: prefix.to_string(),
            kind,
            species,
            props: BTreeMap::new(),
            state_syms: Vec::new(),
            bounds: Vec::new(),
            params: Vec::new(),
            param_paths: BTreeSet::new(),
            relax_units: Vec::new(),
            current: String::new(),
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn kind(&self) -> MaterialKind {
        self.kind
    }

    pub fn species(&self) -> &[Species] {
        self.species
    }

    /// The contribution instance currently being assembled.
    pub fn contribution(&self) -> &str {
        &self.current
    }

    pub(crate) fn set_current(&mut self, name: &str) {
        self.current = name.to_string();
    }

    /// A literal with the dimension of `unit`.
    pub fn constant(&self, value: f64, unit: &str) -> ThermoResult<SymQuantity> {
        let def = unit_registry().parse_unit(unit)?;
        Ok(SymQuantity::literal(
            &self.graph,
            value * def.factor,
            def.dim,
        ))
    }

    /// `R` as a symbolic literal.
    pub fn gas_constant(&self) -> SymQuantity {
        SymQuantity::literal(&self.graph, GAS_CONSTANT, unit_dim("J/mol/K"))
    }

    /// Allocate the raw state vector. Only the state definition calls this.
    pub(crate) fn alloc_state(&mut self, len: usize) -> ThermoResult<&[Expr]> {
        let syms = self
            .graph
            .symbol_vec(&format!("{}/state", self.prefix), len)?;
        self.state_syms = syms;
        self.props
            .insert("_state".to_string(), PropValue::Raw(self.state_syms.clone()));
        Ok(&self.state_syms)
    }

    fn declare_param(&mut self, path: String, unit: &str) -> ThermoResult<SymQuantity> {
        if !self.param_paths.insert(path.clone()) {
            return Err(ThermoError::DuplicateParameter { path });
        }
        let dim = unit_registry().parse_unit(unit)?.dim;
        let sym = self.graph.symbol(&format!("{}/param/{}", self.prefix, path))?;
        self.params.push(ParamEntry {
            path,
            dim,
            sym: sym.clone(),
        });
        Ok(SymQuantity::new(sym, dim))
    }

    /// Declare a scalar parameter of the current contribution.
    pub fn scalar_param(&mut self, name: &str, unit: &str) -> ThermoResult<SymQuantity> {
        self.declare_param(format!("{}/{name}", self.current), unit)
    }

    /// Declare one parameter per frame species.
    pub fn species_param(&mut self, name: &str, unit: &str) -> ThermoResult<QuantityDict<Expr>> {
        let dim = unit_registry().parse_unit(unit)?.dim;
        let mut dict = QuantityDict::new(dim);
        for sp in self.species {
            let q = self.declare_param(
                format!("{}/{name}/{}", self.current, sp.name()),
                unit,
            )?;
            dict.insert(sp.name(), q.into_magnitude());
        }
        Ok(dict)
    }

    /// Declare one parameter per unordered species pair `i < j`.
    pub fn pair_param(
        &mut self,
        name: &str,
        unit: &str,
    ) -> ThermoResult<BTreeMap<(String, String), SymQuantity>> {
        let mut out = BTreeMap::new();
        for (i, a) in self.species.iter().enumerate() {
            for b in &self.species[i + 1..] {
                let q = self.declare_param(
                    format!("{}/{name}/{}/{}", self.current, a.name(), b.name()),
                    unit,
                )?;
                out.insert((a.name().to_string(), b.name().to_string()), q);
            }
        }
        Ok(out)
    }

    fn missing(&self, property: &str) -> ThermoError {
        ThermoError::MissingRequirement {
            contribution: self.current.clone(),
            property: property.to_string(),
        }
    }

    pub fn has_prop(&self, name: &str) -> bool {
        self.props.contains_key(name)
    }

    /// Read a scalar property published by an earlier contribution.
    pub fn scalar_prop(&self, name: &str) -> ThermoResult<SymQuantity> {
        match self.props.get(name) {
            Some(PropValue::Scalar(q)) => Ok(q.clone()),
            Some(other) => Err(ThermoError::PropertyKind {
                property: name.to_string(),
                expected: "scalar",
                actual: other.kind_name(),
            }),
            None => Err(self.missing(name)),
        }
    }

    /// Read a per-species property published by an earlier contribution.
    pub fn species_prop(&self, name: &str) -> ThermoResult<QuantityDict<Expr>> {
        match self.props.get(name) {
            Some(PropValue::PerSpecies(d)) => Ok(d.clone()),
            Some(other) => Err(ThermoError::PropertyKind {
                property: name.to_string(),
                expected: "per-species",
                actual: other.kind_name(),
            }),
            None => Err(self.missing(name)),
        }
    }

    /// Publish (or shadow) a scalar property.
    pub fn set_scalar(&mut self, name: &str, q: SymQuantity) {
        self.props.insert(name.to_string(), PropValue::Scalar(q));
    }

    /// Publish (or shadow) a per-species property.
    pub fn set_species(&mut self, name: &str, d: QuantityDict<Expr>) {
        self.props.insert(name.to_string(), PropValue::PerSpecies(d));
    }

    /// Add to an existing scalar property, or publish it if absent.
    pub fn add_to_scalar(&mut self, name: &str, q: SymQuantity) {
        let v = match self.props.get(name) {
            Some(PropValue::Scalar(existing)) => existing + &q,
            _ => q,
        };
        self.set_scalar(name, v);
    }

    /// Add element-wise to an existing per-species property, or publish it.
    pub fn add_to_species(&mut self, name: &str, d: QuantityDict<Expr>) {
        let v = match self.props.get(name) {
            Some(PropValue::PerSpecies(existing)) => existing + &d,
            _ => d,
        };
        self.set_species(name, v);
    }

    /// Contribute a strictly-positive bound expression.
    pub fn add_bound(&mut self, name: &str, q: SymQuantity) {
        self.bounds
            .push((format!("{}/{name}", self.current), q));
    }

    /// Register a relax hook for the current contribution.
    pub fn set_relax(
        &mut self,
        needed: Vec<Expr>,
        apply: impl Fn(&mut [f64], &[f64]) + 'static,
    ) {
        self.relax_units.push(RelaxUnit {
            name: self.current.clone(),
            needed,
            apply: Box::new(apply),
        });
    }
}

/// One instantiated frame: the property table and companions for a single
/// material, all in the caller's expression graph.
pub struct FrameInstance {
    pub props: BTreeMap<String, PropValue>,
    pub state_syms: Vec<Expr>,
    pub bounds: Vec<(String, SymQuantity)>,
    pub params: Vec<ParamEntry>,
    pub relax_units: Vec<RelaxUnit>,
}

impl FrameInstance {
    pub fn scalar(&self, name: &str) -> ThermoResult<SymQuantity> {
        match self.props.get(name) {
            Some(PropValue::Scalar(q)) => Ok(q.clone()),
            _ => Err(ThermoError::FrameIncomplete {
                property: name.to_string(),
            }),
        }
    }

    pub fn per_species(&self, name: &str) -> ThermoResult<QuantityDict<Expr>> {
        match self.props.get(name) {
            Some(PropValue::PerSpecies(d)) => Ok(d.clone()),
            _ => Err(ThermoError::FrameIncomplete {
                property: name.to_string(),
            }),
        }
    }
}

/// An ordered contribution stack over a state definition and species set.
pub struct ThermoFrame {
    species: Vec<Species>,
    state: SharedState,
    contributions: Vec<(String, SharedContribution)>,
}

impl std::fmt::Debug for ThermoFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThermoFrame")
            .field("species", &self.species)
            .field(
                "contributions",
                &self.contributions.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Properties every assembled frame must publish.
const STANDARD_PROPS: [&str; 7] = ["_state", "T", "p", "n", "S", "mu", "V"];

impl ThermoFrame {
    /// Build and validate a frame. Instance names default to the class name;
    /// the probe instantiation surfaces ordering and interface violations at
    /// assembly time.
    pub fn new(
        species: Vec<Species>,
        state: SharedState,
        contributions: Vec<(String, SharedContribution)>,
    ) -> ThermoResult<Arc<ThermoFrame>> {
        let mut seen = BTreeSet::new();
        for (name, _) in &contributions {
            if !seen.insert(name.clone()) {
                return Err(ThermoError::DuplicateContribution { name: name.clone() });
            }
        }
        let frame = ThermoFrame {
            species,
            state,
            contributions,
        };
        frame.probe()?;
        Ok(Arc::new(frame))
    }

    fn probe(&self) -> ThermoResult<FrameInstance> {
        let graph = Graph::new();
        self.instantiate(&graph, "probe", MaterialKind::State)
    }

    pub fn species(&self) -> &[Species] {
        &self.species
    }

    pub fn species_names(&self) -> Vec<String> {
        self.species.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn state_definition(&self) -> &SharedState {
        &self.state
    }

    /// Length of the raw state vector.
    pub fn state_len(&self) -> usize {
        2 + self.species.len()
    }

    /// Run the stack for one material, in `graph`, under `prefix`.
    pub fn instantiate(
        &self,
        graph: &Graph,
        prefix: &str,
        kind: MaterialKind,
    ) -> ThermoResult<FrameInstance> {
        let mut ctx = FrameContext::new(graph, prefix, kind, &self.species);
        ctx.current = self.state.name().to_string();
        self.state.build(&mut ctx)?;
        for (name, contribution) in &self.contributions {
            ctx.current = name.clone();
            contribution.build(&mut ctx)?;
        }
        for prop in STANDARD_PROPS {
            if !ctx.props.contains_key(prop) {
                return Err(ThermoError::FrameIncomplete {
                    property: prop.to_string(),
                });
            }
        }
        debug!(
            material = prefix,
            props = ctx.props.len(),
            params = ctx.params.len(),
            bounds = ctx.bounds.len(),
            "frame instantiated"
        );
        Ok(FrameInstance {
            props: ctx.props,
            state_syms: ctx.state_syms,
            bounds: ctx.bounds,
            params: ctx.params,
            relax_units: ctx.relax_units,
        })
    }

    /// The union of parameter needs of all contributions, in declaration
    /// order.
    pub fn parameter_structure(&self) -> ThermoResult<Vec<ParamRequirement>> {
        let probe = self.probe()?;
        Ok(probe
            .params
            .iter()
            .map(|p| ParamRequirement {
                path: p.path.clone(),
                dim: p.dim,
            })
            .collect())
    }

    /// Names and kinds of every published property.
    pub fn property_structure(&self) -> ThermoResult<PropertyStructure> {
        let probe = self.probe()?;
        Ok(PropertyStructure {
            props: probe
                .props
                .iter()
                .map(|(name, v)| {
                    let kind = match v {
                        PropValue::Scalar(_) => PropKind::Scalar,
                        PropValue::PerSpecies(_) => PropKind::PerSpecies,
                        PropValue::Raw(_) => PropKind::Raw,
                    };
                    (name.clone(), kind)
                })
                .collect(),
        })
    }
}
