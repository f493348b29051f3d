//! State definitions: how a raw state vector reads as thermodynamic
//! coordinates.

use crate::error::{ThermoError, ThermoResult};
use crate::frame::{unit_dim, FrameContext, MaterialKind, GAS_CONSTANT};
use crate::species::Species;
use pm_quantity::{NumQuantity, QuantityDict, SymQuantity};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock, RwLock};

/// The `{T, p, n}` triple that seeds a material.
#[derive(Debug, Clone)]
pub struct InitialState {
    pub t: NumQuantity,
    pub p: NumQuantity,
    pub n: QuantityDict<f64>,
}

impl InitialState {
    pub fn new(t: NumQuantity, p: NumQuantity, n: QuantityDict<f64>) -> ThermoResult<Self> {
        t.require_dim(unit_dim("K"), "initial T")?;
        p.require_dim(unit_dim("Pa"), "initial p")?;
        Ok(InitialState { t, p, n })
    }

    fn amount(&self, material: &str, species: &Species, kind: MaterialKind) -> ThermoResult<f64> {
        let expected = match kind {
            MaterialKind::Flow => unit_dim("mol/s"),
            MaterialKind::State => unit_dim("mol"),
        };
        if self.n.dim() != expected {
            return Err(pm_quantity::QuantityError::DimensionMismatch {
                context: format!("initial amounts of '{material}'"),
                expected: format!("{expected}"),
                got: format!("{}", self.n.dim()),
            }
            .into());
        }
        self.n
            .get(species.name())
            .map(|q| q.magnitude())
            .ok_or_else(|| ThermoError::IncompleteInitialState {
                material: material.to_string(),
                species: species.name().to_string(),
            })
    }
}

/// Interprets the raw state vector: publishes `_state`, `T`, the second
/// coordinate and `n`, and seeds new state vectors from `{T, p, n}`.
pub trait StateDefinition {
    fn name(&self) -> &'static str;
    fn build(&self, ctx: &mut FrameContext) -> ThermoResult<()>;
    fn initial_state(
        &self,
        material: &str,
        species: &[Species],
        init: &InitialState,
        kind: MaterialKind,
    ) -> ThermoResult<Vec<f64>>;
}

fn build_common(ctx: &mut FrameContext, second: (&str, &str)) -> ThermoResult<()> {
    let k = ctx.species().len();
    let kind = ctx.kind();
    let (second_name, second_unit) = second;
    let second_dim = match kind {
        MaterialKind::Flow if second_name == "V" => unit_dim("m^3/s"),
        _ => unit_dim(second_unit),
    };
    let n_dim = match kind {
        MaterialKind::Flow => unit_dim("mol/s"),
        MaterialKind::State => unit_dim("mol"),
    };
    let names: Vec<String> = ctx.species().iter().map(|s| s.name().to_string()).collect();
    let syms = ctx.alloc_state(2 + k)?.to_vec();

    ctx.set_scalar("T", SymQuantity::new(syms[0].clone(), unit_dim("K")));
    ctx.set_scalar(second_name, SymQuantity::new(syms[1].clone(), second_dim));
    let mut n = QuantityDict::new(n_dim);
    for (name, sym) in names.into_iter().zip(&syms[2..]) {
        n.insert(name, sym.clone());
    }
    ctx.set_species("n", n);
    Ok(())
}

/// Gibbs coordinates: `[T, p, n…]`.
pub struct GibbsState;

impl StateDefinition for GibbsState {
    fn name(&self) -> &'static str {
        "GibbsState"
    }

    fn build(&self, ctx: &mut FrameContext) -> ThermoResult<()> {
        build_common(ctx, ("p", "Pa"))
    }

    fn initial_state(
        &self,
        material: &str,
        species: &[Species],
        init: &InitialState,
        kind: MaterialKind,
    ) -> ThermoResult<Vec<f64>> {
        let mut x = vec![init.t.magnitude(), init.p.magnitude()];
        for sp in species {
            x.push(init.amount(material, sp, kind)?);
        }
        Ok(x)
    }
}

/// Helmholtz coordinates: `[T, V, n…]`. The seed volume comes from the
/// ideal gas law; cubic frames project it onto the proper root through
/// their relax chain.
pub struct HelmholtzState;

impl StateDefinition for HelmholtzState {
    fn name(&self) -> &'static str {
        "HelmholtzState"
    }

    fn build(&self, ctx: &mut FrameContext) -> ThermoResult<()> {
        build_common(ctx, ("V", "m^3"))
    }

    fn initial_state(
        &self,
        material: &str,
        species: &[Species],
        init: &InitialState,
        kind: MaterialKind,
    ) -> ThermoResult<Vec<f64>> {
        let mut total = 0.0;
        let mut amounts = Vec::with_capacity(species.len());
        for sp in species {
            let a = init.amount(material, sp, kind)?;
            total += a;
            amounts.push(a);
        }
        let volume = total * GAS_CONSTANT * init.t.magnitude() / init.p.magnitude();
        let mut x = vec![init.t.magnitude(), volume];
        x.extend(amounts);
        Ok(x)
    }
}

/// A state definition behind a shared handle, as stored in frames.
pub type SharedState = Arc<dyn StateDefinition + Send + Sync>;

type StateTable = BTreeMap<String, SharedState>;

static STATES: OnceLock<RwLock<StateTable>> = OnceLock::new();

fn states() -> &'static RwLock<StateTable> {
    STATES.get_or_init(|| {
        let mut table: StateTable = BTreeMap::new();
        table.insert("GibbsState".into(), Arc::new(GibbsState));
        table.insert("HelmholtzState".into(), Arc::new(HelmholtzState));
        RwLock::new(table)
    })
}

/// Register a state definition under a new name. Append-only.
pub fn register_state(name: &str, state: SharedState) -> ThermoResult<()> {
    let mut table = states().write().expect("state registry poisoned");
    if table.contains_key(name) {
        return Err(ThermoError::DuplicateContribution {
            name: name.to_string(),
        });
    }
    table.insert(name.to_string(), state);
    Ok(())
}

/// Look up a registered state definition.
pub fn lookup_state(name: &str) -> ThermoResult<SharedState> {
    states()
        .read()
        .expect("state registry poisoned")
        .get(name)
        .cloned()
        .ok_or_else(|| ThermoError::UnknownState {
            name: name.to_string(),
        })
}
