//! Shared fixtures: a pure-methane ideal-gas flow definition and the
//! matching flow-specification model.
#![allow(dead_code)]

use pm_model::{DefineContext, Interface, ModelResult, ProcessModel};
use pm_quantity::{parse_quantity, NumQuantity, QuantityDict};
use pm_thermo::{
    build_frame_from_yaml, InitialState, MaterialDefinition, MaterialKind, NestedSource,
    Species, ThermoParameterStore,
};
use std::sync::Arc;

pub const DH_FORM: f64 = -74_873.0;
pub const S_0: f64 = 186.3;

/// Route solver `tracing` output into the test harness. Safe to call from
/// every test; only the first call installs the subscriber.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub const GAS_FRAME: &str = "\
state: GibbsState
contributions:
  - H0S0ReferenceState
  - LinearHeatCapacity
  - StandardState
  - IdealMix
  - GibbsIdealGas
";

pub fn methane_parameters() -> &'static str {
    "\
H0S0ReferenceState:
  dh_form:
    CH4: -74.873 kJ/mol
  s_0:
    CH4: 186.3 J/mol/K
  T_ref: 298.15 K
  p_ref: 1 bar
LinearHeatCapacity:
  a:
    CH4: 35.69 J/mol/K
  b:
    CH4: 0 J/mol/K^2
"
}

pub fn methane_definition() -> Arc<MaterialDefinition> {
    init_tracing();
    let frame = build_frame_from_yaml(GAS_FRAME, vec![Species::new("CH4", "CH4").unwrap()])
        .expect("frame assembles");
    let mut store = ThermoParameterStore::new();
    store.add_source(Arc::new(
        NestedSource::from_yaml_str("methane", methane_parameters()).expect("parameters parse"),
    ));
    let initial = InitialState::new(
        parse_quantity("400 K").unwrap(),
        parse_quantity("2 bar").unwrap(),
        QuantityDict::from_entries(parse_quantity("1 mol/s").unwrap().dim(), [("CH4", 1.0)]),
    )
    .unwrap();
    MaterialDefinition::new(frame, initial, Arc::new(store))
}

/// Fixes `T`, `p` and the volume flow of one methane feed: a square
/// three-equation model over the material's `[T, p, n]` slice.
pub struct MethaneFlowModel {
    pub definition: Arc<MaterialDefinition>,
}

impl MethaneFlowModel {
    pub fn new() -> Self {
        MethaneFlowModel {
            definition: methane_definition(),
        }
    }
}

impl ProcessModel for MethaneFlowModel {
    fn interface(&self, ifc: &mut Interface) -> ModelResult<()> {
        ifc.parameter("T", parse_quantity("25 degC")?)?;
        ifc.parameter("p", parse_quantity("1 bar")?)?;
        ifc.parameter("V", parse_quantity("10 m^3/h")?)?;
        ifc.property("n_total", "mol/s")?;
        ifc.material("feed", Arc::clone(&self.definition), MaterialKind::Flow)?;
        Ok(())
    }

    fn define(&self, ctx: &mut DefineContext<'_>) -> ModelResult<()> {
        let (t, p, v, n) = {
            let feed = ctx.material("feed")?;
            (
                feed.instance().scalar("T")?,
                feed.instance().scalar("p")?,
                feed.instance().scalar("V")?,
                feed.instance().per_species("n")?,
            )
        };

        let t_spec = ctx.param("T")?;
        let p_spec = ctx.param("p")?;
        let v_spec = ctx.param("V")?;

        ctx.add_residual("spec_T", &t - &t_spec, parse_quantity("1e-6 K")?)?;
        ctx.add_residual("spec_p", &p - &p_spec, parse_quantity("0.01 Pa")?)?;
        ctx.add_residual("spec_V", &v - &v_spec, parse_quantity("1e-9 m^3/s")?)?;

        ctx.set_prop("n_total", n.sum().expect("one species"))?;
        Ok(())
    }
}

/// Expected molar flow for `p·V = N·R·T` at the specified conditions.
pub fn expected_flow() -> f64 {
    let volume = 10.0 / 3600.0;
    1e5 * volume / (pm_thermo::GAS_CONSTANT * 298.15)
}

pub fn q(text: &str) -> NumQuantity {
    parse_quantity(text).unwrap()
}
