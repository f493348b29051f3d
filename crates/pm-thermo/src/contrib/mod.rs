//! Thermodynamic contributions: the composable pieces of a state function.
//!
//! A contribution is a small stateless strategy: it declares parameters,
//! reads properties published by earlier contributions, publishes its own,
//! and may register positivity bounds and a relax hook. The process-wide
//! registry maps class names (as they appear in model-structure documents)
//! to factories; parameterized variants are instance records built from the
//! `options` map, not new types.

pub mod augment;
pub mod cubic;
pub mod ideal;
pub mod reference;
pub mod iapws;

use crate::error::{ThermoError, ThermoResult};
use crate::frame::FrameContext;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock, RwLock};

pub use augment::{Elemental, GenericProperties};
pub use cubic::{
    BostonMathiasAlphaFunction, CriticalParameters, CubicPhase, LinearMixingRule,
    NonSymmetricMixingRule, RedlichKwongAFunction, RedlichKwongBFunction, RedlichKwongEOS,
    RedlichKwongMFactor, VolumeShift,
};
pub use ideal::{ConstantGibbsVolume, GibbsIdealGas, HelmholtzIdealGas, IdealMix};
pub use iapws::{
    IdealGasIAPWS, ReducedStateIAPWS, ResidualBaseIAPWS, ResidualExponentialIAPWS,
    ResidualGaussianIAPWS, ResidualNonanalyticIAPWS, ResidualPolynomialIAPWS,
};
pub use reference::{H0S0ReferenceState, LinearHeatCapacity, StandardState};

/// A composable building block of a thermodynamic state function.
pub trait ThermoContribution {
    fn class_name(&self) -> &'static str;
    fn build(&self, ctx: &mut FrameContext) -> ThermoResult<()>;
}

/// Configuration map from a model-structure document.
pub type ContribOptions = BTreeMap<String, String>;

/// A contribution behind a shared handle, as stored in frames.
pub type SharedContribution = Arc<dyn ThermoContribution + Send + Sync>;
/// Factory signature of the contribution registry.
pub type ContribFactory = fn(&ContribOptions) -> ThermoResult<SharedContribution>;
type ContribTable = BTreeMap<String, ContribFactory>;

/// Fail on any option; for contributions that take none.
pub(crate) fn no_options(class: &str, options: &ContribOptions) -> ThermoResult<()> {
    if let Some((key, _)) = options.iter().next() {
        return Err(ThermoError::BadOption {
            contribution: class.to_string(),
            option: key.clone(),
            reason: "this contribution takes no options".into(),
        });
    }
    Ok(())
}

/// The `target` option of the mixing rules.
pub(crate) fn target_option(class: &str, options: &ContribOptions) -> ThermoResult<String> {
    for key in options.keys() {
        if key != "target" {
            return Err(ThermoError::BadOption {
                contribution: class.to_string(),
                option: key.clone(),
                reason: "only 'target' is recognized".into(),
            });
        }
    }
    options
        .get("target")
        .cloned()
        .ok_or_else(|| ThermoError::BadOption {
            contribution: class.to_string(),
            option: "target".into(),
            reason: "required".into(),
        })
}

static CONTRIBUTIONS: OnceLock<RwLock<ContribTable>> = OnceLock::new();

fn builtin_table() -> ContribTable {
    let mut t: ContribTable = BTreeMap::new();
    t.insert("H0S0ReferenceState".into(), reference::h0s0_factory);
    t.insert("LinearHeatCapacity".into(), reference::heat_capacity_factory);
    t.insert("StandardState".into(), reference::standard_state_factory);
    t.insert("IdealMix".into(), ideal::ideal_mix_factory);
    t.insert("GibbsIdealGas".into(), ideal::gibbs_ideal_gas_factory);
    t.insert("HelmholtzIdealGas".into(), ideal::helmholtz_ideal_gas_factory);
    t.insert("ConstantGibbsVolume".into(), ideal::constant_volume_factory);
    t.insert("CriticalParameters".into(), cubic::critical_parameters_factory);
    t.insert("RedlichKwongMFactor".into(), cubic::m_factor_factory);
    t.insert(
        "BostonMathiasAlphaFunction".into(),
        cubic::alpha_function_factory,
    );
    t.insert("RedlichKwongAFunction".into(), cubic::a_function_factory);
    t.insert("RedlichKwongBFunction".into(), cubic::b_function_factory);
    t.insert("LinearMixingRule".into(), cubic::linear_mixing_factory);
    t.insert(
        "NonSymmetricMixingRule".into(),
        cubic::non_symmetric_mixing_factory,
    );
    // historical triple-m spelling, kept as an alias of the same factory
    t.insert(
        "NonSymmmetricMixingRule".into(),
        cubic::non_symmetric_mixing_factory,
    );
    t.insert("VolumeShift".into(), cubic::volume_shift_factory);
    t.insert("RedlichKwongEOSGas".into(), cubic::rk_eos_gas_factory);
    t.insert("RedlichKwongEOSLiquid".into(), cubic::rk_eos_liquid_factory);
    t.insert("ReducedStateIAPWS".into(), iapws::reduced_state_factory);
    t.insert("IdealGasIAPWS".into(), iapws::ideal_gas_factory);
    t.insert(
        "ResidualPolynomialIAPWS".into(),
        iapws::residual_polynomial_factory,
    );
    t.insert(
        "ResidualExponentialIAPWS".into(),
        iapws::residual_exponential_factory,
    );
    t.insert(
        "ResidualGaussianIAPWS".into(),
        iapws::residual_gaussian_factory,
    );
    t.insert(
        "ResidualNonanalyticIAPWS".into(),
        iapws::residual_nonanalytic_factory,
    );
    t.insert("ResidualBaseIAPWS".into(), iapws::residual_base_factory);
    t.insert("GenericProperties".into(), augment::generic_properties_factory);
    t.insert("Elemental".into(), augment::elemental_factory);
    t
}

fn contributions() -> &'static RwLock<ContribTable> {
    CONTRIBUTIONS.get_or_init(|| RwLock::new(builtin_table()))
}

/// Register a contribution factory under a new class name. Append-only.
pub fn register_contribution(name: &str, factory: ContribFactory) -> ThermoResult<()> {
    let mut table = contributions().write().expect("contribution registry poisoned");
    if table.contains_key(name) {
        return Err(ThermoError::DuplicateContribution {
            name: name.to_string(),
        });
    }
    table.insert(name.to_string(), factory);
    Ok(())
}

/// Instantiate a registered contribution.
pub fn create_contribution(
    name: &str,
    options: &ContribOptions,
) -> ThermoResult<SharedContribution> {
    let table = contributions().read().expect("contribution registry poisoned");
    let factory = table.get(name).ok_or_else(|| ThermoError::UnknownContribution {
        name: name.to_string(),
    })?;
    factory(options)
}
