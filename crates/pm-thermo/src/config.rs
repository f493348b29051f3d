//! Frame construction from model-structure documents.

use crate::contrib::{create_contribution, ContribOptions};
use crate::error::ThermoResult;
use crate::frame::ThermoFrame;
use crate::species::Species;
use crate::state::lookup_state;
use serde::Deserialize;
use std::sync::Arc;

/// `{state, contributions}` mapping of a model-structure document.
#[derive(Debug, Clone, Deserialize)]
pub struct FrameConfig {
    pub state: String,
    pub contributions: Vec<ContributionConfig>,
}

/// One contribution entry: either a bare class name or a detailed record
/// with an instance alias and options.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ContributionConfig {
    Name(String),
    Detailed {
        cls: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        options: ContribOptions,
    },
}

impl ContributionConfig {
    fn class(&self) -> &str {
        match self {
            ContributionConfig::Name(name) => name,
            ContributionConfig::Detailed { cls, .. } => cls,
        }
    }

    fn instance_name(&self) -> &str {
        match self {
            ContributionConfig::Name(name) => name,
            ContributionConfig::Detailed { cls, name, .. } => name.as_deref().unwrap_or(cls),
        }
    }

    fn options(&self) -> ContribOptions {
        match self {
            ContributionConfig::Name(_) => ContribOptions::new(),
            ContributionConfig::Detailed { options, .. } => options.clone(),
        }
    }
}

/// Resolve a frame config through the state and contribution registries.
pub fn build_frame(config: &FrameConfig, species: Vec<Species>) -> ThermoResult<Arc<ThermoFrame>> {
    let state = lookup_state(&config.state)?;
    let mut contributions = Vec::with_capacity(config.contributions.len());
    for entry in &config.contributions {
        let contribution = create_contribution(entry.class(), &entry.options())?;
        contributions.push((entry.instance_name().to_string(), contribution));
    }
    ThermoFrame::new(species, state, contributions)
}

/// Parse a frame config from YAML and build the frame.
pub fn build_frame_from_yaml(text: &str, species: Vec<Species>) -> ThermoResult<Arc<ThermoFrame>> {
    let config: FrameConfig =
        serde_yaml::from_str(text).map_err(|e| crate::error::ThermoError::Document {
            path: "frame config".into(),
            reason: e.to_string(),
        })?;
    build_frame(&config, species)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PropKind;

    fn methane() -> Vec<Species> {
        vec![Species::new("CH4", "CH4").unwrap()]
    }

    const GAS_FRAME: &str = "\
state: GibbsState
contributions:
  - H0S0ReferenceState
  - LinearHeatCapacity
  - StandardState
  - IdealMix
  - GibbsIdealGas
";

    #[test]
    fn gibbs_ideal_gas_frame_assembles() {
        let frame = build_frame_from_yaml(GAS_FRAME, methane()).unwrap();
        let props = frame.property_structure().unwrap();
        for name in ["_state", "T", "p", "n", "S", "mu", "V"] {
            assert!(props.contains(name), "missing {name}");
        }
        assert!(props
            .props
            .iter()
            .any(|(n, k)| n == "mu" && *k == PropKind::PerSpecies));
    }

    #[test]
    fn parameter_structure_enumerates_union_of_needs() {
        let frame = build_frame_from_yaml(GAS_FRAME, methane()).unwrap();
        let params = frame.parameter_structure().unwrap();
        let paths: Vec<&str> = params.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "H0S0ReferenceState/dh_form/CH4",
                "H0S0ReferenceState/s_0/CH4",
                "H0S0ReferenceState/T_ref",
                "H0S0ReferenceState/p_ref",
                "LinearHeatCapacity/a/CH4",
                "LinearHeatCapacity/b/CH4",
            ]
        );
    }

    #[test]
    fn rk_frame_with_options_assembles() {
        let text = "\
state: HelmholtzState
contributions:
  - H0S0ReferenceState
  - LinearHeatCapacity
  - IdealMix
  - HelmholtzIdealGas
  - CriticalParameters
  - RedlichKwongMFactor
  - BostonMathiasAlphaFunction
  - RedlichKwongAFunction
  - RedlichKwongBFunction
  - {cls: LinearMixingRule, name: AMix, options: {target: _ceos_a}}
  - {cls: LinearMixingRule, name: BMix, options: {target: _ceos_b}}
  - RedlichKwongEOSGas
";
        let frame = build_frame_from_yaml(text, methane()).unwrap();
        assert!(frame.property_structure().unwrap().contains("_ceos_a"));
    }

    #[test]
    fn out_of_order_stack_is_rejected_at_assembly() {
        let text = "\
state: GibbsState
contributions:
  - GibbsIdealGas
  - H0S0ReferenceState
";
        let err = build_frame_from_yaml(text, methane()).unwrap_err();
        assert!(matches!(
            err,
            crate::error::ThermoError::MissingRequirement { .. }
        ));
    }

    #[test]
    fn incomplete_frame_is_rejected() {
        let text = "\
state: GibbsState
contributions:
  - H0S0ReferenceState
  - IdealMix
";
        // no volume anywhere in the stack
        let err = build_frame_from_yaml(text, methane()).unwrap_err();
        assert!(matches!(
            err,
            crate::error::ThermoError::FrameIncomplete { .. }
        ));
    }

    #[test]
    fn water_iapws_frame_assembles() {
        let text = "\
state: HelmholtzState
contributions:
  - ReducedStateIAPWS
  - IdealGasIAPWS
  - ResidualPolynomialIAPWS
  - ResidualExponentialIAPWS
  - ResidualGaussianIAPWS
  - ResidualNonanalyticIAPWS
  - ResidualBaseIAPWS
  - GenericProperties
  - Elemental
";
        let frame =
            build_frame_from_yaml(text, vec![Species::new("H2O", "H2O").unwrap()]).unwrap();
        let props = frame.property_structure().unwrap();
        for name in ["p", "S", "mu", "H", "mass", "elements"] {
            assert!(props.contains(name), "missing {name}");
        }
    }
}
