//! Augmenter contributions: derived properties on top of an assembled
//! frame.

use super::{no_options, ContribOptions, ThermoContribution};
use crate::error::ThermoResult;
use crate::frame::FrameContext;
use pm_core::MCounter;
use pm_quantity::{QuantityDict, SymQuantity};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Mass flow, enthalpy `H = G + T·S` and mean molecular weight.
pub struct GenericProperties;

pub(crate) fn generic_properties_factory(
    options: &ContribOptions,
) -> ThermoResult<Arc<dyn ThermoContribution + Send + Sync>> {
    no_options("GenericProperties", options)?;
    Ok(Arc::new(GenericProperties))
}

impl ThermoContribution for GenericProperties {
    fn class_name(&self) -> &'static str {
        "GenericProperties"
    }

    fn build(&self, ctx: &mut FrameContext) -> ThermoResult<()> {
        let t = ctx.scalar_prop("T")?;
        let s = ctx.scalar_prop("S")?;
        let n = ctx.species_prop("n")?;
        let mu = ctx.species_prop("mu")?;

        let mw: Vec<(String, SymQuantity)> = ctx
            .species()
            .iter()
            .map(|sp| {
                (
                    sp.name().to_string(),
                    SymQuantity::constant(ctx.graph(), &sp.molecular_weight()),
                )
            })
            .collect();

        let mut mass: Option<SymQuantity> = None;
        let mut gibbs: Option<SymQuantity> = None;
        for (name, ni) in n.iter() {
            let mw_i = &mw.iter().find(|(k, _)| k == name).expect("frame species").1;
            let m_term = &ni * mw_i;
            let g_term = &ni * &mu.get(name).expect("same species set");
            mass = Some(match mass {
                Some(acc) => &acc + &m_term,
                None => m_term,
            });
            gibbs = Some(match gibbs {
                Some(acc) => &acc + &g_term,
                None => g_term,
            });
        }
        let mass = mass.expect("frames have at least one species");
        let gibbs = gibbs.expect("frames have at least one species");
        let total = n.sum().expect("frames have at least one species");

        ctx.set_scalar("mass", mass.clone());
        ctx.set_scalar("H", &gibbs + &(&t * &s));
        ctx.set_scalar("MW", &mass / &total);
        Ok(())
    }
}

/// Elemental mole flows from the species composition vectors.
pub struct Elemental;

pub(crate) fn elemental_factory(
    options: &ContribOptions,
) -> ThermoResult<Arc<dyn ThermoContribution + Send + Sync>> {
    no_options("Elemental", options)?;
    Ok(Arc::new(Elemental))
}

impl ThermoContribution for Elemental {
    fn class_name(&self) -> &'static str {
        "Elemental"
    }

    fn build(&self, ctx: &mut FrameContext) -> ThermoResult<()> {
        let n = ctx.species_prop("n")?;

        let mut element_names: BTreeSet<String> = BTreeSet::new();
        for sp in ctx.species() {
            element_names.extend(sp.elements().keys().map(|e| e.to_string()));
        }

        let mut flows = QuantityDict::new(n.dim());
        for element in element_names {
            // species-name → atom count of this element, dotted with n
            let counts = MCounter::from_entries(
                ctx.species()
                    .iter()
                    .map(|sp| (sp.name().to_string(), sp.elements().get(&element))),
            );
            if let Some(flow) = counts.dot(n.magnitudes()) {
                flows.insert(element, flow);
            }
        }
        ctx.set_species("elements", flows);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::MaterialKind;
    use crate::species::Species;
    use crate::state::{GibbsState, StateDefinition};
    use pm_expr::{CompiledFn, Expr, Graph};

    #[test]
    fn elemental_flows_follow_composition() {
        let graph = Graph::new();
        let species = [
            Species::new("CH4", "CH4").unwrap(),
            Species::new("H2O", "H2O").unwrap(),
        ];
        let mut ctx = FrameContext::new(&graph, "m", MaterialKind::Flow, &species);
        ctx.set_current("GibbsState");
        GibbsState.build(&mut ctx).unwrap();
        ctx.set_current("Elemental");
        Elemental.build(&mut ctx).unwrap();

        let flows = ctx.species_prop("elements").unwrap();
        let keys: Vec<&str> = flows.keys().collect();
        assert_eq!(keys, vec!["C", "H", "O"]);

        let outputs: Vec<Expr> = ["C", "H", "O"]
            .iter()
            .map(|e| flows.get(e).unwrap().mag_ref().clone())
            .collect();
        let f = CompiledFn::new(&ctx.state_syms, &outputs).unwrap();
        // n_CH4 = 2 mol/s, n_H2O = 3 mol/s
        let out = f.eval(&[300.0, 1e5, 2.0, 3.0]).unwrap();
        assert_eq!(out[0], 2.0); // C
        assert_eq!(out[1], 2.0 * 4.0 + 3.0 * 2.0); // H
        assert_eq!(out[2], 3.0); // O
    }
}
