//! Reference-state and heat-capacity contributions.

use super::{no_options, ContribOptions, ThermoContribution};
use crate::error::ThermoResult;
use crate::frame::FrameContext;
use pm_quantity::QuantityDict;
use std::sync::Arc;

/// Enthalpy-of-formation / standard-entropy reference state.
///
/// `mu_ref_i = dh_form_i − T·s_0_i` with `dh_form` and `s_0` taken at
/// `(T_ref, p_ref)`. Seeds the `S` and `mu` accumulators and publishes the
/// reference coordinates for later contributions.
pub struct H0S0ReferenceState;

pub(crate) fn h0s0_factory(
    options: &ContribOptions,
) -> ThermoResult<Arc<dyn ThermoContribution + Send + Sync>> {
    no_options("H0S0ReferenceState", options)?;
    Ok(Arc::new(H0S0ReferenceState))
}

impl ThermoContribution for H0S0ReferenceState {
    fn class_name(&self) -> &'static str {
        "H0S0ReferenceState"
    }

    fn build(&self, ctx: &mut FrameContext) -> ThermoResult<()> {
        let dh_form = ctx.species_param("dh_form", "J/mol")?;
        let s_0 = ctx.species_param("s_0", "J/mol/K")?;
        let t_ref = ctx.scalar_param("T_ref", "K")?;
        let p_ref = ctx.scalar_param("p_ref", "Pa")?;

        let t = ctx.scalar_prop("T")?;
        let n = ctx.species_prop("n")?;

        let mu_ref = dh_form.map(dh_form.dim(), |name, dh| {
            &dh - &(&t * &s_0.get(name).expect("same species set"))
        });
        let s_ref = n
            .map(n.dim().mul(&s_0.dim()), |name, ni| {
                &ni * &s_0.get(name).expect("same species set")
            })
            .sum()
            .expect("frames have at least one species");

        ctx.set_scalar("T_ref", t_ref);
        ctx.set_scalar("p_ref", p_ref);
        ctx.set_species("mu_ref", mu_ref.clone());
        ctx.set_scalar("S_ref", s_ref.clone());
        ctx.set_species("mu", mu_ref);
        ctx.set_scalar("S", s_ref);
        Ok(())
    }
}

/// Linear heat capacity `c_p(T) = a + b·T`, integrated from `T_ref`.
///
/// Adds `∫c_p dT − T·∫c_p/T dT` to each `mu_i` and `Σ n_i ∫c_p/T dT` to
/// `S`. Requires a strictly positive temperature.
pub struct LinearHeatCapacity;

pub(crate) fn heat_capacity_factory(
    options: &ContribOptions,
) -> ThermoResult<Arc<dyn ThermoContribution + Send + Sync>> {
    no_options("LinearHeatCapacity", options)?;
    Ok(Arc::new(LinearHeatCapacity))
}

impl ThermoContribution for LinearHeatCapacity {
    fn class_name(&self) -> &'static str {
        "LinearHeatCapacity"
    }

    fn build(&self, ctx: &mut FrameContext) -> ThermoResult<()> {
        let a = ctx.species_param("a", "J/mol/K")?;
        let b = ctx.species_param("b", "J/mol/K^2")?;

        let t = ctx.scalar_prop("T")?;
        let t_ref = ctx.scalar_prop("T_ref")?;
        let n = ctx.species_prop("n")?;

        let dt = &t - &t_ref;
        let half_dt2 = (&t.sq() - &t_ref.sq()).scale(0.5);
        let ln_ratio = (&t / &t_ref).ln();

        // ΔH_i = a(T−T_ref) + b/2 (T²−T_ref²), Δs_i = a ln(T/T_ref) + b(T−T_ref)
        let ds = a.map(a.dim(), |name, ai| {
            &(&ai * &ln_ratio) + &(&b.get(name).expect("same species set") * &dt)
        });
        let mu_inc = a.map(a.dim().mul(&dt.dim()), |name, ai| {
            let dh = &(&ai * &dt) + &(&b.get(name).expect("same species set") * &half_dt2);
            &dh - &(&t * &ds.get(name).expect("same key set"))
        });

        let s_inc = n
            .map(n.dim().mul(&ds.dim()), |name, ni| {
                &ni * &ds.get(name).expect("same key set")
            })
            .sum()
            .expect("frames have at least one species");

        ctx.add_to_species("mu", mu_inc);
        ctx.add_to_scalar("S", s_inc);
        ctx.add_bound("T", t);
        Ok(())
    }
}

/// Freezes the accumulated `S` and `mu` as the standard-state values.
pub struct StandardState;

pub(crate) fn standard_state_factory(
    options: &ContribOptions,
) -> ThermoResult<Arc<dyn ThermoContribution + Send + Sync>> {
    no_options("StandardState", options)?;
    Ok(Arc::new(StandardState))
}

impl ThermoContribution for StandardState {
    fn class_name(&self) -> &'static str {
        "StandardState"
    }

    fn build(&self, ctx: &mut FrameContext) -> ThermoResult<()> {
        let s: pm_quantity::SymQuantity = ctx.scalar_prop("S")?;
        let mu: QuantityDict<pm_expr::Expr> = ctx.species_prop("mu")?;
        let p_ref = ctx.scalar_prop("p_ref")?;
        ctx.set_scalar("S_std", s);
        ctx.set_species("mu_std", mu);
        ctx.set_scalar("p_std", p_ref);
        Ok(())
    }
}
