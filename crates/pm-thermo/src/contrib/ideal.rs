//! Ideal mixing, ideal gas and constant-volume contributions.

use super::{no_options, ContribOptions, ThermoContribution};
use crate::error::ThermoResult;
use crate::frame::FrameContext;
use std::sync::Arc;

/// Ideal mixing entropy: `mu_i += R·T·ln(x_i)`, `S −= R·Σ n_i ln(x_i)`.
///
/// Every amount must stay strictly positive for the logarithms to exist;
/// each `n_i` is a bound.
pub struct IdealMix;

pub(crate) fn ideal_mix_factory(
    options: &ContribOptions,
) -> ThermoResult<Arc<dyn ThermoContribution + Send + Sync>> {
    no_options("IdealMix", options)?;
    Ok(Arc::new(IdealMix))
}

impl ThermoContribution for IdealMix {
    fn class_name(&self) -> &'static str {
        "IdealMix"
    }

    fn build(&self, ctx: &mut FrameContext) -> ThermoResult<()> {
        let r = ctx.gas_constant();
        let t = ctx.scalar_prop("T")?;
        let n = ctx.species_prop("n")?;
        let total = n.sum().expect("frames have at least one species");

        let rt = &r * &t;
        let mu_inc = n.map(rt.dim(), |_, ni| &rt * &(&ni / &total).ln());

        let mut s_dec = None;
        for (name, ni) in n.iter() {
            let term = &(&r * &ni) * &(&n.get(name).expect("same key") / &total).ln();
            s_dec = Some(match s_dec {
                Some(acc) => &acc + &term,
                None => term,
            });
            ctx.add_bound(&format!("n/{name}"), ni);
        }
        let s_dec = s_dec.expect("frames have at least one species");

        ctx.add_to_species("mu", mu_inc);
        ctx.add_to_scalar("S", -&s_dec);
        Ok(())
    }
}

/// Ideal gas on Gibbs coordinates: pressure correction from `p_ref` and the
/// ideal-gas volume.
pub struct GibbsIdealGas;

pub(crate) fn gibbs_ideal_gas_factory(
    options: &ContribOptions,
) -> ThermoResult<Arc<dyn ThermoContribution + Send + Sync>> {
    no_options("GibbsIdealGas", options)?;
    Ok(Arc::new(GibbsIdealGas))
}

impl ThermoContribution for GibbsIdealGas {
    fn class_name(&self) -> &'static str {
        "GibbsIdealGas"
    }

    fn build(&self, ctx: &mut FrameContext) -> ThermoResult<()> {
        let r = ctx.gas_constant();
        let t = ctx.scalar_prop("T")?;
        let p = ctx.scalar_prop("p")?;
        let p_ref = ctx.scalar_prop("p_ref")?;
        let n = ctx.species_prop("n")?;
        let total = n.sum().expect("frames have at least one species");

        let ln_ratio = (&p / &p_ref).ln();
        let rt = &r * &t;
        let mu_inc = n.map(rt.dim(), |_, _| &rt * &ln_ratio);
        let s_dec = &(&total * &r) * &ln_ratio;
        let volume = &(&total * &rt) / &p;

        ctx.add_to_species("mu", mu_inc);
        ctx.add_to_scalar("S", -&s_dec);
        ctx.add_to_scalar("V", volume);
        ctx.add_bound("p", p);
        Ok(())
    }
}

/// Ideal gas on Helmholtz coordinates: emits `p = N·R·T/V` and the
/// symmetric pressure corrections expressed through the state volume.
pub struct HelmholtzIdealGas;

pub(crate) fn helmholtz_ideal_gas_factory(
    options: &ContribOptions,
) -> ThermoResult<Arc<dyn ThermoContribution + Send + Sync>> {
    no_options("HelmholtzIdealGas", options)?;
    Ok(Arc::new(HelmholtzIdealGas))
}

impl ThermoContribution for HelmholtzIdealGas {
    fn class_name(&self) -> &'static str {
        "HelmholtzIdealGas"
    }

    fn build(&self, ctx: &mut FrameContext) -> ThermoResult<()> {
        let r = ctx.gas_constant();
        let t = ctx.scalar_prop("T")?;
        let v = ctx.scalar_prop("V")?;
        let p_ref = ctx.scalar_prop("p_ref")?;
        let n = ctx.species_prop("n")?;
        let total = n.sum().expect("frames have at least one species");

        let rt = &r * &t;
        let pressure = &(&total * &rt) / &v;
        let ln_ratio = (&pressure / &p_ref).ln();
        let mu_inc = n.map(rt.dim(), |_, _| &rt * &ln_ratio);
        let s_dec = &(&total * &r) * &ln_ratio;

        ctx.add_to_species("mu", mu_inc);
        ctx.add_to_scalar("S", -&s_dec);
        ctx.add_to_scalar("p", pressure);
        ctx.add_bound("V", v);
        Ok(())
    }
}

/// Pressure-proportional chemical potential over a constant molar volume:
/// `V += Σ v_n,i·n_i`, `mu_i += v_n,i·(p − p_ref)`.
pub struct ConstantGibbsVolume;

pub(crate) fn constant_volume_factory(
    options: &ContribOptions,
) -> ThermoResult<Arc<dyn ThermoContribution + Send + Sync>> {
    no_options("ConstantGibbsVolume", options)?;
    Ok(Arc::new(ConstantGibbsVolume))
}

impl ThermoContribution for ConstantGibbsVolume {
    fn class_name(&self) -> &'static str {
        "ConstantGibbsVolume"
    }

    fn build(&self, ctx: &mut FrameContext) -> ThermoResult<()> {
        let v_n = ctx.species_param("v_n", "m^3/mol")?;
        let p = ctx.scalar_prop("p")?;
        let p_ref = ctx.scalar_prop("p_ref")?;
        let n = ctx.species_prop("n")?;

        let dp = &p - &p_ref;
        let volume = n
            .map(n.dim().mul(&v_n.dim()), |name, ni| {
                &ni * &v_n.get(name).expect("same species set")
            })
            .sum()
            .expect("frames have at least one species");
        let mu_inc = v_n.map(v_n.dim().mul(&dp.dim()), |_, vi| &vi * &dp);

        ctx.add_to_scalar("V", volume);
        ctx.add_to_species("mu", mu_inc);
        Ok(())
    }
}
