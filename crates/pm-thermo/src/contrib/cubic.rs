//! Redlich-Kwong cubic equation of state and its supporting contributions.
//!
//! The EOS works on Helmholtz coordinates: the residual Helmholtz energy is
//! assembled symbolically and its exact derivatives provide the pressure,
//! entropy and chemical-potential contributions. Phase selection never
//! appears in the graph; the discriminant-based root classifier is plain
//! numeric code driven by the relax hook, which projects the stepped volume
//! onto the requested branch after every accepted step.

use super::{no_options, target_option, ContribOptions, ThermoContribution};
use crate::error::ThermoResult;
use crate::frame::{FrameContext, GAS_CONSTANT};
use pm_expr::{cond, diff::gradient, Expr};
use pm_quantity::{Dimension, SymQuantity};
use std::sync::Arc;

/// Publishes the per-species critical parameters as properties.
pub struct CriticalParameters;

pub(crate) fn critical_parameters_factory(
    options: &ContribOptions,
) -> ThermoResult<Arc<dyn ThermoContribution + Send + Sync>> {
    no_options("CriticalParameters", options)?;
    Ok(Arc::new(CriticalParameters))
}

impl ThermoContribution for CriticalParameters {
    fn class_name(&self) -> &'static str {
        "CriticalParameters"
    }

    fn build(&self, ctx: &mut FrameContext) -> ThermoResult<()> {
        let t_c = ctx.species_param("T_c", "K")?;
        let p_c = ctx.species_param("p_c", "Pa")?;
        let omega = ctx.species_param("omega", "dimless")?;
        ctx.set_species("T_c", t_c);
        ctx.set_species("p_c", p_c);
        ctx.set_species("omega", omega);
        Ok(())
    }
}

/// `m = 0.48508 − (0.15613·ω − 1.55171)·ω`.
pub struct RedlichKwongMFactor;

pub(crate) fn m_factor_factory(
    options: &ContribOptions,
) -> ThermoResult<Arc<dyn ThermoContribution + Send + Sync>> {
    no_options("RedlichKwongMFactor", options)?;
    Ok(Arc::new(RedlichKwongMFactor))
}

impl ThermoContribution for RedlichKwongMFactor {
    fn class_name(&self) -> &'static str {
        "RedlichKwongMFactor"
    }

    fn build(&self, ctx: &mut FrameContext) -> ThermoResult<()> {
        let omega = ctx.species_prop("omega")?;
        let c1 = ctx.constant(0.48508, "dimless")?;
        let c2 = ctx.constant(0.15613, "dimless")?;
        let c3 = ctx.constant(1.55171, "dimless")?;
        let m = omega.map(Dimension::NONE, |_, w| {
            &c1 - &(&(&(&c2 * &w) - &c3) * &w)
        });
        ctx.set_species("_ceos_m", m);
        Ok(())
    }
}

/// Boston-Mathias alpha function with `η` polar correction.
///
/// Sub-critical branch `α = 1 + m(1−τ) − η(1−τ)(0.7−τ²)` with
/// `τ = √(T/T_c)`; super-critical branch `α = exp((c/d)(1−τ^d))` with
/// `c = m + 0.3η` and `d = 1 + c + 4η/c`, which matches value, first and
/// second derivative at `τ = 1`.
pub struct BostonMathiasAlphaFunction;

pub(crate) fn alpha_function_factory(
    options: &ContribOptions,
) -> ThermoResult<Arc<dyn ThermoContribution + Send + Sync>> {
    no_options("BostonMathiasAlphaFunction", options)?;
    Ok(Arc::new(BostonMathiasAlphaFunction))
}

impl ThermoContribution for BostonMathiasAlphaFunction {
    fn class_name(&self) -> &'static str {
        "BostonMathiasAlphaFunction"
    }

    fn build(&self, ctx: &mut FrameContext) -> ThermoResult<()> {
        let eta = ctx.species_param("eta", "dimless")?;
        let t = ctx.scalar_prop("T")?;
        let t_c = ctx.species_prop("T_c")?;
        let m = ctx.species_prop("_ceos_m")?;

        let one = ctx.constant(1.0, "dimless")?;
        let alpha = m.map(Dimension::NONE, |name, mi| {
            let eta_i = eta.get(name).expect("same species set");
            let tau = (&t / &t_c.get(name).expect("same species set")).sqrt();
            let one_m_tau = &one - &tau;

            let sub = &(&one + &(&mi * &one_m_tau))
                - &(&(&eta_i * &one_m_tau)
                    * &(&ctx.constant(0.7, "dimless").expect("known unit") - &tau.sq()));

            let c = &mi + &eta_i.scale(0.3);
            let d = &(&one + &c) + &(&eta_i.scale(4.0) / &c);
            // τ^d with a symbolic exponent: exp(d·ln τ)
            let tau_pow_d = (&d * &tau.ln()).exp();
            let sup = (&(&c / &d) * &(&one - &tau_pow_d)).exp();

            SymQuantity::new(
                cond(one_m_tau.mag_ref(), sub.mag_ref(), sup.mag_ref()),
                Dimension::NONE,
            )
        });
        ctx.set_species("_ceos_alpha", alpha);
        Ok(())
    }
}

/// `a_i = 29.5518·α_i·T_c,i²/p_c,i`. The constant carries `R²`.
pub struct RedlichKwongAFunction;

pub(crate) fn a_function_factory(
    options: &ContribOptions,
) -> ThermoResult<Arc<dyn ThermoContribution + Send + Sync>> {
    no_options("RedlichKwongAFunction", options)?;
    Ok(Arc::new(RedlichKwongAFunction))
}

impl ThermoContribution for RedlichKwongAFunction {
    fn class_name(&self) -> &'static str {
        "RedlichKwongAFunction"
    }

    fn build(&self, ctx: &mut FrameContext) -> ThermoResult<()> {
        let alpha = ctx.species_prop("_ceos_alpha")?;
        let t_c = ctx.species_prop("T_c")?;
        let p_c = ctx.species_prop("p_c")?;
        let coeff = ctx.constant(29.5518, "J^2/mol^2/K^2")?;

        let dim = coeff
            .dim()
            .mul(&t_c.dim().pow(pm_quantity::Rat::int(2)))
            .div(&p_c.dim());
        let a_i = alpha.map(dim, |name, al| {
            let tc = t_c.get(name).expect("same species set");
            let pc = p_c.get(name).expect("same species set");
            &(&(&coeff * &al) * &tc.sq()) / &pc
        });
        ctx.set_species("_ceos_a_i", a_i);
        Ok(())
    }
}

/// `b_i = 0.720368·T_c,i/p_c,i`. The constant carries `R`.
pub struct RedlichKwongBFunction;

pub(crate) fn b_function_factory(
    options: &ContribOptions,
) -> ThermoResult<Arc<dyn ThermoContribution + Send + Sync>> {
    no_options("RedlichKwongBFunction", options)?;
    Ok(Arc::new(RedlichKwongBFunction))
}

impl ThermoContribution for RedlichKwongBFunction {
    fn class_name(&self) -> &'static str {
        "RedlichKwongBFunction"
    }

    fn build(&self, ctx: &mut FrameContext) -> ThermoResult<()> {
        let t_c = ctx.species_prop("T_c")?;
        let p_c = ctx.species_prop("p_c")?;
        let coeff = ctx.constant(0.720368, "J/mol/K")?;

        let dim = coeff.dim().mul(&t_c.dim()).div(&p_c.dim());
        let b_i = t_c.map(dim, |name, tc| {
            &(&coeff * &tc) / &p_c.get(name).expect("same species set")
        });
        ctx.set_species("_ceos_b_i", b_i);
        Ok(())
    }
}

/// `target = Σ c_i·n_i` over the per-species property `<target>_i`.
pub struct LinearMixingRule {
    target: String,
}

pub(crate) fn linear_mixing_factory(
    options: &ContribOptions,
) -> ThermoResult<Arc<dyn ThermoContribution + Send + Sync>> {
    Ok(Arc::new(LinearMixingRule {
        target: target_option("LinearMixingRule", options)?,
    }))
}

impl ThermoContribution for LinearMixingRule {
    fn class_name(&self) -> &'static str {
        "LinearMixingRule"
    }

    fn build(&self, ctx: &mut FrameContext) -> ThermoResult<()> {
        let coeffs = ctx.species_prop(&format!("{}_i", self.target))?;
        let n = ctx.species_prop("n")?;
        let mixed = n
            .map(n.dim().mul(&coeffs.dim()), |name, ni| {
                &ni * &coeffs.get(name).expect("same species set")
            })
            .sum()
            .expect("frames have at least one species");
        ctx.set_scalar(&self.target, mixed);
        Ok(())
    }
}

/// Temperature-dependent non-symmetric quadratic mixing rule with per-pair
/// `k1`, `k2` and `l1` interaction parameters.
pub struct NonSymmetricMixingRule {
    target: String,
}

pub(crate) fn non_symmetric_mixing_factory(
    options: &ContribOptions,
) -> ThermoResult<Arc<dyn ThermoContribution + Send + Sync>> {
    Ok(Arc::new(NonSymmetricMixingRule {
        target: target_option("NonSymmetricMixingRule", options)?,
    }))
}

impl ThermoContribution for NonSymmetricMixingRule {
    fn class_name(&self) -> &'static str {
        "NonSymmetricMixingRule"
    }

    fn build(&self, ctx: &mut FrameContext) -> ThermoResult<()> {
        let k1 = ctx.pair_param("k1", "dimless")?;
        let k2 = ctx.pair_param("k2", "dimless")?;
        let l1 = ctx.pair_param("l1", "dimless")?;

        let coeffs = ctx.species_prop(&format!("{}_i", self.target))?;
        let n = ctx.species_prop("n")?;
        let t = ctx.scalar_prop("T")?;
        let t_ref = ctx.scalar_prop("T_ref")?;
        let one = ctx.constant(1.0, "dimless")?;
        let total = n.sum().expect("frames have at least one species");
        let t_dev = &(&t / &t_ref) - &one;

        let names: Vec<String> = n.keys().map(|s| s.to_string()).collect();
        let sqrt_a: Vec<SymQuantity> = names
            .iter()
            .map(|name| coeffs.get(name).expect("same species set").sqrt())
            .collect();
        let amounts: Vec<SymQuantity> = names
            .iter()
            .map(|name| n.get(name).expect("same key set"))
            .collect();

        // (Σ √a_i n_i)²
        let mut diag = &sqrt_a[0] * &amounts[0];
        for i in 1..names.len() {
            diag = &diag + &(&sqrt_a[i] * &amounts[i]);
        }
        let mut mixed = diag.sq();

        for i in 0..names.len() {
            for j in (i + 1)..names.len() {
                let pair = (names[i].clone(), names[j].clone());
                let k1_ij = &k1[&pair];
                let k2_ij = &k2[&pair];
                let l1_ij = &l1[&pair];
                let gmean = &sqrt_a[i] * &sqrt_a[j];
                let nn = &amounts[i] * &amounts[j];

                // symmetric temperature-dependent correction
                let sym = &(&nn.scale(2.0) * &gmean) * &(k1_ij - &(k2_ij * &t_dev));
                // non-symmetric Panagiotopoulos-style term
                let skew = &(&(&(&amounts[j] - &amounts[i]) * &nn) * &gmean) * l1_ij;
                mixed = &(&mixed + &sym) - &(&skew / &total).scale(2.0);
            }
        }
        ctx.set_scalar(&self.target, mixed);
        Ok(())
    }
}

/// Peneloux-style volume translation: `_ceos_c = Σ c_i·n_i`.
pub struct VolumeShift;

pub(crate) fn volume_shift_factory(
    options: &ContribOptions,
) -> ThermoResult<Arc<dyn ThermoContribution + Send + Sync>> {
    no_options("VolumeShift", options)?;
    Ok(Arc::new(VolumeShift))
}

impl ThermoContribution for VolumeShift {
    fn class_name(&self) -> &'static str {
        "VolumeShift"
    }

    fn build(&self, ctx: &mut FrameContext) -> ThermoResult<()> {
        let c = ctx.species_param("c", "m^3/mol")?;
        let n = ctx.species_prop("n")?;
        let shift = n
            .map(n.dim().mul(&c.dim()), |name, ni| {
                &ni * &c.get(name).expect("same species set")
            })
            .sum()
            .expect("frames have at least one species");
        ctx.set_scalar("_ceos_c", shift);
        Ok(())
    }
}

/// Which cubic root the frame keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CubicPhase {
    Gas,
    Liquid,
}

/// Redlich-Kwong equation of state on Helmholtz coordinates.
///
/// Adds the residual Helmholtz energy
/// `A_res = N·R·T·ln(Ṽ/(Ṽ−b)) − (a/b)·ln((Ṽ+b)/Ṽ)` over the shifted volume
/// `Ṽ = V + _ceos_c` and derives `p`, `S` and `mu` contributions from its
/// exact graph derivatives.
pub struct RedlichKwongEOS {
    phase: CubicPhase,
}

pub(crate) fn rk_eos_gas_factory(
    options: &ContribOptions,
) -> ThermoResult<Arc<dyn ThermoContribution + Send + Sync>> {
    no_options("RedlichKwongEOSGas", options)?;
    Ok(Arc::new(RedlichKwongEOS {
        phase: CubicPhase::Gas,
    }))
}

pub(crate) fn rk_eos_liquid_factory(
    options: &ContribOptions,
) -> ThermoResult<Arc<dyn ThermoContribution + Send + Sync>> {
    no_options("RedlichKwongEOSLiquid", options)?;
    Ok(Arc::new(RedlichKwongEOS {
        phase: CubicPhase::Liquid,
    }))
}

impl ThermoContribution for RedlichKwongEOS {
    fn class_name(&self) -> &'static str {
        match self.phase {
            CubicPhase::Gas => "RedlichKwongEOSGas",
            CubicPhase::Liquid => "RedlichKwongEOSLiquid",
        }
    }

    fn build(&self, ctx: &mut FrameContext) -> ThermoResult<()> {
        let r = ctx.gas_constant();
        let t = ctx.scalar_prop("T")?;
        let v = ctx.scalar_prop("V")?;
        let n = ctx.species_prop("n")?;
        let a = ctx.scalar_prop("_ceos_a")?;
        let b = ctx.scalar_prop("_ceos_b")?;
        let shift = if ctx.has_prop("_ceos_c") {
            ctx.scalar_prop("_ceos_c")?
        } else {
            SymQuantity::literal(ctx.graph(), 0.0, v.dim())
        };

        let total = n.sum().expect("frames have at least one species");
        let vt = &v + &shift;
        let nrt = &(&total * &r) * &t;
        let a_res = &(&nrt * &(&vt / &(&vt - &b)).ln())
            - &(&(&a / &b) * &(&(&vt + &b) / &vt).ln());

        // Exact derivatives of the residual potential: S = −∂A/∂T,
        // p = −∂A/∂V, mu_i = ∂A/∂n_i.
        let grad = gradient(a_res.mag_ref());
        let state = ctx.state_syms.clone();
        let deriv = |sym: &Expr, out_dim: Dimension| -> SymQuantity {
            let id = sym.as_symbol().expect("state entries are symbols");
            let mag = grad
                .get(&id)
                .cloned()
                .unwrap_or_else(|| ctx.graph().constant(0.0));
            SymQuantity::new(mag, out_dim)
        };

        let a_dim = a_res.dim();
        let da_dt = deriv(&state[0], a_dim.div(&t.dim()));
        let da_dv = deriv(&state[1], a_dim.div(&v.dim()));
        let mu_inc = n.map(a_dim.div(&n.dim()), |name, _| {
            let idx = 2 + ctx
                .species()
                .iter()
                .position(|s| s.name() == name)
                .expect("species present");
            deriv(&state[idx], a_dim.div(&n.dim()))
        });

        ctx.add_to_scalar("S", -&da_dt);
        ctx.add_to_scalar("p", -&da_dv);
        ctx.add_to_species("mu", mu_inc);
        ctx.add_bound("covolume", &vt - &b);

        // Root projection for the solver: evaluate (T, p, a, b, c) at the
        // stepped state and put V back on the requested branch.
        let p_full = ctx.scalar_prop("p")?;
        let phase = self.phase;
        ctx.set_relax(
            vec![
                t.mag_ref().clone(),
                p_full.mag_ref().clone(),
                a.mag_ref().clone(),
                b.mag_ref().clone(),
                shift.mag_ref().clone(),
            ],
            move |slice, vals| {
                let (t, p, a, b, c) = (vals[0], vals[1], vals[2], vals[3], vals[4]);
                if p <= 0.0 || t <= 0.0 {
                    return;
                }
                let total: f64 = slice[2..].iter().sum();
                let nrt = total * GAS_CONSTANT * t;
                if let Some(root) = select_volume_root(p, nrt, a, b, phase) {
                    slice[1] = root - c;
                }
            },
        );
        Ok(())
    }
}

/// Real roots of the RK pressure cubic at fixed `(T, p, n)`, classified by
/// phase: the largest root above the covolume for gas, the smallest for
/// liquid.
pub(crate) fn select_volume_root(
    p: f64,
    nrt: f64,
    a: f64,
    b: f64,
    phase: CubicPhase,
) -> Option<f64> {
    // p·Ṽ³ − NRT·Ṽ² + (a − p·b² − NRT·b)·Ṽ − a·b = 0
    let roots = cubic_real_roots(p, -nrt, a - p * b * b - nrt * b, -a * b);
    let physical = roots.into_iter().filter(|&v| v > b);
    match phase {
        CubicPhase::Gas => physical.fold(None, |acc: Option<f64>, v| {
            Some(acc.map_or(v, |best| best.max(v)))
        }),
        CubicPhase::Liquid => physical.fold(None, |acc: Option<f64>, v| {
            Some(acc.map_or(v, |best| best.min(v)))
        }),
    }
}

/// Real roots of `c3·x³ + c2·x² + c1·x + c0 = 0` via the discriminant of the
/// depressed cubic (trigonometric form for three real roots, Cardano for
/// one).
pub fn cubic_real_roots(c3: f64, c2: f64, c1: f64, c0: f64) -> Vec<f64> {
    if c3.abs() < 1e-300 {
        // degenerate: quadratic
        if c2.abs() < 1e-300 {
            if c1.abs() < 1e-300 {
                return vec![];
            }
            return vec![-c0 / c1];
        }
        let disc = c1 * c1 - 4.0 * c2 * c0;
        if disc < 0.0 {
            return vec![];
        }
        let s = disc.sqrt();
        return vec![(-c1 + s) / (2.0 * c2), (-c1 - s) / (2.0 * c2)];
    }
    let aa = c2 / c3;
    let bb = c1 / c3;
    let cc = c0 / c3;
    // depressed form t³ + p t + q, x = t − aa/3
    let p = bb - aa * aa / 3.0;
    let q = 2.0 * aa.powi(3) / 27.0 - aa * bb / 3.0 + cc;
    let shift = -aa / 3.0;
    let disc = -4.0 * p.powi(3) - 27.0 * q * q;

    if disc > 0.0 {
        // three distinct real roots
        let m = 2.0 * (-p / 3.0).sqrt();
        let arg = (3.0 * q / (p * m)).clamp(-1.0, 1.0);
        let theta = arg.acos() / 3.0;
        (0..3)
            .map(|k| m * (theta - 2.0 * std::f64::consts::PI * k as f64 / 3.0).cos() + shift)
            .collect()
    } else {
        let half_q = q / 2.0;
        let delta = (q * q / 4.0 + p.powi(3) / 27.0).max(0.0).sqrt();
        let u = (-half_q + delta).cbrt();
        let v = (-half_q - delta).cbrt();
        vec![u + v + shift]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::MaterialKind;
    use crate::species::Species;
    use crate::state::{HelmholtzState, StateDefinition};
    use pm_expr::{CompiledFn, Graph};

    fn methane() -> Species {
        Species::new("CH4", "CH4").unwrap()
    }

    #[test]
    fn cubic_roots_cover_both_discriminant_signs() {
        // (x−1)(x−2)(x−3): three real roots
        let mut roots = cubic_real_roots(1.0, -6.0, 11.0, -6.0);
        roots.sort_by(f64::total_cmp);
        assert_eq!(roots.len(), 3);
        for (root, expected) in roots.iter().zip([1.0, 2.0, 3.0]) {
            assert!((root - expected).abs() < 1e-9, "{root} vs {expected}");
        }

        // x³ + x + 1: single real root
        let roots = cubic_real_roots(1.0, 0.0, 1.0, 1.0);
        assert_eq!(roots.len(), 1);
        let x = roots[0];
        assert!((x * x * x + x + 1.0).abs() < 1e-9);
    }

    #[test]
    fn root_selection_prefers_the_requested_phase() {
        // A subcritical-like setting with three roots: methane-ish numbers
        // scaled so all three roots exceed the covolume.
        let (p, nrt, a, b) = (1.0e5, 8.31446 * 150.0, 0.8, 3.0e-5);
        let gas = select_volume_root(p, nrt, a, b, CubicPhase::Gas);
        let liq = select_volume_root(p, nrt, a, b, CubicPhase::Liquid);
        let (gas, liq) = (gas.unwrap(), liq.unwrap());
        assert!(gas >= liq);
        assert!(liq > b);
    }

    /// Assemble the full RK gas stack for pure methane and sanity-check the
    /// pressure against the closed form.
    #[test]
    fn rk_pressure_matches_closed_form() {
        let graph = Graph::new();
        let species = [methane()];
        let mut ctx = FrameContext::new(&graph, "m", MaterialKind::State, &species);
        ctx.set_current("HelmholtzState");
        HelmholtzState.build(&mut ctx).unwrap();

        for (name, c) in [
            ("H0S0ReferenceState", super::super::create_contribution("H0S0ReferenceState", &ContribOptions::new()).unwrap()),
            ("IdealMix", super::super::create_contribution("IdealMix", &ContribOptions::new()).unwrap()),
            ("HelmholtzIdealGas", super::super::create_contribution("HelmholtzIdealGas", &ContribOptions::new()).unwrap()),
            ("CriticalParameters", super::super::create_contribution("CriticalParameters", &ContribOptions::new()).unwrap()),
            ("RedlichKwongMFactor", super::super::create_contribution("RedlichKwongMFactor", &ContribOptions::new()).unwrap()),
            ("BostonMathiasAlphaFunction", super::super::create_contribution("BostonMathiasAlphaFunction", &ContribOptions::new()).unwrap()),
            ("RedlichKwongAFunction", super::super::create_contribution("RedlichKwongAFunction", &ContribOptions::new()).unwrap()),
            ("RedlichKwongBFunction", super::super::create_contribution("RedlichKwongBFunction", &ContribOptions::new()).unwrap()),
        ] {
            ctx.set_current(name);
            c.build(&mut ctx).unwrap();
        }
        ctx.set_current("LinearMixingRule(a)");
        LinearMixingRule {
            target: "_ceos_a".into(),
        }
        .build(&mut ctx)
        .unwrap();
        ctx.set_current("LinearMixingRule(b)");
        LinearMixingRule {
            target: "_ceos_b".into(),
        }
        .build(&mut ctx)
        .unwrap();
        ctx.set_current("RedlichKwongEOSGas");
        RedlichKwongEOS {
            phase: CubicPhase::Gas,
        }
        .build(&mut ctx)
        .unwrap();

        let p = ctx.scalar_prop("p").unwrap();
        let a = ctx.scalar_prop("_ceos_a").unwrap();
        let b = ctx.scalar_prop("_ceos_b").unwrap();

        let mut inputs: Vec<pm_expr::Expr> = ctx.state_syms.clone();
        inputs.extend(ctx.params.iter().map(|p| p.sym.clone()));
        let f = CompiledFn::new(
            &inputs,
            &[
                p.mag_ref().clone(),
                a.mag_ref().clone(),
                b.mag_ref().clone(),
            ],
        )
        .unwrap();

        // state: T=300 K, V=0.02 m³, n=1 mol
        let mut args = vec![300.0, 0.02, 1.0];
        for entry in &ctx.params {
            let v = match entry.path.as_str() {
                "H0S0ReferenceState/dh_form/CH4" => -74_873.0,
                "H0S0ReferenceState/s_0/CH4" => 186.3,
                "H0S0ReferenceState/T_ref" => 298.15,
                "H0S0ReferenceState/p_ref" => 1.0e5,
                "CriticalParameters/T_c/CH4" => 190.56,
                "CriticalParameters/p_c/CH4" => 4.599e6,
                "CriticalParameters/omega/CH4" => 0.011,
                "BostonMathiasAlphaFunction/eta/CH4" => 0.0,
                other => panic!("unexpected parameter {other}"),
            };
            args.push(v);
        }
        let out = f.eval(&args).unwrap();
        let (p_num, a_num, b_num) = (out[0], out[1], out[2]);

        let nrt = GAS_CONSTANT * 300.0;
        let expected = nrt / (0.02 - b_num) - a_num / (0.02 * (0.02 + b_num));
        assert!(
            (p_num - expected).abs() < 1e-6 * expected.abs(),
            "p={p_num} expected={expected}"
        );
        // gas-like state: pressure close to but below ideal
        assert!(p_num < nrt / 0.02);
        assert!(p_num > 0.9 * nrt / 0.02);
    }

    #[test]
    fn m_factor_reference_value() {
        // ω = 0.2 ⇒ m = 0.48508 − (0.15613·0.2 − 1.55171)·0.2 = 0.7891768
        let graph = Graph::new();
        let species = [methane()];
        let mut ctx = FrameContext::new(&graph, "m", MaterialKind::State, &species);
        ctx.set_current("CriticalParameters");
        CriticalParameters.build(&mut ctx).unwrap();
        ctx.set_current("RedlichKwongMFactor");
        RedlichKwongMFactor.build(&mut ctx).unwrap();

        let m = ctx.species_prop("_ceos_m").unwrap();
        let m_expr = m.get("CH4").unwrap();
        let inputs: Vec<pm_expr::Expr> =
            ctx.params.iter().map(|p| p.sym.clone()).collect();
        let f = CompiledFn::new(&inputs, &[m_expr.mag_ref().clone()]).unwrap();
        let args: Vec<f64> = ctx
            .params
            .iter()
            .map(|p| match p.path.as_str() {
                "CriticalParameters/omega/CH4" => 0.2,
                _ => 1.0,
            })
            .collect();
        let m_num = f.eval(&args).unwrap()[0];
        assert!((m_num - 0.7891768).abs() < 1e-10, "m = {m_num}");
    }

    #[test]
    fn boston_mathias_alpha_is_smooth_at_the_critical_point() {
        let graph = Graph::new();
        let species = [methane()];
        let mut ctx = FrameContext::new(&graph, "m", MaterialKind::State, &species);
        ctx.set_current("HelmholtzState");
        HelmholtzState.build(&mut ctx).unwrap();
        ctx.set_current("CriticalParameters");
        CriticalParameters.build(&mut ctx).unwrap();
        ctx.set_current("RedlichKwongMFactor");
        RedlichKwongMFactor.build(&mut ctx).unwrap();
        ctx.set_current("BostonMathiasAlphaFunction");
        BostonMathiasAlphaFunction.build(&mut ctx).unwrap();

        let alpha = ctx.species_prop("_ceos_alpha").unwrap().get("CH4").unwrap();
        let mut inputs: Vec<pm_expr::Expr> = ctx.state_syms.clone();
        inputs.extend(ctx.params.iter().map(|p| p.sym.clone()));
        let f = CompiledFn::new(&inputs, &[alpha.mag_ref().clone()]).unwrap();

        let t_c = 190.56;
        let eval = |t: f64| -> f64 {
            let mut args = vec![t, 0.02, 1.0];
            for p in &ctx.params {
                args.push(match p.path.as_str() {
                    "CriticalParameters/T_c/CH4" => t_c,
                    "CriticalParameters/p_c/CH4" => 4.599e6,
                    "CriticalParameters/omega/CH4" => 0.011,
                    "BostonMathiasAlphaFunction/eta/CH4" => 0.05,
                    _ => 0.0,
                });
            }
            f.eval(&args).unwrap()[0]
        };

        // both branches equal 1 at T_c
        assert!((eval(t_c) - 1.0).abs() < 1e-12);

        // value and first derivative continuous across the branch switch
        let h = 1e-4;
        let below = (eval(t_c) - eval(t_c - h)) / h;
        let above = (eval(t_c + h) - eval(t_c)) / h;
        assert!(
            (below - above).abs() < 1e-3 * below.abs().max(1.0),
            "slope jump: {below} vs {above}"
        );

        // finite, positive values well away from T_c on both sides
        for t in [0.5 * t_c, 2.0 * t_c] {
            let v = eval(t);
            assert!(v.is_finite() && v > 0.0, "alpha({t}) = {v}");
        }
    }
}
