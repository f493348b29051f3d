//! End-to-end: square pure-methane flow specification.

mod common;

use common::{expected_flow, MethaneFlowModel, DH_FORM, S_0};
use pm_model::{flatten, NumericHandler};
use pm_solver::{DenseLu, NewtonSolver, SolveStatus};

fn solved_handler() -> NumericHandler {
    let flat = flatten("plant", Box::new(MethaneFlowModel::new())).unwrap();
    let mut handler = NumericHandler::new(flat).unwrap();
    let report = NewtonSolver::new(&mut handler).solve().unwrap();
    assert!(report.converged());
    handler
}

#[test]
fn converges_in_a_handful_of_iterations() {
    let flat = flatten("plant", Box::new(MethaneFlowModel::new())).unwrap();
    let mut handler = NumericHandler::new(flat).unwrap();
    let report = NewtonSolver::new(&mut handler).solve().unwrap();

    assert_eq!(report.status, SolveStatus::Converged);
    assert!(
        report.iterations.len() <= 6,
        "took {} iterations",
        report.iterations.len()
    );
    let last = report.iterations.last().unwrap();
    assert!(last.lmet < 0.0);
    assert!(last.alpha.is_none());
}

#[test]
fn solution_matches_the_ideal_gas_law() {
    let handler = solved_handler();
    let x = handler.x();
    // material slice is [T, p, n_CH4]
    assert!((x[0] - 298.15).abs() < 1e-6, "T = {}", x[0]);
    assert!((x[1] - 1e5).abs() < 1e-3, "p = {}", x[1]);
    assert!(
        (x[2] - expected_flow()).abs() < 1e-6,
        "n = {} vs {}",
        x[2],
        expected_flow()
    );
    // ≈ 9.68 kmol/day
    let per_day = x[2] * 86_400.0 / 1e3;
    assert!((per_day - 9.6815).abs() < 1e-3, "kmol/day = {per_day}");
}

#[test]
fn entropy_and_chemical_potential_follow_the_reference_state() {
    let handler = solved_handler();
    let props = handler.properties().unwrap();

    // At T = T_ref and p = p_ref all integral and pressure terms vanish:
    // S = n·s_0 and mu = dh_form − T·s_0.
    let n = expected_flow();
    let s = props.get("plant/feed/S").unwrap().magnitude();
    assert!((s - n * S_0).abs() < 1e-6 * n * S_0, "S = {s}");

    let mu = props.get("plant/feed/mu/CH4").unwrap().magnitude();
    let mu_expected = DH_FORM - 298.15 * S_0;
    assert!(
        (mu - mu_expected).abs() < 1e-6 * mu_expected.abs(),
        "mu = {mu} vs {mu_expected}"
    );

    let n_total = props.get("plant/n_total").unwrap().magnitude();
    assert!((n_total - n).abs() < 1e-9);
}

#[test]
fn resolving_a_converged_model_is_idempotent() {
    let mut handler = {
        let flat = flatten("plant", Box::new(MethaneFlowModel::new())).unwrap();
        let mut handler = NumericHandler::new(flat).unwrap();
        NewtonSolver::new(&mut handler).solve().unwrap();
        handler
    };
    let report = NewtonSolver::new(&mut handler).solve().unwrap();
    assert_eq!(report.iterations.len(), 1);
    let only = &report.iterations[0];
    assert_eq!(only.iteration, 0);
    assert!(only.lmet < 0.0);
}

#[test]
fn bounds_stay_strictly_positive_at_every_accepted_step() {
    let flat = flatten("plant", Box::new(MethaneFlowModel::new())).unwrap();
    let mut handler = NumericHandler::new(flat).unwrap();
    let mut violations = 0usize;
    let report = NewtonSolver::new(&mut handler)
        .solve_with_callback(&mut |_, _, h| {
            let bounds = h.bounds().unwrap();
            if bounds.iter().any(|b| *b <= 0.0) {
                violations += 1;
            }
            true
        })
        .unwrap();
    assert!(report.converged());
    assert_eq!(violations, 0);
}

#[test]
fn dense_fallback_backend_reaches_the_same_solution() {
    let flat = flatten("plant", Box::new(MethaneFlowModel::new())).unwrap();
    let mut handler = NumericHandler::new(flat).unwrap();
    let report = NewtonSolver::new(&mut handler)
        .with_backend(Box::new(DenseLu))
        .solve()
        .unwrap();
    assert!(report.converged());
    assert!((handler.x()[2] - expected_flow()).abs() < 1e-6);
}

#[test]
fn callback_interrupt_keeps_partial_state() {
    let flat = flatten("plant", Box::new(MethaneFlowModel::new())).unwrap();
    let mut handler = NumericHandler::new(flat).unwrap();
    let x0 = handler.x().to_vec();
    let report = NewtonSolver::new(&mut handler)
        .solve_with_callback(&mut |_, _, _| false)
        .unwrap();
    assert_eq!(report.status, SolveStatus::Interrupted);
    assert_eq!(report.iterations.len(), 1);
    // one accepted step was applied before the interrupt
    assert_ne!(handler.x(), x0.as_slice());
}

#[test]
fn state_round_trips_through_the_document_form() {
    let mut handler = solved_handler();
    let doc = handler.export_state().unwrap();
    let x_before = handler.x().to_vec();

    // perturb, then restore
    let mut x = handler.x().to_vec();
    x[0] = 500.0;
    handler.set_x(x);
    handler.import_state(&doc).unwrap();

    for (a, b) in handler.x().iter().zip(&x_before) {
        assert!((a - b).abs() < 1e-9 * b.abs().max(1.0), "{a} vs {b}");
    }
}

#[test]
fn state_document_survives_json_serialization() {
    use pm_core::{flatten_dictionary, unflatten_dictionary};
    use std::collections::BTreeMap;

    let mut handler = solved_handler();
    let x_before = handler.x().to_vec();

    let text =
        serde_json::to_string(&flatten_dictionary(&handler.export_state().unwrap())).unwrap();
    let parsed: BTreeMap<String, String> = serde_json::from_str(&text).unwrap();
    let doc = unflatten_dictionary(parsed).unwrap();

    let mut x = handler.x().to_vec();
    x[2] = 42.0;
    handler.set_x(x);
    handler.import_state(&doc).unwrap();

    for (a, b) in handler.x().iter().zip(&x_before) {
        assert!((a - b).abs() < 1e-9 * b.abs().max(1.0), "{a} vs {b}");
    }
}

#[test]
fn report_renders_the_iteration_table() {
    let flat = flatten("plant", Box::new(MethaneFlowModel::new())).unwrap();
    let mut handler = NumericHandler::new(flat).unwrap();
    let report = NewtonSolver::new(&mut handler).solve().unwrap();
    let text = report.to_string();
    for column in ["Iter", "LMET", "Alpha", "Limit on bound", "Max residual"] {
        assert!(text.contains(column), "missing column {column}:\n{text}");
    }
    assert!(text.contains("spec_"), "max-residual names expected:\n{text}");
}

#[test]
fn jacobian_matches_central_differences() {
    let flat = flatten("plant", Box::new(MethaneFlowModel::new())).unwrap();
    let mut handler = NumericHandler::new(flat).unwrap();
    let x0 = handler.x().to_vec();
    let jac = handler.residual_jacobian().unwrap().to_dense();

    let eps = 1e-6;
    for j in 0..x0.len() {
        let dx = eps * x0[j].abs().max(1.0);
        let mut plus = x0.clone();
        plus[j] += dx;
        handler.set_x(plus);
        let r_plus = handler.residuals().unwrap();
        let mut minus = x0.clone();
        minus[j] -= dx;
        handler.set_x(minus);
        let r_minus = handler.residuals().unwrap();
        handler.set_x(x0.clone());

        for i in 0..r_plus.len() {
            let fd = (r_plus[i] - r_minus[i]) / (2.0 * dx);
            let ad = jac[i][j];
            let scale = ad.abs().max(fd.abs()).max(1.0);
            assert!(
                (ad - fd).abs() < 1e-5 * scale,
                "J[{i}][{j}]: ad={ad} fd={fd}"
            );
        }
    }
}
