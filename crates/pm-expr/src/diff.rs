//! Reverse-mode symbolic differentiation.
//!
//! Adjoints are accumulated as expressions in the same arena, so a Jacobian
//! is just more graph: its entries evaluate on the same tape as the outputs
//! and its sparsity is decided by structure alone.

use crate::graph::{cond, Expr, Node, NodeId, SymId};
use crate::sparse::SparseExprMatrix;
use std::collections::HashMap;

/// Derivative expressions of `output` with respect to every symbol it
/// structurally depends on.
pub fn gradient(output: &Expr) -> HashMap<SymId, Expr> {
    let graph = output.graph().clone();
    let nodes: Vec<Node> = graph.with_inner(|inner| inner.nodes.clone());

    // Adjoints indexed by node; the arena is topologically ordered, so one
    // descending sweep from the output visits parents before children.
    let mut adjoint: HashMap<NodeId, Expr> = HashMap::new();
    adjoint.insert(output.id(), graph.constant(1.0));

    let expr = |id: NodeId| Expr {
        graph: graph.clone(),
        id,
    };
    let mut grad: HashMap<SymId, Expr> = HashMap::new();

    let mut ids: Vec<NodeId> = vec![output.id()];
    let mut head = 0usize;
    // Collect the reachable set first so the sweep touches only ancestors.
    let mut reachable = vec![false; nodes.len()];
    reachable[output.id().idx()] = true;
    while head < ids.len() {
        let id = ids[head];
        head += 1;
        for child in node_inputs(&nodes[id.idx()]) {
            if !reachable[child.idx()] {
                reachable[child.idx()] = true;
                ids.push(child);
            }
        }
    }
    ids.sort_unstable_by(|a, b| b.cmp(a));

    for id in ids {
        let Some(w) = adjoint.get(&id).cloned() else {
            continue;
        };
        let mut push = |child: NodeId, contribution: Expr| {
            let entry = adjoint
                .remove(&child)
                .map(|acc| &acc + &contribution)
                .unwrap_or(contribution);
            adjoint.insert(child, entry);
        };
        match nodes[id.idx()] {
            Node::Const(_) => {}
            Node::Sym(sym) => {
                let entry = grad
                    .remove(&sym)
                    .map(|acc| &acc + &w)
                    .unwrap_or_else(|| w.clone());
                grad.insert(sym, entry);
            }
            Node::Add(a, b) => {
                push(a, w.clone());
                push(b, w);
            }
            Node::Sub(a, b) => {
                push(a, w.clone());
                push(b, -&w);
            }
            Node::Mul(a, b) => {
                push(a, &w * &expr(b));
                push(b, &w * &expr(a));
            }
            Node::Div(a, b) => {
                let den = expr(b);
                push(a, &w / &den);
                push(b, -&(&(&w * &expr(a)) / &den.sq()));
            }
            Node::Pow(a, e) => {
                let base = expr(a);
                push(a, &w.scale(e) * &base.powf(e - 1.0));
            }
            Node::Ln(a) => push(a, &w / &expr(a)),
            Node::Exp(a) => push(a, &w * &expr(id)),
            Node::Sqrt(a) => push(a, &w / &expr(id).scale(2.0)),
            Node::Sq(a) => {
                let base = expr(a);
                push(a, &w.scale(2.0) * &base);
            }
            Node::Cond(c, a, b) => {
                let zero = w.graph().constant(0.0);
                let switch = expr(c);
                push(a, cond(&switch, &w, &zero));
                push(b, cond(&switch, &zero, &w));
            }
        }
    }
    grad
}

/// Sparse Jacobian of `outputs` with respect to `variables` (named symbols).
///
/// Entries exist exactly where an output structurally depends on a variable;
/// derivative expressions that fold to a literal zero are dropped.
pub fn jacobian(outputs: &[Expr], variables: &[Expr]) -> SparseExprMatrix {
    let mut col_of: HashMap<SymId, usize> = HashMap::new();
    for (j, var) in variables.iter().enumerate() {
        let sym = var
            .as_symbol()
            .expect("jacobian variables must be named symbols");
        col_of.insert(sym, j);
    }

    let mut triplets: Vec<(usize, usize, Expr)> = Vec::new();
    for (i, output) in outputs.iter().enumerate() {
        for (sym, deriv) in gradient(output) {
            let Some(&j) = col_of.get(&sym) else {
                continue; // derivative w.r.t. a parameter symbol: not requested
            };
            if deriv.as_const() == Some(0.0) {
                continue;
            }
            triplets.push((i, j, deriv));
        }
    }
    SparseExprMatrix::from_triplets(outputs.len(), variables.len(), triplets)
}

fn node_inputs(node: &Node) -> Vec<NodeId> {
    match *node {
        Node::Const(_) | Node::Sym(_) => vec![],
        Node::Add(a, b) | Node::Sub(a, b) | Node::Mul(a, b) | Node::Div(a, b) => vec![a, b],
        Node::Pow(a, _) | Node::Ln(a) | Node::Exp(a) | Node::Sqrt(a) | Node::Sq(a) => vec![a],
        Node::Cond(c, a, b) => vec![c, a, b],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{CompiledFn, CompiledJacobian};
    use crate::graph::Graph;

    fn jac_at(outputs: &[Expr], vars: &[Expr], x: &[f64]) -> Vec<Vec<f64>> {
        let pattern = jacobian(outputs, vars);
        let compiled = CompiledJacobian::new(vars, pattern).unwrap();
        compiled.eval(x).unwrap().to_dense()
    }

    #[test]
    fn product_rule() {
        let g = Graph::new();
        let x = g.symbol("x").unwrap();
        let y = g.symbol("y").unwrap();
        let f = &x * &y;
        let jac = jac_at(&[f], &[x, y], &[3.0, 5.0]);
        assert_eq!(jac[0], vec![5.0, 3.0]);
    }

    #[test]
    fn chain_rule_through_elementary_functions() {
        let g = Graph::new();
        let x = g.symbol("x").unwrap();
        // f = ln(x^2) => f' = 2/x
        let f = x.sq().ln();
        let jac = jac_at(&[f], &[x.clone()], &[4.0]);
        assert!((jac[0][0] - 0.5).abs() < 1e-14);
    }

    #[test]
    fn quotient_rule() {
        let g = Graph::new();
        let x = g.symbol("x").unwrap();
        let y = g.symbol("y").unwrap();
        // f = x / y; df/dx = 1/y, df/dy = -x/y^2
        let f = &x / &y;
        let jac = jac_at(&[f], &[x, y], &[6.0, 2.0]);
        assert!((jac[0][0] - 0.5).abs() < 1e-14);
        assert!((jac[0][1] + 1.5).abs() < 1e-14);
    }

    #[test]
    fn sparsity_is_structural() {
        let g = Graph::new();
        let x = g.symbol("x").unwrap();
        let y = g.symbol("y").unwrap();
        let z = g.symbol("z").unwrap();
        let f0 = &x + &y;
        let f1 = y.sq();
        let pattern = jacobian(&[f0, f1], &[x, y, z]);
        // f0 depends on x,y; f1 on y only; nothing depends on z.
        assert_eq!(pattern.nnz(), 3);
        assert_eq!(pattern.col_ptr, vec![0, 1, 3, 3]);
    }

    #[test]
    fn shared_subexpression_accumulates() {
        let g = Graph::new();
        let x = g.symbol("x").unwrap();
        // f = x*x + x (dependence through two paths) => f' = 2x + 1
        let f = &(&x * &x) + &x;
        let jac = jac_at(&[f], &[x.clone()], &[7.0]);
        assert!((jac[0][0] - 15.0).abs() < 1e-14);
    }

    #[test]
    fn conditional_derivative_follows_active_branch() {
        let g = Graph::new();
        let x = g.symbol("x").unwrap();
        let s = g.symbol("s").unwrap();
        let f = cond(&s, &x.sq(), &x.scale(3.0));
        let vars = [x.clone()];
        let pattern = jacobian(&[f], &vars);
        let compiled = CompiledJacobian::new(&[x, s], pattern).unwrap();
        let high = compiled.eval(&[2.0, 1.0]).unwrap();
        assert_eq!(high.get(0, 0), 4.0);
        let low = compiled.eval(&[2.0, -1.0]).unwrap();
        assert_eq!(low.get(0, 0), 3.0);
    }

    #[test]
    fn gradient_agrees_with_central_differences() {
        let g = Graph::new();
        let x = g.symbol("x").unwrap();
        let y = g.symbol("y").unwrap();
        let f = &(&x.sqrt() * &y.ln()) + &(&x / &y).exp();
        let vars = [x, y];
        let f_fn = CompiledFn::new(&vars, &[f.clone()]).unwrap();
        let jac = jac_at(&[f], &vars, &[1.3, 2.7]);

        let eps = 1e-6;
        let base = [1.3, 2.7];
        for j in 0..2 {
            let mut plus = base;
            let mut minus = base;
            plus[j] += eps;
            minus[j] -= eps;
            let fd =
                (f_fn.eval(&plus).unwrap()[0] - f_fn.eval(&minus).unwrap()[0]) / (2.0 * eps);
            assert!(
                (jac[0][j] - fd).abs() < 1e-8,
                "column {j}: ad={} fd={fd}",
                jac[0][j]
            );
        }
    }
}
