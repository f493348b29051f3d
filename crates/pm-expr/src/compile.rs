//! Tape compilation of expression graphs.

use crate::error::{ExprError, ExprResult};
use crate::graph::{Expr, Node, NodeId, SymId};
use crate::sparse::{CscMatrix, SparseExprMatrix};
use std::cell::RefCell;
use std::collections::HashMap;

/// A compiled callable over a fixed set of input symbols and output nodes.
///
/// The arena is topologically ordered by construction, so evaluation is one
/// ascending sweep over the nodes reachable from the outputs. The scratch
/// buffer is reused across calls; like graph construction, evaluation is
/// single-threaded.
#[derive(Debug)]
pub struct CompiledFn {
    nodes: Vec<Node>,
    plan: Vec<NodeId>,
    input_slots: HashMap<SymId, usize>,
    output_ids: Vec<NodeId>,
    scratch: RefCell<Vec<f64>>,
    n_inputs: usize,
}

impl CompiledFn {
    /// Compile `outputs` as functions of the symbol expressions `inputs`.
    ///
    /// Every symbol reachable from an output must appear in `inputs`,
    /// otherwise the build fails with [`ExprError::MissingSymbol`].
    pub fn new(inputs: &[Expr], outputs: &[Expr]) -> ExprResult<CompiledFn> {
        let graph = match (inputs.first(), outputs.first()) {
            (Some(e), _) | (_, Some(e)) => e.graph().clone(),
            _ => crate::graph::Graph::new(),
        };
        let nodes: Vec<Node> = graph.with_inner(|inner| inner.nodes.clone());

        let mut input_slots: HashMap<SymId, usize> = HashMap::new();
        for (i, input) in inputs.iter().enumerate() {
            let sym = input
                .as_symbol()
                .ok_or(ExprError::NotASymbol { index: i })?;
            input_slots.insert(sym, i);
        }

        // Reachable set, then an ascending sweep order.
        let mut reachable = vec![false; nodes.len()];
        let mut stack: Vec<NodeId> = outputs.iter().map(|e| e.id()).collect();
        while let Some(id) = stack.pop() {
            if reachable[id.idx()] {
                continue;
            }
            reachable[id.idx()] = true;
            match nodes[id.idx()] {
                Node::Const(_) => {}
                Node::Sym(sym) => {
                    if !input_slots.contains_key(&sym) {
                        return Err(ExprError::MissingSymbol {
                            name: graph.symbol_name(sym),
                        });
                    }
                }
                Node::Add(a, b) | Node::Sub(a, b) | Node::Mul(a, b) | Node::Div(a, b) => {
                    stack.push(a);
                    stack.push(b);
                }
                Node::Pow(a, _) | Node::Ln(a) | Node::Exp(a) | Node::Sqrt(a) | Node::Sq(a) => {
                    stack.push(a)
                }
                Node::Cond(c, a, b) => {
                    stack.push(c);
                    stack.push(a);
                    stack.push(b);
                }
            }
        }
        let plan: Vec<NodeId> = (0..nodes.len() as u32)
            .map(NodeId)
            .filter(|id| reachable[id.idx()])
            .collect();
        let scratch_len = plan.last().map(|id| id.idx() + 1).unwrap_or(0);

        Ok(CompiledFn {
            nodes,
            plan,
            input_slots,
            output_ids: outputs.iter().map(|e| e.id()).collect(),
            scratch: RefCell::new(vec![0.0; scratch_len]),
            n_inputs: inputs.len(),
        })
    }

    pub fn n_inputs(&self) -> usize {
        self.n_inputs
    }

    pub fn n_outputs(&self) -> usize {
        self.output_ids.len()
    }

    /// Evaluate the outputs for one input vector.
    pub fn eval(&self, args: &[f64]) -> ExprResult<Vec<f64>> {
        if args.len() != self.n_inputs {
            return Err(ExprError::ShapeMismatch {
                expected: self.n_inputs,
                got: args.len(),
            });
        }
        let mut values = self.scratch.borrow_mut();
        for &id in &self.plan {
            let v = match self.nodes[id.idx()] {
                Node::Const(c) => c,
                Node::Sym(sym) => args[self.input_slots[&sym]],
                Node::Add(a, b) => values[a.idx()] + values[b.idx()],
                Node::Sub(a, b) => values[a.idx()] - values[b.idx()],
                Node::Mul(a, b) => values[a.idx()] * values[b.idx()],
                Node::Div(a, b) => values[a.idx()] / values[b.idx()],
                Node::Pow(a, e) => values[a.idx()].powf(e),
                Node::Ln(a) => values[a.idx()].ln(),
                Node::Exp(a) => values[a.idx()].exp(),
                Node::Sqrt(a) => values[a.idx()].sqrt(),
                Node::Sq(a) => {
                    let x = values[a.idx()];
                    x * x
                }
                Node::Cond(c, a, b) => {
                    if values[c.idx()] > 0.0 {
                        values[a.idx()]
                    } else {
                        values[b.idx()]
                    }
                }
            };
            values[id.idx()] = v;
        }
        Ok(self
            .output_ids
            .iter()
            .map(|id| values[id.idx()])
            .collect())
    }
}

/// A compiled sparse Jacobian: fixed CSC pattern, entries evaluated per call.
pub struct CompiledJacobian {
    pattern: SparseExprMatrix,
    entries_fn: CompiledFn,
}

impl CompiledJacobian {
    pub fn new(inputs: &[Expr], pattern: SparseExprMatrix) -> ExprResult<CompiledJacobian> {
        let entries_fn = CompiledFn::new(inputs, &pattern.entries)?;
        Ok(CompiledJacobian {
            pattern,
            entries_fn,
        })
    }

    pub fn nrows(&self) -> usize {
        self.pattern.nrows
    }

    pub fn ncols(&self) -> usize {
        self.pattern.ncols
    }

    pub fn eval(&self, args: &[f64]) -> ExprResult<CscMatrix> {
        let values = self.entries_fn.eval(args)?;
        Ok(self.pattern.with_values(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

    #[test]
    fn evaluates_shared_subgraphs_once() {
        let g = Graph::new();
        let x = g.symbol("x").unwrap();
        let shared = x.sq();
        let f0 = &shared + &g.constant(1.0);
        let f1 = &shared * &g.constant(2.0);
        let f = CompiledFn::new(&[x], &[f0, f1]).unwrap();
        assert_eq!(f.eval(&[3.0]).unwrap(), vec![10.0, 18.0]);
    }

    #[test]
    fn missing_symbol_is_rejected() {
        let g = Graph::new();
        let x = g.symbol("x").unwrap();
        let y = g.symbol("y").unwrap();
        let f = &x + &y;
        let err = CompiledFn::new(&[x], &[f]).unwrap_err();
        match err {
            ExprError::MissingSymbol { name } => assert_eq!(name, "y"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unused_inputs_are_allowed() {
        let g = Graph::new();
        let x = g.symbol("x").unwrap();
        let y = g.symbol("y").unwrap();
        let f = x.scale(2.0);
        let compiled = CompiledFn::new(&[x, y], &[f]).unwrap();
        assert_eq!(compiled.eval(&[4.0, 99.0]).unwrap(), vec![8.0]);
    }

    #[test]
    fn wrong_arity_is_a_shape_error() {
        let g = Graph::new();
        let x = g.symbol("x").unwrap();
        let f = x.sq();
        let compiled = CompiledFn::new(&[x], &[f]).unwrap();
        assert!(matches!(
            compiled.eval(&[1.0, 2.0]),
            Err(ExprError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn non_symbol_input_is_rejected() {
        let g = Graph::new();
        let x = g.symbol("x").unwrap();
        let c = g.constant(1.0);
        let f = &x + &c;
        assert!(matches!(
            CompiledFn::new(&[x, c], &[f]),
            Err(ExprError::NotASymbol { index: 1 })
        ));
    }
}
