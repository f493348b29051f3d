//! Compiled callables over nested quantity dictionaries.

use crate::dim::Dimension;
use crate::error::{QuantityError, QuantityResult};
use crate::quantity::{NumQuantity, SymQuantity};
use pm_core::Nested;
use pm_expr::{CompiledFn, Expr};
use std::collections::BTreeMap;

/// A compiled function whose arguments and results are nested dictionaries
/// of quantities with a fixed unit skeleton.
///
/// Flattening is deterministic (`/`-joined sorted paths, see
/// [`pm_core::nested`]); every call checks the argument tree against
/// `arg_structure` key-by-key and dimension-by-dimension.
pub struct QFunction {
    arg_structure: Nested<Dimension>,
    result_structure: Nested<Dimension>,
    arg_paths: Vec<String>,
    arg_slots: BTreeMap<String, usize>,
    fun: CompiledFn,
}

impl QFunction {
    /// Compile `results` as a function of the symbol quantities in `args`.
    pub fn new(
        args: &Nested<SymQuantity>,
        results: &Nested<SymQuantity>,
    ) -> QuantityResult<QFunction> {
        let mut inputs: Vec<Expr> = Vec::new();
        let mut arg_paths: Vec<String> = Vec::new();
        for (path, q) in args.leaves() {
            if q.mag_ref().as_symbol().is_none() {
                return Err(QuantityError::NotASymbol { path });
            }
            inputs.push(q.mag_ref().clone());
            arg_paths.push(path);
        }
        let outputs: Vec<Expr> = results
            .leaves()
            .into_iter()
            .map(|(_, q)| q.mag_ref().clone())
            .collect();

        let fun = CompiledFn::new(&inputs, &outputs)?;
        let arg_slots = arg_paths
            .iter()
            .enumerate()
            .map(|(i, p)| (p.clone(), i))
            .collect();
        Ok(QFunction {
            arg_structure: args.map(&mut |_, q| q.dim()),
            result_structure: results.map(&mut |_, q| q.dim()),
            arg_paths,
            arg_slots,
            fun,
        })
    }

    /// The unit skeleton the arguments must match.
    pub fn arg_structure(&self) -> &Nested<Dimension> {
        &self.arg_structure
    }

    /// The unit skeleton of the results.
    pub fn result_structure(&self) -> &Nested<Dimension> {
        &self.result_structure
    }

    /// Evaluate for one argument tree.
    pub fn call(&self, args: &Nested<NumQuantity>) -> QuantityResult<Nested<NumQuantity>> {
        let flat = args.leaves();
        // Validate: same paths in the same deterministic order.
        let mut values = vec![0.0; self.arg_paths.len()];
        let mut supplied = 0usize;
        for (path, q) in &flat {
            match self.arg_slots.get(path) {
                Some(&slot) => {
                    let expected = self
                        .arg_structure
                        .get(path)
                        .expect("arg structure covers every arg path");
                    q.require_dim(*expected, path)?;
                    values[slot] = q.magnitude();
                    supplied += 1;
                }
                None => return Err(QuantityError::UnexpectedArgument { path: path.clone() }),
            }
        }
        if supplied != self.arg_paths.len() {
            for path in &self.arg_paths {
                if args.get(path).is_none() {
                    return Err(QuantityError::MissingArgument { path: path.clone() });
                }
            }
        }

        let out = self.fun.eval(&values)?;
        let mut cursor = 0usize;
        Ok(self.result_structure.map(&mut |_, dim| {
            let q = NumQuantity::new(out[cursor], *dim);
            cursor += 1;
            q
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantity::Quantity;
    use crate::unit::parse_quantity;
    use pm_expr::Graph;

    fn build() -> (QFunction, Nested<NumQuantity>) {
        let g = Graph::new();
        let len_dim = parse_quantity("1 m").unwrap().dim();
        let time_dim = parse_quantity("1 s").unwrap().dim();

        let d = Quantity::new(g.symbol("geom/d").unwrap(), len_dim);
        let t = Quantity::new(g.symbol("t").unwrap(), time_dim);

        let mut args = Nested::new();
        args.insert("geom/d", d.clone()).unwrap();
        args.insert("t", t.clone()).unwrap();

        let mut results = Nested::new();
        results.insert("speed", &d / &t).unwrap();
        results.insert("geom/area", d.sq()).unwrap();

        let f = QFunction::new(&args, &results).unwrap();

        let mut call_args = Nested::new();
        call_args
            .insert("geom/d", parse_quantity("10 m").unwrap())
            .unwrap();
        call_args.insert("t", parse_quantity("5 s").unwrap()).unwrap();
        (f, call_args)
    }

    #[test]
    fn nested_call_roundtrip() {
        let (f, args) = build();
        let out = f.call(&args).unwrap();
        assert_eq!(out.get("speed").unwrap().magnitude(), 2.0);
        assert_eq!(out.get("geom/area").unwrap().magnitude(), 100.0);
    }

    #[test]
    fn wrong_dimension_is_rejected() {
        let (f, mut args) = build();
        args.insert("t", parse_quantity("5 m").unwrap()).unwrap();
        assert!(matches!(
            f.call(&args),
            Err(QuantityError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn missing_argument_is_rejected() {
        let (f, _) = build();
        let mut args = Nested::new();
        args.insert("geom/d", parse_quantity("10 m").unwrap())
            .unwrap();
        assert!(matches!(
            f.call(&args),
            Err(QuantityError::MissingArgument { .. })
        ));
    }

    #[test]
    fn unexpected_argument_is_rejected() {
        let (f, mut args) = build();
        args.insert("extra", parse_quantity("1 s").unwrap()).unwrap();
        assert!(matches!(
            f.call(&args),
            Err(QuantityError::UnexpectedArgument { .. })
        ));
    }

    #[test]
    fn structures_expose_the_skeleton() {
        let (f, _) = build();
        let arg_leaves = f.arg_structure().leaves();
        assert_eq!(arg_leaves.len(), 2);
        assert_eq!(arg_leaves[0].0, "geom/d");
        let res_leaves = f.result_structure().leaves();
        assert_eq!(res_leaves.len(), 2);
    }
}
