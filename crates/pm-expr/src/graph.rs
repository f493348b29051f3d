//! Expression arena and `Expr` handles.

use crate::error::{ExprError, ExprResult};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::rc::Rc;

/// Index of a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    #[inline]
    pub(crate) fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Index of a named symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymId(pub(crate) u32);

/// A primitive operation. Leaves are constants and named symbols.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Node {
    Const(f64),
    Sym(SymId),
    Add(NodeId, NodeId),
    Sub(NodeId, NodeId),
    Mul(NodeId, NodeId),
    Div(NodeId, NodeId),
    /// Base raised to a constant exponent.
    Pow(NodeId, f64),
    Ln(NodeId),
    Exp(NodeId),
    Sqrt(NodeId),
    Sq(NodeId),
    /// `Cond(c, a, b)` selects `a` where `c > 0`, else `b`.
    Cond(NodeId, NodeId, NodeId),
}

#[derive(Debug)]
pub(crate) struct GraphInner {
    pub(crate) nodes: Vec<Node>,
    pub(crate) symbol_names: Vec<String>,
    symbol_ids: HashMap<String, SymId>,
    const_cache: HashMap<u64, NodeId>,
}

/// Shared handle to an expression arena.
///
/// Construction is single-threaded; clones share the same arena. Expressions
/// from different graphs must never be mixed (checked, panics).
#[derive(Clone, Debug)]
pub struct Graph {
    inner: Rc<RefCell<GraphInner>>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        Graph {
            inner: Rc::new(RefCell::new(GraphInner {
                nodes: Vec::new(),
                symbol_names: Vec::new(),
                symbol_ids: HashMap::new(),
                const_cache: HashMap::new(),
            })),
        }
    }

    pub(crate) fn same_graph(&self, other: &Graph) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn with_inner<R>(&self, f: impl FnOnce(&GraphInner) -> R) -> R {
        f(&self.inner.borrow())
    }

    fn push(&self, node: Node) -> Expr {
        let mut inner = self.inner.borrow_mut();
        let id = NodeId(inner.nodes.len() as u32);
        inner.nodes.push(node);
        Expr {
            graph: self.clone(),
            id,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Literal constant; identical literals share one node.
    pub fn constant(&self, value: f64) -> Expr {
        let key = value.to_bits();
        if let Some(&id) = self.inner.borrow().const_cache.get(&key) {
            return Expr {
                graph: self.clone(),
                id,
            };
        }
        let expr = self.push(Node::Const(value));
        self.inner.borrow_mut().const_cache.insert(key, expr.id);
        expr
    }

    /// Allocate one named symbol. Names are unique per graph.
    pub fn symbol(&self, name: &str) -> ExprResult<Expr> {
        {
            let inner = self.inner.borrow();
            if inner.symbol_ids.contains_key(name) {
                return Err(ExprError::DuplicateSymbol {
                    name: name.to_string(),
                });
            }
        }
        let sym = {
            let mut inner = self.inner.borrow_mut();
            let sym = SymId(inner.symbol_names.len() as u32);
            inner.symbol_names.push(name.to_string());
            inner.symbol_ids.insert(name.to_string(), sym);
            sym
        };
        Ok(self.push(Node::Sym(sym)))
    }

    /// Allocate `n` symbols named `name[0]` … `name[n-1]`.
    pub fn symbol_vec(&self, name: &str, n: usize) -> ExprResult<Vec<Expr>> {
        (0..n).map(|i| self.symbol(&format!("{name}[{i}]"))).collect()
    }

    pub fn symbol_name(&self, sym: SymId) -> String {
        self.inner.borrow().symbol_names[sym.0 as usize].clone()
    }
}

/// Handle to one node of a [`Graph`]. Cheap to clone.
#[derive(Clone)]
pub struct Expr {
    pub(crate) graph: Graph,
    pub(crate) id: NodeId,
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expr#{}", self.id.0)
    }
}

impl Expr {
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub(crate) fn node(&self) -> Node {
        self.graph.inner.borrow().nodes[self.id.idx()]
    }

    /// The literal value if this node is a constant.
    pub fn as_const(&self) -> Option<f64> {
        match self.node() {
            Node::Const(v) => Some(v),
            _ => None,
        }
    }

    /// The symbol id if this node is a named symbol.
    pub fn as_symbol(&self) -> Option<SymId> {
        match self.node() {
            Node::Sym(s) => Some(s),
            _ => None,
        }
    }

    fn is_const(&self, value: f64) -> bool {
        self.as_const() == Some(value)
    }

    fn check_graph(&self, other: &Expr) {
        assert!(
            self.graph.same_graph(&other.graph),
            "cannot combine expressions from different graphs"
        );
    }

    pub fn ln(&self) -> Expr {
        if let Some(v) = self.as_const() {
            return self.graph.constant(v.ln());
        }
        self.graph.push(Node::Ln(self.id))
    }

    pub fn exp(&self) -> Expr {
        if let Some(v) = self.as_const() {
            return self.graph.constant(v.exp());
        }
        self.graph.push(Node::Exp(self.id))
    }

    pub fn sqrt(&self) -> Expr {
        if let Some(v) = self.as_const() {
            return self.graph.constant(v.sqrt());
        }
        self.graph.push(Node::Sqrt(self.id))
    }

    /// Square. Cheaper than `powf(2.0)` and keeps derivatives tidy.
    pub fn sq(&self) -> Expr {
        if let Some(v) = self.as_const() {
            return self.graph.constant(v * v);
        }
        self.graph.push(Node::Sq(self.id))
    }

    /// Raise to a constant exponent.
    pub fn powf(&self, exponent: f64) -> Expr {
        if exponent == 0.0 {
            return self.graph.constant(1.0);
        }
        if exponent == 1.0 {
            return self.clone();
        }
        if let Some(v) = self.as_const() {
            return self.graph.constant(v.powf(exponent));
        }
        self.graph.push(Node::Pow(self.id, exponent))
    }

    /// Multiply by a plain float.
    pub fn scale(&self, factor: f64) -> Expr {
        self * &self.graph.constant(factor)
    }
}

/// `cond(c, a, b)`: selects `a` where `c > 0`, else `b`.
///
/// The switch variable is treated as a discrete selector; no derivative is
/// propagated through `c`.
pub fn cond(c: &Expr, a: &Expr, b: &Expr) -> Expr {
    c.check_graph(a);
    c.check_graph(b);
    if let Some(v) = c.as_const() {
        return if v > 0.0 { a.clone() } else { b.clone() };
    }
    if a.id == b.id {
        return a.clone();
    }
    c.graph.push(Node::Cond(c.id, a.id, b.id))
}

impl Add for &Expr {
    type Output = Expr;

    fn add(self, rhs: &Expr) -> Expr {
        self.check_graph(rhs);
        if let (Some(a), Some(b)) = (self.as_const(), rhs.as_const()) {
            return self.graph.constant(a + b);
        }
        if self.is_const(0.0) {
            return rhs.clone();
        }
        if rhs.is_const(0.0) {
            return self.clone();
        }
        self.graph.push(Node::Add(self.id, rhs.id))
    }
}

impl Sub for &Expr {
    type Output = Expr;

    fn sub(self, rhs: &Expr) -> Expr {
        self.check_graph(rhs);
        if let (Some(a), Some(b)) = (self.as_const(), rhs.as_const()) {
            return self.graph.constant(a - b);
        }
        if rhs.is_const(0.0) {
            return self.clone();
        }
        if self.id == rhs.id {
            return self.graph.constant(0.0);
        }
        self.graph.push(Node::Sub(self.id, rhs.id))
    }
}

impl Mul for &Expr {
    type Output = Expr;

    fn mul(self, rhs: &Expr) -> Expr {
        self.check_graph(rhs);
        if let (Some(a), Some(b)) = (self.as_const(), rhs.as_const()) {
            return self.graph.constant(a * b);
        }
        if self.is_const(0.0) || rhs.is_const(0.0) {
            return self.graph.constant(0.0);
        }
        if self.is_const(1.0) {
            return rhs.clone();
        }
        if rhs.is_const(1.0) {
            return self.clone();
        }
        self.graph.push(Node::Mul(self.id, rhs.id))
    }
}

impl Div for &Expr {
    type Output = Expr;

    fn div(self, rhs: &Expr) -> Expr {
        self.check_graph(rhs);
        if rhs.is_const(0.0) {
            // NumericBuild: a literal zero denominator can never evaluate.
            panic!("NumericBuild: division by a literal zero");
        }
        if let (Some(a), Some(b)) = (self.as_const(), rhs.as_const()) {
            return self.graph.constant(a / b);
        }
        if rhs.is_const(1.0) {
            return self.clone();
        }
        if self.is_const(0.0) {
            return self.graph.constant(0.0);
        }
        self.graph.push(Node::Div(self.id, rhs.id))
    }
}

impl Neg for &Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        &self.graph.constant(0.0) - self
    }
}

macro_rules! forward_owned_binop {
    ($trait:ident, $method:ident) => {
        impl $trait for Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                $trait::$method(&self, &rhs)
            }
        }
        impl $trait<&Expr> for Expr {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                $trait::$method(&self, rhs)
            }
        }
        impl $trait<Expr> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                $trait::$method(self, &rhs)
            }
        }
    };
}

forward_owned_binop!(Add, add);
forward_owned_binop!(Sub, sub);
forward_owned_binop!(Mul, mul);
forward_owned_binop!(Div, div);

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        -&self
    }
}

impl Mul<f64> for Expr {
    type Output = Expr;

    fn mul(self, rhs: f64) -> Expr {
        self.scale(rhs)
    }
}

impl Mul<f64> for &Expr {
    type Output = Expr;

    fn mul(self, rhs: f64) -> Expr {
        self.scale(rhs)
    }
}
