//! The SSA intermediate representation.
//!
//! A module is an ordered list of functions; a function body is a
//! control-flow graph of basic blocks in pruned SSA form. The CFG has two
//! interchangeable shapes (label-keyed map and ordered list) because some
//! passes need random access and others need a linear order; the explicit
//! `linearize`/`blockify` passes switch between them.

use std::collections::{BTreeMap as Map, BTreeSet as Set};
use std::rc::Rc;

use crate::commons::{Valid, ValidationError};

pub mod display_impl;
pub mod fromstr_impl;

// SECTION: names

/// Basic block label. Small integers; fresh labels are minted from the
/// per-function counter.
pub type Label = u32;

/// The entry block of every function.
pub const ENTRY: Label = 0;

/// The landing block for guard-style BIF failures. Always treated as
/// being outside any guard.
pub const BADARG_BLOCK: Label = 1;

/// An SSA variable: either named in the source or generated by the
/// compiler as a base tag plus a counter value. The two representations
/// are kept distinct on purpose.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Var {
    Named(Rc<str>),
    Gen(Rc<str>, u32),
}

// make a source-named variable.
pub fn var(name: &str) -> Var {
    Var::Named(name.into())
}

// make a generated variable from a base tag and a counter value.
pub fn gen_var(base: &str, n: u32) -> Var {
    Var::Gen(base.into(), n)
}

// SECTION: operands

/// A constant term.
#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum Literal {
    Atom(Rc<str>),
    Int(i64),
    Float(F64),
    Nil,
    Str(Rc<str>),
    Tuple(Vec<Literal>),
    Cons(Box<Literal>, Box<Literal>),
}

/// A float literal with total ordering, so literals can be used as map
/// keys and compared for structural equality.
#[derive(Clone, Copy, Debug)]
pub struct F64(pub f64);

impl PartialEq for F64 {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == std::cmp::Ordering::Equal
    }
}

impl Eq for F64 {}

impl PartialOrd for F64 {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for F64 {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

pub fn atom(name: &str) -> Literal {
    Literal::Atom(name.into())
}

pub fn int(i: i64) -> Literal {
    Literal::Int(i)
}

/// An instruction or terminator operand.
#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum Value {
    Var(Var),
    Lit(Literal),
    /// A module:function pair naming a remote call target.
    Remote(Box<Value>, Box<Value>),
    /// A phi argument: the value flowing in from the given predecessor.
    PhiArg(Box<Value>, Label),
}

impl Value {
    pub fn lit_true() -> Value {
        Value::Lit(atom("true"))
    }

    pub fn as_var(&self) -> Option<&Var> {
        match self {
            Value::Var(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Lit(Literal::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Value::Lit(Literal::Atom(a)) => Some(a),
            _ => None,
        }
    }

    // collect every variable mentioned, in syntactic order.
    pub fn vars_into(&self, acc: &mut Vec<Var>) {
        match self {
            Value::Var(v) => acc.push(v.clone()),
            Value::Lit(_) => (),
            Value::Remote(m, f) => {
                m.vars_into(acc);
                f.vars_into(acc);
            }
            Value::PhiArg(v, _) => v.vars_into(acc),
        }
    }
}

// SECTION: instructions

/// Float sub-operations of the unboxed-float pipeline.
#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum FloatOp {
    Clearerror,
    Checkerror,
    Put,
    Get,
    Convert,
    Arith(Rc<str>),
}

/// Operation codes.
#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum Op {
    Phi,
    Bif(Rc<str>),
    Call,
    MakeFun,
    Succeeded,
    GetTupleElement,
    IsTaggedTuple,
    IsNonemptyList,
    BsStartMatch,
    BsMatch,
    BsExtract,
    BsTestTail,
    BsPut,
    Float(FloatOp),
    PutTuple,
    PutList,
    GetHd,
    GetTl,
    Extract,
    PeekMessage,
    RemoveMessage,
    RecvNext,
    WaitTimeout,
    Timeout,
    Landingpad,
    CatchEnd,
    SetTupleElement,
    GetMapElement,
    HasMapField,
}

/// Free-form annotation values. The only key the optimizer itself reads
/// is `float_op`, a list of per-argument type atoms.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AnnoValue {
    Atom(Rc<str>),
    List(Vec<AnnoValue>),
}

/// One SSA instruction: destination, operation, ordered arguments, and
/// an annotation map.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Instruction {
    pub dst: Var,
    pub op: Op,
    pub args: Vec<Value>,
    pub anno: Map<Rc<str>, AnnoValue>,
}

impl Instruction {
    pub fn new(dst: Var, op: Op, args: Vec<Value>) -> Instruction {
        Instruction {
            dst,
            op,
            args,
            anno: Map::new(),
        }
    }

    pub fn is_phi(&self) -> bool {
        self.op == Op::Phi
    }

    /// The `float_op` annotation, if present: one type atom per argument,
    /// where `float` means the argument is known to be a float.
    pub fn float_op_types(&self) -> Option<Vec<Rc<str>>> {
        match self.anno.get("float_op") {
            Some(AnnoValue::List(ts)) => Some(
                ts.iter()
                    .map(|t| match t {
                        AnnoValue::Atom(a) => a.clone(),
                        AnnoValue::List(_) => "any".into(),
                    })
                    .collect(),
            ),
            _ => None,
        }
    }
}

// SECTION: blocks

/// Block terminator.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Terminal {
    Br {
        bool: Value,
        succ: Label,
        fail: Label,
    },
    Switch {
        arg: Value,
        fail: Label,
        cases: Vec<(Literal, Label)>,
    },
    Ret(Value),
}

impl Terminal {
    // an unconditional branch.
    pub fn br(to: Label) -> Terminal {
        Terminal::Br {
            bool: Value::lit_true(),
            succ: to,
            fail: to,
        }
    }
}

/// A basic block: phis first, then the other instructions, then exactly
/// one terminator.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Block {
    pub insts: Vec<Instruction>,
    pub term: Terminal,
}

// SECTION: the control-flow graph

/// The CFG in one of its two shapes. Passes state which shape they need;
/// the conversions are the `linearize` and `blockify` passes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Cfg {
    Map(Map<Label, Block>),
    Linear(Vec<(Label, Block)>),
}

impl Cfg {
    /// Coerce to the map shape. Cheap when already a map.
    pub fn into_map(self) -> Map<Label, Block> {
        match self {
            Cfg::Map(map) => map,
            Cfg::Linear(linear) => linear.into_iter().collect(),
        }
    }

    /// Coerce to the ordered-list shape. A map is linearized into
    /// reverse-postorder with the entry block first.
    pub fn into_linear(self) -> Vec<(Label, Block)> {
        match self {
            Cfg::Linear(linear) => linear,
            Cfg::Map(map) => super::cfg::linearize(&map),
        }
    }

    // iterate over (label, block) pairs in the current shape's order.
    pub fn iter(&self) -> Box<dyn Iterator<Item = (Label, &Block)> + '_> {
        match self {
            Cfg::Map(map) => Box::new(map.iter().map(|(l, b)| (*l, b))),
            Cfg::Linear(linear) => Box::new(linear.iter().map(|(l, b)| (*l, b))),
        }
    }
}

// SECTION: functions and modules

#[derive(Clone, Debug)]
pub struct Function {
    pub name: Rc<str>,
    pub arity: u32,
    pub args: Vec<Var>,
    pub cfg: Cfg,
    /// Monotonic counter minting fresh labels and generated variables.
    pub cnt: u32,
}

#[derive(Clone, Debug)]
pub struct Module {
    pub name: Rc<str>,
    pub functions: Vec<Function>,
}

impl Module {
    /// Check the universal SSA invariants and wrap the module as `Valid`.
    ///
    /// Checks, per function: every variable defined exactly once;
    /// terminator targets are defined blocks; each phi's predecessor
    /// labels are exactly the block's predecessors; every `succeeded`
    /// references the destination of the immediately preceding
    /// instruction in its block.
    pub fn validate(self) -> Result<Valid<Module>, ValidationError> {
        for f in &self.functions {
            f.validate_function()?;
        }
        Ok(Valid(self))
    }
}

impl Function {
    fn error(&self, detail: String) -> ValidationError {
        ValidationError {
            function: (self.name.to_string(), self.arity),
            detail,
        }
    }

    fn validate_function(&self) -> Result<(), ValidationError> {
        let pairs: Vec<(Label, &Block)> = self.cfg.iter().collect();
        let labels: Set<Label> = pairs.iter().map(|(l, _)| *l).collect();

        if pairs.len() != labels.len() {
            return Err(self.error("duplicate block label".to_string()));
        }
        if !labels.contains(&ENTRY) {
            return Err(self.error("missing entry block".to_string()));
        }

        // single assignment, with the function arguments as initial defs.
        let mut defs: Set<Var> = self.args.iter().cloned().collect();
        if defs.len() != self.args.len() {
            return Err(self.error("duplicate argument".to_string()));
        }
        for (l, blk) in &pairs {
            for i in &blk.insts {
                if !defs.insert(i.dst.clone()) {
                    return Err(self.error(format!("variable {} defined twice (block {l})", i.dst)));
                }
            }
        }

        // terminator targets and phi/predecessor consistency.
        let mut preds: Map<Label, Set<Label>> = Map::new();
        for (l, blk) in &pairs {
            for s in super::cfg::successors(blk) {
                if !labels.contains(&s) {
                    return Err(self.error(format!("block {l} branches to undefined block {s}")));
                }
                preds.entry(s).or_default().insert(*l);
            }
        }
        for (l, blk) in &pairs {
            let empty = Set::new();
            let blk_preds = preds.get(l).unwrap_or(&empty);
            let mut seen_non_phi = false;
            for (n, i) in blk.insts.iter().enumerate() {
                match i.op {
                    Op::Phi => {
                        if seen_non_phi {
                            return Err(self.error(format!("phi after non-phi in block {l}")));
                        }
                        let mut phi_preds = Set::new();
                        for a in &i.args {
                            match a {
                                Value::PhiArg(_, p) => {
                                    phi_preds.insert(*p);
                                }
                                _ => {
                                    return Err(
                                        self.error(format!("malformed phi argument in block {l}"))
                                    )
                                }
                            }
                        }
                        if &phi_preds != blk_preds {
                            return Err(self.error(format!(
                                "phi in block {l} disagrees with predecessors"
                            )));
                        }
                    }
                    Op::Succeeded => {
                        seen_non_phi = true;
                        let ok = n > 0
                            && i.args.len() == 1
                            && i.args[0] == Value::Var(blk.insts[n - 1].dst.clone());
                        if !ok {
                            return Err(self.error(format!(
                                "succeeded in block {l} does not test the preceding instruction"
                            )));
                        }
                    }
                    _ => seen_non_phi = true,
                }
            }
        }
        Ok(())
    }
}
