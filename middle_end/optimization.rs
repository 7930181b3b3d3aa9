//! The optimization pass pipeline.
//!
//! Every pass has the signature `St -> St`. The driver maps each function
//! of a module through the pipeline independently; the order below is
//! load-bearing, since later passes rely on shapes produced by earlier
//! ones (`record` wants the short blocks made by `split_blocks`, `sink`
//! wants the fused `is_tagged_tuple` tests, and so on).

use std::collections::BTreeMap as Map;
use std::rc::Rc;

use crate::commons::{Valid, ValidationError};
use crate::middle_end::cfg;
use crate::middle_end::ssa::*;

pub mod bsm;
pub mod cse;
pub mod element;
pub mod float;
pub mod live;
pub mod merge_blocks;
pub mod misc;
pub mod record;
pub mod sink;

#[cfg(test)]
mod tests;

// SECTION: pass state

/// Per-function optimizer state: the CFG in its current shape, the
/// function's arguments, and the monotonic fresh-name counter.
#[derive(Clone, Debug)]
pub struct St {
    pub cfg: Cfg,
    pub args: Vec<Var>,
    pub cnt: u32,
}

// SECTION: options

/// The hook implementing the external type-based optimization pass.
pub type TypeOptHook = Rc<dyn Fn(Vec<(Label, Block)>, &[Var]) -> Vec<(Label, Block)>>;

/// Compilation options. For a pass named `P`: if `no_P` is present the
/// pass is replaced by the identity; otherwise it runs unless `P` is
/// explicitly `false`. Unknown keys are kept but ignored.
#[derive(Clone, Default)]
pub struct Options {
    pub flags: Map<String, bool>,
    pub type_opt: Option<TypeOptHook>,
}

impl Options {
    pub fn new() -> Options {
        Options::default()
    }

    pub fn from_flags(flags: Map<String, bool>) -> Options {
        Options {
            flags,
            type_opt: None,
        }
    }

    pub fn set(&mut self, key: &str, val: bool) {
        self.flags.insert(key.to_string(), val);
    }

    fn is_enabled(&self, pass: &str) -> bool {
        if self.flags.contains_key(&format!("no_{pass}")) {
            return false;
        }
        *self.flags.get(pass).unwrap_or(&true)
    }
}

// SECTION: the pipeline

type PassFn = Box<dyn Fn(St) -> St>;

fn pass(name: &'static str, enabled: bool, f: fn(St) -> St) -> (&'static str, PassFn) {
    if enabled {
        (name, Box::new(f))
    } else {
        (name, Box::new(|st| st))
    }
}

/// Build the pass list, substituting the identity for disabled passes.
/// The options are read here, once, and never again.
fn build_pipeline(opts: &Options) -> Vec<(&'static str, PassFn)> {
    let mut ps: Vec<(&'static str, PassFn)> = vec![
        pass("split_blocks", opts.is_enabled("split_blocks"), ssa_opt_split_blocks),
        pass("element", opts.is_enabled("element"), element::ssa_opt_element),
        pass("linearize", opts.is_enabled("linearize"), ssa_opt_linearize),
        pass("record", opts.is_enabled("record"), record::ssa_opt_record),
        pass("cse", opts.is_enabled("cse"), cse::ssa_opt_cse),
    ];

    let type_hook = if opts.is_enabled("type") {
        opts.type_opt.clone()
    } else {
        None
    };
    ps.push((
        "type",
        Box::new(move |st: St| match &type_hook {
            Some(hook) => {
                let St { cfg, args, cnt } = st;
                let linear = hook(cfg.into_linear(), &args);
                St {
                    cfg: Cfg::Linear(linear),
                    args,
                    cnt,
                }
            }
            None => st,
        }),
    ));

    ps.extend([
        pass("float", opts.is_enabled("float"), float::ssa_opt_float),
        pass("live", opts.is_enabled("live"), live::ssa_opt_live),
        pass("bsm", opts.is_enabled("bsm"), bsm::ssa_opt_bsm),
        pass("bsm_shortcut", opts.is_enabled("bsm_shortcut"), bsm::ssa_opt_bsm_shortcut),
        pass("misc", opts.is_enabled("misc"), misc::ssa_opt_misc),
        pass("blockify", opts.is_enabled("blockify"), ssa_opt_blockify),
        pass("sink", opts.is_enabled("sink"), sink::ssa_opt_sink),
        pass("merge_blocks", opts.is_enabled("merge_blocks"), merge_blocks::ssa_opt_merge_blocks),
    ]);
    ps
}

/// Optimize every function of a module. Functions are independent; the
/// output preserves their order. The result of the pipeline is validated
/// per function, and a failure names the function as `name/arity`.
pub fn optimize_module(module: Module, opts: &Options) -> Result<Valid<Module>, ValidationError> {
    let passes = build_pipeline(opts);

    let mut functions = vec![];
    for f in module.functions {
        let Function {
            name,
            arity,
            args,
            cfg,
            cnt,
        } = f;
        let mut st = St { cfg, args, cnt };
        for (_, p) in &passes {
            st = p(st);
        }
        functions.push(Function {
            name,
            arity,
            args: st.args,
            cfg: st.cfg,
            cnt: st.cnt,
        });
    }

    Module {
        name: module.name,
        functions,
    }
    .validate()
}

// SECTION: representation passes

/// Split blocks before `{bif,element}`, `call` and `make_fun`
/// instructions, so that later passes can reorder the short blocks or
/// sink instructions into them.
fn ssa_opt_split_blocks(st: St) -> St {
    let St { cfg, args, mut cnt } = st;
    let blocks = cfg.into_map();
    let blocks = cfg::split_blocks(
        |i| match &i.op {
            Op::Bif(name) => &**name == "element",
            Op::Call | Op::MakeFun => true,
            _ => false,
        },
        blocks,
        &mut cnt,
    );
    St {
        cfg: Cfg::Map(blocks),
        args,
        cnt,
    }
}

fn ssa_opt_linearize(st: St) -> St {
    let St { cfg, args, cnt } = st;
    St {
        cfg: Cfg::Linear(cfg.into_linear()),
        args,
        cnt,
    }
}

fn ssa_opt_blockify(st: St) -> St {
    let St { cfg, args, cnt } = st;
    St {
        cfg: Cfg::Map(cfg.into_map()),
        args,
        cnt,
    }
}

// SECTION: substitution

/// An ordered variable-to-operand mapping applied to downstream code.
pub(crate) type Subst = Map<Var, Value>;

pub(crate) fn sub_value(v: &Value, sub: &Subst) -> Value {
    match v {
        Value::Var(x) => match sub.get(x) {
            Some(repl) => repl.clone(),
            None => v.clone(),
        },
        Value::Lit(_) => v.clone(),
        Value::Remote(m, f) => {
            Value::Remote(Box::new(sub_value(m, sub)), Box::new(sub_value(f, sub)))
        }
        // only the value component of a phi pair is substituted.
        Value::PhiArg(val, p) => Value::PhiArg(Box::new(sub_value(val, sub)), *p),
    }
}

pub(crate) fn sub_inst(i: &Instruction, sub: &Subst) -> Instruction {
    if sub.is_empty() {
        return i.clone();
    }
    Instruction {
        dst: i.dst.clone(),
        op: i.op.clone(),
        args: i.args.iter().map(|a| sub_value(a, sub)).collect(),
        anno: i.anno.clone(),
    }
}

pub(crate) fn sub_term(t: &Terminal, sub: &Subst) -> Terminal {
    if sub.is_empty() {
        return t.clone();
    }
    match t {
        Terminal::Br { bool, succ, fail } => Terminal::Br {
            bool: sub_value(bool, sub),
            succ: *succ,
            fail: *fail,
        },
        Terminal::Switch { arg, fail, cases } => Terminal::Switch {
            arg: sub_value(arg, sub),
            fail: *fail,
            cases: cases.clone(),
        },
        Terminal::Ret(arg) => Terminal::Ret(sub_value(arg, sub)),
    }
}
