//! Common-subexpression elimination within extended basic blocks.
//!
//! Each block is entered with the expression map that holds on every
//! path into it (key-and-value intersection of the predecessors'
//! outgoing maps). Eliminated instructions become entries in a rename
//! substitution applied to all downstream code. The expression map is
//! dropped at instructions that clobber the x registers: keeping common
//! subexpressions alive across a call would force them into the stack
//! frame.

use std::collections::BTreeMap as Map;

use super::{sub_inst, sub_term, St, Subst};
use crate::middle_end::cfg;
use crate::middle_end::ssa::*;

type ExprKey = (Op, Vec<Value>);
type Es = Map<ExprKey, Var>;

pub fn ssa_opt_cse(st: St) -> St {
    let St { cfg, args, cnt } = st;
    let linear = cfg.into_linear();

    let mut maps: Map<Label, Es> = Map::new();
    if let Some((entry, _)) = linear.first() {
        maps.insert(*entry, Es::new());
    }

    let mut sub = Subst::new();
    let mut out = Vec::with_capacity(linear.len());
    for (l, blk) in linear {
        let es0 = maps.remove(&l).unwrap_or_default();
        let (insts, es) = cse_block(blk.insts, es0, &mut sub);
        let term = sub_term(&blk.term, &sub);
        let blk = Block { insts, term };
        cse_successors(&blk, &es, &mut maps);
        out.push((l, blk));
    }

    St {
        cfg: Cfg::Linear(out),
        args,
        cnt,
    }
}

fn cse_block(insts: Vec<Instruction>, mut es: Es, sub: &mut Subst) -> (Vec<Instruction>, Es) {
    let mut acc = vec![];
    for i0 in insts {
        if i0.op == Op::Succeeded {
            let src = i0.args[0].clone();
            let i = sub_inst(&i0, sub);
            if i.args[0] == src {
                acc.push(i);
            } else {
                // The tested instruction was eliminated; the test is
                // now trivially true.
                sub.insert(i0.dst, Value::lit_true());
            }
            continue;
        }

        let i = sub_inst(&i0, sub);
        if cfg::clobbers_xregs(&i) {
            es.clear();
            acc.push(i);
            continue;
        }
        match cse_expr(&i) {
            None => acc.push(i),
            Some(key) => match es.get(&key) {
                Some(src) => {
                    sub.insert(i.dst, Value::Var(src.clone()));
                }
                None => {
                    es.insert(key, i.dst.clone());
                    acc.push(i);
                }
            },
        }
    }
    (acc, es)
}

// Propagate the outgoing expression map to the successors. If the block
// ends with a suitable fallible instruction and its `succeeded` test,
// the instruction's value is only valid on the success edge; strip it
// from the map sent along the failure edge.
fn cse_successors(blk: &Block, es: &Es, maps: &mut Map<Label, Es>) {
    let n = blk.insts.len();
    let fallible_src = if n >= 2 {
        let last = &blk.insts[n - 1];
        let prev = &blk.insts[n - 2];
        let paired = last.op == Op::Succeeded
            && last.args == [Value::Var(prev.dst.clone())]
            && cse_suitable(prev);
        paired.then(|| prev.dst.clone())
    } else {
        None
    };

    match (&blk.term, fallible_src) {
        (Terminal::Br { succ, fail, .. }, Some(src)) if succ != fail => {
            cse_successors_1(&[*succ], es, maps);
            let es_fail: Es = es
                .iter()
                .filter(|(_, v)| **v != src)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            cse_successors_1(&[*fail], &es_fail, maps);
        }
        _ => cse_successors_1(&cfg::successors(blk), es, maps),
    }
}

fn cse_successors_1(ls: &[Label], es0: &Es, maps: &mut Map<Label, Es>) {
    for l in ls {
        match maps.get_mut(l) {
            None => {
                maps.insert(*l, es0.clone());
            }
            Some(es1) => {
                // Intersection: an entry survives only if both maps
                // agree on its value.
                es1.retain(|k, v| es0.get(k) == Some(&*v));
            }
        }
    }
}

fn cse_expr(i: &Instruction) -> Option<ExprKey> {
    if cse_suitable(i) {
        Some((i.op.clone(), i.args.clone()))
    } else {
        None
    }
}

// Type tests, comparisons, and boolean operators are deliberately not
// eliminated: keeping them separate lets the backend fuse them into
// branching test instructions.
fn cse_suitable(i: &Instruction) -> bool {
    match &i.op {
        Op::GetHd | Op::GetTl | Op::PutList | Op::PutTuple => true,
        Op::Bif(name) => {
            !(is_type_test(name) || is_comparison(name) || is_bool_op(name))
        }
        _ => false,
    }
}

fn is_type_test(name: &str) -> bool {
    matches!(
        name,
        "is_atom"
            | "is_binary"
            | "is_bitstring"
            | "is_boolean"
            | "is_float"
            | "is_function"
            | "is_integer"
            | "is_list"
            | "is_map"
            | "is_number"
            | "is_pid"
            | "is_port"
            | "is_reference"
            | "is_tuple"
    )
}

fn is_comparison(name: &str) -> bool {
    matches!(name, "=:=" | "=/=" | "==" | "/=" | "<" | "=<" | ">" | ">=")
}

fn is_bool_op(name: &str) -> bool {
    matches!(name, "and" | "or" | "xor" | "not")
}
