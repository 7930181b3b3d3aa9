//! Liveness analysis and dead-code elimination.
//!
//! A classic backward walk over the linearized CFG in reverse. The
//! live-out of a block is the union of the live-ins of its successors,
//! where a successor with phis contributes a per-edge live-in: the phi
//! arguments it consumes only matter on the edge they arrive on.
//!
//! Besides deleting dead pure instructions, the walk downgrades a
//! `get_map_element` whose value is dead but whose success flag is live
//! into `has_map_field` bound straight to the flag.

use std::collections::{BTreeMap as Map, BTreeSet as Set};

use super::St;
use crate::middle_end::cfg;
use crate::middle_end::ssa::*;

pub fn ssa_opt_live(st: St) -> St {
    let St { cfg, args, cnt } = st;
    let linear = cfg.into_linear();

    // live-in per block, and per (successor, predecessor) edge where
    // phis make the difference.
    let mut live_map: Map<Label, Set<Var>> = Map::new();
    let mut edge_map: Map<(Label, Label), Set<Var>> = Map::new();

    let mut out: Vec<(Label, Block)> = Vec::with_capacity(linear.len());
    for (l, blk) in linear.into_iter().rev() {
        let mut live: Set<Var> = Set::new();
        for s in cfg::successors(&blk) {
            if let Some(es) = edge_map.get(&(s, l)) {
                live.extend(es.iter().cloned());
            } else if let Some(es) = live_map.get(&s) {
                live.extend(es.iter().cloned());
            }
            // A successor not seen yet is a back edge. Only receive
            // loops have those, and they carry no live variables.
        }
        live.extend(cfg::used_term(&blk.term));

        let insts = live_opt_is(blk.insts, &mut live);

        live_map.insert(l, live.clone());
        let mut from_pred: Map<Label, Vec<Var>> = Map::new();
        for i in insts.iter().take_while(|i| i.is_phi()) {
            for a in &i.args {
                if let Value::PhiArg(v, p) = a {
                    let mut vs = vec![];
                    v.vars_into(&mut vs);
                    if !vs.is_empty() {
                        from_pred.entry(*p).or_default().append(&mut vs);
                    }
                }
            }
        }
        for (p, vs) in from_pred {
            let mut edge_live = live.clone();
            edge_live.extend(vs);
            edge_map.insert((l, p), edge_live);
        }

        out.push((
            l,
            Block {
                insts,
                term: blk.term,
            },
        ));
    }
    out.reverse();

    St {
        cfg: Cfg::Linear(out),
        args,
        cnt,
    }
}

// Walk the instructions bottom-up, dropping what the live set proves
// dead. Returns the surviving instructions in program order.
fn live_opt_is(insts: Vec<Instruction>, live: &mut Set<Var>) -> Vec<Instruction> {
    let mut acc: Vec<Instruction> = vec![]; // reversed program order
    let mut idx = insts.len();
    while idx > 0 {
        idx -= 1;
        let i = &insts[idx];
        if i.op == Op::Succeeded && idx > 0 {
            let prev = &insts[idx - 1];
            if i.args == [Value::Var(prev.dst.clone())] {
                idx -= 1;
                live_opt_pair(prev.clone(), i.clone(), live, &mut acc);
                continue;
            }
        }
        live_opt_single(i.clone(), live, &mut acc);
    }
    acc.reverse();
    acc
}

// `[inst; succeeded(inst.dst)]`, seen as one unit.
fn live_opt_pair(
    inst: Instruction,
    succ: Instruction,
    live: &mut Set<Var>,
    acc: &mut Vec<Instruction>,
) {
    if live.contains(&inst.dst) {
        // Result used: both stay.
        live.remove(&succ.dst);
        live.remove(&inst.dst);
        live.extend(cfg::used(&inst));
        acc.push(succ);
        acc.push(inst);
    } else if live.contains(&succ.dst) {
        // Only the success flag is used; a cheaper instruction may
        // compute the flag directly.
        match live_opt_unused(&inst) {
            Some(mut cheaper) => {
                cheaper.dst = succ.dst;
                live_opt_single(cheaper, live, acc);
            }
            None => {
                live.remove(&succ.dst);
                live.extend(cfg::used(&inst));
                acc.push(succ);
                acc.push(inst);
            }
        }
    } else {
        // Neither is used; the test disappears and the instruction is
        // treated like any other.
        live_opt_single(inst, live, acc);
    }
}

fn live_opt_single(i: Instruction, live: &mut Set<Var>, acc: &mut Vec<Instruction>) {
    if !live.contains(&i.dst) && (i.is_phi() || is_pure(&i.op)) {
        return;
    }
    live.remove(&i.dst);
    if !i.is_phi() {
        // Phi arguments only count on their own edge; they are added
        // to the per-edge live-ins by the caller.
        live.extend(cfg::used(&i));
    }
    acc.push(i);
}

// the downgrade table for instructions whose value is dead.
fn live_opt_unused(i: &Instruction) -> Option<Instruction> {
    if i.op == Op::GetMapElement {
        let mut cheaper = i.clone();
        cheaper.op = Op::HasMapField;
        return Some(cheaper);
    }
    None
}

fn is_pure(op: &Op) -> bool {
    matches!(
        op,
        Op::Bif(_)
            | Op::Float(FloatOp::Get)
            | Op::BsExtract
            | Op::Extract
            | Op::GetHd
            | Op::GetTl
            | Op::GetTupleElement
            | Op::IsNonemptyList
            | Op::IsTaggedTuple
            | Op::PutList
            | Op::PutTuple
    )
}
