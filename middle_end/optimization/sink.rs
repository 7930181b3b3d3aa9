//! Sink `get_tuple_element` instructions to their latest safe point.
//!
//! A tuple read whose value is only needed down one arm of a branch is
//! moved to the deepest block that dominates all of its uses, so the
//! read never executes on paths that ignore it. Some blocks cannot
//! receive new code (float regions, binary construction, landing pads,
//! everything inside a receive loop); those are struck from the
//! dominator chains before choosing a target.

use std::collections::{BTreeMap as Map, BTreeSet as Set};

use super::St;
use crate::middle_end::cfg;
use crate::middle_end::ssa::*;

pub fn ssa_opt_sink(st: St) -> St {
    let St { cfg, args, cnt } = st;
    let mut blocks = cfg.into_map();

    // Definitions: every get_tuple_element destination and its block.
    let mut defs: Map<Var, Label> = Map::new();
    for (l, blk) in &blocks {
        for i in &blk.insts {
            if i.op == Op::GetTupleElement {
                defs.insert(i.dst.clone(), *l);
            }
        }
    }

    // Uses of those variables, per block.
    let mut uses: Map<Var, Vec<Label>> = Map::new();
    for (l, blk) in &blocks {
        for v in cfg::used_block(blk) {
            if defs.contains_key(&v) {
                uses.entry(v).or_default().push(*l);
            }
        }
    }

    let unsuitable = unsuitable(&blocks);
    let mut dom = cfg::dominators(&blocks);
    if !unsuitable.is_empty() {
        for chain in dom.values_mut() {
            chain.retain(|l| !unsuitable.contains(l));
        }
    }

    for (v, used_in) in uses {
        let def_block = defs[&v];
        let Some(to) = new_def_location(&used_in, def_block, &dom) else {
            continue;
        };
        move_def(&v, def_block, to, &mut blocks);
    }

    St {
        cfg: Cfg::Map(blocks),
        args,
        cnt,
    }
}

// SECTION: unsuitable blocks

fn unsuitable(blocks: &Map<Label, Block>) -> Set<Label> {
    let preds = cfg::predecessors(blocks);
    let mut un = Set::new();
    for (l, blk) in blocks {
        let bad = matches!(
            blk.insts.first().map(|i| &i.op),
            Some(
                Op::BsExtract
                    | Op::BsPut
                    | Op::Float(_)
                    | Op::Landingpad
                    | Op::PeekMessage
                    | Op::WaitTimeout
            )
        );
        if bad {
            un.insert(*l);
        }
    }
    // The body of a receive loop: everything reachable backwards from a
    // remove_message or recv_next, stopping at peek_message blocks.
    for (l, blk) in blocks {
        if matches!(
            blk.insts.first().map(|i| &i.op),
            Some(Op::RemoveMessage | Op::RecvNext)
        ) {
            unsuitable_loop(*l, blocks, &preds, &mut un);
        }
    }
    un
}

fn unsuitable_loop(
    from: Label,
    blocks: &Map<Label, Block>,
    preds: &Map<Label, Vec<Label>>,
    un: &mut Set<Label>,
) {
    let mut work: Vec<Label> = preds.get(&from).cloned().unwrap_or_default();
    let mut visited = Set::new();
    while let Some(p) = work.pop() {
        if !visited.insert(p) {
            continue;
        }
        let starts_receive = matches!(
            blocks[&p].insts.first().map(|i| &i.op),
            Some(Op::PeekMessage)
        );
        if starts_receive {
            continue;
        }
        un.insert(p);
        work.extend(preds.get(&p).cloned().unwrap_or_default());
    }
}

// SECTION: choosing the new location

// The deepest block that dominates every use but is not already
// dominated by the definition. Chains are entry-first, so the
// intersection keeps that order and the answer is its last element.
fn new_def_location(used_in: &[Label], def_block: Label, dom: &Map<Label, Vec<Label>>) -> Option<Label> {
    let mut chains = used_in.iter().map(|l| dom.get(l));
    let mut common: Vec<Label> = chains.next()??.clone();
    for chain in chains {
        let chain: Set<Label> = chain?.iter().copied().collect();
        common.retain(|l| chain.contains(l));
    }
    let def_dom: Set<Label> = dom.get(&def_block)?.iter().copied().collect();
    common.retain(|l| !def_dom.contains(l));
    common.last().copied()
}

// SECTION: moving the definition

fn move_def(v: &Var, from: Label, to: Label, blocks: &mut Map<Label, Block>) {
    let Some(at) = insert_position(&blocks[&to], v) else {
        // not possible: leave the definition where it is.
        return;
    };
    let from_blk = blocks.get_mut(&from).unwrap();
    let pos = from_blk.insts.iter().position(|i| &i.dst == v).unwrap();
    let def = from_blk.insts.remove(pos);
    blocks.get_mut(&to).unwrap().insts.insert(at, def);
}

// Scan from the top of the target block for a place to put the
// definition. `None` means insertion is not possible.
fn insert_position(blk: &Block, v: &Var) -> Option<usize> {
    for (idx, i) in blk.insts.iter().enumerate() {
        if i.is_phi() {
            if cfg::used(i).contains(v) {
                return None;
            }
            continue;
        }
        let mut beyond = matches!(
            i.op,
            Op::Call | Op::CatchEnd | Op::SetTupleElement | Op::Timeout
        );
        if let Some(next) = blk.insts.get(idx + 1) {
            if next.op == Op::Succeeded {
                // never split an instruction from its succeeded.
                beyond = false;
            }
        }
        if beyond && !cfg::used(i).contains(v) {
            continue;
        }
        return Some(idx);
    }
    Some(blk.insts.len())
}
