//! Reorder chains of tuple-index reads.
//!
//! A chain is a run of blocks each shaped
//! `[element(N, T); succeeded(B)]; br(B, Next, Fail)` where every block
//! reads the same tuple and fails to the same label, linked through the
//! success edges. Reading the highest index first proves the tuple is
//! long enough for all the others, which lets later passes turn the
//! remaining reads into raw `get_tuple_element`.

use std::collections::BTreeMap as Map;

use super::St;
use crate::middle_end::cfg;
use crate::middle_end::ssa::*;

struct ElementCall {
    label: Label,
    index: i64,
    tuple: Var,
    succ: Label,
    fail: Label,
}

pub fn ssa_opt_element(st: St) -> St {
    let St { cfg, args, cnt } = st;
    let mut blocks = cfg.into_map();

    let calls = collect_element_calls(&blocks);
    for chain in collect_chains(&calls) {
        swap_element_calls(chain, &mut blocks);
    }

    St {
        cfg: Cfg::Map(blocks),
        args,
        cnt,
    }
}

// Collect, in linearized order, every block consisting of exactly an
// `element` call and its `succeeded` test, branching on the test.
fn collect_element_calls(blocks: &Map<Label, Block>) -> Vec<ElementCall> {
    let mut calls = vec![];
    for l in cfg::rpo(blocks) {
        let blk = &blocks[&l];
        let [e, s] = blk.insts.as_slice() else { continue };
        let ok = matches!(&e.op, Op::Bif(name) if &**name == "element")
            && s.op == Op::Succeeded
            && s.args == [Value::Var(e.dst.clone())];
        if !ok {
            continue;
        }
        let index = match e.args.first().and_then(|a| a.as_int()) {
            Some(index) => index,
            None => continue,
        };
        let Some(Value::Var(tuple)) = e.args.get(1) else {
            continue;
        };
        if let Terminal::Br { bool, succ, fail } = &blk.term {
            if *bool == Value::Var(s.dst.clone()) {
                calls.push(ElementCall {
                    label: l,
                    index,
                    tuple: tuple.clone(),
                    succ: *succ,
                    fail: *fail,
                });
            }
        }
    }
    calls
}

// Group successive calls into chains: each block's success edge leads to
// the next block, on the same tuple, with the same fail label. Chains
// shorter than two blocks are useless.
fn collect_chains(calls: &[ElementCall]) -> Vec<&[ElementCall]> {
    let mut chains = vec![];
    let mut start = 0;
    for i in 1..=calls.len() {
        let linked = i < calls.len() && {
            let prev = &calls[i - 1];
            let cur = &calls[i];
            prev.succ == cur.label && prev.tuple == cur.tuple && prev.fail == cur.fail
        };
        if !linked {
            if i - start >= 2 {
                chains.push(&calls[start..i]);
            }
            start = i;
        }
    }
    chains
}

// If the first block of the chain does not read the highest index, swap
// its `element` instruction with the block that does, and repoint each
// block's `succeeded` at the element destination now local to it. The
// destinations travel with their instructions, so every value still
// means the same thing downstream.
fn swap_element_calls(chain: &[ElementCall], blocks: &mut Map<Label, Block>) {
    let mut max = &chain[0];
    for c in &chain[1..] {
        if c.index > max.index {
            max = c;
        }
    }
    if chain[0].index >= max.index {
        return;
    }

    let first_el = blocks[&chain[0].label].insts[0].clone();
    let max_el = blocks[&max.label].insts[0].clone();
    let first_blk = blocks.get_mut(&chain[0].label).unwrap();
    first_blk.insts[1].args = vec![Value::Var(max_el.dst.clone())];
    first_blk.insts[0] = max_el;
    let max_blk = blocks.get_mut(&max.label).unwrap();
    max_blk.insts[1].args = vec![Value::Var(first_el.dst.clone())];
    max_blk.insts[0] = first_el;
}
