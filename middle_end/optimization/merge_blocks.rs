//! Merge blocks with their unique predecessors.
//!
//! A block whose single predecessor branches unconditionally to it and
//! nowhere else is just a continuation of that predecessor. The
//! predecessor map is updated in place as blocks disappear, so chains of
//! merges cascade in one reverse-postorder sweep.

use std::collections::BTreeMap as Map;

use super::St;
use crate::middle_end::cfg;
use crate::middle_end::ssa::*;

pub fn ssa_opt_merge_blocks(st: St) -> St {
    let St { cfg, args, cnt } = st;
    let mut blocks = cfg.into_map();
    let mut preds = cfg::predecessors(&blocks);

    for l in cfg::rpo(&blocks) {
        if !blocks.contains_key(&l) {
            continue;
        }
        let p = match preds.get(&l).map(|ps| ps.as_slice()) {
            Some(&[p]) => p,
            _ => continue,
        };
        if p == l || !is_merge_allowed(l, p, &blocks) {
            continue;
        }

        let merged = blocks.remove(&l).unwrap();
        let into = blocks.get_mut(&p).unwrap();
        into.insts.extend(merged.insts);
        into.term = merged.term;

        let succs = cfg::successors(&blocks[&p]);
        cfg::update_phi_labels(&succs, l, p, &mut blocks);
        for s in &succs {
            if let Some(ps) = preds.get_mut(s) {
                for q in ps.iter_mut() {
                    if *q == l {
                        *q = p;
                    }
                }
                ps.sort_unstable();
                ps.dedup();
            }
        }
        preds.remove(&l);
    }

    St {
        cfg: Cfg::Map(blocks),
        args,
        cnt,
    }
}

fn is_merge_allowed(l: Label, p: Label, blocks: &Map<Label, Block>) -> bool {
    if l == ENTRY {
        return false;
    }
    match blocks[&l].insts.first() {
        // The VM requires a block boundary in front of peek_message.
        Some(i) if i.op == Op::PeekMessage => return false,
        // A phi can only survive here when the collapsing pass was
        // disabled; concatenating would orphan it.
        Some(i) if i.is_phi() => return false,
        _ => (),
    }
    match &blocks[&p].term {
        Terminal::Br { succ, fail, .. } => *succ == l && *fail == l,
        _ => false,
    }
}
