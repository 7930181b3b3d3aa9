//! Generic CFG utilities: traversal orders, predecessors, dominators,
//! used-variable sets, block splitting and phi-label rewriting.
//!
//! Dominator chains are kept as vectors ordered entry-first, so that
//! intersecting two chains is a linear common-prefix walk and the deepest
//! common dominator is simply the last element.

use std::collections::{BTreeMap as Map, BTreeSet as Set};

use super::ssa::*;

// SECTION: traversal

/// Successor labels of a block, deduplicated in branch order.
pub fn successors(blk: &Block) -> Vec<Label> {
    match &blk.term {
        Terminal::Br { succ, fail, .. } => {
            if succ == fail {
                vec![*succ]
            } else {
                vec![*succ, *fail]
            }
        }
        Terminal::Switch { fail, cases, .. } => {
            let mut ls = vec![*fail];
            for (_, to) in cases {
                if !ls.contains(to) {
                    ls.push(*to);
                }
            }
            ls
        }
        Terminal::Ret(_) => vec![],
    }
}

/// Predecessor map for every block in the graph. Blocks without
/// predecessors (the entry, unreferenced blocks) map to an empty list.
pub fn predecessors(blocks: &Map<Label, Block>) -> Map<Label, Vec<Label>> {
    let mut preds: Map<Label, Vec<Label>> = blocks.keys().map(|l| (*l, vec![])).collect();
    for (l, blk) in blocks {
        for s in successors(blk) {
            if let Some(ps) = preds.get_mut(&s) {
                if !ps.contains(l) {
                    ps.push(*l);
                }
            }
        }
    }
    for ps in preds.values_mut() {
        ps.sort_unstable();
    }
    preds
}

/// Reverse-postorder of the blocks reachable from the entry.
pub fn rpo(blocks: &Map<Label, Block>) -> Vec<Label> {
    if !blocks.contains_key(&ENTRY) {
        return vec![];
    }
    let mut post = vec![];
    let mut visited = Set::from([ENTRY]);
    let mut stack = vec![(ENTRY, 0usize)];
    while let Some((l, i)) = stack.pop() {
        let succs = successors(&blocks[&l]);
        if i < succs.len() {
            stack.push((l, i + 1));
            let s = succs[i];
            if blocks.contains_key(&s) && visited.insert(s) {
                stack.push((s, 0));
            }
        } else {
            post.push(l);
        }
    }
    post.reverse();
    post
}

/// Linearize a block map into reverse-postorder, entry first.
/// Unreachable blocks are dropped.
pub fn linearize(blocks: &Map<Label, Block>) -> Vec<(Label, Block)> {
    rpo(blocks)
        .into_iter()
        .map(|l| (l, blocks[&l].clone()))
        .collect()
}

// SECTION: dominators

/// Dominator chains for every reachable block: the chain contains every
/// dominator including the block itself, ordered entry-first.
pub fn dominators(blocks: &Map<Label, Block>) -> Map<Label, Vec<Label>> {
    let order = rpo(blocks);
    let preds = predecessors(blocks);
    let mut doms: Map<Label, Vec<Label>> = Map::new();
    doms.insert(ENTRY, vec![ENTRY]);

    let mut changed = true;
    while changed {
        changed = false;
        for &l in &order {
            if l == ENTRY {
                continue;
            }
            // Meet over the already-computed predecessors. Chains are
            // tree paths from the entry, so their intersection is the
            // longest common prefix.
            let mut meet: Option<Vec<Label>> = None;
            for p in &preds[&l] {
                if let Some(pd) = doms.get(p) {
                    meet = Some(match meet {
                        None => pd.clone(),
                        Some(cur) => common_prefix(&cur, pd),
                    });
                }
            }
            let mut chain = meet.unwrap_or_default();
            chain.push(l);
            if doms.get(&l) != Some(&chain) {
                doms.insert(l, chain);
                changed = true;
            }
        }
    }
    doms
}

fn common_prefix(a: &[Label], b: &[Label]) -> Vec<Label> {
    a.iter()
        .zip(b.iter())
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| *x)
        .collect()
}

// SECTION: used variables

/// Sorted, deduplicated free variables of an instruction.
pub fn used(inst: &Instruction) -> Vec<Var> {
    let mut vs = vec![];
    for a in &inst.args {
        a.vars_into(&mut vs);
    }
    vs.sort_unstable();
    vs.dedup();
    vs
}

/// Sorted, deduplicated free variables of a terminator.
pub fn used_term(term: &Terminal) -> Vec<Var> {
    let mut vs = vec![];
    match term {
        Terminal::Br { bool, .. } => bool.vars_into(&mut vs),
        Terminal::Switch { arg, .. } => arg.vars_into(&mut vs),
        Terminal::Ret(arg) => arg.vars_into(&mut vs),
    }
    vs.sort_unstable();
    vs.dedup();
    vs
}

/// Every variable used anywhere in a block, including phi arguments.
pub fn used_block(blk: &Block) -> Vec<Var> {
    let mut vs = vec![];
    for i in &blk.insts {
        for a in &i.args {
            a.vars_into(&mut vs);
        }
    }
    vs.append(&mut used_term(&blk.term));
    vs.sort_unstable();
    vs.dedup();
    vs
}

// SECTION: rewriting

/// Split every block so that each instruction matching the predicate,
/// unless already first in its block, starts a fresh block. The head
/// keeps the original label; successor phis are repointed at the label
/// of the final piece.
pub fn split_blocks<F>(pred: F, blocks: Map<Label, Block>, cnt: &mut u32) -> Map<Label, Block>
where
    F: Fn(&Instruction) -> bool,
{
    let mut out: Map<Label, Block> = Map::new();
    let mut renames: Vec<(Label, Label, Vec<Label>)> = vec![];

    for (l, blk) in blocks {
        let succs = successors(&blk);
        let mut pieces: Vec<Vec<Instruction>> = vec![vec![]];
        for inst in blk.insts {
            if pred(&inst) && !pieces.last().unwrap().is_empty() {
                pieces.push(vec![]);
            }
            pieces.last_mut().unwrap().push(inst);
        }

        let mut labels = vec![l];
        for _ in 1..pieces.len() {
            labels.push(*cnt);
            *cnt += 1;
        }
        let last = *labels.last().unwrap();
        if last != l {
            renames.push((l, last, succs));
        }

        let n = pieces.len();
        for (i, insts) in pieces.into_iter().enumerate() {
            let term = if i + 1 < n {
                Terminal::br(labels[i + 1])
            } else {
                blk.term.clone()
            };
            out.insert(labels[i], Block { insts, term });
        }
    }

    for (from, to, succs) in renames {
        update_phi_labels(&succs, from, to, &mut out);
    }
    out
}

/// Rewrite phi predecessor labels `from` to `to` in the given successor
/// blocks.
pub fn update_phi_labels(succs: &[Label], from: Label, to: Label, blocks: &mut Map<Label, Block>) {
    for s in succs {
        let Some(blk) = blocks.get_mut(s) else { continue };
        for i in &mut blk.insts {
            if !i.is_phi() {
                break;
            }
            for a in &mut i.args {
                if let Value::PhiArg(_, p) = a {
                    if *p == from {
                        *p = to;
                    }
                }
            }
        }
    }
}

/// Whether an instruction may clobber the caller-save registers.
pub fn clobbers_xregs(inst: &Instruction) -> bool {
    matches!(inst.op, Op::Call | Op::MakeFun)
}

// SECTION: tests

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn blk(insts: Vec<Instruction>, term: Terminal) -> Block {
        Block { insts, term }
    }

    fn diamond() -> Map<Label, Block> {
        // 0 -> {2,3} -> 4
        Map::from([
            (
                0,
                blk(
                    vec![],
                    Terminal::Br {
                        bool: Value::Var(var("B")),
                        succ: 2,
                        fail: 3,
                    },
                ),
            ),
            (2, blk(vec![], Terminal::br(4))),
            (3, blk(vec![], Terminal::br(4))),
            (4, blk(vec![], Terminal::Ret(Value::Lit(atom("ok"))))),
        ])
    }

    #[test]
    fn rpo_of_diamond() {
        let blocks = diamond();
        let order = rpo(&blocks);
        assert_eq!(order[0], 0);
        assert_eq!(*order.last().unwrap(), 4);
        assert_eq!(order.len(), 4);
    }

    #[test]
    fn dominators_of_diamond() {
        let doms = dominators(&diamond());
        assert_eq!(doms[&0], vec![0]);
        assert_eq!(doms[&2], vec![0, 2]);
        assert_eq!(doms[&3], vec![0, 3]);
        assert_eq!(doms[&4], vec![0, 4]);
    }

    #[test]
    fn predecessors_of_diamond() {
        let preds = predecessors(&diamond());
        assert_eq!(preds[&0], vec![]);
        assert_eq!(preds[&4], vec![2, 3]);
    }

    #[test]
    fn split_repoints_phis() {
        let mut blocks = diamond();
        blocks.insert(
            2,
            blk(
                vec![
                    Instruction::new(var("X"), Op::GetHd, vec![Value::Var(var("L"))]),
                    Instruction::new(var("Y"), Op::Call, vec![Value::Var(var("F"))]),
                ],
                Terminal::br(4),
            ),
        );
        blocks.insert(
            4,
            blk(
                vec![Instruction::new(
                    var("P"),
                    Op::Phi,
                    vec![
                        Value::PhiArg(Box::new(Value::Var(var("X"))), 2),
                        Value::PhiArg(Box::new(Value::Lit(atom("none"))), 3),
                    ],
                )],
                Terminal::Ret(Value::Var(var("P"))),
            ),
        );
        let mut cnt = 5;
        let out = split_blocks(|i| i.op == Op::Call, blocks, &mut cnt);
        assert_eq!(cnt, 6);
        // the call starts block 5, and the phi in 4 now names 5.
        assert_eq!(out[&2].insts.len(), 1);
        assert_eq!(out[&5].insts[0].op, Op::Call);
        assert_eq!(
            out[&4].insts[0].args[0],
            Value::PhiArg(Box::new(Value::Var(var("X"))), 5)
        );
    }
}
