//! Binary-match optimizations.
//!
//! `ssa_opt_bsm` finds `bs_match` instructions whose extracted value is
//! never used and rewrites them to the `skip` form, which advances the
//! match position without materializing anything.
//!
//! `ssa_opt_bsm_shortcut` tracks the cumulative bit offset of every
//! match context. When a match fails into a `bs_test_tail` block whose
//! total size the context has already passed, the tail test cannot
//! succeed, so the failure branch skips straight to the tail test's own
//! fail label.

use std::collections::{BTreeMap as Map, BTreeSet as Set};

use super::St;
use crate::middle_end::ssa::*;

// SECTION: skip rewriting

pub fn ssa_opt_bsm(st: St) -> St {
    let St { cfg, args, cnt } = st;
    let mut linear = cfg.into_linear();

    let extracted = bsm_extracted(&linear);
    for (_, blk) in linear.iter_mut() {
        for i in &mut blk.insts {
            bsm_skip(i, &extracted);
        }
    }

    St {
        cfg: Cfg::Linear(linear),
        args,
        cnt,
    }
}

// every context that some bs_extract reads from.
fn bsm_extracted(linear: &[(Label, Block)]) -> Set<Var> {
    let mut ctxs = Set::new();
    for (_, blk) in linear {
        for i in &blk.insts {
            if i.op == Op::BsExtract {
                if let Some(Value::Var(ctx)) = i.args.first() {
                    ctxs.insert(ctx.clone());
                }
            }
        }
    }
    ctxs
}

fn bsm_skip(i: &mut Instruction, extracted: &Set<Var>) {
    if i.op != Op::BsMatch || extracted.contains(&i.dst) {
        return;
    }
    match i.args.first().and_then(|a| a.as_atom()) {
        // A matched-out string has no extraction to skip, and the skip
        // form is already done.
        None | Some("string") | Some("skip") => (),
        Some(_) => {
            let ty = i.args.remove(0);
            i.args.insert(1, ty);
            i.args.insert(0, Value::Lit(atom("skip")));
        }
    }
}

// SECTION: failure shortcut

pub fn ssa_opt_bsm_shortcut(st: St) -> St {
    let St { cfg, args, cnt } = st;
    let mut linear = cfg.into_linear();

    let (positions, tail_tests) = bsm_positions(&linear);
    if !tail_tests.is_empty() {
        for (_, blk) in linear.iter_mut() {
            bsm_shortcut_block(blk, &positions, &tail_tests);
        }
    }

    St {
        cfg: Cfg::Linear(linear),
        args,
        cnt,
    }
}

// Bit offset of every match context with a compile-time-known position,
// plus, for every block that is exactly a bs_test_tail, the total bit
// size the test demands and its fail label.
fn bsm_positions(linear: &[(Label, Block)]) -> (Map<Var, u64>, Map<Label, (u64, Label)>) {
    let mut pos: Map<Var, u64> = Map::new();
    let mut tails: Map<Label, (u64, Label)> = Map::new();
    for (l, blk) in linear {
        for i in &blk.insts {
            match i.op {
                Op::BsStartMatch => {
                    pos.insert(i.dst.clone(), 0);
                }
                Op::BsMatch => {
                    if let Some(bits) = bsm_match_pos(i, &pos) {
                        pos.insert(i.dst.clone(), bits);
                    }
                }
                _ => (),
            }
        }
        if let ([test], Terminal::Br { bool, fail, .. }) = (blk.insts.as_slice(), &blk.term) {
            let ok = test.op == Op::BsTestTail && *bool == Value::Var(test.dst.clone());
            if ok {
                if let (Some(Value::Var(ctx)), Some(bits)) =
                    (test.args.first(), test.args.get(1).and_then(|a| a.as_int()))
                {
                    if let Some(start) = pos.get(ctx) {
                        tails.insert(*l, (start + bits as u64, *fail));
                    }
                }
            }
        }
    }
    (pos, tails)
}

// position after a match: the context's position plus the matched size.
fn bsm_match_pos(i: &Instruction, pos: &Map<Var, u64>) -> Option<u64> {
    let (ty, ctx, rest) = bsm_match_parts(i)?;
    let start = *pos.get(ctx)?;
    let bits = match ty {
        "utf8" => 8,
        "utf16" => 16,
        "utf32" => 32,
        "string" => match rest.first()? {
            Value::Lit(Literal::Str(s)) => 8 * s.len() as u64,
            _ => return None,
        },
        _ => {
            // [.., Size, Unit] with a literal size.
            let unit = rest.last()?.as_int()?;
            let size = rest.get(rest.len().checked_sub(2)?)?.as_int()?;
            if size < 0 || unit < 0 {
                return None;
            }
            size as u64 * unit as u64
        }
    };
    Some(start + bits)
}

// accept both the plain and the skip argument layouts.
fn bsm_match_parts(i: &Instruction) -> Option<(&str, &Var, &[Value])> {
    let first = i.args.first()?.as_atom()?;
    if first == "skip" {
        let Value::Var(ctx) = i.args.get(1)? else {
            return None;
        };
        let ty = i.args.get(2)?.as_atom()?;
        Some((ty, ctx, &i.args[3..]))
    } else {
        let Value::Var(ctx) = i.args.get(1)? else {
            return None;
        };
        Some((first, ctx, &i.args[2..]))
    }
}

fn bsm_shortcut_block(
    blk: &mut Block,
    positions: &Map<Var, u64>,
    tail_tests: &Map<Label, (u64, Label)>,
) {
    let [m, s] = blk.insts.as_slice() else { return };
    let ok = m.op == Op::BsMatch
        && s.op == Op::Succeeded
        && s.args == [Value::Var(m.dst.clone())];
    if !ok {
        return;
    }
    let Some((_, old_ctx, _)) = bsm_match_parts(m) else {
        return;
    };
    let Some(bits) = positions.get(old_ctx) else {
        return;
    };
    let Terminal::Br { bool, fail, .. } = &mut blk.term else {
        return;
    };
    if *bool != Value::Var(s.dst.clone()) {
        return;
    }
    if let Some((tail_bits, next_fail)) = tail_tests.get(fail) {
        // The context has already consumed more bits than the tail test
        // allows in total, so the test must fail.
        if *bits > *tail_bits {
            *fail = *next_fail;
        }
    }
}
