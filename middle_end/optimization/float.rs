//! Rewrite boxed-float arithmetic into unboxed float operations.
//!
//! The type pass annotates float-capable operations with `float_op`.
//! Runs of such operations, chained through success edges, become a
//! region: `clearerror` on entry, operands loaded into float registers
//! with `put`/`convert`, the arithmetic performed on fresh registers,
//! and on exit a flush — `checkerror` branching to the region's fail
//! label, then one `get` per computed register to re-box the results
//! into their original destinations.
//!
//! Guards cannot tolerate this rewrite: a pending float exception must
//! not escape a guard that then fails for an unrelated reason. A block
//! is therefore only optimized when its fail edge targets a non-guard
//! block (the badarg block, or a landing pad).
//!
//! A `convert` can fail at runtime, so after the rewrite every convert
//! is isolated at the end of its own block with a `succeeded` test
//! branching to the region's fail label.

use std::collections::{BTreeMap as Map, BTreeSet as Set};

use super::St;
use crate::middle_end::ssa::*;

#[derive(Clone, Copy, Eq, PartialEq)]
enum Phase {
    Undefined,
    Cleared,
}

// The float-region state machine.
struct Fs {
    phase: Phase,
    /// Operand or destination -> float register holding it.
    regs: Map<Value, Var>,
    /// Fail label of the current region.
    fail: Label,
    /// Success target of the last region block; the region may only
    /// continue there.
    pending_succ: Label,
    /// Original label of the last region block, for phi repair.
    region_label: Label,
    /// Index in the output of the block holding the region terminator.
    region_end: usize,
    /// Accumulated phi predecessor-label renames.
    ren: Map<Label, Label>,
    non_guards: Set<Label>,
}

pub fn ssa_opt_float(st: St) -> St {
    let St { cfg, args, mut cnt } = st;
    let linear = cfg.into_linear();

    let mut fs = Fs {
        phase: Phase::Undefined,
        regs: Map::new(),
        fail: BADARG_BLOCK,
        pending_succ: 0,
        region_label: 0,
        region_end: 0,
        ren: Map::new(),
        non_guards: non_guards(&linear),
    };

    let mut out: Vec<(Label, Block)> = Vec::with_capacity(linear.len());
    for (l, mut blk) in linear {
        if fs.phase == Phase::Cleared && l == fs.pending_succ {
            // The region may continue into this block.
            if can_optimize_blk(&blk, &fs.non_guards) {
                let mut regs = fs.regs.clone();
                if let Some(is) =
                    float_opt_is(&blk.insts, &mut regs, Phase::Cleared, &mut cnt)
                {
                    fs.regs = regs;
                    emit_region_blk(l, blk, is, &mut out, &mut fs, &mut cnt);
                    continue;
                }
            }
            flush(&mut out, &mut fs, &mut cnt);
        } else if fs.phase == Phase::Cleared {
            flush(&mut out, &mut fs, &mut cnt);
        }

        rename_phis(&mut blk, &fs.ren);

        if can_optimize_blk(&blk, &fs.non_guards) {
            let mut regs = Map::new();
            if let Some(is) = float_opt_is(&blk.insts, &mut regs, Phase::Undefined, &mut cnt) {
                fs.phase = Phase::Cleared;
                fs.regs = regs;
                emit_region_blk(l, blk, is, &mut out, &mut fs, &mut cnt);
                continue;
            }
        }
        out.push((l, blk));
    }

    // Every region must have been flushed by now.
    assert!(
        fs.phase == Phase::Undefined,
        "float region left unflushed"
    );

    St {
        cfg: Cfg::Linear(out),
        args,
        cnt,
    }
}

// The non-guard blocks: the badarg block and every landing pad.
fn non_guards(linear: &[(Label, Block)]) -> Set<Label> {
    let mut ls = Set::from([BADARG_BLOCK]);
    for (l, blk) in linear {
        if matches!(blk.insts.first().map(|i| &i.op), Some(Op::Landingpad)) {
            ls.insert(*l);
        }
    }
    ls
}

fn can_optimize_blk(blk: &Block, non_guards: &Set<Label>) -> bool {
    match &blk.term {
        Terminal::Br {
            bool: Value::Var(_),
            fail,
            ..
        } => non_guards.contains(fail),
        _ => false,
    }
}

// Rewrite a block consisting entirely of float-annotated operations and
// a trailing `succeeded`. Returns `None` if the block has any other
// shape, in which case it is emitted untouched.
fn float_opt_is(
    insts: &[Instruction],
    regs: &mut Map<Value, Var>,
    phase: Phase,
    cnt: &mut u32,
) -> Option<Vec<Instruction>> {
    let mut acc: Vec<Instruction> = vec![];
    if phase == Phase::Undefined {
        acc.push(Instruction::new(
            new_var("@ssa_ignored", cnt),
            Op::Float(FloatOp::Clearerror),
            vec![],
        ));
    }

    let n = insts.len();
    for (k, i) in insts.iter().enumerate() {
        if i.op == Op::Succeeded && k == n - 1 {
            let fr = regs.get(i.args.first()?)?.clone();
            let mut test = i.clone();
            test.args = vec![Value::Var(fr)];
            acc.push(test);
            return Some(acc);
        }

        let types = i.float_op_types()?;
        let Op::Bif(name) = &i.op else { return None };
        if types.len() != i.args.len() {
            return None;
        }
        let mut fr_args = vec![];
        for (a, ty) in i.args.iter().zip(types.iter()) {
            fr_args.push(Value::Var(float_reg_arg(a, ty.as_ref(), regs, cnt, &mut acc)));
        }
        let fr_dst = new_var("@fr", cnt);
        let mut fop = Instruction::new(
            fr_dst.clone(),
            Op::Float(FloatOp::Arith(name.clone())),
            fr_args,
        );
        fop.anno = i.anno.clone();
        fop.anno.remove("float_op");
        regs.insert(Value::Var(i.dst.clone()), fr_dst);
        acc.push(fop);
    }
    // No trailing succeeded: leave the block alone.
    None
}

// Load one operand into a float register, reusing an existing register
// when the operand is already in one. A literal that converts at
// compile time is loaded with `put`; a literal that cannot convert
// keeps its runtime `convert`, faithfully reproducing the exception.
fn float_reg_arg(
    a: &Value,
    ty: &str,
    regs: &mut Map<Value, Var>,
    cnt: &mut u32,
    acc: &mut Vec<Instruction>,
) -> Var {
    if let Some(fr) = regs.get(a) {
        return fr.clone();
    }
    let (op, arg) = if ty == "float" {
        (FloatOp::Put, a.clone())
    } else {
        match a {
            Value::Lit(lit) => match convert_literal(lit) {
                Some(f) => (FloatOp::Put, Value::Lit(Literal::Float(F64(f)))),
                None => (FloatOp::Convert, a.clone()),
            },
            _ => (FloatOp::Convert, a.clone()),
        }
    };
    let fr = new_var("@fr_copy", cnt);
    acc.push(Instruction::new(fr.clone(), Op::Float(op), vec![arg]));
    regs.insert(a.clone(), fr.clone());
    fr
}

fn convert_literal(lit: &Literal) -> Option<f64> {
    match lit {
        Literal::Int(i) => Some(*i as f64),
        Literal::Float(f) => Some(f.0),
        _ => None,
    }
}

// Emit an optimized region block, isolating every convert at the end of
// its own block. The first piece keeps the original label; later pieces
// take fresh labels in order.
fn emit_region_blk(
    l: Label,
    blk: Block,
    is: Vec<Instruction>,
    out: &mut Vec<(Label, Block)>,
    fs: &mut Fs,
    cnt: &mut u32,
) {
    let Terminal::Br { succ, fail, .. } = &blk.term else {
        unreachable!("region block without a branch");
    };
    let fail = *fail;
    fs.fail = fail;
    fs.pending_succ = *succ;
    fs.region_label = l;

    let mut chunks: Vec<Vec<Instruction>> = vec![vec![]];
    for i in is {
        let conv = i.op == Op::Float(FloatOp::Convert);
        chunks.last_mut().unwrap().push(i);
        if conv {
            chunks.push(vec![]);
        }
    }
    let n = chunks.len();
    let mut labels = vec![l];
    for _ in 1..n {
        labels.push(new_label(cnt));
    }
    if n > 1 {
        record_rename(l, labels[n - 1], fs.pending_succ, out, &mut fs.ren);
    }

    for (k, mut chunk) in chunks.into_iter().enumerate() {
        if k == n - 1 {
            out.push((labels[k], Block { insts: chunk, term: blk.term.clone() }));
        } else {
            let conv_dst = chunk.last().unwrap().dst.clone();
            let bool = new_var("@ssa_bool", cnt);
            chunk.push(Instruction::new(
                bool.clone(),
                Op::Succeeded,
                vec![Value::Var(conv_dst)],
            ));
            out.push((
                labels[k],
                Block {
                    insts: chunk,
                    term: Terminal::Br {
                        bool: Value::Var(bool),
                        succ: labels[k + 1],
                        fail,
                    },
                },
            ));
        }
    }
    fs.region_end = out.len() - 1;
}

// Close the current region: splice a checkerror block and a re-boxing
// block into its pending success edge and record the phi rename.
fn flush(out: &mut Vec<(Label, Block)>, fs: &mut Fs, cnt: &mut u32) {
    let check_l = new_label(cnt);
    let get_l = new_label(cnt);

    let (_, region_blk) = &mut out[fs.region_end];
    let Terminal::Br { succ, .. } = &mut region_blk.term else {
        unreachable!("region terminator is not a branch");
    };
    let orig_succ = std::mem::replace(succ, check_l);

    let bool = new_var("@ssa_bool", cnt);
    let check_blk = Block {
        insts: vec![Instruction::new(
            bool.clone(),
            Op::Float(FloatOp::Checkerror),
            vec![],
        )],
        term: Terminal::Br {
            bool: Value::Var(bool),
            succ: get_l,
            fail: fs.fail,
        },
    };

    // Re-box the computed results; operand copies still exist boxed.
    let mut gets = vec![];
    for (src, fr) in &fs.regs {
        if let (Value::Var(dst), Var::Gen(base, _)) = (src, fr) {
            if &**base == "@fr" {
                gets.push(Instruction::new(
                    dst.clone(),
                    Op::Float(FloatOp::Get),
                    vec![Value::Var(fr.clone())],
                ));
            }
        }
    }
    let get_blk = Block {
        insts: gets,
        term: Terminal::br(orig_succ),
    };

    out.push((check_l, check_blk));
    out.push((get_l, get_blk));
    // A conversion split may already have renamed this block's label in
    // an emitted successor; chase it so a back-edge phi is repaired too.
    let from = fs
        .ren
        .get(&fs.region_label)
        .copied()
        .unwrap_or(fs.region_label);
    record_rename(from, get_l, orig_succ, out, &mut fs.ren);
    fs.ren.insert(fs.region_label, get_l);

    fs.phase = Phase::Undefined;
    fs.regs.clear();
}

// Note a phi predecessor-label rename. A successor later in the linear
// order is rewritten when it is reached; one already emitted (a back
// edge) is repaired on the spot.
fn record_rename(
    from: Label,
    to: Label,
    succ: Label,
    out: &mut Vec<(Label, Block)>,
    ren: &mut Map<Label, Label>,
) {
    if let Some((_, blk)) = out.iter_mut().find(|(l, _)| *l == succ) {
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
    ren.insert(from, to);
}

fn rename_phis(blk: &mut Block, ren: &Map<Label, Label>) {
    if ren.is_empty() {
        return;
    }
    for i in &mut blk.insts {
        if !i.is_phi() {
            break;
        }
        for a in &mut i.args {
            if let Value::PhiArg(_, p) = a {
                if let Some(to) = ren.get(p) {
                    *p = *to;
                }
            }
        }
    }
}

fn new_label(cnt: &mut u32) -> Label {
    let l = *cnt;
    *cnt += 1;
    l
}

fn new_var(base: &str, cnt: &mut u32) -> Var {
    let v = gen_var(base, *cnt);
    *cnt += 1;
    v
}
