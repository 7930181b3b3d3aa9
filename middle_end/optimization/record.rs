//! Fuse the record-test idiom into a single instruction.
//!
//! Pattern matching on a record compiles into `is_tuple(T)` followed by
//! `tuple_size(T) =:= Size` followed by `element(1, T) =:= Tag`, each in
//! its own block with a shared fail label. The whole idiom is one
//! `is_tagged_tuple(T, Size, Tag)` machine instruction; the two
//! now-redundant compare blocks become dead and are cleaned up by the
//! `live` and `merge_blocks` passes.

use std::collections::BTreeMap as Map;

use super::St;
use crate::middle_end::ssa::*;

pub fn ssa_opt_record(st: St) -> St {
    let St { cfg, args, cnt } = st;
    let mut linear = cfg.into_linear();

    let view: Map<Label, Block> = linear.iter().cloned().collect();
    for (_, blk) in linear.iter_mut() {
        record_opt_block(blk, &view);
    }

    St {
        cfg: Cfg::Linear(linear),
        args,
        cnt,
    }
}

fn record_opt_block(blk: &mut Block, blocks: &Map<Label, Block>) {
    let Some(last) = blk.insts.last() else { return };
    let ok = matches!(&last.op, Op::Bif(name) if &**name == "is_tuple");
    if !ok {
        return;
    }
    let Some(Value::Var(tuple)) = last.args.first() else {
        return;
    };
    let tuple = tuple.clone();
    let Terminal::Br { bool, succ, fail } = &blk.term else {
        return;
    };
    if *bool != Value::Var(last.dst.clone()) {
        return;
    }

    if let Some((size, tag)) = is_tagged_tuple(*succ, *fail, &tuple, blocks) {
        let test = blk.insts.last_mut().unwrap();
        test.op = Op::IsTaggedTuple;
        test.args = vec![
            Value::Var(tuple),
            Value::Lit(Literal::Int(size)),
            Value::Lit(tag),
        ];
    }
}

// Probe the success chain of an `is_tuple` test: a block comparing
// `tuple_size(T)` against a literal, then a block comparing the first
// element against a literal atom, all failing to the same label.
fn is_tagged_tuple(
    succ: Label,
    fail: Label,
    tuple: &Var,
    blocks: &Map<Label, Block>,
) -> Option<(i64, Literal)> {
    let blk = blocks.get(&succ)?;
    let [sz, eq] = blk.insts.as_slice() else {
        return None;
    };
    let ok = matches!(&sz.op, Op::Bif(name) if &**name == "tuple_size")
        && sz.args == [Value::Var(tuple.clone())]
        && matches!(&eq.op, Op::Bif(name) if &**name == "=:=")
        && eq.args.first() == Some(&Value::Var(sz.dst.clone()));
    if !ok {
        return None;
    }
    let size = eq.args.get(1)?.as_int()?;
    let Terminal::Br {
        bool,
        succ: succ2,
        fail: fail2,
    } = &blk.term
    else {
        return None;
    };
    if *bool != Value::Var(eq.dst.clone()) || *fail2 != fail {
        return None;
    }

    let blk2 = blocks.get(succ2)?;
    let [get, eq2] = blk2.insts.as_slice() else {
        return None;
    };
    let ok = get.op == Op::GetTupleElement
        && get.args == [Value::Var(tuple.clone()), Value::Lit(Literal::Int(0))]
        && matches!(&eq2.op, Op::Bif(name) if &**name == "=:=")
        && eq2.args.first() == Some(&Value::Var(get.dst.clone()));
    if !ok {
        return None;
    }
    let tag = match eq2.args.get(1)? {
        Value::Lit(lit @ Literal::Atom(_)) => lit.clone(),
        _ => return None,
    };
    match &blk2.term {
        Terminal::Br {
            bool,
            fail: fail3, ..
        } if *bool == Value::Var(eq2.dst.clone()) && *fail3 == fail => Some((size, tag)),
        _ => None,
    }
}
