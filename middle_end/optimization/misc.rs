//! Phi collapse and literal folding.
//!
//! A phi whose arguments all carry the same value is that value; a
//! `put_tuple` or `put_list` of nothing but literals is a literal. Both
//! become entries in a substitution applied to everything downstream.

use super::{sub_inst, sub_term, St, Subst};
use crate::middle_end::ssa::*;

pub fn ssa_opt_misc(st: St) -> St {
    let St { cfg, args, cnt } = st;
    let linear = cfg.into_linear();

    let mut sub = Subst::new();
    let mut out = Vec::with_capacity(linear.len());
    for (l, blk) in linear {
        let mut insts = vec![];
        for i0 in blk.insts {
            let i = sub_inst(&i0, &sub);
            match i.op {
                Op::Phi => match all_same(&i.args) {
                    Some(val) => {
                        sub.insert(i.dst, val);
                    }
                    None => insts.push(i),
                },
                Op::PutTuple => match all_literals(&i.args) {
                    Some(lits) => {
                        sub.insert(i.dst, Value::Lit(Literal::Tuple(lits)));
                    }
                    None => insts.push(i),
                },
                Op::PutList => match all_literals(&i.args) {
                    Some(lits) if lits.len() == 2 => {
                        let mut it = lits.into_iter();
                        let hd = it.next().unwrap();
                        let tl = it.next().unwrap();
                        sub.insert(i.dst, Value::Lit(Literal::Cons(Box::new(hd), Box::new(tl))));
                    }
                    _ => insts.push(i),
                },
                _ => insts.push(i),
            }
        }
        let term = sub_term(&blk.term, &sub);
        out.push((l, Block { insts, term }));
    }

    St {
        cfg: Cfg::Linear(out),
        args,
        cnt,
    }
}

// the common value of a phi's arguments, if they all agree.
fn all_same(args: &[Value]) -> Option<Value> {
    let mut first: Option<&Value> = None;
    for a in args {
        let Value::PhiArg(v, _) = a else { return None };
        match first {
            None => first = Some(v),
            Some(f) if f == &**v => (),
            Some(_) => return None,
        }
    }
    first.cloned()
}

fn all_literals(args: &[Value]) -> Option<Vec<Literal>> {
    args.iter()
        .map(|a| match a {
            Value::Lit(l) => Some(l.clone()),
            _ => None,
        })
        .collect()
}
