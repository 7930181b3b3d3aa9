//! The textual form of the IR.
//!
//! `Display` here and `FromStr` in `fromstr_impl` agree on one format:
//!
//! ```text
//! module m
//!
//! fn foo/1 (X0) {
//! 0:
//!   Res = $bif element 2, X0
//!   Bool = $succeeded Res
//!   $br Bool, 3, 1
//! 1:
//!   $ret error
//! 3:
//!   $ret Res
//! }
//! ```

use std::fmt;
use std::fmt::Display;

use super::*;

impl Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Var::Named(n) => write!(f, "{n}"),
            Var::Gen(base, n) => write!(f, "{base}{n}"),
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Atom(a) => write!(f, "{a}"),
            Literal::Int(i) => write!(f, "{i}"),
            Literal::Float(x) => write!(f, "{:?}", x.0),
            Literal::Nil => write!(f, "[]"),
            Literal::Str(s) => write!(f, "\"{s}\""),
            Literal::Tuple(els) => {
                write!(f, "{{")?;
                for (i, el) in els.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{el}")?;
                }
                write!(f, "}}")
            }
            Literal::Cons(hd, tl) => write!(f, "[{hd} | {tl}]"),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Var(v) => write!(f, "{v}"),
            Value::Lit(l) => write!(f, "{l}"),
            Value::Remote(m, n) => write!(f, "{m}:{n}"),
            Value::PhiArg(v, p) => write!(f, "({v}, {p})"),
        }
    }
}

impl Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Op::Phi => "phi",
            Op::Bif(name) => return write!(f, "$bif {name}"),
            Op::Call => "call",
            Op::MakeFun => "make_fun",
            Op::Succeeded => "succeeded",
            Op::GetTupleElement => "get_tuple_element",
            Op::IsTaggedTuple => "is_tagged_tuple",
            Op::IsNonemptyList => "is_nonempty_list",
            Op::BsStartMatch => "bs_start_match",
            Op::BsMatch => "bs_match",
            Op::BsExtract => "bs_extract",
            Op::BsTestTail => "bs_test_tail",
            Op::BsPut => "bs_put",
            Op::Float(fop) => {
                let sub = match fop {
                    FloatOp::Clearerror => "clearerror",
                    FloatOp::Checkerror => "checkerror",
                    FloatOp::Put => "put",
                    FloatOp::Get => "get",
                    FloatOp::Convert => "convert",
                    FloatOp::Arith(name) => return write!(f, "$float {name}"),
                };
                return write!(f, "$float {sub}");
            }
            Op::PutTuple => "put_tuple",
            Op::PutList => "put_list",
            Op::GetHd => "get_hd",
            Op::GetTl => "get_tl",
            Op::Extract => "extract",
            Op::PeekMessage => "peek_message",
            Op::RemoveMessage => "remove_message",
            Op::RecvNext => "recv_next",
            Op::WaitTimeout => "wait_timeout",
            Op::Timeout => "timeout",
            Op::Landingpad => "landingpad",
            Op::CatchEnd => "catch_end",
            Op::SetTupleElement => "set_tuple_element",
            Op::GetMapElement => "get_map_element",
            Op::HasMapField => "has_map_field",
        };
        write!(f, "${name}")
    }
}

impl Display for AnnoValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnoValue::Atom(a) => write!(f, "{a}"),
            AnnoValue::List(vs) => {
                write!(f, "[")?;
                for (i, v) in vs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.dst, self.op)?;
        for (i, a) in self.args.iter().enumerate() {
            if i == 0 {
                write!(f, " {a}")?;
            } else {
                write!(f, ", {a}")?;
            }
        }
        for (key, val) in &self.anno {
            write!(f, " [{key}: {val}]")?;
        }
        Ok(())
    }
}

impl Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminal::Br { bool, succ, fail } => {
                if succ == fail && *bool == Value::lit_true() {
                    write!(f, "$br {succ}")
                } else {
                    write!(f, "$br {bool}, {succ}, {fail}")
                }
            }
            Terminal::Switch { arg, fail, cases } => {
                write!(f, "$switch {arg}, {fail}, [")?;
                for (i, (lit, to)) in cases.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "({lit}, {to})")?;
                }
                write!(f, "]")
            }
            Terminal::Ret(arg) => write!(f, "$ret {arg}"),
        }
    }
}

impl Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in &self.insts {
            writeln!(f, "  {i}")?;
        }
        writeln!(f, "  {}", self.term)
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn {}/{} (", self.name, self.arity)?;
        for (i, a) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{a}")?;
        }
        writeln!(f, ") {{")?;
        for (l, blk) in self.cfg.iter() {
            writeln!(f, "{l}:")?;
            write!(f, "{blk}")?;
        }
        writeln!(f, "}}")
    }
}

impl Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "module {}", self.name)?;
        for func in &self.functions {
            writeln!(f)?;
            write!(f, "{func}")?;
        }
        Ok(())
    }
}
