//! `FromStr` for the textual IR form printed by `display_impl`.

use std::collections::BTreeMap as Map;
use std::rc::Rc;

use super::*;

use pest::error::Error;
use pest::iterators::Pair;
use pest::Parser;

#[derive(pest_derive::Parser)]
#[grammar_inline = r#"
WHITESPACE = _{ " " | "\t" | "\r" | "\n" }
COMMENT = _{ "//" ~ (!NEWLINE ~ ANY)* }

module = { SOI ~ "module" ~ atom_name ~ function* ~ EOI }

function = { "fn" ~ atom_name ~ "/" ~ number ~ "(" ~ var_list? ~ ")" ~ "{" ~ block* ~ "}" }
var_list = { variable ~ ("," ~ variable)* }

block = { number ~ ":" ~ inst* ~ term }

inst = { variable ~ "=" ~ operation ~ arg_list? ~ anno* }
arg_list = { arg ~ ("," ~ arg)* }
arg = { phi_pair | remote | value }
phi_pair = { "(" ~ value ~ "," ~ number ~ ")" }
remote = ${ simple ~ ":" ~ simple }
simple = { variable | atom_name }

operation = { bif_op | float_op | plain_op }
bif_op = { "$bif" ~ op_name }
float_op = { "$float" ~ op_name }
plain_op = @{ "$" ~ (ASCII_ALPHA_LOWER | "_")+ }
op_name = @{ (ASCII_ALPHA_LOWER ~ (ASCII_ALPHANUMERIC | "_")*) | ("=" | ":" | "/" | "<" | ">" | "+" | "-" | "*")+ }

anno = { "[" ~ atom_name ~ ":" ~ anno_val ~ "]" }
anno_val = { anno_list | atom_name }
anno_list = { "[" ~ (anno_val ~ ("," ~ anno_val)*)? ~ "]" }

term = { br | switch | ret }
br = { "$br" ~ (cond_br | number) }
cond_br = { value ~ "," ~ number ~ "," ~ number }
switch = { "$switch" ~ value ~ "," ~ number ~ "," ~ "[" ~ (case ~ ("," ~ case)*)? ~ "]" }
case = { "(" ~ literal ~ "," ~ number ~ ")" }
ret = { "$ret" ~ value }

value = { literal | variable }
variable = @{ ("@" ~ (ASCII_ALPHANUMERIC | "_")+) | (ASCII_ALPHA_UPPER ~ (ASCII_ALPHANUMERIC | "_")*) }
literal = { float_lit | int_lit | atom_name | string | nil | cons_lit | tuple_lit }
float_lit = @{ "-"? ~ ASCII_DIGIT+ ~ "." ~ ASCII_DIGIT+ }
int_lit = @{ "-"? ~ ASCII_DIGIT+ }
atom_name = @{ ASCII_ALPHA_LOWER ~ (ASCII_ALPHANUMERIC | "_")* }
string = @{ "\"" ~ (!"\"" ~ ANY)* ~ "\"" }
nil = { "[" ~ "]" }
cons_lit = { "[" ~ literal ~ "|" ~ literal ~ "]" }
tuple_lit = { "{" ~ (literal ~ ("," ~ literal)*)? ~ "}" }
number = @{ ASCII_DIGIT+ }
"#]
struct SsaParser;

use derive_more::Display;

#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum Errors {
    Parse(Box<Error<Rule>>),
    Malformed(String),
}

impl std::error::Error for Errors {}

impl std::str::FromStr for Module {
    type Err = Errors;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match SsaParser::parse(Rule::module, text) {
            Ok(mut tree) => parse_module(tree.next().unwrap()),
            Err(err) => Err(Errors::Parse(Box::new(err))),
        }
    }
}

fn malformed<T>(what: &str) -> Result<T, Errors> {
    Err(Errors::Malformed(what.to_string()))
}

fn parse_module(tree: Pair<Rule>) -> Result<Module, Errors> {
    let mut inner = tree.into_inner();
    let name: Rc<str> = inner.next().unwrap().as_str().into();

    let mut functions = vec![];
    for p in inner {
        if p.as_rule() == Rule::function {
            functions.push(parse_function(p)?);
        }
    }

    Ok(Module { name, functions })
}

fn parse_function(tree: Pair<Rule>) -> Result<Function, Errors> {
    let mut inner = tree.into_inner();
    let name: Rc<str> = inner.next().unwrap().as_str().into();
    let arity: u32 = parse_number(&inner.next().unwrap());

    let mut args = vec![];
    let mut blocks = Map::new();
    for p in inner {
        match p.as_rule() {
            Rule::var_list => {
                for v in p.into_inner() {
                    args.push(parse_variable(&v)?);
                }
            }
            Rule::block => {
                let (label, block) = parse_block(p)?;
                if blocks.insert(label, block).is_some() {
                    return malformed("duplicate block label");
                }
            }
            _ => unreachable!("not a function part: {:#?}", p),
        }
    }

    let mut f = Function {
        name,
        arity,
        args,
        cfg: Cfg::Map(blocks),
        cnt: 0,
    };
    f.cnt = infer_counter(&f);
    Ok(f)
}

// The counter has to be past every label and generated-variable suffix
// already in use.
fn infer_counter(f: &Function) -> u32 {
    let mut max = 0;
    fn see_var(max: &mut u32, v: &Var) {
        if let Var::Gen(_, n) = v {
            *max = std::cmp::max(*max, *n);
        }
    }
    for a in &f.args {
        see_var(&mut max, a);
    }
    for (l, blk) in f.cfg.iter() {
        max = std::cmp::max(max, l);
        for i in &blk.insts {
            see_var(&mut max, &i.dst);
            let mut vs = vec![];
            for a in &i.args {
                a.vars_into(&mut vs);
            }
            for v in &vs {
                see_var(&mut max, v);
            }
        }
    }
    max + 1
}

fn parse_block(tree: Pair<Rule>) -> Result<(Label, Block), Errors> {
    let mut inner = tree.into_inner();
    let label: Label = parse_number(&inner.next().unwrap());

    let mut insts = vec![];
    let mut term = None;
    for p in inner {
        match p.as_rule() {
            Rule::inst => insts.push(parse_inst(p)?),
            Rule::term => term = Some(parse_term(p)?),
            _ => unreachable!("not a block part: {:#?}", p),
        }
    }

    match term {
        Some(term) => Ok((label, Block { insts, term })),
        None => malformed("block without terminator"),
    }
}

fn parse_inst(tree: Pair<Rule>) -> Result<Instruction, Errors> {
    let mut inner = tree.into_inner();
    let dst = parse_variable(&inner.next().unwrap())?;
    let op = parse_op(inner.next().unwrap())?;

    let mut args = vec![];
    let mut anno = Map::new();
    for p in inner {
        match p.as_rule() {
            Rule::arg_list => {
                for a in p.into_inner() {
                    args.push(parse_arg(a)?);
                }
            }
            Rule::anno => {
                let mut parts = p.into_inner();
                let key: Rc<str> = parts.next().unwrap().as_str().into();
                let val = parse_anno_val(parts.next().unwrap())?;
                anno.insert(key, val);
            }
            _ => unreachable!("not an instruction part: {:#?}", p),
        }
    }

    Ok(Instruction {
        dst,
        op,
        args,
        anno,
    })
}

fn parse_op(tree: Pair<Rule>) -> Result<Op, Errors> {
    let p = tree.into_inner().next().unwrap();
    match p.as_rule() {
        Rule::bif_op => {
            let name = p.into_inner().next().unwrap().as_str();
            Ok(Op::Bif(name.into()))
        }
        Rule::float_op => {
            let name = p.into_inner().next().unwrap().as_str();
            Ok(Op::Float(match name {
                "clearerror" => FloatOp::Clearerror,
                "checkerror" => FloatOp::Checkerror,
                "put" => FloatOp::Put,
                "get" => FloatOp::Get,
                "convert" => FloatOp::Convert,
                other => FloatOp::Arith(other.into()),
            }))
        }
        Rule::plain_op => match p.as_str() {
            "$phi" => Ok(Op::Phi),
            "$call" => Ok(Op::Call),
            "$make_fun" => Ok(Op::MakeFun),
            "$succeeded" => Ok(Op::Succeeded),
            "$get_tuple_element" => Ok(Op::GetTupleElement),
            "$is_tagged_tuple" => Ok(Op::IsTaggedTuple),
            "$is_nonempty_list" => Ok(Op::IsNonemptyList),
            "$bs_start_match" => Ok(Op::BsStartMatch),
            "$bs_match" => Ok(Op::BsMatch),
            "$bs_extract" => Ok(Op::BsExtract),
            "$bs_test_tail" => Ok(Op::BsTestTail),
            "$bs_put" => Ok(Op::BsPut),
            "$put_tuple" => Ok(Op::PutTuple),
            "$put_list" => Ok(Op::PutList),
            "$get_hd" => Ok(Op::GetHd),
            "$get_tl" => Ok(Op::GetTl),
            "$extract" => Ok(Op::Extract),
            "$peek_message" => Ok(Op::PeekMessage),
            "$remove_message" => Ok(Op::RemoveMessage),
            "$recv_next" => Ok(Op::RecvNext),
            "$wait_timeout" => Ok(Op::WaitTimeout),
            "$timeout" => Ok(Op::Timeout),
            "$landingpad" => Ok(Op::Landingpad),
            "$catch_end" => Ok(Op::CatchEnd),
            "$set_tuple_element" => Ok(Op::SetTupleElement),
            "$get_map_element" => Ok(Op::GetMapElement),
            "$has_map_field" => Ok(Op::HasMapField),
            other => malformed(&format!("unknown operation {other}")),
        },
        _ => unreachable!("not an operation: {:#?}", p),
    }
}

fn parse_anno_val(tree: Pair<Rule>) -> Result<AnnoValue, Errors> {
    let p = tree.into_inner().next().unwrap();
    match p.as_rule() {
        Rule::atom_name => Ok(AnnoValue::Atom(p.as_str().into())),
        Rule::anno_list => Ok(AnnoValue::List(
            p.into_inner()
                .map(parse_anno_val)
                .collect::<Result<_, _>>()?,
        )),
        _ => unreachable!("not an annotation value: {:#?}", p),
    }
}

fn parse_arg(tree: Pair<Rule>) -> Result<Value, Errors> {
    let p = tree.into_inner().next().unwrap();
    match p.as_rule() {
        Rule::phi_pair => {
            let mut inner = p.into_inner();
            let val = parse_value(inner.next().unwrap())?;
            let pred: Label = parse_number(&inner.next().unwrap());
            Ok(Value::PhiArg(Box::new(val), pred))
        }
        Rule::remote => {
            let mut inner = p.into_inner();
            let m = parse_simple(inner.next().unwrap())?;
            let f = parse_simple(inner.next().unwrap())?;
            Ok(Value::Remote(Box::new(m), Box::new(f)))
        }
        Rule::value => parse_value(p),
        _ => unreachable!("not an argument: {:#?}", p),
    }
}

fn parse_simple(tree: Pair<Rule>) -> Result<Value, Errors> {
    let p = tree.into_inner().next().unwrap();
    match p.as_rule() {
        Rule::variable => Ok(Value::Var(parse_variable(&p)?)),
        Rule::atom_name => Ok(Value::Lit(Literal::Atom(p.as_str().into()))),
        _ => unreachable!("not a simple value: {:#?}", p),
    }
}

fn parse_value(tree: Pair<Rule>) -> Result<Value, Errors> {
    let p = tree.into_inner().next().unwrap();
    match p.as_rule() {
        Rule::literal => Ok(Value::Lit(parse_literal(p)?)),
        Rule::variable => Ok(Value::Var(parse_variable(&p)?)),
        _ => unreachable!("not a value: {:#?}", p),
    }
}

fn parse_literal(tree: Pair<Rule>) -> Result<Literal, Errors> {
    let p = tree.into_inner().next().unwrap();
    match p.as_rule() {
        Rule::float_lit => Ok(Literal::Float(F64(p.as_str().parse().unwrap()))),
        Rule::int_lit => Ok(Literal::Int(p.as_str().parse().unwrap())),
        Rule::atom_name => Ok(Literal::Atom(p.as_str().into())),
        Rule::string => {
            let s = p.as_str();
            Ok(Literal::Str(s[1..s.len() - 1].into()))
        }
        Rule::nil => Ok(Literal::Nil),
        Rule::cons_lit => {
            let mut inner = p.into_inner();
            let hd = parse_literal(inner.next().unwrap())?;
            let tl = parse_literal(inner.next().unwrap())?;
            Ok(Literal::Cons(Box::new(hd), Box::new(tl)))
        }
        Rule::tuple_lit => Ok(Literal::Tuple(
            p.into_inner()
                .map(parse_literal)
                .collect::<Result<_, _>>()?,
        )),
        _ => unreachable!("not a literal: {:#?}", p),
    }
}

fn parse_variable(tree: &Pair<Rule>) -> Result<Var, Errors> {
    let s = tree.as_str();
    if let Some(rest) = s.strip_prefix('@') {
        let split = rest
            .rfind(|c: char| !c.is_ascii_digit())
            .map(|i| i + 1)
            .unwrap_or(0);
        let (base, digits) = rest.split_at(split);
        if base.is_empty() || digits.is_empty() {
            return malformed(&format!("generated variable without counter: {s}"));
        }
        Ok(Var::Gen(format!("@{base}").into(), digits.parse().unwrap()))
    } else {
        Ok(Var::Named(s.into()))
    }
}

fn parse_term(tree: Pair<Rule>) -> Result<Terminal, Errors> {
    let p = tree.into_inner().next().unwrap();
    match p.as_rule() {
        Rule::br => {
            let q = p.into_inner().next().unwrap();
            match q.as_rule() {
                Rule::cond_br => {
                    let mut inner = q.into_inner();
                    let bool = parse_value(inner.next().unwrap())?;
                    let succ: Label = parse_number(&inner.next().unwrap());
                    let fail: Label = parse_number(&inner.next().unwrap());
                    Ok(Terminal::Br { bool, succ, fail })
                }
                Rule::number => Ok(Terminal::br(parse_number(&q))),
                _ => unreachable!("not a branch: {:#?}", q),
            }
        }
        Rule::switch => {
            let mut inner = p.into_inner();
            let arg = parse_value(inner.next().unwrap())?;
            let fail: Label = parse_number(&inner.next().unwrap());
            let mut cases = vec![];
            for c in inner {
                let mut parts = c.into_inner();
                let lit = parse_literal(parts.next().unwrap())?;
                let to: Label = parse_number(&parts.next().unwrap());
                cases.push((lit, to));
            }
            Ok(Terminal::Switch { arg, fail, cases })
        }
        Rule::ret => Ok(Terminal::Ret(parse_value(p.into_inner().next().unwrap())?)),
        _ => unreachable!("not a terminator: {:#?}", p),
    }
}

fn parse_number<T: std::str::FromStr>(tree: &Pair<Rule>) -> T
where
    T::Err: std::fmt::Debug,
{
    tree.as_str().parse().unwrap()
}
