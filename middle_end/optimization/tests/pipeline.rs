use pretty_assertions::assert_eq;

use super::super::{optimize_module, Options};
use super::ALL_PASSES;
use crate::commons::Valid;
use crate::middle_end::ssa::Module;

// A module touching most of the passes: a record test, an element
// chain, a float region, a binary match, and a join with redundant
// selectors.
const MIXED: &str = r#"
module mixed

fn rec/1 (T) {
0:
  B = $bif is_tuple T
  $br B, 3, 1
1:
  $ret error
3:
  Sz = $bif tuple_size T
  B2 = $bif =:= Sz, 3
  $br B2, 4, 1
4:
  Tag = $get_tuple_element T, 0
  B3 = $bif =:= Tag, ok
  $br B3, 5, 1
5:
  $ret ok
}

fn chain/1 (T) {
0:
  E1 = $bif element 1, T
  B1 = $succeeded E1
  $br B1, 3, 1
1:
  $ret error
3:
  E2 = $bif element 3, T
  B2 = $succeeded E2
  $br B2, 4, 1
4:
  X = $put_tuple E1, E2
  $ret X
}

fn fl/3 (X, Y, Z) {
0:
  A = $bif + X, Y [float_op: [any, any]]
  B1 = $succeeded A
  $br B1, 3, 1
1:
  $ret error
3:
  B = $bif * A, Z [float_op: [any, any]]
  B2 = $succeeded B
  $br B2, 4, 1
4:
  $ret B
}

fn bin/1 (Bin) {
0:
  Ctx = $bs_start_match Bin
  B0 = $succeeded Ctx
  $br B0, 3, 1
1:
  $ret error
3:
  Ctx2 = $bs_match integer, Ctx, [], 8, 1
  B1 = $succeeded Ctx2
  $br B1, 4, 1
4:
  Ctx3 = $bs_match integer, Ctx2, [], 8, 1
  B2 = $succeeded Ctx3
  $br B2, 5, 1
5:
  V = $bs_extract Ctx3
  $ret V
}

fn join/2 (C, L) {
0:
  X = $get_hd L
  Y = $get_hd L
  P = $put_list X, Y
  $br C, 3, 4
3:
  $br 5
4:
  $br 5
5:
  Q = $phi (P, 3), (P, 4)
  $ret Q
}
"#;

fn optimize(input: &str, opts: &Options) -> Module {
    let Valid(out) = optimize_module(input.parse().unwrap(), opts).unwrap();
    out
}

#[test]
fn full_pipeline_produces_expected_shapes() {
    let out = optimize(MIXED, &Options::new()).to_string();
    // record: the three-step test collapsed into one instruction.
    assert!(out.contains("$is_tagged_tuple T, 3, ok"));
    // element: the highest index is read first.
    assert!(out.contains("$bif element 3, T"));
    // float: the region is built and flushed.
    assert!(out.contains("$float clearerror"));
    assert!(out.contains("$float checkerror"));
    assert!(out.contains("$float +"));
    assert!(out.contains("$float *"));
    // bsm: the unextracted middle match skips.
    assert!(out.contains("$bs_match skip, Ctx, integer"));
    // cse + misc: one selector, no phi.
    assert!(out.contains("$put_list X, X"));
    assert!(!out.contains("$phi"));
}

#[test]
fn simple_join_function_optimizes_exactly() {
    let input = r#"
    module t

    fn join/2 (C, L) {
    0:
      X = $get_hd L
      Y = $get_hd L
      P = $put_list X, Y
      $br C, 3, 4
    3:
      $br 5
    4:
      $br 5
    5:
      Q = $phi (P, 3), (P, 4)
      $ret Q
    }
    "#;
    let expected = r#"
    module t

    fn join/2 (C, L) {
    0:
      X = $get_hd L
      P = $put_list X, X
      $br C, 3, 4
    3:
      $br 5
    4:
      $br 5
    5:
      $ret P
    }
    "#;
    let actual = optimize(input, &Options::new()).to_string();
    assert_eq!(actual, expected.parse::<Module>().unwrap().to_string());
}

// Running the pipeline on its own output changes nothing further.
#[test]
fn pipeline_is_idempotent() {
    let once = optimize(MIXED, &Options::new()).to_string();
    let twice = optimize(&once, &Options::new()).to_string();
    assert_eq!(once, twice);
}

// Disabling any single pass still yields a valid module.
#[test]
fn disabling_any_pass_is_safe() {
    for p in ALL_PASSES {
        let mut opts = Options::new();
        opts.set(&format!("no_{p}"), true);
        optimize(MIXED, &opts);
    }
    // `no_P` wins over an explicit `P`.
    let mut opts = Options::new();
    opts.set("cse", true);
    opts.set("no_cse", true);
    optimize(MIXED, &opts);
}

#[test]
fn unknown_options_are_ignored() {
    let mut opts = Options::new();
    opts.set("frobnicate", true);
    opts.set("no_such_pass", false);
    optimize(MIXED, &opts);
}

// The type hook slots in between cse and float; here it annotates
// nothing and must leave the module intact.
#[test]
fn identity_type_hook_is_harmless() {
    let mut opts = Options::new();
    opts.type_opt = Some(std::rc::Rc::new(|linear, _args| linear));
    let with_hook = optimize(MIXED, &opts).to_string();
    let without = optimize(MIXED, &Options::new()).to_string();
    assert_eq!(with_hook, without);
}
