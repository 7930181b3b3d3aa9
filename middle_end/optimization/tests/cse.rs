use super::optimizes_to;

#[test]
fn eliminates_repeated_selector() {
    optimizes_to(
        &["cse"],
        r#"
    module t

    fn f/1 (L) {
    0:
      X = $get_hd L
      Z = $get_hd L
      W = $put_list X, Z
      $ret W
    }
    "#,
        r#"
    module t

    fn f/1 (L) {
    0:
      X = $get_hd L
      W = $put_list X, X
      $ret W
    }
    "#,
    );
}

// A call clobbers the x registers; keeping the expression map across it
// would cost a stack frame slot, so the second get_hd stays.
#[test]
fn call_is_a_cse_boundary() {
    let input = r#"
    module t

    fn f/1 (L) {
    0:
      X = $get_hd L
      Y = $call foo
      Z = $get_hd L
      W = $put_tuple X, Y, Z
      $ret W
    }
    "#;
    optimizes_to(&["cse"], input, input);
}

// When a fallible instruction is eliminated, its `succeeded` becomes
// the literal true. The expression is valid on the success edge only,
// which here is the only path to the reuse.
#[test]
fn eliminates_succeeded_of_eliminated_instruction() {
    optimizes_to(
        &["cse"],
        r#"
    module t

    fn f/1 (T) {
    0:
      A = $bif element 2, T
      B1 = $succeeded A
      $br B1, 3, 1
    1:
      $ret error
    3:
      C = $bif element 2, T
      B2 = $succeeded C
      $br B2, 4, 1
    4:
      W = $put_list A, C
      $ret W
    }
    "#,
        r#"
    module t

    fn f/1 (T) {
    0:
      A = $bif element 2, T
      B1 = $succeeded A
      $br B1, 3, 1
    1:
      $ret error
    3:
      $br true, 4, 1
    4:
      W = $put_list A, A
      $ret W
    }
    "#,
    );
}

// Comparisons are kept apart so the backend can fuse them into test
// instructions.
#[test]
fn comparisons_are_not_eliminated() {
    let input = r#"
    module t

    fn f/2 (X, Y) {
    0:
      B1 = $bif =:= X, Y
      B2 = $bif =:= X, Y
      W = $put_list B1, B2
      $ret W
    }
    "#;
    optimizes_to(&["cse"], input, input);
}

// An expression available on only one path into a join is not available
// at the join.
#[test]
fn join_requires_agreement_on_both_paths() {
    let input = r#"
    module t

    fn f/2 (C, L) {
    0:
      $br C, 3, 4
    3:
      X = $get_hd L
      $br 5
    4:
      $br 5
    5:
      Z = $get_hd L
      $ret Z
    }
    "#;
    optimizes_to(&["cse"], input, input);
}
