use super::optimizes_to;

// A phi whose arguments all agree collapses into its value; all-literal
// constructors fold into literal terms. Both substitutions flow through
// the rest of the function.
#[test]
fn collapses_phis_and_folds_literals() {
    optimizes_to(
        &["misc"],
        r#"
    module t

    fn f/2 (C, X) {
    0:
      $br C, 3, 4
    3:
      $br 5
    4:
      $br 5
    5:
      P = $phi (X, 3), (X, 4)
      T = $put_tuple a, 1
      L = $put_list 1, []
      U = $put_tuple P, T, L
      $ret U
    }
    "#,
        r#"
    module t

    fn f/2 (C, X) {
    0:
      $br C, 3, 4
    3:
      $br 5
    4:
      $br 5
    5:
      U = $put_tuple X, {a, 1}, [1 | []]
      $ret U
    }
    "#,
    );
}

// Disagreeing phis and constructors with variable arguments stay.
#[test]
fn keeps_real_joins_and_dynamic_constructors() {
    let input = r#"
    module t

    fn f/2 (C, X) {
    0:
      $br C, 3, 4
    3:
      $br 5
    4:
      $br 5
    5:
      P = $phi (X, 3), (none, 4)
      U = $put_tuple P, X
      $ret U
    }
    "#;
    optimizes_to(&["misc"], input, input);
}
