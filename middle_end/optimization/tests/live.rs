use super::optimizes_to;

// Only the success flag of a get_map_element is used: the lookup
// becomes has_map_field computing the flag directly.
#[test]
fn downgrades_get_map_element() {
    optimizes_to(
        &["live"],
        r#"
    module t

    fn f/2 (M, K) {
    0:
      V = $get_map_element M, K
      B = $succeeded V
      $br B, 3, 1
    1:
      $ret error
    3:
      $ret ok
    }
    "#,
        r#"
    module t

    fn f/2 (M, K) {
    0:
      B = $has_map_field M, K
      $br B, 3, 1
    1:
      $ret error
    3:
      $ret ok
    }
    "#,
    );
}

#[test]
fn drops_dead_pure_instructions() {
    optimizes_to(
        &["live"],
        r#"
    module t

    fn f/1 (L) {
    0:
      X = $get_hd L
      Y = $get_tl L
      $ret X
    }
    "#,
        r#"
    module t

    fn f/1 (L) {
    0:
      X = $get_hd L
      $ret X
    }
    "#,
    );
}

// A phi argument is only live on its own edge: the get_hd feeding the
// phi from block 4 survives, while block 3 contributes a literal and
// its dead selector disappears.
#[test]
fn phi_liveness_is_per_edge() {
    optimizes_to(
        &["live"],
        r#"
    module t

    fn f/2 (C, X) {
    0:
      $br C, 3, 4
    3:
      H = $get_hd X
      $br 5
    4:
      T = $get_tl X
      $br 5
    5:
      P = $phi (ok, 3), (T, 4)
      $ret P
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
      T = $get_tl X
      $br 5
    5:
      P = $phi (ok, 3), (T, 4)
      $ret P
    }
    "#,
    );
}

// A call with an unused result is kept for its effect; only its unused
// success test goes away.
#[test]
fn keeps_impure_instructions() {
    optimizes_to(
        &["live"],
        r#"
    module t

    fn f/1 (X) {
    0:
      Y = $call foo, X
      B = $succeeded Y
      $br 3
    3:
      $ret ok
    }
    "#,
        r#"
    module t

    fn f/1 (X) {
    0:
      Y = $call foo, X
      $br 3
    3:
      $ret ok
    }
    "#,
    );
}
