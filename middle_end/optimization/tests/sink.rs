use super::optimizes_to;

// The tuple read is only needed on one arm two branches down: it moves
// to the deepest block dominating its use.
#[test]
fn sinks_to_deepest_common_dominator() {
    optimizes_to(
        &["sink"],
        r#"
    module t

    fn f/3 (C, C2, T) {
    0:
      X = $get_tuple_element T, 0
      $br C, 3, 4
    3:
      $br C2, 5, 6
    4:
      $ret none
    5:
      $ret X
    6:
      $ret other
    }
    "#,
        r#"
    module t

    fn f/3 (C, C2, T) {
    0:
      $br C, 3, 4
    3:
      $br C2, 5, 6
    4:
      $ret none
    5:
      X = $get_tuple_element T, 0
      $ret X
    6:
      $ret other
    }
    "#,
    );
}

// The use block starts with a landingpad, so the definition stops at
// the deepest suitable dominator above it.
#[test]
fn avoids_unsuitable_blocks() {
    optimizes_to(
        &["sink"],
        r#"
    module t

    fn f/3 (C, C2, T) {
    0:
      X = $get_tuple_element T, 0
      $br C, 3, 4
    3:
      $br C2, 5, 6
    4:
      $ret none
    5:
      P = $landingpad
      $ret X
    6:
      $ret other
    }
    "#,
        r#"
    module t

    fn f/3 (C, C2, T) {
    0:
      $br C, 3, 4
    3:
      X = $get_tuple_element T, 0
      $br C2, 5, 6
    4:
      $ret none
    5:
      P = $landingpad
      $ret X
    6:
      $ret other
    }
    "#,
    );
}

// Inserting above a phi that consumes the variable is impossible; the
// definition stays where it was.
#[test]
fn phi_use_blocks_the_move() {
    let input = r#"
    module t

    fn f/2 (C, T) {
    0:
      X = $get_tuple_element T, 0
      $br C, 3, 4
    3:
      $br 5
    4:
      $br 5
    5:
      P = $phi (X, 3), (none, 4)
      $ret P
    }
    "#;
    optimizes_to(&["sink"], input, input);
}

// Nothing sinks into the body of a receive loop: a use between
// peek_message and remove_message pins the definition outside.
#[test]
fn receive_loop_body_is_off_limits() {
    let input = r#"
    module t

    fn f/1 (T) {
    0:
      X = $get_tuple_element T, 0
      $br 3
    3:
      M = $peek_message
      B = $bif =:= M, wanted
      $br B, 4, 6
    4:
      Y = $put_list X, M
      $br 5
    5:
      R = $remove_message
      $br 7
    6:
      N = $recv_next
      $br 3
    7:
      Z = $put_list X, X
      $ret Z
    }
    "#;
    optimizes_to(&["sink"], input, input);
}
