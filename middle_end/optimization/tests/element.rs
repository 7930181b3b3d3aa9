use super::optimizes_to;

// A chain reading elements 1, 3, 2 of the same tuple with a shared fail
// label: the highest index moves to the front, and the two swapped
// blocks' `succeeded` tests follow their instructions.
#[test]
fn reorders_chain_to_read_highest_index_first() {
    optimizes_to(
        &["element"],
        r#"
    module t

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
      E3 = $bif element 2, T
      B3 = $succeeded E3
      $br B3, 5, 1
    5:
      X = $put_tuple E1, E2, E3
      $ret X
    }
    "#,
        r#"
    module t

    fn chain/1 (T) {
    0:
      E2 = $bif element 3, T
      B1 = $succeeded E2
      $br B1, 3, 1
    1:
      $ret error
    3:
      E1 = $bif element 1, T
      B2 = $succeeded E1
      $br B2, 4, 1
    4:
      E3 = $bif element 2, T
      B3 = $succeeded E3
      $br B3, 5, 1
    5:
      X = $put_tuple E1, E2, E3
      $ret X
    }
    "#,
    );
}

// The first block already reads the highest index: nothing to do.
#[test]
fn highest_index_first_is_left_alone() {
    let input = r#"
    module t

    fn chain/1 (T) {
    0:
      E1 = $bif element 3, T
      B1 = $succeeded E1
      $br B1, 3, 1
    1:
      $ret error
    3:
      E2 = $bif element 1, T
      B2 = $succeeded E2
      $br B2, 4, 1
    4:
      X = $put_tuple E1, E2
      $ret X
    }
    "#;
    optimizes_to(&["element"], input, input);
}

// Different tuples break the chain.
#[test]
fn mixed_tuples_are_not_a_chain() {
    let input = r#"
    module t

    fn chain/2 (T, U) {
    0:
      E1 = $bif element 1, T
      B1 = $succeeded E1
      $br B1, 3, 1
    1:
      $ret error
    3:
      E2 = $bif element 3, U
      B2 = $succeeded E2
      $br B2, 4, 1
    4:
      X = $put_tuple E1, E2
      $ret X
    }
    "#;
    optimizes_to(&["element"], input, input);
}
