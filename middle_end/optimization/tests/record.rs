use super::optimizes_to;

// is_tuple + tuple_size + tag comparison, all failing to the same
// label, fuse into one is_tagged_tuple test. The probed blocks stay
// behind for later passes to clean up.
#[test]
fn fuses_tagged_tuple_test() {
    optimizes_to(
        &["record"],
        r#"
    module t

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
    "#,
        r#"
    module t

    fn rec/1 (T) {
    0:
      B = $is_tagged_tuple T, 3, ok
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
    "#,
    );
}

// A different fail label in the middle of the idiom blocks the fusion.
#[test]
fn mismatched_fail_labels_do_not_fuse() {
    let input = r#"
    module t

    fn rec/1 (T) {
    0:
      B = $bif is_tuple T
      $br B, 3, 1
    1:
      $ret error
    3:
      Sz = $bif tuple_size T
      B2 = $bif =:= Sz, 3
      $br B2, 4, 6
    4:
      Tag = $get_tuple_element T, 0
      B3 = $bif =:= Tag, ok
      $br B3, 5, 1
    5:
      $ret ok
    6:
      $ret wrong_size
    }
    "#;
    optimizes_to(&["record"], input, input);
}

// The tag must be an atom literal.
#[test]
fn non_atom_tag_does_not_fuse() {
    let input = r#"
    module t

    fn rec/1 (T) {
    0:
      B = $bif is_tuple T
      $br B, 3, 1
    1:
      $ret error
    3:
      Sz = $bif tuple_size T
      B2 = $bif =:= Sz, 2
      $br B2, 4, 1
    4:
      Tag = $get_tuple_element T, 0
      B3 = $bif =:= Tag, 42
      $br B3, 5, 1
    5:
      $ret ok
    }
    "#;
    optimizes_to(&["record"], input, input);
}
