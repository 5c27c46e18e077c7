//! Property-based tests (§8's invariants P1-P4, P6, and round trips R1-R2)
//! using `proptest` across randomly generated operation sequences, the same
//! "many backends, one contract" style used elsewhere in the corpus this
//! crate draws on.

use proptest::prelude::*;
use rowdex::cell::{Cell, CellType};
use rowdex::column::VecColumn;
use rowdex::engine::EngineKind;
use rowdex::index::Index;
use rowdex::key::key_of;
use rowdex::table::Table;
use std::cell::RefCell;
use std::rc::Rc;

/// A small mutation DSL. Every op only touches row 0 (or appends), so it is
/// trivially valid regardless of how many rows currently exist — no op
/// needs to be filtered or clamped against an out-of-range index.
#[derive(Debug, Clone)]
enum Op {
    Append(i64),
    RemoveFirst,
    SetFirst(i64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (-50i64..50).prop_map(Op::Append),
        Just(Op::RemoveFirst),
        (-50i64..50).prop_map(Op::SetFirst),
    ]
}

fn apply(t: &mut Table, op: &Op) {
    match op {
        Op::Append(v) => {
            t.append_row(vec![Cell::Int(*v)]).unwrap();
        }
        Op::RemoveFirst => {
            if t.row_count() > 0 {
                t.remove_row(0).unwrap();
            }
        }
        Op::SetFirst(v) => {
            if t.row_count() > 0 {
                t.set_cell(0, "a", Cell::Int(*v)).unwrap();
            }
        }
    }
}

fn table_with_index(kind: EngineKind) -> Table {
    let a = Rc::new(RefCell::new(VecColumn::new("a", CellType::Int, Vec::new())));
    let mut t = Table::new(vec![a]);
    t.add_index("by_a", &["a"], kind).unwrap();
    t
}

proptest! {
    #[test]
    fn p1_sort_is_always_a_permutation_of_live_rows(ops in prop::collection::vec(op_strategy(), 0..40)) {
        let mut t = table_with_index(EngineKind::Bst);
        for op in &ops {
            apply(&mut t, op);
        }
        let idx = t.index("by_a").unwrap();
        let mut sorted = idx.borrow().sorted_data();
        sorted.sort_unstable();
        let expected: Vec<usize> = (0..t.row_count()).collect();
        prop_assert_eq!(sorted, expected);
    }

    #[test]
    fn p2_find_of_key_at_row_contains_that_row(ops in prop::collection::vec(op_strategy(), 0..40)) {
        let mut t = table_with_index(EngineKind::SortedArray);
        for op in &ops {
            apply(&mut t, op);
        }
        let idx = t.index("by_a").unwrap();
        let col = t.column("a").unwrap();
        for r in 0..t.row_count() {
            let v = col.borrow().get(r).unwrap();
            prop_assert!(idx.borrow().find(&[v]).contains(&r));
        }
    }

    #[test]
    fn p3_items_are_in_non_decreasing_key_order(ops in prop::collection::vec(op_strategy(), 0..40)) {
        let mut t = table_with_index(EngineKind::Rbt);
        for op in &ops {
            apply(&mut t, op);
        }
        let idx = t.index("by_a").unwrap();
        let items = idx.borrow().items();
        for w in items.windows(2) {
            prop_assert!(w[0].0 <= w[1].0);
        }
    }

    #[test]
    fn p4_all_three_engines_agree_on_items(ops in prop::collection::vec(op_strategy(), 0..30)) {
        let mut bst = table_with_index(EngineKind::Bst);
        let mut rbt = table_with_index(EngineKind::Rbt);
        let mut arr = table_with_index(EngineKind::SortedArray);
        for op in &ops {
            apply(&mut bst, op);
            apply(&mut rbt, op);
            apply(&mut arr, op);
        }
        let items_bst = bst.index("by_a").unwrap().borrow().items();
        let items_rbt = rbt.index("by_a").unwrap().borrow().items();
        let items_arr = arr.index("by_a").unwrap().borrow().items();
        prop_assert_eq!(&items_bst, &items_rbt);
        prop_assert_eq!(&items_bst, &items_arr);
    }

    #[test]
    fn p6_deep_copy_is_independent_of_the_original(ops in prop::collection::vec(op_strategy(), 0..20), extra in -50i64..50) {
        let mut t = table_with_index(EngineKind::Bst);
        for op in &ops {
            apply(&mut t, op);
        }
        let before = t.index("by_a").unwrap().borrow().items();
        let mut copy = t.deep_copy().unwrap();

        // mutate only the copy
        copy.append_row(vec![Cell::Int(extra)]).unwrap();
        if copy.row_count() > 1 {
            copy.remove_row(0).unwrap();
        }

        let after = t.index("by_a").unwrap().borrow().items();
        prop_assert_eq!(before, after, "mutating the copy must not affect the original");
    }

    #[test]
    fn r2_replace_old_new_old_is_the_identity(v1 in -50i64..50, v2 in -50i64..50) {
        let a = Rc::new(RefCell::new(VecColumn::new("a", CellType::Int, vec![Cell::Int(v1)])));
        let mut idx = Index::new(vec![a], EngineKind::Bst).unwrap();
        let before = idx.items();
        idx.replace(0, 0, Cell::Int(v2)).unwrap();
        idx.replace(0, 0, Cell::Int(v1)).unwrap();
        let after = idx.items();
        prop_assert_eq!(before, after);
    }
}

#[test]
fn r1_insert_then_remove_at_same_position_restores_the_index() {
    let mut t = table_with_index(EngineKind::SortedArray);
    for v in [10, 20, 30, 40] {
        t.append_row(vec![Cell::Int(v)]).unwrap();
    }
    let before = t.index("by_a").unwrap().borrow().items();

    t.insert_row(2, vec![Cell::Int(999)]).unwrap();
    t.remove_row(2).unwrap();

    let after = t.index("by_a").unwrap().borrow().items();
    assert_eq!(before, after);
}

#[test]
fn p5_same_prefix_matches_padded_range_on_composite_key() {
    let a = Rc::new(RefCell::new(VecColumn::new("a", CellType::Int, vec![Cell::Int(1), Cell::Int(1), Cell::Int(2)])));
    let b = Rc::new(RefCell::new(VecColumn::new("b", CellType::Int, vec![Cell::Int(5), Cell::Int(9), Cell::Int(0)])));
    let idx = Index::new(vec![a, b], EngineKind::Bst).unwrap();

    let via_prefix = idx.same_prefix(&[Cell::Int(1)]);
    let via_range = idx.range(&[Cell::Int(1)], &[Cell::Int(1)], (true, true));
    let mut via_prefix_sorted = via_prefix.clone();
    let mut via_range_sorted = via_range.clone();
    via_prefix_sorted.sort_unstable();
    via_range_sorted.sort_unstable();
    assert_eq!(via_prefix_sorted, via_range_sorted);
    assert_eq!(via_prefix_sorted, vec![0, 1]);
}

#[test]
fn boundary_empty_column_has_no_entries() {
    let a = Rc::new(RefCell::new(VecColumn::new("a", CellType::Int, Vec::new())));
    let idx = Index::new(vec![a], EngineKind::Bst).unwrap();
    assert!(idx.items().is_empty());
    assert!(idx.sorted_data().is_empty());
    assert!(idx.find(&[Cell::Int(1)]).is_empty());
}

#[test]
fn boundary_single_row_table() {
    let a = Rc::new(RefCell::new(VecColumn::new("a", CellType::Int, vec![Cell::Int(7)])));
    let idx = Index::new(vec![a], EngineKind::SortedArray).unwrap();
    assert_eq!(idx.sorted_data(), vec![0]);
    assert_eq!(idx.find(&[Cell::Int(7)]), vec![0]);
}

#[test]
fn boundary_duplicate_keys_accumulate_all_rows() {
    let a = Rc::new(RefCell::new(VecColumn::new("a", CellType::Int, vec![Cell::Int(1), Cell::Int(1), Cell::Int(1)])));
    let idx = Index::new(vec![a], EngineKind::Rbt).unwrap();
    assert_eq!(idx.find(&[Cell::Int(1)]), vec![0, 1, 2]);
    assert_eq!(idx.items(), vec![(key_of([Cell::Int(1)]), vec![0, 1, 2])]);
}

#[test]
fn boundary_removing_all_rows_leaves_index_empty() {
    let mut t = table_with_index(EngineKind::Bst);
    for v in [1, 2, 3] {
        t.append_row(vec![Cell::Int(v)]).unwrap();
    }
    while t.row_count() > 0 {
        t.remove_row(0).unwrap();
    }
    let idx = t.index("by_a").unwrap();
    assert!(idx.borrow().items().is_empty());
}
