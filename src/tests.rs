extern crate std;

use std::{cell::Cell, ops::Range, prelude::v1::*, rc::Rc};

use proptest::prelude::*;

use crate::model;

use super::*;

fn insert_find_all(keys: &[u32]) {
    let mut tree: AvlTree<u32, u32> = AvlTree::new();

    for &key in keys {
        let (cursor, inserted) = tree.insert(key, key * 10);
        assert!(inserted);
        assert_eq!(cursor.key(), Ok(&key));
        tree.assert_invariants();
    }

    for key in keys {
        let node = tree.get_raw(key).expect("item not found");
        assert_eq!(unsafe { &node.as_ref().key }, key);
        assert_eq!(tree.get(key), Some(&(key * 10)));
    }

    assert_eq!(tree.len(), keys.len());
}

#[test]
fn zero_elems_find() {
    insert_find_all(&[]);
}

#[test]
fn single_elem_find() {
    insert_find_all(&[0]);
}

#[test]
fn two_elems_find() {
    insert_find_all(&[0, 1]);
    insert_find_all(&[1, 0]);
}

#[test]
fn three_elems_find() {
    insert_find_all(&[0, 1, 2]);
    insert_find_all(&[0, 2, 1]);
    insert_find_all(&[1, 0, 2]);
    insert_find_all(&[1, 2, 0]);
    insert_find_all(&[2, 0, 1]);
    insert_find_all(&[2, 1, 0]);
}

#[test]
fn four_elems_find() {
    insert_find_all(&[0, 1, 2, 3]);
    insert_find_all(&[0, 1, 3, 2]);
    insert_find_all(&[0, 2, 1, 3]);
    insert_find_all(&[0, 2, 3, 1]);
    insert_find_all(&[0, 3, 1, 2]);
    insert_find_all(&[0, 3, 2, 1]);

    insert_find_all(&[1, 0, 2, 3]);
    insert_find_all(&[1, 0, 3, 2]);
    insert_find_all(&[1, 2, 0, 3]);
    insert_find_all(&[1, 2, 3, 0]);
    insert_find_all(&[1, 3, 0, 2]);
    insert_find_all(&[1, 3, 2, 0]);

    insert_find_all(&[2, 0, 1, 3]);
    insert_find_all(&[2, 0, 3, 1]);
    insert_find_all(&[2, 1, 0, 3]);
    insert_find_all(&[2, 1, 3, 0]);
    insert_find_all(&[2, 3, 0, 1]);
    insert_find_all(&[2, 3, 1, 0]);

    insert_find_all(&[3, 0, 1, 2]);
    insert_find_all(&[3, 0, 2, 1]);
    insert_find_all(&[3, 1, 0, 2]);
    insert_find_all(&[3, 1, 2, 0]);
    insert_find_all(&[3, 2, 0, 1]);
    insert_find_all(&[3, 2, 1, 0]);
}

fn insert_remove_all(keys: &[u32]) {
    let mut tree: AvlTree<u32, u32> = AvlTree::new();

    for &key in keys {
        tree.insert(key, key);
        tree.assert_invariants();
    }

    for key in keys {
        assert_eq!(tree.remove(key), Some(*key));
        assert!(!tree.contains_key(key));
        tree.assert_invariants();
    }

    assert!(tree.is_empty());

    for &key in keys {
        tree.insert(key, key);
        tree.assert_invariants();
    }

    for key in keys.iter().rev() {
        let node = tree.get_raw(key).expect("item not found");
        assert_eq!(unsafe { tree.remove_node(node) }, (*key, *key));
        tree.assert_invariants();
    }

    assert!(tree.is_empty());
}

#[test]
fn remove_one() {
    insert_remove_all(&[0]);
}

#[test]
fn remove_two() {
    insert_remove_all(&[0, 1]);
    insert_remove_all(&[1, 0]);
}

#[test]
fn remove_three() {
    insert_remove_all(&[0, 1, 2]);
    insert_remove_all(&[0, 2, 1]);
    insert_remove_all(&[1, 0, 2]);
    insert_remove_all(&[1, 2, 0]);
    insert_remove_all(&[2, 0, 1]);
    insert_remove_all(&[2, 1, 0]);
}

#[test]
fn remove_four() {
    insert_remove_all(&[0, 1, 2, 3]);
    insert_remove_all(&[0, 1, 3, 2]);
    insert_remove_all(&[0, 2, 1, 3]);
    insert_remove_all(&[0, 2, 3, 1]);
    insert_remove_all(&[0, 3, 1, 2]);
    insert_remove_all(&[0, 3, 2, 1]);

    insert_remove_all(&[1, 0, 2, 3]);
    insert_remove_all(&[1, 0, 3, 2]);
    insert_remove_all(&[1, 2, 0, 3]);
    insert_remove_all(&[1, 2, 3, 0]);
    insert_remove_all(&[1, 3, 0, 2]);
    insert_remove_all(&[1, 3, 2, 0]);

    insert_remove_all(&[2, 0, 1, 3]);
    insert_remove_all(&[2, 0, 3, 1]);
    insert_remove_all(&[2, 1, 0, 3]);
    insert_remove_all(&[2, 1, 3, 0]);
    insert_remove_all(&[2, 3, 0, 1]);
    insert_remove_all(&[2, 3, 1, 0]);

    insert_remove_all(&[3, 0, 1, 2]);
    insert_remove_all(&[3, 0, 2, 1]);
    insert_remove_all(&[3, 1, 0, 2]);
    insert_remove_all(&[3, 1, 2, 0]);
    insert_remove_all(&[3, 2, 0, 1]);
    insert_remove_all(&[3, 2, 1, 0]);
}

fn root_key<K: Copy, V>(tree: &AvlTree<K, V>) -> Option<K> {
    tree.root.map(|root| unsafe { root.as_ref().key })
}

fn child_keys<K: Copy, V>(tree: &AvlTree<K, V>) -> (Option<K>, Option<K>) {
    let root = tree.root.expect("tree is empty");
    unsafe {
        let links = tree.links(root);
        (
            links.left().map(|n| n.as_ref().key),
            links.right().map(|n| n.as_ref().key),
        )
    }
}

#[test]
fn ascending_inserts_rotate_left_at_root() {
    let mut tree = AvlTree::new();
    tree.insert(10, "a");
    tree.insert(20, "b");
    tree.insert(30, "c");

    tree.assert_invariants();
    assert_eq!(root_key(&tree), Some(20));
    assert_eq!(child_keys(&tree), (Some(10), Some(30)));
    assert_eq!(tree.height(), 1);
}

#[test]
fn zig_zag_insert_locates_new_key() {
    let mut tree = AvlTree::new();
    tree.insert(30, ());
    tree.insert(10, ());

    // The double rotation moves key 20 out of the node it was created in.
    let (cursor, inserted) = tree.insert(20, ());
    assert!(inserted);
    assert_eq!(cursor.key(), Ok(&20));
    assert_eq!(cursor.peek_prev().map(|(k, _)| *k), Some(10));
    assert_eq!(cursor.peek_next().map(|(k, _)| *k), Some(30));

    tree.assert_invariants();
    assert_eq!(root_key(&tree), Some(20));
}

#[test]
fn removing_root_promotes_successor() {
    let mut tree: AvlTree<u32, &str> = [(10, "a"), (20, "b"), (30, "c")].into_iter().collect();
    let root = tree.root;

    let mut cursor = tree.find_mut(&20);
    assert_eq!(cursor.remove_current(), Some((20, "b")));
    assert_eq!(cursor.key(), Ok(&30));

    tree.assert_invariants();
    assert_eq!(tree.keys().copied().collect::<Vec<_>>(), [10, 30]);

    // The root node keeps its identity and now holds the successor.
    assert_eq!(tree.root, root);
    assert_eq!(root_key(&tree), Some(30));
}

#[test]
fn duplicate_insert_is_rejected() {
    let mut tree = AvlTree::new();
    assert!(tree.insert(1, "first").1);

    let (cursor, inserted) = tree.insert(1, "second");
    assert!(!inserted);
    assert_eq!(cursor.value(), Ok(&"first"));

    assert_eq!(tree.len(), 1);
    assert_eq!(tree.get(&1), Some(&"first"));
}

#[test]
fn insert_find_remove_round_trip() {
    let mut tree = AvlTree::new();
    for key in 0..32 {
        tree.insert(key, key * 2);
    }

    tree.insert(100, 7);
    assert_eq!(tree.find(&100).value(), Ok(&7));

    assert_eq!(tree.remove(&100), Some(7));
    assert!(tree.find(&100).is_end());
    assert_eq!(tree.find(&100), tree.cursor_end());
    assert_eq!(tree.remove(&100), None);
}

#[test]
fn end_cursor_is_out_of_range() {
    let mut tree: AvlTree<u32, u32> = AvlTree::new();
    assert_eq!(tree.cursor_end().value(), Err(Error::OutOfRange));
    assert_eq!(tree.cursor_first().key(), Err(Error::OutOfRange));

    tree.insert(1, 1);
    assert_eq!(tree.find(&2).value(), Err(Error::OutOfRange));
    assert_eq!(tree.cursor_end_mut().value_mut(), Err(Error::OutOfRange));
    assert_eq!(
        Error::OutOfRange.to_string(),
        "cursor is positioned at the end of the tree"
    );

    // Removing through the end cursor leaves the tree untouched.
    assert_eq!(tree.cursor_end_mut().remove_current(), None);
    assert_eq!(tree.len(), 1);
}

#[test]
fn cursor_steps_are_symmetric() {
    let tree: AvlTree<u32, ()> = (0..50).map(|k| (k * 3, ())).collect();

    let mut cursor = tree.cursor_first();
    while !cursor.is_end() {
        let here = cursor.clone();

        let mut there = cursor.clone();
        there.move_next();
        if !there.is_end() {
            there.move_prev();
            assert_eq!(there, here);
        }

        let mut back = cursor.clone();
        back.move_prev();
        if !back.is_end() {
            back.move_next();
            assert_eq!(back, here);
        }

        cursor.move_next();
    }
}

#[test]
fn cursor_wraps_through_end() {
    let tree: AvlTree<u32, ()> = [(1, ()), (2, ()), (3, ())].into_iter().collect();

    let mut cursor = tree.cursor_end();
    cursor.move_prev();
    assert_eq!(cursor.key(), Ok(&3));
    assert_eq!(cursor, tree.cursor_last());

    cursor.move_next();
    assert!(cursor.is_end());
    cursor.move_next();
    assert_eq!(cursor, tree.cursor_first());

    cursor.move_prev();
    assert!(cursor.is_end());
    assert_eq!(cursor.peek_next().map(|(k, _)| *k), Some(1));
    assert_eq!(cursor.peek_prev().map(|(k, _)| *k), Some(3));
}

#[test]
fn cursor_value_mut_updates_tree() {
    let mut tree: AvlTree<&str, u32> = [("a", 1), ("b", 2)].into_iter().collect();

    let mut cursor = tree.cursor_last_mut();
    *cursor.value_mut().unwrap() += 40;
    cursor.move_prev();
    assert_eq!(cursor.as_cursor().key(), Ok(&"a"));

    assert_eq!(tree.get("b"), Some(&42));
}

#[test]
fn cursor_removal_walks_backwards() {
    let mut tree: AvlTree<u32, ()> = (0..20).map(|k| (k, ())).collect();

    let mut cursor = tree.cursor_last_mut();
    let mut removed = Vec::new();
    while let Some((key, ())) = cursor.remove_current_and_move_prev() {
        removed.push(key);
    }

    assert!(cursor.is_end());
    assert_eq!(removed, (0..20).rev().collect::<Vec<_>>());
    assert!(tree.is_empty());
}

#[test]
fn len_matches_iteration() {
    let mut tree = AvlTree::new();
    for key in [5, 3, 9, 1, 4, 7, 11, 0, 2] {
        tree.insert(key, ());
    }
    tree.remove(&3);

    let mut count = 0;
    let mut cursor = tree.cursor_first();
    while !cursor.is_end() {
        count += 1;
        cursor.move_next();
    }

    assert_eq!(tree.len(), count);
    assert_eq!(tree.iter().count(), count);
    assert_eq!(tree.iter().rev().count(), count);
}

#[test]
fn height_stays_logarithmic() {
    let mut tree = AvlTree::new();

    for n in 1..=2048_u32 {
        tree.insert(n, ());

        if n.is_power_of_two() {
            let bound = 1.45 * f64::from(n + 2).log2();
            assert!(f64::from(tree.height()) <= bound, "height {} at n = {n}", tree.height());
        }
    }

    for n in (1..=2048_u32).step_by(2) {
        tree.remove(&n);
    }

    tree.assert_invariants();
    assert!(f64::from(tree.height()) <= 1.45 * 1026_f64.log2());
}

#[test]
fn clone_is_deep_and_independent() {
    let mut original: AvlTree<u32, String> = (0..16).map(|k| (k, k.to_string())).collect();
    let mut copy = original.clone();

    copy.assert_invariants();
    assert_eq!(copy, original);
    assert_eq!(copy.height(), original.height());

    let mut original_graph = String::new();
    let mut copy_graph = String::new();
    original.dotgraph("g", &mut original_graph).unwrap();
    copy.dotgraph("g", &mut copy_graph).unwrap();
    assert_eq!(original_graph, copy_graph);

    copy.remove(&3);
    *copy.get_mut(&4).unwrap() = "four".into();
    original.insert(99, "99".into());

    assert_eq!(original.get(&3).map(String::as_str), Some("3"));
    assert_eq!(original.get(&4).map(String::as_str), Some("4"));
    assert!(!copy.contains_key(&99));
    copy.assert_invariants();
    original.assert_invariants();
}

#[test]
fn merge_moves_only_new_keys() {
    let mut a: AvlTree<u32, char> = [(1, 'a'), (3, 'a'), (5, 'a')].into_iter().collect();
    let mut b: AvlTree<u32, char> = [(3, 'b'), (4, 'b'), (6, 'b')].into_iter().collect();

    a.merge(&mut b);

    assert_eq!(
        a.iter().map(|(k, v)| (*k, *v)).collect::<Vec<_>>(),
        [(1, 'a'), (3, 'a'), (4, 'b'), (5, 'a'), (6, 'b')]
    );
    assert_eq!(b.iter().map(|(k, v)| (*k, *v)).collect::<Vec<_>>(), [(3, 'b')]);
    a.assert_invariants();
    b.assert_invariants();
}

#[test]
fn swap_and_take() {
    let mut a: AvlTree<u32, ()> = [(1, ())].into_iter().collect();
    let mut b: AvlTree<u32, ()> = [(2, ()), (3, ())].into_iter().collect();

    a.swap(&mut b);
    assert_eq!(a.keys().copied().collect::<Vec<_>>(), [2, 3]);
    assert_eq!(b.keys().copied().collect::<Vec<_>>(), [1]);

    let moved = core::mem::take(&mut a);
    assert!(a.is_empty());
    assert_eq!(moved.len(), 2);
}

#[test]
fn iter_mut_and_debug() {
    let mut tree: AvlTree<u32, u32> = (1..=3).map(|k| (k, k)).collect();

    for (key, value) in &mut tree {
        *value += key * 100;
    }

    assert_eq!(format!("{tree:?}"), "{1: 101, 2: 202, 3: 303}");
    assert_eq!(tree.values().rev().copied().collect::<Vec<_>>(), [303, 202, 101]);

    let mut both_ends = tree.iter_mut();
    assert_eq!(both_ends.next().map(|(k, _)| *k), Some(1));
    assert_eq!(both_ends.next_back().map(|(k, _)| *k), Some(3));
    assert_eq!(both_ends.next().map(|(k, _)| *k), Some(2));
    assert!(both_ends.next_back().is_none());
    assert!(both_ends.next().is_none());
}

#[test]
fn first_last_and_pop() {
    let mut tree: AvlTree<u32, u32> = [(4, 40), (2, 20), (8, 80)].into_iter().collect();

    assert_eq!(tree.first_key_value(), Some((&2, &20)));
    assert_eq!(tree.last_key_value(), Some((&8, &80)));
    assert_eq!(tree.pop_first(), Some((2, 20)));
    assert_eq!(tree.pop_last(), Some((8, 80)));
    assert_eq!(tree.pop_last(), Some((4, 40)));
    assert_eq!(tree.pop_first(), None);
    assert_eq!(tree.height(), -1);
}

#[test]
fn max_len_is_positive() {
    assert!(AvlTree::<u64, u64>::max_len() > 0);
    assert!(AvlTree::<u8, ()>::max_len() > AvlTree::<u64, [u64; 8]>::max_len());
}

#[test]
fn tree_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<AvlTree<u32, String>>();
}

struct DropCounter(Rc<Cell<usize>>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

#[test]
fn every_value_dropped_once() {
    let drops = Rc::new(Cell::new(0));
    let mut tree = AvlTree::new();

    for key in 0..100 {
        tree.insert(key, DropCounter(drops.clone()));
    }

    // The rejected duplicate is dropped immediately.
    tree.insert(0, DropCounter(drops.clone()));
    assert_eq!(drops.get(), 1);

    drop(tree.remove(&50));
    assert_eq!(drops.get(), 2);

    let mut iter = tree.into_iter();
    for (key, value) in iter.by_ref().take(10) {
        assert!(key < 10);
        drop(value);
    }
    assert_eq!(drops.get(), 12);

    drop(iter);
    assert_eq!(drops.get(), 101);
}

#[test]
fn into_iter_yields_in_order() {
    let tree: AvlTree<u32, ()> = [7, 3, 9, 1, 5, 8, 10, 0, 2, 4, 6]
        .map(|k| (k, ()))
        .into_iter()
        .collect();

    let keys: Vec<u32> = tree.into_iter().map(|(k, ())| k).collect();
    assert_eq!(keys, (0..=10).collect::<Vec<_>>());
}

#[test]
fn clear_empties_tree() {
    let mut tree: AvlTree<u32, ()> = (0..10).map(|k| (k, ())).collect();
    tree.clear();

    assert!(tree.is_empty());
    assert_eq!(tree.len(), 0);
    assert!(tree.cursor_first().is_end());

    tree.insert(1, ());
    tree.assert_invariants();
}

#[cfg(miri)]
const FUZZ_RANGE: Range<usize> = 0..10;

#[cfg(not(miri))]
const FUZZ_RANGE: Range<usize> = 0..1000;

proptest::proptest! {
    #![proptest_config(ProptestConfig {
        max_shrink_iters: 65536,
        .. ProptestConfig::default()
    })]

    #[test]
    fn btree_equivalence(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_btree_equivalence(ops);
    }

    #[test]
    fn cursor_equivalence(
        values in proptest::collection::vec(0u32..500, 0..100),
        ops in proptest::collection::vec(model::cursor_op_strategy(), FUZZ_RANGE),
    ) {
        model::run_cursor_equivalence(values, ops);
    }
}
