//! An AVL tree, a height-balanced binary search tree mapping unique keys to values.
//#![no_std]

// Conventions used in comments:
// - The height of an absent subtree is -1, and a leaf has height 0.
// - The height of an internal node is one more than the height of its taller child.
// - The balance of a node `x` is `h(right(x)) - h(left(x))`.
//
// The fundamental invariants of an AVL tree are:
// 1. All balances are -1, 0 or 1.
// 2. Every key in the left subtree of `x` is less than the key of `x`, which is less than every
//    key in the right subtree of `x`.
//
// Each node also keeps a non-owning link to its parent, which cursors and iterators use to step
// between neighbouring keys without a stack.
//
// Rotations do not reseat the rotated subtree's root. Instead, the root node exchanges its key and
// value with the child being rotated up, and the links below it are rearranged around it. The
// subtree root therefore never changes identity, so its parent's child link never needs updating,
// but a key is not guaranteed to stay in the same node across mutations.

extern crate alloc;

use alloc::boxed::Box;
use core::{borrow::Borrow, cmp::Ordering, fmt, marker::PhantomData, mem, ptr::NonNull};

use cordyceps::Linked;

mod cursor;
mod debug;
mod error;
mod iter;
mod node;

#[cfg(any(test, feature = "model"))]
pub mod model;

#[cfg(test)]
mod tests;

pub use cursor::{Cursor, CursorMut};
pub use error::Error;
pub use iter::{IntoIter, Iter, IterMut};

use node::{Dir, Link, Links, Node};

/// An ordered map based on an [AVL tree].
///
/// Search, insertion and removal complete in _O(log(n))_ time. Every node keeps a link to its
/// parent, so [`Cursor`]s can move between neighbouring entries in either direction.
///
/// [AVL tree]: https://en.wikipedia.org/wiki/AVL_tree
pub struct AvlTree<K, V> {
    root: Link<Node<K, V>>,
    _marker: PhantomData<Box<Node<K, V>>>,
}

// SAFETY: The tree exclusively owns all of its nodes; no node is shared with another tree.
unsafe impl<K: Send, V: Send> Send for AvlTree<K, V> {}

// SAFETY: Shared references to the tree only hand out shared references to keys and values.
unsafe impl<K: Sync, V: Sync> Sync for AvlTree<K, V> {}

impl<K, V> AvlTree<K, V> {
    /// Returns a new empty tree.
    pub const fn new() -> AvlTree<K, V> {
        AvlTree {
            root: None,
            _marker: PhantomData,
        }
    }

    /// Returns `true` if the tree contains no elements.
    pub const fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Returns the number of elements in the tree.
    ///
    /// The count is not cached; this walks the whole tree in _O(n)_ time.
    pub fn len(&self) -> usize {
        fn count<K, V>(opt_node: Link<Node<K, V>>) -> usize {
            match opt_node {
                Some(node) => unsafe {
                    let links = Node::links(node).as_ref();
                    count(links.left()) + count(links.right()) + 1
                },
                None => 0,
            }
        }

        count(self.root)
    }

    /// Returns a theoretical upper bound on the number of elements a tree can hold.
    ///
    /// This is derived from the size of a node and the address space; it is not enforced.
    pub const fn max_len() -> usize {
        (usize::MAX / 2 - mem::size_of::<K>() - mem::size_of::<Node<K, V>>())
            / mem::size_of::<Node<K, V>>()
    }

    /// Returns the height of the tree.
    ///
    /// An empty tree has height -1 and a tree with a single element has height 0.
    pub fn height(&self) -> i8 {
        unsafe { self.height_of(self.root) }
    }

    /// Exchanges the contents of two trees in _O(1)_ time.
    pub fn swap(&mut self, other: &mut AvlTree<K, V>) {
        mem::swap(&mut self.root, &mut other.root);
    }

    /// Clears the tree, removing all elements.
    pub fn clear(&mut self) {
        // Nodes are freed children first, so no node is freed while still reachable.
        unsafe fn free<K, V>(node: NonNull<Node<K, V>>) {
            unsafe {
                if let Some(left) = Node::links(node).as_ref().left() {
                    free(left);
                }

                if let Some(right) = Node::links(node).as_ref().right() {
                    free(right);
                }

                drop(Node::from_ptr(node));
            }
        }

        if let Some(root) = self.root.take() {
            log::debug!("clearing tree of height {}", unsafe {
                Node::links(root).as_ref().height()
            });

            unsafe { free(root) };
        }
    }

    /// Returns the first key-value pair in the tree.
    ///
    /// The returned key is the minimum key in the tree.
    pub fn first_key_value(&self) -> Option<(&K, &V)> {
        self.first_raw().map(|node| unsafe {
            let node = node.as_ref();
            (&node.key, &node.value)
        })
    }

    /// Returns the last key-value pair in the tree.
    ///
    /// The returned key is the maximum key in the tree.
    pub fn last_key_value(&self) -> Option<(&K, &V)> {
        self.last_raw().map(|node| unsafe {
            let node = node.as_ref();
            (&node.key, &node.value)
        })
    }

    /// Returns a cursor pointing to the first element of the tree.
    ///
    /// If the tree is empty, the cursor points to the "ghost" end position.
    pub fn cursor_first(&self) -> Cursor<'_, K, V> {
        Cursor::first(self)
    }

    /// Returns a cursor pointing to the last element of the tree.
    ///
    /// If the tree is empty, the cursor points to the "ghost" end position.
    pub fn cursor_last(&self) -> Cursor<'_, K, V> {
        Cursor::last(self)
    }

    /// Returns a cursor pointing to the "ghost" end position, one past the last element.
    pub fn cursor_end(&self) -> Cursor<'_, K, V> {
        Cursor::at(self, None)
    }

    /// Returns a mutable cursor pointing to the first element of the tree.
    pub fn cursor_first_mut(&mut self) -> CursorMut<'_, K, V> {
        CursorMut::first(self)
    }

    /// Returns a mutable cursor pointing to the last element of the tree.
    pub fn cursor_last_mut(&mut self) -> CursorMut<'_, K, V> {
        CursorMut::last(self)
    }

    /// Returns a mutable cursor pointing to the "ghost" end position.
    pub fn cursor_end_mut(&mut self) -> CursorMut<'_, K, V> {
        CursorMut::at(self, None)
    }

    /// Returns an iterator over the entries of the tree, in key order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(self)
    }

    /// Returns an iterator over the entries of the tree, in key order, with mutable values.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut::new(self)
    }

    /// Returns an iterator over the keys of the tree, in order.
    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &K> + '_ {
        self.iter().map(|(key, _)| key)
    }

    /// Returns an iterator over the values of the tree, in key order.
    pub fn values(&self) -> impl DoubleEndedIterator<Item = &V> + '_ {
        self.iter().map(|(_, value)| value)
    }

    pub(crate) fn first_raw(&self) -> Link<Node<K, V>> {
        self.root.map(|root| unsafe { self.min_in_subtree(root).0 })
    }

    pub(crate) fn last_raw(&self) -> Link<Node<K, V>> {
        let mut cur = self.root?;

        while let Some(right) = unsafe { self.links(cur).right() } {
            cur = right;
        }

        Some(cur)
    }

    // Returns the in-order successor of `node`, following parent links when `node` has no right
    // subtree.
    pub(crate) unsafe fn successor_raw(&self, node: NonNull<Node<K, V>>) -> Link<Node<K, V>> {
        unsafe {
            if let Some(right) = self.links(node).right() {
                return Some(self.min_in_subtree(right).0);
            }

            let mut cur = node;
            let mut opt_parent = self.links(cur).parent();

            // Climb while `cur` is a right child.
            while let Some(parent) = opt_parent {
                if self.which_child(parent, cur) == Dir::Left {
                    break;
                }

                cur = parent;
                opt_parent = self.links(cur).parent();
            }

            opt_parent
        }
    }

    // Mirror image of `successor_raw`.
    pub(crate) unsafe fn predecessor_raw(&self, node: NonNull<Node<K, V>>) -> Link<Node<K, V>> {
        unsafe {
            if let Some(mut cur) = self.links(node).left() {
                while let Some(right) = self.links(cur).right() {
                    cur = right;
                }

                return Some(cur);
            }

            let mut cur = node;
            let mut opt_parent = self.links(cur).parent();

            // Climb while `cur` is a left child.
            while let Some(parent) = opt_parent {
                if self.which_child(parent, cur) == Dir::Right {
                    break;
                }

                cur = parent;
                opt_parent = self.links(cur).parent();
            }

            opt_parent
        }
    }

    // Returns the minimum node in the subtree.
    //
    // If the subtree root is not the minimum, also returns the minimum node's parent.
    #[inline]
    pub(crate) unsafe fn min_in_subtree(
        &self,
        root: NonNull<Node<K, V>>,
    ) -> (NonNull<Node<K, V>>, Link<Node<K, V>>) {
        let mut parent = None;
        let mut cur = root;

        while let Some(left) = unsafe { self.links(cur).left() } {
            parent = Some(cur);
            cur = left;
        }

        (cur, parent)
    }

    pub(crate) unsafe fn maybe_set_parent(
        &mut self,
        opt_node: Link<Node<K, V>>,
        parent: Link<Node<K, V>>,
    ) {
        let Some(node) = opt_node else {
            return;
        };

        unsafe { self.links_mut(node).set_parent(parent) };
    }

    #[inline]
    pub(crate) unsafe fn replace_child_or_set_root(
        &mut self,
        parent: Link<Node<K, V>>,
        old_child: NonNull<Node<K, V>>,
        new_child: Link<Node<K, V>>,
    ) {
        match parent {
            Some(parent) => unsafe {
                let dir = self.which_child(parent, old_child);
                self.links_mut(parent).set_child(dir, new_child);
            },
            None => self.root = new_child,
        }
    }

    // Rotates the subtree rooted at `node` in direction `dir`, raising the child on the
    // opposite side.
    //
    // `node` exchanges its payload with the raised child, so `node` stays the subtree root and its
    // parent is not touched. If `located` points at either of the two nodes, it is updated to
    // follow the payload.
    unsafe fn rotate(
        &mut self,
        node: NonNull<Node<K, V>>,
        dir: Dir,
        located: &mut Link<Node<K, V>>,
    ) {
        unsafe {
            let pivot = self
                .links(node)
                .child(!dir)
                .expect("rotation requires a child on the heavy side");

            log::trace!("rotating {dir:?} at height {}", self.links(node).height());

            // - `pivot` becomes the `dir` child of `node`, holding `node`'s old payload.
            // - `outer` stays on the `!dir` side, now directly under `node`.
            // - `inner` crosses over to the `!dir` side of `pivot`.
            // - `across` moves from `node` down to the `dir` side of `pivot`.
            let outer = self.links(pivot).child(!dir);
            let inner = self.links(pivot).child(dir);
            let across = self.links(node).child(dir);

            (*node.as_ptr()).swap_payload(&mut *pivot.as_ptr());

            if *located == Some(node) {
                *located = Some(pivot);
            } else if *located == Some(pivot) {
                *located = Some(node);
            }

            self.links_mut(node).set_child(dir, Some(pivot));
            self.links_mut(node).set_child(!dir, outer);
            self.maybe_set_parent(outer, Some(node));

            self.links_mut(pivot).set_child(!dir, inner);
            self.maybe_set_parent(inner, Some(pivot));
            self.links_mut(pivot).set_child(dir, across);
            self.maybe_set_parent(across, Some(pivot));

            self.update_height(pivot);
            self.update_height(node);
        }
    }

    // Restores the balance of `node`, whose children are both balanced and differ in height by at
    // most two.
    unsafe fn rebalance(&mut self, node: NonNull<Node<K, V>>, located: &mut Link<Node<K, V>>) {
        unsafe {
            match self.balance_of(Some(node)) {
                -2 => {
                    let left = self.links(node).left();
                    if self.balance_of(left) == 1 {
                        let left = left.expect("left-heavy node has a left child");
                        self.rotate(left, Dir::Left, located);
                    }
                    self.rotate(node, Dir::Right, located);
                }

                2 => {
                    let right = self.links(node).right();
                    if self.balance_of(right) == -1 {
                        let right = right.expect("right-heavy node has a right child");
                        self.rotate(right, Dir::Right, located);
                    }
                    self.rotate(node, Dir::Left, located);
                }

                _ => {}
            }
        }
    }

    // Removes the minimum node of the subtree rooted at `node`, storing it in `removed`, and
    // returns the new subtree root.
    unsafe fn remove_min(
        &mut self,
        node: NonNull<Node<K, V>>,
        removed: &mut Option<Box<Node<K, V>>>,
    ) -> Link<Node<K, V>> {
        unsafe {
            match self.links(node).left() {
                Some(left) => {
                    let new_left = self.remove_min(left, removed);
                    self.links_mut(node).set_left(new_left);
                    self.update_height(node);
                    self.rebalance(node, &mut None);
                    Some(node)
                }

                None => {
                    // The minimum has no left child; elevate its right child (which may be None).
                    let right = self.links(node).right();
                    let parent = self.links(node).parent();
                    self.maybe_set_parent(right, parent);
                    *removed = Some(Node::from_ptr(node));
                    right
                }
            }
        }
    }

    // Removes the node selected by `cmp` from the subtree rooted at `opt_node`, storing it in
    // `removed`, and returns the new subtree root.
    //
    // `cmp` orders the target relative to the key of the node it is given.
    //
    // If the target has two children, it stays linked and takes over the payload of its
    // successor; the successor's node is unlinked instead and receives the target's payload.
    unsafe fn remove_at<F>(
        &mut self,
        opt_node: Link<Node<K, V>>,
        cmp: &F,
        removed: &mut Option<Box<Node<K, V>>>,
    ) -> Link<Node<K, V>>
    where
        F: Fn(&K) -> Ordering,
    {
        let node = opt_node?;

        unsafe {
            let dir = match cmp(&node.as_ref().key) {
                Ordering::Less => Dir::Left,
                Ordering::Greater => Dir::Right,
                Ordering::Equal => {
                    let left = self.links(node).left();
                    let right = self.links(node).right();

                    match (left, right) {
                        (Some(_), Some(right)) => {
                            let new_right = self.remove_min(right, removed);
                            self.links_mut(node).set_right(new_right);

                            if let Some(successor) = removed.as_deref_mut() {
                                (*node.as_ptr()).swap_payload(successor);
                            }

                            self.update_height(node);
                            self.rebalance(node, &mut None);
                            return Some(node);
                        }

                        (child, None) | (None, child) => {
                            let parent = self.links(node).parent();
                            self.maybe_set_parent(child, parent);
                            *removed = Some(Node::from_ptr(node));
                            return child;
                        }
                    }
                }
            };

            let child = self.links(node).child(dir);
            let new_child = self.remove_at(child, cmp, removed);
            self.links_mut(node).set_child(dir, new_child);

            self.update_height(node);
            self.rebalance(node, &mut None);
            Some(node)
        }
    }

    // Removes `target` from the tree and returns its key and value.
    //
    // # Safety
    //
    // It is the caller's responsibility to ensure that `target` is an element of `self`, and not
    // any other tree.
    pub(crate) unsafe fn remove_node(&mut self, target: NonNull<Node<K, V>>) -> (K, V)
    where
        K: Ord,
    {
        let mut removed = None;
        let cmp = |key: &K| unsafe { target.as_ref() }.key.cmp(key);

        self.root = unsafe { self.remove_at(self.root, &cmp, &mut removed) };

        removed
            .expect("removed node must be an element of the tree")
            .into_entry()
    }

    // Support methods ========================================================

    #[inline]
    pub(crate) unsafe fn links<'a>(&self, node: NonNull<Node<K, V>>) -> &'a Links<Node<K, V>> {
        unsafe { Node::links(node).as_ref() }
    }

    #[inline]
    pub(crate) unsafe fn links_mut<'a>(
        &mut self,
        node: NonNull<Node<K, V>>,
    ) -> &'a mut Links<Node<K, V>> {
        unsafe { Node::links(node).as_mut() }
    }

    /// Returns the height of the pointed-to node.
    unsafe fn height_of(&self, node: Link<Node<K, V>>) -> i8 {
        node.map(|n| unsafe { self.links(n).height() }).unwrap_or(-1)
    }

    unsafe fn balance_of(&self, node: Link<Node<K, V>>) -> i8 {
        let Some(node) = node else {
            return 0;
        };

        unsafe {
            self.height_of(self.links(node).right()) - self.height_of(self.links(node).left())
        }
    }

    unsafe fn update_height(&mut self, node: NonNull<Node<K, V>>) {
        unsafe {
            let left = self.height_of(self.links(node).left());
            let right = self.height_of(self.links(node).right());
            self.links_mut(node).set_height(left.max(right) + 1);
        }
    }

    pub(crate) unsafe fn which_child(
        &self,
        parent: NonNull<Node<K, V>>,
        child: NonNull<Node<K, V>>,
    ) -> Dir {
        if unsafe { self.links(parent).left() } == Some(child) {
            Dir::Left
        } else {
            Dir::Right
        }
    }
}

impl<K: Ord, V> AvlTree<K, V> {
    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        if let Some(root) = self.root {
            unsafe {
                assert_eq!(self.links(root).parent(), None, "root must not have a parent");
                self.assert_invariants_at(root);
            }
        }

        let mut keys = self.keys();
        if let Some(mut prev) = keys.next() {
            for key in keys {
                assert!(prev < key, "in-order keys must be strictly increasing");
                prev = key;
            }
        }
    }

    // Checks the subtree rooted at `node` and returns its height.
    unsafe fn assert_invariants_at(&self, node: NonNull<Node<K, V>>) -> i8 {
        unsafe {
            let mut heights = [-1; 2];

            for dir in [Dir::Left, Dir::Right] {
                if let Some(child) = self.links(node).child(dir) {
                    // Ensure child's parent link points to this node.
                    let parent = self
                        .links(child)
                        .parent()
                        .expect("child parent pointer not set");
                    assert_eq!(node, parent);

                    // Ensure the child is on the correct side of this node.
                    let ordering = child.as_ref().key.cmp(&node.as_ref().key);
                    let expected = match dir {
                        Dir::Left => Ordering::Less,
                        Dir::Right => Ordering::Greater,
                    };
                    assert_eq!(ordering, expected);

                    heights[dir as usize] = self.assert_invariants_at(child);
                }
            }

            let [left, right] = heights;
            let height = self.links(node).height();

            // Ensure all leaves have height 0.
            if self.links(node).is_leaf() {
                assert_eq!(height, 0);
            }

            assert_eq!(height, left.max(right) + 1, "stale height");
            assert!((right - left).abs() <= 1, "balance {} out of range", right - left);

            height
        }
    }

    /// Returns `true` if the tree contains an element with key `key`.
    #[inline]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get_raw(key).is_some()
    }

    /// Returns a reference to the value associated with `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let ptr = self.get_raw(key)?;
        unsafe { Some(&(*ptr.as_ptr()).value) }
    }

    /// Returns a mutable reference to the value associated with `key`.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let ptr = self.get_raw(key)?;
        unsafe { Some(&mut (*ptr.as_ptr()).value) }
    }

    /// Returns a cursor pointing to the element with key `key`.
    ///
    /// If no such element exists, the cursor points to the "ghost" end position.
    pub fn find<Q>(&self, key: &Q) -> Cursor<'_, K, V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        Cursor::at(self, self.get_raw(key))
    }

    /// Returns a mutable cursor pointing to the element with key `key`.
    ///
    /// If no such element exists, the cursor points to the "ghost" end position.
    pub fn find_mut<Q>(&mut self, key: &Q) -> CursorMut<'_, K, V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let ptr = self.get_raw(key);
        CursorMut::at(self, ptr)
    }

    pub(crate) fn get_raw<Q>(&self, key: &Q) -> Link<Node<K, V>>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        fn search<K, V, Q>(opt_node: Link<Node<K, V>>, key: &Q) -> Link<Node<K, V>>
        where
            K: Borrow<Q>,
            Q: Ord + ?Sized,
        {
            let node = opt_node?;

            unsafe {
                match key.cmp(node.as_ref().key.borrow()) {
                    Ordering::Less => search(Node::links(node).as_ref().left(), key),
                    Ordering::Equal => Some(node),
                    Ordering::Greater => search(Node::links(node).as_ref().right(), key),
                }
            }
        }

        search(self.root, key)
    }

    // Returns the node with the least key greater than `key`.
    pub(crate) fn next_above<Q>(&self, key: &Q) -> Link<Node<K, V>>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut opt_cur = self.root;
        let mut found = None;

        while let Some(cur) = opt_cur {
            unsafe {
                if key.cmp(cur.as_ref().key.borrow()) == Ordering::Less {
                    found = Some(cur);
                    opt_cur = self.links(cur).left();
                } else {
                    opt_cur = self.links(cur).right();
                }
            }
        }

        found
    }

    // Returns the node with the greatest key less than `key`.
    pub(crate) fn next_below<Q>(&self, key: &Q) -> Link<Node<K, V>>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut opt_cur = self.root;
        let mut found = None;

        while let Some(cur) = opt_cur {
            unsafe {
                if key.cmp(cur.as_ref().key.borrow()) == Ordering::Greater {
                    found = Some(cur);
                    opt_cur = self.links(cur).right();
                } else {
                    opt_cur = self.links(cur).left();
                }
            }
        }

        found
    }

    /// Inserts a key-value pair into the tree.
    ///
    /// If the tree already contains `key`, the tree is left unchanged and `value` is dropped.
    /// Returns a cursor pointing to the element holding `key`, and `true` if a new element was
    /// created.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn insert(&mut self, key: K, value: V) -> (CursorMut<'_, K, V>, bool) {
        let (located, inserted) = match self.root {
            Some(root) => unsafe { self.insert_at(root, key, value) },
            None => {
                // Tree is empty. Set the new node as the root and return.
                let ptr = Node::into_ptr(Node::new(key, value));
                self.root = Some(ptr);
                (Some(ptr), true)
            }
        };

        (CursorMut::at(self, located), inserted)
    }

    // Inserts into the subtree rooted at `node`, rebalancing each node on the way back up.
    //
    // Returns the node that holds `key` once the subtree is balanced, and whether it was newly
    // created.
    unsafe fn insert_at(
        &mut self,
        node: NonNull<Node<K, V>>,
        key: K,
        value: V,
    ) -> (Link<Node<K, V>>, bool) {
        unsafe {
            let dir = match key.cmp(&node.as_ref().key) {
                Ordering::Less => Dir::Left,
                Ordering::Equal => return (Some(node), false),
                Ordering::Greater => Dir::Right,
            };

            let (mut located, inserted) = match self.links(node).child(dir) {
                // Descend.
                Some(child) => self.insert_at(child, key, value),

                // Set the new node as child.
                None => {
                    let ptr = Node::into_ptr(Node::new(key, value));
                    self.links_mut(ptr).set_parent(Some(node));
                    self.links_mut(node).set_child(dir, Some(ptr));
                    (Some(ptr), true)
                }
            };

            self.update_height(node);
            self.rebalance(node, &mut located);

            (located, inserted)
        }
    }

    /// Removes the element with key `key` from the tree, returning its value.
    #[inline]
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.remove_entry(key).map(|(_, value)| value)
    }

    /// Removes the element with key `key` from the tree, returning its key and value.
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut removed = None;
        let cmp = |node_key: &K| key.cmp(node_key.borrow());

        self.root = unsafe { self.remove_at(self.root, &cmp, &mut removed) };

        removed.map(Node::into_entry)
    }

    /// Removes and returns the first key-value pair in the tree.
    ///
    /// The returned key is the minimum key in the tree.
    pub fn pop_first(&mut self) -> Option<(K, V)> {
        let first = self.first_raw()?;
        Some(unsafe { self.remove_node(first) })
    }

    /// Removes and returns the last key-value pair in the tree.
    ///
    /// The returned key is the maximum key in the tree.
    pub fn pop_last(&mut self) -> Option<(K, V)> {
        let last = self.last_raw()?;
        Some(unsafe { self.remove_node(last) })
    }

    /// Moves every element of `other` whose key is not already in `self` into `self`.
    ///
    /// Elements whose keys are already present in `self` stay in `other`, and the corresponding
    /// values in `self` are left unchanged.
    pub fn merge(&mut self, other: &mut AvlTree<K, V>) {
        let source = mem::take(other);
        let mut moved = 0_usize;
        let mut kept = 0_usize;

        for (key, value) in source {
            if self.contains_key(&key) {
                other.insert(key, value);
                kept += 1;
            } else {
                self.insert(key, value);
                moved += 1;
            }
        }

        log::debug!("merged {moved} elements, {kept} duplicate keys left in source");
    }
}

impl<K, V> Drop for AvlTree<K, V> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<K, V> Default for AvlTree<K, V> {
    fn default() -> Self {
        AvlTree::new()
    }
}

impl<K: Clone, V: Clone> Clone for AvlTree<K, V> {
    fn clone(&self) -> Self {
        // Each copy is linked into `tree` before its children are copied, so a panicking `clone`
        // frees everything copied so far when `tree` is dropped.
        unsafe fn clone_node<K: Clone, V: Clone>(
            tree: &mut AvlTree<K, V>,
            source: NonNull<Node<K, V>>,
            parent: Link<Node<K, V>>,
        ) -> NonNull<Node<K, V>> {
            unsafe {
                let src = source.as_ref();
                let ptr = Node::into_ptr(Node::new(src.key.clone(), src.value.clone()));

                let height = tree.links(source).height();
                tree.links_mut(ptr).set_height(height);
                tree.links_mut(ptr).set_parent(parent);

                ptr
            }
        }

        unsafe fn clone_children<K: Clone, V: Clone>(
            tree: &mut AvlTree<K, V>,
            source: NonNull<Node<K, V>>,
            copy: NonNull<Node<K, V>>,
        ) {
            for dir in [Dir::Left, Dir::Right] {
                unsafe {
                    if let Some(child) = tree.links(source).child(dir) {
                        let child_copy = clone_node(tree, child, Some(copy));
                        tree.links_mut(copy).set_child(dir, Some(child_copy));
                        clone_children(tree, child, child_copy);
                    }
                }
            }
        }

        let mut tree = AvlTree::new();

        if let Some(root) = self.root {
            unsafe {
                let root_copy = clone_node(&mut tree, root, None);
                tree.root = Some(root_copy);
                clone_children(&mut tree, root, root_copy);
            }
        }

        tree
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for AvlTree<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: PartialEq, V: PartialEq> PartialEq for AvlTree<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl<K: Eq, V: Eq> Eq for AvlTree<K, V> {}

impl<K: Ord, V> FromIterator<(K, V)> for AvlTree<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut tree = AvlTree::new();
        tree.extend(iter);
        tree
    }
}

impl<K: Ord, V> Extend<(K, V)> for AvlTree<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<'tree, K, V> IntoIterator for &'tree AvlTree<K, V> {
    type Item = (&'tree K, &'tree V);
    type IntoIter = Iter<'tree, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'tree, K, V> IntoIterator for &'tree mut AvlTree<K, V> {
    type Item = (&'tree K, &'tree mut V);
    type IntoIter = IterMut<'tree, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<K, V> IntoIterator for AvlTree<K, V> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter::new(self)
    }
}
