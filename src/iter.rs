use core::{iter::FusedIterator, marker::PhantomData, ptr::NonNull};

use cordyceps::Linked;

use crate::{
    node::{Link, Node},
    AvlTree,
};

// Both ends step along parent links. Once `front` and `back` meet, the last element has been
// yielded and both are cleared.
struct Range<K, V> {
    front: Link<Node<K, V>>,
    back: Link<Node<K, V>>,
}

impl<K, V> Range<K, V> {
    fn new(tree: &AvlTree<K, V>) -> Self {
        Range {
            front: tree.first_raw(),
            back: tree.last_raw(),
        }
    }

    fn next(&mut self, tree: &AvlTree<K, V>) -> Link<Node<K, V>> {
        let cur = self.front?;

        if self.front == self.back {
            self.front = None;
            self.back = None;
        } else {
            self.front = unsafe { tree.successor_raw(cur) };
        }

        Some(cur)
    }

    fn next_back(&mut self, tree: &AvlTree<K, V>) -> Link<Node<K, V>> {
        let cur = self.back?;

        if self.front == self.back {
            self.front = None;
            self.back = None;
        } else {
            self.back = unsafe { tree.predecessor_raw(cur) };
        }

        Some(cur)
    }
}

/// An iterator over the entries of an [`AvlTree`], in key order.
pub struct Iter<'tree, K, V> {
    tree: &'tree AvlTree<K, V>,
    range: Range<K, V>,
}

impl<'tree, K, V> Iter<'tree, K, V> {
    pub(crate) fn new(tree: &'tree AvlTree<K, V>) -> Self {
        Iter {
            tree,
            range: Range::new(tree),
        }
    }
}

impl<'tree, K, V> Iterator for Iter<'tree, K, V> {
    type Item = (&'tree K, &'tree V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.range.next(self.tree)?;

        unsafe {
            let node = node.as_ref();
            Some((&node.key, &node.value))
        }
    }
}

impl<'tree, K, V> DoubleEndedIterator for Iter<'tree, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let node = self.range.next_back(self.tree)?;

        unsafe {
            let node = node.as_ref();
            Some((&node.key, &node.value))
        }
    }
}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Iter {
            tree: self.tree,
            range: Range {
                front: self.range.front,
                back: self.range.back,
            },
        }
    }
}

/// An iterator over the entries of an [`AvlTree`], in key order, with mutable values.
pub struct IterMut<'tree, K, V> {
    tree: NonNull<AvlTree<K, V>>,
    range: Range<K, V>,
    phantom: PhantomData<&'tree mut AvlTree<K, V>>,
}

impl<'tree, K, V> IterMut<'tree, K, V> {
    pub(crate) fn new(tree: &'tree mut AvlTree<K, V>) -> Self {
        IterMut {
            range: Range::new(tree),
            tree: tree.into(),
            phantom: PhantomData,
        }
    }
}

impl<'tree, K, V> Iterator for IterMut<'tree, K, V> {
    type Item = (&'tree K, &'tree mut V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.range.next(unsafe { self.tree.as_ref() })?;

        // SAFETY: Each node is yielded at most once, so no two returned values alias.
        unsafe {
            let node = &mut *node.as_ptr();
            Some((&node.key, &mut node.value))
        }
    }
}

impl<'tree, K, V> DoubleEndedIterator for IterMut<'tree, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let node = self.range.next_back(unsafe { self.tree.as_ref() })?;

        unsafe {
            let node = &mut *node.as_ptr();
            Some((&node.key, &mut node.value))
        }
    }
}

impl<K, V> FusedIterator for IterMut<'_, K, V> {}

/// An owning iterator over the entries of an [`AvlTree`], in key order.
pub struct IntoIter<K, V> {
    tree: AvlTree<K, V>,
    front: Link<Node<K, V>>,
}

impl<K, V> IntoIter<K, V> {
    pub(crate) fn new(tree: AvlTree<K, V>) -> Self {
        IntoIter {
            front: tree.root,
            tree,
        }
    }
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    // The tree is dismantled from the minimum upwards without rebalancing. Whatever remains is
    // still a linked binary tree, so dropping the iterator early frees it through the tree.
    fn next(&mut self) -> Option<Self::Item> {
        let cur = self.front?;

        unsafe {
            // Descend to the minimum node.
            let (cur, parent) = self.tree.min_in_subtree(cur);
            let parent = parent.or_else(|| self.tree.links(cur).parent());

            let right = self.tree.links(cur).right();

            // Elevate the node's right child (which may be None).
            self.tree.replace_child_or_set_root(parent, cur, right);
            self.tree.maybe_set_parent(right, parent);

            // If the node had no right child, climb to the parent. If the node had no parent,
            // the tree is empty.
            self.front = right.or(parent);

            Some(Node::from_ptr(cur).into_entry())
        }
    }
}

impl<K, V> FusedIterator for IntoIter<K, V> {}
