use core::{fmt, marker::PhantomData, ptr::NonNull};

use crate::{
    node::{Link, Node},
    AvlTree, Error,
};

/// A cursor over an [`AvlTree`].
///
/// A cursor points either to an element of the tree or to a "ghost" non-element that connects the
/// last element to the first. The ghost is the end position: it holds no element, and accessing
/// its key or value fails with [`Error::OutOfRange`].
///
/// Two cursors compare equal if they point to the same element, or if both point to the ghost.
pub struct Cursor<'tree, K, V> {
    curs: CursorRaw<K, V>,
    phantom: PhantomData<&'tree AvlTree<K, V>>,
}

impl<'tree, K, V> Cursor<'tree, K, V> {
    pub(crate) fn first(tree: &'tree AvlTree<K, V>) -> Cursor<'tree, K, V> {
        Cursor::at(tree, tree.first_raw())
    }

    pub(crate) fn last(tree: &'tree AvlTree<K, V>) -> Cursor<'tree, K, V> {
        Cursor::at(tree, tree.last_raw())
    }

    pub(crate) fn at(tree: &'tree AvlTree<K, V>, ptr: Link<Node<K, V>>) -> Cursor<'tree, K, V> {
        Cursor {
            curs: CursorRaw {
                tree: tree.into(),
                ptr,
            },
            phantom: PhantomData,
        }
    }

    /// Moves the cursor to the next element of the `AvlTree`.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method moves it to the first
    /// element. If it is pointing to the last element, this method moves it to the "ghost"
    /// non-element.
    pub fn move_next(&mut self) {
        unsafe { self.curs.move_next() }
    }

    /// Moves the cursor to the previous element of the `AvlTree`.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method moves it to the last
    /// element. If it is pointing to the first element, this method moves it to the "ghost"
    /// non-element.
    pub fn move_prev(&mut self) {
        unsafe { self.curs.move_prev() }
    }

    /// Returns `true` if the cursor is pointing to the "ghost" non-element.
    pub fn is_end(&self) -> bool {
        self.curs.ptr.is_none()
    }

    /// Returns the key and value of the element pointed to by the cursor.
    ///
    /// This returns `None` if the cursor is currently pointing to the "ghost" non-element.
    pub fn get(&self) -> Option<(&'tree K, &'tree V)> {
        unsafe { self.curs.get() }
    }

    /// Returns the key of the element pointed to by the cursor.
    pub fn key(&self) -> Result<&'tree K, Error> {
        self.get().map(|(key, _)| key).ok_or(Error::OutOfRange)
    }

    /// Returns the value of the element pointed to by the cursor.
    pub fn value(&self) -> Result<&'tree V, Error> {
        self.get().map(|(_, value)| value).ok_or(Error::OutOfRange)
    }

    /// Returns the key and value of the next element.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method returns the first element.
    /// If it is pointing to the last element, this method returns `None`.
    pub fn peek_next(&self) -> Option<(&'tree K, &'tree V)> {
        unsafe { self.curs.peek_next() }
    }

    /// Returns the key and value of the previous element.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method returns the last element.
    /// If it is pointing to the first element, this method returns `None`.
    pub fn peek_prev(&self) -> Option<(&'tree K, &'tree V)> {
        unsafe { self.curs.peek_prev() }
    }
}

impl<K, V> Clone for Cursor<'_, K, V> {
    fn clone(&self) -> Self {
        Cursor {
            curs: self.curs,
            phantom: PhantomData,
        }
    }
}

impl<K, V> PartialEq for Cursor<'_, K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.curs.ptr == other.curs.ptr
    }
}

impl<K, V> Eq for Cursor<'_, K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Cursor<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cursor").field(&self.get()).finish()
    }
}

/// A cursor over an [`AvlTree`] which supports editing operations.
///
/// A cursor points either to an element of the tree or to a "ghost" non-element that connects the
/// last element to the first.
pub struct CursorMut<'tree, K, V> {
    curs: CursorRaw<K, V>,
    phantom: PhantomData<&'tree mut AvlTree<K, V>>,
}

impl<'tree, K, V> CursorMut<'tree, K, V> {
    pub(crate) fn first(tree: &'tree mut AvlTree<K, V>) -> CursorMut<'tree, K, V> {
        let ptr = tree.first_raw();
        CursorMut::at(tree, ptr)
    }

    pub(crate) fn last(tree: &'tree mut AvlTree<K, V>) -> CursorMut<'tree, K, V> {
        let ptr = tree.last_raw();
        CursorMut::at(tree, ptr)
    }

    pub(crate) fn at(
        tree: &'tree mut AvlTree<K, V>,
        ptr: Link<Node<K, V>>,
    ) -> CursorMut<'tree, K, V> {
        CursorMut {
            curs: CursorRaw {
                tree: tree.into(),
                ptr,
            },
            phantom: PhantomData,
        }
    }

    /// Returns a read-only cursor pointing to the current element.
    ///
    /// The `CursorMut` remains immutably borrowed for the lifetime of the returned `Cursor`.
    pub fn as_cursor(&self) -> Cursor<'_, K, V> {
        Cursor {
            curs: self.curs,
            phantom: PhantomData,
        }
    }

    /// Moves the cursor to the next element of the `AvlTree`.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method will move it to the first
    /// element. If it is pointing to the last element, this method will move it to the "ghost"
    /// non-element.
    pub fn move_next(&mut self) {
        unsafe { self.curs.move_next() }
    }

    /// Moves the cursor to the previous element of the `AvlTree`.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method will move it to the last
    /// element. If it is pointing to the first element, this method will move it to the "ghost"
    /// non-element.
    pub fn move_prev(&mut self) {
        unsafe { self.curs.move_prev() }
    }

    /// Returns `true` if the cursor is pointing to the "ghost" non-element.
    pub fn is_end(&self) -> bool {
        self.curs.ptr.is_none()
    }

    /// Returns the key and value of the element pointed to by the cursor.
    ///
    /// This returns `None` if the cursor is currently pointing to the "ghost" non-element.
    pub fn get(&self) -> Option<(&K, &V)> {
        unsafe { self.curs.get() }
    }

    /// Returns the key of the element pointed to by the cursor.
    pub fn key(&self) -> Result<&K, Error> {
        self.get().map(|(key, _)| key).ok_or(Error::OutOfRange)
    }

    /// Returns the value of the element pointed to by the cursor.
    pub fn value(&self) -> Result<&V, Error> {
        self.get().map(|(_, value)| value).ok_or(Error::OutOfRange)
    }

    /// Returns a mutable reference to the value of the element pointed to by the cursor.
    ///
    /// Keys cannot be modified through a cursor, as doing so could break the ordering of the tree.
    pub fn value_mut(&mut self) -> Result<&mut V, Error> {
        unsafe { self.curs.value_mut() }.ok_or(Error::OutOfRange)
    }

    /// Returns the key and value of the next element.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method returns the first element.
    /// If it is pointing to the last element, this method returns `None`.
    pub fn peek_next(&self) -> Option<(&K, &V)> {
        unsafe { self.curs.peek_next() }
    }

    /// Returns the key and value of the previous element.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method returns the last element.
    /// If it is pointing to the first element, this method returns `None`.
    pub fn peek_prev(&self) -> Option<(&K, &V)> {
        unsafe { self.curs.peek_prev() }
    }
}

impl<'tree, K: Ord, V> CursorMut<'tree, K, V> {
    /// Removes the current element from the tree.
    ///
    /// This returns the removed key and value and moves the cursor to the next element. If the
    /// cursor is pointing to the "ghost" non-element, this method returns `None`, and neither the
    /// tree nor the cursor is modified.
    pub fn remove_current(&mut self) -> Option<(K, V)> {
        unsafe { self.curs.remove_current() }
    }

    /// Removes the current element from the tree.
    ///
    /// This returns the removed key and value and moves the cursor to the previous element. If the
    /// cursor is pointing to the "ghost" non-element, this method returns `None`, and neither the
    /// tree nor the cursor is modified.
    pub fn remove_current_and_move_prev(&mut self) -> Option<(K, V)> {
        unsafe { self.curs.remove_current_and_move_prev() }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for CursorMut<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CursorMut").field(&self.get()).finish()
    }
}

struct CursorRaw<K, V> {
    tree: NonNull<AvlTree<K, V>>,
    ptr: Link<Node<K, V>>,
}

impl<K, V> Clone for CursorRaw<K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for CursorRaw<K, V> {}

impl<K, V> CursorRaw<K, V> {
    unsafe fn move_next(&mut self) {
        let tree = unsafe { self.tree.as_ref() };

        match self.ptr {
            Some(p) => self.ptr = unsafe { tree.successor_raw(p) },
            None => self.ptr = tree.first_raw(),
        }
    }

    unsafe fn move_prev(&mut self) {
        let tree = unsafe { self.tree.as_ref() };

        match self.ptr {
            Some(p) => self.ptr = unsafe { tree.predecessor_raw(p) },
            None => self.ptr = tree.last_raw(),
        }
    }

    unsafe fn get<'a>(&self) -> Option<(&'a K, &'a V)> {
        self.ptr.map(|p| unsafe {
            let node = p.as_ref();
            (&node.key, &node.value)
        })
    }

    unsafe fn value_mut<'a>(&mut self) -> Option<&'a mut V> {
        self.ptr.map(|p| unsafe { &mut (*p.as_ptr()).value })
    }

    unsafe fn peek_next<'a>(&self) -> Option<(&'a K, &'a V)> {
        let mut next = *self;
        unsafe {
            next.move_next();
            next.get()
        }
    }

    unsafe fn peek_prev<'a>(&self) -> Option<(&'a K, &'a V)> {
        let mut prev = *self;
        unsafe {
            prev.move_prev();
            prev.get()
        }
    }
}

impl<K: Ord, V> CursorRaw<K, V> {
    // Removal may move payloads between nodes, so the cursor is re-located by key afterwards.
    unsafe fn remove_current(&mut self) -> Option<(K, V)> {
        let remove = self.ptr?;

        let tree = unsafe { self.tree.as_mut() };
        let (key, value) = unsafe { tree.remove_node(remove) };
        self.ptr = tree.next_above(&key);

        Some((key, value))
    }

    unsafe fn remove_current_and_move_prev(&mut self) -> Option<(K, V)> {
        let remove = self.ptr?;

        let tree = unsafe { self.tree.as_mut() };
        let (key, value) = unsafe { tree.remove_node(remove) };
        self.ptr = tree.next_below(&key);

        Some((key, value))
    }
}
