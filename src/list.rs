//! List: shared, duplicate-free list handle whose cursors survive removals
//! made through any other handle to the same list.

use crate::arena_list::{ArenaList, ListPos};
use core::cell::RefCell;
use core::cmp::Ordering;
use core::fmt;
use std::rc::Rc;

/// Ordered, duplicate-free sequence shared between handles.
///
/// `Clone` produces another handle to the same list, not a copy; use
/// `copy_with` for that. Callbacks passed to the `*_with` methods run while
/// the list is borrowed and must not call back into it.
pub struct List<T> {
    inner: Rc<RefCell<ArenaList<T>>>,
}

impl<T> Clone for List<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for List<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> List<T> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ArenaList::new())),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }

    /// Allocated nodes, including tombstones awaiting reclamation.
    pub fn physical_len(&self) -> usize {
        self.inner.borrow().physical_len()
    }

    /// Remove and return the head.
    pub fn pop(&self) -> Option<T> {
        self.inner.borrow_mut().pop_front()
    }

    /// Remove and return the `n`th element.
    pub fn remove_at(&self, n: usize) -> Option<T> {
        self.inner.borrow_mut().remove_at(n)
    }

    /// Remove the first element matching `pred`.
    pub fn remove_with<F>(&self, pred: F) -> Option<T>
    where
        F: FnMut(&T) -> bool,
    {
        self.inner.borrow_mut().remove_first(pred)
    }

    /// Insert before the first element ordering strictly after `elem`.
    pub fn put_with<F>(&self, elem: T, cmp: F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        self.inner.borrow_mut().insert_sorted_by(elem, cmp);
    }

    /// Stable resort.
    pub fn sort_with<F>(&self, cmp: F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        self.inner.borrow_mut().sort_by(cmp);
    }

    pub fn clear(&self) {
        self.inner.borrow_mut().clear();
    }

    /// Shallow copy into a new, independent list.
    pub fn copy_with<F>(&self, f: F) -> List<T>
    where
        F: FnMut(&T) -> T,
    {
        let copied = self.inner.borrow().copy_with(f);
        List {
            inner: Rc::new(RefCell::new(copied)),
        }
    }

    /// Open a cursor at the head. The cursor keeps the list alive and defers
    /// physical removal of nodes until it is dropped.
    pub fn cursor(&self) -> Cursor<T> {
        self.inner.borrow_mut().begin_iteration();
        Cursor {
            list: self.inner.clone(),
            started: false,
            yielded: None,
        }
    }

    /// True if both handles refer to the same list.
    pub fn ptr_eq(&self, other: &List<T>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: PartialEq> List<T> {
    /// Prepend unless already present. Returns whether the element was added.
    pub fn put(&self, elem: T) -> bool {
        self.inner.borrow_mut().put(elem).is_ok()
    }

    pub fn push(&self, elem: T) -> bool {
        self.put(elem)
    }

    /// Append unless already present. Returns whether the element was added.
    pub fn queue(&self, elem: T) -> bool {
        self.inner.borrow_mut().queue(elem).is_ok()
    }

    pub fn contains(&self, elem: &T) -> bool {
        self.inner.borrow().contains(elem)
    }

    /// Remove every node holding `elem`. Returns false if it was not a member.
    pub fn remove(&self, elem: &T) -> bool {
        self.inner.borrow_mut().remove(elem)
    }
}

impl<T: Clone> List<T> {
    pub fn get(&self, n: usize) -> Option<T> {
        self.inner.borrow().get(n).cloned()
    }

    pub fn get_with<F>(&self, pred: F) -> Option<T>
    where
        F: FnMut(&T) -> bool,
    {
        self.inner.borrow().find(pred).cloned()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.inner.borrow().iter().cloned().collect()
    }

    /// Iterate over a snapshot; later changes to the list are not seen.
    pub fn iter(&self) -> std::vec::IntoIter<T> {
        self.to_vec().into_iter()
    }
}

impl<T: fmt::Debug> fmt::Debug for List<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.borrow().fmt(f)
    }
}

impl<T: PartialEq> FromIterator<T> for List<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let list = List::new();
        for e in iter {
            list.queue(e);
        }
        list
    }
}

/// Cursor over a `List`. Any number may be open at once.
///
/// Elements removed while a cursor is open are skipped; their nodes are
/// reclaimed when the last cursor on the list is dropped.
pub struct Cursor<T> {
    list: Rc<RefCell<ArenaList<T>>>,
    started: bool,
    // stays allocated while this cursor is open, even if tombstoned
    yielded: Option<ListPos>,
}

impl<T: Clone> Cursor<T> {
    /// The element most recently yielded, if it is still in the list.
    pub fn current(&self) -> Option<T> {
        let l = self.list.borrow();
        self.yielded.and_then(|p| l.get_at(p)).cloned()
    }
}

impl<T> Cursor<T> {
    /// Rewind to the head.
    pub fn reset(&mut self) {
        self.started = false;
        self.yielded = None;
    }
}

impl<T: Clone> Iterator for Cursor<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let l = self.list.borrow();
        // successor is resolved lazily so removals made since the last call
        // are honoured
        let p = match self.yielded {
            Some(y) => l.advance(y),
            None if !self.started => l.first_pos(),
            None => None,
        };
        self.started = true;
        let p = p?;
        self.yielded = Some(p);
        l.get_at(p).cloned()
    }
}

impl<T> Drop for Cursor<T> {
    fn drop(&mut self) {
        self.list.borrow_mut().end_iteration();
    }
}
