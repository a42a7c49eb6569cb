//! ArenaList: structural layer. A singly linked chain threaded through a
//! generational slot arena, with tombstones for removals that happen while
//! cursors are open.

use core::cmp::Ordering;
use core::fmt;
use slotmap::{DefaultKey, SecondaryMap, SlotMap};

/// Stable position of a node inside an `ArenaList`.
///
/// Positions stay valid while the node is linked. A position whose node has
/// been reclaimed never resolves again, even if the slot is reused.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ListPos(DefaultKey);

struct Node<T> {
    // `None` marks a tombstone: logically removed, still linked.
    elem: Option<T>,
    next: Option<DefaultKey>,
}

pub struct ArenaList<T> {
    nodes: SlotMap<DefaultKey, Node<T>>,
    head: Option<DefaultKey>,
    tail: Option<DefaultKey>,
    len: usize,
    iterators: usize,
    tombstones: usize,
}

#[derive(Debug, Eq, PartialEq)]
pub enum InsertError {
    DuplicateElement,
}

impl<T> Default for ArenaList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ArenaList<T> {
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            head: None,
            tail: None,
            len: 0,
            iterators: 0,
            tombstones: 0,
        }
    }

    /// Number of visible elements. Tombstones are not counted.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of allocated nodes, tombstones included.
    pub fn physical_len(&self) -> usize {
        self.nodes.len()
    }

    /// Number of cursors currently registered through `begin_iteration`.
    pub fn active_iterators(&self) -> usize {
        self.iterators
    }

    /// Prepend without a membership check.
    pub fn push_front(&mut self, elem: T) -> ListPos {
        let k = self.nodes.insert(Node {
            elem: Some(elem),
            next: self.head,
        });
        self.head = Some(k);
        if self.tail.is_none() {
            self.tail = Some(k);
        }
        self.len += 1;
        ListPos(k)
    }

    /// Append without a membership check.
    pub fn push_back(&mut self, elem: T) -> ListPos {
        let k = self.nodes.insert(Node {
            elem: Some(elem),
            next: None,
        });
        match self.tail {
            Some(t) => self.nodes[t].next = Some(k),
            None => self.head = Some(k),
        }
        self.tail = Some(k);
        self.len += 1;
        ListPos(k)
    }

    /// Insert before the first visible element that orders strictly after
    /// `elem`, so equal elements keep their relative insertion order.
    pub fn insert_sorted_by<F>(&mut self, elem: T, mut cmp: F) -> ListPos
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        let mut prev: Option<DefaultKey> = None;
        let mut cur = self.head;
        while let Some(k) = cur {
            let node = &self.nodes[k];
            if let Some(e) = &node.elem {
                if cmp(&elem, e) == Ordering::Less {
                    break;
                }
            }
            prev = Some(k);
            cur = node.next;
        }
        let k = self.nodes.insert(Node {
            elem: Some(elem),
            next: cur,
        });
        match prev {
            Some(p) => self.nodes[p].next = Some(k),
            None => self.head = Some(k),
        }
        if cur.is_none() {
            self.tail = Some(k);
        }
        self.len += 1;
        ListPos(k)
    }

    /// Remove and return the first visible element.
    pub fn pop_front(&mut self) -> Option<T> {
        let mut out = None;
        self.remove_by(|_| true, true, |e| out = Some(e));
        out
    }

    /// Remove and return the first visible element matching `pred`.
    pub fn remove_first<F>(&mut self, pred: F) -> Option<T>
    where
        F: FnMut(&T) -> bool,
    {
        let mut out = None;
        self.remove_by(pred, true, |e| out = Some(e));
        out
    }

    /// Remove every visible element matching `pred`; returns how many were removed.
    pub fn remove_all<F>(&mut self, pred: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        self.remove_by(pred, false, drop)
    }

    /// Remove and return the `n`th visible element.
    pub fn remove_at(&mut self, n: usize) -> Option<T> {
        let mut i = 0;
        self.remove_first(|_| {
            let hit = i == n;
            i += 1;
            hit
        })
    }

    // Unlinks immediately when no cursor is open; otherwise leaves a tombstone
    // that `end_iteration` reclaims once the last cursor closes.
    fn remove_by<F, S>(&mut self, mut pred: F, first_only: bool, mut sink: S) -> usize
    where
        F: FnMut(&T) -> bool,
        S: FnMut(T),
    {
        let mut removed = 0;
        let mut prev: Option<DefaultKey> = None;
        let mut cur = self.head;
        while let Some(k) = cur {
            let next = self.nodes[k].next;
            let hit = self.nodes[k].elem.as_ref().is_some_and(&mut pred);
            if !hit {
                prev = Some(k);
                cur = next;
                continue;
            }

            if self.iterators > 0 {
                if let Some(elem) = self.nodes[k].elem.take() {
                    sink(elem);
                }
                self.tombstones += 1;
                prev = Some(k);
            } else {
                match prev {
                    Some(p) => self.nodes[p].next = next,
                    None => self.head = next,
                }
                if self.tail == Some(k) {
                    self.tail = prev;
                }
                if let Some(elem) = self.nodes.remove(k).and_then(|n| n.elem) {
                    sink(elem);
                }
            }
            self.len -= 1;
            removed += 1;
            if first_only {
                break;
            }
            cur = next;
        }
        removed
    }

    /// Drop every element. Open cursors see an empty list afterwards.
    pub fn clear(&mut self) {
        while self.pop_front().is_some() {}
    }

    pub fn get(&self, n: usize) -> Option<&T> {
        self.iter().nth(n)
    }

    pub fn get_mut(&mut self, n: usize) -> Option<&mut T> {
        let mut i = 0;
        let k = self.key_where(|_| {
            let hit = i == n;
            i += 1;
            hit
        })?;
        self.nodes[k].elem.as_mut()
    }

    pub fn front(&self) -> Option<&T> {
        self.iter().next()
    }

    pub fn find<F>(&self, mut pred: F) -> Option<&T>
    where
        F: FnMut(&T) -> bool,
    {
        self.iter().find(|e| pred(e))
    }

    pub fn find_mut<F>(&mut self, pred: F) -> Option<&mut T>
    where
        F: FnMut(&T) -> bool,
    {
        let k = self.key_where(pred)?;
        self.nodes[k].elem.as_mut()
    }

    /// Position of the first visible element matching `pred`.
    pub fn find_pos<F>(&self, pred: F) -> Option<ListPos>
    where
        F: FnMut(&T) -> bool,
    {
        self.key_where(pred).map(ListPos)
    }

    fn key_where<F>(&self, mut pred: F) -> Option<DefaultKey>
    where
        F: FnMut(&T) -> bool,
    {
        let mut cur = self.head;
        while let Some(k) = cur {
            let node = &self.nodes[k];
            if node.elem.as_ref().is_some_and(&mut pred) {
                return Some(k);
            }
            cur = node.next;
        }
        None
    }

    /// Stable resort of the visible elements. Tombstones are moved behind
    /// them so that open cursors still terminate.
    pub fn sort_by<F>(&mut self, mut cmp: F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        let mut live: Vec<DefaultKey> = Vec::with_capacity(self.len);
        let mut dead: Vec<DefaultKey> = Vec::with_capacity(self.tombstones);
        let mut cur = self.head;
        while let Some(k) = cur {
            let node = &self.nodes[k];
            if node.elem.is_some() {
                live.push(k);
            } else {
                dead.push(k);
            }
            cur = node.next;
        }

        let nodes = &self.nodes;
        live.sort_by(|&a, &b| match (&nodes[a].elem, &nodes[b].elem) {
            (Some(x), Some(y)) => cmp(x, y),
            _ => Ordering::Equal,
        });

        live.extend(dead);
        self.head = live.first().copied();
        self.tail = live.last().copied();
        for pair in live.windows(2) {
            self.nodes[pair[0]].next = Some(pair[1]);
        }
        if let Some(&last) = live.last() {
            self.nodes[last].next = None;
        }
    }

    /// Shallow copy through an element-cloning function. The copy has no
    /// tombstones and no open cursors.
    pub fn copy_with<F>(&self, mut f: F) -> ArenaList<T>
    where
        F: FnMut(&T) -> T,
    {
        let mut out = ArenaList::new();
        for e in self.iter() {
            out.push_back(f(e));
        }
        out
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            nodes: &self.nodes,
            cur: self.head,
            remaining: self.len,
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, T> {
        // Slot order may differ from chain order after sorted inserts, so
        // each node's chain rank picks its place.
        let mut rank: SecondaryMap<DefaultKey, usize> =
            SecondaryMap::with_capacity(self.nodes.len());
        let mut cur = self.head;
        while let Some(k) = cur {
            rank.insert(k, rank.len());
            cur = self.nodes[k].next;
        }
        let mut slots: Vec<Option<&mut T>> = Vec::new();
        slots.resize_with(rank.len(), || None);
        for (k, node) in self.nodes.iter_mut() {
            if let Some(&r) = rank.get(k) {
                slots[r] = node.elem.as_mut();
            }
        }
        IterMut {
            inner: slots.into_iter().flatten(),
        }
    }

    /// Register a cursor and return the first visible position.
    pub fn begin_iteration(&mut self) -> Option<ListPos> {
        self.iterators += 1;
        self.first_pos()
    }

    /// Unregister a cursor. The last one to close runs the compaction pass.
    pub fn end_iteration(&mut self) {
        debug_assert!(self.iterators > 0, "end_iteration without begin_iteration");
        self.iterators = self.iterators.saturating_sub(1);
        if self.iterators == 0 {
            self.compact();
        }
    }

    pub fn first_pos(&self) -> Option<ListPos> {
        self.visible_from(self.head)
    }

    /// Position of the next visible node after `pos`, skipping tombstones.
    pub fn advance(&self, pos: ListPos) -> Option<ListPos> {
        let next = self.nodes.get(pos.0)?.next;
        self.visible_from(next)
    }

    /// Element at `pos`, or `None` if it was removed.
    pub fn get_at(&self, pos: ListPos) -> Option<&T> {
        self.nodes.get(pos.0).and_then(|n| n.elem.as_ref())
    }

    pub fn get_at_mut(&mut self, pos: ListPos) -> Option<&mut T> {
        self.nodes.get_mut(pos.0).and_then(|n| n.elem.as_mut())
    }

    fn visible_from(&self, mut cur: Option<DefaultKey>) -> Option<ListPos> {
        while let Some(k) = cur {
            let node = &self.nodes[k];
            if node.elem.is_some() {
                return Some(ListPos(k));
            }
            cur = node.next;
        }
        None
    }

    fn compact(&mut self) {
        if self.tombstones == 0 {
            return;
        }
        let reclaimed = self.tombstones;
        let mut prev: Option<DefaultKey> = None;
        let mut cur = self.head;
        while let Some(k) = cur {
            let next = self.nodes[k].next;
            if self.nodes[k].elem.is_none() {
                match prev {
                    Some(p) => self.nodes[p].next = next,
                    None => self.head = next,
                }
                if self.tail == Some(k) {
                    self.tail = prev;
                }
                self.nodes.remove(k);
            } else {
                prev = Some(k);
            }
            cur = next;
        }
        self.tombstones = 0;
        tracing::trace!(reclaimed, "list compaction");
    }
}

impl<T: PartialEq> ArenaList<T> {
    pub fn contains(&self, elem: &T) -> bool {
        self.iter().any(|e| e == elem)
    }

    /// Duplicate-free prepend.
    pub fn put(&mut self, elem: T) -> Result<ListPos, InsertError> {
        if self.contains(&elem) {
            return Err(InsertError::DuplicateElement);
        }
        Ok(self.push_front(elem))
    }

    /// Duplicate-free append.
    pub fn queue(&mut self, elem: T) -> Result<ListPos, InsertError> {
        if self.contains(&elem) {
            return Err(InsertError::DuplicateElement);
        }
        Ok(self.push_back(elem))
    }

    /// Remove every node holding `elem`. Returns false when none matched.
    pub fn remove(&mut self, elem: &T) -> bool {
        self.remove_all(|e| e == elem) > 0
    }
}

impl<T: Clone> Clone for ArenaList<T> {
    fn clone(&self) -> Self {
        self.copy_with(T::clone)
    }
}

impl<T: fmt::Debug> fmt::Debug for ArenaList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T> FromIterator<T> for ArenaList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut out = ArenaList::new();
        for e in iter {
            out.push_back(e);
        }
        out
    }
}

impl<T> IntoIterator for ArenaList<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;
    fn into_iter(self) -> IntoIter<T> {
        IntoIter { list: self }
    }
}

/// Iterator over visible elements in chain order.
pub struct Iter<'a, T> {
    nodes: &'a SlotMap<DefaultKey, Node<T>>,
    cur: Option<DefaultKey>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        while let Some(k) = self.cur {
            let node = &self.nodes[k];
            self.cur = node.next;
            if let Some(e) = &node.elem {
                self.remaining -= 1;
                return Some(e);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

/// Iterator over mutable visible elements in chain order.
pub struct IterMut<'a, T> {
    inner: core::iter::Flatten<std::vec::IntoIter<Option<&'a mut T>>>,
}

impl<'a, T> Iterator for IterMut<'a, T> {
    type Item = &'a mut T;
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

pub struct IntoIter<T> {
    list: ArenaList<T>,
}

impl<T> Iterator for IntoIter<T> {
    type Item = T;
    fn next(&mut self) -> Option<T> {
        self.list.pop_front()
    }
}
