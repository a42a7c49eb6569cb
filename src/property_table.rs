//! PropertyTable: integer-keyed table whose keys live inside the elements.

use crate::arena_list::ArenaList;
use core::fmt;

/// Supplies the integer key an element is filed under. The key must not
/// change while the element is in a table.
pub trait Keyed {
    fn property_key(&self) -> i64;
}

pub struct PropertyTable<T> {
    buckets: Vec<Option<ArenaList<T>>>,
    len: usize,
}

impl<T: Keyed> PropertyTable<T> {
    /// Table with `n` buckets (at least one).
    pub fn with_buckets(n: usize) -> Self {
        Self {
            buckets: (0..n.max(1)).map(|_| None).collect(),
            len: 0,
        }
    }

    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    // Euclidean remainder keeps negative keys in range.
    fn bucket_of(&self, key: i64) -> usize {
        key.rem_euclid(self.buckets.len() as i64) as usize
    }

    /// File `elem` under its key. If an element with that key is already
    /// present, `elem` is dropped and `false` returned.
    pub fn put(&mut self, elem: T) -> bool {
        let key = elem.property_key();
        let b = self.bucket_of(key);
        let bucket = self.buckets[b].get_or_insert_with(ArenaList::new);
        if bucket.find(|e| e.property_key() == key).is_some() {
            return false;
        }
        bucket.push_front(elem);
        self.len += 1;
        true
    }

    pub fn get(&self, key: i64) -> Option<&T> {
        self.buckets[self.bucket_of(key)]
            .as_ref()?
            .find(|e| e.property_key() == key)
    }

    pub fn get_mut(&mut self, key: i64) -> Option<&mut T> {
        let b = self.bucket_of(key);
        self.buckets[b]
            .as_mut()?
            .find_mut(|e| e.property_key() == key)
    }

    pub fn remove(&mut self, key: i64) -> Option<T> {
        let b = self.bucket_of(key);
        let elem = self.buckets[b]
            .as_mut()?
            .remove_first(|e| e.property_key() == key)?;
        self.len -= 1;
        Some(elem)
    }

    pub fn contains(&self, key: i64) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.buckets.iter().flatten().flat_map(|l| l.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        self.buckets.iter_mut().flatten().flat_map(|l| l.iter_mut())
    }
}

impl<T: Keyed + fmt::Debug> fmt::Debug for PropertyTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
