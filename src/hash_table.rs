//! HashTable: string-keyed table of chained buckets.
//!
//! Keys are owned copies and are compared byte for byte. Each bucket is an
//! `ArenaList` of entries, allocated the first time a key lands in it. The
//! bucket count is fixed at construction; `expand` rebuckets on request.

use crate::arena_list::ArenaList;
use core::fmt;

/// Bucket count used by `HashTable::new`.
pub const DEFAULT_BUCKETS: usize = 5;

/// Polynomial hash over the key bytes with base 2.
///
/// Arithmetic wraps at 32 bits and the result is the magnitude of the signed
/// sum. Once the base overflows to zero, bytes past the 31st no longer
/// contribute.
pub fn string_hash(key: &str) -> u32 {
    let mut base: i32 = 1;
    let mut h: i32 = 0;
    for &b in key.as_bytes() {
        base = base.wrapping_mul(2);
        h = h.wrapping_add(i32::from(b).wrapping_mul(base));
    }
    h.unsigned_abs()
}

struct Entry<V> {
    key: String,
    value: V,
}

pub struct HashTable<V> {
    buckets: Vec<Option<ArenaList<Entry<V>>>>,
    len: usize,
}

fn empty_buckets<V>(n: usize) -> Vec<Option<ArenaList<Entry<V>>>> {
    (0..n.max(1)).map(|_| None).collect()
}

impl<V> Default for HashTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> HashTable<V> {
    pub fn new() -> Self {
        Self::with_buckets(DEFAULT_BUCKETS)
    }

    /// Table with `n` buckets (at least one).
    pub fn with_buckets(n: usize) -> Self {
        Self {
            buckets: empty_buckets(n),
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

    #[inline]
    fn bucket_of(&self, key: &str) -> usize {
        string_hash(key) as usize % self.buckets.len()
    }

    /// Insert or overwrite in place. Returns the value previously stored
    /// under `key`, if any.
    pub fn put(&mut self, key: &str, value: V) -> Option<V> {
        let b = self.bucket_of(key);
        let bucket = self.buckets[b].get_or_insert_with(ArenaList::new);
        if let Some(e) = bucket.find_mut(|e| e.key == key) {
            return Some(core::mem::replace(&mut e.value, value));
        }
        bucket.push_front(Entry {
            key: key.to_owned(),
            value,
        });
        self.len += 1;
        None
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.buckets[self.bucket_of(key)]
            .as_ref()?
            .find(|e| e.key == key)
            .map(|e| &e.value)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        let b = self.bucket_of(key);
        self.buckets[b]
            .as_mut()?
            .find_mut(|e| e.key == key)
            .map(|e| &mut e.value)
    }

    /// Value under `key`, inserting `f()` first if the key is absent.
    pub fn get_or_insert_with<F>(&mut self, key: &str, f: F) -> &mut V
    where
        F: FnOnce() -> V,
    {
        let b = self.bucket_of(key);
        let bucket = self.buckets[b].get_or_insert_with(ArenaList::new);
        let pos = match bucket.find_pos(|e| e.key == key) {
            Some(p) => p,
            None => {
                self.len += 1;
                bucket.push_front(Entry {
                    key: key.to_owned(),
                    value: f(),
                })
            }
        };
        &mut bucket
            .get_at_mut(pos)
            .expect("entry must exist at a position resolved in the same call")
            .value
    }

    /// Remove `key`, returning its value if it was present.
    pub fn remove(&mut self, key: &str) -> Option<V> {
        let b = self.bucket_of(key);
        let entry = self.buckets[b]
            .as_mut()?
            .remove_first(|e| e.key == key)?;
        self.len -= 1;
        Some(entry.value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Entries in bucket order. The order is unspecified but stable while
    /// the table is not mutated.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> + '_ {
        self.buckets
            .iter()
            .flatten()
            .flat_map(|l| l.iter())
            .map(|e| (e.key.as_str(), &e.value))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut V)> + '_ {
        self.buckets
            .iter_mut()
            .flatten()
            .flat_map(|l| l.iter_mut())
            .map(|Entry { key, value }| (key.as_str(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }

    /// Owned copies of every key.
    pub fn collect_keys(&self) -> Vec<String> {
        self.keys().map(str::to_owned).collect()
    }

    /// Rehash every entry into `n` buckets.
    pub fn expand(&mut self, n: usize) {
        let old = core::mem::replace(&mut self.buckets, empty_buckets(n));
        let n = self.buckets.len();
        for e in old.into_iter().flatten().flatten() {
            let b = string_hash(&e.key) as usize % n;
            self.buckets[b].get_or_insert_with(ArenaList::new).push_front(e);
        }
    }

    /// Remove every entry, yielding owned `(key, value)` pairs. The bucket
    /// count is kept.
    pub fn drain(&mut self) -> impl Iterator<Item = (String, V)> {
        let n = self.buckets.len();
        let old = core::mem::replace(&mut self.buckets, empty_buckets(n));
        self.len = 0;
        old.into_iter()
            .flatten()
            .flatten()
            .map(|e| (e.key, e.value))
    }

    pub fn clear(&mut self) {
        self.drain().for_each(drop);
    }
}

impl<V: Clone> Clone for HashTable<V> {
    fn clone(&self) -> Self {
        Self {
            buckets: self
                .buckets
                .iter()
                .map(|b| {
                    b.as_ref().map(|l| {
                        l.copy_with(|e| Entry {
                            key: e.key.clone(),
                            value: e.value.clone(),
                        })
                    })
                })
                .collect(),
            len: self.len,
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for HashTable<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
