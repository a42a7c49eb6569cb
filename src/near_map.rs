//! NearMap: keyword table with exact and abbreviated lookup.
//!
//! Entries live in one of 27 buckets chosen by the first byte of the key
//! (ASCII letters map to 1..=26, anything else to 0). Within a bucket they
//! are kept sorted by their abbreviation hint, compared case-insensitively,
//! and abbreviated lookups take the first entry in that order whose key
//! starts with the query. Ambiguity is never recomputed: callers inserting
//! keys with shared prefixes pick hints that order them correctly.

use crate::arena_list::ArenaList;
use core::cmp::Ordering;
use core::fmt;

pub const NUM_BUCKETS: usize = 27;

struct NearEntry<V> {
    key: String,
    abbrev: String,
    value: V,
}

pub struct NearMap<V> {
    buckets: [Option<ArenaList<NearEntry<V>>>; NUM_BUCKETS],
    len: usize,
}

fn bucket_of(key: &str) -> usize {
    match key.bytes().next() {
        Some(c) if c.is_ascii_alphabetic() => 1 + usize::from(c.to_ascii_lowercase() - b'a'),
        _ => 0,
    }
}

fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    a.bytes()
        .map(|c| c.to_ascii_lowercase())
        .cmp(b.bytes().map(|c| c.to_ascii_lowercase()))
}

fn starts_with_ignore_case(key: &str, prefix: &str) -> bool {
    key.len() >= prefix.len()
        && key.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

impl<V> Default for NearMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> NearMap<V> {
    pub fn new() -> Self {
        Self {
            buckets: std::array::from_fn(|_| None),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert `value` under `key`. `abbrev` is the shortest prefix the entry
    /// should answer to and defaults to the full key. An entry with the same
    /// key (ignoring case) is replaced and its value returned.
    pub fn put(&mut self, key: &str, value: V, abbrev: Option<&str>) -> Option<V> {
        let old = self.remove(key);
        let bucket = self.buckets[bucket_of(key)].get_or_insert_with(ArenaList::new);
        bucket.insert_sorted_by(
            NearEntry {
                key: key.to_owned(),
                abbrev: abbrev.unwrap_or(key).to_owned(),
                value,
            },
            |a, b| cmp_ignore_case(&a.abbrev, &b.abbrev),
        );
        self.len += 1;
        old
    }

    /// Look up `key`. With `abbrev_ok`, `key` may be any prefix of the stored
    /// key and the first entry in abbreviation order wins; otherwise the full
    /// key must match. Case is ignored either way.
    pub fn get(&self, key: &str, abbrev_ok: bool) -> Option<&V> {
        let bucket = self.buckets[bucket_of(key)].as_ref()?;
        let entry = if abbrev_ok {
            bucket.find(|e| starts_with_ignore_case(&e.key, key))
        } else {
            bucket.find(|e| e.key.eq_ignore_ascii_case(key))
        };
        entry.map(|e| &e.value)
    }

    pub fn get_mut(&mut self, key: &str, abbrev_ok: bool) -> Option<&mut V> {
        let bucket = self.buckets[bucket_of(key)].as_mut()?;
        let entry = if abbrev_ok {
            bucket.find_mut(|e| starts_with_ignore_case(&e.key, key))
        } else {
            bucket.find_mut(|e| e.key.eq_ignore_ascii_case(key))
        };
        entry.map(|e| &mut e.value)
    }

    /// True if `key` resolves, allowing abbreviations.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key, true).is_some()
    }

    /// Every value whose key starts with `prefix`, in abbreviation order.
    pub fn get_all_matches(&self, prefix: &str) -> Vec<&V> {
        match &self.buckets[bucket_of(prefix)] {
            Some(bucket) => bucket
                .iter()
                .filter(|e| starts_with_ignore_case(&e.key, prefix))
                .map(|e| &e.value)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Remove the entry whose full key matches; abbreviations are not accepted.
    pub fn remove(&mut self, key: &str) -> Option<V> {
        let entry = self.buckets[bucket_of(key)]
            .as_mut()?
            .remove_first(|e| e.key.eq_ignore_ascii_case(key))?;
        self.len -= 1;
        Some(entry.value)
    }

    /// `(abbreviation, value)` pairs, bucket by bucket in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> + '_ {
        self.buckets
            .iter()
            .flatten()
            .flat_map(|l| l.iter())
            .map(|e| (e.abbrev.as_str(), &e.value))
    }

    /// Full keys in iteration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.buckets
            .iter()
            .flatten()
            .flat_map(|l| l.iter())
            .map(|e| e.key.as_str())
    }
}

impl<V: fmt::Debug> fmt::Debug for NearMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
