//! Storage documents: ordered key/value sets whose values are strings,
//! nested sets or lists of sets.
//!
//! A `StorageSet` files its entries in a `HashTable` and stamps each new key
//! with a sequence number, so writers can restore first-insertion order.
//! Re-storing a key replaces its value but keeps its sequence number.
//!
//! Every entry carries all three value slots. Stores populate one and reset
//! the others; numbers and booleans are kept in their string form and parsed
//! leniently on read. Reads of missing keys return defaults, except
//! `read_set`/`read_list`, which create and file an empty value so repeated
//! reads see the same nested document.

use crate::arena_list::{ArenaList, ListPos};
use crate::hash_table::HashTable;
use core::fmt;

/// Bucket count for every set's entry table.
pub const SET_BUCKETS: usize = 20;

/// One entry of a `StorageSet`.
#[derive(Clone, Debug, Default)]
pub struct StorageData {
    seq: u64,
    string: String,
    set: Option<StorageSet>,
    list: Option<StorageSetList>,
}

impl StorageData {
    fn new(seq: u64) -> Self {
        Self {
            seq,
            ..Self::default()
        }
    }

    /// Position assigned when the key was first stored.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn string(&self) -> &str {
        &self.string
    }

    pub fn set(&self) -> Option<&StorageSet> {
        self.set.as_ref()
    }

    pub fn list(&self) -> Option<&StorageSetList> {
        self.list.as_ref()
    }

    /// True when the string is empty and both nested slots are blank.
    /// Blank entries are left out when a document is written.
    pub fn is_blank(&self) -> bool {
        self.string.is_empty()
            && self.set.as_ref().map_or(true, StorageSet::is_blank)
            && self.list.as_ref().map_or(true, StorageSetList::is_blank)
    }
}

impl PartialEq for StorageData {
    // Absent nested slots compare equal to empty ones.
    fn eq(&self, other: &Self) -> bool {
        fn slot_eq<T: PartialEq>(a: &Option<T>, b: &Option<T>, empty: fn(&T) -> bool) -> bool {
            match (a, b) {
                (Some(x), Some(y)) => x == y,
                (Some(x), None) | (None, Some(x)) => empty(x),
                (None, None) => true,
            }
        }
        self.string == other.string
            && slot_eq(&self.set, &other.set, StorageSet::is_empty)
            && slot_eq(&self.list, &other.list, StorageSetList::is_empty)
    }
}

/// Ordered key/value document.
///
/// Any string is accepted as a key, but only keys that read back from the
/// text encoding intact should be stored in a document meant for `encode`.
/// A key must not start with `-`, which ends the set early on read. It must
/// not contain `:` or a newline, and it must not begin or end with
/// whitespace. Storing any other key logs a warning.
#[derive(Clone)]
pub struct StorageSet {
    entries: HashTable<StorageData>,
    longest_key: usize,
    top_entry: u64,
}

impl Default for StorageSet {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageSet {
    pub fn new() -> Self {
        Self {
            entries: HashTable::with_buckets(SET_BUCKETS),
            longest_key: 0,
            top_entry: 0,
        }
    }

    /// Number of keys, blank entries included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if no entry holds a non-blank value, at any depth.
    pub fn is_blank(&self) -> bool {
        self.entries.values().all(StorageData::is_blank)
    }

    /// Length of the longest key ever stored; keys are padded to it on write.
    pub fn longest_key(&self) -> usize {
        self.longest_key
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains(key)
    }

    /// Drop `key` and its value. Returns false if it was not present.
    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Entries in first-insertion order.
    pub fn entries(&self) -> Vec<(&str, &StorageData)> {
        let mut out: Vec<(&str, &StorageData)> = self.entries.iter().collect();
        out.sort_by_key(|(_, d)| d.seq);
        out
    }

    /// Keys in first-insertion order.
    pub fn keys(&self) -> Vec<&str> {
        self.entries().into_iter().map(|(k, _)| k).collect()
    }

    fn note_key(&mut self, key: &str) -> u64 {
        if !key_survives_encoding(key) {
            tracing::warn!(key, "stored key will not read back from the text encoding");
        }
        self.longest_key = self.longest_key.max(key.len());
        self.top_entry += 1;
        self.top_entry
    }

    fn put(
        &mut self,
        key: &str,
        string: String,
        set: Option<StorageSet>,
        list: Option<StorageSetList>,
    ) {
        let seq = match self.entries.get(key) {
            Some(old) => old.seq,
            None => self.note_key(key),
        };
        self.entries.put(
            key,
            StorageData {
                seq,
                string,
                set,
                list,
            },
        );
    }

    // Entry for `key`, filing an empty one first if it is missing.
    fn entry_mut(&mut self, key: &str) -> &mut StorageData {
        let seq = if self.entries.contains(key) {
            0
        } else {
            self.note_key(key)
        };
        self.entries.get_or_insert_with(key, || StorageData::new(seq))
    }

    pub fn store_string(&mut self, key: &str, val: &str) {
        self.put(key, val.to_owned(), None, None);
    }

    pub fn store_int(&mut self, key: &str, val: i32) {
        self.put(key, val.to_string(), None, None);
    }

    pub fn store_long(&mut self, key: &str, val: i64) {
        self.put(key, val.to_string(), None, None);
    }

    /// Fixed notation with six decimals.
    pub fn store_double(&mut self, key: &str, val: f64) {
        self.put(key, format!("{val:.6}"), None, None);
    }

    /// Stored as `yes` or `no`.
    pub fn store_bool(&mut self, key: &str, val: bool) {
        let s = if val { "yes" } else { "no" };
        self.put(key, s.to_owned(), None, None);
    }

    pub fn store_set(&mut self, key: &str, val: StorageSet) {
        self.put(key, String::new(), Some(val), None);
    }

    pub fn store_list(&mut self, key: &str, val: StorageSetList) {
        self.put(key, String::new(), None, Some(val));
    }

    /// String under `key`, or `""` if absent.
    pub fn read_string(&self, key: &str) -> &str {
        self.entries.get(key).map_or("", |d| d.string.as_str())
    }

    /// Leading integer of the stored string; 0 if absent or unparsable.
    /// Out-of-range values saturate.
    pub fn read_int(&self, key: &str) -> i32 {
        let n = leading_int(self.read_string(key));
        n.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
    }

    pub fn read_long(&self, key: &str) -> i64 {
        leading_int(self.read_string(key))
    }

    /// Longest leading float of the stored string; 0.0 if none.
    pub fn read_double(&self, key: &str) -> f64 {
        leading_float(self.read_string(key))
    }

    /// `yes` in any case, or a non-zero leading integer.
    pub fn read_bool(&self, key: &str) -> bool {
        let s = self.read_string(key);
        s.eq_ignore_ascii_case("yes") || leading_int(s) != 0
    }

    /// Nested set under `key`, created and filed empty if missing.
    pub fn read_set(&mut self, key: &str) -> &mut StorageSet {
        self.entry_mut(key).set.get_or_insert_with(StorageSet::new)
    }

    /// Nested list under `key`, created and filed empty if missing.
    pub fn read_list(&mut self, key: &str) -> &mut StorageSetList {
        self.entry_mut(key).list.get_or_insert_with(StorageSetList::new)
    }

    /// Nested set under `key` without creating one.
    pub fn get_set(&self, key: &str) -> Option<&StorageSet> {
        self.entries.get(key)?.set.as_ref()
    }

    pub fn get_list(&self, key: &str) -> Option<&StorageSetList> {
        self.entries.get(key)?.list.as_ref()
    }

    pub fn get(&self, key: &str) -> Option<&StorageData> {
        self.entries.get(key)
    }
}

impl PartialEq for StorageSet {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (self.entries(), other.entries());
        a.len() == b.len() && a.iter().zip(&b).all(|((ka, da), (kb, db))| ka == kb && da == db)
    }
}

impl fmt::Debug for StorageSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries()).finish()
    }
}

// atoi-style: optional leading whitespace and sign, then digits.
fn leading_int(s: &str) -> i64 {
    let s = s.trim_start();
    let (neg, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let n = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, d| acc.saturating_mul(10).saturating_add(i64::from(d - b'0')));
    if neg {
        -n
    } else {
        n
    }
}

// Keys the codec reads back unchanged.
fn key_survives_encoding(key: &str) -> bool {
    !key.starts_with('-') && !key.contains([':', '\n']) && key.trim() == key
}

// atof-style: the longest prefix of the form
// [sign] digits [. digits] [(e|E) [sign] digits], parsed once.
fn leading_float(s: &str) -> f64 {
    let s = s.trim_start();
    let b = s.as_bytes();
    let digits_from = |i: usize| i + b[i..].iter().take_while(|c| c.is_ascii_digit()).count();

    let sign = usize::from(matches!(b.first(), Some(b'+' | b'-')));
    let mut end = digits_from(sign);
    let mut mantissa = end - sign;
    if b.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        mantissa += frac_end - end - 1;
        end = frac_end;
    }
    if mantissa == 0 {
        return 0.0;
    }
    if matches!(b.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(b.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        // an exponent marker without digits is not part of the number
        if exp_end > exp {
            end = exp_end;
        }
    }
    s[..end].parse().unwrap_or(0.0)
}

/// Ordered sequence of `StorageSet`s with a draining cursor.
///
/// `put` always appends. `next` walks the sets from the front, one per
/// call, independently of later appends behind the cursor.
pub struct StorageSetList {
    sets: ArenaList<StorageSet>,
    cursor: Option<ListPos>,
    started: bool,
}

impl Default for StorageSetList {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageSetList {
    pub fn new() -> Self {
        Self {
            sets: ArenaList::new(),
            cursor: None,
            started: false,
        }
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// True if every set in the list is blank.
    pub fn is_blank(&self) -> bool {
        self.sets.iter().all(StorageSet::is_blank)
    }

    pub fn put(&mut self, set: StorageSet) {
        self.sets.push_back(set);
    }

    /// Advance the cursor and return the set under it, or `None` once the
    /// list is exhausted.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<&mut StorageSet> {
        let pos = if self.started {
            self.cursor.and_then(|p| self.sets.advance(p))
        } else {
            self.started = true;
            self.sets.first_pos()
        };
        self.cursor = pos;
        self.sets.get_at_mut(pos?)
    }

    /// Rewind the cursor to the front.
    pub fn reset(&mut self) {
        self.cursor = None;
        self.started = false;
    }

    pub fn iter(&self) -> impl Iterator<Item = &StorageSet> + '_ {
        self.sets.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut StorageSet> + '_ {
        self.sets.iter_mut()
    }

    /// Build a list by storing each item with `f`.
    pub fn store_each<I, F>(items: I, f: F) -> Self
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> StorageSet,
    {
        items.into_iter().map(f).collect()
    }

    /// Drain the cursor, reading each remaining set with `f`.
    pub fn read_each<T, F>(&mut self, mut f: F) -> Vec<T>
    where
        F: FnMut(&mut StorageSet) -> T,
    {
        let mut out = Vec::with_capacity(self.len());
        while let Some(set) = self.next() {
            out.push(f(set));
        }
        out
    }
}

impl Clone for StorageSetList {
    // Positions do not carry over to the copied arena, so the copy starts
    // with a fresh cursor.
    fn clone(&self) -> Self {
        Self {
            sets: self.sets.clone(),
            cursor: None,
            started: false,
        }
    }
}

impl PartialEq for StorageSetList {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

impl fmt::Debug for StorageSetList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl FromIterator<StorageSet> for StorageSetList {
    fn from_iter<I: IntoIterator<Item = StorageSet>>(iter: I) -> Self {
        Self {
            sets: iter.into_iter().collect(),
            cursor: None,
            started: false,
        }
    }
}
