//! Text encoding of storage documents.
//!
//! Grammar, one entry per line with two spaces of indentation per level:
//!
//! ```text
//! key: single-line string
//! key:~
//!   multi-line string, one line per source line,
//!   indented one level deeper than the key
//! key:-
//!   nested set entries...
//!   -
//! key:=
//!   first set of the list...
//!   -
//!   second set...
//!   -
//! -
//! ```
//!
//! Every set ends with a line holding its indentation and `-`. Keys are padded
//! with spaces to the longest key of their set and trimmed when read. Blank
//! values are not written at all.
//!
//! Decoding is total: a truncated stream closes whatever is open, and lines
//! that cannot be understood are logged and skipped.

use crate::error::StorageError;
use crate::storage::{StorageData, StorageSet, StorageSetList};
use std::io::{Read, Write};
use std::path::Path;

const INDENT_STEP: usize = 2;

const STRING_MARKER: char = '~';
const SET_MARKER: char = '-';
const LIST_MARKER: char = '=';
const TYPELESS_MARKER: char = ' ';

/// Encode `set` as a document.
pub fn encode(set: &StorageSet) -> String {
    let mut out = String::new();
    write_set(set, &mut out, 0);
    out
}

pub fn encode_to<W: Write>(set: &StorageSet, mut w: W) -> Result<(), StorageError> {
    w.write_all(encode(set).as_bytes())?;
    w.flush()?;
    Ok(())
}

fn push_indent(out: &mut String, indent: usize) {
    out.extend(std::iter::repeat(' ').take(indent));
}

fn write_key(out: &mut String, key: &str, width: usize, indent: usize) {
    push_indent(out, indent);
    out.push_str(&format!("{key:<width$}:"));
}

fn write_set(set: &StorageSet, out: &mut String, indent: usize) {
    let width = set.longest_key();
    for (key, data) in set.entries() {
        write_data(key, data, width, indent, out);
    }
    push_indent(out, indent);
    out.push(SET_MARKER);
    out.push('\n');
}

fn write_data(key: &str, data: &StorageData, width: usize, indent: usize, out: &mut String) {
    let string = data.string();
    if !string.is_empty() {
        write_key(out, key, width, indent);
        if string.contains('\n') {
            out.push(STRING_MARKER);
            out.push('\n');
            for line in string.split_inclusive('\n') {
                push_indent(out, indent + INDENT_STEP);
                out.push_str(line);
                if !line.ends_with('\n') {
                    out.push('\n');
                }
            }
        } else {
            out.push(TYPELESS_MARKER);
            out.push_str(string);
            out.push('\n');
        }
    } else if let Some(set) = data.set().filter(|s| !s.is_blank()) {
        write_key(out, key, width, indent);
        out.push(SET_MARKER);
        out.push('\n');
        write_set(set, out, indent + INDENT_STEP);
    } else if let Some(list) = data.list().filter(|l| !l.is_blank()) {
        write_key(out, key, width, indent);
        out.push(LIST_MARKER);
        out.push('\n');
        // blank members keep their place as a bare terminator
        for set in list.iter() {
            write_set(set, out, indent + INDENT_STEP);
        }
    }
}

/// Decode a document. Never fails; see the module docs for how malformed
/// input is treated.
pub fn decode(text: &str) -> StorageSet {
    Parser::new(text).parse_set(0).unwrap_or_default()
}

/// Decode from a byte source. Invalid UTF-8 is replaced, not rejected.
pub fn decode_from<R: Read>(mut r: R) -> Result<StorageSet, StorageError> {
    let mut bytes = Vec::new();
    r.read_to_end(&mut bytes)?;
    Ok(decode(&String::from_utf8_lossy(&bytes)))
}

pub fn read_file(path: impl AsRef<Path>) -> Result<StorageSet, StorageError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| StorageError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "read document");
    Ok(decode(&String::from_utf8_lossy(&bytes)))
}

pub fn write_file(set: &StorageSet, path: impl AsRef<Path>) -> Result<(), StorageError> {
    let path = path.as_ref();
    let text = encode(set);
    std::fs::write(path, &text).map_err(|source| StorageError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), bytes = text.len(), "wrote document");
    Ok(())
}

/// Read a document, logging and returning `None` if the file cannot be read.
pub fn load(path: impl AsRef<Path>) -> Option<StorageSet> {
    match read_file(path) {
        Ok(set) => Some(set),
        Err(error) => {
            tracing::warn!(%error, "document not loaded");
            None
        }
    }
}

/// Write a document, logging and otherwise ignoring a failure.
pub fn save(set: &StorageSet, path: impl AsRef<Path>) {
    if let Err(error) = write_file(set, path) {
        tracing::warn!(%error, "document not saved");
    }
}

fn has_indent(line: &str, indent: usize) -> bool {
    line.len() >= indent && line.as_bytes()[..indent].iter().all(|&b| b == b' ')
}

fn is_blank_line(line: &str) -> bool {
    line.trim().is_empty()
}

struct Parser<'a> {
    lines: Vec<&'a str>,
    pos: usize,
}

impl<'a> Parser<'a> {
    // Lines end at '\n' only; a '\r' before it is part of the line.
    fn new(text: &'a str) -> Self {
        let mut lines: Vec<&'a str> = text.split('\n').collect();
        if lines.last() == Some(&"") {
            lines.pop();
        }
        Self { lines, pos: 0 }
    }

    fn peek(&self) -> Option<&'a str> {
        self.lines.get(self.pos).copied()
    }

    // Returns `None` when no line at this indentation remains, which is how
    // a list learns it has run out of members.
    fn parse_set(&mut self, indent: usize) -> Option<StorageSet> {
        let mut set = StorageSet::new();
        let mut opened = false;

        while let Some(line) = self.peek() {
            if is_blank_line(line) {
                self.pos += 1;
                continue;
            }
            if !has_indent(line, indent) {
                break;
            }
            opened = true;
            self.pos += 1;

            let body = &line[indent..];
            if body.starts_with(SET_MARKER) {
                break;
            }
            let Some((key, rest)) = body.split_once(':') else {
                tracing::warn!(line = self.pos, "skipping line without a key separator");
                continue;
            };
            let key = key.trim();
            let mut payload = rest.chars();
            match payload.next() {
                Some(TYPELESS_MARKER) => set.store_string(key, payload.as_str()),
                Some(STRING_MARKER) => {
                    let s = self.parse_string(indent + INDENT_STEP);
                    set.store_string(key, &s);
                }
                Some(SET_MARKER) => {
                    let nested = self.parse_set(indent + INDENT_STEP).unwrap_or_default();
                    set.store_set(key, nested);
                }
                Some(LIST_MARKER) => {
                    let list = self.parse_list(indent + INDENT_STEP);
                    set.store_list(key, list);
                }
                marker => {
                    tracing::warn!(
                        line = self.pos,
                        key,
                        ?marker,
                        "skipping entry with unknown marker"
                    );
                }
            }
        }

        opened.then_some(set)
    }

    fn parse_list(&mut self, indent: usize) -> StorageSetList {
        let mut list = StorageSetList::new();
        while let Some(set) = self.parse_set(indent) {
            list.put(set);
        }
        list
    }

    // Consumes every line indented at least `indent`. Blank lines are kept
    // only when the string continues after them.
    fn parse_string(&mut self, indent: usize) -> String {
        let mut out = String::new();
        let mut pending_blank = 0;
        while let Some(line) = self.peek() {
            if has_indent(line, indent) {
                for _ in 0..pending_blank {
                    out.push('\n');
                }
                pending_blank = 0;
                out.push_str(&line[indent..]);
                out.push('\n');
            } else if is_blank_line(line) {
                pending_blank += 1;
            } else {
                break;
            }
            self.pos += 1;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Invariant: entries are written in first-insertion order with keys
    /// padded to the longest key, and every set is terminated.
    #[test]
    fn writes_padded_keys_in_order() {
        let mut doc = StorageSet::new();
        doc.store_string("name", "Bob");
        doc.store_int("hp", 10);
        doc.read_set("stats").store_int("str", 18);
        let text = encode(&doc);
        assert_eq!(text, "name : Bob\nhp   : 10\nstats:-\n  str: 18\n  -\n-\n");
    }

    /// Invariant: blank values are omitted entirely.
    #[test]
    fn blank_values_are_omitted() {
        let mut doc = StorageSet::new();
        doc.store_string("empty", "");
        doc.read_set("nested");
        doc.read_list("list").put(StorageSet::new());
        doc.store_string("kept", "x");
        // padding still follows the longest key ever stored
        assert_eq!(encode(&doc), "kept  : x\n-\n");
    }

    /// Invariant: multi-line strings are written one level deeper, blank
    /// lines included, and decode with a newline after every line.
    #[test]
    fn multi_line_string_layout() {
        let mut doc = StorageSet::new();
        doc.store_string("desc", "line one\n\n  indented: yes\n");
        let text = encode(&doc);
        assert_eq!(text, "desc:~\n  line one\n  \n    indented: yes\n-\n");
        assert_eq!(decode(&text).read_string("desc"), "line one\n\n  indented: yes\n");

        doc.store_string("desc", "no trailing\nnewline");
        assert_eq!(decode(&encode(&doc)).read_string("desc"), "no trailing\nnewline\n");
    }

    /// Invariant: a list writes all of its sets, blank ones as a bare
    /// terminator, and reads them back in order.
    #[test]
    fn list_keeps_blank_members() {
        let mut doc = StorageSet::new();
        let list = doc.read_list("items");
        list.put(StorageSet::new());
        let mut s = StorageSet::new();
        s.store_string("k", "v");
        list.put(s);
        let text = encode(&doc);
        assert_eq!(text, "items:=\n  -\n  k: v\n  -\n-\n");

        let back = decode(&text);
        let items = back
            .get_list("items")
            .map(|l| l.iter().map(StorageSet::len).collect::<Vec<_>>());
        assert_eq!(items, Some(vec![0, 1]));
    }

    /// Invariant: a truncated stream closes every open set.
    #[test]
    fn truncated_input_is_closed() {
        let doc = decode("a: 1\nb:-\n  c:=\n    d: 2\n");
        assert_eq!(doc.read_string("a"), "1");
        let b = doc.get_set("b").map(|b| b.get_list("c").map(StorageSetList::len));
        assert_eq!(b, Some(Some(1)));
        assert_eq!(decode(""), StorageSet::new());
    }

    /// Invariant: a multi-line string cut off by end of input keeps the
    /// lines read so far, and earlier keys survive.
    #[test]
    fn truncated_multi_line_string_is_closed() {
        let doc = decode("k: v\na:~\n  line one\n  line two");
        assert_eq!(doc.read_string("a"), "line one\nline two\n");
        assert_eq!(doc.read_string("k"), "v");
        assert_eq!(doc.keys(), vec!["k", "a"]);
    }

    /// Invariant: lines end at '\n' only, so carriage returns inside or at
    /// the end of a value are kept.
    #[test]
    fn carriage_returns_survive() {
        let mut doc = StorageSet::new();
        doc.store_string("a", "ends with cr\r");
        doc.store_string("b", "one\r\ntwo\r\n");
        doc.read_set("n").store_string("c", "\r");
        let back = decode(&encode(&doc));
        assert_eq!(back.read_string("a"), "ends with cr\r");
        assert_eq!(back.read_string("b"), "one\r\ntwo\r\n");
        assert_eq!(back.get_set("n").map(|n| n.read_string("c")), Some("\r"));
        assert_eq!(back, doc);
    }

    /// Invariant: a key starting with the set terminator ends its set on
    /// read, so the entries after it are lost.
    #[test]
    fn dash_key_ends_the_set() {
        let mut doc = StorageSet::new();
        doc.store_string("a", "1");
        doc.store_string("-x", "2");
        doc.store_string("b", "3");
        let text = encode(&doc);
        assert_eq!(text, "a : 1\n-x: 2\nb : 3\n-\n");
        assert_eq!(decode(&text).keys(), vec!["a"]);
    }

    /// Invariant: unknown markers and separator-less lines are skipped and
    /// the rest of the document still parses.
    #[test]
    fn malformed_lines_are_skipped() {
        let doc = decode("a: 1\ngarbage\nb:?what\n\nc: 3\n-\n");
        assert_eq!(doc.keys(), vec!["a", "c"]);
    }

    /// Invariant: string payloads keep colons and surrounding spaces; keys
    /// are trimmed.
    #[test]
    fn payload_is_taken_verbatim() {
        let doc = decode("url   : http://x:80/  \n-\n");
        assert_eq!(doc.read_string("url"), "http://x:80/  ");
    }

    /// Invariant: content after the top-level terminator is ignored.
    #[test]
    fn stops_at_terminator() {
        let doc = decode("a: 1\n-\nb: 2\n");
        assert_eq!(doc.keys(), vec!["a"]);
    }
}
