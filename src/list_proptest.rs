#![cfg(test)]

// Model-based tests for List and its cursors, kept inside the crate so the
// model can mirror the physical chain (tombstones included).

use crate::list::{Cursor, List};
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    Put(u8),
    Queue(u8),
    Pop,
    Remove(u8),
    RemoveAt(usize),
    Open,
    Next(usize),
    Close(usize),
    Sort,
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    let val = 0u8..12;
    let op = prop_oneof![
        val.clone().prop_map(Op::Put),
        val.clone().prop_map(Op::Queue),
        Just(Op::Pop),
        val.prop_map(Op::Remove),
        (0usize..8).prop_map(Op::RemoveAt),
        Just(Op::Open),
        (0usize..4).prop_map(Op::Next),
        (0usize..4).prop_map(Op::Close),
        Just(Op::Sort),
    ];
    proptest::collection::vec(op, 1..80)
}

struct Node {
    id: u64,
    val: u8,
    alive: bool,
}

// Physical chain in order, tombstones included.
#[derive(Default)]
struct Model {
    nodes: Vec<Node>,
    next_id: u64,
    open: usize,
}

struct CursorModel {
    started: bool,
    at: Option<u64>,
}

impl Model {
    fn live(&self) -> Vec<u8> {
        self.nodes.iter().filter(|n| n.alive).map(|n| n.val).collect()
    }

    fn insert(&mut self, val: u8, front: bool) -> bool {
        if self.nodes.iter().any(|n| n.alive && n.val == val) {
            return false;
        }
        let node = Node {
            id: self.next_id,
            val,
            alive: true,
        };
        self.next_id += 1;
        if front {
            self.nodes.insert(0, node);
        } else {
            self.nodes.push(node);
        }
        true
    }

    fn kill(&mut self, idx: usize) -> u8 {
        if self.open > 0 {
            self.nodes[idx].alive = false;
            self.nodes[idx].val
        } else {
            self.nodes.remove(idx).val
        }
    }

    fn remove_val(&mut self, val: u8) -> bool {
        match self.nodes.iter().position(|n| n.alive && n.val == val) {
            Some(idx) => {
                self.kill(idx);
                true
            }
            None => false,
        }
    }

    fn remove_at(&mut self, n: usize) -> Option<u8> {
        let idx = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.alive)
            .nth(n)
            .map(|(i, _)| i)?;
        Some(self.kill(idx))
    }

    fn close(&mut self) {
        self.open -= 1;
        if self.open == 0 {
            self.nodes.retain(|n| n.alive);
        }
    }

    fn sort(&mut self) {
        let (mut live, dead): (Vec<Node>, Vec<Node>) = self.nodes.drain(..).partition(|n| n.alive);
        live.sort_by_key(|n| n.val);
        live.extend(dead);
        self.nodes = live;
    }

    fn next(&self, c: &mut CursorModel) -> Option<u8> {
        let start = match (c.started, c.at) {
            (false, _) => 0,
            (true, Some(id)) => self.nodes.iter().position(|n| n.id == id)? + 1,
            (true, None) => return None,
        };
        c.started = true;
        let found = self.nodes[start..].iter().find(|n| n.alive)?;
        c.at = Some(found.id);
        Some(found.val)
    }
}

// Property: List plus any number of open cursors behaves like the model.
// Invariants exercised across random operation sequences:
// - Visible contents and length match after every operation.
// - Removals under open cursors keep nodes allocated until the last cursor
//   closes; the physical length tracks the model's chain.
// - Each cursor yields exactly the next live element after the one it last
//   yielded, even if that element has since been removed.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_list_cursor_model(ops in arb_ops()) {
        let list: List<u8> = List::new();
        let mut model = Model::default();
        let mut cursors: Vec<(Cursor<u8>, CursorModel)> = Vec::new();

        for op in ops {
            match op {
                Op::Put(v) => prop_assert_eq!(list.put(v), model.insert(v, true)),
                Op::Queue(v) => prop_assert_eq!(list.queue(v), model.insert(v, false)),
                Op::Pop => prop_assert_eq!(list.pop(), model.remove_at(0)),
                Op::Remove(v) => prop_assert_eq!(list.remove(&v), model.remove_val(v)),
                Op::RemoveAt(n) => prop_assert_eq!(list.remove_at(n), model.remove_at(n)),
                Op::Open => {
                    cursors.push((list.cursor(), CursorModel { started: false, at: None }));
                    model.open += 1;
                }
                Op::Next(i) => {
                    if !cursors.is_empty() {
                        let idx = i % cursors.len();
                        let (cursor, cm) = &mut cursors[idx];
                        let expected = model.next(cm);
                        prop_assert_eq!(cursor.next(), expected);
                    }
                }
                Op::Close(i) => {
                    if !cursors.is_empty() {
                        let idx = i % cursors.len();
                        drop(cursors.remove(idx));
                        model.close();
                    }
                }
                Op::Sort => {
                    list.sort_with(|a, b| a.cmp(b));
                    model.sort();
                }
            }
            prop_assert_eq!(list.to_vec(), model.live());
            prop_assert_eq!(list.len(), model.live().len());
            prop_assert_eq!(list.physical_len(), model.nodes.len());
        }

        while let Some((cursor, _)) = cursors.pop() {
            drop(cursor);
            model.close();
        }
        prop_assert_eq!(list.physical_len(), list.len());
        prop_assert_eq!(list.to_vec(), model.live());
    }
}
