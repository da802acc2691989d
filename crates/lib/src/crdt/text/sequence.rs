//! Arena-backed doubly linked sequence of character nodes.
//!
//! Slots `HEAD` and `TAIL` are permanent sentinels that never carry a node.
//! Every other occupied slot sits between them exactly once, and `by_id`
//! holds exactly the ids of the occupied slots. Freed slots are recycled.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

const HEAD: usize = 0;
const TAIL: usize = 1;

/// One inserted character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharNode {
    pub value: char,
    pub id: Uuid,
    pub timestamp: u64,
}

impl CharNode {
    pub fn new(value: char, timestamp: u64) -> Self {
        Self {
            value,
            id: Uuid::new_v4(),
            timestamp,
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    node: Option<CharNode>,
    prev: usize,
    next: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct CharSequence {
    slots: Vec<Slot>,
    free: Vec<usize>,
    by_id: HashMap<Uuid, usize>,
    len: usize,
}

impl Default for CharSequence {
    fn default() -> Self {
        Self::new()
    }
}

impl CharSequence {
    pub(crate) fn new() -> Self {
        let head = Slot {
            node: None,
            prev: HEAD,
            next: TAIL,
        };
        let tail = Slot {
            node: None,
            prev: HEAD,
            next: TAIL,
        };
        Self {
            slots: vec![head, tail],
            free: Vec::new(),
            by_id: HashMap::new(),
            len: 0,
        }
    }

    /// Rebuild a sequence holding `nodes` in the given order.
    pub(crate) fn from_nodes(nodes: impl IntoIterator<Item = CharNode>) -> Self {
        let mut seq = Self::new();
        for node in nodes {
            seq.insert_before(TAIL, node);
        }
        seq
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Slot currently holding position `index`; `index == len` yields the
    /// tail sentinel. Walks from whichever sentinel is closer.
    ///
    /// Callers must check `index <= len`.
    pub(crate) fn slot_at(&self, index: usize) -> usize {
        debug_assert!(index <= self.len);
        if index < self.len / 2 {
            let mut current = self.slots[HEAD].next;
            for _ in 0..index {
                current = self.slots[current].next;
            }
            current
        } else {
            let mut current = TAIL;
            for _ in index..self.len {
                current = self.slots[current].prev;
            }
            current
        }
    }

    /// Link `node` immediately before `target`, returning its slot.
    pub(crate) fn insert_before(&mut self, target: usize, node: CharNode) -> usize {
        let prev = self.slots[target].prev;
        let id = node.id;
        let slot = Slot {
            node: Some(node),
            prev,
            next: target,
        };
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index] = slot;
                index
            }
            None => {
                self.slots.push(slot);
                self.slots.len() - 1
            }
        };
        self.slots[prev].next = index;
        self.slots[target].prev = index;
        // An id already linked elsewhere would break the id map; drop the old link.
        if let Some(stale) = self.by_id.insert(id, index) {
            self.unlink(stale);
        }
        self.len += 1;
        index
    }

    /// Unlink the node in `slot`, returning it and the slot that followed it.
    pub(crate) fn remove(&mut self, slot: usize) -> Option<(CharNode, usize)> {
        let next = self.slots[slot].next;
        let node = self.unlink(slot)?;
        self.by_id.remove(&node.id);
        Some((node, next))
    }

    fn unlink(&mut self, slot: usize) -> Option<CharNode> {
        if slot == HEAD || slot == TAIL {
            return None;
        }
        let node = self.slots[slot].node.take()?;
        let Slot { prev, next, .. } = self.slots[slot];
        self.slots[prev].next = next;
        self.slots[next].prev = prev;
        self.free.push(slot);
        self.len -= 1;
        Some(node)
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::new();
    }

    pub(crate) fn node(&self, slot: usize) -> Option<&CharNode> {
        self.slots.get(slot).and_then(|s| s.node.as_ref())
    }

    pub(crate) fn contains(&self, id: &Uuid) -> bool {
        self.by_id.contains_key(id)
    }

    /// Nodes in reading order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &CharNode> + '_ {
        let mut current = self.slots[HEAD].next;
        std::iter::from_fn(move || {
            if current == TAIL {
                return None;
            }
            let slot = &self.slots[current];
            current = slot.next;
            slot.node.as_ref()
        })
    }

    pub(crate) fn nodes(&self) -> Vec<CharNode> {
        self.iter().cloned().collect()
    }
}

impl std::fmt::Display for CharSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use std::fmt::Write;
        for node in self.iter() {
            f.write_char(node.value)?;
        }
        Ok(())
    }
}
