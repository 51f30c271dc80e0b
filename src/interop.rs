//! Capability seams between the ordering/unraveling machinery and a corpus.
//!
//! [`NodeOrder`](crate::order::NodeOrder) and
//! [`Unraveler`](crate::unravel::Unraveler) never touch corpus storage
//! directly. They ask for node types and slot sets through [`NodeTypes`] and
//! for structural neighbourhoods through [`Locality`], so any store that can
//! answer those questions can be ordered and unraveled.

use std::collections::BTreeMap;

/// Node number, `1..=max_node`.
pub type Node = u32;

/// Slot number, `1..=max_slot`. Slots are the first nodes.
pub type Slot = u32;

/// Type and extent of nodes.
pub trait NodeTypes {
    /// Type name of `node`, `None` when the node does not exist.
    fn type_of(&self, node: Node) -> Option<&str>;

    /// Ascending slot set of `node`; empty when the node does not exist.
    fn slots_of(&self, node: Node) -> &[Slot];
}

/// Structural neighbourhood queries.
pub trait Locality {
    /// Nodes of any type whose slots intersect those of `node`, slots
    /// included, `node` excluded.
    fn descendants_of(&self, node: Node) -> Vec<Node>;

    /// Nodes of `node_type` whose extent contains `slot`.
    fn ancestors_of(&self, slot: Slot, node_type: &str) -> Vec<Node>;
}

impl<T: NodeTypes + ?Sized> NodeTypes for &T {
    fn type_of(&self, node: Node) -> Option<&str> {
        (**self).type_of(node)
    }

    fn slots_of(&self, node: Node) -> &[Slot] {
        (**self).slots_of(node)
    }
}

impl<T: Locality + ?Sized> Locality for &T {
    fn descendants_of(&self, node: Node) -> Vec<Node> {
        (**self).descendants_of(node)
    }

    fn ancestors_of(&self, slot: Slot, node_type: &str) -> Vec<Node> {
        (**self).ancestors_of(slot, node_type)
    }
}

/// A plain map `node -> (type, slots)` is enough to order nodes.
impl NodeTypes for BTreeMap<Node, (String, Vec<Slot>)> {
    fn type_of(&self, node: Node) -> Option<&str> {
        self.get(&node).map(|(tp, _)| tp.as_str())
    }

    fn slots_of(&self, node: Node) -> &[Slot] {
        self.get(&node).map_or(&[], |(_, slots)| slots.as_slice())
    }
}

/// Maximal runs of consecutive slots in an ascending slot list, as
/// inclusive `(first, last)` pairs.
pub fn slot_runs(slots: &[Slot]) -> Vec<(Slot, Slot)> {
    let mut runs: Vec<(Slot, Slot)> = Vec::new();
    for &s in slots {
        match runs.last_mut() {
            Some((_, last)) if last.checked_add(1) == Some(s) => *last = s,
            _ => runs.push((s, s)),
        }
    }
    runs
}

/// Every slot of `inner` occurs in `outer`; both ascending.
pub fn is_subset(inner: &[Slot], outer: &[Slot]) -> bool {
    if inner.len() > outer.len() {
        return false;
    }
    let mut rest = outer;
    for s in inner {
        match rest.binary_search(s) {
            Ok(i) => rest = &rest[i + 1..],
            Err(_) => return false,
        }
    }
    true
}
