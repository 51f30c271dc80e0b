//! The canonical node order.
//!
//! Nodes are ordered by where their extent starts; a node that embeds
//! another one comes before it; among nodes starting at the same slot, the
//! more comprehensive type comes first, then the one reaching further. The
//! order is total: node numbers break remaining ties.
//!
//! # Example
//!
//! ```
//! use corpus_fabric::order::NodeOrder;
//! use std::collections::BTreeMap;
//!
//! let mut nodes: BTreeMap<u32, (String, Vec<u32>)> = BTreeMap::new();
//! nodes.insert(1, ("word".to_string(), vec![1]));
//! nodes.insert(2, ("word".to_string(), vec![2]));
//! nodes.insert(3, ("phrase".to_string(), vec![1, 2]));
//!
//! let vocabulary = vec!["phrase".to_string(), "word".to_string()];
//! let order = NodeOrder::build(&vocabulary, &nodes, 3);
//! assert_eq!(order.sort_nodes([2, 1, 3]), vec![3, 1, 2]);
//! ```

use crate::interop::{Node, NodeTypes, Slot};
use crate::width::IntBuffer;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

/// One contiguous run of a node's slots, `begin..=end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Chunk {
    pub node: Node,
    pub begin: Slot,
    pub end: Slot,
}

impl Chunk {
    pub fn new(node: Node, begin: Slot, end: Slot) -> Self {
        debug_assert!(begin <= end);
        Chunk { node, begin, end }
    }

    /// Number of slots covered.
    #[inline]
    pub fn len(&self) -> u32 {
        self.end - self.begin + 1
    }

    #[inline]
    pub fn contains_slot(&self, slot: Slot) -> bool {
        self.begin <= slot && slot <= self.end
    }

    /// `other` lies inside `self`.
    #[inline]
    pub fn covers(&self, other: &Chunk) -> bool {
        self.begin <= other.begin && other.end <= self.end
    }

    #[inline]
    pub fn overlaps(&self, other: &Chunk) -> bool {
        self.begin <= other.end && other.begin <= self.end
    }
}

/// Position order key of a chunk: earlier begin, higher rank, larger end,
/// smaller node.
pub type ChunkPositionKey = (Slot, Reverse<u32>, Reverse<Slot>, Node);

/// Length order key of a chunk: longer range, earlier begin, lower rank,
/// smaller node.
pub type ChunkLengthKey = (Reverse<u32>, Slot, u32, Node);

/// Precomputed canonical order plus the type ranks it was derived from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeOrder {
    /// Most comprehensive first.
    vocabulary: Vec<String>,
    type_rank: BTreeMap<String, u32>,
    /// Rank of node `n` at `n - 1`.
    node_rank: IntBuffer,
    /// Nodes in canonical order.
    sequence: IntBuffer,
    /// Canonical index of node `n` at `n - 1`.
    position: IntBuffer,
}

impl NodeOrder {
    /// Build the order for nodes `1..=max_node`.
    ///
    /// `vocabulary` lists the node types from most to least comprehensive,
    /// the slot type last. A type missing from it is ranked above every
    /// known type and reported once.
    pub fn build<T: NodeTypes>(vocabulary: &[String], types: &T, max_node: Node) -> Self {
        let n_types = vocabulary.len() as u32;
        let type_rank: BTreeMap<String, u32> = vocabulary
            .iter()
            .enumerate()
            .map(|(i, tp)| (tp.clone(), n_types - 1 - i as u32))
            .collect();

        let mut unknown: BTreeSet<&str> = BTreeSet::new();
        let mut node_rank: Vec<u32> = Vec::with_capacity(max_node as usize);
        let mut keys: Vec<(Slot, Reverse<u32>, Reverse<Slot>, Reverse<usize>, Node)> =
            Vec::with_capacity(max_node as usize);

        for node in 1..=max_node {
            let rank = match types.type_of(node) {
                Some(tp) => match type_rank.get(tp) {
                    Some(&r) => r,
                    None => {
                        if unknown.insert(tp) {
                            tracing::warn!(
                                node_type = tp,
                                "node type missing from the level vocabulary, ranking it highest"
                            );
                        }
                        n_types
                    }
                },
                None => n_types,
            };
            node_rank.push(rank);

            let slots = types.slots_of(node);
            let first = slots.first().copied().unwrap_or(Slot::MAX);
            let last = slots.last().copied().unwrap_or(Slot::MAX);
            keys.push((first, Reverse(rank), Reverse(last), Reverse(slots.len()), node));
        }
        keys.sort_unstable();

        let sequence: Vec<u32> = keys.iter().map(|k| k.4).collect();
        let mut position = vec![0u32; max_node as usize];
        for (i, &node) in sequence.iter().enumerate() {
            position[node as usize - 1] = i as u32;
        }

        tracing::debug!(
            max_node,
            types = n_types,
            unknown = unknown.len(),
            "built canonical node order"
        );

        NodeOrder {
            vocabulary: vocabulary.to_vec(),
            type_rank,
            node_rank: IntBuffer::from_unsigned(&node_rank),
            sequence: IntBuffer::from_unsigned(&sequence),
            position: IntBuffer::from_unsigned(&position),
        }
    }

    /// Node types, most comprehensive first.
    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    /// Rank of a type: 0 for the slot type, higher for more comprehensive.
    pub fn rank(&self, node_type: &str) -> Option<u32> {
        self.type_rank.get(node_type).copied()
    }

    /// Rank of the type of `node`; unknown nodes rank above every type.
    #[inline]
    pub fn rank_of(&self, node: Node) -> u32 {
        node.checked_sub(1)
            .and_then(|i| self.node_rank.get(i as usize))
            .map_or(self.vocabulary.len() as u32, |r| r as u32)
    }

    pub fn max_node(&self) -> Node {
        self.sequence.len() as Node
    }

    /// Position of `node` in the canonical order.
    #[inline]
    pub fn canonical_index(&self, node: Node) -> Option<u32> {
        let i = node.checked_sub(1)?;
        self.position.get(i as usize).map(|p| p as u32)
    }

    /// Sort key of a node; nodes outside the corpus sort last.
    #[inline]
    pub fn sort_key(&self, node: Node) -> u32 {
        self.canonical_index(node).unwrap_or(u32::MAX)
    }

    /// The nodes of `nodes` in canonical order, without repeats.
    pub fn sort_nodes<I>(&self, nodes: I) -> Vec<Node>
    where
        I: IntoIterator<Item = Node>,
    {
        let mut nodes: Vec<Node> = nodes.into_iter().collect();
        nodes.sort_unstable_by_key(|&n| (self.sort_key(n), n));
        nodes.dedup();
        nodes
    }

    /// Element-wise sort key of a node tuple, for ordering search results.
    pub fn sort_key_tuple(&self, nodes: &[Node]) -> Vec<u32> {
        nodes.iter().map(|&n| self.sort_key(n)).collect()
    }

    pub fn sort_key_chunk(&self, chunk: &Chunk) -> ChunkPositionKey {
        (
            chunk.begin,
            Reverse(self.rank_of(chunk.node)),
            Reverse(chunk.end),
            chunk.node,
        )
    }

    pub fn sort_key_chunk_length(&self, chunk: &Chunk) -> ChunkLengthKey {
        (
            Reverse(chunk.end - chunk.begin),
            chunk.begin,
            self.rank_of(chunk.node),
            chunk.node,
        )
    }

    /// All nodes in canonical order.
    pub fn walk(&self) -> impl Iterator<Item = Node> + '_ {
        self.sequence.iter().map(|n| n as Node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Nodes = BTreeMap<Node, (String, Vec<Slot>)>;

    fn corpus() -> (Vec<String>, Nodes) {
        let mut nodes = Nodes::new();
        for s in 1..=4 {
            nodes.insert(s, ("word".into(), vec![s]));
        }
        nodes.insert(5, ("sentence".into(), vec![1, 2, 3, 4]));
        nodes.insert(6, ("phrase".into(), vec![1, 2]));
        nodes.insert(7, ("phrase".into(), vec![3, 4]));
        nodes.insert(8, ("phrase".into(), vec![1, 2, 3]));
        let vocabulary = ["sentence", "phrase", "word"].map(String::from).to_vec();
        (vocabulary, nodes)
    }

    #[test]
    fn test_ranks() {
        let (vocabulary, nodes) = corpus();
        let order = NodeOrder::build(&vocabulary, &nodes, 8);
        assert_eq!(order.rank("word"), Some(0));
        assert_eq!(order.rank("phrase"), Some(1));
        assert_eq!(order.rank("sentence"), Some(2));
        assert_eq!(order.rank("book"), None);
        assert_eq!(order.rank_of(5), 2);
        assert_eq!(order.rank_of(0), 3);
    }

    #[test]
    fn test_canonical_walk() {
        let (vocabulary, nodes) = corpus();
        let order = NodeOrder::build(&vocabulary, &nodes, 8);
        // 5 embeds everything; among phrases at slot 1 the longer comes first
        assert_eq!(order.walk().collect::<Vec<_>>(), vec![5, 8, 6, 1, 2, 7, 3, 4]);
        assert_eq!(order.canonical_index(5), Some(0));
        assert_eq!(order.canonical_index(9), None);
        assert_eq!(order.sort_key(9), u32::MAX);
    }

    #[test]
    fn test_sort_nodes_and_tuples() {
        let (vocabulary, nodes) = corpus();
        let order = NodeOrder::build(&vocabulary, &nodes, 8);
        assert_eq!(order.sort_nodes([4, 7, 1, 4, 99]), vec![1, 7, 4, 99]);
        let mut tuples = vec![vec![3, 5], vec![7, 1], vec![5, 8]];
        tuples.sort_by_key(|t| order.sort_key_tuple(t));
        assert_eq!(tuples, vec![vec![5, 8], vec![7, 1], vec![3, 5]]);
    }

    #[test]
    fn test_unknown_type_ranks_highest() {
        let (vocabulary, mut nodes) = corpus();
        nodes.insert(9, ("book".into(), vec![2, 3]));
        let order = NodeOrder::build(&vocabulary, &nodes, 9);
        assert_eq!(order.rank_of(9), 3);
        let seq: Vec<Node> = order.walk().collect();
        let at = |n: Node| seq.iter().position(|&x| x == n).unwrap();
        assert!(at(9) < at(2));
    }

    #[test]
    fn test_chunk_keys() {
        let (vocabulary, nodes) = corpus();
        let order = NodeOrder::build(&vocabulary, &nodes, 8);
        let mut chunks = vec![
            Chunk::new(1, 1, 1),
            Chunk::new(6, 1, 2),
            Chunk::new(5, 1, 4),
            Chunk::new(7, 3, 4),
        ];
        chunks.sort_by_key(|c| order.sort_key_chunk(c));
        let got: Vec<Node> = chunks.iter().map(|c| c.node).collect();
        assert_eq!(got, vec![5, 6, 1, 7]);

        chunks.sort_by_key(|c| order.sort_key_chunk_length(c));
        let got: Vec<Node> = chunks.iter().map(|c| c.node).collect();
        assert_eq!(got, vec![5, 6, 7, 1]);
    }

    #[test]
    fn test_chunk_geometry() {
        let a = Chunk::new(1, 2, 5);
        assert_eq!(a.len(), 4);
        assert!(a.covers(&Chunk::new(2, 3, 5)));
        assert!(!a.covers(&Chunk::new(2, 3, 6)));
        assert!(a.overlaps(&Chunk::new(2, 5, 9)));
        assert!(!a.overlaps(&Chunk::new(2, 6, 9)));
    }
}
