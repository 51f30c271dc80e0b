//! Structural unraveling of a node into a tree of chunks.
//!
//! The focus node and every node that shares slots with it are cut into
//! maximal runs of consecutive slots (chunks). Chunks that cross each other
//! are split until any two chunks are either disjoint or nested; the result
//! is the tree that a display of the focus node follows.
//!
//! The steps are:
//!
//! 1. **Chunking**: each candidate node yields one chunk per slot run.
//! 2. **Clipping**: chunks are cut where they leave the focus extent.
//! 3. **Splitting**: buckets of chunks are processed from the least to the
//!    most comprehensive type. Inside a bucket the longest chunks cut the
//!    shorter ones they cross; across buckets, crossing chunks cut each
//!    other. Passes repeat until nothing crosses anymore.
//! 4. **Filtering**: only chunks that start inside the focus extent stay.
//! 5. **Assembly**: chunks in position order are hung under the innermost
//!    open chunk that still reaches far enough.

use crate::config::UnravelOptions;
use crate::error::{FabricError, Result};
use crate::interop::{is_subset, slot_runs, Locality, Node, NodeTypes, Slot};
use crate::order::{Chunk, NodeOrder};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// BOUNDARIES
// ============================================================================

/// What lies at one edge of a chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Boundary {
    /// The edge is where the node itself starts or ends.
    Node,
    /// The node continues past a gap in its slots.
    Gap,
    /// The edge was introduced by splitting.
    Split,
}

/// Boundaries of both edges of a chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundaryClass {
    pub left: Boundary,
    pub right: Boundary,
}

impl BoundaryClass {
    /// Display classes: `l`/`r` for gaps, `lno`/`rno` for splits, nothing
    /// for true node edges. Right-to-left text swaps the sides.
    pub fn css(&self, rtl: bool) -> String {
        let (l, r) = if rtl { ("r", "l") } else { ("l", "r") };
        let side = |b: Boundary, s: &str| match b {
            Boundary::Node => None,
            Boundary::Gap => Some(s.to_string()),
            Boundary::Split => Some(format!("{s}no")),
        };
        [side(self.left, l), side(self.right, r)]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Classify a chunk edge by looking it up among the runs of its node.
    /// Node edges win over gap edges; positions that are no run edge at all
    /// come from splitting.
    fn of(chunk: &Chunk, runs: &[(Slot, Slot)]) -> Self {
        let (first, last) = match (runs.first(), runs.last()) {
            (Some(f), Some(l)) => (f.0, l.1),
            _ => return BoundaryClass { left: Boundary::Split, right: Boundary::Split },
        };
        let left = if chunk.begin == first {
            Boundary::Node
        } else if runs.iter().any(|r| r.0 == chunk.begin) {
            Boundary::Gap
        } else {
            Boundary::Split
        };
        let right = if chunk.end == last {
            Boundary::Node
        } else if runs.iter().any(|r| r.1 == chunk.end) {
            Boundary::Gap
        } else {
            Boundary::Split
        };
        BoundaryClass { left, right }
    }
}

// ============================================================================
// TREE
// ============================================================================

/// Display metadata of a chunk. Never affects the shape of the tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkProps {
    pub node_type: String,
    pub rank: u32,
    pub is_slot: bool,
    pub is_base: bool,
    pub highlight: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    /// `None` for the synthetic root.
    pub chunk: Option<Chunk>,
    pub props: Option<ChunkProps>,
    pub boundary: Option<BoundaryClass>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

/// Unraveled focus node: chunks below one synthetic root at index 0.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    pub focus: Node,
    pub rtl: bool,
    nodes: Vec<TreeNode>,
}

impl Tree {
    fn bare(focus: Node, rtl: bool) -> Self {
        Tree {
            focus,
            rtl,
            nodes: vec![TreeNode {
                chunk: None,
                props: None,
                boundary: None,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    fn attach(
        &mut self,
        parent: usize,
        chunk: Chunk,
        props: ChunkProps,
        boundary: BoundaryClass,
    ) -> usize {
        let index = self.nodes.len();
        self.nodes.push(TreeNode {
            chunk: Some(chunk),
            props: Some(props),
            boundary: Some(boundary),
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(index);
        index
    }

    pub fn root(&self) -> &TreeNode {
        &self.nodes[0]
    }

    pub fn get(&self, index: usize) -> Option<&TreeNode> {
        self.nodes.get(index)
    }

    /// Number of tree nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Only the root is present.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Chunks of the children of tree node `index`.
    pub fn child_chunks(&self, index: usize) -> Vec<Chunk> {
        self.nodes
            .get(index)
            .map(|n| n.children.iter().filter_map(|&c| self.nodes[c].chunk).collect())
            .unwrap_or_default()
    }

    /// Pre-order walk yielding `(depth, node)`; the root has depth 0.
    pub fn iter(&self) -> PreOrder<'_> {
        PreOrder {
            tree: self,
            stack: vec![(0, 0)],
        }
    }

    /// All chunks in pre-order.
    pub fn chunks(&self) -> Vec<Chunk> {
        self.iter().filter_map(|(_, n)| n.chunk).collect()
    }

    /// Indented text rendering, one line per tree node.
    pub fn explain(&self) -> String {
        let mut out = String::new();
        for (depth, node) in self.iter() {
            let (Some(chunk), Some(props)) = (node.chunk, node.props.as_ref()) else {
                out.push_str(&format!("root {}\n", self.focus));
                continue;
            };
            let mut line = format!(
                "{}{} {}{} {} {{{}-{}}}",
                "  ".repeat(depth),
                depth,
                props.node_type,
                if props.is_base { "*" } else { "" },
                chunk.node,
                chunk.begin,
                chunk.end,
            );
            let cls = node.boundary.map(|b| b.css(self.rtl)).unwrap_or_default();
            if !cls.is_empty() {
                line.push(' ');
                line.push_str(&cls);
            }
            if let Some(colour) = &props.highlight {
                line.push_str(&format!(" [{colour}]"));
            }
            out.push_str(&line);
            out.push('\n');
        }
        out
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| FabricError::Encode(e.to_string()))
    }
}

pub struct PreOrder<'t> {
    tree: &'t Tree,
    stack: Vec<(usize, usize)>,
}

impl<'t> Iterator for PreOrder<'t> {
    type Item = (usize, &'t TreeNode);

    fn next(&mut self) -> Option<Self::Item> {
        let (index, depth) = self.stack.pop()?;
        let node = self.tree.nodes.get(index)?;
        self.stack
            .extend(node.children.iter().rev().map(|&c| (c, depth + 1)));
        Some((depth, node))
    }
}

// ============================================================================
// SPLITTING
// ============================================================================

/// Cut `chunk` so that a new piece starts at every cut strictly inside it.
fn cut(chunk: Chunk, cuts: &BTreeSet<Slot>) -> Vec<Chunk> {
    let mut pieces = Vec::new();
    let mut begin = chunk.begin;
    if chunk.begin < chunk.end {
        for &c in cuts.range(chunk.begin + 1..=chunk.end) {
            pieces.push(Chunk::new(chunk.node, begin, c - 1));
            begin = c;
        }
    }
    pieces.push(Chunk::new(chunk.node, begin, chunk.end));
    pieces
}

#[inline]
fn crosses(a: &Chunk, b: &Chunk) -> bool {
    a.overlaps(b) && !a.covers(b) && !b.covers(a)
}

/// Positions where a piece would start when cutting at the edges of `c`.
#[inline]
fn edges_of(c: &Chunk) -> [Slot; 2] {
    [c.begin, c.end.saturating_add(1)]
}

fn apply_cuts(bucket: &mut BTreeSet<Chunk>, cuts: BTreeMap<Chunk, BTreeSet<Slot>>) -> bool {
    let changed = !cuts.is_empty();
    for (chunk, points) in cuts {
        bucket.remove(&chunk);
        bucket.extend(cut(chunk, &points));
    }
    changed
}

/// Within one type: longer chunks cut the shorter chunks they cross.
fn split_same_type(bucket: &mut BTreeSet<Chunk>, order: &NodeOrder) -> bool {
    let mut by_length: Vec<Chunk> = bucket.iter().copied().collect();
    by_length.sort_by_key(|c| order.sort_key_chunk_length(c));

    let mut changed = false;
    for p in by_length {
        if !bucket.contains(&p) {
            continue;
        }
        let p_key = order.sort_key_chunk_length(&p);
        let mut cuts: BTreeMap<Chunk, BTreeSet<Slot>> = BTreeMap::new();
        for q in bucket.iter() {
            if crosses(q, &p) && order.sort_key_chunk_length(q) > p_key {
                cuts.entry(*q).or_default().extend(edges_of(&p));
            }
        }
        changed |= apply_cuts(bucket, cuts);
    }
    changed
}

/// Across types: crossing chunks cut each other.
fn split_across(lower: &mut BTreeSet<Chunk>, higher: &mut BTreeSet<Chunk>) -> bool {
    let mut lower_cuts: BTreeMap<Chunk, BTreeSet<Slot>> = BTreeMap::new();
    let mut higher_cuts: BTreeMap<Chunk, BTreeSet<Slot>> = BTreeMap::new();
    for q in lower.iter() {
        for p in higher.iter().filter(|p| crosses(q, p)) {
            lower_cuts.entry(*q).or_default().extend(edges_of(p));
            higher_cuts.entry(*p).or_default().extend(edges_of(q));
        }
    }
    let a = apply_cuts(lower, lower_cuts);
    let b = apply_cuts(higher, higher_cuts);
    a || b
}

/// Split until no two chunks cross. Buckets are ordered from the least to
/// the most comprehensive type. Returns the number of passes.
fn split_exhaustively(buckets: &mut [BTreeSet<Chunk>], order: &NodeOrder) -> usize {
    let mut passes = 0;
    loop {
        passes += 1;
        let mut changed = false;
        for bucket in buckets.iter_mut() {
            while split_same_type(bucket, order) {
                changed = true;
            }
        }
        for j in 1..buckets.len() {
            let (lo, hi) = buckets.split_at_mut(j);
            for lower in lo.iter_mut() {
                changed |= split_across(lower, &mut hi[0]);
            }
        }
        if !changed {
            return passes;
        }
    }
}

// ============================================================================
// UNRAVELER
// ============================================================================

/// Unravels nodes of one corpus. Cheap to construct; holds only borrows and
/// options.
pub struct Unraveler<'a, T, L> {
    types: &'a T,
    locality: &'a L,
    order: &'a NodeOrder,
    options: UnravelOptions,
}

impl<'a, T: NodeTypes, L: Locality> Unraveler<'a, T, L> {
    pub fn new(types: &'a T, locality: &'a L, order: &'a NodeOrder) -> Self {
        Unraveler {
            types,
            locality,
            order,
            options: UnravelOptions::default(),
        }
    }

    pub fn with_options(mut self, options: UnravelOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &UnravelOptions {
        &self.options
    }

    /// Unravel `focus` into a tree. A focus without slots yields a tree
    /// holding only the root.
    pub fn unravel(&self, focus: Node) -> Tree {
        let mut tree = Tree::bare(focus, self.options.rtl);
        let focus_slots = self.types.slots_of(focus);
        if focus_slots.is_empty() {
            tracing::debug!(focus, "focus node has no slots");
            return tree;
        }

        // chunking
        let mut runs: BTreeMap<Node, Vec<(Slot, Slot)>> = BTreeMap::new();
        let mut buckets: BTreeMap<(u32, String), BTreeSet<Chunk>> = BTreeMap::new();
        for node in self.candidates(focus, focus_slots) {
            let node_runs = slot_runs(self.types.slots_of(node));
            let key = (
                self.order.rank_of(node),
                self.types.type_of(node).unwrap_or_default().to_string(),
            );
            buckets
                .entry(key)
                .or_default()
                .extend(node_runs.iter().map(|&(b, e)| Chunk::new(node, b, e)));
            runs.insert(node, node_runs);
        }
        let mut buckets: Vec<BTreeSet<Chunk>> = buckets.into_values().collect();

        // clipping
        let focus_cuts: BTreeSet<Slot> = slot_runs(focus_slots)
            .into_iter()
            .flat_map(|(b, e)| [b, e.saturating_add(1)])
            .collect();
        for bucket in buckets.iter_mut() {
            let clipped: BTreeSet<Chunk> =
                bucket.iter().flat_map(|&c| cut(c, &focus_cuts)).collect();
            *bucket = clipped;
        }

        let passes = split_exhaustively(&mut buckets, self.order);

        // filtering
        let mut chunks: Vec<Chunk> = buckets
            .into_iter()
            .flatten()
            .filter(|c| focus_slots.binary_search(&c.begin).is_ok())
            .collect();
        chunks.sort_by_key(|c| self.order.sort_key_chunk(c));

        // assembly
        let mut open: Vec<usize> = Vec::new();
        for chunk in chunks {
            while let Some(&top) = open.last() {
                match tree.nodes[top].chunk {
                    Some(t) if chunk.end <= t.end => break,
                    _ => {
                        open.pop();
                    }
                }
            }
            let parent = open.last().copied().unwrap_or(0);
            let boundary = runs
                .get(&chunk.node)
                .map_or(BoundaryClass { left: Boundary::Split, right: Boundary::Split }, |r| {
                    BoundaryClass::of(&chunk, r)
                });
            let index = tree.attach(parent, chunk, self.props_of(chunk.node), boundary);
            open.push(index);
        }

        tracing::debug!(focus, chunks = tree.len() - 1, passes, "unraveled node");
        tree
    }

    /// Focus node plus its descendants, minus hidden types and, optionally,
    /// nodes of the focus type that cover the focus.
    fn candidates(&self, focus: Node, focus_slots: &[Slot]) -> BTreeSet<Node> {
        let focus_type = self.types.type_of(focus);
        let allowed = focus_type.and_then(|tp| self.options.descendant_types.get(tp));
        let mut nodes: BTreeSet<Node> = self
            .locality
            .descendants_of(focus)
            .into_iter()
            .filter(|&m| m != focus)
            .filter(|&m| {
                let tp = self.types.type_of(m);
                if tp.is_some_and(|tp| self.options.hidden_types.contains(tp)) {
                    return false;
                }
                if let Some(allowed) = allowed {
                    if !tp.is_some_and(|tp| allowed.contains(tp)) {
                        return false;
                    }
                }
                let slots = self.types.slots_of(m);
                if slots.is_empty() {
                    return false;
                }
                !(self.options.exclude_covering_same_type
                    && tp == focus_type
                    && is_subset(focus_slots, slots))
            })
            .collect();
        nodes.insert(focus);
        nodes
    }

    fn props_of(&self, node: Node) -> ChunkProps {
        let node_type = self.types.type_of(node).unwrap_or_default().to_string();
        let rank = self.order.rank_of(node);
        ChunkProps {
            is_slot: rank == 0 && !self.order.vocabulary().is_empty(),
            is_base: self.options.base_types.contains(&node_type),
            highlight: self.options.highlights.get(&node).cloned(),
            node_type,
            rank,
        }
    }
}
