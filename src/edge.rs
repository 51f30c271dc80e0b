//! Edge features stored as adjacency arrays.
//!
//! An [`EdgeColumn`] keeps, for every node, the ascending list of nodes it
//! points to, plus a precomputed inverse so that incoming edges are a slice
//! lookup as well. Valued edges carry a [`FeatureColumn`] keyed by edge
//! position (`1 + index into the forward target list`).

use crate::column::{Encoding, FeatureColumn, IntColumn, StrColumn, Value};
use crate::error::{FabricError, Result};
use crate::interop::Node;
use crate::width::IntBuffer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeColumn {
    max_node: Node,
    /// Targets of node `n` are `targets[starts[n - 1]..starts[n]]`.
    starts: IntBuffer,
    targets: Vec<Node>,
    inv_starts: IntBuffer,
    inv_sources: Vec<Node>,
    /// Forward position of each inverse entry, for value lookups.
    inv_positions: IntBuffer,
    values: Option<FeatureColumn>,
}

/// Cumulative counts: entry `n` is the number of keys `<= n`.
fn cumulative(max_node: Node, keys: impl Iterator<Item = Node>) -> Vec<i64> {
    let mut starts = vec![0i64; max_node as usize + 1];
    for k in keys {
        starts[k as usize] += 1;
    }
    for i in 1..starts.len() {
        starts[i] += starts[i - 1];
    }
    starts
}

#[inline]
fn range_of(starts: &IntBuffer, node: Node) -> Range<usize> {
    if node == 0 {
        return 0..0;
    }
    match (starts.get(node as usize - 1), starts.get(node as usize)) {
        (Some(s), Some(e)) => s as usize..e as usize,
        _ => 0..0,
    }
}

impl EdgeColumn {
    /// Build a value-less edge relation over nodes `1..=max_node`.
    ///
    /// Duplicate pairs collapse into one edge.
    pub fn build<I>(max_node: Node, edges: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Node, Node)>,
    {
        let edges = edges.into_iter().map(|(f, t)| (f, t, ())).collect();
        let (column, _) = Self::topology(max_node, edges)?;
        Ok(column)
    }

    /// Build an edge relation with integer values. The first value given for
    /// a pair wins.
    pub fn build_int<I>(max_node: Node, edges: I, encoding: Encoding) -> Result<Self>
    where
        I: IntoIterator<Item = (Node, Node, i64)>,
    {
        let (mut column, values) = Self::topology(max_node, edges.into_iter().collect())?;
        let keyed = values.into_iter().enumerate().map(|(i, v)| (i as u32 + 1, v));
        column.values = Some(IntColumn::build(keyed, encoding)?.into());
        Ok(column)
    }

    /// Build an edge relation with string values. The first value given for
    /// a pair wins.
    pub fn build_str<I, S>(max_node: Node, edges: I, encoding: Encoding) -> Result<Self>
    where
        I: IntoIterator<Item = (Node, Node, S)>,
        S: AsRef<str>,
    {
        let (mut column, values) = Self::topology(max_node, edges.into_iter().collect())?;
        let keyed = values.into_iter().enumerate().map(|(i, v)| (i as u32 + 1, v));
        column.values = Some(StrColumn::build(keyed, encoding)?.into());
        Ok(column)
    }

    /// Sort, deduplicate and index the edges; returns the per-edge values in
    /// forward order.
    fn topology<V>(max_node: Node, mut edges: Vec<(Node, Node, V)>) -> Result<(Self, Vec<V>)> {
        if let Some(&(f, t, _)) = edges
            .iter()
            .find(|(f, t, _)| *f == 0 || *t == 0 || *f > max_node || *t > max_node)
        {
            return Err(FabricError::InvalidCorpus(format!(
                "edge {f} -> {t} outside node range 1..={max_node}"
            )));
        }

        edges.sort_by_key(|&(f, t, _)| (f, t));
        edges.dedup_by(|b, a| a.0 == b.0 && a.1 == b.1);

        let starts = cumulative(max_node, edges.iter().map(|e| e.0));
        let inv_starts = cumulative(max_node, edges.iter().map(|e| e.1));

        let mut inv_sources = vec![0 as Node; edges.len()];
        let mut inv_positions = vec![0i64; edges.len()];
        let mut cursor: Vec<i64> = inv_starts[..max_node as usize].to_vec();
        for (pos, &(f, t, _)) in edges.iter().enumerate() {
            let slot = &mut cursor[t as usize - 1];
            inv_sources[*slot as usize] = f;
            inv_positions[*slot as usize] = pos as i64;
            *slot += 1;
        }

        let mut targets = Vec::with_capacity(edges.len());
        let mut values = Vec::with_capacity(edges.len());
        for (_, t, v) in edges {
            targets.push(t);
            values.push(v);
        }

        tracing::debug!(max_node, edges = targets.len(), "built edge column");

        let column = EdgeColumn {
            max_node,
            starts: IntBuffer::from_values(&starts)?,
            targets,
            inv_starts: IntBuffer::from_values(&inv_starts)?,
            inv_sources,
            inv_positions: IntBuffer::from_values(&inv_positions)?,
            values: None,
        };
        Ok((column, values))
    }

    /// Ascending targets of outgoing edges.
    #[inline]
    pub fn from(&self, node: Node) -> &[Node] {
        self.targets
            .get(range_of(&self.starts, node))
            .unwrap_or(&[])
    }

    /// Ascending sources of incoming edges.
    #[inline]
    pub fn to(&self, node: Node) -> &[Node] {
        self.inv_sources
            .get(range_of(&self.inv_starts, node))
            .unwrap_or(&[])
    }

    /// Neighbours in either direction, ascending and without repeats.
    pub fn both(&self, node: Node) -> Vec<Node> {
        let mut nodes: Vec<Node> = self.from(node).iter().chain(self.to(node)).copied().collect();
        nodes.sort_unstable();
        nodes.dedup();
        nodes
    }

    pub fn has_values(&self) -> bool {
        self.values.is_some()
    }

    pub fn values(&self) -> Option<&FeatureColumn> {
        self.values.as_ref()
    }

    /// Value carried by the edge `from -> to`.
    pub fn value(&self, from: Node, to: Node) -> Option<Value<'_>> {
        let values = self.values.as_ref()?;
        let range = range_of(&self.starts, from);
        let pos = self.targets.get(range.clone())?.binary_search(&to).ok()? + range.start;
        values.get(pos as u32 + 1)
    }

    /// Outgoing edges with their values; `None` where an edge carries none.
    pub fn from_values(&self, node: Node) -> Vec<(Node, Option<Value<'_>>)> {
        let range = range_of(&self.starts, node);
        let start = range.start;
        self.from(node)
            .iter()
            .enumerate()
            .map(|(i, &t)| (t, self.value_at(start + i)))
            .collect()
    }

    /// Incoming edges with their values.
    pub fn to_values(&self, node: Node) -> Vec<(Node, Option<Value<'_>>)> {
        let range = range_of(&self.inv_starts, node);
        self.to(node)
            .iter()
            .zip(range)
            .map(|(&s, i)| {
                let value = self
                    .inv_positions
                    .get(i)
                    .and_then(|pos| self.value_at(pos as usize));
                (s, value)
            })
            .collect()
    }

    /// Edges in either direction; where a node is both source and target
    /// the outgoing value is reported.
    pub fn both_values(&self, node: Node) -> Vec<(Node, Option<Value<'_>>)> {
        let mut merged: BTreeMap<Node, Option<Value<'_>>> =
            self.to_values(node).into_iter().collect();
        merged.extend(self.from_values(node));
        merged.into_iter().collect()
    }

    #[inline]
    fn value_at(&self, pos: usize) -> Option<Value<'_>> {
        self.values.as_ref()?.get(pos as u32 + 1)
    }

    pub fn edge_count(&self) -> usize {
        self.targets.len()
    }

    pub fn max_node(&self) -> Node {
        self.max_node
    }

    /// Nodes with at least one outgoing edge, ascending.
    pub fn sources(&self) -> impl Iterator<Item = Node> + '_ {
        (1..=self.max_node).filter(move |&n| !range_of(&self.starts, n).is_empty())
    }
}
