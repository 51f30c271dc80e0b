//! An assembled corpus: node types, slot sets, features and the derived
//! order, queried through [`NodeTypes`] and [`Locality`].
//!
//! # Example
//!
//! ```
//! use corpus_fabric::{CorpusBuilder, FabricConfig};
//!
//! let mut builder = CorpusBuilder::new("word", 4);
//! let phrase = builder.add_node("phrase", [1, 2]);
//! let sentence = builder.add_node("sentence", [1, 2, 3, 4]);
//! builder.str_feature("text", 1, "In");
//! let corpus = builder.build(&FabricConfig::default()).unwrap();
//!
//! assert_eq!(corpus.embedders_of(1), vec![sentence, phrase]);
//! let tree = corpus.unravel(sentence);
//! assert_eq!(tree.chunks().len(), 6);
//! ```

use crate::column::{Encoding, FeatureColumn, IntColumn, StrColumn};
use crate::config::{FabricConfig, UnravelOptions};
use crate::edge::EdgeColumn;
use crate::error::{FabricError, Result};
use crate::interop::{is_subset, Locality, Node, NodeTypes, Slot};
use crate::levels::{compute_levels, Level};
use crate::order::NodeOrder;
use crate::unravel::{Tree, Unraveler};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The persistent part of a corpus. Everything else is derived on load.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CorpusData {
    pub slot_type: String,
    pub max_slot: Slot,
    pub max_node: Node,
    /// Types of non-slot nodes, keyed by `node - max_slot`.
    pub otype: StrColumn,
    /// Slots of non-slot nodes.
    pub oslots: EdgeColumn,
    /// Most comprehensive first, slot type last.
    pub levels: Vec<Level>,
    pub node_features: BTreeMap<String, FeatureColumn>,
    pub edge_features: BTreeMap<String, EdgeColumn>,
    pub unravel: UnravelOptions,
}

/// A queryable corpus.
#[derive(Clone, Debug)]
pub struct Corpus {
    data: CorpusData,
    order: NodeOrder,
    /// `slot_self[s - 1] == s`, the extent of slot nodes.
    slot_self: Vec<Slot>,
}

impl Corpus {
    /// Derive the order and indices from stored data.
    pub fn from_data(data: CorpusData) -> Result<Self> {
        if data.max_node < data.max_slot {
            return Err(FabricError::InvalidCorpus(format!(
                "max_node {} below max_slot {}",
                data.max_node, data.max_slot
            )));
        }
        if data.oslots.max_node() != data.max_node {
            return Err(FabricError::InvalidCorpus(format!(
                "slot relation covers {} nodes, corpus has {}",
                data.oslots.max_node(),
                data.max_node
            )));
        }

        let vocabulary: Vec<String> = data.levels.iter().map(|l| l.node_type.clone()).collect();
        let max_node = data.max_node;
        let mut corpus = Corpus {
            slot_self: (1..=data.max_slot).collect(),
            data,
            order: NodeOrder::default(),
        };
        corpus.order = NodeOrder::build(&vocabulary, &corpus, max_node);
        Ok(corpus)
    }

    pub fn data(&self) -> &CorpusData {
        &self.data
    }

    pub fn into_data(self) -> CorpusData {
        self.data
    }

    pub fn order(&self) -> &NodeOrder {
        &self.order
    }

    pub fn levels(&self) -> &[Level] {
        &self.data.levels
    }

    pub fn slot_type(&self) -> &str {
        &self.data.slot_type
    }

    pub fn max_slot(&self) -> Slot {
        self.data.max_slot
    }

    pub fn max_node(&self) -> Node {
        self.data.max_node
    }

    pub fn feature(&self, name: &str) -> Option<&FeatureColumn> {
        self.data.node_features.get(name)
    }

    pub fn edge(&self, name: &str) -> Option<&EdgeColumn> {
        self.data.edge_features.get(name)
    }

    pub fn oslots(&self) -> &EdgeColumn {
        &self.data.oslots
    }

    /// Nodes of one type in canonical order.
    pub fn nodes_of_type(&self, node_type: &str) -> Vec<Node> {
        self.order
            .walk()
            .filter(|&n| self.type_of(n) == Some(node_type))
            .collect()
    }

    /// Nodes sharing at least one slot with `node`, in canonical order.
    pub fn intersecting(&self, node: Node) -> Vec<Node> {
        let mut found: BTreeSet<Node> = BTreeSet::new();
        for &s in self.slots_of(node) {
            found.insert(s);
            found.extend(self.data.oslots.to(s));
        }
        found.remove(&node);
        self.order.sort_nodes(found)
    }

    /// Nodes of a more comprehensive type whose extent contains that of
    /// `node`, in canonical order.
    pub fn embedders_of(&self, node: Node) -> Vec<Node> {
        let slots = self.slots_of(node);
        let Some(&first) = slots.first() else {
            return Vec::new();
        };
        let rank = self.order.rank_of(node);
        let found = self.data.oslots.to(first).iter().copied().filter(|&m| {
            m != node && self.order.rank_of(m) > rank && is_subset(slots, self.slots_of(m))
        });
        self.order.sort_nodes(found)
    }

    /// Nodes of a less comprehensive type whose extent lies inside that of
    /// `node`, slots included, in canonical order.
    pub fn embedded_in(&self, node: Node) -> Vec<Node> {
        let slots = self.slots_of(node);
        let rank = self.order.rank_of(node);
        let found = self.intersecting(node).into_iter().filter(|&m| {
            self.order.rank_of(m) < rank && is_subset(self.slots_of(m), slots)
        });
        self.order.sort_nodes(found)
    }

    /// Unraveler using the options stored with the corpus.
    pub fn unraveler(&self) -> Unraveler<'_, Corpus, Corpus> {
        Unraveler::new(self, self, &self.order).with_options(self.data.unravel.clone())
    }

    pub fn unravel(&self, node: Node) -> Tree {
        self.unraveler().unravel(node)
    }
}

impl NodeTypes for Corpus {
    fn type_of(&self, node: Node) -> Option<&str> {
        if node == 0 || node > self.data.max_node {
            None
        } else if node <= self.data.max_slot {
            Some(&self.data.slot_type)
        } else {
            self.data.otype.get(node - self.data.max_slot)
        }
    }

    fn slots_of(&self, node: Node) -> &[Slot] {
        if node == 0 || node > self.data.max_node {
            &[]
        } else if node <= self.data.max_slot {
            &self.slot_self[node as usize - 1..node as usize]
        } else {
            self.data.oslots.from(node)
        }
    }
}

impl Locality for Corpus {
    fn descendants_of(&self, node: Node) -> Vec<Node> {
        self.intersecting(node)
    }

    fn ancestors_of(&self, slot: Slot, node_type: &str) -> Vec<Node> {
        let found = self
            .data
            .oslots
            .to(slot)
            .iter()
            .copied()
            .filter(|&m| self.type_of(m) == Some(node_type));
        self.order.sort_nodes(found)
    }
}

// ============================================================================
// BUILDER
// ============================================================================

enum EdgeInput {
    Plain(Vec<(Node, Node)>),
    Int(Vec<(Node, Node, i64)>),
    Str(Vec<(Node, Node, String)>),
}

impl EdgeInput {
    fn kind(&self) -> &'static str {
        match self {
            EdgeInput::Plain(_) => "plain",
            EdgeInput::Int(_) => "int",
            EdgeInput::Str(_) => "str",
        }
    }
}

/// Collects nodes and features, then assembles a [`Corpus`].
///
/// Slot nodes are `1..=max_slot`; every added node gets the next number
/// after the last one. Features may be set in any node order.
pub struct CorpusBuilder {
    slot_type: String,
    max_slot: Slot,
    nodes: Vec<(String, Vec<Slot>)>,
    int_features: BTreeMap<String, Vec<(Node, i64)>>,
    str_features: BTreeMap<String, Vec<(Node, String)>>,
    edges: BTreeMap<String, EdgeInput>,
    problems: Vec<String>,
}

impl CorpusBuilder {
    pub fn new<S: Into<String>>(slot_type: S, max_slot: Slot) -> Self {
        CorpusBuilder {
            slot_type: slot_type.into(),
            max_slot,
            nodes: Vec::new(),
            int_features: BTreeMap::new(),
            str_features: BTreeMap::new(),
            edges: BTreeMap::new(),
            problems: Vec::new(),
        }
    }

    /// Add a non-slot node and return its number. Slots are sorted and
    /// deduplicated; they are validated by [`build`](Self::build).
    pub fn add_node<S, I>(&mut self, node_type: S, slots: I) -> Node
    where
        S: Into<String>,
        I: IntoIterator<Item = Slot>,
    {
        let mut slots: Vec<Slot> = slots.into_iter().collect();
        slots.sort_unstable();
        slots.dedup();
        self.nodes.push((node_type.into(), slots));
        self.max_slot + self.nodes.len() as Node
    }

    pub fn max_node(&self) -> Node {
        self.max_slot + self.nodes.len() as Node
    }

    pub fn int_feature(&mut self, name: &str, node: Node, value: i64) -> &mut Self {
        if self.str_features.contains_key(name) {
            self.problems.push(format!("feature {name} holds both ints and strings"));
        }
        self.int_features.entry(name.to_string()).or_default().push((node, value));
        self
    }

    pub fn str_feature<S: Into<String>>(&mut self, name: &str, node: Node, value: S) -> &mut Self {
        if self.int_features.contains_key(name) {
            self.problems.push(format!("feature {name} holds both ints and strings"));
        }
        self.str_features
            .entry(name.to_string())
            .or_default()
            .push((node, value.into()));
        self
    }

    pub fn edge(&mut self, name: &str, from: Node, to: Node) -> &mut Self {
        match self.edges.entry(name.to_string()).or_insert_with(|| EdgeInput::Plain(Vec::new())) {
            EdgeInput::Plain(edges) => edges.push((from, to)),
            other => {
                let problem = format!("edge feature {name} mixes plain and {} edges", other.kind());
                self.problems.push(problem);
            }
        }
        self
    }

    pub fn edge_int(&mut self, name: &str, from: Node, to: Node, value: i64) -> &mut Self {
        match self.edges.entry(name.to_string()).or_insert_with(|| EdgeInput::Int(Vec::new())) {
            EdgeInput::Int(edges) => edges.push((from, to, value)),
            other => {
                let problem = format!("edge feature {name} mixes int and {} edges", other.kind());
                self.problems.push(problem);
            }
        }
        self
    }

    pub fn edge_str<S>(&mut self, name: &str, from: Node, to: Node, value: S) -> &mut Self
    where
        S: Into<String>,
    {
        match self.edges.entry(name.to_string()).or_insert_with(|| EdgeInput::Str(Vec::new())) {
            EdgeInput::Str(edges) => edges.push((from, to, value.into())),
            other => {
                let problem = format!("edge feature {name} mixes str and {} edges", other.kind());
                self.problems.push(problem);
            }
        }
        self
    }

    fn validate(&self) -> Result<()> {
        if let Some(problem) = self.problems.first() {
            return Err(FabricError::InvalidCorpus(problem.clone()));
        }
        if self.max_slot == 0 {
            return Err(FabricError::InvalidCorpus("corpus has no slots".into()));
        }
        for (i, (tp, slots)) in self.nodes.iter().enumerate() {
            let node = self.max_slot + 1 + i as Node;
            if tp == &self.slot_type {
                return Err(FabricError::InvalidCorpus(format!(
                    "node {node} has the slot type {tp}"
                )));
            }
            match (slots.first(), slots.last()) {
                (Some(&first), Some(&last)) if first >= 1 && last <= self.max_slot => {}
                (None, _) | (_, None) => {
                    return Err(FabricError::InvalidCorpus(format!(
                        "node {node} ({tp}) has no slots"
                    )));
                }
                _ => {
                    return Err(FabricError::InvalidCorpus(format!(
                        "node {node} ({tp}) has slots outside 1..={}",
                        self.max_slot
                    )));
                }
            }
        }
        Ok(())
    }

    /// Assemble the corpus.
    pub fn build(self, config: &FabricConfig) -> Result<Corpus> {
        self.validate()?;
        let max_slot = self.max_slot;
        let max_node = self.max_node();
        let non_slot = |i: usize| max_slot + 1 + i as Node;

        let otype = StrColumn::build(
            self.nodes.iter().enumerate().map(|(i, (tp, _))| (i as u32 + 1, tp.as_str())),
            Encoding::Sparse,
        )?;
        let oslots = EdgeColumn::build(
            max_node,
            self.nodes
                .iter()
                .enumerate()
                .flat_map(|(i, (_, slots))| slots.iter().map(move |&s| (non_slot(i), s))),
        )?;
        let levels = compute_levels(
            self.nodes
                .iter()
                .enumerate()
                .map(|(i, (tp, slots))| (non_slot(i), tp.as_str(), slots.len())),
            &self.slot_type,
            max_slot,
            config.levels.as_deref(),
            &config.level_constraints,
        );

        let mut node_features: BTreeMap<String, FeatureColumn> = BTreeMap::new();
        for (name, mut items) in self.int_features {
            check_nodes(&name, items.iter().map(|e| e.0), max_node)?;
            items.sort_by_key(|e| e.0);
            node_features.insert(name, IntColumn::build(items, config.encoding)?.into());
        }
        for (name, mut items) in self.str_features {
            check_nodes(&name, items.iter().map(|e| e.0), max_node)?;
            items.sort_by_key(|e| e.0);
            node_features.insert(name, StrColumn::build(items, config.encoding)?.into());
        }

        let mut edge_features: BTreeMap<String, EdgeColumn> = BTreeMap::new();
        for (name, input) in self.edges {
            let column = match input {
                EdgeInput::Plain(edges) => EdgeColumn::build(max_node, edges)?,
                EdgeInput::Int(edges) => EdgeColumn::build_int(max_node, edges, config.encoding)?,
                EdgeInput::Str(edges) => EdgeColumn::build_str(max_node, edges, config.encoding)?,
            };
            edge_features.insert(name, column);
        }

        tracing::debug!(
            max_slot,
            max_node,
            node_features = node_features.len(),
            edge_features = edge_features.len(),
            "assembled corpus"
        );

        Corpus::from_data(CorpusData {
            slot_type: self.slot_type,
            max_slot,
            max_node,
            otype,
            oslots,
            levels,
            node_features,
            edge_features,
            unravel: config.unravel.clone(),
        })
    }
}

fn check_nodes(feature: &str, mut nodes: impl Iterator<Item = Node>, max_node: Node) -> Result<()> {
    match nodes.find(|&n| n == 0 || n > max_node) {
        Some(n) => Err(FabricError::InvalidCorpus(format!(
            "feature {feature} sets node {n} outside 1..={max_node}"
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Value;

    /// words 1..=6; clause 7 = 1..4, clause 8 = 5..6, sentence 9 = 1..6,
    /// phrase 10 = {2, 5}
    fn sample() -> Corpus {
        let mut b = CorpusBuilder::new("word", 6);
        b.add_node("clause", [1, 2, 3, 4]);
        b.add_node("clause", [5, 6]);
        b.add_node("sentence", 1..=6);
        b.add_node("phrase", [5, 2, 2]);
        for (w, text) in ["a", "b", "c", "d", "e", "f"].iter().enumerate() {
            b.str_feature("text", w as Node + 1, *text);
        }
        b.int_feature("number", 9, 1);
        b.edge_str("mother", 10, 7, "Subj");
        b.build(&FabricConfig::default()).unwrap()
    }

    #[test]
    fn test_types_and_slots() {
        let c = sample();
        assert_eq!(c.max_node(), 10);
        assert_eq!(c.type_of(3), Some("word"));
        assert_eq!(c.type_of(7), Some("clause"));
        assert_eq!(c.type_of(10), Some("phrase"));
        assert_eq!(c.type_of(11), None);
        assert_eq!(c.slots_of(4), &[4]);
        assert_eq!(c.slots_of(10), &[2, 5]);
        assert!(c.slots_of(0).is_empty());
    }

    #[test]
    fn test_levels_from_data() {
        let c = sample();
        let names: Vec<&str> = c.levels().iter().map(|l| l.node_type.as_str()).collect();
        assert_eq!(names, vec!["sentence", "clause", "phrase", "word"]);
        assert_eq!(c.order().rank("sentence"), Some(3));
    }

    #[test]
    fn test_locality() {
        let c = sample();
        assert_eq!(c.embedders_of(5), vec![9, 10, 8]);
        assert_eq!(c.embedders_of(8), vec![9]);
        assert_eq!(c.embedded_in(8), vec![5, 6]);
        assert_eq!(c.intersecting(8), vec![9, 10, 5, 6]);
        assert_eq!(c.ancestors_of(5, "clause"), vec![8]);
        // the enclosing sentence and the gapped phrase both intersect clause 8
        assert_eq!(c.descendants_of(8), vec![9, 10, 5, 6]);
        assert_eq!(c.nodes_of_type("clause"), vec![7, 8]);
    }

    #[test]
    fn test_features() {
        let c = sample();
        let text = c.feature("text").unwrap();
        assert_eq!(text.get(2), Some(Value::Str("b")));
        assert_eq!(text.get(7), None);
        assert_eq!(c.feature("number").and_then(|f| f.get(9)), Some(Value::Int(1)));
        assert_eq!(c.edge("mother").unwrap().value(10, 7), Some(Value::Str("Subj")));
    }

    #[test]
    fn test_builder_rejects_bad_nodes() {
        let mut b = CorpusBuilder::new("word", 3);
        b.add_node("phrase", [2, 4]);
        assert!(matches!(b.build(&FabricConfig::default()), Err(FabricError::InvalidCorpus(_))));

        let mut b = CorpusBuilder::new("word", 3);
        b.add_node("phrase", std::iter::empty());
        assert!(b.build(&FabricConfig::default()).is_err());

        let mut b = CorpusBuilder::new("word", 3);
        b.int_feature("n", 1, 1).str_feature("n", 2, "x");
        assert!(b.build(&FabricConfig::default()).is_err());

        let mut b = CorpusBuilder::new("word", 3);
        b.int_feature("n", 1, 1).int_feature("n", 1, 2);
        assert!(matches!(
            b.build(&FabricConfig::default()),
            Err(FabricError::MalformedInput { previous: 1, key: 1 })
        ));
    }

    #[test]
    fn test_shared_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Corpus>();
        assert_send_sync::<Tree>();

        let c = sample();
        let shared = &c;
        let explained: Vec<String> = std::thread::scope(|scope| {
            let handles: Vec<_> = (7..=9)
                .map(|n| scope.spawn(move || shared.unravel(n).explain()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(explained[1], c.unravel(8).explain());
    }

    #[test]
    fn test_unravel_through_corpus() {
        let c = sample();
        let tree = c.unravel(8);
        let chunks: Vec<(Node, Slot, Slot)> =
            tree.chunks().iter().map(|c| (c.node, c.begin, c.end)).collect();
        assert_eq!(chunks, vec![(9, 5, 6), (8, 5, 6), (10, 5, 5), (5, 5, 5), (6, 6, 6)]);
        let css = |i: usize| tree.get(i).and_then(|n| n.boundary).map(|b| b.css(false));
        assert_eq!(css(1).as_deref(), Some("lno"));
        assert_eq!(css(3).as_deref(), Some("l"));
    }

    #[test]
    fn test_unravel_restricted_to_descendant_types() {
        let config = FabricConfig {
            unravel: UnravelOptions::default().descend("clause", ["word"]),
            ..FabricConfig::default()
        };
        let mut b = CorpusBuilder::new("word", 6);
        b.add_node("clause", [1, 2, 3, 4]);
        b.add_node("clause", [5, 6]);
        b.add_node("sentence", 1..=6);
        b.add_node("phrase", [5, 2, 2]);
        let c = b.build(&config).unwrap();

        let nodes = |n: Node| -> Vec<Node> {
            c.unravel(n).chunks().iter().map(|chunk| chunk.node).collect()
        };
        assert_eq!(nodes(8), vec![8, 5, 6]);
        // sentences are not restricted
        assert!(nodes(9).contains(&10));
    }
}
