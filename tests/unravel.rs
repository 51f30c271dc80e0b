//! Integration tests for unraveling nodes into chunk trees

use corpus_fabric::interop::{Locality, NodeTypes};
use corpus_fabric::{
    Chunk, CorpusBuilder, FabricConfig, Node, NodeOrder, Slot, Tree, UnravelOptions, Unraveler,
};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

// ----------------------------------------------------------------------------
// Stub corpus
// ----------------------------------------------------------------------------

/// In-memory nodes with a locality computed by brute force: every node
/// sharing a slot is a descendant, whatever its type.
struct Stub {
    vocabulary: Vec<String>,
    nodes: BTreeMap<Node, (String, Vec<Slot>)>,
}

impl Stub {
    fn new(vocabulary: &[&str]) -> Self {
        Stub {
            vocabulary: vocabulary.iter().map(|s| s.to_string()).collect(),
            nodes: BTreeMap::new(),
        }
    }

    fn add(&mut self, node: Node, tp: &str, slots: &[Slot]) -> &mut Self {
        self.nodes.insert(node, (tp.to_string(), slots.to_vec()));
        self
    }

    fn order(&self) -> NodeOrder {
        let max_node = self.nodes.keys().max().copied().unwrap_or(0);
        NodeOrder::build(&self.vocabulary, &self.nodes, max_node)
    }
}

impl NodeTypes for Stub {
    fn type_of(&self, node: Node) -> Option<&str> {
        self.nodes.type_of(node)
    }

    fn slots_of(&self, node: Node) -> &[Slot] {
        self.nodes.slots_of(node)
    }
}

impl Locality for Stub {
    fn descendants_of(&self, node: Node) -> Vec<Node> {
        let slots: BTreeSet<Slot> = self.slots_of(node).iter().copied().collect();
        self.nodes
            .iter()
            .filter(|&(&m, (_, s))| m != node && s.iter().any(|x| slots.contains(x)))
            .map(|(&m, _)| m)
            .collect()
    }

    fn ancestors_of(&self, slot: Slot, node_type: &str) -> Vec<Node> {
        self.nodes
            .iter()
            .filter(|(_, (tp, s))| tp == node_type && s.contains(&slot))
            .map(|(&m, _)| m)
            .collect()
    }
}

fn unravel(stub: &Stub, focus: Node, options: UnravelOptions) -> Tree {
    let order = stub.order();
    Unraveler::new(stub, stub, &order).with_options(options).unravel(focus)
}

fn spans(chunks: &[Chunk]) -> Vec<(Node, Slot, Slot)> {
    chunks.iter().map(|c| (c.node, c.begin, c.end)).collect()
}

// ----------------------------------------------------------------------------
// Shape
// ----------------------------------------------------------------------------

#[test]
fn test_tiling_without_descendants() {
    let mut stub = Stub::new(&["phrase", "word"]);
    stub.add(7, "phrase", &[1, 2, 3, 5, 6]);
    let tree = unravel(&stub, 7, UnravelOptions::default());

    assert_eq!(spans(&tree.child_chunks(0)), vec![(7, 1, 3), (7, 5, 6)]);
    assert_eq!(tree.len(), 3);
}

#[test]
fn test_crossing_chunks_are_split() {
    let mut stub = Stub::new(&["sentence", "clause", "phrase", "word"]);
    stub.add(8, "phrase", &[1, 2, 3, 4, 5])
        .add(9, "clause", &[3, 4, 5, 6, 7])
        .add(10, "sentence", &[1, 2, 3, 4, 5, 6, 7]);
    let tree = unravel(&stub, 10, UnravelOptions::default());

    let chunks = tree.chunks();
    let of = |n: Node| spans(&chunks.iter().filter(|c| c.node == n).copied().collect::<Vec<_>>());
    assert_eq!(of(8), vec![(8, 1, 2), (8, 3, 5)]);
    assert_eq!(of(9), vec![(9, 3, 5), (9, 6, 7)]);

    assert_eq!(
        tree.explain(),
        "root 10\n\
         \x20 1 sentence 10 {1-7}\n\
         \x20   2 phrase 8 {1-2} rno\n\
         \x20   2 clause 9 {3-5} rno\n\
         \x20     3 phrase 8 {3-5} lno\n\
         \x20   2 clause 9 {6-7} lno\n"
    );
}

#[test]
fn test_focus_without_slots_is_bare() {
    let mut stub = Stub::new(&["phrase", "word"]);
    stub.add(3, "phrase", &[1, 2]);
    let tree = unravel(&stub, 99, UnravelOptions::default());
    assert!(tree.is_empty());
    assert_eq!(tree.root().chunk, None);
    assert_eq!(tree.focus, 99);
}

#[test]
fn test_chunks_outside_focus_are_dropped() {
    // the phrase starts before the focus clause, only its inner piece stays
    let mut stub = Stub::new(&["clause", "phrase", "word"]);
    stub.add(10, "clause", &[3, 4, 5]).add(11, "phrase", &[1, 2, 3, 4]);
    let tree = unravel(&stub, 10, UnravelOptions::default());
    assert_eq!(spans(&tree.chunks()), vec![(10, 3, 5), (11, 3, 4)]);
    let piece = tree.get(2).and_then(|n| n.boundary).map(|b| b.css(false));
    assert_eq!(piece.as_deref(), Some("lno"));
}

#[test]
fn test_enclosing_and_crossing_nodes_nest_inside_focus() {
    let mut b = CorpusBuilder::new("word", 6);
    let clause = b.add_node("clause", [1, 2]);
    let enclosing = b.add_node("sentence", 1..=4);
    let crossing = b.add_node("sentence", [2, 3, 5, 6]);
    let corpus = b.build(&FabricConfig::default()).unwrap();

    assert_eq!(corpus.intersecting(clause), vec![enclosing, 1, crossing, 2]);
    let descendants = corpus.descendants_of(clause);
    assert!(descendants.contains(&enclosing) && descendants.contains(&crossing));

    let tree = corpus.unravel(clause);
    assert_eq!(
        tree.explain(),
        "root 7\n\
         \x20 1 sentence 8 {1-2} rno\n\
         \x20   2 clause 7 {1-2}\n\
         \x20     3 word 1 {1-1}\n\
         \x20     3 sentence 9 {2-2} rno\n\
         \x20       4 word 2 {2-2}\n"
    );
}

#[test]
fn test_stub_with_enclosing_node_nests() {
    let mut stub = Stub::new(&["sentence", "phrase", "word"]);
    stub.add(1, "word", &[1])
        .add(2, "word", &[2])
        .add(3, "word", &[3])
        .add(4, "phrase", &[2, 3])
        .add(5, "sentence", &[1, 2, 3]);
    let tree = unravel(&stub, 4, UnravelOptions::default());

    assert_eq!(spans(&tree.chunks()), vec![(5, 2, 3), (4, 2, 3), (2, 2, 2), (3, 3, 3)]);
    assert_eq!(tree.child_chunks(1), vec![tree.chunks()[1]]);
    let outer = tree.get(1).and_then(|n| n.boundary).map(|b| b.css(false));
    assert_eq!(outer.as_deref(), Some("lno"));
}

// ----------------------------------------------------------------------------
// Options
// ----------------------------------------------------------------------------

#[test]
fn test_descendant_types_restrict_candidates() {
    let mut b = CorpusBuilder::new("word", 6);
    let clause = b.add_node("clause", [1, 2]);
    b.add_node("sentence", 1..=4);
    b.add_node("sentence", [2, 3, 5, 6]);
    let config = FabricConfig {
        unravel: UnravelOptions::default().descend("clause", ["word"]),
        ..FabricConfig::default()
    };
    let corpus = b.build(&config).unwrap();

    let tree = corpus.unravel(clause);
    assert_eq!(spans(&tree.chunks()), vec![(7, 1, 2), (1, 1, 1), (2, 2, 2)]);
}

#[test]
fn test_same_type_cover_is_skipped() {
    let mut stub = Stub::new(&["phrase", "word"]);
    stub.add(5, "phrase", &[1, 2]).add(6, "phrase", &[1, 2, 3]);

    let tree = unravel(&stub, 5, UnravelOptions::default());
    assert_eq!(spans(&tree.chunks()), vec![(5, 1, 2)]);

    let keep = UnravelOptions {
        exclude_covering_same_type: false,
        ..UnravelOptions::default()
    };
    let tree = unravel(&stub, 5, keep);
    assert_eq!(spans(&tree.chunks()), vec![(5, 1, 2), (6, 1, 2)]);
}

#[test]
fn test_hidden_types_and_annotations() {
    let mut b = CorpusBuilder::new("word", 4);
    let phrase = b.add_node("phrase", [1, 2]);
    let sentence = b.add_node("sentence", 1..=4);
    let config = FabricConfig {
        unravel: UnravelOptions::default()
            .hide("word")
            .base("phrase")
            .highlight(phrase, "cyan"),
        ..FabricConfig::default()
    };
    let corpus = b.build(&config).unwrap();
    let tree = corpus.unravel(sentence);

    assert_eq!(spans(&tree.chunks()), vec![(sentence, 1, 4), (phrase, 1, 2)]);
    let props = tree.get(2).and_then(|n| n.props.clone()).unwrap();
    assert!(props.is_base);
    assert!(!props.is_slot);
    assert_eq!(props.highlight.as_deref(), Some("cyan"));
    assert!(tree.explain().contains("phrase* 5 {1-2} [cyan]"));

    // the focus itself is kept even when its type is hidden
    let hidden = corpus.unraveler().with_options(UnravelOptions::default().hide("sentence"));
    assert_eq!(hidden.unravel(sentence).chunks()[0].node, sentence);
}

#[test]
fn test_gap_boundaries_and_rtl() {
    let mut b = CorpusBuilder::new("word", 5);
    let phrase = b.add_node("phrase", [2, 4, 5]);
    let sentence = b.add_node("sentence", 1..=5);
    let corpus = b.build(&FabricConfig::default()).unwrap();

    let tree = corpus.unravel(sentence);
    let classes: Vec<String> = tree
        .iter()
        .filter(|(_, n)| n.chunk.is_some_and(|c| c.node == phrase))
        .filter_map(|(_, n)| n.boundary.map(|b| b.css(false)))
        .collect();
    assert_eq!(classes, vec!["r".to_string(), "l".to_string()]);

    let rtl = corpus
        .unraveler()
        .with_options(UnravelOptions::default().right_to_left())
        .unravel(sentence);
    assert!(rtl.explain().contains("phrase 6 {2-2} l\n"));
}

#[test]
fn test_tree_json_export() {
    let mut stub = Stub::new(&["phrase", "word"]);
    stub.add(7, "phrase", &[1, 2]);
    let tree = unravel(&stub, 7, UnravelOptions::default());
    let json: serde_json::Value = serde_json::from_str(&tree.to_json().unwrap()).unwrap();
    assert_eq!(json["focus"], 7);
    assert_eq!(json["nodes"][1]["chunk"]["end"], 2);
}

// ----------------------------------------------------------------------------
// Properties
// ----------------------------------------------------------------------------

const MAX_SLOT: Slot = 12;

fn slots_from_mask(mask: u16) -> Vec<Slot> {
    (0..MAX_SLOT).filter(|&i| mask & (1u16 << i) != 0).map(|i| i + 1).collect()
}

proptest! {
    #[test]
    fn prop_unravel_nests_and_stays_in_focus(
        specs in prop::collection::vec((0usize..3, 1u16..(1 << MAX_SLOT)), 1..8),
        pick in any::<prop::sample::Index>(),
    ) {
        let types = ["sentence", "clause", "phrase"];
        let mut b = CorpusBuilder::new("word", MAX_SLOT);
        let nodes: Vec<Node> = specs
            .iter()
            .map(|&(t, mask)| b.add_node(types[t], slots_from_mask(mask)))
            .collect();
        let corpus = b.build(&FabricConfig::default()).unwrap();
        let focus = nodes[pick.index(nodes.len())];
        let focus_slots: BTreeSet<Slot> = corpus.slots_of(focus).iter().copied().collect();

        let tree = corpus.unravel(focus);
        let mut focus_cover: BTreeSet<Slot> = BTreeSet::new();

        for index in 1..tree.len() {
            let node = tree.get(index).unwrap();
            let chunk = node.chunk.unwrap();
            prop_assert!(focus_slots.contains(&chunk.begin));
            let own: BTreeSet<Slot> = corpus.slots_of(chunk.node).iter().copied().collect();
            prop_assert!((chunk.begin..=chunk.end).all(|s| own.contains(&s)));
            if chunk.node == focus {
                focus_cover.extend(chunk.begin..=chunk.end);
            }

            if let Some(parent) = node.parent.and_then(|p| tree.get(p)).and_then(|p| p.chunk) {
                prop_assert!(parent.covers(&chunk));
            }
        }
        for index in 0..tree.len() {
            for pair in tree.child_chunks(index).windows(2) {
                prop_assert!(pair[0].end < pair[1].begin, "siblings overlap: {:?}", pair);
            }
        }
        prop_assert_eq!(focus_cover, focus_slots);
    }
}
