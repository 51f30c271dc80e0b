//! The comprehensiveness hierarchy of node types.
//!
//! Types are ranked by how many slots their nodes cover on average: the
//! larger the average, the more comprehensive the type. The slot type is
//! always the least comprehensive level. Both the ranking and individual
//! placements can be overridden from configuration.

use crate::interop::{Node, Slot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One node type in the hierarchy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub node_type: String,
    pub avg_slots: f64,
    /// Smallest node of this type.
    pub first: Node,
    /// Largest node of this type.
    pub last: Node,
}

#[derive(Default)]
struct TypeTally {
    slots: usize,
    nodes: usize,
    first: Node,
    last: Node,
}

/// Compute the levels, most comprehensive first and the slot type last.
///
/// `nodes` yields `(node, type, slot count)` for every non-slot node.
/// `order` lists types that must come first, in that order. Each entry of
/// `constraints` has the form `"smaller < big1, big2"` and moves `smaller`
/// below every listed bigger type when it is not already there.
pub fn compute_levels<'a, I>(
    nodes: I,
    slot_type: &str,
    max_slot: Slot,
    order: Option<&[String]>,
    constraints: &[String],
) -> Vec<Level>
where
    I: IntoIterator<Item = (Node, &'a str, usize)>,
{
    let mut tallies: BTreeMap<&str, TypeTally> = BTreeMap::new();
    for (node, tp, slot_count) in nodes {
        if tp == slot_type {
            continue;
        }
        let tally = tallies.entry(tp).or_insert_with(|| TypeTally {
            first: node,
            ..TypeTally::default()
        });
        tally.slots += slot_count;
        tally.nodes += 1;
        tally.first = tally.first.min(node);
        tally.last = tally.last.max(node);
    }

    let mut levels: Vec<Level> = tallies
        .into_iter()
        .map(|(tp, t)| Level {
            node_type: tp.to_string(),
            avg_slots: t.slots as f64 / t.nodes.max(1) as f64,
            first: t.first,
            last: t.last,
        })
        .collect();
    levels.sort_by(|a, b| {
        b.avg_slots
            .total_cmp(&a.avg_slots)
            .then_with(|| a.first.cmp(&b.first))
    });

    if let Some(order) = order {
        levels = apply_order(levels, order, slot_type);
    }
    for constraint in constraints {
        apply_constraint(&mut levels, constraint);
    }

    levels.push(Level {
        node_type: slot_type.to_string(),
        avg_slots: 1.0,
        first: 1,
        last: max_slot,
    });

    tracing::debug!(
        levels = ?levels.iter().map(|l| l.node_type.as_str()).collect::<Vec<_>>(),
        "computed levels"
    );
    levels
}

fn apply_order(mut levels: Vec<Level>, order: &[String], slot_type: &str) -> Vec<Level> {
    let mut ordered = Vec::with_capacity(levels.len());
    for name in order {
        if name == slot_type {
            continue;
        }
        match levels.iter().position(|l| &l.node_type == name) {
            Some(i) => ordered.push(levels.remove(i)),
            None => tracing::warn!(node_type = %name, "level override names an unknown type"),
        }
    }
    ordered.extend(levels);
    ordered
}

/// Parse `"smaller < big1, big2"`.
fn parse_constraint(text: &str) -> Option<(&str, Vec<&str>)> {
    let (smaller, bigger) = text.split_once('<')?;
    let smaller = smaller.trim();
    let bigger: Vec<&str> = bigger
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if smaller.is_empty() || bigger.is_empty() {
        return None;
    }
    Some((smaller, bigger))
}

fn position_of(levels: &[Level], name: &str) -> Option<usize> {
    levels.iter().position(|l| l.node_type == name)
}

fn apply_constraint(levels: &mut Vec<Level>, text: &str) {
    let Some((smaller, bigger)) = parse_constraint(text) else {
        tracing::warn!(
            constraint = text,
            "malformed level constraint, expected `smaller < big1, big2`"
        );
        return;
    };
    let Some(small_index) = position_of(levels, smaller) else {
        tracing::warn!(
            constraint = text,
            node_type = smaller,
            "level constraint names an unknown type"
        );
        return;
    };
    let mut highest_big = None;
    for name in &bigger {
        match position_of(levels, name) {
            Some(i) => highest_big = highest_big.max(Some(i)),
            None => {
                tracing::warn!(
                    constraint = text,
                    node_type = *name,
                    "level constraint names an unknown type"
                );
                return;
            }
        }
    }

    if let Some(big_index) = highest_big {
        if small_index < big_index {
            let level = levels.remove(small_index);
            levels.insert(big_index, level);
        }
    }
}
