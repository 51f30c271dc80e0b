//! Node-indexed feature columns.
//!
//! A column maps keys (node numbers, or edge positions for valued edges) to
//! an integer or a string. It is built once from a strictly key-increasing
//! sequence and is read-only afterwards. Two encodings exist:
//!
//! - **Dense**: one entry per key from 1 to the last key. O(1) lookups.
//! - **Sparse**: only the keys where the value changes, with run semantics.
//!   O(log n) lookups, much smaller for features that are constant over long
//!   stretches of nodes (for example the node type).
//!
//! Both encodings answer every `get` identically.
//!
//! # Example
//!
//! ```
//! use corpus_fabric::column::{Encoding, StrColumn};
//!
//! let items = [(1, "a"), (2, "a"), (3, "b"), (5, "c")];
//! for encoding in [Encoding::Dense, Encoding::Sparse] {
//!     let col = StrColumn::build(items, encoding).unwrap();
//!     let got: Vec<_> = (1..=6).map(|k| col.get(k)).collect();
//!     assert_eq!(got, vec![Some("a"), Some("a"), Some("b"), None, Some("c"), None]);
//! }
//! ```

mod dense;
mod sparse;

pub use dense::{DenseInt, DenseStr};
pub use sparse::{SparseInt, SparseStr};

use crate::error::{FabricError, Result};
use crate::width::IntegerType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// Stored marker for "no value" in integer buffers.
pub(crate) const NONE_INT: i64 = -1;

/// Shift real negatives one down so they never meet [`NONE_INT`].
#[inline]
pub(crate) fn encode_int(value: i64) -> Result<i64> {
    if value < 0 {
        value.checked_sub(1).ok_or(FabricError::RangeOverflow {
            min: value as i128 - 1,
            max: value as i128,
        })
    } else {
        Ok(value)
    }
}

#[inline]
pub(crate) fn decode_int(stored: i64) -> Option<i64> {
    match stored {
        NONE_INT => None,
        v if v < 0 => Some(v + 1),
        v => Some(v),
    }
}

#[inline]
pub(crate) fn check_key(previous: u32, key: u32) -> Result<()> {
    if key <= previous {
        Err(FabricError::MalformedInput { previous, key })
    } else {
        Ok(())
    }
}

// ============================================================================
// ENCODING CHOICE
// ============================================================================

/// Storage layout of a column.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Dense,
    Sparse,
    /// Pick whichever of the two stores fewer entries.
    #[default]
    Auto,
}

/// Number of entries the sparse encoding would store for `items`.
fn count_transitions<V: PartialEq>(items: &[(u32, V)]) -> usize {
    let mut count = 0;
    let mut previous: Option<&(u32, V)> = None;
    for item in items {
        count += match previous {
            None => 1,
            Some((pk, _)) if pk.checked_add(1) != Some(item.0) => 2,
            Some((_, pv)) if *pv == item.1 => 0,
            Some(_) => 1,
        };
        previous = Some(item);
    }
    count + usize::from(previous.is_some())
}

/// Sparse entries cost a key and a value, dense entries only a value.
fn resolve_encoding<V: PartialEq>(items: &[(u32, V)]) -> Encoding {
    let last_key = items.last().map_or(0, |(k, _)| *k) as usize;
    let transitions = count_transitions(items);
    let chosen = if transitions * 2 < last_key {
        Encoding::Sparse
    } else {
        Encoding::Dense
    };
    tracing::debug!(transitions, last_key, ?chosen, "resolved automatic column encoding");
    chosen
}

// ============================================================================
// STATISTICS
// ============================================================================

/// Storage report of one column.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ColumnStats {
    pub encoding: Encoding,
    pub last_key: u32,
    /// Stored entries: one per key when dense, one per transition when sparse.
    pub entries: usize,
    /// `(buffer name, width, bytes)` per numeric buffer.
    pub buffers: Vec<(&'static str, IntegerType, usize)>,
    pub blob_bytes: usize,
}

impl ColumnStats {
    pub fn total_bytes(&self) -> usize {
        self.buffers.iter().map(|&(_, _, b)| b).sum::<usize>() + self.blob_bytes
    }
}

impl fmt::Display for ColumnStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:?} last_key={} entries={} total={}",
            self.encoding,
            self.last_key,
            self.entries,
            self.total_bytes()
        )?;
        for (name, tp, bytes) in &self.buffers {
            writeln!(f, "\t{name:<8}: {:>3}: {bytes:>10}", tp.type_code())?;
        }
        if self.blob_bytes > 0 {
            writeln!(f, "\t{:<8}: {:>3}: {:>10}", "blob", "", self.blob_bytes)?;
        }
        Ok(())
    }
}

fn sorted_frequencies<V: Ord + Hash>(counts: HashMap<V, usize>) -> Vec<(V, usize)> {
    let mut freqs: Vec<(V, usize)> = counts.into_iter().collect();
    freqs.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    freqs
}

// ============================================================================
// INTEGER COLUMNS
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntColumn {
    Dense(DenseInt),
    Sparse(SparseInt),
}

impl Default for IntColumn {
    fn default() -> Self {
        IntColumn::Sparse(SparseInt::default())
    }
}

impl IntColumn {
    /// Build with the requested encoding; [`Encoding::Auto`] buffers the
    /// input once to count transitions.
    pub fn build<I>(items: I, encoding: Encoding) -> Result<Self>
    where
        I: IntoIterator<Item = (u32, i64)>,
    {
        match encoding {
            Encoding::Dense => Ok(IntColumn::Dense(DenseInt::build(items)?)),
            Encoding::Sparse => Ok(IntColumn::Sparse(SparseInt::build(items)?)),
            Encoding::Auto => {
                let items: Vec<(u32, i64)> = items.into_iter().collect();
                let chosen = resolve_encoding(&items);
                Self::build(items, chosen)
            }
        }
    }

    #[inline]
    pub fn get(&self, key: u32) -> Option<i64> {
        match self {
            IntColumn::Dense(c) => c.get(key),
            IntColumn::Sparse(c) => c.get(key),
        }
    }

    pub fn encoding(&self) -> Encoding {
        match self {
            IntColumn::Dense(_) => Encoding::Dense,
            IntColumn::Sparse(_) => Encoding::Sparse,
        }
    }

    pub fn last_key(&self) -> u32 {
        match self {
            IntColumn::Dense(c) => c.last_key(),
            IntColumn::Sparse(c) => c.last_key(),
        }
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = (u32, i64)> + '_> {
        match self {
            IntColumn::Dense(c) => Box::new(c.iter()),
            IntColumn::Sparse(c) => Box::new(c.iter()),
        }
    }

    pub fn stats(&self) -> ColumnStats {
        match self {
            IntColumn::Dense(c) => c.stats(),
            IntColumn::Sparse(c) => c.stats(),
        }
    }

    /// Distinct values with their key counts, most frequent first.
    pub fn freq_list(&self) -> Vec<(i64, usize)> {
        let mut counts: HashMap<i64, usize> = HashMap::new();
        match self {
            IntColumn::Dense(c) => c.iter().for_each(|(_, v)| *counts.entry(v).or_default() += 1),
            IntColumn::Sparse(c) => c.runs().for_each(|(start, end, v)| {
                *counts.entry(v).or_default() += (end - start + 1) as usize;
            }),
        }
        sorted_frequencies(counts)
    }
}

// ============================================================================
// STRING COLUMNS
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrColumn {
    Dense(DenseStr),
    Sparse(SparseStr),
}

impl Default for StrColumn {
    fn default() -> Self {
        StrColumn::Sparse(SparseStr::default())
    }
}

impl StrColumn {
    pub fn build<I, S>(items: I, encoding: Encoding) -> Result<Self>
    where
        I: IntoIterator<Item = (u32, S)>,
        S: AsRef<str>,
    {
        match encoding {
            Encoding::Dense => Ok(StrColumn::Dense(DenseStr::build(items)?)),
            Encoding::Sparse => Ok(StrColumn::Sparse(SparseStr::build(items)?)),
            Encoding::Auto => {
                let items: Vec<(u32, S)> = items.into_iter().collect();
                let keyed: Vec<(u32, &str)> = items.iter().map(|(k, v)| (*k, v.as_ref())).collect();
                let chosen = resolve_encoding(&keyed);
                Self::build(keyed, chosen)
            }
        }
    }

    #[inline]
    pub fn get(&self, key: u32) -> Option<&str> {
        match self {
            StrColumn::Dense(c) => c.get(key),
            StrColumn::Sparse(c) => c.get(key),
        }
    }

    pub fn encoding(&self) -> Encoding {
        match self {
            StrColumn::Dense(_) => Encoding::Dense,
            StrColumn::Sparse(_) => Encoding::Sparse,
        }
    }

    pub fn last_key(&self) -> u32 {
        match self {
            StrColumn::Dense(c) => c.last_key(),
            StrColumn::Sparse(c) => c.last_key(),
        }
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = (u32, &str)> + '_> {
        match self {
            StrColumn::Dense(c) => Box::new(c.iter()),
            StrColumn::Sparse(c) => Box::new(c.iter()),
        }
    }

    pub fn stats(&self) -> ColumnStats {
        match self {
            StrColumn::Dense(c) => c.stats(),
            StrColumn::Sparse(c) => c.stats(),
        }
    }

    pub fn freq_list(&self) -> Vec<(String, usize)> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        match self {
            StrColumn::Dense(c) => c.iter().for_each(|(_, v)| *counts.entry(v).or_default() += 1),
            StrColumn::Sparse(c) => c.runs().for_each(|(start, end, v)| {
                *counts.entry(v).or_default() += (end - start + 1) as usize;
            }),
        }
        sorted_frequencies(counts)
            .into_iter()
            .map(|(v, n)| (v.to_owned(), n))
            .collect()
    }
}

// ============================================================================
// EITHER KIND
// ============================================================================

/// A borrowed column value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Value<'a> {
    Int(i64),
    Str(&'a str),
}

impl<'a> Value<'a> {
    pub fn as_int(&self) -> Option<i64> {
        match *self {
            Value::Int(v) => Some(v),
            Value::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&'a str> {
        match *self {
            Value::Str(v) => Some(v),
            Value::Int(_) => None,
        }
    }
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Str(v) => f.write_str(v),
        }
    }
}

/// An integer or string column.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureColumn {
    Int(IntColumn),
    Str(StrColumn),
}

impl FeatureColumn {
    #[inline]
    pub fn get(&self, key: u32) -> Option<Value<'_>> {
        match self {
            FeatureColumn::Int(c) => c.get(key).map(Value::Int),
            FeatureColumn::Str(c) => c.get(key).map(Value::Str),
        }
    }

    pub fn as_int(&self) -> Option<&IntColumn> {
        match self {
            FeatureColumn::Int(c) => Some(c),
            FeatureColumn::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&StrColumn> {
        match self {
            FeatureColumn::Str(c) => Some(c),
            FeatureColumn::Int(_) => None,
        }
    }

    pub fn encoding(&self) -> Encoding {
        match self {
            FeatureColumn::Int(c) => c.encoding(),
            FeatureColumn::Str(c) => c.encoding(),
        }
    }

    pub fn last_key(&self) -> u32 {
        match self {
            FeatureColumn::Int(c) => c.last_key(),
            FeatureColumn::Str(c) => c.last_key(),
        }
    }

    pub fn stats(&self) -> ColumnStats {
        match self {
            FeatureColumn::Int(c) => c.stats(),
            FeatureColumn::Str(c) => c.stats(),
        }
    }
}

impl From<IntColumn> for FeatureColumn {
    fn from(c: IntColumn) -> Self {
        FeatureColumn::Int(c)
    }
}

impl From<StrColumn> for FeatureColumn {
    fn from(c: StrColumn) -> Self {
        FeatureColumn::Str(c)
    }
}
