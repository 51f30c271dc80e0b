//! Sparse encodings: only the keys where the value changes are stored.
//!
//! A value stored at index `k` holds for every key `>= k` up to the next
//! stored index. Gaps are closed with an explicit "no value" transition and
//! the last run always ends with one at `last_key + 1`, so a lookup is a
//! single binary search for the greatest index `<= key`.

use super::{check_key, decode_int, encode_int, ColumnStats, Encoding, NONE_INT};
use crate::error::Result;
use crate::width::IntBuffer;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sparse integer column.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparseInt {
    indices: IntBuffer,
    values: IntBuffer,
}

impl SparseInt {
    /// Build from `(key, value)` pairs with strictly increasing keys `>= 1`.
    pub fn build<I>(items: I) -> Result<Self>
    where
        I: IntoIterator<Item = (u32, i64)>,
    {
        let mut indices: Vec<i64> = Vec::new();
        let mut values: Vec<i64> = Vec::new();
        let mut previous: Option<(u32, i64)> = None;

        for (key, value) in items {
            check_key(previous.map_or(0, |(k, _)| k), key)?;
            let encoded = encode_int(value)?;

            match previous {
                Some((prev_key, _)) if key != prev_key + 1 => {
                    indices.extend([prev_key as i64 + 1, key as i64]);
                    values.extend([NONE_INT, encoded]);
                }
                Some((_, prev_value)) if prev_value == encoded => {}
                _ => {
                    indices.push(key as i64);
                    values.push(encoded);
                }
            }
            previous = Some((key, encoded));
        }

        if let Some((last_key, _)) = previous {
            indices.push(last_key as i64 + 1);
            values.push(NONE_INT);
        }

        Ok(SparseInt {
            indices: IntBuffer::from_values(&indices)?,
            values: IntBuffer::from_values(&values)?,
        })
    }

    #[inline]
    pub fn get(&self, key: u32) -> Option<i64> {
        match self.indices.upper_bound(key as i64) {
            0 => None,
            pos => self.values.get(pos - 1).and_then(decode_int),
        }
    }

    pub fn last_key(&self) -> u32 {
        last_key_of(&self.indices)
    }

    /// Present runs as `(first key, last key, value)`.
    pub(crate) fn runs(&self) -> impl Iterator<Item = (u32, u32, i64)> + '_ {
        (0..self.indices.len().saturating_sub(1)).filter_map(move |i| {
            let start = self.indices.get(i)?;
            let next = self.indices.get(i + 1)?;
            let value = decode_int(self.values.get(i)?)?;
            Some((start as u32, (next - 1) as u32, value))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, i64)> + '_ {
        self.runs()
            .flat_map(|(start, end, value)| (start..=end).map(move |k| (k, value)))
    }

    pub fn stats(&self) -> ColumnStats {
        ColumnStats {
            encoding: Encoding::Sparse,
            last_key: self.last_key(),
            entries: self.indices.len(),
            buffers: vec![
                ("indices", self.indices.integer_type(), self.indices.byte_size()),
                ("values", self.values.integer_type(), self.values.byte_size()),
            ],
            blob_bytes: 0,
        }
    }
}

fn last_key_of(indices: &IntBuffer) -> u32 {
    match indices.len() {
        0 => 0,
        n => indices.get(n - 1).map_or(0, |k| (k - 1) as u32),
    }
}

// ============================================================================
// STRINGS
// ============================================================================

/// Byte range of an interned value inside the blob.
type Span = (i64, i64);

/// The blob starts with a NUL byte; offset 0 means "no value".
const ABSENT: Span = (0, 1);

/// Accumulates runs and interns repeated values into one blob.
struct StrRuns {
    indices: Vec<i64>,
    offsets: Vec<i64>,
    bounds: Vec<i64>,
    blob: String,
    interned: HashMap<String, Span>,
}

impl StrRuns {
    fn new() -> Self {
        StrRuns {
            indices: Vec::new(),
            offsets: Vec::new(),
            bounds: Vec::new(),
            blob: String::from("\0"),
            interned: HashMap::new(),
        }
    }

    fn intern(&mut self, value: &str) -> Span {
        if let Some(&span) = self.interned.get(value) {
            return span;
        }
        let start = self.blob.len() as i64;
        self.blob.push_str(value);
        let span = (start, self.blob.len() as i64);
        self.interned.insert(value.to_owned(), span);
        span
    }

    fn push(&mut self, key: i64, (offset, bound): Span) {
        self.indices.push(key);
        self.offsets.push(offset);
        self.bounds.push(bound);
    }
}

/// Sparse string column with interned values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparseStr {
    indices: IntBuffer,
    offsets: IntBuffer,
    bounds: IntBuffer,
    blob: String,
}

impl Default for SparseStr {
    fn default() -> Self {
        SparseStr {
            indices: IntBuffer::default(),
            offsets: IntBuffer::default(),
            bounds: IntBuffer::default(),
            blob: String::from("\0"),
        }
    }
}

impl SparseStr {
    /// Build from `(key, value)` pairs with strictly increasing keys `>= 1`.
    pub fn build<I, S>(items: I) -> Result<Self>
    where
        I: IntoIterator<Item = (u32, S)>,
        S: AsRef<str>,
    {
        let mut runs = StrRuns::new();
        let mut previous: Option<(u32, Span)> = None;

        for (key, value) in items {
            check_key(previous.map_or(0, |(k, _)| k), key)?;
            // equal strings share one span, so spans compare like values
            let span = runs.intern(value.as_ref());

            match previous {
                Some((prev_key, _)) if key != prev_key + 1 => {
                    runs.push(prev_key as i64 + 1, ABSENT);
                    runs.push(key as i64, span);
                }
                Some((_, prev_span)) if prev_span == span => {}
                _ => runs.push(key as i64, span),
            }
            previous = Some((key, span));
        }

        if let Some((last_key, _)) = previous {
            runs.push(last_key as i64 + 1, ABSENT);
        }

        Ok(SparseStr {
            indices: IntBuffer::from_values(&runs.indices)?,
            offsets: IntBuffer::from_values(&runs.offsets)?,
            bounds: IntBuffer::from_values(&runs.bounds)?,
            blob: runs.blob,
        })
    }

    #[inline]
    pub fn get(&self, key: u32) -> Option<&str> {
        let pos = self.indices.upper_bound(key as i64).checked_sub(1)?;
        self.span_at(pos)
    }

    fn span_at(&self, pos: usize) -> Option<&str> {
        let offset = self.offsets.get(pos)?;
        if offset == ABSENT.0 {
            return None;
        }
        let bound = self.bounds.get(pos)?;
        self.blob.get(offset as usize..bound as usize)
    }

    pub fn last_key(&self) -> u32 {
        last_key_of(&self.indices)
    }

    pub(crate) fn runs(&self) -> impl Iterator<Item = (u32, u32, &str)> + '_ {
        (0..self.indices.len().saturating_sub(1)).filter_map(move |i| {
            let start = self.indices.get(i)?;
            let next = self.indices.get(i + 1)?;
            let value = self.span_at(i)?;
            Some((start as u32, (next - 1) as u32, value))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> + '_ {
        self.runs()
            .flat_map(|(start, end, value)| (start..=end).map(move |k| (k, value)))
    }

    pub fn stats(&self) -> ColumnStats {
        ColumnStats {
            encoding: Encoding::Sparse,
            last_key: self.last_key(),
            entries: self.indices.len(),
            buffers: vec![
                ("indices", self.indices.integer_type(), self.indices.byte_size()),
                ("offsets", self.offsets.integer_type(), self.offsets.byte_size()),
                ("bounds", self.bounds.integer_type(), self.bounds.byte_size()),
            ],
            blob_bytes: self.blob.len(),
        }
    }
}
