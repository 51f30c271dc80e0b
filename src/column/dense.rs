//! Dense encodings: one entry for every key from 1 up to the last key.
//!
//! Lookups are a bounds check plus one array read. Keys missing from the
//! input hold a sentinel that decodes to "no value".

use super::{check_key, decode_int, encode_int, ColumnStats, Encoding, NONE_INT};
use crate::error::Result;
use crate::width::IntBuffer;
use serde::{Deserialize, Serialize};

/// Dense integer column.
///
/// The sentinel is `-1`; real negative values are stored one lower so the
/// two never collide.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenseInt {
    /// Entry `k - 1` holds the encoded value of key `k`.
    values: IntBuffer,
}

impl DenseInt {
    /// Build from `(key, value)` pairs with strictly increasing keys `>= 1`.
    pub fn build<I>(items: I) -> Result<Self>
    where
        I: IntoIterator<Item = (u32, i64)>,
    {
        let mut values: Vec<i64> = Vec::new();
        let mut previous = 0u32;

        for (key, value) in items {
            check_key(previous, key)?;
            values.resize(key as usize - 1, NONE_INT);
            values.push(encode_int(value)?);
            previous = key;
        }

        Ok(DenseInt {
            values: IntBuffer::from_values(&values)?,
        })
    }

    #[inline]
    pub fn get(&self, key: u32) -> Option<i64> {
        if key == 0 {
            return None;
        }
        self.values.get(key as usize - 1).and_then(decode_int)
    }

    pub fn last_key(&self) -> u32 {
        self.values.len() as u32
    }

    /// Present `(key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, i64)> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| decode_int(v).map(|v| (i as u32 + 1, v)))
    }

    pub fn stats(&self) -> ColumnStats {
        ColumnStats {
            encoding: Encoding::Dense,
            last_key: self.last_key(),
            entries: self.values.len(),
            buffers: vec![("values", self.values.integer_type(), self.values.byte_size())],
            blob_bytes: 0,
        }
    }
}

// ============================================================================
// PRESENCE BITS
// ============================================================================

/// One bit per key, set when the key carries a value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
struct PresenceBits {
    words: Vec<u64>,
}

impl PresenceBits {
    #[inline]
    fn word_bit_index(i: usize) -> (usize, usize) {
        (i / 64, i % 64)
    }

    fn set(&mut self, i: usize) {
        let (word, bit) = Self::word_bit_index(i);
        if self.words.len() <= word {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1u64 << bit;
    }

    #[inline]
    fn get(&self, i: usize) -> bool {
        let (word, bit) = Self::word_bit_index(i);
        self.words.get(word).is_some_and(|&w| (w >> bit) & 1 == 1)
    }

    fn byte_size(&self) -> usize {
        self.words.len() * 8
    }
}

/// Dense string column.
///
/// The value of key `k` is `blob[offsets[k - 1]..offsets[k]]`. Absent keys
/// get an empty range and a cleared presence bit, so the empty string stays
/// a real value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenseStr {
    offsets: IntBuffer,
    present: PresenceBits,
    blob: String,
}

impl Default for DenseStr {
    fn default() -> Self {
        DenseStr {
            offsets: IntBuffer::U8(vec![0]),
            present: PresenceBits::default(),
            blob: String::new(),
        }
    }
}

impl DenseStr {
    /// Build from `(key, value)` pairs with strictly increasing keys `>= 1`.
    pub fn build<I, S>(items: I) -> Result<Self>
    where
        I: IntoIterator<Item = (u32, S)>,
        S: AsRef<str>,
    {
        let mut offsets: Vec<i64> = vec![0];
        let mut present = PresenceBits::default();
        let mut blob = String::new();
        let mut previous = 0u32;

        for (key, value) in items {
            check_key(previous, key)?;
            offsets.resize(key as usize, blob.len() as i64);
            blob.push_str(value.as_ref());
            offsets.push(blob.len() as i64);
            present.set(key as usize - 1);
            previous = key;
        }

        Ok(DenseStr {
            offsets: IntBuffer::from_values(&offsets)?,
            present,
            blob,
        })
    }

    #[inline]
    pub fn get(&self, key: u32) -> Option<&str> {
        if key == 0 || !self.present.get(key as usize - 1) {
            return None;
        }
        let start = self.offsets.get(key as usize - 1)?;
        let end = self.offsets.get(key as usize)?;
        self.blob.get(start as usize..end as usize)
    }

    pub fn last_key(&self) -> u32 {
        self.offsets.len().saturating_sub(1) as u32
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> + '_ {
        (1..=self.last_key()).filter_map(move |k| self.get(k).map(|v| (k, v)))
    }

    pub fn stats(&self) -> ColumnStats {
        ColumnStats {
            encoding: Encoding::Dense,
            last_key: self.last_key(),
            entries: self.last_key() as usize,
            buffers: vec![
                ("offsets", self.offsets.integer_type(), self.offsets.byte_size()),
                ("present", crate::width::IntegerType::U64, self.present.byte_size()),
            ],
            blob_bytes: self.blob.len(),
        }
    }
}
