//! Minimal-width integer selection and narrow numeric buffers.
//!
//! Every numeric array in a column (values, keys, byte offsets) is stored in
//! the narrowest fixed-width integer type that holds its realized range.
//! [`select`] makes that choice from three boundary tables that are computed
//! once per process; [`IntBuffer`] is the storage that results from it.
//!
//! # Example
//!
//! ```
//! use corpus_fabric::width::{select, IntegerType};
//!
//! assert_eq!(select(0, 255).unwrap(), IntegerType::U8);
//! assert_eq!(select(-1, 255).unwrap(), IntegerType::I16);
//! assert!(select(-1, u64::MAX as i128).is_err());
//! ```

use crate::error::{FabricError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::sync::OnceLock;

// ============================================================================
// INTEGER TYPES
// ============================================================================

/// A fixed-width integer representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntegerType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
}

impl IntegerType {
    pub const ALL: [IntegerType; 8] = [
        IntegerType::U8,
        IntegerType::I8,
        IntegerType::U16,
        IntegerType::I16,
        IntegerType::U32,
        IntegerType::I32,
        IntegerType::U64,
        IntegerType::I64,
    ];

    /// Storage size of one value in bytes.
    #[inline]
    pub fn byte_width(self) -> usize {
        match self {
            IntegerType::U8 | IntegerType::I8 => 1,
            IntegerType::U16 | IntegerType::I16 => 2,
            IntegerType::U32 | IntegerType::I32 => 4,
            IntegerType::U64 | IntegerType::I64 => 8,
        }
    }

    #[inline]
    pub fn is_signed(self) -> bool {
        matches!(
            self,
            IntegerType::I8 | IntegerType::I16 | IntegerType::I32 | IntegerType::I64
        )
    }

    /// Declared rank: 0 for one byte up to 3 for eight bytes.
    #[inline]
    pub fn rank(self) -> u32 {
        self.byte_width().trailing_zeros()
    }

    pub fn min_value(self) -> i128 {
        if self.is_signed() {
            -(1i128 << (self.byte_width() * 8 - 1))
        } else {
            0
        }
    }

    pub fn max_value(self) -> i128 {
        let bits = self.byte_width() * 8;
        if self.is_signed() {
            (1i128 << (bits - 1)) - 1
        } else {
            (1i128 << bits) - 1
        }
    }

    /// Whether `value` is representable in this type.
    #[inline]
    pub fn contains(self, value: i128) -> bool {
        self.min_value() <= value && value <= self.max_value()
    }

    /// One-letter code, as used by typed-array libraries.
    pub fn type_code(self) -> char {
        match self {
            IntegerType::U8 => 'B',
            IntegerType::I8 => 'b',
            IntegerType::U16 => 'H',
            IntegerType::I16 => 'h',
            IntegerType::U32 => 'I',
            IntegerType::I32 => 'i',
            IntegerType::U64 => 'Q',
            IntegerType::I64 => 'q',
        }
    }
}

impl fmt::Display for IntegerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IntegerType::U8 => "u8",
            IntegerType::I8 => "i8",
            IntegerType::U16 => "u16",
            IntegerType::I16 => "i16",
            IntegerType::U32 => "u32",
            IntegerType::I32 => "i32",
            IntegerType::U64 => "u64",
            IntegerType::I64 => "i64",
        };
        f.write_str(name)
    }
}

// ============================================================================
// WIDTH SELECTION
// ============================================================================

struct Boundaries {
    /// Maximal values of the unsigned types, ascending.
    unsigned_max: Vec<(i128, IntegerType)>,
    /// Magnitudes of the minimal values of the signed types, ascending.
    signed_min: Vec<(i128, IntegerType)>,
    /// Maximal values of the signed types, ascending.
    signed_max: Vec<(i128, IntegerType)>,
}

fn boundaries() -> &'static Boundaries {
    static TABLES: OnceLock<Boundaries> = OnceLock::new();
    TABLES.get_or_init(|| {
        let mut unsigned_max = Vec::new();
        let mut signed_min = Vec::new();
        let mut signed_max = Vec::new();

        for tp in IntegerType::ALL {
            if tp.is_signed() {
                signed_min.push((-tp.min_value(), tp));
                signed_max.push((tp.max_value(), tp));
            } else {
                unsigned_max.push((tp.max_value(), tp));
            }
        }

        unsigned_max.sort_unstable_by_key(|&(bound, _)| bound);
        signed_min.sort_unstable_by_key(|&(bound, _)| bound);
        signed_max.sort_unstable_by_key(|&(bound, _)| bound);

        Boundaries {
            unsigned_max,
            signed_min,
            signed_max,
        }
    })
}

/// Type of the smallest boundary `>= value`.
#[inline]
fn smallest_fitting(table: &[(i128, IntegerType)], value: i128) -> Option<IntegerType> {
    let pos = table.partition_point(|&(bound, _)| bound < value);
    table.get(pos).map(|&(_, tp)| tp)
}

/// Pick the narrowest integer type that represents every value in
/// `[min_value, max_value]`.
///
/// Non-negative ranges get an unsigned type. Ranges with a negative minimum
/// get the wider of the two signed types needed for the negative and the
/// positive extreme; on equal rank the negative-side candidate is kept.
pub fn select(min_value: i128, max_value: i128) -> Result<IntegerType> {
    debug_assert!(min_value <= max_value, "empty range [{min_value}, {max_value}]");
    let overflow = || FabricError::RangeOverflow {
        min: min_value,
        max: max_value,
    };
    let tables = boundaries();

    if min_value >= 0 {
        return smallest_fitting(&tables.unsigned_max, max_value).ok_or_else(overflow);
    }

    let magnitude = min_value.checked_neg().ok_or_else(overflow)?;
    let neg_side = smallest_fitting(&tables.signed_min, magnitude).ok_or_else(overflow)?;
    let pos_side = smallest_fitting(&tables.signed_max, max_value).ok_or_else(overflow)?;

    Ok(if pos_side.rank() > neg_side.rank() {
        pos_side
    } else {
        neg_side
    })
}

// ============================================================================
// NARROW BUFFERS
// ============================================================================

/// A numeric array stored at the width chosen by [`select`].
///
/// All reads widen to `i64`; a buffer is only ever built from `i64` values,
/// so even `U64` contents fit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntBuffer {
    U8(Vec<u8>),
    I8(Vec<i8>),
    U16(Vec<u16>),
    I16(Vec<i16>),
    U32(Vec<u32>),
    I32(Vec<i32>),
    U64(Vec<u64>),
    I64(Vec<i64>),
}

macro_rules! with_buffer {
    ($buf:expr, $v:ident => $body:expr) => {
        match $buf {
            IntBuffer::U8($v) => $body,
            IntBuffer::I8($v) => $body,
            IntBuffer::U16($v) => $body,
            IntBuffer::I16($v) => $body,
            IntBuffer::U32($v) => $body,
            IntBuffer::I32($v) => $body,
            IntBuffer::U64($v) => $body,
            IntBuffer::I64($v) => $body,
        }
    };
}

impl Default for IntBuffer {
    fn default() -> Self {
        IntBuffer::U8(Vec::new())
    }
}

impl IntBuffer {
    /// Store `values` at the narrowest width holding their range.
    pub fn from_values(values: &[i64]) -> Result<Self> {
        let min = values.iter().copied().min().unwrap_or(0);
        let max = values.iter().copied().max().unwrap_or(0);
        let tp = select(min as i128, max as i128)?;
        Ok(Self::with_type(tp, values))
    }

    /// Store unsigned 32-bit values at the narrowest unsigned width.
    ///
    /// Cannot fail: every `u32` range fits `U32`.
    pub fn from_unsigned(values: &[u32]) -> Self {
        let max = values.iter().copied().max().unwrap_or(0);
        let tp = select(0, max as i128).unwrap_or(IntegerType::U32);
        let wide: Vec<i64> = values.iter().map(|&v| v as i64).collect();
        Self::with_type(tp, &wide)
    }

    /// Store `values` as `tp`. Every value must be representable in `tp`.
    pub fn with_type(tp: IntegerType, values: &[i64]) -> Self {
        debug_assert!(values.iter().all(|&v| tp.contains(v as i128)));
        match tp {
            IntegerType::U8 => IntBuffer::U8(values.iter().map(|&v| v as u8).collect()),
            IntegerType::I8 => IntBuffer::I8(values.iter().map(|&v| v as i8).collect()),
            IntegerType::U16 => IntBuffer::U16(values.iter().map(|&v| v as u16).collect()),
            IntegerType::I16 => IntBuffer::I16(values.iter().map(|&v| v as i16).collect()),
            IntegerType::U32 => IntBuffer::U32(values.iter().map(|&v| v as u32).collect()),
            IntegerType::I32 => IntBuffer::I32(values.iter().map(|&v| v as i32).collect()),
            IntegerType::U64 => IntBuffer::U64(values.iter().map(|&v| v as u64).collect()),
            IntegerType::I64 => IntBuffer::I64(values.to_vec()),
        }
    }

    pub fn integer_type(&self) -> IntegerType {
        match self {
            IntBuffer::U8(_) => IntegerType::U8,
            IntBuffer::I8(_) => IntegerType::I8,
            IntBuffer::U16(_) => IntegerType::U16,
            IntBuffer::I16(_) => IntegerType::I16,
            IntBuffer::U32(_) => IntegerType::U32,
            IntBuffer::I32(_) => IntegerType::I32,
            IntBuffer::U64(_) => IntegerType::U64,
            IntBuffer::I64(_) => IntegerType::I64,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        with_buffer!(self, v => v.len())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<i64> {
        with_buffer!(self, v => v.get(index).map(|&x| x as i64))
    }

    /// Bytes occupied by the values.
    pub fn byte_size(&self) -> usize {
        self.len() * self.integer_type().byte_width()
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }

    /// Number of leading entries `<= key`. The buffer must be ascending.
    #[inline]
    pub fn upper_bound(&self, key: i64) -> usize {
        with_buffer!(self, v => v.partition_point(|&x| (x as i64) <= key))
    }

    /// Position of `value` inside the ascending sub-slice `range`.
    pub fn find_in(&self, range: Range<usize>, value: i64) -> Option<usize> {
        let start = range.start;
        with_buffer!(self, v => v
            .get(range)
            .and_then(|s| s.binary_search_by(|&x| (x as i64).cmp(&value)).ok())
            .map(|p| p + start))
    }
}
