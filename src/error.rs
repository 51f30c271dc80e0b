//! Error types for column construction, corpus assembly and snapshots.
//!
//! Only build-time and I/O failures are errors. Lookups that find nothing
//! (a key outside a column, a node without edges, an empty neighbourhood)
//! are ordinary outcomes and are reported through `Option` or empty results.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FabricError {
    /// The value range of a column does not fit the widest integer type.
    #[error("value range [{min}, {max}] does not fit any supported integer width")]
    RangeOverflow { min: i128, max: i128 },

    /// Keys fed to a column builder were not strictly increasing.
    #[error("keys must be strictly increasing and start at 1: got {key} after {previous}")]
    MalformedInput { previous: u32, key: u32 },

    #[error("invalid corpus: {0}")]
    InvalidCorpus(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("not a corpus snapshot")]
    BadMagic,

    #[error("snapshot checksum mismatch")]
    ChecksumMismatch,
}

pub type Result<T> = std::result::Result<T, FabricError>;
