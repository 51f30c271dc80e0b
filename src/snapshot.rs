//! Binary snapshots of a corpus.
//!
//! Layout:
//!
//! ```text
//! "CFS1" | version u8 | 0u8 | 0u16 | payload length u64 LE | SHA-256 (32) | payload
//! ```
//!
//! The payload is the bincode encoding of [`CorpusData`]. Derived structures
//! (the canonical order, slot extents) are rebuilt on load.

use crate::corpus::{Corpus, CorpusData};
use crate::error::{FabricError, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

pub const MAGIC: &[u8; 4] = b"CFS1";
pub const VERSION: u8 = 1;
const HEADER_LEN: usize = 16;
const DIGEST_LEN: usize = 32;

pub fn to_bytes(data: &CorpusData) -> Result<Vec<u8>> {
    let payload = bincode::serialize(data).map_err(|e| FabricError::Encode(e.to_string()))?;
    let digest = Sha256::digest(&payload);

    let mut out = Vec::with_capacity(HEADER_LEN + DIGEST_LEN + payload.len());
    out.extend_from_slice(MAGIC);
    out.push(VERSION);
    out.push(0);
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    out.extend_from_slice(&digest);
    out.extend_from_slice(&payload);
    Ok(out)
}

pub fn from_bytes(bytes: &[u8]) -> Result<CorpusData> {
    if bytes.len() < MAGIC.len() || &bytes[..MAGIC.len()] != MAGIC {
        return Err(FabricError::BadMagic);
    }
    if bytes.len() < HEADER_LEN + DIGEST_LEN {
        return Err(FabricError::Decode("truncated snapshot header".into()));
    }
    let version = bytes[4];
    if version != VERSION {
        return Err(FabricError::Decode(format!("unsupported snapshot version {version}")));
    }

    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&bytes[8..HEADER_LEN]);
    let payload_len = u64::from_le_bytes(len_bytes);
    let digest = &bytes[HEADER_LEN..HEADER_LEN + DIGEST_LEN];
    let payload = &bytes[HEADER_LEN + DIGEST_LEN..];
    if payload.len() as u64 != payload_len {
        return Err(FabricError::Decode(format!(
            "snapshot size mismatch: header says {payload_len} bytes, found {}",
            payload.len()
        )));
    }
    if Sha256::digest(payload).as_slice() != digest {
        return Err(FabricError::ChecksumMismatch);
    }

    bincode::deserialize(payload).map_err(|e| FabricError::Decode(e.to_string()))
}

impl Corpus {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        to_bytes(self.data())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Corpus> {
        Corpus::from_data(from_bytes(bytes)?)
    }

    /// Write a snapshot to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = self.to_bytes()?;
        fs::write(path.as_ref(), &bytes)?;
        tracing::info!(
            path = %path.as_ref().display(),
            bytes = bytes.len(),
            "saved corpus snapshot"
        );
        Ok(())
    }

    /// Read a snapshot from `path` and rebuild the derived structures.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Corpus> {
        let bytes = fs::read(path.as_ref())?;
        let corpus = Corpus::from_bytes(&bytes)?;
        tracing::info!(
            path = %path.as_ref().display(),
            max_node = corpus.max_node(),
            "loaded corpus snapshot"
        );
        Ok(corpus)
    }
}
