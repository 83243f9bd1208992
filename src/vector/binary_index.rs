//! Flat Hamming index over quantized codes.
//!
//! One file per collection holding every point's packed code. It is always
//! rebuilt wholesale from the point files, never patched per write, and read
//! back through a memory map so a query touches only the pages it scans.
//!
//! # Storage Format
//!
//! - Header (20 bytes): magic bytes, version, code width, entry count
//! - Records: `u32` id length, UTF-8 id bytes, `code width` code bytes
//!
//! All integers are little-endian.

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::{Mmap, MmapOptions};

use crate::error::{CorruptionError, StoreError, StoreResult};
use crate::storage::fsops;
use crate::types::PointId;
use crate::vector::distance::hamming_distance;

/// File name of the Hamming index inside a collection directory.
pub const INDEX_FILE: &str = "vector_index.bin";

/// Magic bytes to identify Hamming index files.
const MAGIC_BYTES: &[u8; 4] = b"CVBI";

/// Current index format version.
const INDEX_VERSION: u32 = 1;

/// Size of the header in bytes.
const HEADER_SIZE: usize = 20;

/// A shortlisted point and its Hamming distance to the query code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HammingCandidate {
    pub id: PointId,
    pub distance: u32,
}

/// Serializes `entries` and atomically replaces the index at `path`.
pub fn write_index(path: &Path, code_len: usize, entries: &[(PointId, Vec<u8>)]) -> StoreResult<()> {
    let body_len: usize = entries
        .iter()
        .map(|(id, _)| 4 + id.as_str().len() + code_len)
        .sum();
    let mut bytes = Vec::with_capacity(HEADER_SIZE + body_len);
    bytes.extend_from_slice(MAGIC_BYTES);
    bytes.extend_from_slice(&INDEX_VERSION.to_le_bytes());
    bytes.extend_from_slice(&(code_len as u32).to_le_bytes());
    bytes.extend_from_slice(&(entries.len() as u64).to_le_bytes());

    for (id, code) in entries {
        if code.len() != code_len {
            return Err(CorruptionError::unparsable(
                path,
                format!(
                    "code for point '{id}' is {} bytes, index width is {code_len}",
                    code.len()
                ),
            )
            .into());
        }
        let id = id.as_str().as_bytes();
        bytes.extend_from_slice(&(id.len() as u32).to_le_bytes());
        bytes.extend_from_slice(id);
        bytes.extend_from_slice(code);
    }

    fsops::write_atomic(path, &bytes)
}

/// Read-only view over a persisted Hamming index.
#[derive(Debug)]
pub struct BinaryIndex {
    path: PathBuf,
    mmap: Mmap,
    code_len: usize,
    count: usize,
}

impl BinaryIndex {
    /// Maps the index file and validates its header.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CorruptionError::missing(path).into());
            }
            Err(e) => return Err(StoreError::io(path, e)),
        };
        // SAFETY: the file is only ever replaced by rename, never written in
        // place, so the mapped inode does not change under us.
        let mmap = unsafe { MmapOptions::new().map(&file) }.map_err(|e| StoreError::io(path, e))?;

        if mmap.len() < HEADER_SIZE || &mmap[0..4] != MAGIC_BYTES {
            return Err(CorruptionError::unparsable(path, "invalid index header").into());
        }
        let version = u32::from_le_bytes([mmap[4], mmap[5], mmap[6], mmap[7]]);
        if version != INDEX_VERSION {
            return Err(CorruptionError::unparsable(
                path,
                format!("unsupported index version {version}, expected {INDEX_VERSION}"),
            )
            .into());
        }
        let code_len = u32::from_le_bytes([mmap[8], mmap[9], mmap[10], mmap[11]]) as usize;
        let mut count_bytes = [0u8; 8];
        count_bytes.copy_from_slice(&mmap[12..20]);
        let count = u64::from_le_bytes(count_bytes) as usize;

        Ok(Self {
            path: path.to_path_buf(),
            mmap,
            code_len,
            count,
        })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn code_len(&self) -> usize {
        self.code_len
    }

    fn truncated(&self) -> StoreError {
        CorruptionError::unparsable(&self.path, "index records are truncated").into()
    }

    /// Ranks every stored code by Hamming distance to `query_code` and keeps
    /// the `candidates` closest.
    ///
    /// The shortlist is unordered beyond "closest first by distance"; ties
    /// keep no particular order. Exact scoring is the caller's job.
    pub fn search(&self, query_code: &[u8], candidates: usize) -> StoreResult<Vec<HammingCandidate>> {
        if query_code.len() != self.code_len {
            return Err(CorruptionError::unparsable(
                &self.path,
                format!(
                    "query code is {} bytes, index width is {}",
                    query_code.len(),
                    self.code_len
                ),
            )
            .into());
        }

        let data = &self.mmap[HEADER_SIZE..];
        let mut scored: Vec<(u32, usize, usize)> = Vec::with_capacity(self.count);
        let mut offset = 0;
        for _ in 0..self.count {
            let len_bytes = data.get(offset..offset + 4).ok_or_else(|| self.truncated())?;
            let id_len =
                u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
            let id_start = offset + 4;
            let code_start = id_start + id_len;
            let code = data
                .get(code_start..code_start + self.code_len)
                .ok_or_else(|| self.truncated())?;
            scored.push((hamming_distance(query_code, code), id_start, id_len));
            offset = code_start + self.code_len;
        }

        if candidates < scored.len() && candidates > 0 {
            scored.select_nth_unstable_by_key(candidates - 1, |&(distance, _, _)| distance);
            scored.truncate(candidates);
        } else if candidates == 0 {
            scored.clear();
        }
        scored.sort_unstable_by_key(|&(distance, _, _)| distance);

        scored
            .into_iter()
            .map(|(distance, start, len)| -> StoreResult<HammingCandidate> {
                let raw = std::str::from_utf8(&data[start..start + len])
                    .map_err(|e| CorruptionError::unparsable(&self.path, e))?;
                let id = PointId::new(raw).map_err(|e| CorruptionError::unparsable(&self.path, e))?;
                Ok(HammingCandidate { id, distance })
            })
            .collect()
    }
}
