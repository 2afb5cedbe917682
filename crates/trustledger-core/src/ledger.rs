// Copyright [2026] [Joseph Verdicchio]
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// Copyright (c) 2026 Joseph Verdicchio and EvidenceOS Contributors
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::artifact::ArtifactId;
use crate::error::{IntegrityScope, TrustLedgerError, TrustLedgerResult};
use crate::hashing::{canonical_json, hash_canonical, hex32, to_hex, Hash32, GENESIS_HASH};

#[derive(Serialize)]
struct BlockPreimage<'a> {
    block_number: u64,
    artifact_id: &'a ArtifactId,
    timestamp: DateTime<Utc>,
    prev_hash: String,
    data_hash: String,
}

/// Immutable admission record; one per minted artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub block_number: u64,
    pub artifact_id: ArtifactId,
    pub timestamp: DateTime<Utc>,
    #[serde(with = "hex32")]
    pub prev_hash: Hash32,
    #[serde(with = "hex32")]
    pub data_hash: Hash32,
    #[serde(with = "hex32")]
    pub block_hash: Hash32,
}

impl Block {
    pub fn seal(
        block_number: u64,
        artifact_id: ArtifactId,
        timestamp: DateTime<Utc>,
        prev_hash: Hash32,
        data_hash: Hash32,
    ) -> TrustLedgerResult<Self> {
        let block_hash =
            Self::compute_hash(block_number, &artifact_id, timestamp, &prev_hash, &data_hash)?;
        Ok(Self {
            block_number,
            artifact_id,
            timestamp,
            prev_hash,
            data_hash,
            block_hash,
        })
    }

    fn compute_hash(
        block_number: u64,
        artifact_id: &ArtifactId,
        timestamp: DateTime<Utc>,
        prev_hash: &Hash32,
        data_hash: &Hash32,
    ) -> TrustLedgerResult<Hash32> {
        hash_canonical(&BlockPreimage {
            block_number,
            artifact_id,
            timestamp,
            prev_hash: to_hex(prev_hash),
            data_hash: to_hex(data_hash),
        })
    }

    pub fn recompute_hash(&self) -> TrustLedgerResult<Hash32> {
        Self::compute_hash(
            self.block_number,
            &self.artifact_id,
            self.timestamp,
            &self.prev_hash,
            &self.data_hash,
        )
    }

    pub fn reference(&self) -> BlockRef {
        BlockRef {
            block_number: self.block_number,
            artifact_id: self.artifact_id.clone(),
            block_hash_hex: to_hex(&self.block_hash),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRef {
    pub block_number: u64,
    pub artifact_id: ArtifactId,
    pub block_hash_hex: String,
}

/// Checks that `block` may follow `head`.
pub fn check_successor(head: Option<&Block>, block: &Block) -> TrustLedgerResult<()> {
    let (expected_number, expected_prev) = match head {
        Some(h) => (h.block_number + 1, h.block_hash),
        None => (1, GENESIS_HASH),
    };
    if block.block_number != expected_number {
        return Err(TrustLedgerError::Store(format!(
            "block number {} does not follow {}",
            block.block_number,
            expected_number - 1
        )));
    }
    if block.prev_hash != expected_prev {
        return Err(TrustLedgerError::Store(
            "prev_hash does not match ledger head".to_string(),
        ));
    }
    match block.recompute_hash() {
        Ok(h) if h == block.block_hash => Ok(()),
        _ => Err(TrustLedgerError::Store("block hash mismatch".to_string())),
    }
}

/// Walks a block sequence from genesis; `Err(i)` names the first bad block.
pub fn verify_chain(blocks: &[Block]) -> Result<(), usize> {
    let mut prev_hash = GENESIS_HASH;
    let mut prev_number = 0u64;
    for (i, b) in blocks.iter().enumerate() {
        if b.block_number <= prev_number || b.prev_hash != prev_hash {
            return Err(i);
        }
        match b.recompute_hash() {
            Ok(h) if h == b.block_hash => {}
            _ => return Err(i),
        }
        prev_hash = b.block_hash;
        prev_number = b.block_number;
    }
    Ok(())
}

pub fn ledger_violation(index: usize) -> TrustLedgerError {
    TrustLedgerError::IntegrityViolation {
        scope: IntegrityScope::Ledger,
        index,
    }
}

/// Persistence seam for the global block sequence.
///
/// `append` is all-or-nothing: it either stores a block that extends the
/// current head or leaves the store untouched.
pub trait LedgerStore: Send + Sync {
    fn head(&self) -> TrustLedgerResult<Option<Block>>;
    fn append(&self, block: &Block) -> TrustLedgerResult<()>;
    fn get(&self, block_number: u64) -> TrustLedgerResult<Option<Block>>;
    fn blocks(&self) -> TrustLedgerResult<Vec<Block>>;
    fn find_by_artifact(&self, artifact_id: &ArtifactId) -> TrustLedgerResult<Option<Block>>;
    fn len(&self) -> TrustLedgerResult<u64>;

    fn is_empty(&self) -> TrustLedgerResult<bool> {
        Ok(self.len()? == 0)
    }
}

#[derive(Debug, Default)]
struct BlockIndex {
    blocks: Vec<Block>,
    by_artifact: HashMap<ArtifactId, usize>,
}

impl BlockIndex {
    fn push(&mut self, block: Block) -> TrustLedgerResult<()> {
        if self.by_artifact.contains_key(&block.artifact_id) {
            return Err(TrustLedgerError::Store(format!(
                "artifact {} already has a block",
                block.artifact_id
            )));
        }
        self.by_artifact
            .insert(block.artifact_id.clone(), self.blocks.len());
        self.blocks.push(block);
        Ok(())
    }

    fn check(&self, block: &Block) -> TrustLedgerResult<()> {
        check_successor(self.blocks.last(), block)?;
        if self.by_artifact.contains_key(&block.artifact_id) {
            return Err(TrustLedgerError::Store(format!(
                "artifact {} already has a block",
                block.artifact_id
            )));
        }
        Ok(())
    }

    fn get(&self, block_number: u64) -> Option<Block> {
        // Numbers are allocated densely from 1.
        let idx = usize::try_from(block_number.checked_sub(1)?).ok()?;
        self.blocks
            .get(idx)
            .filter(|b| b.block_number == block_number)
            .cloned()
    }

    fn by_artifact(&self, artifact_id: &ArtifactId) -> Option<Block> {
        self.by_artifact
            .get(artifact_id)
            .and_then(|&i| self.blocks.get(i))
            .cloned()
    }
}

#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    inner: RwLock<BlockIndex>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn head(&self) -> TrustLedgerResult<Option<Block>> {
        Ok(self.inner.read().blocks.last().cloned())
    }

    fn append(&self, block: &Block) -> TrustLedgerResult<()> {
        let mut inner = self.inner.write();
        inner.check(block)?;
        inner.push(block.clone())
    }

    fn get(&self, block_number: u64) -> TrustLedgerResult<Option<Block>> {
        Ok(self.inner.read().get(block_number))
    }

    fn blocks(&self) -> TrustLedgerResult<Vec<Block>> {
        Ok(self.inner.read().blocks.clone())
    }

    fn find_by_artifact(&self, artifact_id: &ArtifactId) -> TrustLedgerResult<Option<Block>> {
        Ok(self.inner.read().by_artifact(artifact_id))
    }

    fn len(&self) -> TrustLedgerResult<u64> {
        Ok(self.inner.read().blocks.len() as u64)
    }
}

fn io_err(e: std::io::Error) -> TrustLedgerError {
    TrustLedgerError::Store(e.to_string())
}

#[derive(Debug)]
struct FileInner {
    file: File,
    index: BlockIndex,
}

/// Append-only file of length-prefixed canonical-JSON blocks.
///
/// Records are not re-validated on open; `verify_ledger` does that, so a
/// tampered file opens and then reports where it breaks.
#[derive(Debug)]
pub struct FileLedgerStore {
    path: PathBuf,
    inner: Mutex<FileInner>,
}

impl FileLedgerStore {
    pub fn open_or_create(path: impl AsRef<Path>) -> TrustLedgerResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;
        let mut reader = BufReader::new(File::open(&path).map_err(io_err)?);
        let mut index = BlockIndex::default();
        let mut record = 0usize;
        loop {
            let mut len_bytes = [0u8; 4];
            match reader.read_exact(&mut len_bytes) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(io_err(e)),
            }
            let len = u32::from_le_bytes(len_bytes) as usize;
            let mut data = vec![0u8; len];
            reader.read_exact(&mut data).map_err(|_| {
                TrustLedgerError::Store(format!("truncated ledger record {record}"))
            })?;
            let block: Block = serde_json::from_slice(&data)
                .map_err(|e| TrustLedgerError::Store(format!("ledger record {record}: {e}")))?;
            index.push(block)?;
            record += 1;
        }
        tracing::debug!(
            target: "trustledger.ledger",
            path = %path.display(),
            blocks = index.blocks.len(),
            "ledger opened"
        );
        Ok(Self {
            path,
            inner: Mutex::new(FileInner { file, index }),
        })
    }
}

fn write_record(file: &mut File, data: &[u8]) -> std::io::Result<()> {
    let len = u32::try_from(data.len())
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "record too large"))?;
    file.write_all(&len.to_le_bytes())?;
    file.write_all(data)?;
    file.flush()?;
    file.sync_data()
}

impl LedgerStore for FileLedgerStore {
    fn head(&self) -> TrustLedgerResult<Option<Block>> {
        Ok(self.inner.lock().index.blocks.last().cloned())
    }

    fn append(&self, block: &Block) -> TrustLedgerResult<()> {
        let mut inner = self.inner.lock();
        inner.index.check(block)?;
        let data = canonical_json(block)?;
        let start = inner.file.seek(SeekFrom::End(0)).map_err(io_err)?;
        if let Err(e) = write_record(&mut inner.file, &data) {
            // Drop any partial record so the file stays a valid prefix.
            if let Err(rollback) = inner.file.set_len(start) {
                tracing::error!(
                    target: "trustledger.ledger",
                    path = %self.path.display(),
                    error = %rollback,
                    "failed to roll back partial ledger write"
                );
            }
            return Err(io_err(e));
        }
        inner.index.push(block.clone())
    }

    fn get(&self, block_number: u64) -> TrustLedgerResult<Option<Block>> {
        Ok(self.inner.lock().index.get(block_number))
    }

    fn blocks(&self) -> TrustLedgerResult<Vec<Block>> {
        Ok(self.inner.lock().index.blocks.clone())
    }

    fn find_by_artifact(&self, artifact_id: &ArtifactId) -> TrustLedgerResult<Option<Block>> {
        Ok(self.inner.lock().index.by_artifact(artifact_id))
    }

    fn len(&self) -> TrustLedgerResult<u64> {
        Ok(self.inner.lock().index.blocks.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::sha256;
    use chrono::TimeZone;

    fn ts(min: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap() + chrono::Duration::minutes(min)
    }

    fn chain(n: u64) -> Vec<Block> {
        let mut out: Vec<Block> = Vec::new();
        for i in 1..=n {
            let prev = out.last().map(|b| b.block_hash).unwrap_or(GENESIS_HASH);
            out.push(
                Block::seal(
                    i,
                    ArtifactId::new(format!("art-{i}")),
                    ts(i as i64),
                    prev,
                    sha256(format!("data-{i}").as_bytes()),
                )
                .unwrap(),
            );
        }
        out
    }

    #[test]
    fn memory_store_enforces_succession() {
        let store = MemoryLedgerStore::new();
        let blocks = chain(3);
        assert!(store.append(&blocks[1]).is_err());
        for b in &blocks {
            store.append(b).unwrap();
        }
        assert_eq!(store.len().unwrap(), 3);
        assert_eq!(store.get(2).unwrap(), Some(blocks[1].clone()));
        assert_eq!(store.get(0).unwrap(), None);
        assert_eq!(store.get(9).unwrap(), None);
        assert_eq!(
            store.find_by_artifact(&ArtifactId::new("art-3")).unwrap(),
            Some(blocks[2].clone())
        );
        assert!(store.append(&blocks[2]).is_err());
        assert!(verify_chain(&store.blocks().unwrap()).is_ok());
    }

    #[test]
    fn second_block_for_same_artifact_rejected() {
        let store = MemoryLedgerStore::new();
        let first = chain(1).remove(0);
        store.append(&first).unwrap();
        let dup = Block::seal(
            2,
            first.artifact_id.clone(),
            ts(5),
            first.block_hash,
            sha256(b"again"),
        )
        .unwrap();
        assert!(matches!(store.append(&dup), Err(TrustLedgerError::Store(_))));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn verify_chain_reports_first_tampered_block() {
        let mut blocks = chain(5);
        blocks[3].data_hash[0] ^= 1;
        assert_eq!(verify_chain(&blocks), Err(3));

        let mut blocks = chain(5);
        blocks.remove(2);
        assert_eq!(verify_chain(&blocks), Err(2));
    }

    #[test]
    fn file_store_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.log");
        let blocks = chain(4);
        {
            let store = FileLedgerStore::open_or_create(&path).unwrap();
            for b in &blocks {
                store.append(b).unwrap();
            }
        }
        let store = FileLedgerStore::open_or_create(&path).unwrap();
        assert_eq!(store.blocks().unwrap(), blocks);
        assert_eq!(store.head().unwrap(), blocks.last().cloned());
        let next = Block::seal(
            5,
            ArtifactId::new("art-5"),
            ts(9),
            blocks[3].block_hash,
            sha256(b"five"),
        )
        .unwrap();
        store.append(&next).unwrap();
        assert_eq!(store.len().unwrap(), 5);
    }

    #[test]
    fn file_store_rejects_truncated_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.log");
        {
            let store = FileLedgerStore::open_or_create(&path).unwrap();
            for b in &chain(2) {
                store.append(b).unwrap();
            }
        }
        let len = std::fs::metadata(&path).unwrap().len();
        let f = OpenOptions::new().write(true).open(&path).unwrap();
        f.set_len(len - 7).unwrap();
        assert!(matches!(
            FileLedgerStore::open_or_create(&path),
            Err(TrustLedgerError::Store(_))
        ));
    }

    #[test]
    fn tampered_file_opens_but_fails_verification() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.log");
        let mut blocks = chain(3);
        blocks[1].timestamp = ts(60);
        {
            let mut f = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .unwrap();
            for b in &blocks {
                write_record(&mut f, &canonical_json(b).unwrap()).unwrap();
            }
        }
        let store = FileLedgerStore::open_or_create(&path).unwrap();
        assert_eq!(verify_chain(&store.blocks().unwrap()), Err(1));
    }
}
