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
use serde::{Deserialize, Serialize};

use crate::artifact::{ArtifactId, ArtifactStatus};
use crate::error::{IntegrityScope, TrustLedgerError, TrustLedgerResult};
use crate::hashing::{hash_canonical, hex32, to_hex, Hash32, GENESIS_HASH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustodyAction {
    Uploaded,
    Transferred,
    Verified,
    Analyzed,
}

#[derive(Serialize)]
struct EntryPreimage<'a> {
    action: CustodyAction,
    actor: &'a str,
    timestamp: DateTime<Utc>,
    prev_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodyEntry {
    pub action: CustodyAction,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
    #[serde(with = "hex32")]
    pub prev_hash: Hash32,
    #[serde(with = "hex32")]
    pub entry_hash: Hash32,
}

impl CustodyEntry {
    pub fn compute_hash(
        action: CustodyAction,
        actor: &str,
        timestamp: DateTime<Utc>,
        prev_hash: &Hash32,
    ) -> TrustLedgerResult<Hash32> {
        hash_canonical(&EntryPreimage {
            action,
            actor,
            timestamp,
            prev_hash: to_hex(prev_hash),
        })
    }

    pub fn recompute_hash(&self) -> TrustLedgerResult<Hash32> {
        Self::compute_hash(self.action, &self.actor, self.timestamp, &self.prev_hash)
    }
}

/// First broken link found by [`CustodyChain::verify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustodyBreak {
    /// `prev_hash` does not reference the preceding entry (or the sentinel).
    Link(usize),
    /// Stored `entry_hash` does not recompute from the entry's fields.
    Content(usize),
    /// Timestamp precedes the preceding entry's.
    Order(usize),
}

impl CustodyBreak {
    pub fn index(&self) -> usize {
        match *self {
            CustodyBreak::Link(i) | CustodyBreak::Content(i) | CustodyBreak::Order(i) => i,
        }
    }
}

impl From<CustodyBreak> for TrustLedgerError {
    fn from(b: CustodyBreak) -> Self {
        TrustLedgerError::IntegrityViolation {
            scope: IntegrityScope::Custody,
            index: b.index(),
        }
    }
}

/// Append-only, hash-linked handling history of one artifact.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustodyChain {
    entries: Vec<CustodyEntry>,
    sealed: bool,
}

impl CustodyChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[CustodyEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn head_hash(&self) -> Hash32 {
        self.entries
            .last()
            .map(|e| e.entry_hash)
            .unwrap_or(GENESIS_HASH)
    }

    pub fn has_action(&self, action: CustodyAction) -> bool {
        self.entries.iter().any(|e| e.action == action)
    }

    /// Stops further appends. Called once the owning artifact is minted.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn append(
        &mut self,
        action: CustodyAction,
        actor: &str,
        timestamp: DateTime<Utc>,
    ) -> TrustLedgerResult<CustodyEntry> {
        if self.sealed {
            return Err(TrustLedgerError::ArtifactSealed);
        }
        if actor.trim().is_empty() {
            return Err(TrustLedgerError::InvalidArgument(
                "custody actor must be non-empty".to_string(),
            ));
        }
        if let Some(last) = self.entries.last() {
            if timestamp < last.timestamp {
                return Err(TrustLedgerError::NonMonotonicTimestamp);
            }
        }
        let prev_hash = self.head_hash();
        let entry_hash = CustodyEntry::compute_hash(action, actor, timestamp, &prev_hash)?;
        let entry = CustodyEntry {
            action,
            actor: actor.to_string(),
            timestamp,
            prev_hash,
            entry_hash,
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }

    /// Walks the chain from the sentinel and reports the first broken entry.
    pub fn verify(&self) -> Result<(), CustodyBreak> {
        let mut expected_prev = GENESIS_HASH;
        let mut last_ts: Option<DateTime<Utc>> = None;
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.prev_hash != expected_prev {
                return Err(CustodyBreak::Link(i));
            }
            match entry.recompute_hash() {
                Ok(h) if h == entry.entry_hash => {}
                _ => return Err(CustodyBreak::Content(i)),
            }
            if last_ts.is_some_and(|t| entry.timestamp < t) {
                return Err(CustodyBreak::Order(i));
            }
            last_ts = Some(entry.timestamp);
            expected_prev = entry.entry_hash;
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn entries_mut(&mut self) -> &mut Vec<CustodyEntry> {
        &mut self.entries
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustodyReport {
    pub artifact_id: ArtifactId,
    pub status: ArtifactStatus,
    pub sealed: bool,
    pub entries: Vec<CustodyEntry>,
    pub intact: bool,
    pub broken_at: Option<usize>,
    pub head_hash_hex: String,
}

impl CustodyReport {
    pub fn build(artifact_id: ArtifactId, status: ArtifactStatus, chain: &CustodyChain) -> Self {
        let outcome = chain.verify();
        Self {
            artifact_id,
            status,
            sealed: chain.is_sealed(),
            entries: chain.entries().to_vec(),
            intact: outcome.is_ok(),
            broken_at: outcome.err().map(|b| b.index()),
            head_hash_hex: to_hex(&chain.head_hash()),
        }
    }
}
