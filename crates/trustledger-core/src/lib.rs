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

//! trustledger-core
//!
//! Trust scoring and ledger admission for evidentiary artifacts.
//!
//! This crate implements:
//! - A six-dimension trust score (Source, Time, Chain, Network, Outcomes, Justice)
//! - Tier-dependent score degradation until an artifact is minted
//! - Hash-chained, append-only custody history per artifact
//! - Contradiction tracking over typed atomic facts within a case
//! - A minting gate that admits artifacts into a hash-chained block ledger,
//!   plus Ed25519-signed ledger checkpoints

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod artifact;
pub mod checkpoint;
pub mod clock;
pub mod config;
pub mod contradiction;
pub mod custody;
pub mod decay;
pub mod engine;
pub mod error;
pub mod gate;
pub mod hashing;
pub mod ledger;
pub mod score;
pub mod telemetry;

pub use crate::error::{TrustLedgerError, TrustLedgerResult};

pub use crate::artifact::{
    ArtifactId, ArtifactRegistration, ArtifactStatus, CaseId, EvidenceArtifact, Tier,
};
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::config::{
    AdmissionConfig, DEFAULT_COMPOSITE_THRESHOLD, DEFAULT_DIMENSION_FLOOR_RATIO,
};
pub use crate::contradiction::{
    Contradiction, ContradictionId, FactContent, FactDraft, FactId, FactInsertion, FactType,
    Resolution,
};
pub use crate::custody::{CustodyAction, CustodyEntry, CustodyReport};
pub use crate::engine::AdmissionEngine;
pub use crate::gate::EligibilityReport;
pub use crate::ledger::{Block, BlockRef, FileLedgerStore, LedgerStore, MemoryLedgerStore};
pub use crate::score::{Dimension, SixDimensionScore, TrustLevel};
