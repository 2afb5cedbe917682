// Copyright (c) 2026 Joseph Verdicchio and EvidenceOS Contributors
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use ed25519_dalek::{SigningKey, VerifyingKey};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::artifact::{
    ArtifactId, ArtifactRegistration, ArtifactStatus, CaseId, EvidenceArtifact, Tier,
};
use crate::checkpoint::{sign_checkpoint, verify_checkpoint, SignedCheckpoint};
use crate::clock::Clock;
use crate::config::AdmissionConfig;
use crate::contradiction::{
    Contradiction, ContradictionDetector, ContradictionId, FactDraft, FactInsertion, Resolution,
};
use crate::custody::{CustodyAction, CustodyBreak, CustodyChain, CustodyEntry, CustodyReport};
use crate::decay::DegradationModel;
use crate::error::{TrustLedgerError, TrustLedgerResult};
use crate::gate::{contradiction_reason, custody_reason, EligibilityReport, MintingGate};
use crate::hashing::{from_hex, hash_canonical, to_hex, GENESIS_HASH};
use crate::ledger::{ledger_violation, verify_chain, Block, BlockRef, LedgerStore};
use crate::score::{CustodySummary, ScoreEngine, ScoreInputs, SixDimensionScore, TrustLevel};
use crate::telemetry::{AdmissionTelemetry, TelemetrySnapshot};

#[derive(Debug)]
struct ArtifactRecord {
    artifact: EvidenceArtifact,
    custody: CustodyChain,
}

#[derive(Debug, Clone)]
struct ArtifactSlot {
    case_id: CaseId,
    tier: Tier,
    record: Arc<Mutex<ArtifactRecord>>,
}

/// Frozen artifact state committed to by a block's `data_hash`.
#[derive(Serialize)]
struct FrozenState<'a> {
    artifact: &'a EvidenceArtifact,
    custody_head: String,
    custody_len: usize,
}

struct Evaluation {
    score: SixDimensionScore,
    original: f64,
    current: f64,
    custody_break: Option<CustodyBreak>,
    active: Vec<ContradictionId>,
}

/// Owns every artifact's mutable state and drives scoring, custody,
/// contradiction tracking and minting against an injected ledger and clock.
///
/// Lock order: artifact record, then contradiction case, then the global
/// sequence. No path holds two artifact records at once.
pub struct AdmissionEngine {
    config: AdmissionConfig,
    scorer: ScoreEngine,
    decay: DegradationModel,
    gate: MintingGate,
    detector: ContradictionDetector,
    artifacts: RwLock<HashMap<ArtifactId, ArtifactSlot>>,
    ledger: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    sequence: Mutex<()>,
    telemetry: AdmissionTelemetry,
}

impl AdmissionEngine {
    pub fn new(
        config: AdmissionConfig,
        ledger: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
    ) -> TrustLedgerResult<Self> {
        config.validate()?;
        Ok(Self {
            scorer: ScoreEngine::new(&config),
            decay: DegradationModel::new(config.decay.clone()),
            gate: MintingGate::new(&config),
            detector: ContradictionDetector::new(config.amount_tolerance),
            artifacts: RwLock::new(HashMap::new()),
            ledger,
            clock,
            sequence: Mutex::new(()),
            telemetry: AdmissionTelemetry::new(),
            config,
        })
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerStore> {
        &self.ledger
    }

    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.telemetry.snapshot()
    }

    fn slot(&self, id: &ArtifactId) -> TrustLedgerResult<ArtifactSlot> {
        self.artifacts
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| TrustLedgerError::NotFound(format!("artifact {id}")))
    }

    pub fn register_artifact(
        &self,
        registration: ArtifactRegistration,
    ) -> TrustLedgerResult<EvidenceArtifact> {
        if registration.id.as_str().trim().is_empty() {
            return Err(TrustLedgerError::InvalidArgument(
                "artifact id must be non-empty".to_string(),
            ));
        }
        if registration.case_id.as_str().trim().is_empty() {
            return Err(TrustLedgerError::InvalidArgument(
                "case id must be non-empty".to_string(),
            ));
        }
        if let Some(h) = &registration.file_hash_hex {
            from_hex(h)?;
        }
        let now = self.clock.now();
        let mut custody = CustodyChain::new();
        custody.append(CustodyAction::Uploaded, &registration.uploaded_by, now)?;
        let mut record = ArtifactRecord {
            artifact: EvidenceArtifact::new(&registration, now),
            custody,
        };

        let mut artifacts = self.artifacts.write();
        if artifacts.contains_key(&registration.id) {
            return Err(TrustLedgerError::InvalidArgument(format!(
                "artifact {} already registered",
                registration.id
            )));
        }
        // No facts yet, so scoring needs neither the map nor a case lock.
        let eval = self.evaluate_with(&record, now, Vec::new())?;
        record.artifact.original_score = eval.original;
        record.artifact.current_score = eval.current;
        if let Some(block) = self.ledger.find_by_artifact(&registration.id)? {
            self.adopt_block(&mut record, &block)?;
        }
        let snapshot = record.artifact.clone();
        artifacts.insert(
            registration.id.clone(),
            ArtifactSlot {
                case_id: registration.case_id.clone(),
                tier: registration.tier,
                record: Arc::new(Mutex::new(record)),
            },
        );
        drop(artifacts);
        self.telemetry.record_custody_append();
        tracing::info!(
            target: "trustledger.custody",
            artifact = %snapshot.id,
            case = %snapshot.case_id,
            tier = snapshot.tier.as_str(),
            original_score = snapshot.original_score,
            "artifact registered"
        );
        Ok(snapshot)
    }

    fn corroborating_tiers(&self, case_id: &CaseId, id: &ArtifactId) -> Vec<Tier> {
        let ids = self.detector.corroborators(case_id, id);
        let artifacts = self.artifacts.read();
        ids.iter()
            .filter_map(|other| artifacts.get(other).map(|s| s.tier))
            .collect()
    }

    fn evaluate(&self, rec: &ArtifactRecord, now: DateTime<Utc>) -> TrustLedgerResult<Evaluation> {
        let a = &rec.artifact;
        let corroborating = self.corroborating_tiers(&a.case_id, &a.id);
        self.evaluate_with(rec, now, corroborating)
    }

    fn evaluate_with(
        &self,
        rec: &ArtifactRecord,
        now: DateTime<Utc>,
        corroborating_tiers: Vec<Tier>,
    ) -> TrustLedgerResult<Evaluation> {
        let a = &rec.artifact;
        let active = self.detector.active_for_artifact(&a.case_id, &a.id);
        let inputs = ScoreInputs {
            tier: a.tier,
            event_at: a.event_at,
            custody: CustodySummary::of(&rec.custody),
            corroborating_tiers,
            status: a.status,
            active_contradictions: active.len(),
        };
        let score = self.scorer.score(&inputs, now);
        score.check_consistency()?;
        let original = score.composite();
        let current = self.decay.current_score(a, original, now);
        Ok(Evaluation {
            score,
            original,
            current,
            custody_break: rec.custody.verify().err(),
            active,
        })
    }

    fn refresh(&self, rec: &mut ArtifactRecord, now: DateTime<Utc>) -> TrustLedgerResult<()> {
        if rec.artifact.is_minted() {
            return Ok(());
        }
        let eval = self.evaluate(rec, now)?;
        rec.artifact.original_score = eval.original;
        rec.artifact.current_score = eval.current;
        Ok(())
    }

    /// Snapshot with scores evaluated at the current instant.
    pub fn artifact(&self, id: &ArtifactId) -> TrustLedgerResult<EvidenceArtifact> {
        let slot = self.slot(id)?;
        let rec = slot.record.lock();
        let mut snapshot = rec.artifact.clone();
        if !snapshot.is_minted() {
            let eval = self.evaluate(&rec, self.clock.now())?;
            snapshot.original_score = eval.original;
            snapshot.current_score = eval.current;
        }
        Ok(snapshot)
    }

    pub fn compute_score(&self, id: &ArtifactId) -> TrustLedgerResult<SixDimensionScore> {
        let slot = self.slot(id)?;
        let rec = slot.record.lock();
        Ok(self.evaluate(&rec, self.clock.now())?.score)
    }

    pub fn current_score(&self, id: &ArtifactId) -> TrustLedgerResult<f64> {
        let slot = self.slot(id)?;
        let rec = slot.record.lock();
        if rec.artifact.is_minted() {
            return Ok(rec.artifact.current_score);
        }
        Ok(self.evaluate(&rec, self.clock.now())?.current)
    }

    pub fn append_custody(
        &self,
        id: &ArtifactId,
        action: CustodyAction,
        actor: &str,
        timestamp: DateTime<Utc>,
    ) -> TrustLedgerResult<CustodyEntry> {
        let slot = self.slot(id)?;
        let mut rec = slot.record.lock();
        if rec.artifact.is_minted() {
            return Err(TrustLedgerError::ArtifactSealed);
        }
        let entry = rec.custody.append(action, actor, timestamp)?;
        if action == CustodyAction::Verified {
            rec.artifact.verified_at = Some(timestamp);
            let blocked = !self
                .detector
                .active_for_artifact(&slot.case_id, id)
                .is_empty();
            if !blocked {
                let from = rec.artifact.set_status(ArtifactStatus::Verified)?;
                self.telemetry.transition(
                    id,
                    from,
                    ArtifactStatus::Verified,
                    rec.artifact.current_score,
                    None,
                );
            }
        }
        self.refresh(&mut rec, self.clock.now())?;
        self.telemetry.record_custody_append();
        tracing::info!(
            target: "trustledger.custody",
            artifact = %id,
            action = ?action,
            actor,
            entry = %to_hex(&entry.entry_hash),
            "custody entry appended"
        );
        Ok(entry)
    }

    pub fn verify_custody(&self, id: &ArtifactId) -> TrustLedgerResult<()> {
        let slot = self.slot(id)?;
        let rec = slot.record.lock();
        rec.custody.verify().map_err(TrustLedgerError::from)
    }

    pub fn custody_report(&self, id: &ArtifactId) -> TrustLedgerResult<CustodyReport> {
        let slot = self.slot(id)?;
        let rec = slot.record.lock();
        Ok(CustodyReport::build(
            id.clone(),
            rec.artifact.status,
            &rec.custody,
        ))
    }

    pub fn insert_fact(
        &self,
        case_id: &CaseId,
        artifact_id: &ArtifactId,
        draft: FactDraft,
    ) -> TrustLedgerResult<FactInsertion> {
        let slot = self.slot(artifact_id)?;
        if &slot.case_id != case_id {
            return Err(TrustLedgerError::InvalidArgument(format!(
                "artifact {artifact_id} does not belong to case {case_id}"
            )));
        }
        let now = self.clock.now();
        let insertion = self.detector.insert(case_id, artifact_id, draft, now)?;
        self.telemetry
            .record_contradictions_raised(insertion.raised.len());

        // Infallible from here on: facts only name registered artifacts, any
        // open status may move to RequiresCorroboration, and stored scores
        // are re-evaluated on read.
        for affected in &insertion.affected_artifacts {
            self.flag_for_corroboration(affected);
        }
        let mut touched: BTreeSet<ArtifactId> =
            self.detector.corroborators(case_id, artifact_id).into_iter().collect();
        touched.insert(artifact_id.clone());
        touched.extend(insertion.affected_artifacts.iter().cloned());
        for other in &touched {
            self.refresh_cached(other, now);
        }
        Ok(insertion)
    }

    fn flag_for_corroboration(&self, id: &ArtifactId) {
        let slot = match self.artifacts.read().get(id).cloned() {
            Some(slot) => slot,
            None => return,
        };
        let mut rec = slot.record.lock();
        if rec.artifact.is_minted() {
            return;
        }
        if let Ok(from) = rec.artifact.set_status(ArtifactStatus::RequiresCorroboration) {
            self.telemetry.transition(
                id,
                from,
                ArtifactStatus::RequiresCorroboration,
                rec.artifact.current_score,
                None,
            );
        }
    }

    fn refresh_cached(&self, id: &ArtifactId, now: DateTime<Utc>) {
        let slot = match self.artifacts.read().get(id).cloned() {
            Some(slot) => slot,
            None => return,
        };
        let mut rec = slot.record.lock();
        if let Err(err) = self.refresh(&mut rec, now) {
            tracing::warn!(
                target: "trustledger.score",
                artifact = %id,
                error = %err,
                "cached score not refreshed"
            );
        }
    }

    /// Clears an active contradiction. Artifacts left with no active
    /// contradiction and a recorded verification return to `Verified`.
    pub fn resolve_contradiction(
        &self,
        id: ContradictionId,
        resolution: Resolution,
    ) -> TrustLedgerResult<Contradiction> {
        let now = self.clock.now();
        let resolved = self.detector.resolve(id, resolution, now)?;
        self.telemetry.record_contradiction_resolved();
        for artifact_id in [&resolved.left_artifact, &resolved.right_artifact] {
            let slot = self.slot(artifact_id)?;
            let mut rec = slot.record.lock();
            if rec.artifact.is_minted() {
                continue;
            }
            let clear = self
                .detector
                .active_for_artifact(&slot.case_id, artifact_id)
                .is_empty();
            if clear
                && rec.artifact.status == ArtifactStatus::RequiresCorroboration
                && rec.artifact.verified_at.is_some()
            {
                let from = rec.artifact.set_status(ArtifactStatus::Verified)?;
                self.telemetry.transition(
                    artifact_id,
                    from,
                    ArtifactStatus::Verified,
                    rec.artifact.current_score,
                    None,
                );
            }
            self.refresh(&mut rec, now)?;
        }
        Ok(resolved)
    }

    pub fn contradiction(&self, id: ContradictionId) -> TrustLedgerResult<Contradiction> {
        self.detector
            .contradiction(id)
            .ok_or_else(|| TrustLedgerError::NotFound(id.to_string()))
    }

    pub fn active_contradictions(&self, case_id: &CaseId) -> Vec<Contradiction> {
        self.detector.active_in_case(case_id)
    }

    pub fn check_eligibility(&self, id: &ArtifactId) -> TrustLedgerResult<EligibilityReport> {
        let slot = self.slot(id)?;
        let mut rec = slot.record.lock();
        self.sync_with_ledger(&mut rec)?;
        let eval = self.evaluate(&rec, self.clock.now())?;
        let a = &rec.artifact;
        let per_dimension = eval.score.iter().collect();

        if a.is_minted() {
            return Ok(EligibilityReport {
                artifact_id: id.clone(),
                status: a.status,
                eligible: false,
                score: a.current_score,
                original_score: a.original_score,
                per_dimension,
                trust_level: TrustLevel::from_composite(a.current_score),
                reasons: vec![format!(
                    "✗ Status: already minted in block {}",
                    a.block_number.unwrap_or_default()
                )],
                blockers: Vec::new(),
                custody_broken_at: None,
                minted_block: a.block_number,
            });
        }

        let broken_at = eval.custody_break.map(|b| b.index());
        let assessment = self.gate.assess(&eval.score, eval.current);
        let mut reasons = assessment.reasons;
        reasons.push(custody_reason(broken_at));
        reasons.push(contradiction_reason(&eval.active));
        Ok(EligibilityReport {
            artifact_id: id.clone(),
            status: a.status,
            eligible: assessment.passed && broken_at.is_none() && eval.active.is_empty(),
            score: eval.current,
            original_score: eval.original,
            per_dimension,
            trust_level: TrustLevel::from_composite(eval.current),
            reasons,
            blockers: eval.active,
            custody_broken_at: broken_at,
            minted_block: None,
        })
    }

    /// Admits an artifact into the ledger. Minting an already minted
    /// artifact returns its existing block; concurrent callers for one
    /// artifact all observe the same block.
    pub fn attempt_mint(&self, id: &ArtifactId) -> TrustLedgerResult<BlockRef> {
        let slot = self.slot(id)?;
        let mut rec = slot.record.lock();
        match self.mint_locked(&mut rec) {
            Ok(block) => Ok(block),
            Err(err) => {
                self.telemetry.record_reject(err.reason());
                if err.is_recoverable() {
                    tracing::info!(
                        target: "trustledger.mint",
                        artifact = %id,
                        reason = err.reason(),
                        error = %err,
                        "mint rejected"
                    );
                } else {
                    tracing::warn!(
                        target: "trustledger.mint",
                        artifact = %id,
                        reason = err.reason(),
                        error = %err,
                        "mint failed"
                    );
                }
                Err(err)
            }
        }
    }

    /// Seals an artifact whose id already holds a block on the ledger, for
    /// instance after a restart over a persisted store. The score freezes at
    /// its value on adoption.
    fn adopt_block(&self, rec: &mut ArtifactRecord, block: &Block) -> TrustLedgerResult<()> {
        let from = rec.artifact.set_status(ArtifactStatus::Minted)?;
        rec.artifact.minted_at = Some(block.timestamp);
        rec.artifact.block_number = Some(block.block_number);
        rec.custody.seal();
        self.telemetry.transition(
            &rec.artifact.id,
            from,
            ArtifactStatus::Minted,
            rec.artifact.current_score,
            Some(block.block_number),
        );
        tracing::info!(
            target: "trustledger.mint",
            artifact = %rec.artifact.id,
            block = block.block_number,
            "adopted block already on the ledger"
        );
        Ok(())
    }

    fn sync_with_ledger(&self, rec: &mut ArtifactRecord) -> TrustLedgerResult<()> {
        if rec.artifact.is_minted() {
            return Ok(());
        }
        if let Some(block) = self.ledger.find_by_artifact(&rec.artifact.id)? {
            let eval = self.evaluate(rec, self.clock.now())?;
            rec.artifact.original_score = eval.original;
            rec.artifact.current_score = eval.current;
            self.adopt_block(rec, &block)?;
        }
        Ok(())
    }

    fn existing_block(&self, artifact: &EvidenceArtifact) -> TrustLedgerResult<BlockRef> {
        let number = artifact.block_number.ok_or_else(|| {
            TrustLedgerError::Internal(format!("minted artifact {} has no block", artifact.id))
        })?;
        let block = self
            .ledger
            .get(number)?
            .ok_or_else(|| TrustLedgerError::Store(format!("block {number} missing")))?;
        Ok(block.reference())
    }

    fn mint_locked(&self, rec: &mut ArtifactRecord) -> TrustLedgerResult<BlockRef> {
        // The record lock is the per-artifact exclusive section; a losing
        // racer lands here after the winner committed.
        self.sync_with_ledger(rec)?;
        if rec.artifact.is_minted() {
            self.telemetry.record_mint_replay();
            return self.existing_block(&rec.artifact);
        }
        rec.custody.verify().map_err(TrustLedgerError::from)?;
        let now = self.clock.now();
        let eval = self.evaluate(rec, now)?;
        if !eval.active.is_empty() {
            return Err(TrustLedgerError::ContradictionActive(eval.active));
        }
        let assessment = self.gate.assess(&eval.score, eval.current);
        if !assessment.passed {
            return Err(TrustLedgerError::ThresholdNotMet(assessment.reasons));
        }
        let summed: f64 = eval.score.iter().map(|(_, v)| v).sum::<f64>() / 100.0;
        let drifted = (summed.clamp(0.0, 1.0) - eval.original).abs() > 1e-9;
        if drifted || eval.current > eval.original + 1e-9 {
            return Err(TrustLedgerError::Internal(
                "score consistency check failed".to_string(),
            ));
        }

        let _seq = self.sequence.lock();
        let head = self.ledger.head()?;
        let (number, prev_hash) = match &head {
            Some(b) => (b.block_number + 1, b.block_hash),
            None => (1, GENESIS_HASH),
        };
        let mut frozen = rec.artifact.clone();
        let from = frozen.set_status(ArtifactStatus::Minted)?;
        frozen.original_score = eval.original;
        frozen.current_score = eval.current;
        frozen.minted_at = Some(now);
        frozen.block_number = Some(number);
        let data_hash = hash_canonical(&FrozenState {
            artifact: &frozen,
            custody_head: to_hex(&rec.custody.head_hash()),
            custody_len: rec.custody.len(),
        })?;
        let block = Block::seal(number, frozen.id.clone(), now, prev_hash, data_hash)?;
        self.ledger.append(&block)?;

        rec.artifact = frozen;
        rec.custody.seal();
        self.telemetry.record_mint();
        self.telemetry.transition(
            &rec.artifact.id,
            from,
            ArtifactStatus::Minted,
            rec.artifact.current_score,
            Some(number),
        );
        tracing::info!(
            target: "trustledger.mint",
            artifact = %rec.artifact.id,
            block = number,
            score = rec.artifact.current_score,
            block_hash = %to_hex(&block.block_hash),
            "artifact minted"
        );
        Ok(block.reference())
    }

    pub fn get_block(&self, block_number: u64) -> TrustLedgerResult<Block> {
        self.ledger
            .get(block_number)?
            .ok_or_else(|| TrustLedgerError::NotFound(format!("block {block_number}")))
    }

    pub fn verify_ledger(&self) -> TrustLedgerResult<()> {
        let blocks = self.ledger.blocks()?;
        verify_chain(&blocks).map_err(|i| {
            tracing::error!(target: "trustledger.ledger", index = i, "ledger integrity violation");
            ledger_violation(i)
        })
    }

    pub fn sign_checkpoint(&self, key: &SigningKey) -> TrustLedgerResult<SignedCheckpoint> {
        sign_checkpoint(self.ledger.as_ref(), key)
    }

    pub fn verify_checkpoint(
        &self,
        record: &SignedCheckpoint,
        key: &VerifyingKey,
    ) -> TrustLedgerResult<()> {
        verify_checkpoint(record, key, self.ledger.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::contradiction::FactContent;
    use crate::error::IntegrityScope;
    use crate::ledger::MemoryLedgerStore;
    use crate::score::Dimension;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 3, 9, 0, 0).unwrap()
    }

    fn engine() -> (AdmissionEngine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(t0()));
        let engine = AdmissionEngine::new(
            AdmissionConfig::default(),
            Arc::new(MemoryLedgerStore::new()),
            clock.clone(),
        )
        .unwrap();
        (engine, clock)
    }

    fn register(engine: &AdmissionEngine, id: &str, tier: Tier) -> ArtifactId {
        engine
            .register_artifact(ArtifactRegistration {
                id: ArtifactId::new(id),
                case_id: CaseId::new("case-7"),
                tier,
                event_at: t0() - Duration::days(3),
                uploaded_by: "intake".into(),
                file_hash_hex: None,
            })
            .unwrap()
            .id
    }

    fn amount(v: f64) -> FactDraft {
        FactDraft {
            content: FactContent::AmountClaim {
                subject: "escrow deposit".into(),
                amount: v,
            },
            confidence_score: 0.9,
        }
    }

    /// Registers a verified bank record with a corroborating escrow record
    /// in the same case. The bank record clears every threshold.
    fn mint_ready(engine: &AdmissionEngine, clock: &ManualClock) -> (ArtifactId, ArtifactId) {
        let case = CaseId::new("case-7");
        let bank = register(engine, "bank", Tier::FinancialInstitution);
        let escrow = register(engine, "escrow", Tier::FinancialInstitution);
        engine.insert_fact(&case, &bank, amount(500.0)).unwrap();
        engine.insert_fact(&case, &escrow, amount(500.0)).unwrap();
        engine
            .append_custody(&bank, CustodyAction::Transferred, "courier", clock.now())
            .unwrap();
        engine
            .append_custody(&bank, CustodyAction::Verified, "lab", clock.now())
            .unwrap();
        (bank, escrow)
    }

    #[test]
    fn registration_records_upload_and_pending_status() {
        let (engine, _) = engine();
        let id = register(&engine, "a", Tier::FinancialInstitution);
        let a = engine.artifact(&id).unwrap();
        assert_eq!(a.status, ArtifactStatus::Pending);
        let report = engine.custody_report(&id).unwrap();
        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.entries[0].action, CustodyAction::Uploaded);
        assert!(report.intact);
        assert!(engine
            .register_artifact(ArtifactRegistration {
                id: id.clone(),
                case_id: CaseId::new("case-7"),
                tier: Tier::Other,
                event_at: t0(),
                uploaded_by: "intake".into(),
                file_hash_hex: None,
            })
            .is_err());
    }

    #[test]
    fn verified_entry_sets_status_and_resets_decay() {
        let (engine, clock) = engine();
        let id = register(&engine, "a", Tier::Other);
        clock.advance_hours(100);
        let decayed = engine.current_score(&id).unwrap();
        engine
            .append_custody(&id, CustodyAction::Verified, "notary", clock.now())
            .unwrap();
        let a = engine.artifact(&id).unwrap();
        assert_eq!(a.status, ArtifactStatus::Verified);
        assert_eq!(a.verified_at, Some(clock.now()));
        assert_eq!(a.current_score, a.original_score);
        assert!(a.current_score > decayed);
    }

    #[test]
    fn contradiction_flags_both_sides_and_blocks_mint() {
        let (engine, _) = engine();
        let case = CaseId::new("case-7");
        let a = register(&engine, "a", Tier::FinancialInstitution);
        let b = register(&engine, "b", Tier::IndependentThirdParty);
        engine.insert_fact(&case, &a, amount(1000.0)).unwrap();
        let ins = engine.insert_fact(&case, &b, amount(5000.0)).unwrap();
        assert_eq!(ins.raised.len(), 1);
        for id in [&a, &b] {
            assert_eq!(
                engine.artifact(id).unwrap().status,
                ArtifactStatus::RequiresCorroboration
            );
            assert_eq!(engine.compute_score(id).unwrap().justice, 0.0);
        }
        match engine.attempt_mint(&a) {
            Err(TrustLedgerError::ContradictionActive(ids)) => assert_eq!(ids, ins.raised),
            other => panic!("expected ContradictionActive, got {other:?}"),
        }
        assert_eq!(engine.telemetry().rejects_total.get("contradiction_active"), Some(&1));
    }

    #[test]
    fn fact_for_foreign_case_rejected() {
        let (engine, _) = engine();
        let a = register(&engine, "a", Tier::Other);
        assert!(matches!(
            engine.insert_fact(&CaseId::new("elsewhere"), &a, amount(1.0)),
            Err(TrustLedgerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn unknown_artifact_is_not_found() {
        let (engine, _) = engine();
        let ghost = ArtifactId::new("ghost");
        assert!(matches!(
            engine.attempt_mint(&ghost),
            Err(TrustLedgerError::NotFound(_))
        ));
        assert!(matches!(
            engine.get_block(1),
            Err(TrustLedgerError::NotFound(_))
        ));
    }

    #[test]
    fn tampered_custody_fails_mint_before_contradiction_check() {
        let (engine, clock) = engine();
        let case = CaseId::new("case-7");
        let (bank, _) = mint_ready(&engine, &clock);
        let rival = register(&engine, "rival", Tier::IndependentThirdParty);
        engine.insert_fact(&case, &rival, amount(9000.0)).unwrap();
        assert!(!engine.active_contradictions(&case).is_empty());
        engine.slot(&bank).unwrap().record.lock().custody.entries_mut()[1].actor =
            "forger".into();

        match engine.attempt_mint(&bank) {
            Err(TrustLedgerError::IntegrityViolation {
                scope: IntegrityScope::Custody,
                index,
            }) => assert_eq!(index, 1),
            other => panic!("expected custody IntegrityViolation, got {other:?}"),
        }
        assert_eq!(engine.ledger().len().unwrap(), 0);
        let a = engine.artifact(&bank).unwrap();
        assert_eq!(a.status, ArtifactStatus::RequiresCorroboration);
        assert_eq!(a.block_number, None);
        assert_eq!(
            engine.telemetry().rejects_total.get("integrity_violation"),
            Some(&1)
        );

        let report = engine.check_eligibility(&bank).unwrap();
        assert!(!report.eligible);
        assert_eq!(report.custody_broken_at, Some(1));
        assert_eq!(report.per_dimension[&Dimension::Chain], 0.0);
        assert!(report
            .reasons
            .iter()
            .any(|r| r == "✗ Custody: chain broken at entry 1"));
    }

    #[test]
    fn block_already_on_the_ledger_is_adopted() {
        let clock = Arc::new(ManualClock::new(t0()));
        let store: Arc<dyn LedgerStore> = Arc::new(MemoryLedgerStore::new());
        let open = |store: &Arc<dyn LedgerStore>| {
            AdmissionEngine::new(AdmissionConfig::default(), store.clone(), clock.clone())
                .unwrap()
        };
        let first = open(&store);
        let second = open(&store);
        let early = register(&second, "bank", Tier::FinancialInstitution);
        let (bank, _) = mint_ready(&first, &clock);
        let minted = first.attempt_mint(&bank).unwrap();

        let report = second.check_eligibility(&early).unwrap();
        assert!(!report.eligible);
        assert_eq!(report.status, ArtifactStatus::Minted);
        assert_eq!(report.minted_block, Some(minted.block_number));
        assert_eq!(second.attempt_mint(&early).unwrap(), minted);
        assert_eq!(second.telemetry().mint_replays_total, 1);
        assert_eq!(second.telemetry().mints_total, 0);
        assert!(matches!(
            second.append_custody(&early, CustodyAction::Analyzed, "lab", clock.now()),
            Err(TrustLedgerError::ArtifactSealed)
        ));

        let third = open(&store);
        let late = register(&third, "bank", Tier::FinancialInstitution);
        let a = third.artifact(&late).unwrap();
        assert_eq!(a.status, ArtifactStatus::Minted);
        assert_eq!(a.block_number, Some(minted.block_number));
        assert_eq!(third.attempt_mint(&late).unwrap(), minted);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn conflicting_fact_against_minted_artifact_flags_only_the_open_side() {
        let (engine, clock) = engine();
        let case = CaseId::new("case-7");
        let (bank, escrow) = mint_ready(&engine, &clock);
        engine.attempt_mint(&bank).unwrap();
        let frozen = engine.current_score(&bank).unwrap();

        let ins = engine.insert_fact(&case, &escrow, amount(9000.0)).unwrap();
        assert!(!ins.raised.is_empty());
        let minted = engine.artifact(&bank).unwrap();
        assert_eq!(minted.status, ArtifactStatus::Minted);
        assert_eq!(minted.current_score, frozen);
        assert_eq!(
            engine.artifact(&escrow).unwrap().status,
            ArtifactStatus::RequiresCorroboration
        );
        assert_eq!(engine.compute_score(&escrow).unwrap().justice, 0.0);
    }
}
