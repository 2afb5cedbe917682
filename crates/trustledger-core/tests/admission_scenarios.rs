use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use trustledger_core::error::IntegrityScope;
use trustledger_core::{
    AdmissionConfig, AdmissionEngine, ArtifactId, ArtifactRegistration, ArtifactStatus, CaseId,
    Clock, CustodyAction, FactContent, FactDraft, LedgerStore, ManualClock, MemoryLedgerStore,
    Resolution, Tier, TrustLedgerError, DEFAULT_COMPOSITE_THRESHOLD,
    DEFAULT_DIMENSION_FLOOR_RATIO,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 9, 14, 8, 0, 0).unwrap()
}

struct Harness {
    engine: AdmissionEngine,
    clock: Arc<ManualClock>,
    ledger: Arc<MemoryLedgerStore>,
    case: CaseId,
}

fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new(t0()));
    let ledger = Arc::new(MemoryLedgerStore::new());
    let engine = AdmissionEngine::new(AdmissionConfig::default(), ledger.clone(), clock.clone())
        .expect("engine");
    Harness {
        engine,
        clock,
        ledger,
        case: CaseId::new("case-2026-114"),
    }
}

impl Harness {
    fn register(&self, id: &str, tier: Tier) -> ArtifactId {
        self.engine
            .register_artifact(ArtifactRegistration {
                id: ArtifactId::new(id),
                case_id: self.case.clone(),
                tier,
                event_at: t0() - Duration::days(30),
                uploaded_by: "intake-clerk".to_string(),
                file_hash_hex: Some("ab".repeat(32)),
            })
            .expect("register")
            .id
    }

    fn verify(&self, id: &ArtifactId) {
        let now = self.clock.now();
        self.engine
            .append_custody(id, CustodyAction::Transferred, "courier", now)
            .expect("transfer");
        self.engine
            .append_custody(id, CustodyAction::Verified, "forensic-lab", now)
            .expect("verify");
    }

    fn claim(&self, id: &ArtifactId, amount: f64) -> trustledger_core::FactInsertion {
        self.engine
            .insert_fact(
                &self.case,
                id,
                FactDraft {
                    content: FactContent::AmountClaim {
                        subject: "wire transfer".to_string(),
                        amount,
                    },
                    confidence_score: 0.95,
                },
            )
            .expect("insert fact")
    }
}

#[test]
fn contract_thresholds_are_exposed() {
    assert_eq!(DEFAULT_COMPOSITE_THRESHOLD, 0.70);
    assert_eq!(DEFAULT_DIMENSION_FLOOR_RATIO, 0.50);
}

#[test]
fn financial_record_decays_to_floor_then_mints_and_freezes() {
    let h = harness();
    let bank = h.register("bank-statement", Tier::FinancialInstitution);
    let escrow = h.register("escrow-letter", Tier::IndependentThirdParty);
    h.claim(&bank, 25_000.0);
    h.claim(&escrow, 25_000.0);
    h.verify(&bank);
    h.verify(&escrow);

    let first = h.engine.attempt_mint(&escrow).expect("mint escrow");
    assert_eq!(first.block_number, 1);

    let score = h.engine.compute_score(&bank).expect("score");
    assert!((score.composite() - 0.92).abs() < 1e-9);
    let artifact = h.engine.artifact(&bank).expect("artifact");
    assert!((artifact.original_score - 0.92).abs() < 1e-9);

    h.clock.advance_hours(240);
    let current = h.engine.current_score(&bank).expect("current");
    assert!((current - 0.782).abs() < 1e-9, "got {current}");
    let report = h.engine.check_eligibility(&bank).expect("eligibility");
    assert!(report.eligible, "reasons: {:?}", report.reasons);

    let n = h.ledger.len().expect("len");
    let block = h.engine.attempt_mint(&bank).expect("mint bank");
    assert_eq!(block.block_number, n + 1);

    h.clock.advance_hours(50_000);
    let frozen = h.engine.artifact(&bank).expect("artifact");
    assert_eq!(frozen.status, ArtifactStatus::Minted);
    assert_eq!(frozen.block_number, Some(n + 1));
    assert!((frozen.current_score - 0.782).abs() < 1e-9);
    assert_eq!(h.engine.current_score(&bank).expect("current"), frozen.current_score);

    let again = h.engine.attempt_mint(&bank).expect("idempotent mint");
    assert_eq!(again, block);
    assert_eq!(h.ledger.len().expect("len"), 2);
    let stored = h.engine.get_block(block.block_number).expect("block");
    assert_eq!(stored.artifact_id, bank);
    assert_eq!(stored.prev_hash, h.engine.get_block(1).expect("b1").block_hash);
    h.engine.verify_ledger().expect("ledger intact");

    assert!(matches!(
        h.engine
            .append_custody(&bank, CustodyAction::Analyzed, "lab", h.clock.now()),
        Err(TrustLedgerError::ArtifactSealed)
    ));
    assert!(h.engine.custody_report(&bank).expect("report").sealed);
    let snap = h.engine.telemetry();
    assert_eq!(snap.mints_total, 2);
    assert_eq!(snap.mint_replays_total, 1);
}

#[test]
fn uncorroborated_person_fails_threshold_with_itemized_reasons() {
    let h = harness();
    let witness = h.register("witness-note", Tier::UncorroboratedPerson);
    let memo = h.register("memo", Tier::Other);
    h.claim(&witness, 400.0);
    h.claim(&memo, 400.0);

    let composite = h.engine.compute_score(&witness).expect("score").composite();
    assert!((composite - 0.55).abs() < 1e-9, "got {composite}");

    let reasons = match h.engine.attempt_mint(&witness) {
        Err(TrustLedgerError::ThresholdNotMet(reasons)) => reasons,
        other => panic!("expected ThresholdNotMet, got {other:?}"),
    };
    assert!(reasons.iter().any(|r| r.starts_with('✗') && r.contains("Source")));
    assert!(reasons.iter().any(|r| r.starts_with('✗') && r.contains("Composite")));
    assert!(reasons.iter().any(|r| r.starts_with('✓') && r.contains("Justice")));

    let artifact = h.engine.artifact(&witness).expect("artifact");
    assert_eq!(artifact.status, ArtifactStatus::Pending);
    assert_eq!(artifact.block_number, None);
    assert!(h.ledger.is_empty().expect("empty"));
}

#[test]
fn amount_contradiction_blocks_until_resolved() {
    let h = harness();
    let invoice = h.register("invoice", Tier::FinancialInstitution);
    let receipt = h.register("receipt", Tier::IndependentThirdParty);
    h.verify(&invoice);
    h.verify(&receipt);
    h.claim(&invoice, 1000.0);
    let raised = h.claim(&receipt, 5000.0).raised;
    assert_eq!(raised.len(), 1);
    let id = raised[0];
    assert!(h.engine.contradiction(id).expect("contradiction").active);
    assert_eq!(h.engine.active_contradictions(&h.case).len(), 1);

    let report = h.engine.check_eligibility(&invoice).expect("eligibility");
    assert!(!report.eligible);
    assert_eq!(report.blockers, vec![id]);
    assert_eq!(report.status, ArtifactStatus::RequiresCorroboration);

    let resolved = h
        .engine
        .resolve_contradiction(
            id,
            Resolution::HumanOverride {
                reviewer: "case-officer".to_string(),
                note: "receipt amount mistyped".to_string(),
            },
        )
        .expect("resolve");
    assert!(!resolved.active);
    assert!(resolved.resolved_at.is_some());

    let report = h.engine.check_eligibility(&invoice).expect("eligibility");
    assert!(report.blockers.is_empty());
    assert!(report
        .reasons
        .iter()
        .any(|r| r == "✓ Contradictions: none active"));
    assert_eq!(report.status, ArtifactStatus::Verified);
    assert!(h.engine.active_contradictions(&h.case).is_empty());
    assert!(matches!(
        h.engine.resolve_contradiction(
            id,
            Resolution::HumanOverride {
                reviewer: "case-officer".to_string(),
                note: "again".to_string(),
            }
        ),
        Err(TrustLedgerError::InvalidArgument(_))
    ));
}

#[test]
fn backdated_custody_entry_is_rejected_without_side_effects() {
    let h = harness();
    let id = h.register("photo", Tier::Other);
    let before = h.engine.custody_report(&id).expect("report");
    assert!(matches!(
        h.engine.append_custody(
            &id,
            CustodyAction::Transferred,
            "courier",
            t0() - Duration::minutes(1)
        ),
        Err(TrustLedgerError::NonMonotonicTimestamp)
    ));
    let after = h.engine.custody_report(&id).expect("report");
    assert_eq!(before.entries, after.entries);
    h.engine.verify_custody(&id).expect("intact");
}

#[test]
fn tampered_ledger_store_fails_verification() {
    let dir = tempfile::tempdir().expect("tmp");
    let path = dir.path().join("ledger.log");
    let clock = Arc::new(ManualClock::new(t0()));
    {
        let store = Arc::new(trustledger_core::FileLedgerStore::open_or_create(&path).expect("open"));
        let engine =
            AdmissionEngine::new(AdmissionConfig::default(), store, clock.clone()).expect("engine");
        let case = CaseId::new("c");
        for (name, tier) in [("a", Tier::FinancialInstitution), ("b", Tier::IndependentThirdParty)] {
            let id = ArtifactId::new(name);
            engine
                .register_artifact(ArtifactRegistration {
                    id: id.clone(),
                    case_id: case.clone(),
                    tier,
                    event_at: t0(),
                    uploaded_by: "intake".to_string(),
                    file_hash_hex: None,
                })
                .expect("register");
            engine
                .insert_fact(
                    &case,
                    &id,
                    FactDraft {
                        content: FactContent::DateClaim {
                            subject: "closing".to_string(),
                            date: chrono::NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
                        },
                        confidence_score: 1.0,
                    },
                )
                .expect("fact");
            engine
                .append_custody(&id, CustodyAction::Transferred, "courier", t0())
                .expect("transfer");
            engine
                .append_custody(&id, CustodyAction::Verified, "lab", t0())
                .expect("verify");
        }
        engine.attempt_mint(&ArtifactId::new("a")).expect("mint a");
        engine.attempt_mint(&ArtifactId::new("b")).expect("mint b");
        engine.verify_ledger().expect("intact");
    }

    let store = trustledger_core::FileLedgerStore::open_or_create(&path).expect("reopen");
    let mut blocks = store.blocks().expect("blocks");
    assert_eq!(blocks.len(), 2);
    blocks[0].data_hash[3] ^= 0x10;
    drop(store);
    let mut bytes = Vec::new();
    for b in &blocks {
        let data = serde_json::to_vec(b).expect("json");
        bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&data);
    }
    std::fs::write(&path, bytes).expect("rewrite");

    let store = Arc::new(trustledger_core::FileLedgerStore::open_or_create(&path).expect("open"));
    let engine = AdmissionEngine::new(AdmissionConfig::default(), store, clock).expect("engine");
    match engine.verify_ledger() {
        Err(TrustLedgerError::IntegrityViolation { scope, index }) => {
            assert_eq!(scope, IntegrityScope::Ledger);
            assert_eq!(index, 0);
        }
        other => panic!("expected ledger integrity violation, got {other:?}"),
    }
}

proptest! {
    #[test]
    fn unminted_score_never_rises_without_reverification(
        tier_idx in 0usize..4,
        steps in proptest::collection::vec(0i64..2_000, 1..12),
    ) {
        let h = harness();
        let id = h.register("subject", Tier::ALL[tier_idx]);
        let mut prev = h.engine.current_score(&id).expect("current");
        for hours in steps {
            h.clock.advance_hours(hours);
            let now = h.engine.current_score(&id).expect("current");
            let artifact = h.engine.artifact(&id).expect("artifact");
            prop_assert!(now <= prev + 1e-12);
            prop_assert!(now >= 0.0);
            prop_assert!(artifact.current_score <= artifact.original_score + 1e-12);
            prev = now;
        }
    }
}
