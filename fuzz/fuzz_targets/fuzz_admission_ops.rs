#![no_main]

use std::collections::HashMap;
use std::sync::Arc;

use arbitrary::{Arbitrary, Unstructured};
use chrono::{Duration, TimeZone, Utc};
use libfuzzer_sys::fuzz_target;
use trustledger_core::{
    AdmissionConfig, AdmissionEngine, ArtifactId, ArtifactRegistration, CaseId, Clock,
    CustodyAction, FactContent, FactDraft, LedgerStore, ManualClock, MemoryLedgerStore,
    Resolution, Tier,
};

const ARTIFACTS: u8 = 4;

#[derive(Debug, Arbitrary)]
enum Op {
    Custody { artifact: u8, verified: bool },
    Amount { artifact: u8, amount: u16 },
    Resolve { id: u8 },
    Advance { hours: u16 },
    Mint { artifact: u8 },
}

fn id(n: u8) -> ArtifactId {
    ArtifactId::new(format!("a{}", n % ARTIFACTS))
}

fuzz_target!(|data: &[u8]| {
    let mut u = Unstructured::new(data);
    let Ok(ops) = Vec::<Op>::arbitrary(&mut u) else {
        return;
    };
    let start = Utc
        .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
        .single()
        .expect("fixed instant");
    let clock = Arc::new(ManualClock::new(start));
    let ledger = Arc::new(MemoryLedgerStore::new());
    let engine = AdmissionEngine::new(AdmissionConfig::default(), ledger.clone(), clock.clone())
        .expect("default config is valid");
    let case = CaseId::new("fuzz");
    let tiers = [
        Tier::FinancialInstitution,
        Tier::IndependentThirdParty,
        Tier::Other,
        Tier::UncorroboratedPerson,
    ];
    for n in 0..ARTIFACTS {
        engine
            .register_artifact(ArtifactRegistration {
                id: id(n),
                case_id: case.clone(),
                tier: tiers[usize::from(n)],
                event_at: start - Duration::days(1),
                uploaded_by: "intake".to_string(),
                file_hash_hex: None,
            })
            .expect("register");
    }

    let mut frozen: HashMap<ArtifactId, (u64, f64)> = HashMap::new();
    for op in ops {
        match op {
            Op::Custody { artifact, verified } => {
                let action = if verified {
                    CustodyAction::Verified
                } else {
                    CustodyAction::Transferred
                };
                let _ = engine.append_custody(&id(artifact), action, "handler", clock.now());
            }
            Op::Amount { artifact, amount } => {
                let _ = engine.insert_fact(
                    &case,
                    &id(artifact),
                    FactDraft {
                        content: FactContent::AmountClaim {
                            subject: "deposit".to_string(),
                            amount: f64::from(amount),
                        },
                        confidence_score: 0.5,
                    },
                );
            }
            Op::Resolve { id: raw } => {
                let _ = engine.resolve_contradiction(
                    trustledger_core::ContradictionId(u64::from(raw)),
                    Resolution::HumanOverride {
                        reviewer: "fuzz".to_string(),
                        note: String::new(),
                    },
                );
            }
            Op::Advance { hours } => clock.advance(Duration::hours(i64::from(hours))),
            Op::Mint { artifact } => {
                if let Ok(block) = engine.attempt_mint(&id(artifact)) {
                    let score = engine.current_score(&id(artifact)).expect("minted score");
                    let entry = frozen
                        .entry(id(artifact))
                        .or_insert((block.block_number, score));
                    assert_eq!(entry.0, block.block_number, "re-mint changed block");
                }
            }
        }
        for (artifact, (_, score)) in &frozen {
            let now = engine.current_score(artifact).expect("score");
            assert_eq!(now, *score, "minted score moved");
        }
    }
    assert_eq!(ledger.len().expect("len") as usize, frozen.len());
    engine.verify_ledger().expect("ledger must stay intact");
});
