// Copyright (c) 2026 Joseph Verdicchio and EvidenceOS Contributors
// SPDX-License-Identifier: Apache-2.0

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use trustledger_core::{
    AdmissionConfig, AdmissionEngine, ArtifactId, ArtifactRegistration, CaseId, Clock,
    ContradictionId, CustodyAction, FactContent, FactDraft, FileLedgerStore, LedgerStore,
    ManualClock, Resolution, TrustLedgerError,
};

/// Scripted sequence of engine operations driven by a manual clock.
#[derive(Debug, Deserialize)]
pub struct Scenario {
    pub start: DateTime<Utc>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Register(ArtifactRegistration),
    Custody {
        artifact: ArtifactId,
        action: CustodyAction,
        actor: String,
        /// Defaults to the scenario clock.
        #[serde(default)]
        at: Option<DateTime<Utc>>,
    },
    Fact {
        case: CaseId,
        artifact: ArtifactId,
        fact: FactContent,
        #[serde(default = "default_confidence")]
        confidence: f64,
    },
    Resolve {
        contradiction: ContradictionId,
        resolution: Resolution,
    },
    Advance {
        hours: i64,
    },
    Score {
        artifact: ArtifactId,
    },
    Check {
        artifact: ArtifactId,
    },
    Mint {
        artifact: ArtifactId,
    },
    Report {
        artifact: ArtifactId,
    },
}

fn default_confidence() -> f64 {
    1.0
}

impl Step {
    fn op(&self) -> &'static str {
        match self {
            Step::Register(_) => "register",
            Step::Custody { .. } => "custody",
            Step::Fact { .. } => "fact",
            Step::Resolve { .. } => "resolve",
            Step::Advance { .. } => "advance",
            Step::Score { .. } => "score",
            Step::Check { .. } => "check",
            Step::Mint { .. } => "mint",
            Step::Report { .. } => "report",
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<AdmissionConfig> {
    let base = match path {
        Some(p) => AdmissionConfig::load(p)
            .with_context(|| format!("failed to load config: {}", p.display()))?,
        None => AdmissionConfig::default(),
    };
    Ok(base.with_env_overrides()?)
}

fn to_value(v: &impl serde::Serialize) -> Result<Value, TrustLedgerError> {
    serde_json::to_value(v).map_err(|e| TrustLedgerError::Internal(e.to_string()))
}

fn run_step(
    engine: &AdmissionEngine,
    clock: &ManualClock,
    step: Step,
) -> Result<Value, TrustLedgerError> {
    match step {
        Step::Register(reg) => to_value(&engine.register_artifact(reg)?),
        Step::Custody {
            artifact,
            action,
            actor,
            at,
        } => {
            let ts = at.unwrap_or_else(|| clock.now());
            to_value(&engine.append_custody(&artifact, action, &actor, ts)?)
        }
        Step::Fact {
            case,
            artifact,
            fact,
            confidence,
        } => to_value(&engine.insert_fact(
            &case,
            &artifact,
            FactDraft {
                content: fact,
                confidence_score: confidence,
            },
        )?),
        Step::Resolve {
            contradiction,
            resolution,
        } => to_value(&engine.resolve_contradiction(contradiction, resolution)?),
        Step::Advance { hours } => Ok(json!({ "now": clock.try_advance_hours(hours)? })),
        Step::Score { artifact } => {
            let score = engine.compute_score(&artifact)?;
            Ok(json!({
                "dimensions": to_value(&score)?,
                "composite": score.composite(),
                "current": engine.current_score(&artifact)?,
            }))
        }
        Step::Check { artifact } => to_value(&engine.check_eligibility(&artifact)?),
        Step::Mint { artifact } => to_value(&engine.attempt_mint(&artifact)?),
        Step::Report { artifact } => to_value(&engine.custody_report(&artifact)?),
    }
}

/// Runs every step against the ledger file. A failing step is reported in
/// place and does not stop the replay.
pub fn replay(scenario: Scenario, ledger: &Path, config: AdmissionConfig) -> Result<Value> {
    let store = Arc::new(
        FileLedgerStore::open_or_create(ledger)
            .with_context(|| format!("failed to open ledger: {}", ledger.display()))?,
    );
    let clock = Arc::new(ManualClock::new(scenario.start));
    let engine = AdmissionEngine::new(config, store.clone(), clock.clone())?;

    let mut outcomes = Vec::with_capacity(scenario.steps.len());
    for (i, step) in scenario.steps.into_iter().enumerate() {
        let op = step.op();
        let outcome = match run_step(&engine, &clock, step) {
            Ok(v) => json!({ "step": i, "op": op, "ok": v }),
            Err(e) => {
                tracing::debug!(step = i, op, error = %e, "scenario step failed");
                json!({
                    "step": i,
                    "op": op,
                    "error": e.to_string(),
                    "reason": e.reason(),
                    "recoverable": e.is_recoverable(),
                })
            }
        };
        outcomes.push(outcome);
    }
    Ok(json!({
        "steps": outcomes,
        "ledger_height": store.len()?,
        "telemetry": engine.telemetry(),
    }))
}
