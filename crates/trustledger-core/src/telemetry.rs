use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::artifact::{ArtifactId, ArtifactStatus};

#[derive(Debug, Clone, Serialize)]
pub struct LifecycleEvent<'a> {
    pub artifact_id: &'a ArtifactId,
    pub from: &'a str,
    pub to: &'a str,
    pub current_score: f64,
    pub block_number: Option<u64>,
}

#[derive(Debug, Default)]
struct TelemetryState {
    mints_total: u64,
    mint_replays_total: u64,
    rejects_total: BTreeMap<String, u64>,
    custody_appends_total: u64,
    contradictions_raised_total: u64,
    contradictions_resolved_total: u64,
    transitions_total: BTreeMap<String, u64>,
}

/// Point-in-time copy of the engine counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TelemetrySnapshot {
    pub mints_total: u64,
    pub mint_replays_total: u64,
    pub rejects_total: BTreeMap<String, u64>,
    pub custody_appends_total: u64,
    pub contradictions_raised_total: u64,
    pub contradictions_resolved_total: u64,
    pub transitions_total: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default)]
pub struct AdmissionTelemetry {
    state: Arc<Mutex<TelemetryState>>,
}

impl AdmissionTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lifecycle_event(&self, event: &LifecycleEvent<'_>) {
        tracing::info!(target: "trustledger.lifecycle", event = ?event, "artifact lifecycle transition");
        let mut guard = self.state.lock();
        let entry = guard
            .transitions_total
            .entry(format!("{}->{}", event.from, event.to))
            .or_insert(0);
        *entry = entry.saturating_add(1);
    }

    pub fn transition(
        &self,
        artifact_id: &ArtifactId,
        from: ArtifactStatus,
        to: ArtifactStatus,
        current_score: f64,
        block_number: Option<u64>,
    ) {
        if from == to {
            return;
        }
        self.lifecycle_event(&LifecycleEvent {
            artifact_id,
            from: from.as_str(),
            to: to.as_str(),
            current_score,
            block_number,
        });
    }

    pub fn record_mint(&self) {
        let mut guard = self.state.lock();
        guard.mints_total = guard.mints_total.saturating_add(1);
    }

    pub fn record_mint_replay(&self) {
        let mut guard = self.state.lock();
        guard.mint_replays_total = guard.mint_replays_total.saturating_add(1);
    }

    pub fn record_reject(&self, reason: &str) {
        let mut guard = self.state.lock();
        let entry = guard.rejects_total.entry(reason.to_string()).or_insert(0);
        *entry = entry.saturating_add(1);
    }

    pub fn record_custody_append(&self) {
        let mut guard = self.state.lock();
        guard.custody_appends_total = guard.custody_appends_total.saturating_add(1);
    }

    pub fn record_contradictions_raised(&self, n: usize) {
        let mut guard = self.state.lock();
        guard.contradictions_raised_total = guard
            .contradictions_raised_total
            .saturating_add(n as u64);
    }

    pub fn record_contradiction_resolved(&self) {
        let mut guard = self.state.lock();
        guard.contradictions_resolved_total = guard.contradictions_resolved_total.saturating_add(1);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let guard = self.state.lock();
        TelemetrySnapshot {
            mints_total: guard.mints_total,
            mint_replays_total: guard.mint_replays_total,
            rejects_total: guard.rejects_total.clone(),
            custody_appends_total: guard.custody_appends_total,
            contradictions_raised_total: guard.contradictions_raised_total,
            contradictions_resolved_total: guard.contradictions_resolved_total,
            transitions_total: guard.transitions_total.clone(),
        }
    }
}
