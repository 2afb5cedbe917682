use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::artifact::{ArtifactId, CaseId};
use crate::error::{TrustLedgerError, TrustLedgerResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactId(pub u64);

impl fmt::Display for FactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fact-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContradictionId(pub u64);

impl fmt::Display for ContradictionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "contradiction-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactType {
    DateClaim,
    AmountClaim,
    IdentityClaim,
}

/// Typed payload of an atomic fact. Each variant owns its conflict rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "fact_type", rename_all = "snake_case")]
pub enum FactContent {
    /// When the keyed event happened.
    DateClaim { subject: String, date: NaiveDate },
    /// How much money the keyed event involved.
    AmountClaim { subject: String, amount: f64 },
    /// Who the keyed party is.
    IdentityClaim { subject: String, identity: String },
}

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl FactContent {
    pub fn fact_type(&self) -> FactType {
        match self {
            FactContent::DateClaim { .. } => FactType::DateClaim,
            FactContent::AmountClaim { .. } => FactType::AmountClaim,
            FactContent::IdentityClaim { .. } => FactType::IdentityClaim,
        }
    }

    pub fn subject(&self) -> &str {
        match self {
            FactContent::DateClaim { subject, .. }
            | FactContent::AmountClaim { subject, .. }
            | FactContent::IdentityClaim { subject, .. } => subject,
        }
    }

    fn same_key(&self, other: &FactContent) -> bool {
        self.fact_type() == other.fact_type()
            && normalize(self.subject()) == normalize(other.subject())
    }

    /// True when both claims are about the same keyed event and cannot both hold.
    pub fn conflicts_with(&self, other: &FactContent, amount_tolerance: f64) -> bool {
        if !self.same_key(other) {
            return false;
        }
        match (self, other) {
            (FactContent::DateClaim { date: a, .. }, FactContent::DateClaim { date: b, .. }) => {
                a != b
            }
            (
                FactContent::AmountClaim { amount: a, .. },
                FactContent::AmountClaim { amount: b, .. },
            ) => (a - b).abs() > amount_tolerance,
            (
                FactContent::IdentityClaim { identity: a, .. },
                FactContent::IdentityClaim { identity: b, .. },
            ) => normalize(a) != normalize(b),
            _ => false,
        }
    }

    pub fn corroborates(&self, other: &FactContent, amount_tolerance: f64) -> bool {
        self.same_key(other) && !self.conflicts_with(other, amount_tolerance)
    }

    fn validate(&self) -> TrustLedgerResult<()> {
        if self.subject().trim().is_empty() {
            return Err(TrustLedgerError::InvalidArgument(
                "fact subject must be non-empty".to_string(),
            ));
        }
        match self {
            FactContent::AmountClaim { amount, .. } if !amount.is_finite() => Err(
                TrustLedgerError::InvalidArgument("amount must be finite".to_string()),
            ),
            FactContent::IdentityClaim { identity, .. } if identity.trim().is_empty() => Err(
                TrustLedgerError::InvalidArgument("identity must be non-empty".to_string()),
            ),
            _ => Ok(()),
        }
    }
}

/// A fact as submitted by the host, before the detector assigns an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactDraft {
    pub content: FactContent,
    pub confidence_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomicFact {
    pub id: FactId,
    pub artifact_id: ArtifactId,
    pub case_id: CaseId,
    pub content: FactContent,
    pub confidence_score: f64,
}

impl AtomicFact {
    pub fn fact_type(&self) -> FactType {
        self.content.fact_type()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
    /// Later evidence settled which claim holds.
    Corroborated {
        superseding_artifact: ArtifactId,
        note: String,
    },
    HumanOverride { reviewer: String, note: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contradiction {
    pub id: ContradictionId,
    pub case_id: CaseId,
    pub fact_type: FactType,
    pub left: FactId,
    pub right: FactId,
    pub left_artifact: ArtifactId,
    pub right_artifact: ArtifactId,
    pub active: bool,
    pub raised_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution: Option<Resolution>,
}

impl Contradiction {
    pub fn involves_artifact(&self, artifact_id: &ArtifactId) -> bool {
        &self.left_artifact == artifact_id || &self.right_artifact == artifact_id
    }
}

/// Outcome of inserting a fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactInsertion {
    pub fact: AtomicFact,
    /// Contradictions created or reactivated by this insertion.
    pub raised: Vec<ContradictionId>,
    /// Artifacts party to any raised contradiction.
    pub affected_artifacts: Vec<ArtifactId>,
}

#[derive(Debug, Default)]
struct CaseState {
    facts: Vec<AtomicFact>,
    contradictions: BTreeMap<ContradictionId, Contradiction>,
    by_pair: HashMap<(FactId, FactId), ContradictionId>,
}

impl CaseState {
    fn active_for(&self, artifact_id: &ArtifactId) -> Vec<ContradictionId> {
        self.contradictions
            .values()
            .filter(|c| c.active && c.involves_artifact(artifact_id))
            .map(|c| c.id)
            .collect()
    }
}

/// Conflict relation over the atomic facts of each case.
///
/// Inserts within one case are serialized by that case's lock; cases do not
/// contend with each other.
#[derive(Debug)]
pub struct ContradictionDetector {
    cases: RwLock<HashMap<CaseId, Arc<Mutex<CaseState>>>>,
    owners: RwLock<HashMap<ContradictionId, CaseId>>,
    next_fact: AtomicU64,
    next_contradiction: AtomicU64,
    amount_tolerance: f64,
}

impl ContradictionDetector {
    pub fn new(amount_tolerance: f64) -> Self {
        Self {
            cases: RwLock::new(HashMap::new()),
            owners: RwLock::new(HashMap::new()),
            next_fact: AtomicU64::new(1),
            next_contradiction: AtomicU64::new(1),
            amount_tolerance,
        }
    }

    fn case(&self, case_id: &CaseId) -> Option<Arc<Mutex<CaseState>>> {
        self.cases.read().get(case_id).cloned()
    }

    fn case_or_create(&self, case_id: &CaseId) -> Arc<Mutex<CaseState>> {
        if let Some(c) = self.case(case_id) {
            return c;
        }
        self.cases
            .write()
            .entry(case_id.clone())
            .or_default()
            .clone()
    }

    pub fn insert(
        &self,
        case_id: &CaseId,
        artifact_id: &ArtifactId,
        draft: FactDraft,
        now: DateTime<Utc>,
    ) -> TrustLedgerResult<FactInsertion> {
        draft.content.validate()?;
        if !(0.0..=1.0).contains(&draft.confidence_score) {
            return Err(TrustLedgerError::InvalidArgument(
                "confidence_score must lie in [0, 1]".to_string(),
            ));
        }

        let case = self.case_or_create(case_id);
        let mut state = case.lock();

        // Re-asserting an identical claim reuses the fact and re-opens its conflicts.
        let existing = state
            .facts
            .iter()
            .find(|f| &f.artifact_id == artifact_id && f.content == draft.content)
            .cloned();
        let fact = match existing {
            Some(f) => f,
            None => {
                let f = AtomicFact {
                    id: FactId(self.next_fact.fetch_add(1, Ordering::SeqCst)),
                    artifact_id: artifact_id.clone(),
                    case_id: case_id.clone(),
                    content: draft.content,
                    confidence_score: draft.confidence_score,
                };
                state.facts.push(f.clone());
                f
            }
        };

        let opponents: Vec<AtomicFact> = state
            .facts
            .iter()
            .filter(|other| {
                other.id != fact.id
                    && fact.content.conflicts_with(&other.content, self.amount_tolerance)
            })
            .cloned()
            .collect();

        let mut raised = Vec::new();
        let mut affected = BTreeSet::new();
        let mut new_owners = Vec::new();
        for other in opponents {
            let pair = if other.id < fact.id {
                (other.id, fact.id)
            } else {
                (fact.id, other.id)
            };
            let (left, right) = if pair.0 == other.id {
                (&other, &fact)
            } else {
                (&fact, &other)
            };
            let raised_here = match state.by_pair.get(&pair).copied() {
                Some(id) => match state.contradictions.get_mut(&id) {
                    Some(c) if !c.active => {
                        c.active = true;
                        c.resolved_at = None;
                        c.resolution = None;
                        Some(id)
                    }
                    _ => None,
                },
                None => {
                    let id =
                        ContradictionId(self.next_contradiction.fetch_add(1, Ordering::SeqCst));
                    state.contradictions.insert(
                        id,
                        Contradiction {
                            id,
                            case_id: case_id.clone(),
                            fact_type: fact.fact_type(),
                            left: left.id,
                            right: right.id,
                            left_artifact: left.artifact_id.clone(),
                            right_artifact: right.artifact_id.clone(),
                            active: true,
                            raised_at: now,
                            resolved_at: None,
                            resolution: None,
                        },
                    );
                    state.by_pair.insert(pair, id);
                    new_owners.push(id);
                    Some(id)
                }
            };
            if let Some(id) = raised_here {
                raised.push(id);
                affected.insert(other.artifact_id.clone());
                affected.insert(fact.artifact_id.clone());
            }
        }
        drop(state);

        if !new_owners.is_empty() {
            let mut owners = self.owners.write();
            for id in new_owners {
                owners.insert(id, case_id.clone());
            }
        }
        for id in &raised {
            tracing::warn!(
                target: "trustledger.contradiction",
                contradiction = %id,
                case = %case_id,
                fact = %fact.id,
                "contradiction raised"
            );
        }

        Ok(FactInsertion {
            fact,
            raised,
            affected_artifacts: affected.into_iter().collect(),
        })
    }

    pub fn resolve(
        &self,
        id: ContradictionId,
        resolution: Resolution,
        now: DateTime<Utc>,
    ) -> TrustLedgerResult<Contradiction> {
        let case_id = self
            .owners
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| TrustLedgerError::NotFound(id.to_string()))?;
        let case = self
            .case(&case_id)
            .ok_or_else(|| TrustLedgerError::NotFound(case_id.to_string()))?;
        let mut state = case.lock();
        let c = state
            .contradictions
            .get_mut(&id)
            .ok_or_else(|| TrustLedgerError::NotFound(id.to_string()))?;
        if !c.active {
            return Err(TrustLedgerError::InvalidArgument(format!(
                "{id} is already resolved"
            )));
        }
        c.active = false;
        c.resolved_at = Some(now);
        c.resolution = Some(resolution);
        tracing::info!(
            target: "trustledger.contradiction",
            contradiction = %id,
            case = %case_id,
            "contradiction resolved"
        );
        Ok(c.clone())
    }

    pub fn contradiction(&self, id: ContradictionId) -> Option<Contradiction> {
        let case_id = self.owners.read().get(&id).cloned()?;
        let case = self.case(&case_id)?;
        let state = case.lock();
        state.contradictions.get(&id).cloned()
    }

    pub fn active_for_artifact(
        &self,
        case_id: &CaseId,
        artifact_id: &ArtifactId,
    ) -> Vec<ContradictionId> {
        match self.case(case_id) {
            Some(case) => case.lock().active_for(artifact_id),
            None => Vec::new(),
        }
    }

    pub fn active_in_case(&self, case_id: &CaseId) -> Vec<Contradiction> {
        match self.case(case_id) {
            Some(case) => case
                .lock()
                .contradictions
                .values()
                .filter(|c| c.active)
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn facts_of(
        &self,
        case_id: &CaseId,
        artifact_id: &ArtifactId,
    ) -> Vec<AtomicFact> {
        match self.case(case_id) {
            Some(case) => case
                .lock()
                .facts
                .iter()
                .filter(|f| &f.artifact_id == artifact_id)
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    /// Other artifacts in the case holding a compatible claim on a key this
    /// artifact also asserts.
    pub fn corroborators(&self, case_id: &CaseId, artifact_id: &ArtifactId) -> Vec<ArtifactId> {
        let Some(case) = self.case(case_id) else {
            return Vec::new();
        };
        let state = case.lock();
        let own: Vec<&AtomicFact> = state
            .facts
            .iter()
            .filter(|f| &f.artifact_id == artifact_id)
            .collect();
        let mut out = BTreeSet::new();
        for other in state.facts.iter().filter(|f| &f.artifact_id != artifact_id) {
            if own
                .iter()
                .any(|mine| mine.content.corroborates(&other.content, self.amount_tolerance))
            {
                out.insert(other.artifact_id.clone());
            }
        }
        out.into_iter().collect()
    }
}
