use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{TrustLedgerError, TrustLedgerResult};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(pub String);

impl ArtifactId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(pub String);

impl CaseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source-reliability classification of an artifact's originator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    FinancialInstitution,
    IndependentThirdParty,
    UncorroboratedPerson,
    Other,
}

impl Tier {
    pub const ALL: [Tier; 4] = [
        Tier::FinancialInstitution,
        Tier::IndependentThirdParty,
        Tier::Other,
        Tier::UncorroboratedPerson,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::FinancialInstitution => "FINANCIAL_INSTITUTION",
            Tier::IndependentThirdParty => "INDEPENDENT_THIRD_PARTY",
            Tier::UncorroboratedPerson => "UNCORROBORATED_PERSON",
            Tier::Other => "OTHER",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtifactStatus {
    Pending,
    Verified,
    RequiresCorroboration,
    Minted,
}

impl ArtifactStatus {
    /// Every legal edge of the artifact lifecycle. `Minted` is terminal.
    pub fn can_transition(self, to: ArtifactStatus) -> bool {
        use ArtifactStatus::*;
        match (self, to) {
            (Pending, Verified) | (Pending, RequiresCorroboration) => true,
            (Verified, Verified) | (Verified, RequiresCorroboration) => true,
            (RequiresCorroboration, Verified) | (RequiresCorroboration, RequiresCorroboration) => {
                true
            }
            (Pending | Verified | RequiresCorroboration, Minted) => true,
            (Pending, Pending) => true,
            (Verified | RequiresCorroboration, Pending) => false,
            (Minted, _) => false,
        }
    }

    pub fn transition(self, to: ArtifactStatus) -> TrustLedgerResult<ArtifactStatus> {
        if self.can_transition(to) {
            Ok(to)
        } else {
            Err(TrustLedgerError::InvalidTransition(format!(
                "{} -> {}",
                self.as_str(),
                to.as_str()
            )))
        }
    }

    pub fn is_minted(self) -> bool {
        matches!(self, ArtifactStatus::Minted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactStatus::Pending => "PENDING",
            ArtifactStatus::Verified => "VERIFIED",
            ArtifactStatus::RequiresCorroboration => "REQUIRES_CORROBORATION",
            ArtifactStatus::Minted => "MINTED",
        }
    }
}

/// Attribute snapshot supplied by the host when an artifact enters the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRegistration {
    pub id: ArtifactId,
    pub case_id: CaseId,
    pub tier: Tier,
    /// When the underlying event the artifact documents took place.
    pub event_at: DateTime<Utc>,
    pub uploaded_by: String,
    #[serde(default)]
    pub file_hash_hex: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceArtifact {
    pub id: ArtifactId,
    pub case_id: CaseId,
    pub tier: Tier,
    pub original_score: f64,
    pub current_score: f64,
    pub status: ArtifactStatus,
    pub event_at: DateTime<Utc>,
    pub uploaded_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
    pub minted_at: Option<DateTime<Utc>>,
    pub block_number: Option<u64>,
    pub file_hash_hex: Option<String>,
}

impl EvidenceArtifact {
    pub fn new(reg: &ArtifactRegistration, uploaded_at: DateTime<Utc>) -> Self {
        Self {
            id: reg.id.clone(),
            case_id: reg.case_id.clone(),
            tier: reg.tier,
            original_score: 0.0,
            current_score: 0.0,
            status: ArtifactStatus::Pending,
            event_at: reg.event_at,
            uploaded_at,
            verified_at: None,
            minted_at: None,
            block_number: None,
            file_hash_hex: reg.file_hash_hex.clone(),
        }
    }

    pub fn is_minted(&self) -> bool {
        self.status.is_minted()
    }

    /// Start of the degradation clock: last verification, else upload.
    pub fn decay_anchor(&self) -> DateTime<Utc> {
        self.verified_at.unwrap_or(self.uploaded_at)
    }

    pub fn set_status(&mut self, to: ArtifactStatus) -> TrustLedgerResult<ArtifactStatus> {
        let from = self.status;
        self.status = from.transition(to)?;
        Ok(from)
    }
}
