// Copyright (c) 2026 Joseph Verdicchio and EvidenceOS Contributors
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::artifact::{ArtifactStatus, Tier};
use crate::config::AdmissionConfig;
use crate::custody::{CustodyAction, CustodyChain};
use crate::error::{TrustLedgerError, TrustLedgerResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Source,
    Time,
    Chain,
    Network,
    Outcomes,
    Justice,
}

impl Dimension {
    pub const ALL: [Dimension; 6] = [
        Dimension::Source,
        Dimension::Time,
        Dimension::Chain,
        Dimension::Network,
        Dimension::Outcomes,
        Dimension::Justice,
    ];

    /// Fixed weight of the dimension; the six weights sum to 100.
    pub fn max_weight(self) -> f64 {
        match self {
            Dimension::Source => 20.0,
            Dimension::Time => 15.0,
            Dimension::Chain => 15.0,
            Dimension::Network => 20.0,
            Dimension::Outcomes => 15.0,
            Dimension::Justice => 15.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Dimension::Source => "Source",
            Dimension::Time => "Time",
            Dimension::Chain => "Chain",
            Dimension::Network => "Network",
            Dimension::Outcomes => "Outcomes",
            Dimension::Justice => "Justice",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SixDimensionScore {
    pub source: f64,
    pub time: f64,
    pub chain: f64,
    pub network: f64,
    pub outcomes: f64,
    pub justice: f64,
}

impl SixDimensionScore {
    pub fn get(&self, d: Dimension) -> f64 {
        match d {
            Dimension::Source => self.source,
            Dimension::Time => self.time,
            Dimension::Chain => self.chain,
            Dimension::Network => self.network,
            Dimension::Outcomes => self.outcomes,
            Dimension::Justice => self.justice,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Dimension, f64)> + '_ {
        Dimension::ALL.into_iter().map(|d| (d, self.get(d)))
    }

    /// Sum of the sub-scores normalised to [0, 1].
    pub fn composite(&self) -> f64 {
        (self.iter().map(|(_, v)| v).sum::<f64>() / 100.0).clamp(0.0, 1.0)
    }

    /// Every sub-score finite and within `[0, max]`.
    pub fn check_consistency(&self) -> TrustLedgerResult<()> {
        for (d, v) in self.iter() {
            if !v.is_finite() || v < 0.0 || v > d.max_weight() + 1e-9 {
                return Err(TrustLedgerError::Internal(format!(
                    "{d} sub-score {v} outside [0, {}]",
                    d.max_weight()
                )));
            }
        }
        Ok(())
    }
}

/// Coarse classification of a composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrustLevel {
    L0Unverified,
    L1Bronze,
    L2Silver,
    L3Gold,
    L4Platinum,
}

impl TrustLevel {
    pub fn from_composite(composite: f64) -> Self {
        let pct = composite * 100.0;
        if pct >= 90.0 {
            TrustLevel::L4Platinum
        } else if pct >= 80.0 {
            TrustLevel::L3Gold
        } else if pct >= 70.0 {
            TrustLevel::L2Silver
        } else if pct >= 60.0 {
            TrustLevel::L1Bronze
        } else {
            TrustLevel::L0Unverified
        }
    }
}

/// What the Chain dimension needs to know about a custody chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodySummary {
    pub intact: bool,
    pub entries: usize,
    pub verified: bool,
}

impl CustodySummary {
    pub fn of(chain: &CustodyChain) -> Self {
        Self {
            intact: chain.verify().is_ok(),
            entries: chain.len(),
            verified: chain.has_action(CustodyAction::Verified),
        }
    }
}

/// Raw attributes scored by [`ScoreEngine::score`]. Each dimension reads a
/// disjoint subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreInputs {
    pub tier: Tier,
    pub event_at: DateTime<Utc>,
    pub custody: CustodySummary,
    pub corroborating_tiers: Vec<Tier>,
    pub status: ArtifactStatus,
    pub active_contradictions: usize,
}

#[derive(Debug, Clone)]
pub struct ScoreEngine {
    time_full_credit_days: i64,
    time_horizon_days: i64,
    time_floor_ratio: f64,
}

impl Default for ScoreEngine {
    fn default() -> Self {
        Self::new(&AdmissionConfig::default())
    }
}

impl ScoreEngine {
    pub fn new(cfg: &AdmissionConfig) -> Self {
        Self {
            time_full_credit_days: cfg.time_full_credit_days,
            time_horizon_days: cfg.time_horizon_days,
            time_floor_ratio: cfg.time_floor_ratio,
        }
    }

    pub fn score(&self, inputs: &ScoreInputs, now: DateTime<Utc>) -> SixDimensionScore {
        SixDimensionScore {
            source: source_points(inputs.tier),
            time: self.time_points(inputs.event_at, now),
            chain: chain_points(&inputs.custody),
            network: network_points(&inputs.corroborating_tiers),
            outcomes: outcome_points(inputs.status),
            justice: justice_points(inputs.active_contradictions),
        }
    }

    fn time_points(&self, event_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let max = Dimension::Time.max_weight();
        let age_days = (now - event_at).num_days().max(0);
        if age_days <= self.time_full_credit_days {
            return max;
        }
        let span = (self.time_horizon_days - self.time_full_credit_days).max(1) as f64;
        let over = (age_days - self.time_full_credit_days) as f64;
        let ratio = (1.0 - (1.0 - self.time_floor_ratio) * over / span).max(self.time_floor_ratio);
        max * ratio
    }
}

fn source_points(tier: Tier) -> f64 {
    match tier {
        Tier::FinancialInstitution => 20.0,
        Tier::IndependentThirdParty => 16.0,
        Tier::Other => 12.0,
        Tier::UncorroboratedPerson => 6.0,
    }
}

fn chain_points(c: &CustodySummary) -> f64 {
    if !c.intact || c.entries <= 1 {
        return 0.0;
    }
    let mut ratio = 0.6;
    if c.verified {
        ratio += 0.2;
    }
    if c.entries >= 3 {
        ratio += 0.2;
    }
    Dimension::Chain.max_weight() * ratio
}

fn network_points(corroborating: &[Tier]) -> f64 {
    let bonus: f64 = corroborating
        .iter()
        .map(|t| match t {
            Tier::FinancialInstitution => 8.0,
            Tier::IndependentThirdParty => 6.0,
            Tier::Other => 4.0,
            Tier::UncorroboratedPerson => 2.0,
        })
        .sum();
    (6.0 + bonus).min(Dimension::Network.max_weight())
}

fn outcome_points(status: ArtifactStatus) -> f64 {
    match status {
        ArtifactStatus::Verified | ArtifactStatus::Minted => 15.0,
        ArtifactStatus::Pending => 9.0,
        ArtifactStatus::RequiresCorroboration => 4.0,
    }
}

fn justice_points(active_contradictions: usize) -> f64 {
    if active_contradictions > 0 {
        0.0
    } else {
        Dimension::Justice.max_weight()
    }
}
