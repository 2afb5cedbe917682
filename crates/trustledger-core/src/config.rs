use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::artifact::Tier;
use crate::error::{TrustLedgerError, TrustLedgerResult};

/// Minimum degraded composite for admission into the ledger.
pub const DEFAULT_COMPOSITE_THRESHOLD: f64 = 0.70;
/// Each dimension must reach this fraction of its maximum weight.
pub const DEFAULT_DIMENSION_FLOOR_RATIO: f64 = 0.50;
/// Amount claims further apart than this are mutually exclusive.
pub const DEFAULT_AMOUNT_TOLERANCE: f64 = 0.01;

pub const ENV_COMPOSITE_THRESHOLD: &str = "TRUSTLEDGER_COMPOSITE_THRESHOLD";
pub const ENV_DIMENSION_FLOOR: &str = "TRUSTLEDGER_DIMENSION_FLOOR";

/// Linear per-hour decay bounded below by `floor`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierDecay {
    pub rate_per_hour: f64,
    pub floor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecayPolicy {
    pub financial_institution: TierDecay,
    pub independent_third_party: TierDecay,
    pub other: TierDecay,
    pub uncorroborated_person: TierDecay,
}

impl DecayPolicy {
    pub fn for_tier(&self, tier: Tier) -> TierDecay {
        match tier {
            Tier::FinancialInstitution => self.financial_institution,
            Tier::IndependentThirdParty => self.independent_third_party,
            Tier::Other => self.other,
            Tier::UncorroboratedPerson => self.uncorroborated_person,
        }
    }
}

impl Default for DecayPolicy {
    fn default() -> Self {
        Self {
            financial_institution: TierDecay {
                rate_per_hour: 0.001,
                floor: 0.85,
            },
            independent_third_party: TierDecay {
                rate_per_hour: 0.002,
                floor: 0.70,
            },
            other: TierDecay {
                rate_per_hour: 0.003,
                floor: 0.55,
            },
            uncorroborated_person: TierDecay {
                rate_per_hour: 0.004,
                floor: 0.40,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    pub composite_threshold: f64,
    pub dimension_floor_ratio: f64,
    pub amount_tolerance: f64,
    /// Events younger than this keep the full Time weight.
    pub time_full_credit_days: i64,
    /// Age at which the Time dimension reaches its floor.
    pub time_horizon_days: i64,
    /// Fraction of the Time weight retained past the horizon.
    pub time_floor_ratio: f64,
    pub decay: DecayPolicy,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            composite_threshold: DEFAULT_COMPOSITE_THRESHOLD,
            dimension_floor_ratio: DEFAULT_DIMENSION_FLOOR_RATIO,
            amount_tolerance: DEFAULT_AMOUNT_TOLERANCE,
            time_full_credit_days: 365,
            time_horizon_days: 3650,
            time_floor_ratio: 0.40,
            decay: DecayPolicy::default(),
        }
    }
}

fn unit_interval(name: &str, v: f64, allow_zero: bool) -> TrustLedgerResult<()> {
    let lower_ok = if allow_zero { v >= 0.0 } else { v > 0.0 };
    if !v.is_finite() || !lower_ok || v > 1.0 {
        return Err(TrustLedgerError::InvalidArgument(format!(
            "{name} must lie in {}0, 1]",
            if allow_zero { "[" } else { "(" }
        )));
    }
    Ok(())
}

impl AdmissionConfig {
    pub fn load(path: impl AsRef<Path>) -> TrustLedgerResult<Self> {
        let payload = fs::read(path.as_ref()).map_err(|e| {
            TrustLedgerError::NotFound(format!("{}: {e}", path.as_ref().display()))
        })?;
        let cfg: AdmissionConfig = serde_json::from_slice(&payload)
            .map_err(|e| TrustLedgerError::InvalidArgument(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Applies `TRUSTLEDGER_*` overrides; unparsable values are rejected.
    pub fn with_env_overrides(mut self) -> TrustLedgerResult<Self> {
        if let Ok(raw) = std::env::var(ENV_COMPOSITE_THRESHOLD) {
            self.composite_threshold = raw.trim().parse().map_err(|_| {
                TrustLedgerError::InvalidArgument(format!("{ENV_COMPOSITE_THRESHOLD}={raw}"))
            })?;
        }
        if let Ok(raw) = std::env::var(ENV_DIMENSION_FLOOR) {
            self.dimension_floor_ratio = raw.trim().parse().map_err(|_| {
                TrustLedgerError::InvalidArgument(format!("{ENV_DIMENSION_FLOOR}={raw}"))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> TrustLedgerResult<()> {
        unit_interval("composite_threshold", self.composite_threshold, false)?;
        unit_interval("dimension_floor_ratio", self.dimension_floor_ratio, true)?;
        unit_interval("time_floor_ratio", self.time_floor_ratio, true)?;
        if !self.amount_tolerance.is_finite() || self.amount_tolerance < 0.0 {
            return Err(TrustLedgerError::InvalidArgument(
                "amount_tolerance must be finite and non-negative".to_string(),
            ));
        }
        if self.time_full_credit_days < 0 || self.time_horizon_days <= self.time_full_credit_days
        {
            return Err(TrustLedgerError::InvalidArgument(
                "time_horizon_days must exceed time_full_credit_days".to_string(),
            ));
        }
        for tier in Tier::ALL {
            let d = self.decay.for_tier(tier);
            if !d.rate_per_hour.is_finite() || d.rate_per_hour < 0.0 {
                return Err(TrustLedgerError::InvalidArgument(format!(
                    "decay rate for {} must be finite and non-negative",
                    tier.as_str()
                )));
            }
            unit_interval("decay floor", d.floor, true)?;
        }
        Ok(())
    }
}
