use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::artifact::{ArtifactId, ArtifactStatus};
use crate::config::AdmissionConfig;
use crate::contradiction::ContradictionId;
use crate::score::{Dimension, SixDimensionScore, TrustLevel};

const PASS: &str = "✓";
const FAIL: &str = "✗";
const EPS: f64 = 1e-9;

/// Threshold half of the admission decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MintingGate {
    composite_threshold: f64,
    dimension_floor_ratio: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdAssessment {
    pub passed: bool,
    /// One marked line per dimension, then the composite line.
    pub reasons: Vec<String>,
}

impl MintingGate {
    pub fn new(cfg: &AdmissionConfig) -> Self {
        Self {
            composite_threshold: cfg.composite_threshold,
            dimension_floor_ratio: cfg.dimension_floor_ratio,
        }
    }

    pub fn dimension_floor(&self, d: Dimension) -> f64 {
        d.max_weight() * self.dimension_floor_ratio
    }

    /// Sub-scores are checked undecayed; degradation applies to `current_score`.
    pub fn assess(&self, score: &SixDimensionScore, current_score: f64) -> ThresholdAssessment {
        let mut passed = true;
        let mut reasons = Vec::with_capacity(Dimension::ALL.len() + 1);
        for (d, v) in score.iter() {
            let floor = self.dimension_floor(d);
            let ok = v + EPS >= floor;
            passed &= ok;
            reasons.push(format!(
                "{} {}: {:.2}/{:.0} (floor {:.2})",
                if ok { PASS } else { FAIL },
                d,
                v,
                d.max_weight(),
                floor
            ));
        }
        let ok = current_score + EPS >= self.composite_threshold;
        passed &= ok;
        reasons.push(format!(
            "{} Composite: {:.3} (threshold {:.2})",
            if ok { PASS } else { FAIL },
            current_score,
            self.composite_threshold
        ));
        ThresholdAssessment { passed, reasons }
    }
}

pub(crate) fn custody_reason(broken_at: Option<usize>) -> String {
    match broken_at {
        None => format!("{PASS} Custody: chain intact"),
        Some(i) => format!("{FAIL} Custody: chain broken at entry {i}"),
    }
}

pub(crate) fn contradiction_reason(active: &[ContradictionId]) -> String {
    if active.is_empty() {
        return format!("{PASS} Contradictions: none active");
    }
    let ids: Vec<String> = active.iter().map(ToString::to_string).collect();
    format!("{FAIL} Contradictions: {} active", ids.join(", "))
}

/// Read-only preview of what `attempt_mint` would decide right now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityReport {
    pub artifact_id: ArtifactId,
    pub status: ArtifactStatus,
    pub eligible: bool,
    /// Degraded composite (frozen once minted).
    pub score: f64,
    pub original_score: f64,
    pub per_dimension: BTreeMap<Dimension, f64>,
    pub trust_level: TrustLevel,
    pub reasons: Vec<String>,
    pub blockers: Vec<ContradictionId>,
    pub custody_broken_at: Option<usize>,
    pub minted_block: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(network: f64) -> SixDimensionScore {
        SixDimensionScore {
            source: 20.0,
            time: 15.0,
            chain: 15.0,
            network,
            outcomes: 15.0,
            justice: 15.0,
        }
    }

    #[test]
    fn passes_with_every_floor_met() {
        let gate = MintingGate::new(&AdmissionConfig::default());
        let a = gate.assess(&score(12.0), 0.782);
        assert!(a.passed);
        assert_eq!(a.reasons.len(), 7);
        assert!(a.reasons.iter().all(|r| r.starts_with(PASS)));
    }

    #[test]
    fn single_weak_dimension_fails_despite_high_composite() {
        let gate = MintingGate::new(&AdmissionConfig::default());
        let a = gate.assess(&score(6.0), 0.86);
        assert!(!a.passed);
        let failing: Vec<&String> = a.reasons.iter().filter(|r| r.starts_with(FAIL)).collect();
        assert_eq!(failing.len(), 1);
        assert!(failing[0].contains("Network"));
    }

    #[test]
    fn composite_below_threshold_fails() {
        let gate = MintingGate::new(&AdmissionConfig::default());
        let a = gate.assess(&score(12.0), 0.69);
        assert!(!a.passed);
        assert!(a.reasons.last().unwrap().starts_with(FAIL));
    }

    #[test]
    fn thresholds_follow_config() {
        let cfg = AdmissionConfig {
            composite_threshold: 0.95,
            dimension_floor_ratio: 0.0,
            ..AdmissionConfig::default()
        };
        let gate = MintingGate::new(&cfg);
        assert_eq!(gate.dimension_floor(Dimension::Source), 0.0);
        assert!(!gate.assess(&score(20.0), 0.92).passed);
    }

    #[test]
    fn reason_lines_name_offenders() {
        assert!(custody_reason(Some(2)).contains("entry 2"));
        let line = contradiction_reason(&[ContradictionId(4), ContradictionId(7)]);
        assert!(line.starts_with(FAIL));
        assert!(line.contains("contradiction-4, contradiction-7"));
    }
}
