use chrono::{DateTime, Utc};

use crate::artifact::{EvidenceArtifact, Tier};
use crate::clock::elapsed_hours;
use crate::config::DecayPolicy;

/// Time-based degradation of a not-yet-minted artifact's score.
///
/// `factor(0) == 1`, non-increasing in elapsed time, never below the tier
/// floor. Read-only; safe to share across threads.
#[derive(Debug, Clone, Default)]
pub struct DegradationModel {
    policy: DecayPolicy,
}

impl DegradationModel {
    pub fn new(policy: DecayPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &DecayPolicy {
        &self.policy
    }

    pub fn decay_factor(&self, elapsed_hours: f64, tier: Tier) -> f64 {
        let d = self.policy.for_tier(tier);
        let floor = d.floor.clamp(0.0, 1.0);
        if elapsed_hours <= 0.0 {
            return 1.0;
        }
        // NaN elapsed falls through `max` to the floor.
        (1.0 - d.rate_per_hour * elapsed_hours)
            .max(floor)
            .clamp(0.0, 1.0)
    }

    pub fn degrade(&self, original_score: f64, elapsed_hours: f64, tier: Tier) -> f64 {
        let original = if original_score.is_finite() {
            original_score.clamp(0.0, 1.0)
        } else {
            0.0
        };
        (original * self.decay_factor(elapsed_hours, tier)).max(0.0)
    }

    /// Current score at `now`. Minted artifacts return their frozen value.
    pub fn current_score(
        &self,
        artifact: &EvidenceArtifact,
        original_score: f64,
        now: DateTime<Utc>,
    ) -> f64 {
        if artifact.is_minted() {
            return artifact.current_score;
        }
        let hours = elapsed_hours(artifact.decay_anchor(), now);
        self.degrade(original_score, hours, artifact.tier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn financial_institution_reaches_floor_by_ten_days() {
        let m = DegradationModel::default();
        let current = m.degrade(0.92, 240.0, Tier::FinancialInstitution);
        assert!((current - 0.92 * 0.85).abs() < 1e-12, "got {current}");
        assert!((current - 0.782).abs() < 1e-9);
    }

    #[test]
    fn factor_is_one_at_zero_and_bounded_by_floor() {
        let m = DegradationModel::default();
        for tier in Tier::ALL {
            assert_eq!(m.decay_factor(0.0, tier), 1.0);
            let floor = m.policy().for_tier(tier).floor;
            assert_eq!(m.decay_factor(1e9, tier), floor);
            assert_eq!(m.decay_factor(f64::INFINITY, tier), floor);
        }
    }

    #[test]
    fn lower_tiers_decay_faster() {
        let m = DegradationModel::default();
        let fi = m.decay_factor(48.0, Tier::FinancialInstitution);
        let up = m.decay_factor(48.0, Tier::UncorroboratedPerson);
        assert!(fi > up);
    }

    proptest! {
        #[test]
        fn degradation_never_increases_with_time(
            original in 0.0f64..=1.0,
            t1 in 0.0f64..10_000.0,
            dt in 0.0f64..10_000.0,
            tier_idx in 0usize..4,
        ) {
            let m = DegradationModel::default();
            let tier = Tier::ALL[tier_idx];
            let a = m.degrade(original, t1, tier);
            let b = m.degrade(original, t1 + dt, tier);
            prop_assert!(b <= a);
            prop_assert!(b >= 0.0);
            prop_assert!(a <= original);
        }
    }
}
