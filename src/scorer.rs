//! The rule-based scorer: seven normalized sub-scores combined into a
//! weighted, clamped base score, plus the plan-level diversity-triple
//! penalty applied after ranking.

use crate::config::{AdaptiveConfig, ScorerThresholds, ScorerWeights};
use crate::posterior::PosteriorState;
use crate::target::{DefenseFlag, TargetProfile};
use crate::technique::{AttackTechnique, Domain, Phase, Surface};
use crate::Utility;
use std::collections::HashSet;

/// Seven sub-scores plus the combined, normalized base score. All fields
/// (other than `diversity_bonus`, filled in at plan time) are in [0,1].
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ScoreBreakdown {
    pub compatibility: Utility,
    pub access_fit: Utility,
    pub goal_fit: Utility,
    pub defense_bypass_likelihood: Utility,
    pub signal_gain: Utility,
    pub cost_penalty: Utility,
    pub detection_risk_penalty: Utility,
    pub raw: Utility,
    pub normalized: Utility,
    pub diversity_bonus: Utility,
}

/// Maps a defense flag to the surface it is relevant to, per the fixed
/// mapping in the rule-based scorer design.
fn mapped_surface(flag: DefenseFlag) -> Surface {
    match flag {
        DefenseFlag::Moderation | DefenseFlag::InputFilter | DefenseFlag::OutputFilter => {
            Surface::Guardrail
        }
        DefenseFlag::InjectionDetection => Surface::Model,
        DefenseFlag::SchemaValidation => Surface::Tool,
        DefenseFlag::RateLimit => Surface::Model,
    }
}

fn all_defense_flags() -> [DefenseFlag; 6] {
    [
        DefenseFlag::Moderation,
        DefenseFlag::InputFilter,
        DefenseFlag::OutputFilter,
        DefenseFlag::InjectionDetection,
        DefenseFlag::SchemaValidation,
        DefenseFlag::RateLimit,
    ]
}

pub struct RuleBasedScorer<'a> {
    weights: &'a ScorerWeights,
    thresholds: &'a ScorerThresholds,
}

impl<'a> RuleBasedScorer<'a> {
    pub fn new(weights: &'a ScorerWeights, thresholds: &'a ScorerThresholds) -> Self {
        Self { weights, thresholds }
    }

    fn compatibility(&self, technique: &AttackTechnique, target: &TargetProfile) -> f64 {
        if technique.target_types.is_empty() {
            0.5
        } else if technique.target_types.contains(&target.target_type) {
            1.0
        } else {
            0.0
        }
    }

    fn access_fit(&self, technique: &AttackTechnique, target: &TargetProfile) -> f64 {
        let steps = target.access_level.steps_above(technique.required_access);
        if steps < 0 {
            0.0
        } else if steps == 0 {
            1.0
        } else {
            let decay = 1.0 - self.thresholds.access_overqualification_decay * steps as f64;
            decay.max(self.thresholds.access_fit_floor)
        }
    }

    fn goal_fit(&self, technique: &AttackTechnique, target: &TargetProfile) -> f64 {
        if target.goals.is_empty() {
            return 0.5;
        }
        let supported = target.goals.iter().filter(|g| technique.goals.contains(g)).count();
        supported as f64 / target.goals.len() as f64
    }

    fn defense_bypass_likelihood(&self, technique: &AttackTechnique, target: &TargetProfile) -> f64 {
        let relevant = all_defense_flags()
            .into_iter()
            .filter(|f| mapped_surface(*f) == technique.surface)
            .count();
        if relevant == 0 {
            return self.thresholds.defense_bypass_baseline;
        }
        let active = all_defense_flags()
            .into_iter()
            .filter(|f| mapped_surface(*f) == technique.surface && target.defenses.is_active(*f))
            .count();
        let ratio = active as f64 / relevant as f64;
        (1.0 - ratio * 0.7).max(self.thresholds.defense_bypass_floor)
    }

    /// See DESIGN.md for how the four textual cases map onto posterior
    /// existence/observation state: a posterior that has never been touched
    /// reads as "no priors at all"; one that exists with zero observations
    /// but whose id is in the tried set reads as "all inconclusive"; zero
    /// observations and not tried reads as "untried"; nonzero observations
    /// reads as "decisively tested".
    fn signal_gain(
        &self,
        technique_id: &str,
        tried: &HashSet<String>,
        state: &PosteriorState,
    ) -> f64 {
        match state.get(technique_id) {
            None => 0.7,
            Some(posterior) if posterior.observations() > 0 => 0.1,
            Some(_) if tried.contains(technique_id) => 0.5,
            Some(_) => 1.0,
        }
    }

    fn cost_penalty(&self, technique: &AttackTechnique) -> f64 {
        technique.base_cost
    }

    fn detection_risk_penalty(&self, technique: &AttackTechnique, target: &TargetProfile) -> f64 {
        use crate::technique::StealthLevel;
        if target.constraints.stealth_priority == StealthLevel::Overt {
            return 0.0;
        }
        let penalty = self.thresholds.stealth_penalty(technique.stealth);
        if target.constraints.stealth_priority == StealthLevel::Moderate {
            penalty * self.thresholds.moderate_stealth_dampener
        } else {
            penalty
        }
    }

    /// `normalized = clamp((raw - lo)/(hi - lo), 0, 1)`, `hi = Σw_positive`,
    /// `lo = -Σw_penalty`. If `hi == lo` (all weights zero), returns 0.5.
    pub fn normalize(&self, raw: f64) -> f64 {
        let hi = self.weights.positive_sum();
        let lo = -self.weights.penalty_sum();
        if (hi - lo).abs() < f64::EPSILON {
            return 0.5;
        }
        ((raw - lo) / (hi - lo)).clamp(0.0, 1.0)
    }

    pub fn score(
        &self,
        technique: &AttackTechnique,
        target: &TargetProfile,
        tried: &HashSet<String>,
        state: &PosteriorState,
    ) -> ScoreBreakdown {
        let compatibility = self.compatibility(technique, target);
        let access_fit = self.access_fit(technique, target);
        let goal_fit = self.goal_fit(technique, target);
        let defense_bypass_likelihood = self.defense_bypass_likelihood(technique, target);
        let signal_gain = self.signal_gain(&technique.id, tried, state);
        let cost_penalty = self.cost_penalty(technique);
        let detection_risk_penalty = self.detection_risk_penalty(technique, target);

        let raw = self.weights.compatibility * compatibility
            + self.weights.access_fit * access_fit
            + self.weights.goal_fit * goal_fit
            + self.weights.defense_bypass * defense_bypass_likelihood
            + self.weights.signal_gain * signal_gain
            - self.weights.cost_penalty * cost_penalty
            - self.weights.detection_risk_penalty * detection_risk_penalty;

        let normalized = self.normalize(raw);

        ScoreBreakdown {
            compatibility,
            access_fit,
            goal_fit,
            defense_bypass_likelihood,
            signal_gain,
            cost_penalty,
            detection_risk_penalty,
            raw,
            normalized,
            diversity_bonus: 0.0,
        }
    }
}

/// Hard filter: target-type compatibility, sufficient access, goal overlap,
/// and cost within budget. Used as the planner's first pipeline stage.
pub fn is_compatible(technique: &AttackTechnique, target: &TargetProfile, adaptive: &AdaptiveConfig) -> bool {
    technique.supports_target_type(target.target_type)
        && target.access_level >= technique.required_access
        && target.goals.iter().any(|g| technique.supports_goal(*g))
        && technique.base_cost <= adaptive.max_cost
}

/// The `(domain, phase, surface)` triple used for the diversity-triple
/// penalty: entries ranked after a repeat of this triple lose `0.15` per
/// prior occurrence.
pub fn diversity_triple(technique: &AttackTechnique) -> (Domain, Phase, Surface) {
    (technique.domain, technique.phase, technique.surface)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{DefenseProfile, OperationalConstraints};
    use crate::technique::{AccessLevel, Goal, References, StealthLevel};
    use std::collections::BTreeSet;

    fn target(stealth: StealthLevel) -> TargetProfile {
        TargetProfile::new(
            "t",
            crate::target::TargetType::Chatbot,
            AccessLevel::Black,
            BTreeSet::from([Goal::Jailbreak]),
            DefenseProfile::default(),
            OperationalConstraints {
                stealth_priority: stealth,
                ..OperationalConstraints::default()
            },
        )
        .unwrap()
    }

    fn technique() -> AttackTechnique {
        AttackTechnique {
            id: "t1".into(),
            name: "t1".into(),
            domain: Domain::Llm,
            phase: Phase::Probe,
            surface: Surface::Guardrail,
            required_access: AccessLevel::Black,
            goals: BTreeSet::from([Goal::Jailbreak]),
            target_types: BTreeSet::from([crate::target::TargetType::Chatbot]),
            base_cost: 0.2,
            stealth: StealthLevel::Moderate,
            tags: vec!["x".into()],
            references: References::default(),
        }
    }

    #[test]
    fn detection_penalty_zero_when_overt() {
        let weights = ScorerWeights::default();
        let thresholds = ScorerThresholds::default();
        let scorer = RuleBasedScorer::new(&weights, &thresholds);
        let t = technique();
        let target = target(StealthLevel::Overt);
        assert_eq!(scorer.detection_risk_penalty(&t, &target), 0.0);
    }

    #[test]
    fn detection_penalty_dampened_when_moderate() {
        let weights = ScorerWeights::default();
        let thresholds = ScorerThresholds::default();
        let scorer = RuleBasedScorer::new(&weights, &thresholds);
        let t = technique();
        let target = target(StealthLevel::Moderate);
        // moderate stealth technique -> base penalty 0.5, dampened by 0.5 => 0.25
        assert!((scorer.detection_risk_penalty(&t, &target) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn signal_gain_states() {
        let weights = ScorerWeights::default();
        let thresholds = ScorerThresholds::default();
        let scorer = RuleBasedScorer::new(&weights, &thresholds);
        let mut state = PosteriorState::new(8.0);
        let tried = HashSet::new();
        assert_eq!(scorer.signal_gain("never-touched", &tried, &state), 0.7);

        state.get_or_init("untried-init", 0.5);
        assert_eq!(scorer.signal_gain("untried-init", &tried, &state), 1.0);

        let mut tried_set = HashSet::new();
        tried_set.insert("inconclusive".to_string());
        state.get_or_init("inconclusive", 0.5);
        assert_eq!(scorer.signal_gain("inconclusive", &tried_set, &state), 0.5);

        state.update("tested", 1.0).unwrap();
        assert_eq!(scorer.signal_gain("tested", &tried, &state), 0.1);
    }

    #[test]
    fn normalize_returns_half_on_degenerate_weights() {
        let weights = ScorerWeights {
            compatibility: 0.0,
            access_fit: 0.0,
            goal_fit: 0.0,
            defense_bypass: 0.0,
            signal_gain: 0.0,
            cost_penalty: 0.0,
            detection_risk_penalty: 0.0,
        };
        let thresholds = ScorerThresholds::default();
        let scorer = RuleBasedScorer::new(&weights, &thresholds);
        assert_eq!(scorer.normalize(0.0), 0.5);
    }

    #[test]
    fn hard_filter_respects_cost_budget() {
        let target = target(StealthLevel::Moderate);
        let t = technique();
        let mut adaptive = AdaptiveConfig::default();
        adaptive.max_cost = 0.1;
        assert!(!is_compatible(&t, &target, &adaptive));
        adaptive.max_cost = 1.0;
        assert!(is_compatible(&t, &target, &adaptive));
    }
}
