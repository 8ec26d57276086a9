//! Typed configuration record. A configuration document arrives as JSON
//! from the collaborator layer and is parsed exactly once into this record;
//! every scorer and planner downstream reads `PlannerConfig`, never the raw
//! document, per the design note on replacing callbacks/string-keyed maps
//! with typed records.

use crate::correlation::CorrelationConfig;
use crate::diversity::DiversityConfig;
use crate::error::{PlannerError, PlannerResult};
use crate::technique::StealthLevel;
use crate::{
    Fraction, Utility, DEFAULT_BLEND_WEIGHT, DEFAULT_COST_WEIGHT, DEFAULT_DETECTION_WEIGHT,
    DEFAULT_INFO_GAIN_WEIGHT, DEFAULT_MIN_ATTEMPTS, DEFAULT_PRIOR_STRENGTH, DEFAULT_REPEAT_PENALTY,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The seven weighted sub-scores combined by the rule-based scorer: five
/// positive contributors and two penalties.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScorerWeights {
    pub compatibility: Utility,
    pub access_fit: Utility,
    pub goal_fit: Utility,
    pub defense_bypass: Utility,
    pub signal_gain: Utility,
    pub cost_penalty: Utility,
    pub detection_risk_penalty: Utility,
}

impl Default for ScorerWeights {
    fn default() -> Self {
        Self {
            compatibility: 1.0,
            access_fit: 1.0,
            goal_fit: 1.0,
            defense_bypass: 1.0,
            signal_gain: 1.0,
            cost_penalty: 1.0,
            detection_risk_penalty: 1.0,
        }
    }
}

impl ScorerWeights {
    pub fn positive_sum(&self) -> Utility {
        self.compatibility + self.access_fit + self.goal_fit + self.defense_bypass + self.signal_gain
    }

    pub fn penalty_sum(&self) -> Utility {
        self.cost_penalty + self.detection_risk_penalty
    }

    /// Applies a multiplicative `factor` to the named weight, returning a
    /// copy; used by the sensitivity analyzer to perturb one weight at a
    /// time while holding the rest constant.
    pub fn perturbed(&self, name: &str, factor: f64) -> Self {
        let mut w = *self;
        match name {
            "compatibility" => w.compatibility *= factor,
            "access_fit" => w.access_fit *= factor,
            "goal_fit" => w.goal_fit *= factor,
            "defense_bypass" => w.defense_bypass *= factor,
            "signal_gain" => w.signal_gain *= factor,
            "cost_penalty" => w.cost_penalty *= factor,
            "detection_risk_penalty" => w.detection_risk_penalty *= factor,
            _ => {}
        }
        w
    }

    pub fn names() -> [&'static str; 7] {
        [
            "compatibility",
            "access_fit",
            "goal_fit",
            "defense_bypass",
            "signal_gain",
            "cost_penalty",
            "detection_risk_penalty",
        ]
    }
}

/// Sectioned threshold overrides the scorer reads instead of hard-coded
/// numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScorerThresholds {
    pub access_overqualification_decay: f64,
    pub access_fit_floor: f64,
    pub defense_bypass_baseline: f64,
    pub defense_bypass_floor: f64,
    pub stealth_penalty: HashMap<StealthLevelKey, f64>,
    pub moderate_stealth_dampener: f64,
}

/// `StealthLevel` can't be a `HashMap` key directly without extra trait
/// plumbing for serde; this thin wrapper keeps the thresholds table
/// serializable while the lookup stays type-safe at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StealthLevelKey {
    Overt,
    Moderate,
    Covert,
}

impl From<StealthLevel> for StealthLevelKey {
    fn from(level: StealthLevel) -> Self {
        match level {
            StealthLevel::Overt => StealthLevelKey::Overt,
            StealthLevel::Moderate => StealthLevelKey::Moderate,
            StealthLevel::Covert => StealthLevelKey::Covert,
        }
    }
}

impl Default for ScorerThresholds {
    fn default() -> Self {
        let mut stealth_penalty = HashMap::new();
        stealth_penalty.insert(StealthLevelKey::Overt, 1.0);
        stealth_penalty.insert(StealthLevelKey::Moderate, 0.5);
        stealth_penalty.insert(StealthLevelKey::Covert, 0.1);
        Self {
            access_overqualification_decay: 0.2,
            access_fit_floor: 0.5,
            defense_bypass_baseline: 0.8,
            defense_bypass_floor: 0.1,
            stealth_penalty,
            moderate_stealth_dampener: 0.5,
        }
    }
}

impl ScorerThresholds {
    pub fn stealth_penalty(&self, level: StealthLevel) -> f64 {
        self.stealth_penalty
            .get(&StealthLevelKey::from(level))
            .copied()
            .unwrap_or(0.5)
    }
}

/// Thompson-sampling / utility-shaping knobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveConfig {
    pub prior_strength: Fraction,
    pub info_gain_weight: Utility,
    pub detection_penalty_weight: Utility,
    pub cost_weight: Utility,
    pub use_benchmark_priors: bool,
    pub blend_weight: Fraction,
    pub default_repeat_penalty: Utility,
    pub max_cost: f64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            prior_strength: DEFAULT_PRIOR_STRENGTH,
            info_gain_weight: DEFAULT_INFO_GAIN_WEIGHT,
            detection_penalty_weight: DEFAULT_DETECTION_WEIGHT,
            cost_weight: DEFAULT_COST_WEIGHT,
            use_benchmark_priors: true,
            blend_weight: DEFAULT_BLEND_WEIGHT,
            default_repeat_penalty: DEFAULT_REPEAT_PENALTY,
            max_cost: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensitivityConfig {
    pub perturbation_percent: f64,
    pub num_samples: usize,
    pub top_k: usize,
    pub seed: u64,
}

impl Default for SensitivityConfig {
    fn default() -> Self {
        Self {
            perturbation_percent: 0.20,
            num_samples: 50,
            top_k: 10,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub min_attempts: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_attempts: DEFAULT_MIN_ATTEMPTS,
        }
    }
}

/// The full configuration document, parsed once. Construct with
/// `serde_json::from_str` (or `Default::default()` in tests) and pass by
/// reference into every scorer/planner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlannerConfig {
    pub scorer_weights: ScorerWeights,
    #[serde(default)]
    pub scorer_thresholds: ScorerThresholdsOrDefault,
    pub diversity: DiversityConfig,
    pub adaptive: AdaptiveConfig,
    pub correlation: CorrelationConfig,
    pub sensitivity: SensitivityConfig,
    pub analysis: AnalysisConfig,
}

impl PlannerConfig {
    /// Rejects a configuration document whose numbers can't back a sane
    /// planner: non-finite or negative weights, a blend weight or
    /// perturbation percentage outside [0,1], or a non-positive
    /// prior strength/max cost/sample count.
    pub fn validate(&self) -> PlannerResult<()> {
        let weights = [
            ("compatibility", self.scorer_weights.compatibility),
            ("access_fit", self.scorer_weights.access_fit),
            ("goal_fit", self.scorer_weights.goal_fit),
            ("defense_bypass", self.scorer_weights.defense_bypass),
            ("signal_gain", self.scorer_weights.signal_gain),
            ("cost_penalty", self.scorer_weights.cost_penalty),
            ("detection_risk_penalty", self.scorer_weights.detection_risk_penalty),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(PlannerError::ConfigurationInvalid(format!(
                    "scorer_weights.{name} must be a non-negative finite number, got {value}"
                )));
            }
        }

        if self.adaptive.prior_strength <= 0.0 {
            return Err(PlannerError::ConfigurationInvalid(format!(
                "adaptive.prior_strength must be positive, got {}",
                self.adaptive.prior_strength
            )));
        }
        if self.adaptive.max_cost <= 0.0 {
            return Err(PlannerError::ConfigurationInvalid(format!(
                "adaptive.max_cost must be positive, got {}",
                self.adaptive.max_cost
            )));
        }
        if !(0.0..=1.0).contains(&self.adaptive.blend_weight) {
            return Err(PlannerError::ConfigurationInvalid(format!(
                "adaptive.blend_weight must be in [0,1], got {}",
                self.adaptive.blend_weight
            )));
        }

        if !(0.0..=1.0).contains(&self.sensitivity.perturbation_percent) {
            return Err(PlannerError::ConfigurationInvalid(format!(
                "sensitivity.perturbation_percent must be in [0,1], got {}",
                self.sensitivity.perturbation_percent
            )));
        }
        if self.sensitivity.num_samples == 0 {
            return Err(PlannerError::ConfigurationInvalid(
                "sensitivity.num_samples must be positive".to_string(),
            ));
        }
        if self.sensitivity.top_k == 0 {
            return Err(PlannerError::ConfigurationInvalid(
                "sensitivity.top_k must be positive".to_string(),
            ));
        }

        if self.analysis.min_attempts == 0 {
            return Err(PlannerError::ConfigurationInvalid(
                "analysis.min_attempts must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// `ScorerThresholds` holds a `HashMap` without a blanket `Default` derive
/// friendly shape for serde's `#[serde(default)]`; this newtype supplies it
/// so a configuration document can omit the section entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScorerThresholdsOrDefault(pub ScorerThresholds);

impl Default for ScorerThresholdsOrDefault {
    fn default() -> Self {
        Self(ScorerThresholds::default())
    }
}

impl std::ops::Deref for ScorerThresholdsOrDefault {
    type Target = ScorerThresholds;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = PlannerConfig::default();
        assert_eq!(cfg.adaptive.prior_strength, 8.0);
        assert_eq!(cfg.correlation.spillover, 0.3);
        assert_eq!(cfg.sensitivity.perturbation_percent, 0.20);
        assert_eq!(cfg.sensitivity.num_samples, 50);
        assert_eq!(cfg.sensitivity.top_k, 10);
        assert_eq!(cfg.sensitivity.seed, 42);
        assert_eq!(cfg.analysis.min_attempts, 3);
        assert_eq!(cfg.scorer_thresholds.stealth_penalty(StealthLevel::Overt), 1.0);
        assert_eq!(cfg.scorer_thresholds.stealth_penalty(StealthLevel::Moderate), 0.5);
        assert_eq!(cfg.scorer_thresholds.stealth_penalty(StealthLevel::Covert), 0.1);
    }

    #[test]
    fn weight_perturbation_touches_only_named_weight() {
        let w = ScorerWeights::default();
        let perturbed = w.perturbed("cost_penalty", 2.0);
        assert_eq!(perturbed.cost_penalty, 2.0);
        assert_eq!(perturbed.compatibility, w.compatibility);
    }

    #[test]
    fn default_config_validates() {
        assert!(PlannerConfig::default().validate().is_ok());
    }

    #[test]
    fn negative_weight_is_configuration_invalid() {
        let mut cfg = PlannerConfig::default();
        cfg.scorer_weights.cost_penalty = -1.0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().starts_with("configuration invalid:"));
    }

    #[test]
    fn out_of_range_blend_weight_is_configuration_invalid() {
        let mut cfg = PlannerConfig::default();
        cfg.adaptive.blend_weight = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_max_cost_is_configuration_invalid() {
        let mut cfg = PlannerConfig::default();
        cfg.adaptive.max_cost = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn roundtrips_through_json() {
        let cfg = PlannerConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: PlannerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.adaptive.prior_strength, cfg.adaptive.prior_strength);
    }
}
