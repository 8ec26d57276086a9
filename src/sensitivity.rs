//! Sensitivity analyzer: perturbs scorer weights one at a time and reports
//! how much the resulting ranking moves, via Kendall tau and top-k overlap.

use crate::benchmark::BenchmarkTable;
use crate::config::{ScorerThresholds, ScorerWeights, SensitivityConfig};
use crate::posterior::PosteriorState;
use crate::scorer::{is_compatible, RuleBasedScorer};
use crate::target::TargetProfile;
use crate::technique::TechniqueRegistry;
use crate::Utility;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};

/// A ranking is just the ids in descending-score order; only relative order
/// matters for tau and overlap.
fn rank(
    weights: &ScorerWeights,
    thresholds: &ScorerThresholds,
    catalog: &TechniqueRegistry,
    target: &TargetProfile,
    adaptive: &crate::config::AdaptiveConfig,
) -> Vec<String> {
    let scorer = RuleBasedScorer::new(weights, thresholds);
    let posteriors = PosteriorState::new(adaptive.prior_strength);
    let tried = HashSet::new();

    let mut scored: Vec<(String, Utility)> = catalog
        .filter(|t| is_compatible(t, target, adaptive))
        .into_iter()
        .map(|t| (t.id.clone(), scorer.score(t, target, &tried, &posteriors).normalized))
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().map(|(id, _)| id).collect()
}

/// Kendall tau over ids common to both rankings, O(n^2).
fn kendall_tau(baseline: &[String], perturbed: &[String]) -> f64 {
    let perturbed_pos: HashMap<&str, usize> =
        perturbed.iter().enumerate().map(|(i, id)| (id.as_str(), i)).collect();
    let common: Vec<&str> = baseline
        .iter()
        .map(String::as_str)
        .filter(|id| perturbed_pos.contains_key(id))
        .collect();
    let n = common.len();
    if n < 2 {
        return 1.0;
    }

    let baseline_pos: HashMap<&str, usize> = common.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    let mut concordant = 0i64;
    let mut discordant = 0i64;

    for i in 0..n {
        for j in (i + 1)..n {
            let a = common[i];
            let b = common[j];
            let baseline_order = baseline_pos[a].cmp(&baseline_pos[b]);
            let perturbed_order = perturbed_pos[a].cmp(&perturbed_pos[b]);
            if baseline_order == perturbed_order {
                concordant += 1;
            } else {
                discordant += 1;
            }
        }
    }

    let total = (n * (n - 1) / 2) as f64;
    (concordant - discordant) as f64 / total
}

fn top_k_jaccard(baseline: &[String], perturbed: &[String], k: usize) -> f64 {
    let a: HashSet<&str> = baseline.iter().take(k).map(String::as_str).collect();
    let b: HashSet<&str> = perturbed.iter().take(k).map(String::as_str).collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(&b).count();
    let union = a.union(&b).count();
    intersection as f64 / union as f64
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeightSensitivity {
    pub weight_name: String,
    pub average_tau: f64,
    pub average_top_k_stability: f64,
    pub displaced: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensitivityReport {
    pub per_weight: Vec<WeightSensitivity>,
    pub most_sensitive: String,
    pub least_sensitive: String,
}

pub struct SensitivityAnalyzer<'a> {
    catalog: &'a TechniqueRegistry,
    thresholds: &'a ScorerThresholds,
    config: SensitivityConfig,
}

impl<'a> SensitivityAnalyzer<'a> {
    pub fn new(catalog: &'a TechniqueRegistry, thresholds: &'a ScorerThresholds, config: SensitivityConfig) -> Self {
        Self {
            catalog,
            thresholds,
            config,
        }
    }

    pub fn analyze(
        &self,
        target: &TargetProfile,
        baseline_weights: &ScorerWeights,
        adaptive: &crate::config::AdaptiveConfig,
    ) -> SensitivityReport {
        let baseline = rank(baseline_weights, self.thresholds, self.catalog, target, adaptive);
        let mut rng = SmallRng::seed_from_u64(self.config.seed);

        let mut per_weight = Vec::new();
        for name in ScorerWeights::names() {
            let mut tau_sum = 0.0;
            let mut stability_sum = 0.0;
            let mut displaced: Vec<String> = Vec::new();

            for _ in 0..self.config.num_samples {
                let factor = rng.random_range(
                    (1.0 - self.config.perturbation_percent)..=(1.0 + self.config.perturbation_percent),
                );
                let perturbed_weights = baseline_weights.perturbed(name, factor);
                let perturbed = rank(&perturbed_weights, self.thresholds, self.catalog, target, adaptive);

                tau_sum += kendall_tau(&baseline, &perturbed);
                stability_sum += top_k_jaccard(&baseline, &perturbed, self.config.top_k);

                for id in perturbed.iter().take(self.config.top_k) {
                    if !baseline.iter().take(self.config.top_k).any(|b| b == id) && !displaced.contains(id) {
                        displaced.push(id.clone());
                    }
                }
            }

            displaced.truncate(5);
            let samples = self.config.num_samples.max(1) as f64;
            per_weight.push(WeightSensitivity {
                weight_name: name.to_string(),
                average_tau: tau_sum / samples,
                average_top_k_stability: stability_sum / samples,
                displaced,
            });
        }

        let most_sensitive = per_weight
            .iter()
            .min_by(|a, b| a.average_tau.partial_cmp(&b.average_tau).unwrap_or(std::cmp::Ordering::Equal))
            .map(|w| w.weight_name.clone())
            .unwrap_or_default();
        let least_sensitive = per_weight
            .iter()
            .max_by(|a, b| a.average_tau.partial_cmp(&b.average_tau).unwrap_or(std::cmp::Ordering::Equal))
            .map(|w| w.weight_name.clone())
            .unwrap_or_default();

        SensitivityReport {
            per_weight,
            most_sensitive,
            least_sensitive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdaptiveConfig;
    use crate::target::{DefenseProfile, OperationalConstraints, TargetType};
    use crate::technique::{AccessLevel, AttackTechnique, Domain, Goal, Phase, References, StealthLevel, Surface};
    use std::collections::BTreeSet;

    fn catalog(n: usize) -> TechniqueRegistry {
        let mut techniques = Vec::with_capacity(n);
        for i in 0..n {
            techniques.push(AttackTechnique {
                id: format!("t{i}"),
                name: format!("t{i}"),
                domain: Domain::Llm,
                phase: Phase::Probe,
                surface: Surface::Guardrail,
                required_access: AccessLevel::Black,
                goals: BTreeSet::from([Goal::Jailbreak]),
                target_types: BTreeSet::from([TargetType::Chatbot]),
                base_cost: 0.05 * (i as f64 + 1.0),
                stealth: StealthLevel::Moderate,
                tags: vec![format!("fam{}", i % 3)],
                references: References::default(),
            });
        }
        TechniqueRegistry::new(techniques)
    }

    fn target() -> TargetProfile {
        TargetProfile::new(
            "t",
            TargetType::Chatbot,
            AccessLevel::Black,
            BTreeSet::from([Goal::Jailbreak]),
            DefenseProfile::default(),
            OperationalConstraints::default(),
        )
        .unwrap()
    }

    #[test]
    fn identical_weights_give_perfect_tau() {
        assert_eq!(kendall_tau(&["a".into(), "b".into(), "c".into()], &["a".into(), "b".into(), "c".into()]), 1.0);
    }

    #[test]
    fn reversed_ranking_gives_negative_tau() {
        assert_eq!(kendall_tau(&["a".into(), "b".into()], &["b".into(), "a".into()]), -1.0);
    }

    #[test]
    fn report_covers_every_weight() {
        let catalog = catalog(20);
        let thresholds = ScorerThresholds::default();
        let config = SensitivityConfig {
            num_samples: 5,
            ..SensitivityConfig::default()
        };
        let analyzer = SensitivityAnalyzer::new(&catalog, &thresholds, config);
        let weights = ScorerWeights::default();
        let adaptive = AdaptiveConfig::default();
        let report = analyzer.analyze(&target(), &weights, &adaptive);
        assert_eq!(report.per_weight.len(), ScorerWeights::names().len());
        assert!(!report.most_sensitive.is_empty());
        assert!(!report.least_sensitive.is_empty());
    }
}
