//! The adaptive planner: hard filter, per-candidate scoring, Thompson
//! sampling, cost-aware utility, diversity-triple penalty, and ranking.
//! Every call is seeded deterministically from `(campaign_seed, step)` so
//! two planners given the same inputs produce bitwise identical plans.

use crate::config::{AdaptiveConfig, ScorerThresholds, ScorerWeights};
use crate::correlation::FamilyCorrelation;
use crate::diversity::DiversityTracker;
use crate::evaluation::EvaluationResult;
use crate::posterior::{PosteriorState, TechniquePosterior};
use crate::reward::RewardPolicy;
use crate::scorer::{diversity_triple, is_compatible, RuleBasedScorer};
use crate::target::TargetProfile;
use crate::technique::{Domain, Goal, Phase, Surface, TechniqueRegistry};
use crate::{Probability, Utility};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use rand_distr::{Beta, Distribution};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

/// `max(goal_severity ∩ target.goals) · surface_criticality[surface]`. Both
/// tables are fixed design constants (see DESIGN.md); no configuration
/// section names them because the scorer's seven weighted sub-scores
/// already cover the configurable part of "how much a technique matters".
fn goal_severity(goal: Goal) -> Utility {
    match goal {
        Goal::Jailbreak => 1.0,
        Goal::Extraction => 0.9,
        Goal::ToolMisuse => 0.9,
        Goal::Poisoning => 0.8,
        Goal::ExfilSim => 0.8,
        Goal::Evasion => 0.6,
        Goal::Dos => 0.5,
    }
}

fn surface_criticality(surface: Surface) -> Utility {
    match surface {
        Surface::Model => 1.0,
        Surface::Tool => 0.9,
        Surface::Action => 0.9,
        Surface::Retrieval => 0.7,
        Surface::Data => 0.7,
        Surface::Guardrail => 0.6,
    }
}

fn impact(goals: &std::collections::BTreeSet<Goal>, target_goals: &std::collections::BTreeSet<Goal>, surface: Surface) -> Utility {
    let severity = goals
        .intersection(target_goals)
        .map(|g| goal_severity(*g))
        .fold(0.0_f64, f64::max);
    severity * surface_criticality(surface)
}

/// First 32 bits of `SHA-256("campaign_seed:step")`, interpreted as a
/// big-endian u32. The only source of randomness a single `plan` call may
/// consult.
pub fn step_seed(campaign_seed: u64, step: u64) -> u32 {
    let mut hasher = Sha256::new();
    hasher.update(format!("{campaign_seed}:{step}").as_bytes());
    let digest = hasher.finalize();
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Structured rationale attached to each ranked entry.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Rationale {
    pub prior_source: String,
    pub observations: u64,
    pub posterior_mean: Probability,
    pub confidence_interval: (Probability, Probability),
    pub family: String,
    pub sibling_observations: u64,
    pub key_factors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PlanEntry {
    pub rank: usize,
    pub technique_id: String,
    pub technique_name: String,
    pub score: crate::scorer::ScoreBreakdown,
    pub thompson_sample: Probability,
    pub variance: f64,
    pub utility: Utility,
    pub rationale_text: String,
    pub rationale: Rationale,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Plan {
    pub step: u64,
    pub phase: crate::campaign::CampaignPhase,
    pub seed: u32,
    pub entries: Vec<PlanEntry>,
}

/// Multiplies `info_gain_weight`/`cost_weight` per the phase-dependent
/// schedule: probe leans exploratory (info-gain up, cost down), exploit
/// leans exploitative (info-gain down, cost up).
fn phase_weights(adaptive: &AdaptiveConfig, phase: crate::campaign::CampaignPhase) -> (Utility, Utility) {
    use crate::campaign::CampaignPhase;
    match phase {
        CampaignPhase::Probe => (adaptive.info_gain_weight * 1.5, adaptive.cost_weight * 0.7),
        CampaignPhase::Exploit => (adaptive.info_gain_weight * 0.3, adaptive.cost_weight * 1.2),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn plan(
    target: &TargetProfile,
    catalog: &TechniqueRegistry,
    posteriors: &PosteriorState,
    benchmarks: &crate::benchmark::BenchmarkTable,
    weights: &ScorerWeights,
    thresholds: &ScorerThresholds,
    adaptive: &AdaptiveConfig,
    correlation: &FamilyCorrelation,
    diversity_tracker: &DiversityTracker,
    tried: &HashSet<String>,
    max_k: usize,
    exclude_tried: bool,
    repeat_penalty: Utility,
    campaign_seed: u64,
    step: u64,
    phase: crate::campaign::CampaignPhase,
) -> Plan {
    let seed = step_seed(campaign_seed, step);
    let mut rng = SmallRng::seed_from_u64(seed as u64);
    let (info_gain_weight, cost_weight) = phase_weights(adaptive, phase);
    let scorer = RuleBasedScorer::new(weights, thresholds);

    let mut candidates: Vec<&crate::technique::AttackTechnique> = catalog
        .filter(|t| is_compatible(t, target, adaptive))
        .into_iter()
        .collect();

    if exclude_tried {
        candidates.retain(|t| !tried.contains(&t.id));
    }

    let mut entries: Vec<PlanEntry> = Vec::with_capacity(candidates.len());

    for technique in candidates {
        let breakdown = scorer.score(technique, target, tried, posteriors);
        let family = technique.family_key();

        let benchmark_asr = benchmarks.asr(&family);
        let prior = if adaptive.use_benchmark_priors {
            (adaptive.blend_weight * benchmark_asr + (1.0 - adaptive.blend_weight) * breakdown.normalized)
                .clamp(0.05, 0.95)
        } else {
            breakdown.normalized
        };

        let sibling_observations = correlation.sibling_observations(&technique.id, posteriors);
        // read-only: a candidate merely being scored and ranked must not
        // initialize its posterior, or a second `plan` call with no
        // intervening ingestion would see a different signal_gain for the
        // same untested technique purely from having been looked at before.
        let posterior = posteriors
            .get(&technique.id)
            .copied()
            .unwrap_or_else(|| TechniquePosterior::from_prior(posteriors.prior_strength(), prior));
        let thompson = Beta::new(posterior.alpha(), posterior.beta())
            .expect("alpha, beta >= 1 by construction")
            .sample(&mut rng);
        let variance = posterior.variance();
        let observations = posterior.observations();
        let mean = posterior.mean();
        let ci = posterior.confidence_interval();

        let impact_value = impact(&technique.goals, &target.goals, technique.surface);
        let cost = (technique.base_cost / adaptive.max_cost.max(f64::EPSILON)).min(1.0);
        let info_gain = (12.0 * variance).min(1.0) * info_gain_weight;
        let detection = thresholds.stealth_penalty(technique.stealth) * adaptive.detection_penalty_weight;
        let diversity_bonus = diversity_tracker.bonus(technique);
        let repeat = if tried.contains(&technique.id) { repeat_penalty } else { 0.0 };

        let utility = thompson * impact_value + info_gain + diversity_bonus
            - detection
            - cost_weight * cost
            - repeat;

        let rationale = Rationale {
            prior_source: if adaptive.use_benchmark_priors {
                "benchmark-blended".to_string()
            } else {
                "rule-based".to_string()
            },
            observations,
            posterior_mean: mean,
            confidence_interval: ci,
            family: family.clone(),
            sibling_observations,
            key_factors: vec![
                format!("thompson={thompson:.3}"),
                format!("impact={impact_value:.3}"),
                format!("info_gain={info_gain:.3}"),
            ],
        };

        let rationale_text = format!(
            "{}: thompson sample {:.3} over {} observations (mean {:.3}), impact {:.3}, diversity {:+.3}",
            technique.name, thompson, observations, mean, impact_value, diversity_bonus
        );

        entries.push(PlanEntry {
            rank: 0,
            technique_id: technique.id.clone(),
            technique_name: technique.name.clone(),
            score: breakdown,
            thompson_sample: thompson,
            variance,
            utility,
            rationale_text,
            rationale,
        });
    }

    entries.sort_by(|a, b| b.utility.partial_cmp(&a.utility).unwrap_or(std::cmp::Ordering::Equal));
    entries.truncate(max_k);

    apply_diversity_triple_penalty(catalog, &mut entries);

    for (rank, entry) in entries.iter_mut().enumerate() {
        entry.rank = rank + 1;
    }

    Plan {
        step,
        phase,
        seed,
        entries,
    }
}

/// Subtracts `0.15 * count` from every entry whose `(domain, phase, surface)`
/// triple repeats one seen at a higher rank, recording the penalty in
/// `score.diversity_bonus`. Does not re-sort: the ranking already reflects
/// the utilities computed before this pass.
fn apply_diversity_triple_penalty(catalog: &TechniqueRegistry, entries: &mut [PlanEntry]) {
    let mut seen: HashMap<(Domain, Phase, Surface), u32> = HashMap::new();
    for entry in entries.iter_mut() {
        let Some(technique) = catalog.get(&entry.technique_id) else {
            continue;
        };
        let triple = diversity_triple(technique);
        let count = seen.entry(triple).or_insert(0);
        if *count > 0 {
            let penalty = 0.15 * (*count as f64);
            entry.score.diversity_bonus -= penalty;
            entry.utility -= penalty;
        }
        *count += 1;
    }
}

/// For every result with conclusive success, updates the technique's
/// posterior and propagates spillover to its family. Results referencing an
/// unknown technique id are silently skipped (logged by the caller).
pub fn update_posteriors(
    state: &mut PosteriorState,
    evaluations: &[(String, EvaluationResult)],
    catalog: &TechniqueRegistry,
    correlation: &FamilyCorrelation,
    policy: RewardPolicy,
) {
    for (technique_id, evaluation) in evaluations {
        if catalog.get(technique_id).is_none() {
            log::warn!("ignoring evaluation for unknown technique `{technique_id}`");
            continue;
        }
        let Some(reward) = policy.reward(evaluation) else {
            continue;
        };
        if let Err(e) = state.update(technique_id, reward) {
            log::error!("posterior update failed for `{technique_id}`: {e}");
            continue;
        }
        correlation.propagate(technique_id, reward, state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::BenchmarkTable;
    use crate::campaign::CampaignPhase;
    use crate::config::{AdaptiveConfig, ScorerThresholds, ScorerWeights};
    use crate::diversity::DiversityConfig;
    use crate::target::{DefenseProfile, OperationalConstraints, TargetType};
    use crate::technique::{AccessLevel, AttackTechnique, References, StealthLevel};
    use std::collections::BTreeSet;

    fn catalog(n: usize) -> TechniqueRegistry {
        let mut techniques = Vec::with_capacity(n);
        for i in 0..n {
            techniques.push(AttackTechnique {
                id: format!("t{i}"),
                name: format!("Technique {i}"),
                domain: Domain::Llm,
                phase: Phase::Probe,
                surface: Surface::Guardrail,
                required_access: AccessLevel::Black,
                goals: BTreeSet::from([Goal::Jailbreak]),
                target_types: BTreeSet::from([TargetType::Chatbot]),
                base_cost: 0.1 + (i as f64) * 0.01,
                stealth: StealthLevel::Moderate,
                tags: vec![format!("fam{}", i % 5)],
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
    fn deterministic_plan_s1() {
        let catalog = catalog(70);
        let target = target();
        let weights = ScorerWeights::default();
        let thresholds = ScorerThresholds::default();
        let adaptive = AdaptiveConfig::default();
        let benchmarks = BenchmarkTable::default();

        let correlation = FamilyCorrelation::new(&catalog, crate::correlation::CorrelationConfig::default());
        let make_plan = || {
            let posteriors = PosteriorState::new(adaptive.prior_strength);
            let tracker = DiversityTracker::new(DiversityConfig::default());
            let tried = HashSet::new();
            plan(
                &target,
                &catalog,
                &posteriors,
                &benchmarks,
                &weights,
                &thresholds,
                &adaptive,
                &correlation,
                &tracker,
                &tried,
                10,
                false,
                0.2,
                42,
                0,
                CampaignPhase::Probe,
            )
        };

        let plan_a = make_plan();
        let plan_b = make_plan();

        assert_eq!(plan_a.entries[0].technique_id, plan_b.entries[0].technique_id);
        assert_eq!(plan_a.entries[0].utility, plan_b.entries[0].utility);
    }

    #[test]
    fn exclude_tried_never_emits_tried_ids() {
        let catalog = catalog(5);
        let target = target();
        let weights = ScorerWeights::default();
        let thresholds = ScorerThresholds::default();
        let adaptive = AdaptiveConfig::default();
        let benchmarks = BenchmarkTable::default();
        let posteriors = PosteriorState::new(adaptive.prior_strength);
        let correlation = FamilyCorrelation::new(&catalog, crate::correlation::CorrelationConfig::default());
        let tracker = DiversityTracker::new(DiversityConfig::default());
        let mut tried = HashSet::new();
        tried.insert("t0".to_string());
        tried.insert("t1".to_string());

        let result = plan(
            &target,
            &catalog,
            &posteriors,
            &benchmarks,
            &weights,
            &thresholds,
            &adaptive,
            &correlation,
            &tracker,
            &tried,
            10,
            true,
            0.2,
            7,
            1,
            CampaignPhase::Probe,
        );

        assert!(result.entries.iter().all(|e| !tried.contains(&e.technique_id)));
    }

    #[test]
    fn repeated_plan_calls_never_mutate_posteriors_s3_scenario() {
        let catalog = catalog(5);
        let target = target();
        let weights = ScorerWeights::default();
        let thresholds = ScorerThresholds::default();
        let adaptive = AdaptiveConfig::default();
        let benchmarks = BenchmarkTable::default();
        let posteriors = PosteriorState::new(adaptive.prior_strength);
        let correlation = FamilyCorrelation::new(&catalog, crate::correlation::CorrelationConfig::default());
        let tracker = DiversityTracker::new(DiversityConfig::default());
        let tried = HashSet::new();

        assert!(posteriors.is_empty());
        for step in 0..3 {
            plan(
                &target,
                &catalog,
                &posteriors,
                &benchmarks,
                &weights,
                &thresholds,
                &adaptive,
                &correlation,
                &tracker,
                &tried,
                10,
                false,
                0.2,
                99,
                step,
                CampaignPhase::Probe,
            );
        }
        // three calls with no intervening ingest_results: every candidate
        // must still look untouched, or signal_gain would drift between calls.
        assert!(posteriors.is_empty());
    }

    #[test]
    fn step_seed_is_pure_function_of_seed_and_step() {
        assert_eq!(step_seed(42, 0), step_seed(42, 0));
        assert_ne!(step_seed(42, 0), step_seed(42, 1));
    }
}
