criterion::criterion_main!(benches);
criterion::criterion_group! {
    name = benches;
    config = criterion::Criterion::default()
        .without_plots()
        .noise_threshold(3.0)
        .significance_level(0.01)
        .sample_size(20)
        .measurement_time(std::time::Duration::from_secs(2));
    targets =
        planning_a_fresh_campaign,
        planning_with_warm_posteriors,
        scoring_one_candidate,
        analyzing_weakest_layer,
        perturbing_sensitivity_weights,
}

fn catalog(n: usize) -> redplan::technique::TechniqueRegistry {
    use redplan::target::TargetType;
    use redplan::technique::{AccessLevel, AttackTechnique, Domain, Goal, Phase, References, StealthLevel, Surface};
    use std::collections::BTreeSet;

    let surfaces = [
        Surface::Model,
        Surface::Data,
        Surface::Retrieval,
        Surface::Tool,
        Surface::Action,
        Surface::Guardrail,
    ];
    let mut techniques = Vec::with_capacity(n);
    for i in 0..n {
        techniques.push(AttackTechnique {
            id: format!("t{i}"),
            name: format!("Technique {i}"),
            domain: Domain::Llm,
            phase: Phase::Probe,
            surface: surfaces[i % surfaces.len()],
            required_access: AccessLevel::Black,
            goals: BTreeSet::from([Goal::Jailbreak]),
            target_types: BTreeSet::from([TargetType::Chatbot]),
            base_cost: 0.05 + (i as f64 % 10.0) * 0.05,
            stealth: StealthLevel::Moderate,
            tags: vec![format!("fam{}", i % 7)],
            references: References::default(),
        });
    }
    redplan::technique::TechniqueRegistry::new(techniques)
}

fn target() -> redplan::target::TargetProfile {
    use redplan::target::{DefenseProfile, OperationalConstraints, TargetType};
    use redplan::technique::{AccessLevel, Goal};
    use std::collections::BTreeSet;

    redplan::target::TargetProfile::new(
        "bench-target",
        TargetType::Chatbot,
        AccessLevel::Black,
        BTreeSet::from([Goal::Jailbreak]),
        DefenseProfile::default(),
        OperationalConstraints::default(),
    )
    .expect("non-empty goal set")
}

fn planning_a_fresh_campaign(c: &mut criterion::Criterion) {
    use redplan::campaign::CampaignPhase;
    use redplan::config::PlannerConfig;
    use redplan::correlation::FamilyCorrelation;
    use redplan::diversity::DiversityTracker;
    use redplan::posterior::PosteriorState;
    use std::collections::HashSet;

    let catalog = catalog(200);
    let target = target();
    let config = PlannerConfig::default();
    let benchmarks = redplan::benchmark::BenchmarkTable::default();
    let correlation = FamilyCorrelation::new(&catalog, config.correlation);
    let tracker = DiversityTracker::new(config.diversity);

    c.bench_function("plan 200-technique catalog, cold posteriors", |b| {
        b.iter(|| {
            let posteriors = PosteriorState::new(config.adaptive.prior_strength);
            redplan::planner::plan(
                &target,
                &catalog,
                &posteriors,
                &benchmarks,
                &config.scorer_weights,
                &config.scorer_thresholds,
                &config.adaptive,
                &correlation,
                &tracker,
                &HashSet::new(),
                10,
                false,
                0.2,
                42,
                0,
                CampaignPhase::Probe,
            )
        })
    });
}

fn planning_with_warm_posteriors(c: &mut criterion::Criterion) {
    use redplan::campaign::CampaignPhase;
    use redplan::config::PlannerConfig;
    use redplan::correlation::FamilyCorrelation;
    use redplan::diversity::DiversityTracker;
    use redplan::posterior::PosteriorState;
    use std::collections::HashSet;

    let catalog = catalog(200);
    let target = target();
    let config = PlannerConfig::default();
    let benchmarks = redplan::benchmark::BenchmarkTable::default();
    let correlation = FamilyCorrelation::new(&catalog, config.correlation);
    let tracker = DiversityTracker::new(config.diversity);

    let mut posteriors = PosteriorState::new(config.adaptive.prior_strength);
    for t in catalog.get_all() {
        posteriors.update(&t.id, 0.5).unwrap();
    }

    c.bench_function("plan 200-technique catalog, warm posteriors", |b| {
        b.iter(|| {
            redplan::planner::plan(
                &target,
                &catalog,
                &posteriors,
                &benchmarks,
                &config.scorer_weights,
                &config.scorer_thresholds,
                &config.adaptive,
                &correlation,
                &tracker,
                &HashSet::new(),
                10,
                false,
                0.2,
                42,
                3,
                CampaignPhase::Exploit,
            )
        })
    });
}

fn scoring_one_candidate(c: &mut criterion::Criterion) {
    use redplan::config::{ScorerThresholds, ScorerWeights};
    use redplan::posterior::PosteriorState;
    use redplan::scorer::RuleBasedScorer;
    use std::collections::HashSet;

    let catalog = catalog(1);
    let target = target();
    let weights = ScorerWeights::default();
    let thresholds = ScorerThresholds::default();
    let scorer = RuleBasedScorer::new(&weights, &thresholds);
    let posteriors = PosteriorState::new(8.0);
    let tried = HashSet::new();
    let technique = catalog.get("t0").unwrap();

    c.bench_function("score a single candidate", |b| {
        b.iter(|| scorer.score(technique, &target, &tried, &posteriors))
    });
}

fn analyzing_weakest_layer(c: &mut criterion::Criterion) {
    use redplan::analysis::WeakestLayerAnalyzer;
    use redplan::evaluation::{ComparabilityMetadata, EvaluationResult, JudgeType};

    let catalog = catalog(50);
    let benchmarks = redplan::benchmark::BenchmarkTable::default();
    let analyzer = WeakestLayerAnalyzer::new(&catalog, &benchmarks, 3);

    let evaluations: Vec<(String, EvaluationResult)> = (0..500)
        .map(|i| {
            (
                format!("t{}", i % 50),
                EvaluationResult {
                    attempt_id: format!("a{i}"),
                    success: Some(i % 3 == 0),
                    score: None,
                    judge_type: JudgeType::RuleBased,
                    judge_details: String::new(),
                    confidence: 1.0,
                    evidence_quality: 0.8,
                    comparability: ComparabilityMetadata::default(),
                    comparable_group_key: None,
                },
            )
        })
        .collect();

    c.bench_function("analyze 500 evaluations across 50 techniques", |b| {
        b.iter(|| analyzer.analyze(&evaluations))
    });
}

fn perturbing_sensitivity_weights(c: &mut criterion::Criterion) {
    use redplan::config::{AdaptiveConfig, ScorerThresholds, ScorerWeights, SensitivityConfig};
    use redplan::sensitivity::SensitivityAnalyzer;

    let catalog = catalog(100);
    let target = target();
    let thresholds = ScorerThresholds::default();
    let weights = ScorerWeights::default();
    let adaptive = AdaptiveConfig::default();
    let config = SensitivityConfig {
        num_samples: 10,
        ..SensitivityConfig::default()
    };
    let analyzer = SensitivityAnalyzer::new(&catalog, &thresholds, config);

    c.bench_function("sensitivity sweep over 100 techniques", |b| {
        b.iter(|| analyzer.analyze(&target, &weights, &adaptive))
    });
}
