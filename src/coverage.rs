//! Breadth-of-attempt coverage analysis: which surfaces, goals, phases, and
//! ATLAS references a campaign has *tried* at all, independent of whether
//! those attempts succeeded. Complements [`crate::analysis::WeakestLayerAnalyzer`],
//! which looks at success rate (depth); this module looks at breadth.

use crate::target::TargetProfile;
use crate::technique::{Phase, Surface, TechniqueRegistry};
use std::collections::HashSet;

const SURFACES: [Surface; 6] = [
    Surface::Model,
    Surface::Data,
    Surface::Retrieval,
    Surface::Tool,
    Surface::Action,
    Surface::Guardrail,
];

const PHASES: [Phase; 5] = [
    Phase::Recon,
    Phase::Probe,
    Phase::Exploit,
    Phase::Persistence,
    Phase::Evaluation,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GapSeverity {
    Minor,
    Moderate,
    Critical,
}

impl GapSeverity {
    fn from_fraction(covered: f64) -> Self {
        if covered < 0.2 {
            GapSeverity::Critical
        } else if covered < 0.5 {
            GapSeverity::Moderate
        } else {
            GapSeverity::Minor
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoverageGap {
    pub dimension: &'static str,
    pub severity: GapSeverity,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoverageReport {
    pub surface_coverage: f64,
    pub goal_coverage: f64,
    pub phase_coverage: f64,
    pub atlas_coverage: f64,
    pub gaps: Vec<CoverageGap>,
}

pub struct CoverageAnalyzer<'a> {
    catalog: &'a TechniqueRegistry,
    /// a dimension below this fraction becomes a reported gap.
    threshold: f64,
}

impl<'a> CoverageAnalyzer<'a> {
    pub fn new(catalog: &'a TechniqueRegistry, threshold: f64) -> Self {
        Self { catalog, threshold }
    }

    pub fn analyze(&self, target: &TargetProfile, tried: &HashSet<String>) -> CoverageReport {
        let tried_techniques: Vec<_> = tried
            .iter()
            .filter_map(|id| self.catalog.get(id))
            .collect();

        let surface_coverage = Self::fraction_covered(
            SURFACES.iter().map(|s| *s as u32),
            tried_techniques.iter().map(|t| t.surface as u32),
        );
        let goal_coverage = Self::fraction_covered(
            target.goals.iter().map(|g| *g as u32),
            tried_techniques.iter().flat_map(|t| t.goals.iter().map(|g| *g as u32)),
        );
        let phase_coverage = Self::fraction_covered(
            PHASES.iter().map(|p| *p as u32),
            tried_techniques.iter().map(|t| t.phase as u32),
        );

        let compatible = self.catalog.filter(|t| {
            t.supports_target_type(target.target_type) && target.access_level >= t.required_access
        });
        let all_atlas: HashSet<&str> = compatible
            .iter()
            .flat_map(|t| t.references.atlas.iter().map(String::as_str))
            .collect();
        let atlas_coverage = if all_atlas.is_empty() {
            1.0
        } else {
            let tried_atlas: HashSet<&str> = tried_techniques
                .iter()
                .flat_map(|t| t.references.atlas.iter().map(String::as_str))
                .collect();
            all_atlas.intersection(&tried_atlas).count() as f64 / all_atlas.len() as f64
        };

        let mut gaps = Vec::new();
        self.maybe_gap(&mut gaps, "surface", surface_coverage, || {
            let missing: Vec<&str> = SURFACES
                .iter()
                .filter(|s| !tried_techniques.iter().any(|t| t.surface == **s))
                .map(|s| surface_name(*s))
                .collect();
            format!("surfaces never attempted: {}", missing.join(", "))
        });
        self.maybe_gap(&mut gaps, "goal", goal_coverage, || {
            let missing: Vec<String> = target
                .goals
                .iter()
                .filter(|g| !tried_techniques.iter().any(|t| t.goals.contains(g)))
                .map(|g| format!("{g:?}"))
                .collect();
            format!("target goals never attempted: {}", missing.join(", "))
        });
        self.maybe_gap(&mut gaps, "phase", phase_coverage, || {
            let missing: Vec<&str> = PHASES
                .iter()
                .filter(|p| !tried_techniques.iter().any(|t| t.phase == **p))
                .map(|p| phase_name(*p))
                .collect();
            format!("kill-chain phases never attempted: {}", missing.join(", "))
        });
        if !all_atlas.is_empty() {
            self.maybe_gap(&mut gaps, "atlas", atlas_coverage, || {
                "compatible catalog's ATLAS references are only partially represented among tried techniques".to_string()
            });
        }

        CoverageReport {
            surface_coverage,
            goal_coverage,
            phase_coverage,
            atlas_coverage,
            gaps,
        }
    }

    fn maybe_gap(
        &self,
        gaps: &mut Vec<CoverageGap>,
        dimension: &'static str,
        covered: f64,
        note: impl FnOnce() -> String,
    ) {
        if covered < self.threshold {
            gaps.push(CoverageGap {
                dimension,
                severity: GapSeverity::from_fraction(covered),
                note: note(),
            });
        }
    }

    fn fraction_covered(universe: impl Iterator<Item = u32>, tried: impl Iterator<Item = u32>) -> f64 {
        let universe: HashSet<u32> = universe.collect();
        if universe.is_empty() {
            return 1.0;
        }
        let tried: HashSet<u32> = tried.collect();
        universe.intersection(&tried).count() as f64 / universe.len() as f64
    }
}

fn surface_name(s: Surface) -> &'static str {
    match s {
        Surface::Model => "model",
        Surface::Data => "data",
        Surface::Retrieval => "retrieval",
        Surface::Tool => "tool",
        Surface::Action => "action",
        Surface::Guardrail => "guardrail",
    }
}

fn phase_name(p: Phase) -> &'static str {
    match p {
        Phase::Recon => "recon",
        Phase::Probe => "probe",
        Phase::Exploit => "exploit",
        Phase::Persistence => "persistence",
        Phase::Evaluation => "evaluation",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{DefenseProfile, OperationalConstraints, TargetType};
    use crate::technique::{AccessLevel, AttackTechnique, Domain, Goal, References, StealthLevel};
    use std::collections::BTreeSet;

    fn technique(id: &str, surface: Surface, phase: Phase, goal: Goal, atlas: &[&str]) -> AttackTechnique {
        AttackTechnique {
            id: id.into(),
            name: id.into(),
            domain: Domain::Llm,
            phase,
            surface,
            required_access: AccessLevel::Black,
            goals: BTreeSet::from([goal]),
            target_types: BTreeSet::from([TargetType::Chatbot]),
            base_cost: 0.1,
            stealth: StealthLevel::Moderate,
            tags: vec![],
            references: References { atlas: atlas.iter().map(|s| s.to_string()).collect(), compliance: vec![] },
        }
    }

    fn target(goals: &[Goal]) -> TargetProfile {
        TargetProfile::new(
            "t",
            TargetType::Chatbot,
            AccessLevel::Black,
            goals.iter().copied().collect(),
            DefenseProfile::default(),
            OperationalConstraints::default(),
        )
        .unwrap()
    }

    #[test]
    fn untried_campaign_has_zero_coverage_on_every_dimension() {
        let catalog = TechniqueRegistry::new(vec![
            technique("t1", Surface::Model, Phase::Recon, Goal::Jailbreak, &["AML.T001"]),
        ]);
        let analyzer = CoverageAnalyzer::new(&catalog, 0.5);
        let report = analyzer.analyze(&target(&[Goal::Jailbreak]), &HashSet::new());
        assert_eq!(report.surface_coverage, 0.0);
        assert_eq!(report.goal_coverage, 0.0);
        assert_eq!(report.phase_coverage, 0.0);
        assert_eq!(report.atlas_coverage, 0.0);
        assert!(report.gaps.iter().any(|g| g.dimension == "surface" && g.severity == GapSeverity::Critical));
    }

    #[test]
    fn full_coverage_yields_no_gaps() {
        let catalog = TechniqueRegistry::new(vec![
            technique("t1", Surface::Model, Phase::Recon, Goal::Jailbreak, &[]),
        ]);
        let analyzer = CoverageAnalyzer::new(&catalog, 0.5);
        let mut tried = HashSet::new();
        tried.insert("t1".to_string());
        let report = analyzer.analyze(&target(&[Goal::Jailbreak]), &tried);
        assert_eq!(report.goal_coverage, 1.0);
        // atlas coverage defaults to 1.0 when the compatible catalog carries no references.
        assert_eq!(report.atlas_coverage, 1.0);
        assert!(!report.gaps.iter().any(|g| g.dimension == "goal"));
    }

    #[test]
    fn atlas_coverage_reflects_untried_references() {
        let catalog = TechniqueRegistry::new(vec![
            technique("t1", Surface::Model, Phase::Recon, Goal::Jailbreak, &["AML.T001"]),
            technique("t2", Surface::Data, Phase::Probe, Goal::Jailbreak, &["AML.T002"]),
        ]);
        let analyzer = CoverageAnalyzer::new(&catalog, 0.5);
        let mut tried = HashSet::new();
        tried.insert("t1".to_string());
        let report = analyzer.analyze(&target(&[Goal::Jailbreak]), &tried);
        assert_eq!(report.atlas_coverage, 0.5);
    }
}
