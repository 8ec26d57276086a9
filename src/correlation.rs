//! Family correlation: siblings in the same technique family absorb a
//! fraction of each other's direct evidence, without ever being credited
//! with an observation of their own.

use crate::posterior::PosteriorState;
use crate::technique::TechniqueRegistry;
use crate::{Fraction, Probability, DEFAULT_SPILLOVER};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CorrelationConfig {
    pub enabled: bool,
    pub spillover: Fraction,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            spillover: DEFAULT_SPILLOVER,
        }
    }
}

/// Builds the `family -> technique ids` index once from the catalog, then
/// propagates observations across siblings on demand.
#[derive(Debug, Clone)]
pub struct FamilyCorrelation {
    config: CorrelationConfig,
    families: HashMap<String, Vec<String>>,
}

impl FamilyCorrelation {
    pub fn new(registry: &TechniqueRegistry, config: CorrelationConfig) -> Self {
        Self {
            config,
            families: registry.families(),
        }
    }

    pub fn family_of(&self, technique_id: &str) -> Option<&str> {
        self.families
            .iter()
            .find(|(_, ids)| ids.iter().any(|id| id == technique_id))
            .map(|(family, _)| family.as_str())
    }

    pub fn siblings(&self, technique_id: &str) -> Vec<&str> {
        match self.family_of(technique_id) {
            Some(family) => self.families[family]
                .iter()
                .map(String::as_str)
                .filter(|id| *id != technique_id)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Total `observations` recorded across `technique_id`'s siblings,
    /// surfaced in plan rationales as "sibling observation count".
    pub fn sibling_observations(&self, technique_id: &str, state: &PosteriorState) -> u64 {
        self.siblings(technique_id)
            .iter()
            .filter_map(|id| state.get(id))
            .map(|p| p.observations())
            .sum()
    }

    /// Spreads `reward` observed on `technique_id` onto every sibling in its
    /// family, each gaining `spillover * reward` of α and
    /// `spillover * (1-reward)` of β, with no change to their observation
    /// counts. A no-op when correlation is disabled.
    pub fn propagate(&self, technique_id: &str, reward: Probability, state: &mut PosteriorState) {
        if !self.config.enabled {
            return;
        }
        for sibling in self.siblings(technique_id) {
            let sibling = sibling.to_string();
            state.spill(&sibling, self.config.spillover, reward);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::TargetType;
    use crate::technique::{AccessLevel, AttackTechnique, Domain, Goal, Phase, References, StealthLevel, Surface};
    use std::collections::BTreeSet;

    fn t(id: &str) -> AttackTechnique {
        AttackTechnique {
            id: id.into(),
            name: id.into(),
            domain: Domain::Llm,
            phase: Phase::Probe,
            surface: Surface::Guardrail,
            required_access: AccessLevel::Black,
            goals: BTreeSet::from([Goal::Jailbreak]),
            target_types: BTreeSet::from([TargetType::Chatbot]),
            base_cost: 0.1,
            stealth: StealthLevel::Moderate,
            tags: vec!["shared".into()],
            references: References::default(),
        }
    }

    #[test]
    fn spillover_s6_scenario() {
        // S6: family of 3, spillover=0.3, update one member with reward=1.
        let registry = TechniqueRegistry::new(vec![t("a"), t("b"), t("c")]);
        let corr = FamilyCorrelation::new(&registry, CorrelationConfig::default());
        let mut state = PosteriorState::new(8.0);
        state.get_or_init("a", 0.5);
        state.get_or_init("b", 0.5);
        state.get_or_init("c", 0.5);

        let alpha_b_before = state.get("b").unwrap().alpha();
        let alpha_c_before = state.get("c").unwrap().alpha();

        state.update("a", 1.0).unwrap();
        corr.propagate("a", 1.0, &mut state);

        assert!((state.get("b").unwrap().alpha() - (alpha_b_before + 0.3)).abs() < 1e-9);
        assert!((state.get("c").unwrap().alpha() - (alpha_c_before + 0.3)).abs() < 1e-9);
        assert_eq!(state.get("b").unwrap().observations(), 0);
        assert_eq!(state.get("c").unwrap().observations(), 0);
    }

    #[test]
    fn propagate_never_touches_self() {
        let registry = TechniqueRegistry::new(vec![t("a"), t("b")]);
        let corr = FamilyCorrelation::new(&registry, CorrelationConfig::default());
        let mut state = PosteriorState::new(8.0);
        state.get_or_init("a", 0.5);
        let alpha_before = state.get("a").unwrap().alpha();
        corr.propagate("a", 1.0, &mut state);
        assert_eq!(state.get("a").unwrap().alpha(), alpha_before);
    }

    #[test]
    fn disabled_correlation_is_noop() {
        let registry = TechniqueRegistry::new(vec![t("a"), t("b")]);
        let corr = FamilyCorrelation::new(
            &registry,
            CorrelationConfig {
                enabled: false,
                spillover: 0.3,
            },
        );
        let mut state = PosteriorState::new(8.0);
        state.get_or_init("b", 0.5);
        let before = state.get("b").unwrap().alpha();
        corr.propagate("a", 1.0, &mut state);
        assert_eq!(state.get("b").unwrap().alpha(), before);
    }
}
