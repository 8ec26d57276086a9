//! Chain planner: assembles kill-chain-ordered multi-stage sequences per
//! target goal, adapting to which surfaces have shown themselves defended.

use crate::evaluation::EvaluationResult;
use crate::target::TargetProfile;
use crate::technique::{AttackTechnique, Goal, Phase, Surface, TechniqueRegistry};
use std::collections::HashSet;

const MAX_EXPLOIT_STAGES: usize = 2;
const MAX_FALLBACKS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct ChainStage {
    pub phase: Phase,
    pub technique_id: String,
    pub fallback_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttackChain {
    pub goal: Goal,
    pub stages: Vec<ChainStage>,
    pub total_cost: f64,
}

pub struct ChainPlanner<'a> {
    catalog: &'a TechniqueRegistry,
}

impl<'a> ChainPlanner<'a> {
    pub fn new(catalog: &'a TechniqueRegistry) -> Self {
        Self { catalog }
    }

    /// Surfaces with at least 2 attempts and zero successes, derived from
    /// prior results keyed by technique id.
    fn defended_surfaces(&self, results: &[(String, EvaluationResult)]) -> HashSet<Surface> {
        let mut attempts: std::collections::HashMap<Surface, (u32, u32)> = std::collections::HashMap::new();
        for (technique_id, evaluation) in results {
            let Some(technique) = self.catalog.get(technique_id) else {
                continue;
            };
            let entry = attempts.entry(technique.surface).or_insert((0, 0));
            entry.0 += 1;
            if evaluation.success == Some(true) {
                entry.1 += 1;
            }
        }
        attempts
            .into_iter()
            .filter(|(_, (n, successes))| *n >= 2 && *successes == 0)
            .map(|(surface, _)| surface)
            .collect()
    }

    fn candidates(&self, phase: Phase, goal: Goal, target: &TargetProfile, defended: &HashSet<Surface>) -> Vec<&AttackTechnique> {
        let mut matches: Vec<&AttackTechnique> = self
            .catalog
            .filter(|t| {
                t.phase == phase
                    && t.supports_goal(goal)
                    && t.supports_target_type(target.target_type)
                    && target.access_level >= t.required_access
                    && !defended.contains(&t.surface)
            })
            .into_iter()
            .collect();
        matches.sort_by(|a, b| a.base_cost.partial_cmp(&b.base_cost).unwrap_or(std::cmp::Ordering::Equal));
        matches
    }

    fn stage_for(&self, phase: Phase, goal: Goal, target: &TargetProfile, defended: &HashSet<Surface>) -> Option<ChainStage> {
        let candidates = self.candidates(phase, goal, target, defended);
        let primary = candidates.first()?;
        let fallback_ids = candidates
            .iter()
            .skip(1)
            .take(MAX_FALLBACKS)
            .map(|t| t.id.clone())
            .collect();
        Some(ChainStage {
            phase,
            technique_id: primary.id.clone(),
            fallback_ids,
        })
    }

    fn chain_for_goal(&self, goal: Goal, target: &TargetProfile, defended: &HashSet<Surface>) -> Option<AttackChain> {
        let mut stages = Vec::new();
        stages.push(self.stage_for(Phase::Recon, goal, target, defended)?);
        stages.push(self.stage_for(Phase::Probe, goal, target, defended)?);

        for _ in 0..MAX_EXPLOIT_STAGES {
            if let Some(stage) = self.stage_for(Phase::Exploit, goal, target, defended) {
                stages.push(stage);
            }
        }

        let total_cost: f64 = stages
            .iter()
            .filter_map(|s| self.catalog.get(&s.technique_id))
            .map(|t| t.base_cost)
            .sum();

        Some(AttackChain { goal, stages, total_cost })
    }

    /// One chain per target goal where a full recon+probe pair could be
    /// assembled, sorted ascending by total cost, capped at `max_chains`.
    pub fn plan_chains(
        &self,
        target: &TargetProfile,
        results: &[(String, EvaluationResult)],
        max_chains: usize,
    ) -> Vec<AttackChain> {
        let defended = self.defended_surfaces(results);
        let mut chains: Vec<AttackChain> = target
            .goals
            .iter()
            .filter_map(|goal| self.chain_for_goal(*goal, target, &defended))
            .collect();

        chains.sort_by(|a, b| a.total_cost.partial_cmp(&b.total_cost).unwrap_or(std::cmp::Ordering::Equal));
        chains.truncate(max_chains);
        chains
    }
}

/// True iff every stage's phase is non-decreasing through the chain.
pub fn respects_phase_order(chain: &AttackChain) -> bool {
    chain.stages.windows(2).all(|w| w[0].phase <= w[1].phase)
}
