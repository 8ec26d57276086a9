//! Beta(α,β) posteriors keyed by technique, the Bayesian half of the hybrid
//! planner: a small struct per key, mutated only through narrow,
//! invariant-checked methods, never written to directly.

use crate::error::PlannerError;
use crate::{Fraction, Probability};
use rand::Rng;
use rand_distr::{Beta, Distribution};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const Z_95: f64 = 1.96;

/// A Beta(α,β) posterior plus an observation count. `observations` tracks
/// only direct [`TechniquePosterior::update`] calls; spillover from sibling
/// techniques never increments it, preserving the distinction between
/// direct and inferred evidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TechniquePosterior {
    alpha: f64,
    beta: f64,
    observations: u64,
}

impl TechniquePosterior {
    /// `alpha = 1 + k*p`, `beta = 1 + k*(1-p)` where `k` is the prior
    /// strength and `p` is the blended prior success rate.
    pub fn from_prior(prior_strength: Fraction, prior: Probability) -> Self {
        let prior = prior.clamp(0.0, 1.0);
        Self {
            alpha: 1.0 + prior_strength * prior,
            beta: 1.0 + prior_strength * (1.0 - prior),
            observations: 0,
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn observations(&self) -> u64 {
        self.observations
    }

    pub fn mean(&self) -> Probability {
        self.alpha / (self.alpha + self.beta)
    }

    pub fn variance(&self) -> f64 {
        let sum = self.alpha + self.beta;
        (self.alpha * self.beta) / (sum * sum * (sum + 1.0))
    }

    /// 95% normal approximation to the Beta CI, clamped to [0,1].
    pub fn confidence_interval(&self) -> (Probability, Probability) {
        let mean = self.mean();
        let half_width = Z_95 * self.variance().sqrt();
        ((mean - half_width).max(0.0), (mean + half_width).min(1.0))
    }

    /// Direct evidence: `reward` must be in [0,1] or this is a bug in the
    /// reward policy and the operation must stop (fatal per the error
    /// handling design).
    pub fn update(&mut self, reward: Probability) -> Result<(), PlannerError> {
        if !(0.0..=1.0).contains(&reward) {
            return Err(PlannerError::RewardOutOfRange {
                value: reward,
                origin: "TechniquePosterior::update".to_string(),
            });
        }
        self.alpha += reward;
        self.beta += 1.0 - reward;
        self.observations += 1;
        Ok(())
    }

    /// Correlated spillover from a sibling's observation: fractional α/β
    /// credit without bumping `observations`.
    pub fn spill(&mut self, spillover: Fraction, reward: Probability) {
        self.alpha += spillover * reward;
        self.beta += spillover * (1.0 - reward);
    }

    pub fn sample(&self, rng: &mut impl Rng) -> Probability {
        Beta::new(self.alpha, self.beta)
            .expect("alpha, beta >= 1 by construction")
            .sample(rng)
    }
}

/// Map of technique id -> [`TechniquePosterior`], parameterized by the
/// shared prior strength `k` used whenever a new posterior is initialized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PosteriorState {
    prior_strength: Fraction,
    posteriors: HashMap<String, TechniquePosterior>,
}

impl PosteriorState {
    pub fn new(prior_strength: Fraction) -> Self {
        Self {
            prior_strength,
            posteriors: HashMap::new(),
        }
    }

    pub fn prior_strength(&self) -> Fraction {
        self.prior_strength
    }

    pub fn get(&self, technique_id: &str) -> Option<&TechniquePosterior> {
        self.posteriors.get(technique_id)
    }

    pub fn contains(&self, technique_id: &str) -> bool {
        self.posteriors.contains_key(technique_id)
    }

    /// Returns the existing posterior or initializes one from `prior`.
    pub fn get_or_init(&mut self, technique_id: &str, prior: Probability) -> &TechniquePosterior {
        self.posteriors
            .entry(technique_id.to_string())
            .or_insert_with(|| TechniquePosterior::from_prior(self.prior_strength, prior))
    }

    pub fn update(&mut self, technique_id: &str, reward: Probability) -> Result<(), PlannerError> {
        match self.posteriors.get_mut(technique_id) {
            Some(p) => p.update(reward),
            None => {
                let mut p = TechniquePosterior::from_prior(self.prior_strength, 0.5);
                let result = p.update(reward);
                self.posteriors.insert(technique_id.to_string(), p);
                result
            }
        }
    }

    /// Initializes the sibling from the neutral prior (0.5) if it has never
    /// been touched, then applies the fractional credit.
    pub fn spill(&mut self, technique_id: &str, spillover: Fraction, reward: Probability) {
        self.get_or_init(technique_id, 0.5);
        let p = self
            .posteriors
            .get_mut(technique_id)
            .expect("just initialized above");
        p.spill(spillover, reward);
    }

    pub fn len(&self) -> usize {
        self.posteriors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posteriors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TechniquePosterior)> {
        self.posteriors.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prior_initialization_matches_formula() {
        let p = TechniquePosterior::from_prior(8.0, 0.5);
        assert_eq!(p.alpha(), 1.0 + 8.0 * 0.5);
        assert_eq!(p.beta(), 1.0 + 8.0 * 0.5);
        assert_eq!(p.observations(), 0);
    }

    #[test]
    fn update_increments_observations_and_mean_rises_on_success() {
        let mut p = TechniquePosterior::from_prior(8.0, 0.5);
        let before = p.mean();
        p.update(1.0).unwrap();
        assert_eq!(p.observations(), 1);
        assert!(p.mean() > before);
    }

    #[test]
    fn update_rejects_out_of_range_reward() {
        let mut p = TechniquePosterior::from_prior(8.0, 0.5);
        assert!(p.update(1.5).is_err());
        assert!(p.update(-0.1).is_err());
    }

    #[test]
    fn spillover_never_bumps_observations_or_cross_contaminates() {
        let mut p = TechniquePosterior::from_prior(8.0, 0.5);
        let alpha_before = p.alpha();
        p.spill(0.3, 1.0);
        assert_eq!(p.observations(), 0);
        assert!((p.alpha() - (alpha_before + 0.3)).abs() < 1e-9);
    }

    #[test]
    fn spill_initializes_a_never_touched_sibling() {
        let mut state = PosteriorState::new(8.0);
        assert!(!state.contains("sibling"));
        state.spill("sibling", 0.3, 1.0);
        let p = state.get("sibling").unwrap();
        assert_eq!(p.observations(), 0);
        let baseline = TechniquePosterior::from_prior(8.0, 0.5);
        assert!((p.alpha() - (baseline.alpha() + 0.3)).abs() < 1e-9);
        assert!((p.beta() - baseline.beta()).abs() < 1e-9);
    }

    #[test]
    fn winner_beats_loser_s2_scenario() {
        // S2: five successes for A, five failures for B, default k=8, base prior 0.5.
        let mut state = PosteriorState::new(8.0);
        state.get_or_init("A", 0.5);
        state.get_or_init("B", 0.5);
        for _ in 0..5 {
            state.update("A", 1.0).unwrap();
            state.update("B", 0.0).unwrap();
        }
        let a = state.get("A").unwrap();
        let b = state.get("B").unwrap();
        assert!(a.mean() > b.mean());
        assert!(a.mean() > 0.5);
        assert!(b.mean() < 0.5);
        assert!(a.mean() >= 10.0 / 15.0 - 1e-9);
    }
}
