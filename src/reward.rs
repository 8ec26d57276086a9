//! Reward policies: the closed sum type that maps an evaluation outcome to
//! a reward in [0,1] or ⊥ (inconclusive). Kept as a tagged enum rather than
//! a trait object, per the design notes' move "from dynamic-dispatch and
//! duck typing to tagged variants".

use crate::evaluation::EvaluationResult;
use crate::Probability;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RewardPolicy {
    /// `1.0` on success, `0.0` on failure, ⊥ on inconclusive.
    Binary,
    /// The evaluation's own `score`, clamped to [0,1], on success or
    /// failure; falls back to the binary reward when `score` is absent.
    /// ⊥ when the evaluation itself is inconclusive. See the open question
    /// in the design notes: this assumes cross-judge comparability the
    /// design does not guarantee.
    Weighted,
}

impl RewardPolicy {
    /// Returns `None` (⊥) for inconclusive evaluations, regardless of
    /// variant; the policy's job starts only once success is conclusive.
    pub fn reward(&self, evaluation: &EvaluationResult) -> Option<Probability> {
        let success = evaluation.success?;
        let binary = if success { 1.0 } else { 0.0 };
        match self {
            RewardPolicy::Binary => Some(binary),
            RewardPolicy::Weighted => Some(
                evaluation
                    .score
                    .map(|s| s.clamp(0.0, 1.0))
                    .unwrap_or(binary),
            ),
        }
    }
}
