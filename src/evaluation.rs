//! The ingested-result shapes shared by reward policies, the campaign
//! manager, and the analyzers: one `Attempt` per technique try, one
//! `EvaluationResult` per judged outcome. These are thin data records; the
//! importers that translate `garak`/`promptfoo` output into them live
//! outside this crate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tri-state success: `true`/`false` are conclusive, `None` is ⊥
/// (inconclusive).
pub type Success = Option<bool>;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JudgeType {
    RuleBased,
    ModelGraded,
    Human,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ComparabilityMetadata {
    /// hashes/discriminators used to group results that may be compared
    /// against each other (e.g. same prompt template + same judge version).
    pub hashes: BTreeMap<String, String>,
}

impl ComparabilityMetadata {
    /// Deterministic group key derived from the hash map, used to fill in
    /// `EvaluationResult::comparable_group_key` when absent.
    pub fn derive_group_key(&self) -> String {
        let mut parts: Vec<String> = self
            .hashes
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        parts.sort();
        parts.join("|")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub attempt_id: String,
    pub technique_id: String,
    pub prompt: Option<String>,
    pub response: Option<String>,
    pub source_tool: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub attempt_id: String,
    pub success: Success,
    pub score: Option<f64>,
    pub judge_type: JudgeType,
    pub judge_details: String,
    pub confidence: f64,
    pub evidence_quality: f64,
    pub comparability: ComparabilityMetadata,
    pub comparable_group_key: Option<String>,
}

impl EvaluationResult {
    /// Fills in `comparable_group_key` from `comparability` if it is
    /// currently absent; a no-op otherwise. Used by campaign ingestion.
    pub fn ensure_group_key(&mut self) {
        if self.comparable_group_key.is_none() {
            self.comparable_group_key = Some(self.comparability.derive_group_key());
        }
    }

    pub fn is_inconclusive(&self) -> bool {
        self.success.is_none()
    }
}

/// Whether two evaluations' comparability hashes agree on every key they
/// share. Keys present on only one side are ignored: a judge-specific
/// discriminator one evaluation carries and another doesn't shouldn't by
/// itself block a comparison on the keys both sides do carry.
#[derive(Debug, Clone, PartialEq)]
pub enum ComparabilityVerdict {
    Comparable,
    NotComparable { mismatched_keys: Vec<String> },
}

impl ComparabilityVerdict {
    pub fn is_comparable(&self) -> bool {
        matches!(self, ComparabilityVerdict::Comparable)
    }
}

/// Checks whether evaluations were produced under conditions close enough
/// to compare head-to-head (same judge, same prompt template, ...), without
/// committing to a fixed set of named discriminators the way a narrower
/// design would.
pub struct ComparabilityChecker;

impl ComparabilityChecker {
    /// Pairwise check: comparable iff every hash key present in both `a` and
    /// `b` has the same value.
    pub fn check_pairwise(a: &EvaluationResult, b: &EvaluationResult) -> ComparabilityVerdict {
        let mut mismatched_keys = Vec::new();
        for (key, value) in &a.comparability.hashes {
            if let Some(other_value) = b.comparability.hashes.get(key) {
                if other_value != value {
                    mismatched_keys.push(key.clone());
                }
            }
        }
        mismatched_keys.sort();
        if mismatched_keys.is_empty() {
            ComparabilityVerdict::Comparable
        } else {
            ComparabilityVerdict::NotComparable { mismatched_keys }
        }
    }

    /// Whether every evaluation in `group` is pairwise comparable with every
    /// other one.
    pub fn check_group(group: &[&EvaluationResult]) -> bool {
        group
            .iter()
            .enumerate()
            .all(|(i, a)| group[i + 1..].iter().all(|b| Self::check_pairwise(a, b).is_comparable()))
    }

    /// Partitions `evaluations` into groups sharing identical values on the
    /// keys common across the whole input, so a judge-specific extra key on
    /// one evaluation doesn't make it vacuously its own singleton group.
    pub fn find_comparable_groups<'a>(
        evaluations: &[&'a EvaluationResult],
    ) -> Vec<Vec<&'a EvaluationResult>> {
        if evaluations.is_empty() {
            return Vec::new();
        }
        let mut common_keys: BTreeMap<String, ()> = evaluations[0]
            .comparability
            .hashes
            .keys()
            .map(|k| (k.clone(), ()))
            .collect();
        for e in &evaluations[1..] {
            common_keys.retain(|k, _| e.comparability.hashes.contains_key(k));
        }

        let mut groups: Vec<(Vec<(String, String)>, Vec<&'a EvaluationResult>)> = Vec::new();
        for e in evaluations {
            let signature: Vec<(String, String)> = common_keys
                .keys()
                .map(|k| (k.clone(), e.comparability.hashes[k].clone()))
                .collect();
            match groups.iter_mut().find(|(sig, _)| *sig == signature) {
                Some((_, members)) => members.push(e),
                None => groups.push((signature, vec![e])),
            }
        }
        groups.into_iter().map(|(_, members)| members).collect()
    }
}
