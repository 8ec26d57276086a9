//! Snapshot recorder and replayer: every `recommend_next` call is frozen to
//! disk, and a snapshot alone (plus the catalog and target profile) is
//! enough to reproduce the exact same plan.

use crate::campaign::CampaignPhase;
use crate::config::{AdaptiveConfig, ScorerThresholds, ScorerWeights};
use crate::correlation::FamilyCorrelation;
use crate::diversity::{DiversityConfig, DiversityTracker};
use crate::error::{PlannerError, PlannerResult};
use crate::planner::{self, Plan, PlanEntry};
use crate::posterior::PosteriorState;
use crate::target::TargetProfile;
use crate::technique::{Surface, TechniqueRegistry};
use crate::Utility;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// The frozen inputs a planner call was given, enough to invoke it again
/// bit-for-bit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrozenPlannerConfig {
    pub campaign_seed: u64,
    pub phase: CampaignPhase,
    pub scorer_weights: ScorerWeights,
    pub scorer_thresholds: ScorerThresholds,
    pub adaptive: AdaptiveConfig,
    pub max_k: usize,
    pub exclude_tried: bool,
    pub repeat_penalty: Utility,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionSnapshot {
    pub snapshot_id: String,
    pub campaign_id: String,
    pub step: u64,
    pub timestamp: u64,
    pub step_seed: u32,
    pub techniques_tried: Vec<(String, Surface)>,
    pub evaluation_count: usize,
    pub queries_used: u32,
    pub posteriors: PosteriorState,
    pub planner_config: FrozenPlannerConfig,
    pub produced_plan_entries: Vec<PlanEntry>,
}

/// Writes one snapshot per `recommend_next` call, atomically (write to a
/// temporary sibling, then rename over the destination).
#[derive(Debug)]
pub struct Recorder {
    root: PathBuf,
}

impl Recorder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn snapshots_dir(&self, campaign_id: &str) -> PathBuf {
        self.root.join(campaign_id).join("snapshots")
    }

    fn snapshot_path(&self, campaign_id: &str, step: u64) -> PathBuf {
        self.snapshots_dir(campaign_id).join(format!("step_{step:04}.json"))
    }

    pub fn record(&self, snapshot: &DecisionSnapshot) -> PlannerResult<()> {
        let dir = self.snapshots_dir(&snapshot.campaign_id);
        fs::create_dir_all(&dir).map_err(|e| PlannerError::PersistenceFailure {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;

        let destination = self.snapshot_path(&snapshot.campaign_id, snapshot.step);
        let temp = destination.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(snapshot).map_err(|e| PlannerError::PersistenceFailure {
            path: destination.display().to_string(),
            reason: e.to_string(),
        })?;
        fs::write(&temp, body).map_err(|e| PlannerError::PersistenceFailure {
            path: temp.display().to_string(),
            reason: e.to_string(),
        })?;
        fs::rename(&temp, &destination).map_err(|e| PlannerError::PersistenceFailure {
            path: destination.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    /// Step numbers with a recorded snapshot, ascending.
    pub fn list(&self, campaign_id: &str) -> PlannerResult<Vec<u64>> {
        let dir = self.snapshots_dir(campaign_id);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut steps = Vec::new();
        let entries = fs::read_dir(&dir).map_err(|e| PlannerError::PersistenceFailure {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;
        for entry in entries {
            let entry = entry.map_err(|e| PlannerError::PersistenceFailure {
                path: dir.display().to_string(),
                reason: e.to_string(),
            })?;
            if let Some(step) = parse_step_filename(&entry.file_name().to_string_lossy()) {
                steps.push(step);
            }
        }
        steps.sort_unstable();
        Ok(steps)
    }

    pub fn load(&self, campaign_id: &str, step: u64) -> PlannerResult<DecisionSnapshot> {
        let path = self.snapshot_path(campaign_id, step);
        let body = fs::read(&path).map_err(|_| PlannerError::SnapshotMissing(campaign_id.to_string()))?;
        serde_json::from_slice(&body).map_err(|e| PlannerError::PersistenceFailure {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

fn parse_step_filename(name: &str) -> Option<u64> {
    let stripped = name.strip_prefix("step_")?.strip_suffix(".json")?;
    stripped.parse().ok()
}

/// Reproduces a plan from a snapshot alone, given the matching catalog and
/// target profile.
pub struct Replayer<'a> {
    catalog: &'a TechniqueRegistry,
    benchmarks: &'a crate::benchmark::BenchmarkTable,
}

impl<'a> Replayer<'a> {
    pub fn new(catalog: &'a TechniqueRegistry, benchmarks: &'a crate::benchmark::BenchmarkTable) -> Self {
        Self { catalog, benchmarks }
    }

    pub fn replay(&self, snapshot: &DecisionSnapshot, target: &TargetProfile) -> Plan {
        let tracker = DiversityTracker::from_tried(DiversityConfig::default(), snapshot.techniques_tried.clone());
        let tried: std::collections::HashSet<String> = snapshot
            .techniques_tried
            .iter()
            .map(|(id, _)| id.clone())
            .collect();
        let correlation = FamilyCorrelation::new(self.catalog, crate::correlation::CorrelationConfig::default());

        planner::plan(
            target,
            self.catalog,
            &snapshot.posteriors,
            self.benchmarks,
            &snapshot.planner_config.scorer_weights,
            &snapshot.planner_config.scorer_thresholds,
            &snapshot.planner_config.adaptive,
            &correlation,
            &tracker,
            &tried,
            snapshot.planner_config.max_k,
            snapshot.planner_config.exclude_tried,
            snapshot.planner_config.repeat_penalty,
            snapshot.planner_config.campaign_seed,
            snapshot.step,
            snapshot.planner_config.phase,
        )
    }
}

/// A human-readable divergence between a replayed plan and the snapshot's
/// recorded one; never an error, just data for the caller to surface.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayDivergence(pub String);

impl std::fmt::Display for ReplayDivergence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

const UTILITY_TOLERANCE: Utility = 1e-6;

/// Compares `produced` to the snapshot's `produced_plan_entries` by length,
/// ranked ids, and utility within tolerance.
pub fn verify(produced: &Plan, snapshot: &DecisionSnapshot) -> Vec<ReplayDivergence> {
    let mut diffs = Vec::new();
    let expected = &snapshot.produced_plan_entries;

    if produced.entries.len() != expected.len() {
        diffs.push(ReplayDivergence(format!(
            "length mismatch: produced {} vs recorded {}",
            produced.entries.len(),
            expected.len()
        )));
    }

    for (rank, (actual, recorded)) in produced.entries.iter().zip(expected.iter()).enumerate() {
        if actual.technique_id != recorded.technique_id {
            diffs.push(ReplayDivergence(format!(
                "replay diverged at rank #{}: id {} vs {}",
                rank + 1,
                actual.technique_id,
                recorded.technique_id
            )));
            continue;
        }
        if (actual.utility - recorded.utility).abs() > UTILITY_TOLERANCE {
            diffs.push(ReplayDivergence(format!(
                "replay diverged at rank #{}: utility {:.6} vs {:.6}",
                rank + 1,
                actual.utility,
                recorded.utility
            )));
        }
    }

    diffs
}
