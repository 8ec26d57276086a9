//! Campaign manager: owns the campaign lifecycle, result ingestion, and
//! phase transitions, and is the only component that invokes the planner
//! against live, owned state.

use crate::benchmark::BenchmarkTable;
use crate::config::PlannerConfig;
use crate::correlation::FamilyCorrelation;
use crate::diversity::DiversityTracker;
use crate::error::{PlannerError, PlannerResult};
use crate::evaluation::{Attempt, EvaluationResult};
use crate::ids;
use crate::planner::{self, Plan};
use crate::posterior::PosteriorState;
use crate::reward::RewardPolicy;
use crate::snapshot::{DecisionSnapshot, FrozenPlannerConfig, Recorder};
use crate::target::TargetProfile;
use crate::technique::{Surface, TechniqueRegistry};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignPhase {
    Probe,
    Exploit,
}

impl std::str::FromStr for CampaignPhase {
    type Err = PlannerError;

    /// Matches the `#[serde(rename_all = "lowercase")]` wire form; any other
    /// string is an externally-supplied phase the planner doesn't know.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "probe" => Ok(CampaignPhase::Probe),
            "exploit" => Ok(CampaignPhase::Exploit),
            other => Err(PlannerError::UnknownPhase(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Planning,
    Active,
    Paused,
    Completed,
    Aborted,
}

/// Ordered attempts, ordered evaluations, tried-technique set in first-seen
/// order, and usage counters. Append-only within a campaign.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignState {
    pub attempts: Vec<Attempt>,
    pub evaluations: Vec<EvaluationResult>,
    pub techniques_tried: Vec<String>,
    pub queries_used: u32,
    pub last_updated: u64,
}

impl CampaignState {
    fn mark_tried(&mut self, technique_id: &str) {
        if !self.techniques_tried.iter().any(|id| id == technique_id) {
            self.techniques_tried.push(technique_id.to_string());
        }
    }

    pub fn tried_set(&self) -> HashSet<String> {
        self.techniques_tried.iter().cloned().collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignMetadata {
    pub seed: u64,
    pub adaptive: bool,
}

/// One summarized posterior, appended to `Campaign::posterior_history` on
/// every `recommend_next` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PosteriorSnapshot {
    pub step: u64,
    pub posteriors: PosteriorState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub target: TargetProfile,
    pub plan: Option<Plan>,
    pub state: CampaignState,
    pub phase: CampaignPhase,
    pub status: CampaignStatus,
    pub posteriors: PosteriorState,
    pub posterior_history: Vec<PosteriorSnapshot>,
    pub metadata: CampaignMetadata,
    step_count: u64,
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Owns the catalog, benchmark table, and persistence root shared by every
/// campaign it manages. Individual campaigns own their own mutable state;
/// this manager is the entry point the caller actually drives.
#[derive(Debug)]
pub struct CampaignManager<'a> {
    pub catalog: &'a TechniqueRegistry,
    pub benchmarks: &'a BenchmarkTable,
    pub config: &'a PlannerConfig,
    pub recorder: Recorder,
}

impl<'a> CampaignManager<'a> {
    pub fn new(
        catalog: &'a TechniqueRegistry,
        benchmarks: &'a BenchmarkTable,
        config: &'a PlannerConfig,
        snapshot_root: impl AsRef<std::path::Path>,
    ) -> PlannerResult<Self> {
        config.validate()?;
        Ok(Self {
            catalog,
            benchmarks,
            config,
            recorder: Recorder::new(snapshot_root.as_ref().to_path_buf()),
        })
    }

    /// Allocates a fresh campaign. `auto_plan` sets the initial status to
    /// `active` rather than `planning`.
    pub fn create(&self, target: TargetProfile, seed: u64, adaptive: bool, auto_plan: bool) -> Campaign {
        Campaign {
            id: ids::generate(),
            target,
            plan: None,
            state: CampaignState::default(),
            phase: CampaignPhase::Probe,
            status: if auto_plan {
                CampaignStatus::Active
            } else {
                CampaignStatus::Planning
            },
            posteriors: PosteriorState::new(self.config.adaptive.prior_strength),
            posterior_history: Vec::new(),
            metadata: CampaignMetadata { seed, adaptive },
            step_count: 0,
        }
    }

    /// Appends attempts/evaluations, updates `techniques_tried` and
    /// `queries_used`, fills in any missing `comparable_group_key`, and, if
    /// the campaign is adaptive, feeds conclusive results into the
    /// posteriors.
    pub fn ingest_results(
        &self,
        campaign: &mut Campaign,
        attempts: Vec<Attempt>,
        mut evaluations: Vec<EvaluationResult>,
    ) {
        for attempt in &attempts {
            campaign.state.mark_tried(&attempt.technique_id);
        }
        campaign.state.queries_used += attempts.len() as u32;

        for evaluation in &mut evaluations {
            evaluation.ensure_group_key();
        }

        if campaign.metadata.adaptive {
            let correlation = FamilyCorrelation::new(self.catalog, self.config.correlation);
            let by_attempt: std::collections::HashMap<String, String> = attempts
                .iter()
                .map(|a| (a.attempt_id.clone(), a.technique_id.clone()))
                .collect();
            let joined: Vec<(String, EvaluationResult)> = evaluations
                .iter()
                .filter_map(|e| by_attempt.get(&e.attempt_id).map(|id| (id.clone(), e.clone())))
                .collect();
            planner::update_posteriors(
                &mut campaign.posteriors,
                &joined,
                self.catalog,
                &correlation,
                RewardPolicy::Binary,
            );
        }

        campaign.state.attempts.extend(attempts);
        campaign.state.evaluations.extend(evaluations);
        campaign.state.last_updated = now_unix();
    }

    fn maybe_transition_phase(&self, campaign: &mut Campaign) {
        if campaign.phase == CampaignPhase::Exploit {
            return;
        }
        let distinct_surfaces: HashSet<Surface> = campaign
            .state
            .techniques_tried
            .iter()
            .filter_map(|id| self.catalog.get(id))
            .map(|t| t.surface)
            .collect();
        let total_surfaces = 6.0_f64; // model, data, retrieval, tool, action, guardrail
        let fraction = distinct_surfaces.len() as f64 / total_surfaces;

        if campaign.step_count >= 3 || fraction >= 0.6 {
            campaign.phase = CampaignPhase::Exploit;
        }
    }

    /// Increments the step counter, checks the probe-to-exploit transition,
    /// invokes the planner, records a snapshot, and appends a posterior
    /// history entry.
    pub fn recommend_next(
        &self,
        campaign: &mut Campaign,
        max_k: usize,
        exclude_tried: bool,
        repeat_penalty: crate::Utility,
    ) -> PlannerResult<Plan> {
        crate::ids::validate(&campaign.id)?;

        campaign.step_count += 1;
        self.maybe_transition_phase(campaign);

        let tried_with_surface: Vec<(String, Surface)> = campaign
            .state
            .techniques_tried
            .iter()
            .filter_map(|id| self.catalog.get(id).map(|t| (id.clone(), t.surface)))
            .collect();
        let diversity_tracker =
            DiversityTracker::from_tried(self.config.diversity, tried_with_surface.clone());
        let tried = campaign.state.tried_set();
        let correlation = FamilyCorrelation::new(self.catalog, self.config.correlation);

        let plan = planner::plan(
            &campaign.target,
            self.catalog,
            &campaign.posteriors,
            self.benchmarks,
            &self.config.scorer_weights,
            &self.config.scorer_thresholds,
            &self.config.adaptive,
            &correlation,
            &diversity_tracker,
            &tried,
            max_k,
            exclude_tried,
            repeat_penalty,
            campaign.metadata.seed,
            campaign.step_count,
            campaign.phase,
        );

        let snapshot = DecisionSnapshot {
            snapshot_id: format!("{}-{:04}", campaign.id, campaign.step_count),
            campaign_id: campaign.id.clone(),
            step: campaign.step_count,
            timestamp: now_unix(),
            step_seed: plan.seed,
            techniques_tried: tried_with_surface,
            evaluation_count: campaign.state.evaluations.len(),
            queries_used: campaign.state.queries_used,
            posteriors: campaign.posteriors.clone(),
            planner_config: FrozenPlannerConfig {
                campaign_seed: campaign.metadata.seed,
                phase: campaign.phase,
                scorer_weights: self.config.scorer_weights,
                scorer_thresholds: self.config.scorer_thresholds.0.clone(),
                adaptive: self.config.adaptive,
                max_k,
                exclude_tried,
                repeat_penalty,
            },
            produced_plan_entries: plan.entries.clone(),
        };
        self.recorder.record(&snapshot)?;

        campaign.posterior_history.push(PosteriorSnapshot {
            step: campaign.step_count,
            posteriors: campaign.posteriors.clone(),
        });
        campaign.plan = Some(plan.clone());

        Ok(plan)
    }
}
