//! Diversity tracker: keeps the set of tried family keys and a per-surface
//! attempt counter, and turns both into an additive bonus/penalty for a
//! candidate technique.

use crate::technique::{AttackTechnique, Surface};
use crate::Utility;
use std::collections::{HashMap, HashSet};

const NEW_SURFACE_BONUS: Utility = 0.3;
const UNDER_COVERAGE_BONUS: Utility = 0.15;
const REPEAT_FAMILY_PENALTY: Utility = -0.15;

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DiversityConfig {
    pub min_surface_coverage: u32,
}

impl Default for DiversityConfig {
    fn default() -> Self {
        Self {
            min_surface_coverage: 1,
        }
    }
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct DiversityTracker {
    config: DiversityConfig,
    tried_families: HashSet<String>,
    surface_attempts: HashMap<Surface, u32>,
}

impl DiversityTracker {
    pub fn new(config: DiversityConfig) -> Self {
        Self {
            config,
            tried_families: HashSet::new(),
            surface_attempts: HashMap::new(),
        }
    }

    /// Rebuilds tracker state from a set of already-tried technique ids,
    /// used by the replayer to reconstruct a tracker from a snapshot's
    /// `techniques_tried` without re-running the whole campaign history.
    pub fn from_tried(
        config: DiversityConfig,
        tried: impl IntoIterator<Item = (String, Surface)>,
    ) -> Self {
        let mut tracker = Self::new(config);
        for (family, surface) in tried {
            tracker.mark_tried(&family, surface);
        }
        tracker
    }

    pub fn mark_tried(&mut self, family_key: &str, surface: Surface) {
        self.tried_families.insert(family_key.to_string());
        *self.surface_attempts.entry(surface).or_insert(0) += 1;
    }

    pub fn surface_attempts(&self, surface: Surface) -> u32 {
        self.surface_attempts.get(&surface).copied().unwrap_or(0)
    }

    /// Additive bonus for `technique`: +0.3 for an untried surface, else
    /// +0.15 if under minimum coverage, and -0.15 if the family has already
    /// been tried. These combine.
    pub fn bonus(&self, technique: &AttackTechnique) -> Utility {
        let mut bonus = 0.0;
        let attempts = self.surface_attempts(technique.surface);
        if attempts == 0 {
            bonus += NEW_SURFACE_BONUS;
        } else if attempts < self.config.min_surface_coverage {
            bonus += UNDER_COVERAGE_BONUS;
        }
        if self.tried_families.contains(&technique.family_key()) {
            bonus += REPEAT_FAMILY_PENALTY;
        }
        bonus
    }
}
