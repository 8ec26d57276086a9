//! Cross-campaign warm-start cache: lets a fresh campaign against a
//! previously-seen kind of target start from a prior campaign's posteriors
//! instead of the flat configured prior. A small bounded cache keyed by a
//! cheap structural fingerprint, queried by nearest neighbor rather than
//! exact match alone.
//!
//! This is a same-process convenience: the cache lives only as long as its
//! owner keeps it around, and nothing here touches a file.

use crate::posterior::PosteriorState;
use crate::target::TargetProfile;
use crate::technique::Goal;
use std::collections::BTreeSet;

/// Cheap structural summary of a [`TargetProfile`] used for cache lookups,
/// so the cache never has to compare full profiles (constraints, names) that
/// don't affect which posteriors would transfer usefully.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TargetFingerprint {
    target_type: crate::target::TargetType,
    access_level: crate::technique::AccessLevel,
    goals: BTreeSet<Goal>,
}

impl TargetFingerprint {
    fn of(target: &TargetProfile) -> Self {
        Self {
            target_type: target.target_type,
            access_level: target.access_level,
            goals: target.goals.clone(),
        }
    }

    /// Weighted distance: 0.4 for a differing target type, 0.2 for a
    /// differing access level, 0.4 scaled by how dissimilar the goal sets
    /// are (1 - Jaccard similarity). Zero iff the fingerprints are
    /// identical.
    fn distance(&self, other: &Self) -> f64 {
        let type_term = if self.target_type == other.target_type { 0.0 } else { 0.4 };
        let access_term = if self.access_level == other.access_level { 0.0 } else { 0.2 };

        let intersection = self.goals.intersection(&other.goals).count();
        let union = self.goals.union(&other.goals).count();
        let jaccard = if union == 0 { 1.0 } else { intersection as f64 / union as f64 };
        let goal_term = 0.4 * (1.0 - jaccard);

        type_term + access_term + goal_term
    }
}

struct CacheEntry {
    fingerprint: TargetFingerprint,
    posteriors: PosteriorState,
}

/// Bounded cache of `(target fingerprint, posteriors)` pairs accumulated
/// across campaigns run in the same process. Oldest entry evicted first
/// once `capacity` is exceeded.
pub struct PosteriorCache {
    capacity: usize,
    entries: Vec<CacheEntry>,
}

/// How a warm start was chosen, attached to the result so callers can log
/// or report on it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WarmStartSource {
    /// The new target's fingerprint exactly matched a cached one.
    ExactMatch,
    /// The nearest cached fingerprint was within the acceptance threshold.
    NearestNeighbor { distance: f64 },
}

impl PosteriorCache {
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), entries: Vec::new() }
    }

    /// Inserts or replaces the cached entry for `target`'s fingerprint,
    /// evicting the oldest entry if the cache is at capacity.
    pub fn store(&mut self, target: &TargetProfile, posteriors: PosteriorState) {
        let fingerprint = TargetFingerprint::of(target);
        if let Some(existing) = self.entries.iter_mut().find(|e| e.fingerprint == fingerprint) {
            existing.posteriors = posteriors;
            return;
        }
        if self.entries.len() >= self.capacity {
            self.entries.remove(0);
        }
        self.entries.push(CacheEntry { fingerprint, posteriors });
    }

    /// Finds the best warm-start candidate for `target`: an exact
    /// fingerprint match if one exists, otherwise the nearest cached
    /// fingerprint within `threshold`. Returns `None` when the cache is
    /// empty or nothing is close enough, in which case the caller should
    /// start from the configured prior with no history, exactly as if this
    /// cache didn't exist.
    pub fn find_warm_start(
        &self,
        target: &TargetProfile,
        threshold: f64,
    ) -> Option<(&PosteriorState, WarmStartSource)> {
        let fingerprint = TargetFingerprint::of(target);

        if let Some(exact) = self.entries.iter().find(|e| e.fingerprint == fingerprint) {
            return Some((&exact.posteriors, WarmStartSource::ExactMatch));
        }

        let nearest = self
            .entries
            .iter()
            .map(|e| (e, fingerprint.distance(&e.fingerprint)))
            .min_by(|(_, a), (_, b)| a.total_cmp(b))?;

        let (entry, distance) = nearest;
        if distance <= threshold {
            Some((&entry.posteriors, WarmStartSource::NearestNeighbor { distance }))
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Default acceptance threshold for a nearest-neighbor warm start.
pub const DEFAULT_WARM_START_THRESHOLD: f64 = 0.5;
