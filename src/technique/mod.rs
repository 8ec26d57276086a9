//! The technique model: a typed, immutable description of one attack, and
//! the read-only registry that holds a catalog of them.
//!
//! The catalog loader itself (parsing a YAML/JSON technique library off
//! disk) is an external collaborator; this module only defines the shape
//! catalog entries take once loaded, and the narrow lookup surface
//! ([`TechniqueRegistry::get`], [`TechniqueRegistry::get_all`],
//! [`TechniqueRegistry::filter`]) the rest of the core is allowed to use.

mod enums;
mod registry;

pub use enums::{AccessLevel, Domain, Goal, Phase, StealthLevel, Surface};
pub use registry::TechniqueRegistry;

use crate::target::TargetType;
use std::collections::BTreeSet;

/// Compliance/provenance pointers carried alongside a technique; opaque to
/// the planning core, surfaced verbatim in reports.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct References {
    pub atlas: Vec<String>,
    pub compliance: Vec<String>,
}

/// One catalog entry. Immutable once constructed: the planner only ever
/// borrows techniques, never mutates them.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AttackTechnique {
    pub id: String,
    pub name: String,
    pub domain: Domain,
    pub phase: Phase,
    pub surface: Surface,
    pub required_access: AccessLevel,
    pub goals: BTreeSet<Goal>,
    pub target_types: BTreeSet<TargetType>,
    pub base_cost: f64,
    pub stealth: StealthLevel,
    pub tags: Vec<String>,
    pub references: References,
}

impl AttackTechnique {
    /// `domain:surface:primaryTag`, falling back to the surface alone when
    /// the technique carries no tags.
    pub fn family_key(&self) -> String {
        match self.tags.first() {
            Some(tag) => format!("{}:{}:{}", self.domain, self.surface, tag),
            None => format!("{}:{}:{}", self.domain, self.surface, self.surface),
        }
    }

    pub fn supports_goal(&self, goal: Goal) -> bool {
        self.goals.contains(&goal)
    }

    pub fn supports_target_type(&self, target_type: TargetType) -> bool {
        // an empty target_types set is a wildcard: compatible with everything.
        self.target_types.is_empty() || self.target_types.contains(&target_type)
    }
}
