//! The target profile: an immutable description of what is being attacked.

use crate::technique::{AccessLevel, Goal, StealthLevel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetType {
    Classifier,
    Chatbot,
    Rag,
    Agent,
    Moderation,
    Embedding,
    MultiAgent,
    McpClient,
}

/// Known defense mechanisms, as independent bits rather than one enum; a
/// target can run several simultaneously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DefenseFlag {
    Moderation,
    InputFilter,
    OutputFilter,
    InjectionDetection,
    SchemaValidation,
    RateLimit,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DefenseProfile {
    pub flags: BTreeSet<DefenseFlag>,
}

impl DefenseProfile {
    pub fn is_active(&self, flag: DefenseFlag) -> bool {
        self.flags.contains(&flag)
    }
}

/// `stealth_priority` is what the operator wants; `StealthLevel` (in the
/// technique model) is what a given technique exhibits. They share a
/// ranking (overt < moderate < covert) but are kept as distinct types
/// because only targets have a "priority" and only techniques have a
/// "profile".
pub type StealthPriority = StealthLevel;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OperationalConstraints {
    pub query_budget: u32,
    pub rate_limit_per_minute: u32,
    pub stealth_priority: StealthPriority,
}

impl Default for OperationalConstraints {
    fn default() -> Self {
        Self {
            query_budget: u32::MAX,
            rate_limit_per_minute: u32::MAX,
            stealth_priority: StealthPriority::Moderate,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TargetProfileError {
    #[error("target profile `{0}` has no goals: a meaningful plan requires at least one")]
    NoGoals(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetProfile {
    pub name: String,
    pub target_type: TargetType,
    pub access_level: AccessLevel,
    pub goals: BTreeSet<Goal>,
    pub defenses: DefenseProfile,
    pub constraints: OperationalConstraints,
}

impl TargetProfile {
    /// Constructs a profile, rejecting the invariant violation named in the
    /// data model: a target with no goals cannot produce a meaningful plan.
    pub fn new(
        name: impl Into<String>,
        target_type: TargetType,
        access_level: AccessLevel,
        goals: BTreeSet<Goal>,
        defenses: DefenseProfile,
        constraints: OperationalConstraints,
    ) -> Result<Self, TargetProfileError> {
        let name = name.into();
        if goals.is_empty() {
            return Err(TargetProfileError::NoGoals(name));
        }
        Ok(Self {
            name,
            target_type,
            access_level,
            goals,
            defenses,
            constraints,
        })
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TargetType::Classifier => "classifier",
            TargetType::Chatbot => "chatbot",
            TargetType::Rag => "rag",
            TargetType::Agent => "agent",
            TargetType::Moderation => "moderation",
            TargetType::Embedding => "embedding",
            TargetType::MultiAgent => "multi-agent",
            TargetType::McpClient => "mcp-client",
        };
        write!(f, "{s}")
    }
}
