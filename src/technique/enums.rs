//! Closed enums for the technique model. Where a total order matters
//! (phase, access level) the variants are declared in that order and
//! derive `Ord`/`PartialOrd` directly off the discriminant.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Aml,
    Llm,
    Agent,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Domain::Aml => "aml",
            Domain::Llm => "llm",
            Domain::Agent => "agent",
        };
        write!(f, "{s}")
    }
}

/// Strict total order: recon < probe < exploit < persistence < evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Recon,
    Probe,
    Exploit,
    Persistence,
    Evaluation,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Recon => "recon",
            Phase::Probe => "probe",
            Phase::Exploit => "exploit",
            Phase::Persistence => "persistence",
            Phase::Evaluation => "evaluation",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Surface {
    Model,
    Data,
    Retrieval,
    Tool,
    Action,
    Guardrail,
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Surface::Model => "model",
            Surface::Data => "data",
            Surface::Retrieval => "retrieval",
            Surface::Tool => "tool",
            Surface::Action => "action",
            Surface::Guardrail => "guardrail",
        };
        write!(f, "{s}")
    }
}

/// Totally ordered: black-box < gray-box < white-box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Black,
    Gray,
    White,
}

impl AccessLevel {
    /// distance in access-level steps, used by the access-fit sub-score.
    pub fn steps_above(self, required: AccessLevel) -> i32 {
        self as i32 - required as i32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Goal {
    Evasion,
    Jailbreak,
    ExfilSim,
    Extraction,
    ToolMisuse,
    Poisoning,
    Dos,
}

/// Stealth priority / stealth profile share this enum: a target names a
/// priority, a technique names the stealth profile it exhibits, and the
/// detection-risk sub-score compares the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StealthLevel {
    Overt,
    Moderate,
    Covert,
}
