//! Closed error kinds for the planning core, matching the taxonomy in the
//! error handling design: invariant violations are fatal, missing catalog
//! entries are logged and skipped by callers, and replay divergences are
//! data, never exceptions.

use thiserror::Error;

/// Errors the planning core can return. Every variant formats into a
/// legible, operator-facing message; the typical caller is a red-team
/// operator reading a CLI failure, not a stack trace.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("campaign id `{0}` rejected: id must match `[A-Za-z0-9_-]+`")]
    InvalidCampaignId(String),

    #[error("no campaign `{0}` found")]
    CampaignNotFound(String),

    #[error("persistence failed for `{path}`: {reason}")]
    PersistenceFailure { path: String, reason: String },

    #[error("no snapshots for campaign `{0}`")]
    SnapshotMissing(String),

    #[error("configuration invalid: {0}")]
    ConfigurationInvalid(String),

    #[error("reward {value} out of range [0,1] from {origin}")]
    RewardOutOfRange { value: f64, origin: String },

    #[error("unknown phase `{0}`")]
    UnknownPhase(String),
}

/// Non-fatal: a result referenced a technique id absent from the catalog.
/// Never surfaced as a [`PlannerError`]; callers log and skip it, per the
/// propagation policy ("missing catalog entries...are logged and skipped").
#[derive(Debug, Clone)]
pub struct ResultForUnknownTechnique(pub String);

impl std::fmt::Display for ResultForUnknownTechnique {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "result referenced unknown technique `{}`, skipped", self.0)
    }
}

pub type PlannerResult<T> = Result<T, PlannerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_legible() {
        let e = PlannerError::InvalidCampaignId("foo/".into());
        assert_eq!(
            e.to_string(),
            "campaign id `foo/` rejected: id must match `[A-Za-z0-9_-]+`"
        );
    }
}
