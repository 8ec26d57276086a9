//! Adaptive attack-planning engine for adversarial evaluation of AI systems.
//!
//! The crate is a decision engine, not an attack executor: given a
//! [`target::TargetProfile`] and a catalog of [`technique::AttackTechnique`]s, it
//! ranks what to attempt next, ingests evaluation outcomes, and synthesizes a
//! defender-facing assessment of which layers of the target are weakest.

pub mod analysis;
pub mod benchmark;
pub mod campaign;
pub mod chain;
pub mod config;
pub mod correlation;
pub mod coverage;
pub mod diversity;
pub mod error;
pub mod evaluation;
pub mod ids;
pub mod meta_learning;
pub mod planner;
pub mod posterior;
pub mod reward;
pub mod scorer;
pub mod sensitivity;
pub mod snapshot;
pub mod target;
pub mod technique;

/// dimensional analysis types, following the same convention as the scoring
/// and sampling machinery this crate is modeled on: bare `f64`/`f32` would let
/// probabilities and utilities get mixed up at call sites.
pub type Probability = f64;
pub type Utility = f64;

/// Beta prior strength, success rate, and similar [0,1]-bounded quantities
/// share this alias so signatures read as "a fraction", not "a probability".
pub type Fraction = f64;

// adaptive planner defaults, see config::AdaptiveConfig for the overridable copies.
pub(crate) const DEFAULT_PRIOR_STRENGTH: Fraction = 8.0;
pub(crate) const DEFAULT_SPILLOVER: Fraction = 0.3;
pub(crate) const DEFAULT_BLEND_WEIGHT: Fraction = 0.5;
pub(crate) const DEFAULT_INFO_GAIN_WEIGHT: Fraction = 1.0;
pub(crate) const DEFAULT_DETECTION_WEIGHT: Fraction = 1.0;
pub(crate) const DEFAULT_COST_WEIGHT: Fraction = 1.0;
pub(crate) const DEFAULT_REPEAT_PENALTY: Utility = 0.2;

/// minimum evaluations before a surface's statistics are trusted, see
/// analysis::WeakestLayerAnalyzer.
pub(crate) const DEFAULT_MIN_ATTEMPTS: usize = 3;

/// Initializes terminal logging for callers that want the crate's `log`
/// output without building their own logger stack. Collaborators (the CLI
/// frontend, importers) are free to install their own logger instead; this
/// is a convenience, not a requirement.
#[cfg(feature = "logging")]
pub fn init_logging(level: log::LevelFilter) {
    let config = simplelog::ConfigBuilder::new()
        .set_location_level(log::LevelFilter::Off)
        .set_target_level(log::LevelFilter::Off)
        .set_thread_level(log::LevelFilter::Off)
        .build();
    let term = simplelog::TermLogger::new(
        level,
        config,
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
    let _ = simplelog::CombinedLogger::init(vec![term]);
}

#[cfg(test)]
mod tests {
    #[test]
    fn probability_is_f64() {
        let p: super::Probability = 0.5;
        assert_eq!(p, 0.5_f64);
    }
}
