//! The benchmark baseline table: a static map from family key to observed
//! attack-success-rate statistics, used both to blend prior initialization
//! and to compute Z-scores in the weakest-layer analysis.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineStats {
    pub mean_asr: f64,
    pub std_asr: f64,
    pub n_models: u32,
}

impl Default for BaselineStats {
    fn default() -> Self {
        Self {
            mean_asr: 0.40,
            std_asr: 0.20,
            n_models: 1,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BenchmarkTable {
    baselines: HashMap<String, BaselineStats>,
}

impl BenchmarkTable {
    pub fn new(baselines: HashMap<String, BaselineStats>) -> Self {
        Self { baselines }
    }

    /// Callable fallback `{mean=0.40, std=0.20, n=1}` when no baseline is
    /// recorded for `family_key`.
    pub fn lookup(&self, family_key: &str) -> BaselineStats {
        self.baselines
            .get(family_key)
            .copied()
            .unwrap_or_default()
    }

    pub fn asr(&self, family_key: &str) -> f64 {
        self.lookup(family_key).mean_asr
    }

    /// `z = (observed_asr - baseline_mean) / baseline_std`.
    pub fn z_score(&self, family_key: &str, observed_asr: f64) -> f64 {
        let baseline = self.lookup(family_key);
        if baseline.std_asr <= 0.0 {
            return 0.0;
        }
        (observed_asr - baseline.mean_asr) / baseline.std_asr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_used_when_missing() {
        let table = BenchmarkTable::default();
        let stats = table.lookup("unknown:family");
        assert_eq!(stats.mean_asr, 0.40);
        assert_eq!(stats.std_asr, 0.20);
        assert_eq!(stats.n_models, 1);
    }

    #[test]
    fn z_score_against_known_baseline() {
        let mut baselines = HashMap::new();
        baselines.insert(
            "llm:guardrail:injection".to_string(),
            BaselineStats {
                mean_asr: 0.3,
                std_asr: 0.1,
                n_models: 12,
            },
        );
        let table = BenchmarkTable::new(baselines);
        let z = table.z_score("llm:guardrail:injection", 0.5);
        assert!((z - 2.0).abs() < 1e-9);
    }
}
