//! A read-only, shared-by-reference view over the technique catalog.
//!
//! The catalog loader (parsing the on-disk technique library) lives outside
//! this crate; callers hand a `Vec<AttackTechnique>` to [`TechniqueRegistry::new`]
//! and the core never touches the filesystem for catalog data again.

use super::AttackTechnique;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct TechniqueRegistry {
    by_id: HashMap<String, AttackTechnique>,
    order: Vec<String>,
}

impl TechniqueRegistry {
    pub fn new(techniques: Vec<AttackTechnique>) -> Self {
        let mut by_id = HashMap::with_capacity(techniques.len());
        let mut order = Vec::with_capacity(techniques.len());
        for t in techniques {
            order.push(t.id.clone());
            by_id.insert(t.id.clone(), t);
        }
        Self { by_id, order }
    }

    pub fn get(&self, id: &str) -> Option<&AttackTechnique> {
        self.by_id.get(id)
    }

    /// All techniques, in catalog insertion order (used so scoring output is
    /// deterministic regardless of hash-map iteration order).
    pub fn get_all(&self) -> Vec<&AttackTechnique> {
        self.order
            .iter()
            .filter_map(|id| self.by_id.get(id))
            .collect()
    }

    pub fn filter<F>(&self, predicate: F) -> Vec<&AttackTechnique>
    where
        F: Fn(&AttackTechnique) -> bool,
    {
        self.get_all().into_iter().filter(|t| predicate(t)).collect()
    }

    /// `family key -> technique ids` grouping, used by family correlation
    /// and the diversity tracker's sibling bookkeeping.
    pub fn families(&self) -> HashMap<String, Vec<String>> {
        let mut families: HashMap<String, Vec<String>> = HashMap::new();
        for t in self.get_all() {
            families.entry(t.family_key()).or_default().push(t.id.clone());
        }
        families
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
