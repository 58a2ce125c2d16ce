//! Winner resolution.
//!
//! Scores are first adjusted by the configured weighting rules, then sorted
//! descending. Ties go to the category declared first in the catalog.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::session::Scores;
use crate::catalog::Catalog;

/// Folds a bonus pseudo-category into its target category.
///
/// `scores[target] += scores[bonus] * multiplier`, then `scores[bonus] = 0`
/// so the bonus can never win by itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightingRule {
    pub bonus: String,
    pub multiplier: f64,
    pub target: String,
}

impl WeightingRule {
    pub fn new(bonus: impl Into<String>, multiplier: f64, target: impl Into<String>) -> Self {
        Self {
            bonus: bonus.into(),
            multiplier,
            target: target.into(),
        }
    }
}

/// Outcome of resolving a finished session.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub winner: String,
    /// Scores after the weighting rules were applied.
    pub scores: Scores,
}

#[derive(Debug, Clone, Default)]
pub struct ScoringResolver {
    rules: Vec<WeightingRule>,
}

impl ScoringResolver {
    /// Keep only rules whose categories both exist in the catalog.
    pub fn new(rules: Vec<WeightingRule>, catalog: &Catalog) -> Self {
        let rules = rules
            .into_iter()
            .filter(|rule| {
                let known = catalog.category(&rule.bonus).is_some()
                    && catalog.category(&rule.target).is_some();
                if !known {
                    warn!(
                        bonus = %rule.bonus,
                        target = %rule.target,
                        "weighting rule references unknown category, skipping"
                    );
                }
                known
            })
            .collect();
        Self { rules }
    }

    pub fn rules(&self) -> &[WeightingRule] {
        &self.rules
    }

    /// Apply the weighting rules in order.
    pub fn apply_weighting(&self, scores: &Scores) -> Scores {
        let mut weighted = scores.clone();
        for rule in &self.rules {
            let bonus = weighted.get(&rule.bonus).copied().unwrap_or(0.0);
            if let Some(target) = weighted.get_mut(&rule.target) {
                *target += bonus * rule.multiplier;
            }
            if let Some(b) = weighted.get_mut(&rule.bonus) {
                *b = 0.0;
            }
        }
        weighted
    }

    /// Weighted scores plus the single top category.
    pub fn resolve(&self, scores: &Scores, catalog: &Catalog) -> Resolution {
        let weighted = self.apply_weighting(scores);

        let mut ranked: Vec<(&str, f64)> = catalog
            .categories()
            .iter()
            .map(|c| (c.id.as_str(), weighted.get(&c.id).copied().unwrap_or(0.0)))
            .collect();
        // Stable sort: ties stay in catalog order.
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        let winner = ranked
            .first()
            .map(|(id, _)| id.to_string())
            .unwrap_or_default();

        Resolution {
            winner,
            scores: weighted,
        }
    }
}
