use crate::core::neighborhoods::NeighborhoodSimilarityTable;
use crate::models::{PropertyType, SearchCriteria, RENT_STABILIZED};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Relaxed count needed for the must-have, neighborhood and bedroom strategies
pub const RELAXED_MATCH_THRESHOLD: u64 = 1;

/// Relaxed count needed for a budget escalation step
pub const BUDGET_MATCH_THRESHOLD: u64 = 3;

/// First budget escalation factor, in percent of the original budget
pub const BUDGET_FACTOR_START_PCT: u32 = 120;

/// Increment between escalation factors, in percent
pub const BUDGET_FACTOR_STEP_PCT: u32 = 20;

/// Last escalation factor tried, in percent
pub const BUDGET_FACTOR_MAX_PCT: u32 = 200;

/// Criteria-loosening transformations, tried in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelaxationStrategy {
    DropMustHaves,
    ExpandNeighborhoods,
    ReduceBedrooms,
    EscalateBudget,
}

impl RelaxationStrategy {
    pub const ORDER: [RelaxationStrategy; 4] = [
        RelaxationStrategy::DropMustHaves,
        RelaxationStrategy::ExpandNeighborhoods,
        RelaxationStrategy::ReduceBedrooms,
        RelaxationStrategy::EscalateBudget,
    ];

    /// Minimum relaxed count for this strategy to be accepted
    pub fn success_threshold(self) -> u64 {
        match self {
            RelaxationStrategy::EscalateBudget => BUDGET_MATCH_THRESHOLD,
            _ => RELAXED_MATCH_THRESHOLD,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RelaxationStrategy::DropMustHaves => "drop_must_haves",
            RelaxationStrategy::ExpandNeighborhoods => "expand_neighborhoods",
            RelaxationStrategy::ReduceBedrooms => "reduce_bedrooms",
            RelaxationStrategy::EscalateBudget => "escalate_budget",
        }
    }
}

impl std::fmt::Display for RelaxationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strategy A: drop must-haves. Rent searches keep "rent-stabilized" since it
/// selects a different collection. `None` when nothing would change.
pub fn drop_must_haves(criteria: &SearchCriteria) -> Option<SearchCriteria> {
    let kept: BTreeSet<String> = criteria
        .must_haves
        .iter()
        .filter(|tag| criteria.property_type == PropertyType::Rent && tag.as_str() == RENT_STABILIZED)
        .cloned()
        .collect();

    if kept == criteria.must_haves {
        return None;
    }

    let mut relaxed = criteria.clone();
    relaxed.must_haves = kept;
    Some(relaxed)
}

/// Strategy B: union similar neighborhoods into the selection. `None` when no
/// selected neighborhood has a similar neighborhood that isn't already selected.
pub fn expand_neighborhoods(
    criteria: &SearchCriteria,
    table: &NeighborhoodSimilarityTable,
) -> Option<SearchCriteria> {
    let additions: Vec<String> = table
        .expand(&criteria.neighborhoods)
        .into_iter()
        .filter(|n| !criteria.neighborhoods.contains(n))
        .collect();

    if additions.is_empty() {
        return None;
    }

    let mut relaxed = criteria.clone();
    relaxed.neighborhoods.extend(additions);
    Some(relaxed)
}

/// Strategy C: one bedroom fewer. Only for searches above studio.
pub fn reduce_bedrooms(criteria: &SearchCriteria) -> Option<SearchCriteria> {
    match criteria.bedrooms {
        Some(bedrooms) if bedrooms > 0 => {
            let mut relaxed = criteria.clone();
            relaxed.bedrooms = Some(bedrooms - 1);
            Some(relaxed)
        }
        _ => None,
    }
}

/// Budget after applying an escalation factor given in percent
pub fn escalated_budget(budget: f64, factor_pct: u32) -> f64 {
    budget * factor_pct as f64 / 100.0
}

/// Strategy D: the escalated criteria for each factor, 1.2x through 2.0x of
/// the original budget. Empty without a budget.
pub fn budget_steps(criteria: &SearchCriteria) -> Vec<(u32, SearchCriteria)> {
    let Some(budget) = criteria.max_budget else {
        return Vec::new();
    };

    (BUDGET_FACTOR_START_PCT..=BUDGET_FACTOR_MAX_PCT)
        .step_by(BUDGET_FACTOR_STEP_PCT as usize)
        .map(|pct| {
            let mut relaxed = criteria.clone();
            relaxed.max_budget = Some(escalated_budget(budget, pct));
            (pct, relaxed)
        })
        .collect()
}
