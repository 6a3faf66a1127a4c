use crate::core::neighborhoods::NeighborhoodSimilarityTable;
use crate::core::predicates::build_predicates;
use crate::core::session::RequestGenerations;
use crate::core::strategies::{
    budget_steps, drop_must_haves, expand_neighborhoods, reduce_bedrooms, RelaxationStrategy,
};
use crate::models::{Collection, Listing, RelaxationResult, SearchCriteria};
use crate::services::store::{ListingStore, QueryError};
use std::sync::Arc;

/// Result of a resolution together with how it was reached
#[derive(Debug, Clone, PartialEq)]
pub struct RelaxationReport {
    pub result: RelaxationResult,
    /// Strategy that produced `result.adjusted_criteria`
    pub strategy: Option<RelaxationStrategy>,
    pub queries_issued: usize,
    /// Queries that failed and were counted as zero
    pub failed_queries: usize,
}

impl RelaxationReport {
    /// Whether an empty result may be due to backend failures rather than no listings
    pub fn is_degraded(&self) -> bool {
        self.failed_queries > 0
    }
}

#[derive(Debug, Default)]
struct QueryTally {
    issued: usize,
    failed: usize,
}

/// Resolves search criteria against the listing store
///
/// # Resolution
/// 1. Direct count with the criteria as given
/// 2. On zero matches, each relaxation strategy in fixed order, every one
///    starting again from the original criteria:
///    drop must-haves, expand neighborhoods, one bedroom fewer, escalate budget
///
/// Query failures are logged and counted as zero; resolution never fails.
#[derive(Clone)]
pub struct FilterRelaxationMatcher {
    store: Arc<dyn ListingStore>,
    neighborhoods: Arc<NeighborhoodSimilarityTable>,
}

impl FilterRelaxationMatcher {
    pub fn new(store: Arc<dyn ListingStore>, neighborhoods: Arc<NeighborhoodSimilarityTable>) -> Self {
        Self {
            store,
            neighborhoods,
        }
    }

    pub fn with_builtin_neighborhoods(store: Arc<dyn ListingStore>) -> Self {
        Self::new(store, Arc::new(NeighborhoodSimilarityTable::builtin()))
    }

    pub fn neighborhoods(&self) -> &NeighborhoodSimilarityTable {
        &self.neighborhoods
    }

    pub fn store(&self) -> &dyn ListingStore {
        self.store.as_ref()
    }

    /// Resolve criteria into a direct count or, if allowed, a relaxed match
    pub async fn resolve(&self, criteria: &SearchCriteria, allow_relaxation: bool) -> RelaxationResult {
        self.resolve_with_report(criteria, allow_relaxation).await.result
    }

    /// Like [`resolve`](Self::resolve), but drops the result if `generation`
    /// was superseded while the resolution was in flight
    pub async fn resolve_latest(
        &self,
        generations: &RequestGenerations,
        generation: u64,
        criteria: &SearchCriteria,
        allow_relaxation: bool,
    ) -> Option<RelaxationResult> {
        let result = self.resolve(criteria, allow_relaxation).await;
        if generations.is_current(generation) {
            Some(result)
        } else {
            tracing::debug!(
                "Discarding stale resolution (generation {}, latest {})",
                generation,
                generations.latest()
            );
            None
        }
    }

    pub async fn resolve_with_report(
        &self,
        criteria: &SearchCriteria,
        allow_relaxation: bool,
    ) -> RelaxationReport {
        let mut tally = QueryTally::default();

        let direct_count = self.count_matches(criteria, &mut tally).await;
        if direct_count > 0 || !allow_relaxation {
            return Self::report(RelaxationResult::direct(direct_count), None, tally);
        }

        tracing::debug!("No direct matches, trying relaxation strategies");

        for strategy in RelaxationStrategy::ORDER {
            if let Some((count, relaxed)) = self.try_strategy(strategy, criteria, &mut tally).await {
                tracing::info!("Relaxation via {} found {} listings", strategy, count);
                return Self::report(RelaxationResult::relaxed(count, relaxed), Some(strategy), tally);
            }
        }

        tracing::info!("Relaxation exhausted without matches");
        Self::report(RelaxationResult::empty(), None, tally)
    }

    fn report(
        result: RelaxationResult,
        strategy: Option<RelaxationStrategy>,
        tally: QueryTally,
    ) -> RelaxationReport {
        RelaxationReport {
            result,
            strategy,
            queries_issued: tally.issued,
            failed_queries: tally.failed,
        }
    }

    /// Run one strategy from the original criteria; `Some` when it reached its threshold
    async fn try_strategy(
        &self,
        strategy: RelaxationStrategy,
        criteria: &SearchCriteria,
        tally: &mut QueryTally,
    ) -> Option<(u64, SearchCriteria)> {
        let threshold = strategy.success_threshold();

        let candidates: Vec<SearchCriteria> = match strategy {
            RelaxationStrategy::DropMustHaves => drop_must_haves(criteria).into_iter().collect(),
            RelaxationStrategy::ExpandNeighborhoods => {
                expand_neighborhoods(criteria, &self.neighborhoods).into_iter().collect()
            }
            RelaxationStrategy::ReduceBedrooms => reduce_bedrooms(criteria).into_iter().collect(),
            RelaxationStrategy::EscalateBudget => budget_steps(criteria)
                .into_iter()
                .map(|(_, relaxed)| relaxed)
                .collect(),
        };

        for relaxed in candidates {
            let count = self.count_matches(&relaxed, tally).await;
            tracing::debug!("{} candidate matched {} listings", strategy, count);
            if count >= threshold {
                return Some((count, relaxed));
            }
        }
        None
    }

    /// Total matches across the collections the criteria target.
    /// Failed collection queries count as zero.
    async fn count_matches(&self, criteria: &SearchCriteria, tally: &mut QueryTally) -> u64 {
        let collections = Collection::for_criteria(criteria);

        let outcomes = match collections {
            [first, second] => {
                let (a, b) = tokio::join!(
                    self.count_in(*first, criteria),
                    self.count_in(*second, criteria)
                );
                vec![(*first, a), (*second, b)]
            }
            _ => {
                let mut outcomes = Vec::with_capacity(collections.len());
                for &collection in collections {
                    outcomes.push((collection, self.count_in(collection, criteria).await));
                }
                outcomes
            }
        };

        let mut total = 0;
        for (collection, outcome) in outcomes {
            tally.issued += 1;
            match outcome {
                Ok(count) => total += count,
                Err(e) => {
                    tally.failed += 1;
                    tracing::warn!("Count query on {} failed, treating as zero: {}", collection, e);
                }
            }
        }
        total
    }

    async fn count_in(&self, collection: Collection, criteria: &SearchCriteria) -> Result<u64, QueryError> {
        let predicates = build_predicates(criteria, collection);
        self.store.count(collection, &predicates).await
    }

    /// Up to `limit` listings matching the criteria, deepest discount first
    /// within each collection. Failed fetches contribute no rows.
    pub async fn listings(&self, criteria: &SearchCriteria, limit: usize) -> Vec<Listing> {
        let mut listings = Vec::new();

        for &collection in Collection::for_criteria(criteria) {
            let remaining = limit.saturating_sub(listings.len());
            if remaining == 0 {
                break;
            }

            let predicates = build_predicates(criteria, collection);
            match self.store.fetch(collection, &predicates, remaining).await {
                Ok(rows) => listings.extend(rows),
                Err(e) => tracing::warn!("Listing fetch on {} failed: {}", collection, e),
            }
        }

        listings.truncate(limit);
        listings
    }
}

impl std::fmt::Debug for FilterRelaxationMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterRelaxationMatcher")
            .field("store", &self.store.backend_name())
            .field("neighborhoods", &self.neighborhoods.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PropertyType, NO_BROKER_FEE, RENT_STABILIZED};
    use crate::services::memory::InMemoryListingStore;
    use serde_json::{json, Value};

    fn rental(id: &str, neighborhood: &str, bedrooms: u8, rent: u32) -> Value {
        json!({
            "id": id,
            "status": "active",
            "neighborhood": neighborhood,
            "borough": "Brooklyn",
            "bedrooms": bedrooms,
            "monthly_rent": rent,
            "discount_percent": 25,
            "no_fee": false
        })
    }

    fn matcher(store: Arc<InMemoryListingStore>) -> FilterRelaxationMatcher {
        FilterRelaxationMatcher::with_builtin_neighborhoods(store)
    }

    #[tokio::test]
    async fn test_direct_match_skips_relaxation() {
        let store = Arc::new(InMemoryListingStore::new().with_document(
            Collection::Rentals,
            rental("r1", "Carroll Gardens", 2, 2400),
        ));
        let criteria = SearchCriteria::new(PropertyType::Rent)
            .with_bedrooms(2)
            .with_neighborhood("carroll-gardens");

        let report = matcher(store.clone()).resolve_with_report(&criteria, true).await;
        assert_eq!(report.result, RelaxationResult::direct(1));
        assert_eq!(report.strategy, None);
        // rentals + rent-stabilized
        assert_eq!(store.query_count(), 2);
    }

    #[tokio::test]
    async fn test_live_count_never_relaxes() {
        let store = Arc::new(InMemoryListingStore::new());
        let criteria = SearchCriteria::new(PropertyType::Rent)
            .with_bedrooms(2)
            .with_max_budget(2500.0)
            .with_must_have(NO_BROKER_FEE);

        let result = matcher(store.clone()).resolve(&criteria, false).await;
        assert_eq!(result, RelaxationResult::empty());
        assert_eq!(store.query_count(), 2);
    }

    #[tokio::test]
    async fn test_must_haves_win_over_neighborhoods() {
        // both strategy A and B would succeed on their own
        let store = Arc::new(
            InMemoryListingStore::new()
                .with_document(Collection::Rentals, rental("a", "Carroll Gardens", 2, 2400))
                .with_document(
                    Collection::Rentals,
                    json!({
                        "id": "b", "status": "active", "neighborhood": "Cobble Hill",
                        "bedrooms": 2, "monthly_rent": 2400, "no_fee": true
                    }),
                ),
        );
        let criteria = SearchCriteria::new(PropertyType::Rent)
            .with_bedrooms(2)
            .with_neighborhood("carroll-gardens")
            .with_must_have(NO_BROKER_FEE);

        let report = matcher(store).resolve_with_report(&criteria, true).await;
        assert_eq!(report.strategy, Some(RelaxationStrategy::DropMustHaves));
        let adjusted = report.result.adjusted_criteria.unwrap();
        assert!(adjusted.must_haves.is_empty());
        assert_eq!(adjusted.neighborhoods, criteria.neighborhoods);
    }

    #[tokio::test]
    async fn test_stabilized_only_queries_stabilized_collection() {
        let store = Arc::new(
            InMemoryListingStore::new()
                .with_document(Collection::Rentals, rental("r1", "Dumbo", 1, 2000))
                .with_document(
                    Collection::RentStabilized,
                    json!({"id": "rs1", "display_status": "active", "bedrooms": 1}),
                ),
        );
        let criteria = SearchCriteria::new(PropertyType::Rent)
            .with_bedrooms(1)
            .with_must_have(RENT_STABILIZED);

        let result = matcher(store.clone()).resolve(&criteria, true).await;
        assert_eq!(result, RelaxationResult::direct(1));
        assert!(store
            .queries()
            .iter()
            .all(|q| q.collection == Collection::RentStabilized));
    }

    #[tokio::test]
    async fn test_stabilized_only_relaxation_never_touches_rentals() {
        let stabilized = |id: &str| {
            json!({
                "id": id, "display_status": "active", "neighborhood": "Gowanus",
                "bedrooms": 2, "monthly_rent": 2300, "undervaluation_percent": 30
            })
        };
        // these would match every step if the rentals collection were counted
        let store = Arc::new(
            InMemoryListingStore::new()
                .with_documents(
                    Collection::Rentals,
                    (0..3).map(|i| {
                        let mut doc = rental(&format!("r{}", i), "Gowanus", 2, 1900);
                        doc["no_fee"] = json!(true);
                        doc
                    }),
                )
                .with_documents(
                    Collection::RentStabilized,
                    vec![stabilized("rs1"), stabilized("rs2"), stabilized("rs3")],
                ),
        );
        let criteria = SearchCriteria::new(PropertyType::Rent)
            .with_bedrooms(2)
            .with_max_budget(2000.0)
            .with_must_have(NO_BROKER_FEE)
            .with_must_have(RENT_STABILIZED);

        let report = matcher(store.clone()).resolve_with_report(&criteria, true).await;

        assert_eq!(report.strategy, Some(RelaxationStrategy::EscalateBudget));
        assert_eq!(report.result.similar_count, 3);
        let adjusted = report.result.adjusted_criteria.unwrap();
        assert!(adjusted.has_must_have(RENT_STABILIZED));
        assert_eq!(adjusted.max_budget, Some(2400.0));

        // direct, drop must-haves, one bedroom fewer, first budget step
        let queries = store.queries();
        assert_eq!(queries.len(), 4);
        assert!(queries
            .iter()
            .all(|q| q.collection == Collection::RentStabilized));
    }

    #[tokio::test]
    async fn test_failures_count_as_zero() {
        let store = Arc::new(InMemoryListingStore::new().with_document(
            Collection::RentStabilized,
            json!({"id": "rs1", "display_status": "active"}),
        ));
        store.fail_collection(Collection::Rentals);

        let report = matcher(store)
            .resolve_with_report(&SearchCriteria::new(PropertyType::Rent), true)
            .await;
        assert_eq!(report.result, RelaxationResult::direct(1));
        assert_eq!(report.failed_queries, 1);
        assert!(report.is_degraded());
    }

    #[tokio::test]
    async fn test_resolve_latest_drops_superseded() {
        let store = Arc::new(InMemoryListingStore::new());
        let matcher = matcher(store);
        let generations = RequestGenerations::new();
        let criteria = SearchCriteria::new(PropertyType::Buy);

        let stale = generations.next();
        let current = generations.next();

        assert!(matcher.resolve_latest(&generations, stale, &criteria, false).await.is_none());
        assert_eq!(
            matcher.resolve_latest(&generations, current, &criteria, false).await,
            Some(RelaxationResult::empty())
        );
    }

    #[tokio::test]
    async fn test_listings_respects_limit_across_collections() {
        let store = Arc::new(
            InMemoryListingStore::new()
                .with_documents(
                    Collection::Rentals,
                    (0..3).map(|i| rental(&format!("r{}", i), "Dumbo", 1, 2000)),
                )
                .with_document(
                    Collection::RentStabilized,
                    json!({"id": "rs1", "display_status": "active"}),
                ),
        );

        let listings = matcher(store.clone())
            .listings(&SearchCriteria::new(PropertyType::Rent), 2)
            .await;
        assert_eq!(listings.len(), 2);
        // limit reached before the stabilized collection
        assert_eq!(store.query_count(), 1);
    }
}
