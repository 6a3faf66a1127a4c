use crate::core::predicates::Predicate;
use crate::models::{Collection, Listing};
use crate::services::store::{ListingStore, QueryError};
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("Failed to read fixtures: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse fixtures: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A query observed by the in-memory store
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedQuery {
    pub collection: Collection,
    pub predicates: Vec<Predicate>,
}

/// Listing store holding JSON documents in memory
///
/// Evaluates predicates locally, records every query it receives, and can be
/// told to fail queries against particular collections. Used for local runs
/// from a fixtures file and throughout the tests.
#[derive(Default)]
pub struct InMemoryListingStore {
    documents: RwLock<HashMap<Collection, Vec<Value>>>,
    failing: RwLock<HashSet<Collection>>,
    queries: RwLock<Vec<RecordedQuery>>,
}

impl InMemoryListingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load fixtures of the form `{"sales": [...], "rentals": [...], "rent_stabilized": [...]}`
    pub fn from_fixtures_str(s: &str) -> Result<Self, FixtureError> {
        let documents: HashMap<Collection, Vec<Value>> = serde_json::from_str(s)?;
        Ok(Self {
            documents: RwLock::new(documents),
            ..Self::default()
        })
    }

    pub fn load_fixtures<P: AsRef<Path>>(path: P) -> Result<Self, FixtureError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_fixtures_str(&contents)
    }

    pub fn insert(&self, collection: Collection, doc: Value) {
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(collection)
            .or_default()
            .push(doc);
    }

    /// Builder-style insert
    pub fn with_document(self, collection: Collection, doc: Value) -> Self {
        self.insert(collection, doc);
        self
    }

    pub fn with_documents<I>(self, collection: Collection, docs: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        for doc in docs {
            self.insert(collection, doc);
        }
        self
    }

    /// Make every subsequent query against `collection` fail
    pub fn fail_collection(&self, collection: Collection) {
        self.failing
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(collection);
    }

    pub fn query_count(&self) -> usize {
        self.queries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn queries(&self) -> Vec<RecordedQuery> {
        self.queries.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn record(&self, collection: Collection, predicates: &[Predicate]) -> Result<(), QueryError> {
        self.queries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedQuery {
                collection,
                predicates: predicates.to_vec(),
            });

        let failing = self.failing.read().unwrap_or_else(PoisonError::into_inner);
        if failing.contains(&collection) {
            return Err(QueryError::Unavailable(format!("{} is failing", collection)));
        }
        Ok(())
    }

    fn matching(&self, collection: Collection, predicates: &[Predicate]) -> Vec<Value> {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| predicates.iter().all(|p| p.matches(doc)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl ListingStore for InMemoryListingStore {
    async fn count(&self, collection: Collection, predicates: &[Predicate]) -> Result<u64, QueryError> {
        self.record(collection, predicates)?;
        Ok(self.matching(collection, predicates).len() as u64)
    }

    async fn fetch(
        &self,
        collection: Collection,
        predicates: &[Predicate],
        limit: usize,
    ) -> Result<Vec<Listing>, QueryError> {
        self.record(collection, predicates)?;

        let mut listings: Vec<Listing> = self
            .matching(collection, predicates)
            .iter()
            .filter_map(|doc| Listing::from_document(collection, doc))
            .collect();

        // deepest discount first, missing discounts last
        listings.sort_by(|a, b| match (a.discount_percent, b.discount_percent) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        listings.truncate(limit);

        Ok(listings)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> InMemoryListingStore {
        InMemoryListingStore::new().with_documents(
            Collection::Sales,
            vec![
                json!({"id": "s1", "status": "active", "price": 700000, "discount_percent": 12}),
                json!({"id": "s2", "status": "active", "price": 650000, "discount_percent": 25}),
                json!({"id": "s3", "status": "sold", "price": 500000, "discount_percent": 40}),
                json!({"id": "s4", "status": "active", "price": 800000}),
            ],
        )
    }

    #[tokio::test]
    async fn test_count_applies_predicates() {
        let store = store();
        let active = [Predicate::eq("status", "active")];

        assert_eq!(store.count(Collection::Sales, &active).await.unwrap(), 3);
        assert_eq!(store.count(Collection::Rentals, &active).await.unwrap(), 0);
        assert_eq!(store.query_count(), 2);
    }

    #[tokio::test]
    async fn test_fetch_orders_by_discount() {
        let store = store();
        let listings = store
            .fetch(Collection::Sales, &[Predicate::eq("status", "active")], 10)
            .await
            .unwrap();

        let ids: Vec<&str> = listings.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["s2", "s1", "s4"]);
    }

    #[tokio::test]
    async fn test_failing_collection() {
        let store = store();
        store.fail_collection(Collection::Sales);

        let err = store.count(Collection::Sales, &[]).await.unwrap_err();
        assert!(matches!(err, QueryError::Unavailable(_)));
        // failed queries are still recorded
        assert_eq!(store.query_count(), 1);
    }

    #[test]
    fn test_fixtures() {
        let store = InMemoryListingStore::from_fixtures_str(
            r#"{"rent_stabilized": [{"id": "rs-1", "display_status": "active"}]}"#,
        )
        .unwrap();
        let count = tokio_test::block_on(
            store.count(Collection::RentStabilized, &[Predicate::eq("display_status", "active")]),
        )
        .unwrap();
        assert_eq!(count, 1);

        assert!(InMemoryListingStore::from_fixtures_str(r#"{"condos": []}"#).is_err());
    }
}
