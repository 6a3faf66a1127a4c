use crate::core::predicates::Predicate;
use crate::models::{Collection, Listing};
use crate::services::postgres::PostgresError;
use crate::services::postgrest::PostgrestError;
use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by any listing store backend
#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Postgrest(#[from] PostgrestError),

    #[error(transparent)]
    Postgres(#[from] PostgresError),

    #[error("Listing store unavailable: {0}")]
    Unavailable(String),
}

/// Read-only query capability over the listing collections
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Count active listings in `collection` satisfying every predicate
    async fn count(&self, collection: Collection, predicates: &[Predicate]) -> Result<u64, QueryError>;

    /// Fetch up to `limit` listings, deepest discount first
    async fn fetch(
        &self,
        collection: Collection,
        predicates: &[Predicate],
        limit: usize,
    ) -> Result<Vec<Listing>, QueryError>;

    /// Short backend name used in logs and health output
    fn backend_name(&self) -> &'static str;

    async fn health_check(&self) -> bool {
        true
    }
}

/// Table names backing each logical collection
#[derive(Debug, Clone)]
pub struct CollectionNames {
    pub sales: String,
    pub rentals: String,
    pub rent_stabilized: String,
}

impl CollectionNames {
    pub fn table(&self, collection: Collection) -> &str {
        match collection {
            Collection::Sales => &self.sales,
            Collection::Rentals => &self.rentals,
            Collection::RentStabilized => &self.rent_stabilized,
        }
    }
}

impl Default for CollectionNames {
    fn default() -> Self {
        Self {
            sales: "sales_listings".to_string(),
            rentals: "rental_listings".to_string(),
            rent_stabilized: "rent_stabilized_listings".to_string(),
        }
    }
}
