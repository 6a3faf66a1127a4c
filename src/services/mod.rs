// Service exports
pub mod cache;
pub mod memory;
pub mod postgres;
pub mod postgrest;
pub mod store;

pub use cache::{CacheManager, CacheKey, CacheError, CachedListingStore};
pub use memory::{InMemoryListingStore, FixtureError, RecordedQuery};
pub use postgres::{PostgresListingStore, PostgresError};
pub use postgrest::{PostgrestListingStore, PostgrestError};
pub use store::{ListingStore, CollectionNames, QueryError};
