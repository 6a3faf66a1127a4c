//! Nest Match - filter-relaxation matching for undervalued NYC listings
//!
//! Resolves a user's search criteria into listing counts. When nothing
//! matches, the criteria are relaxed one strategy at a time (drop must-haves,
//! expand neighborhoods, one bedroom fewer, escalate budget) until a relaxed
//! search is worth showing.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{FilterRelaxationMatcher, NeighborhoodSimilarityTable, RelaxationReport, RelaxationStrategy};
pub use models::{Collection, PropertyType, RelaxationResult, SearchCriteria};
pub use services::{InMemoryListingStore, ListingStore};
