// Core algorithm exports
pub mod matcher;
pub mod neighborhoods;
pub mod predicates;
pub mod session;
pub mod strategies;

pub use matcher::{FilterRelaxationMatcher, RelaxationReport};
pub use neighborhoods::{NeighborhoodSimilarityTable, NeighborhoodTableError};
pub use predicates::{build_predicates, location_predicate, spelling_variants, FieldValue, Predicate};
pub use session::{CountRequest, OnboardingStep, RequestGenerations, SearchSession, SessionEvent};
pub use strategies::RelaxationStrategy;
