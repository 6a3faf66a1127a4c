// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    Collection, CollectionSchema, Listing, PropertyType, RelaxationResult, SearchCriteria,
    ACTIVE_STATUS, ADDRESS_FIELD, ANYWHERE, BEDROOMS_FIELD, BOROUGH_FIELD, ID_FIELD,
    NEIGHBORHOOD_FIELD, NO_BROKER_FEE, RENT_STABILIZED,
};
pub use requests::ResolveRequest;
pub use responses::{ErrorResponse, HealthResponse, ResolveResponse, SimilarNeighborhoodsResponse};
