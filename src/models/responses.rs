use crate::core::strategies::RelaxationStrategy;
use crate::models::domain::{Listing, SearchCriteria};
use serde::{Deserialize, Serialize};

/// Response for the resolve endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveResponse {
    #[serde(rename = "directCount")]
    pub direct_count: u64,
    #[serde(rename = "similarCount")]
    pub similar_count: u64,
    #[serde(rename = "adjustedCriteria", skip_serializing_if = "Option::is_none")]
    pub adjusted_criteria: Option<SearchCriteria>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<RelaxationStrategy>,
    /// Store queries that failed and were counted as zero
    #[serde(rename = "failedQueries")]
    pub failed_queries: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub listings: Vec<Listing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<u64>,
    #[serde(rename = "requestId")]
    pub request_id: String,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub backend: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

/// Similar neighborhoods for a neighborhood id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarNeighborhoodsResponse {
    pub neighborhood: String,
    pub similar: Vec<String>,
}
