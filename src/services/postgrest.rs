use crate::core::predicates::{FieldValue, Predicate};
use crate::models::{Collection, Listing};
use crate::services::store::{CollectionNames, ListingStore, QueryError};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when talking to the PostgREST endpoint
#[derive(Debug, Error)]
pub enum PostgrestError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Unauthorized: invalid API key")]
    Unauthorized,

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// Listing store backed by a Supabase / PostgREST REST endpoint
///
/// Predicates are encoded as PostgREST filter operators (`eq.`, `lte.`, `gte.`,
/// `in.()`, `ilike.`) and OR groups as a single `or=(...)` parameter. Counts use
/// a `HEAD` request with `Prefer: count=exact` and read the `Content-Range` total.
pub struct PostgrestListingStore {
    base_url: String,
    api_key: String,
    client: Client,
    collections: CollectionNames,
}

impl PostgrestListingStore {
    pub fn new(
        base_url: String,
        api_key: String,
        collections: CollectionNames,
        timeout: Duration,
    ) -> Result<Self, PostgrestError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url,
            api_key,
            client,
            collections,
        })
    }

    fn table_url(&self, collection: Collection) -> String {
        format!(
            "{}/rest/v1/{}",
            self.base_url.trim_end_matches('/'),
            self.collections.table(collection)
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, PostgrestError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(PostgrestError::Unauthorized);
        }

        let message = response
            .text()
            .await
            .ok()
            .filter(|body| !body.is_empty())
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());

        Err(PostgrestError::ApiError {
            status: status.as_u16(),
            message,
        })
    }

    async fn count_rows(
        &self,
        collection: Collection,
        predicates: &[Predicate],
    ) -> Result<u64, PostgrestError> {
        let url = format!("{}?{}", self.table_url(collection), query_string(predicates));
        tracing::debug!("Counting {} listings: {}", collection, url);

        let response = self
            .request(Method::HEAD, &url)
            .header("Prefer", "count=exact")
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let range = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| PostgrestError::InvalidResponse("Missing Content-Range header".into()))?;

        parse_content_range(range)
            .ok_or_else(|| PostgrestError::InvalidResponse(format!("Unparseable Content-Range: {}", range)))
    }

    async fn fetch_rows(
        &self,
        collection: Collection,
        predicates: &[Predicate],
        limit: usize,
    ) -> Result<Vec<Listing>, PostgrestError> {
        let order = format!("{}.desc.nullslast", collection.schema().discount_field);
        let mut params = vec!["select=*".to_string()];
        if !predicates.is_empty() {
            params.push(query_string(predicates));
        }
        params.push(format!("order={}", urlencoding::encode(&order)));
        params.push(format!("limit={}", limit));

        let url = format!("{}?{}", self.table_url(collection), params.join("&"));
        tracing::debug!("Fetching {} listings: {}", collection, url);

        let response = self.request(Method::GET, &url).send().await?;
        let response = Self::check_status(response).await?;

        let json: Value = response.json().await?;
        let documents = json
            .as_array()
            .ok_or_else(|| PostgrestError::InvalidResponse("Expected a JSON array of rows".into()))?;

        let listings: Vec<Listing> = documents
            .iter()
            .filter_map(|doc| Listing::from_document(collection, doc))
            .collect();

        if listings.len() < documents.len() {
            tracing::warn!(
                "Skipped {} {} rows without an id",
                documents.len() - listings.len(),
                collection
            );
        }

        Ok(listings)
    }
}

#[async_trait]
impl ListingStore for PostgrestListingStore {
    async fn count(&self, collection: Collection, predicates: &[Predicate]) -> Result<u64, QueryError> {
        Ok(self.count_rows(collection, predicates).await?)
    }

    async fn fetch(
        &self,
        collection: Collection,
        predicates: &[Predicate],
        limit: usize,
    ) -> Result<Vec<Listing>, QueryError> {
        Ok(self.fetch_rows(collection, predicates, limit).await?)
    }

    fn backend_name(&self) -> &'static str {
        "postgrest"
    }
}

/// URL-encoded PostgREST filter parameters for a predicate list
pub fn query_string(predicates: &[Predicate]) -> String {
    predicates
        .iter()
        .map(|p| {
            let (key, value) = encode_predicate(p);
            format!("{}={}", urlencoding::encode(&key), urlencoding::encode(&value))
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Top-level `(key, value)` filter parameter for a predicate
fn encode_predicate(predicate: &Predicate) -> (String, String) {
    match predicate {
        Predicate::Eq { field, value } => (field.to_string(), format!("eq.{}", value)),
        Predicate::Lte { field, value } => (field.to_string(), format!("lte.{}", value)),
        Predicate::Gte { field, value } => (field.to_string(), format!("gte.{}", value)),
        Predicate::In { field, values } => (field.to_string(), format!("in.({})", encode_list(values))),
        Predicate::Contains { field, needle } => (field.to_string(), format!("ilike.*{}*", needle)),
        Predicate::AnyOf(inner) => ("or".to_string(), format!("({})", encode_group(inner))),
    }
}

/// Member of an `or=(...)` group, e.g. `neighborhood.ilike.*dumbo*`
fn encode_member(predicate: &Predicate) -> String {
    match predicate {
        Predicate::Eq { field, value } => format!("{}.eq.{}", field, quote(&value.to_string())),
        Predicate::Lte { field, value } => format!("{}.lte.{}", field, value),
        Predicate::Gte { field, value } => format!("{}.gte.{}", field, value),
        Predicate::In { field, values } => format!("{}.in.({})", field, encode_list(values)),
        Predicate::Contains { field, needle } => {
            format!("{}.ilike.{}", field, quote(&format!("*{}*", needle)))
        }
        Predicate::AnyOf(inner) => format!("or({})", encode_group(inner)),
    }
}

fn encode_group(predicates: &[Predicate]) -> String {
    predicates.iter().map(encode_member).collect::<Vec<_>>().join(",")
}

fn encode_list(values: &[FieldValue]) -> String {
    values
        .iter()
        .map(|v| quote(&v.to_string()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Double-quote values containing PostgREST reserved characters
fn quote(value: &str) -> String {
    if value.chars().any(|c| matches!(c, ',' | '.' | ':' | '(' | ')' | '"' | '\\')) {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

/// Total from a `Content-Range` header such as `0-24/342` or `*/342`
fn parse_content_range(header: &str) -> Option<u64> {
    header.rsplit('/').next()?.trim().parse().ok()
}
