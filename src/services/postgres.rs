use crate::core::predicates::{FieldValue, Predicate};
use crate::models::{Collection, Listing};
use crate::services::store::{CollectionNames, ListingStore, QueryError};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when interacting with PostgreSQL
#[derive(Debug, Error)]
pub enum PostgresError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Listing store reading the listing tables directly over a Postgres pool
///
/// Predicates are rendered through `QueryBuilder` so every value is a bind
/// parameter; field and table names come from static schemas and config.
pub struct PostgresListingStore {
    pool: PgPool,
    collections: CollectionNames,
}

impl PostgresListingStore {
    /// Create a new store from a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
        collections: CollectionNames,
    ) -> Result<Self, PostgresError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        Ok(Self { pool, collections })
    }

    /// Create a new store from settings
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
        acquire_timeout_secs: Option<u64>,
        idle_timeout_secs: Option<u64>,
        collections: CollectionNames,
    ) -> Result<Self, PostgresError> {
        tracing::info!("Connecting to PostgreSQL listing store");

        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
            Duration::from_secs(acquire_timeout_secs.unwrap_or(5)),
            Duration::from_secs(idle_timeout_secs.unwrap_or(600)),
            collections,
        )
        .await
    }

    fn table(&self, collection: Collection) -> Result<String, PostgresError> {
        quote_ident(self.collections.table(collection))
    }
}

#[async_trait]
impl ListingStore for PostgresListingStore {
    async fn count(&self, collection: Collection, predicates: &[Predicate]) -> Result<u64, QueryError> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT COUNT(*) FROM {}",
            self.table(collection)?
        ));
        push_where(&mut builder, predicates)?;

        tracing::debug!("Counting {} listings: {}", collection, builder.sql());

        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(PostgresError::from)?;

        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn fetch(
        &self,
        collection: Collection,
        predicates: &[Predicate],
        limit: usize,
    ) -> Result<Vec<Listing>, QueryError> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT to_jsonb(t) FROM {} t",
            self.table(collection)?
        ));
        push_where(&mut builder, predicates)?;
        builder.push(format!(
            " ORDER BY {} DESC NULLS LAST LIMIT ",
            quote_ident(collection.schema().discount_field)?
        ));
        builder.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));

        tracing::debug!("Fetching {} listings: {}", collection, builder.sql());

        let documents = builder
            .build_query_scalar::<Value>()
            .fetch_all(&self.pool)
            .await
            .map_err(PostgresError::from)?;

        Ok(documents
            .iter()
            .filter_map(|doc| Listing::from_document(collection, doc))
            .collect())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }
}

/// Quote an SQL identifier, rejecting anything outside `[A-Za-z0-9_.]`
fn quote_ident(name: &str) -> Result<String, PostgresError> {
    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if !valid {
        return Err(PostgresError::InvalidInput(format!("invalid identifier: {}", name)));
    }

    Ok(name
        .split('.')
        .map(|part| format!("\"{}\"", part))
        .collect::<Vec<_>>()
        .join("."))
}

/// Append ` WHERE p1 AND p2 ...` for a non-empty predicate list
fn push_where(
    builder: &mut QueryBuilder<'_, Postgres>,
    predicates: &[Predicate],
) -> Result<(), PostgresError> {
    for (i, predicate) in predicates.iter().enumerate() {
        builder.push(if i == 0 { " WHERE " } else { " AND " });
        push_predicate(builder, predicate)?;
    }
    Ok(())
}

fn push_predicate(
    builder: &mut QueryBuilder<'_, Postgres>,
    predicate: &Predicate,
) -> Result<(), PostgresError> {
    match predicate {
        Predicate::Eq { field, value } => {
            builder.push(format!("{} = ", quote_ident(field)?));
            push_value(builder, value);
        }
        Predicate::Lte { field, value } => {
            builder.push(format!("{} <= ", quote_ident(field)?));
            builder.push_bind(*value);
        }
        Predicate::Gte { field, value } => {
            builder.push(format!("{} >= ", quote_ident(field)?));
            builder.push_bind(*value);
        }
        Predicate::In { field, values } => {
            if values.is_empty() {
                builder.push("FALSE");
                return Ok(());
            }
            builder.push(format!("{} IN (", quote_ident(field)?));
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    builder.push(", ");
                }
                push_value(builder, value);
            }
            builder.push(")");
        }
        Predicate::Contains { field, needle } => {
            builder.push(format!("{} ILIKE ", quote_ident(field)?));
            builder.push_bind(format!("%{}%", escape_like(needle)));
        }
        Predicate::AnyOf(inner) => {
            if inner.is_empty() {
                builder.push("FALSE");
                return Ok(());
            }
            builder.push("(");
            for (i, predicate) in inner.iter().enumerate() {
                if i > 0 {
                    builder.push(" OR ");
                }
                push_predicate(builder, predicate)?;
            }
            builder.push(")");
        }
    }
    Ok(())
}

fn push_value(builder: &mut QueryBuilder<'_, Postgres>, value: &FieldValue) {
    match value {
        FieldValue::Bool(b) => builder.push_bind(*b),
        FieldValue::Int(i) => builder.push_bind(*i),
        FieldValue::Number(n) => builder.push_bind(*n),
        FieldValue::Text(s) => builder.push_bind(s.clone()),
    };
}

/// Escape LIKE wildcards so needles match literally
fn escape_like(needle: &str) -> String {
    needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::predicates::build_predicates;
    use crate::models::{PropertyType, SearchCriteria};

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("rental_listings").unwrap(), "\"rental_listings\"");
        assert_eq!(quote_ident("public.sales").unwrap(), "\"public\".\"sales\"");
        assert!(quote_ident("sales; DROP TABLE x").is_err());
        assert!(quote_ident("").is_err());
    }

    #[test]
    fn test_where_clause_uses_binds() {
        let criteria = SearchCriteria::new(PropertyType::Rent)
            .with_max_budget(2500.0)
            .with_neighborhood("Brooklyn")
            .with_neighborhood("dumbo");
        let predicates = build_predicates(&criteria, Collection::Rentals);

        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM \"rental_listings\"");
        push_where(&mut builder, &predicates).unwrap();

        assert_eq!(
            builder.sql(),
            "SELECT COUNT(*) FROM \"rental_listings\" WHERE \"status\" = $1 AND \"monthly_rent\" <= $2 \
             AND (\"borough\" = $3 OR \"neighborhood\" ILIKE $4)"
        );
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("100%_off"), "100\\%\\_off");
    }
}
