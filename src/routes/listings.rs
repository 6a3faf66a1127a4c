use crate::core::FilterRelaxationMatcher;
use crate::models::{
    ErrorResponse, HealthResponse, ResolveRequest, ResolveResponse, SimilarNeighborhoodsResponse,
};
use actix_web::{web, HttpResponse, Responder};
use validator::Validate;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub matcher: FilterRelaxationMatcher,
}

impl AppState {
    pub fn new(matcher: FilterRelaxationMatcher) -> Self {
        Self { matcher }
    }
}

/// Configure all listing-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/listings/resolve", web::post().to(resolve))
        .route("/neighborhoods/{id}/similar", web::get().to(similar_neighborhoods));
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let store = state.matcher.store();
    let status = if store.health_check().await { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: store.backend_name().to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Resolve search criteria into listing counts
///
/// POST /api/v1/listings/resolve
///
/// Request body:
/// ```json
/// {
///   "propertyType": "rent",
///   "bedrooms": 2,
///   "maxBudget": 2500,
///   "neighborhoods": ["carroll-gardens"],
///   "mustHaves": ["no-broker-fee"],
///   "discountThreshold": 20,
///   "allowRelaxation": true,
///   "includeListings": 10,
///   "generation": 7
/// }
/// ```
///
/// Store failures never fail the request; they count as zero and are
/// reported in `failedQueries`.
async fn resolve(state: web::Data<AppState>, req: web::Json<ResolveRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for resolve request: field_errors={:?}", errors);
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        });
    }

    let request_id = uuid::Uuid::new_v4().to_string();
    let criteria = req.to_criteria();

    tracing::info!(
        "Resolving {:?} search (request {}, relaxation: {})",
        criteria.property_type,
        request_id,
        req.allow_relaxation
    );

    let report = state
        .matcher
        .resolve_with_report(&criteria, req.allow_relaxation)
        .await;

    let listings = match req.include_listings {
        Some(limit) if !report.result.is_empty() => {
            let target = report.result.adjusted_criteria.as_ref().unwrap_or(&criteria);
            state.matcher.listings(target, limit).await
        }
        _ => Vec::new(),
    };

    tracing::info!(
        "Request {} resolved: direct={}, similar={}, strategy={:?}, failed_queries={}",
        request_id,
        report.result.direct_count,
        report.result.similar_count,
        report.strategy,
        report.failed_queries
    );

    HttpResponse::Ok().json(ResolveResponse {
        direct_count: report.result.direct_count,
        similar_count: report.result.similar_count,
        adjusted_criteria: report.result.adjusted_criteria,
        strategy: report.strategy,
        failed_queries: report.failed_queries,
        listings,
        generation: req.generation,
        request_id,
    })
}

/// GET /api/v1/neighborhoods/{id}/similar
async fn similar_neighborhoods(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let id = path.into_inner();
    let similar = state.matcher.neighborhoods().similar(&id).to_vec();

    HttpResponse::Ok().json(SimilarNeighborhoodsResponse {
        neighborhood: id,
        similar,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Collection;
    use crate::routes::configure_routes;
    use crate::services::memory::InMemoryListingStore;
    use actix_web::{test, App};
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn state(store: InMemoryListingStore) -> web::Data<AppState> {
        web::Data::new(AppState::new(FilterRelaxationMatcher::with_builtin_neighborhoods(
            Arc::new(store),
        )))
    }

    #[actix_web::test]
    async fn test_health_reports_backend() {
        let app = test::init_service(
            App::new()
                .app_data(state(InMemoryListingStore::new()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["backend"], "memory");
    }

    #[actix_web::test]
    async fn test_resolve_relaxes_and_returns_listings() {
        let store = InMemoryListingStore::new().with_document(
            Collection::Rentals,
            json!({
                "id": "r1", "status": "active", "neighborhood": "Cobble Hill",
                "bedrooms": 2, "monthly_rent": 2300, "discount_percent": 22
            }),
        );
        let app = test::init_service(
            App::new()
                .app_data(state(store))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/listings/resolve")
            .set_json(json!({
                "propertyType": "rent",
                "bedrooms": 2,
                "neighborhoods": ["carroll-gardens"],
                "includeListings": 5,
                "generation": 3
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["directCount"], 0);
        assert_eq!(body["similarCount"], 1);
        assert_eq!(body["strategy"], "expand_neighborhoods");
        assert_eq!(body["generation"], 3);
        assert_eq!(body["listings"][0]["id"], "r1");
    }

    #[actix_web::test]
    async fn test_resolve_rejects_invalid_budget() {
        let app = test::init_service(
            App::new()
                .app_data(state(InMemoryListingStore::new()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/listings/resolve")
            .set_json(json!({"propertyType": "buy", "maxBudget": -10}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_similar_neighborhoods() {
        let app = test::init_service(
            App::new()
                .app_data(state(InMemoryListingStore::new()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/v1/neighborhoods/carroll-gardens/similar")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert!(body["similar"]
            .as_array()
            .unwrap()
            .iter()
            .any(|n| n == "cobble-hill"));

        let req = test::TestRequest::get()
            .uri("/api/v1/neighborhoods/atlantis/similar")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["similar"], json!([]));
    }
}
