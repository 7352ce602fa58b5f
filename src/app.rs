//! HTTP API: routes, handlers and middleware.

use crate::app_state::SharedAppState;
use crate::error::InsightsError;
use crate::metrics;
use crate::models::{
    CategoryCount, CorrelationMatrix, Insights, InsightsQuery, NutrientAverage, RowsResponse,
    ViewMetadata, ViewResponse,
};
use crate::validated_query::ValidatedQuery;

use std::time::Instant;

use axum::{
    extract::State,
    http::{header, Method},
    routing::get,
    Json, Router,
};
use tower::Layer;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::TraceLayer;

/// The diet insights service, with trailing slashes trimmed from request paths.
pub type Service = NormalizePath<Router>;

/// Returns the CORS policy applied to the API.
fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Returns a [axum::Router] for the diet insights API
///
/// # Arguments
///
/// * `state`: Shared application state
pub fn router(state: SharedAppState) -> Router {
    fn api() -> Router<SharedAppState> {
        Router::new()
            .route("/getnutritionalinsights", get(nutritional_insights))
            .route("/getrecipes", get(recipes))
            .route("/getclusters", get(clusters))
            .route("/insights", get(insights))
            .route("/getinsights", get(rows).post(rows))
            .layer(
                ServiceBuilder::new()
                    .layer(
                        TraceLayer::new_for_http()
                            .on_request(metrics::request_counter)
                            .on_response(metrics::record_response_metrics),
                    )
                    .layer(cors()),
            )
    }

    Router::new()
        .route("/metrics", get(metrics::metrics_handler))
        .nest("/api", api())
        .with_state(state)
}

/// Returns a [crate::app::Service] for the diet insights API
///
/// The service is populated with all routes as well as the following middleware:
///
/// * a [tower_http::trace::TraceLayer] for tracing requests and responses and recording metrics
/// * a [tower_http::cors::CorsLayer] allowing cross-origin GET and POST requests
/// * a [tower_http::normalize_path::NormalizePathLayer] for trimming trailing slashes from
///   requests
///
/// # Arguments
///
/// * `state`: Shared application state
pub fn service(state: SharedAppState) -> Service {
    NormalizePathLayer::trim_trailing_slash().layer(router(state))
}

/// Nutrient averages for a diet type.
async fn nutritional_insights(
    State(state): State<SharedAppState>,
    ValidatedQuery(query): ValidatedQuery<InsightsQuery>,
) -> Result<Json<ViewResponse<Vec<NutrientAverage>>>, InsightsError> {
    let started = Instant::now();
    let category = query.category();
    let data = state
        .pipeline
        .nutrient_averages(category, query.limit)
        .await?;
    Ok(Json(ViewResponse {
        data,
        metadata: ViewMetadata::new(category, started),
    }))
}

/// Recipe counts per diet type.
async fn recipes(
    State(state): State<SharedAppState>,
    ValidatedQuery(query): ValidatedQuery<InsightsQuery>,
) -> Result<Json<ViewResponse<Vec<CategoryCount>>>, InsightsError> {
    let started = Instant::now();
    let category = query.category();
    let data = state
        .pipeline
        .diet_distribution(category, query.limit)
        .await?;
    Ok(Json(ViewResponse {
        data,
        metadata: ViewMetadata::new(category, started),
    }))
}

/// Nutrient correlation matrix for a diet type.
async fn clusters(
    State(state): State<SharedAppState>,
    ValidatedQuery(query): ValidatedQuery<InsightsQuery>,
) -> Result<Json<ViewResponse<CorrelationMatrix>>, InsightsError> {
    let started = Instant::now();
    let category = query.category();
    let data = state
        .pipeline
        .nutrient_correlations(category, query.limit)
        .await?;
    Ok(Json(ViewResponse {
        data,
        metadata: ViewMetadata::new(category, started),
    }))
}

async fn insights(
    State(state): State<SharedAppState>,
    ValidatedQuery(query): ValidatedQuery<InsightsQuery>,
) -> Result<Json<Insights>, InsightsError> {
    let insights = state
        .pipeline
        .build_insights(query.category(), query.limit)
        .await?;
    Ok(Json(insights))
}

/// Raw dataset rows.
async fn rows(
    State(state): State<SharedAppState>,
    ValidatedQuery(query): ValidatedQuery<InsightsQuery>,
) -> Result<Json<RowsResponse>, InsightsError> {
    let dataset = state.pipeline.dataset(query.limit).await?;
    let config = state.pipeline.config();
    Ok(Json(RowsResponse::new(
        &config.container,
        &config.object,
        dataset,
    )))
}
