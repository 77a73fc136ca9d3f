use axum::extract::DefaultBodyLimit;
use axum::http::header::InvalidHeaderValue;
use axum::http::HeaderValue;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    compare_handler, coverage_check_handler, get_policy_handler, health_handler,
    list_policies_handler, put_summary_handler, summary_schema_handler, upload_policy_handler,
};
use crate::server::AppState;

pub(crate) fn build_router(state: AppState, max_body_size: usize, cors: CorsLayer) -> Router {
    let api = Router::new()
        .route(
            "/policies",
            post(upload_policy_handler).get(list_policies_handler),
        )
        .route("/policies/compare", post(compare_handler))
        .route("/policies/{policy_id}", get(get_policy_handler))
        .route(
            "/policies/{policy_id}/coverage-check",
            post(coverage_check_handler),
        )
        .route("/policies/{policy_id}/summary", put(put_summary_handler))
        .route("/schema/policy-summary", get(summary_schema_handler))
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(RequestBodyLimitLayer::new(max_body_size));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Allows `origin` only, or any origin when none is configured.
pub(crate) fn cors_layer(origin: Option<&str>) -> Result<CorsLayer, InvalidHeaderValue> {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match origin {
        Some(origin) => Ok(layer.allow_origin(HeaderValue::from_str(origin)?)),
        None => Ok(layer.allow_origin(Any)),
    }
}
