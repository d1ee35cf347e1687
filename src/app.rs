use crate::{
    logging::{access_log, log_payloads},
    models::AppState,
    routes::{analyze, app_state, meal_image, pages, plan, session},
};

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::{Json, Router};

use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

/// Food photos arrive base64-encoded inside JSON.
const UPLOAD_LIMIT_BYTES: usize = 20 * 1024 * 1024;

async fn healthz() -> Json<&'static str> {
    Json("ok")
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn build_app(state: AppState) -> Router {
    // Request-ID middleware comes first so everything downstream
    // has access to the x-request-id header.
    let request_id_layer = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id());

    Router::new()
        .route("/healthz", get(healthz))
        .route("/", get(pages::form).post(pages::submit))
        .route("/app-state", get(app_state::get))
        .route("/plan", post(plan::create))
        .route("/analyze", post(analyze::analyze))
        .route("/analyze/upload", post(analyze::upload))
        .route("/meal-image", get(meal_image::get))
        .route("/meal-image/raw", get(meal_image::raw))
        .route(
            "/session/plan",
            get(session::plan_snapshot)
                .post(session::start_plan)
                .delete(session::reset_plan),
        )
        .route("/session/plan/poster", get(session::plan_poster))
        .route(
            "/session/analysis",
            get(session::analysis_snapshot)
                .post(session::start_analysis)
                .delete(session::reset_analysis),
        )
        .with_state(state)
        .layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES))
        .layer(from_fn(log_payloads))
        .layer(from_fn(access_log))
        .layer(request_id_layer)
        .layer(cors_layer())
}
