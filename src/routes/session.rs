//! Background workflows polled by the UI.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::Html,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::analysis::{FoodAnalysis, analyze_food_image};
use crate::error::{AppError, AppResult};
use crate::html::{ANALYSIS_FAILED_MESSAGE, PLAN_FAILED_ALERT, render_poster};
use crate::image_cache::{peek_plan_images, resolve_plan_images};
use crate::models::{AppState, GeneratedPlan, UserProfile};
use crate::planner::generate_plan;
use crate::routes::analyze::AnalyzeBody;
use crate::session::{Snapshot, Ticket};

#[derive(Serialize)]
pub struct Started {
    pub ticket: Ticket,
}

/// # Errors
/// 400 for an invalid profile; generation errors surface in the snapshot.
pub async fn start_plan(
    State(state): State<AppState>,
    Json(profile): Json<UserProfile>,
) -> AppResult<(StatusCode, Json<Started>)> {
    profile.validate().map_err(AppError::bad_request)?;

    let ticket = state.plan_session.begin().await;
    let session = Arc::clone(&state.plan_session);
    let images = Arc::clone(&state.images);
    let ai = state.ai.clone();

    tokio::spawn(async move {
        let outcome = match generate_plan(&ai, &profile).await {
            Ok(plan) => Ok(GeneratedPlan::new(profile, plan)),
            Err(e) => {
                warn!(error = %e, ticket = ticket.0, "plan generation failed");
                Err(PLAN_FAILED_ALERT.to_string())
            }
        };
        let plan = outcome.as_ref().ok().map(|g| g.plan.clone());
        if session.finish(ticket, outcome).await
            && let Some(plan) = plan
        {
            // warm the image cache so the poster renders from it
            let resolved = resolve_plan_images(&images, &plan).await;
            info!(ticket = ticket.0, images = resolved.len(), "plan images resolved");
        }
    });

    Ok((StatusCode::ACCEPTED, Json(Started { ticket })))
}

pub async fn plan_snapshot(State(state): State<AppState>) -> Json<Snapshot<GeneratedPlan>> {
    Json(state.plan_session.snapshot().await)
}

pub async fn reset_plan(State(state): State<AppState>) -> Json<Snapshot<GeneratedPlan>> {
    state.plan_session.reset().await;
    Json(state.plan_session.snapshot().await)
}

/// # Errors
/// 404 until a plan is ready.
pub async fn plan_poster(State(state): State<AppState>) -> AppResult<Html<String>> {
    let generated = state
        .plan_session
        .current()
        .await
        .ok_or(AppError::Status(StatusCode::NOT_FOUND))?;
    let images = peek_plan_images(&state.images, &generated.plan).await;
    Ok(Html(render_poster(&generated, &images)))
}

/// # Errors
/// 400 for an empty image; model errors surface in the snapshot.
pub async fn start_analysis(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeBody>,
) -> AppResult<(StatusCode, Json<Started>)> {
    if body.image.trim().is_empty() {
        return Err(AppError::bad_request("image is required"));
    }

    let ticket = state.analysis_session.begin().await;
    let session = Arc::clone(&state.analysis_session);
    let ai = state.ai.clone();

    tokio::spawn(async move {
        let outcome = analyze_food_image(&ai, &body.image).await.map_err(|e| {
            warn!(error = %e, ticket = ticket.0, "food analysis failed");
            ANALYSIS_FAILED_MESSAGE.to_string()
        });
        session.finish(ticket, outcome).await;
    });

    Ok((StatusCode::ACCEPTED, Json(Started { ticket })))
}

pub async fn analysis_snapshot(State(state): State<AppState>) -> Json<Snapshot<FoodAnalysis>> {
    Json(state.analysis_session.snapshot().await)
}

pub async fn reset_analysis(State(state): State<AppState>) -> Json<Snapshot<FoodAnalysis>> {
    state.analysis_session.reset().await;
    Json(state.analysis_session.snapshot().await)
}
