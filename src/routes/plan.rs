use axum::{Json, extract::State};

use crate::error::{AppError, AppResult};
use crate::models::{AppState, GeneratedPlan, UserProfile};
use crate::planner::generate_plan;

/// Generate a 7-day plan for `profile` and return it with its metadata.
///
/// # Errors
/// 400 for an invalid profile, 503 without an API key, 502 when the model
/// call or its answer fails.
pub async fn create(
    State(state): State<AppState>,
    Json(profile): Json<UserProfile>,
) -> AppResult<Json<GeneratedPlan>> {
    profile.validate().map_err(AppError::bad_request)?;
    let plan = generate_plan(&state.ai, &profile).await?;
    Ok(Json(GeneratedPlan::new(profile, plan)))
}
