use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::html::{PLAN_FAILED_ALERT, render_form, render_poster};
use crate::image_cache::peek_plan_images;
use crate::models::{AppState, GeneratedPlan, UserProfile};
use crate::planner::generate_plan;

pub async fn form() -> Html<String> {
    Html(render_form(&UserProfile::default(), None))
}

/// Synchronous form flow: poster on success, the form again with an alert
/// otherwise.
pub async fn submit(State(state): State<AppState>, Form(profile): Form<UserProfile>) -> Response {
    if let Err(msg) = profile.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Html(render_form(&profile, Some(&msg))),
        )
            .into_response();
    }

    match generate_plan(&state.ai, &profile).await {
        Ok(plan) => {
            let generated = GeneratedPlan::new(profile, plan);
            let images = peek_plan_images(&state.images, &generated.plan).await;
            Html(render_poster(&generated, &images)).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "form plan generation failed");
            Html(render_form(&profile, Some(PLAN_FAILED_ALERT))).into_response()
        }
    }
}
