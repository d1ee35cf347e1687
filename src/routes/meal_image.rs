use axum::{
    Json,
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use crate::image_cache::MealImage;
use crate::image_io::decode_data_uri;
use crate::models::AppState;

#[derive(Deserialize)]
pub struct MealImageQuery {
    pub name: String,
    pub calories: f64,
    #[serde(default)]
    pub prompt: Option<String>,
}

async fn resolve(state: &AppState, q: &MealImageQuery) -> MealImage {
    state
        .images
        .resolve(&q.name, q.calories, q.prompt.as_deref())
        .await
}

pub async fn get(State(state): State<AppState>, Query(q): Query<MealImageQuery>) -> Json<MealImage> {
    Json(resolve(&state, &q).await)
}

/// Serves the picture itself so `<img src>` can point here.
pub async fn raw(State(state): State<AppState>, Query(q): Query<MealImageQuery>) -> Response {
    let image = resolve(&state, &q).await;
    match decode_data_uri(&image.src) {
        Some((mime, bytes)) => (
            [
                (header::CONTENT_TYPE, mime),
                (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
            ],
            bytes,
        )
            .into_response(),
        None => Redirect::temporary(&image.src).into_response(),
    }
}
