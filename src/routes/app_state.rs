use axum::{Json, extract::State};
use serde::Serialize;

use crate::config::mask_key;
use crate::error::AppResult;
use crate::image_store::StoreStats;
use crate::models::AppState;

#[derive(Serialize)]
pub struct AppStateView {
    pub api_key_masked: String,
    pub model: String,
    pub api_url: String,
    pub request_timeout_secs: u64,
    pub image_api_url: String,
    pub image_model: String,
    pub image_size: u32,
    pub image_cache: StoreStats,
}

/// Effective settings (with the API key masked) and image-cache usage.
///
/// # Errors
/// Returns an error if the cache statistics cannot be read.
pub async fn get(State(state): State<AppState>) -> AppResult<Json<AppStateView>> {
    let image_cache = state.images.store().stats().await?;
    let endpoint = state.images.endpoint();
    Ok(Json(AppStateView {
        api_key_masked: mask_key(state.ai.api_key()),
        model: state.config.model.clone(),
        api_url: state.config.api_url.clone(),
        request_timeout_secs: state.config.request_timeout_secs,
        image_api_url: endpoint.base.clone(),
        image_model: endpoint.model.clone(),
        image_size: endpoint.size,
        image_cache,
    }))
}
