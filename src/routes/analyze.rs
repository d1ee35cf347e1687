use axum::{
    Json,
    extract::{Multipart, State},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use serde::Deserialize;

use crate::analysis::{DEFAULT_IMAGE_MIME, FoodAnalysis, analyze_food_image};
use crate::error::{AppError, AppResult};
use crate::models::AppState;

#[derive(Deserialize)]
pub struct AnalyzeBody {
    /// Base64 payload or a full `data:` URI.
    pub image: String,
}

/// # Errors
/// 400 for an empty image, otherwise the model error mapping.
pub async fn analyze(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeBody>,
) -> AppResult<Json<FoodAnalysis>> {
    if body.image.trim().is_empty() {
        return Err(AppError::bad_request("image is required"));
    }
    Ok(Json(analyze_food_image(&state.ai, &body.image).await?))
}

/// Reads the first `image` or `file` part as a `data:` URI.
///
/// # Errors
/// Malformed multipart bodies.
pub async fn read_image_field(multipart: &mut Multipart) -> AppResult<Option<String>> {
    while let Some(field) = multipart.next_field().await? {
        if !matches!(field.name(), Some("image" | "file")) {
            continue;
        }
        let mime = field
            .content_type()
            .map(str::to_string)
            .filter(|m| m.starts_with("image/"))
            .or_else(|| {
                field
                    .file_name()
                    .and_then(|f| mime_guess::from_path(f).first())
                    .map(|m| m.essence_str().to_string())
                    .filter(|m| m.starts_with("image/"))
            })
            .unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string());
        let bytes = field.bytes().await?;
        if bytes.is_empty() {
            return Ok(None);
        }
        return Ok(Some(format!("data:{mime};base64,{}", B64.encode(&bytes))));
    }
    Ok(None)
}

/// # Errors
/// 400 when no image part was sent, otherwise the model error mapping.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<FoodAnalysis>> {
    let image = read_image_field(&mut multipart)
        .await?
        .ok_or_else(|| AppError::bad_request("missing `image` or `file` part"))?;
    Ok(Json(analyze_food_image(&state.ai, &image).await?))
}
