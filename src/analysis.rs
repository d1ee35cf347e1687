use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use tracing::info;

use crate::llm::{AiClient, AiError, ModelRequest, Part};

pub const ANALYSIS_PROMPT: &str =
    "分析食物图片。识别名称、热量、营养占比、健康评分(0-10)及建议。JSON格式返回。";
pub const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FoodAnalysis {
    pub food_name: String,
    pub calories: f64,
    #[serde(default)]
    pub protein: f64,
    #[serde(default)]
    pub carbs: f64,
    #[serde(default)]
    pub fat: f64,
    pub health_score: f64, // 0-10
    pub advice: String,
}

/// Drops everything up to the first comma of a `data:` URI.
#[must_use]
pub fn strip_data_uri(image: &str) -> &str {
    match image.split_once(',') {
        Some((_, rest)) if !rest.is_empty() => rest,
        _ => image,
    }
}

/// `image/png` for `data:image/png;base64,...`, the JPEG default otherwise.
#[must_use]
pub fn data_uri_mime(image: &str) -> &str {
    image
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(','))
        .map(|(meta, _)| meta.split(';').next().unwrap_or_default())
        .filter(|mime| mime.starts_with("image/"))
        .unwrap_or(DEFAULT_IMAGE_MIME)
}

#[must_use]
pub fn food_analysis_schema() -> JsonValue {
    json!({
        "type": "OBJECT",
        "properties": {
            "food_name": { "type": "STRING" },
            "calories": { "type": "NUMBER" },
            "protein": { "type": "NUMBER" },
            "carbs": { "type": "NUMBER" },
            "fat": { "type": "NUMBER" },
            "health_score": { "type": "NUMBER" },
            "advice": { "type": "STRING" }
        },
        "required": ["food_name", "calories", "health_score", "advice"]
    })
}

#[must_use]
pub fn analysis_request(image: &str) -> ModelRequest {
    ModelRequest {
        parts: vec![
            Part::InlineImage {
                mime_type: data_uri_mime(image).to_string(),
                data: strip_data_uri(image).to_string(),
            },
            Part::Text(ANALYSIS_PROMPT.to_string()),
        ],
        schema: food_analysis_schema(),
        temperature: None,
    }
}

/// # Errors
///
/// See [`AiError`].
pub async fn analyze_food_image(ai: &AiClient, image: &str) -> Result<FoodAnalysis, AiError> {
    let analysis: FoodAnalysis = ai.generate(&analysis_request(image)).await?;
    info!(
        food = %analysis.food_name,
        calories = analysis.calories,
        "food image analysed"
    );
    Ok(analysis)
}
