use async_trait::async_trait;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use std::sync::{Arc, LazyLock};
use tracing::{debug, instrument};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("API key not configured")]
    MissingCredential,

    #[error("model returned no content")]
    EmptyResponse,

    #[error("model returned malformed JSON: {0}")]
    MalformedResponse(#[source] serde_json::Error),

    #[error("model request failed: {0:#}")]
    Transport(anyhow::Error),
}

/// One piece of a model request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Text(String),
    /// Base64 payload without any `data:` prefix.
    InlineImage { mime_type: String, data: String },
}

/// A schema-constrained generation request.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub parts: Vec<Part>,
    pub schema: JsonValue,
    pub temperature: Option<f32>,
}

impl ModelRequest {
    /// The instruction text, i.e. every text part joined by newlines.
    #[must_use]
    pub fn instruction(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                Part::InlineImage { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// The narrow seam between this crate and a hosted model.
///
/// Implementations return the raw text of the answer (`None` when the model
/// produced nothing); parsing is left to [`AiClient`].
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// # Errors
    ///
    /// Transport or HTTP-level failures.
    async fn submit(&self, api_key: &str, request: &ModelRequest)
    -> anyhow::Result<Option<String>>;
}

/* ---------- Gemini ---------- */

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base: String,
    model: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'a str,
    response_schema: &'a JsonValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateBody<'a> {
    contents: Vec<JsonValue>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GeminiClient {
    #[must_use]
    pub const fn new(http: reqwest::Client, base: String, model: String) -> Self {
        Self { http, base, model }
    }

    #[must_use]
    pub fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base.trim_end_matches('/'),
            self.model
        )
    }

    fn part_json(part: &Part) -> JsonValue {
        match part {
            Part::Text(text) => json!({ "text": text }),
            Part::InlineImage { mime_type, data } => json!({
                "inlineData": { "mimeType": mime_type, "data": data }
            }),
        }
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn submit(
        &self,
        api_key: &str,
        request: &ModelRequest,
    ) -> anyhow::Result<Option<String>> {
        let body = GenerateBody {
            contents: vec![json!({
                "role": "user",
                "parts": request.parts.iter().map(Self::part_json).collect::<Vec<_>>(),
            })],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: &request.schema,
                temperature: request.temperature,
            },
        };

        debug!("sending generateContent request");
        let resp = self
            .http
            .post(self.endpoint())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            anyhow::bail!("Gemini HTTP {status}: {text}");
        }

        let envelope: GenerateResponse = serde_json::from_str(&text)?;
        let content: String = envelope
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        debug!(chars = content.len(), "generateContent answered");
        Ok(if content.is_empty() { None } else { Some(content) })
    }
}

/* ---------- Client with credential + parsing ---------- */

/// Shared handle used by the planner and the analyzer.
#[derive(Clone)]
pub struct AiClient {
    model: Arc<dyn GenerativeModel>,
    api_key: Option<String>,
}

impl AiClient {
    /// Blank keys count as missing.
    #[must_use]
    pub fn new(model: Arc<dyn GenerativeModel>, api_key: Option<String>) -> Self {
        let api_key = api_key.filter(|k| !k.trim().is_empty());
        Self { model, api_key }
    }

    #[must_use]
    pub const fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    /// Submits `request` and parses the answer into `T`.
    ///
    /// # Errors
    ///
    /// [`AiError::MissingCredential`] before any network activity when no key
    /// is configured, otherwise empty, malformed or transport failures.
    pub async fn generate<T: DeserializeOwned>(&self, request: &ModelRequest) -> Result<T, AiError> {
        let key = self.api_key.as_deref().ok_or(AiError::MissingCredential)?;
        let text = self
            .model
            .submit(key, request)
            .await
            .map_err(AiError::Transport)?
            .filter(|t| !t.trim().is_empty())
            .ok_or(AiError::EmptyResponse)?;
        parse_structured(&text).map_err(AiError::MalformedResponse)
    }
}

/// Parses model text into `T`, tolerating fenced or chatty answers.
///
/// # Errors
///
/// The error of the direct parse when no fallback candidate parses either.
pub fn parse_structured<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
    let direct = match serde_json::from_str::<T>(text) {
        Ok(v) => return Ok(v),
        Err(e) => e,
    };

    // 1) fenced ```json
    if let Some(js) = extract_fenced_json(text)
        && let Ok(v) = serde_json::from_str::<T>(&js)
    {
        return Ok(v);
    }
    // 2) balanced object fallback
    if let Some(js) = extract_largest_json_object(text)
        && js.trim() != text.trim()
        && let Ok(v) = serde_json::from_str::<T>(&js)
    {
        return Ok(v);
    }

    debug!(
        preview = %text.chars().take(500).collect::<String>(),
        "model text did not parse"
    );
    Err(direct)
}

/// Extract JSON object from a ```json ... ``` fenced block.
/// Accepts ```json``` or plain ``` ``` fences (case-insensitive).
#[must_use]
pub fn extract_fenced_json(s: &str) -> Option<String> {
    static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
        // greedy up to the last closing fence; plans nest objects deeply
        Regex::new(r"(?is)```(?:json)?\s*(\{.*\})\s*```").unwrap()
    });

    FENCE_RE
        .captures(s)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Find the *largest* balanced `{ ... }` object in text, ignoring braces
/// inside string literals.
#[must_use]
pub fn extract_largest_json_object(s: &str) -> Option<String> {
    let mut best: Option<(usize, usize)> = None;

    let mut depth: usize = 0;
    let mut start: Option<usize> = None;

    let mut in_str = false;
    let mut esc = false;

    for (i, ch) in s.char_indices() {
        if in_str {
            if esc {
                esc = false;
            } else if ch == '\\' {
                esc = true;
            } else if ch == '"' {
                in_str = false;
            }
            continue;
        }

        match ch {
            '"' => in_str = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0
                    && let Some(st) = start.take()
                {
                    let longer = best.is_none_or(|(a, b)| i - st > b - a);
                    if longer {
                        best = Some((st, i));
                    }
                }
            }
            _ => {}
        }
    }

    best.map(|(a, b)| s[a..=b].to_string())
}
