use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use crate::image_store::StoreError;
use crate::llm::AiError;

#[derive(Debug)]
pub enum AppError {
    /// Just a status code with an empty body.
    Status(StatusCode),
    /// A status code with a JSON `{error}` body, not logged as a failure.
    Msg(StatusCode, String),
    /// The model call failed; 503 without a key, 502 otherwise.
    Ai(AiError),
    /// Internal error -> 500 with JSON body; logged.
    Anyhow(anyhow::Error),
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::Msg(StatusCode::BAD_REQUEST, msg.into())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        Self::Anyhow(e)
    }
}

impl From<AiError> for AppError {
    fn from(e: AiError) -> Self {
        Self::Ai(e)
    }
}

/* ---- Narrow, explicit conversions for `?` in handlers ---- */

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Backend(e) => Self::Anyhow(e),
            e @ StoreError::CapacityExceeded { .. } => {
                Self::Msg(StatusCode::INSUFFICIENT_STORAGE, e.to_string())
            }
        }
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(e: axum::extract::multipart::MultipartError) -> Self {
        Self::Msg(StatusCode::BAD_REQUEST, e.body_text())
    }
}

#[derive(Serialize)]
struct ErrBody {
    error: String,
}

fn json_error(code: StatusCode, error: String) -> axum::response::Response {
    (code, Json(ErrBody { error })).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        match self {
            Self::Status(code) => code.into_response(),
            Self::Msg(code, msg) => json_error(code, msg),
            Self::Ai(err) => {
                let code = match err {
                    AiError::MissingCredential => StatusCode::SERVICE_UNAVAILABLE,
                    AiError::EmptyResponse
                    | AiError::MalformedResponse(_)
                    | AiError::Transport(_) => StatusCode::BAD_GATEWAY,
                };
                tracing::warn!(status = %code, "{err}");
                json_error(code, err.to_string())
            }
            Self::Anyhow(err) => {
                tracing::error!("{:#}", err);
                json_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
