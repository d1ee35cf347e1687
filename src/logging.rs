use crate::config::Config;

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Instant;

use axum::body::{Body, HttpBody};
use axum::http::{Request, Response, header};
use axum::middleware::Next;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const BODY_LIMIT: usize = 64 * 1024;
const PREVIEW_LIMIT: usize = 16 * 1024;

/// Keep guards alive for the lifetime of the app.
pub struct LogGuards {
    _file_guard: Option<WorkerGuard>,
}

fn split_path(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    let file = path
        .file_name()
        .unwrap_or_else(|| OsStr::new("nutrigen.logs"))
        .to_string_lossy()
        .to_string();
    (dir, file)
}

pub fn init_logging(config: &Config) -> LogGuards {
    let filter = EnvFilter::new(config.log_filter());

    let stdout_layer = fmt::layer()
        .with_target(false)
        .with_ansi(true)
        .compact()
        .with_timer(fmt::time::ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()));

    let (dir, file) = split_path(&config.log_file);
    let appender = tracing_appender::rolling::never(dir, file);
    let (nb, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .compact()
        .with_timer(fmt::time::ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_writer(nb);

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    LogGuards {
        _file_guard: Some(guard),
    }
}

fn request_id<B>(req: &Request<B>) -> String {
    req.headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string()
}

fn content_type(headers: &axum::http::HeaderMap) -> String {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

/// Only small, known-size, textual bodies get buffered.
fn is_loggable(ct: &str, body: &Body) -> bool {
    let small = body
        .size_hint()
        .upper()
        .is_some_and(|n| n <= BODY_LIMIT as u64);
    small
        && !(ct.starts_with("multipart/")
            || ct.starts_with("image/")
            || ct.starts_with("application/octet-stream"))
}

fn preview(bytes: &[u8]) -> String {
    let text = if bytes.len() > PREVIEW_LIMIT {
        format!(
            "{}… [truncated]",
            String::from_utf8_lossy(&bytes[..PREVIEW_LIMIT])
        )
    } else {
        String::from_utf8_lossy(bytes).to_string()
    };
    // base64 image payloads drown everything else
    if text.contains(";base64,") {
        return format!("<{} bytes with inline image data>", bytes.len());
    }
    text
}

/// One line per request with method, path, status and latency.
pub async fn access_log(req: Request<Body>, next: Next) -> Response<Body> {
    let rid = request_id(&req);
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let res = next.run(req).await;

    let status = res.status();
    let latency_ms = started.elapsed().as_millis();
    if status.is_server_error() {
        tracing::error!(request_id=%rid, %method, %path, %status, latency_ms, "request failed");
    } else {
        tracing::info!(request_id=%rid, %method, %path, %status, latency_ms, "request completed");
    }
    res
}

/// Logs request & response bodies at debug level.
pub async fn log_payloads(req: Request<Body>, next: Next) -> Response<Body> {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return next.run(req).await;
    }

    let rid = request_id(&req);
    let req_ct = content_type(req.headers());

    let (req_parts, req_body) = req.into_parts();
    let req = if is_loggable(&req_ct, &req_body) {
        match axum::body::to_bytes(req_body, BODY_LIMIT).await {
            Ok(bytes) => {
                tracing::debug!(request_id=%rid, request_body=%preview(&bytes), "request body");
                Request::from_parts(req_parts, Body::from(bytes))
            }
            Err(e) => {
                tracing::warn!(request_id=%rid, error=%e, "failed reading request body");
                Request::from_parts(req_parts, Body::empty())
            }
        }
    } else {
        Request::from_parts(req_parts, req_body)
    };

    let res = next.run(req).await;

    let res_ct = content_type(res.headers());
    let (res_parts, res_body) = res.into_parts();
    if is_loggable(&res_ct, &res_body) {
        match axum::body::to_bytes(res_body, BODY_LIMIT).await {
            Ok(bytes) => {
                tracing::debug!(request_id=%rid, response_body=%preview(&bytes), "response body");
                Response::from_parts(res_parts, Body::from(bytes))
            }
            Err(e) => {
                tracing::warn!(request_id=%rid, error=%e, "failed reading response body");
                Response::from_parts(res_parts, Body::empty())
            }
        }
    } else {
        Response::from_parts(res_parts, res_body)
    }
}
