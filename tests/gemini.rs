//! Wire-level checks against local mock servers.

mod common;

use std::sync::{Arc, Mutex};

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode, Uri},
    response::IntoResponse,
    routing::get,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use common::png_bytes;
use nutrigen::analysis::{ANALYSIS_PROMPT, analyze_food_image, food_analysis_schema};
use nutrigen::image_cache::{HttpImageFetcher, ImageEndpoint, ImageFetcher, ImageOrigin, MealImageResolver};
use nutrigen::image_store::MemoryStore;
use nutrigen::llm::{AiClient, AiError, GeminiClient};
use nutrigen::models::UserProfile;
use nutrigen::planner::generate_plan;

#[derive(Clone)]
struct MockGemini {
    status: StatusCode,
    reply: Value,
    seen: Arc<Mutex<Vec<(String, Option<String>, Value)>>>,
}

impl MockGemini {
    fn new(status: StatusCode, reply: Value) -> Self {
        Self {
            status,
            reply,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn answering(texts: &[&str]) -> Self {
        let parts: Vec<Value> = texts.iter().map(|t| json!({ "text": t })).collect();
        Self::new(
            StatusCode::OK,
            json!({ "candidates": [ { "content": { "role": "model", "parts": parts } } ] }),
        )
    }

    fn last(&self) -> (String, Option<String>, Value) {
        self.seen.lock().unwrap().last().cloned().unwrap()
    }
}

async fn generate_content(
    State(mock): State<MockGemini>,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    let key = headers
        .get("x-goog-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
    mock.seen
        .lock()
        .unwrap()
        .push((uri.path().to_string(), key, body));
    (mock.status, mock.reply.to_string())
}

async fn spawn(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

async fn gemini(mock: &MockGemini, key: Option<&str>) -> AiClient {
    let base = spawn(Router::new().fallback(generate_content).with_state(mock.clone())).await;
    let client = GeminiClient::new(
        reqwest::Client::new(),
        format!("{base}/v1beta"),
        "gemini-2.5-flash".into(),
    );
    AiClient::new(Arc::new(client), key.map(str::to_string))
}

#[tokio::test]
async fn analysis_request_shape() {
    let answer = r#"{"food_name":"番茄炒蛋","calories":210,"protein":12,"carbs":8,"fat":14,"health_score":7,"advice":"少油"}"#;
    // split across two parts; the client concatenates them
    let (a, b) = answer.split_at(20);
    let mock = MockGemini::answering(&[a, b]);
    let ai = gemini(&mock, Some("secret-key")).await;

    let result = analyze_food_image(&ai, "data:image/png;base64,iVBORw0KGgo=")
        .await
        .unwrap();
    assert_eq!(result.food_name, "番茄炒蛋");

    let (path, key, body) = mock.last();
    assert_eq!(path, "/v1beta/models/gemini-2.5-flash:generateContent");
    assert_eq!(key.as_deref(), Some("secret-key"));

    let parts = &body["contents"][0]["parts"];
    assert_eq!(body["contents"][0]["role"], "user");
    assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
    assert_eq!(parts[0]["inlineData"]["data"], "iVBORw0KGgo=");
    assert_eq!(parts[1]["text"], ANALYSIS_PROMPT);

    let cfg = &body["generationConfig"];
    assert_eq!(cfg["responseMimeType"], "application/json");
    assert_eq!(cfg["responseSchema"], food_analysis_schema());
    assert!(cfg.get("temperature").is_none());
}

#[tokio::test]
async fn plan_request_sets_temperature() {
    let plan_text = common::sample_plan_text();
    let mock = MockGemini::answering(&[plan_text.as_str()]);
    let ai = gemini(&mock, Some("secret-key")).await;

    let plan = generate_plan(&ai, &UserProfile::default()).await.unwrap();
    assert_eq!(plan.days.len(), 2);

    let (_, _, body) = mock.last();
    assert_eq!(body["generationConfig"]["temperature"], 0.4);
    let text = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert!(text.contains("162cm"));
}

#[tokio::test]
async fn http_errors_are_transport_errors() {
    let mock = MockGemini::new(
        StatusCode::TOO_MANY_REQUESTS,
        json!({"error": {"message": "quota exceeded"}}),
    );
    let ai = gemini(&mock, Some("k")).await;

    let err = analyze_food_image(&ai, "AAAA").await.unwrap_err();
    assert!(matches!(err, AiError::Transport(_)), "got {err:?}");
    let msg = err.to_string();
    assert!(msg.contains("429"), "{msg}");
    assert!(msg.contains("quota exceeded"), "{msg}");
}

#[tokio::test]
async fn no_candidates_is_an_empty_response() {
    let mock = MockGemini::new(StatusCode::OK, json!({ "candidates": [] }));
    let ai = gemini(&mock, Some("k")).await;
    let err = analyze_food_image(&ai, "AAAA").await.unwrap_err();
    assert!(matches!(err, AiError::EmptyResponse));
}

#[tokio::test]
async fn no_key_means_no_request() {
    let mock = MockGemini::answering(&["{}"]);
    let ai = gemini(&mock, None).await;
    let err = generate_plan(&ai, &UserProfile::default()).await.unwrap_err();
    assert!(matches!(err, AiError::MissingCredential));
    assert!(mock.seen.lock().unwrap().is_empty());
}

/* ---------- image endpoint ---------- */

#[derive(Clone, Default)]
struct MockImages {
    hits: Arc<Mutex<Vec<String>>>,
}

async fn serve_png(State(mock): State<MockImages>, uri: Uri) -> impl IntoResponse {
    mock.hits.lock().unwrap().push(uri.to_string());
    if uri.path().contains("missing") {
        return (StatusCode::NOT_FOUND, Vec::new()).into_response();
    }
    ([("content-type", "image/png")], png_bytes(300, 300)).into_response()
}

#[tokio::test]
async fn http_fetcher_reports_status_errors() {
    let mock = MockImages::default();
    let base = spawn(
        Router::new()
            .route("/prompt/{prompt}", get(serve_png))
            .with_state(mock.clone()),
    )
    .await;
    let fetcher = HttpImageFetcher::new(reqwest::Client::new());

    let bytes = fetcher.fetch(&format!("{base}/prompt/rice")).await.unwrap();
    assert!(image::load_from_memory(&bytes).is_ok());
    assert!(fetcher.fetch(&format!("{base}/prompt/missing")).await.is_err());
}

#[tokio::test]
async fn resolver_downloads_through_http_once() {
    let mock = MockImages::default();
    let base = spawn(
        Router::new()
            .route("/prompt/{prompt}", get(serve_png))
            .with_state(mock.clone()),
    )
    .await;

    let endpoint = ImageEndpoint {
        base: format!("{base}/prompt"),
        model: "turbo".into(),
        size: 64,
    };
    let resolver = MealImageResolver::new(
        Arc::new(MemoryStore::default()),
        Arc::new(HttpImageFetcher::new(reqwest::Client::new())),
        endpoint,
    );

    let first = resolver.resolve("杂粮粥", 220.0, Some("Millet porridge")).await;
    assert_eq!(first.origin, ImageOrigin::Fetched);
    let second = resolver.resolve("杂粮粥", 220.0, Some("Millet porridge")).await;
    assert_eq!(second.origin, ImageOrigin::Cache);

    let hits = mock.hits.lock().unwrap().clone();
    assert_eq!(hits.len(), 1);
    assert!(hits[0].starts_with("/prompt/Millet%20porridge%2C%20food%20photography"), "{}", hits[0]);
    assert!(hits[0].ends_with("?width=64&height=64&nologo=true&model=turbo&seed=220"), "{}", hits[0]);

    let (_, bytes) = nutrigen::image_io::decode_data_uri(&first.src).unwrap();
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (64, 64));
}
