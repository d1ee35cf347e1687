pub mod analysis;
pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod html;
pub mod image_cache;
pub mod image_io;
pub mod image_store;
pub mod llm;
pub mod logging;
pub mod models;
pub mod planner;
pub mod routes;
pub mod session;
pub mod units;

use std::sync::Arc;
use std::time::Duration;

use crate::config::{CacheBackend, Config};
use crate::image_cache::{HttpImageFetcher, ImageEndpoint, MealImageResolver};
use crate::image_store::{ImageStore, MemoryStore, SqliteStore};
use crate::llm::{AiClient, GeminiClient};
use crate::session::Workflow;

pub use app::build_app;
pub use models::AppState;

/// One client for every outbound call.
///
/// # Errors
/// Fails if the TLS backend cannot be initialised.
pub fn http_client(config: &Config) -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .user_agent(concat!("nutrigen/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Image store selected by `--image-cache`.
///
/// # Errors
/// Fails if the SQLite database cannot be opened or migrated.
pub async fn image_store(config: &Config) -> anyhow::Result<Arc<dyn ImageStore>> {
    let capacity = config.image_cache_bytes;
    let policy = config.image_cache_overflow;
    Ok(match config.image_cache {
        CacheBackend::Memory => Arc::new(MemoryStore::new(capacity, policy)),
        CacheBackend::Sqlite => {
            let pool = db::make_pool(&config.database_path).await?;
            Arc::new(SqliteStore::new(pool, capacity, policy))
        }
    })
}

/// Wires the production model, fetcher and store from `config`.
///
/// # Errors
/// See [`http_client`] and [`image_store`].
pub async fn build_state(config: Config) -> anyhow::Result<AppState> {
    let http = http_client(&config)?;

    let model = GeminiClient::new(http.clone(), config.api_url.clone(), config.model.clone());
    let ai = AiClient::new(Arc::new(model), config.api_key.clone());

    let endpoint = ImageEndpoint {
        base: config.image_api_url.clone(),
        model: config.image_model.clone(),
        size: config.image_size,
    };
    let images = MealImageResolver::new(
        image_store(&config).await?,
        Arc::new(HttpImageFetcher::new(http)),
        endpoint,
    );

    Ok(AppState {
        ai,
        images: Arc::new(images),
        plan_session: Arc::new(Workflow::new()),
        analysis_session: Arc::new(Workflow::new()),
        config,
    })
}
