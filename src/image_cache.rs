//! Meal illustrations: placeholder, cached payload, fetched-and-converted
//! payload, or the remote URL as a last resort.
//!
//! Each distinct `(name, calories)` pair costs at most one download for as
//! long as the store keeps the entry. The calorie count doubles as the image
//! seed, so the same meal maps to the same generated picture everywhere.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};
use url::Url;

use crate::image_store::{ImageStore, StoreError};
use crate::models::{DietPlan, Meal};
use crate::units::plain_number;

pub const CACHE_KEY_VERSION: &str = "nutrigen_img_v2";
pub const PLACEHOLDER_IMAGE: &str = "https://placehold.co/200x200/FFFBF0/F97316?text=Delicious";
pub const DEFAULT_IMAGE_API_URL: &str = "https://image.pollinations.ai/prompt";
pub const DEFAULT_IMAGE_MODEL: &str = "flux";
pub const DEFAULT_IMAGE_SIZE: u32 = 200;
const PROMPT_SUFFIX: &str =
    "food photography, high resolution, appetizing, isolated on white plate, studio lighting";

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImageOrigin {
    Placeholder,
    Cache,
    Fetched,
    Remote,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct MealImage {
    pub src: String,
    pub origin: ImageOrigin,
    pub loading: bool,
}

impl MealImage {
    fn ready(src: String, origin: ImageOrigin) -> Self {
        Self {
            src,
            origin,
            loading: false,
        }
    }

    #[must_use]
    pub fn placeholder() -> Self {
        Self::ready(PLACEHOLDER_IMAGE.to_string(), ImageOrigin::Placeholder)
    }

    /// Not resolved yet; shows the placeholder meanwhile.
    #[must_use]
    pub fn pending() -> Self {
        Self {
            loading: true,
            ..Self::placeholder()
        }
    }
}

#[must_use]
pub fn cache_key(name: &str, calories: f64) -> String {
    format!("{CACHE_KEY_VERSION}_{name}_{}", plain_number(calories))
}

/// Where generated images come from.
#[derive(Debug, Clone)]
pub struct ImageEndpoint {
    pub base: String,
    pub model: String,
    pub size: u32,
}

impl Default for ImageEndpoint {
    fn default() -> Self {
        Self {
            base: DEFAULT_IMAGE_API_URL.to_string(),
            model: DEFAULT_IMAGE_MODEL.to_string(),
            size: DEFAULT_IMAGE_SIZE,
        }
    }
}

impl ImageEndpoint {
    /// `{base}/{encoded prompt}?width=..&height=..&nologo=true&model=..&seed={calories}`
    ///
    /// # Errors
    ///
    /// Err if the configured base is not a valid URL
    pub fn image_url(&self, visual_prompt: &str, calories: f64) -> anyhow::Result<String> {
        let prompt = format!("{visual_prompt}, {PROMPT_SUFFIX}");
        let raw = format!(
            "{}/{}",
            self.base.trim_end_matches('/'),
            urlencoding::encode(&prompt)
        );
        let mut url = Url::parse(&raw)?;
        let size = self.size.to_string();
        url.query_pairs_mut()
            .append_pair("width", &size)
            .append_pair("height", &size)
            .append_pair("nologo", "true")
            .append_pair("model", &self.model)
            .append_pair("seed", &plain_number(calories));
        Ok(url.into())
    }
}

#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// # Errors
    ///
    /// Transport failures and non-success statuses.
    async fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>>;
}

#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    http: reqwest::Client,
}

impl HttpImageFetcher {
    #[must_use]
    pub const fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        let bytes = self
            .http
            .get(url)
            .header(reqwest::header::USER_AGENT, "nutrigen/meal-images")
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?
            .to_vec();
        Ok(bytes)
    }
}

pub struct MealImageResolver {
    store: Arc<dyn ImageStore>,
    fetcher: Arc<dyn ImageFetcher>,
    endpoint: ImageEndpoint,
}

impl MealImageResolver {
    #[must_use]
    pub fn new(
        store: Arc<dyn ImageStore>,
        fetcher: Arc<dyn ImageFetcher>,
        endpoint: ImageEndpoint,
    ) -> Self {
        Self {
            store,
            fetcher,
            endpoint,
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn ImageStore> {
        &self.store
    }

    #[must_use]
    pub const fn endpoint(&self) -> &ImageEndpoint {
        &self.endpoint
    }

    async fn cached(&self, key: &str) -> Option<String> {
        match self.store.get(key).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(error = %e, key, "image cache read failed");
                None
            }
        }
    }

    /// Answers without touching the network: placeholder, cache hit, or a
    /// `loading` image when a fetch would be needed.
    pub async fn peek(&self, name: &str, calories: f64, visual_prompt: Option<&str>) -> MealImage {
        if visual_prompt.is_none_or(|p| p.trim().is_empty()) {
            return MealImage::placeholder();
        }
        match self.cached(&cache_key(name, calories)).await {
            Some(payload) => MealImage::ready(payload, ImageOrigin::Cache),
            None => MealImage::pending(),
        }
    }

    /// Never fails; every failure degrades to a displayable reference.
    pub async fn resolve(
        &self,
        name: &str,
        calories: f64,
        visual_prompt: Option<&str>,
    ) -> MealImage {
        let Some(prompt) = visual_prompt.filter(|p| !p.trim().is_empty()) else {
            return MealImage::placeholder();
        };

        let key = cache_key(name, calories);
        if let Some(payload) = self.cached(&key).await {
            debug!(key = %key, "image cache hit");
            return MealImage::ready(payload, ImageOrigin::Cache);
        }

        let url = match self.endpoint.image_url(prompt, calories) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "cannot build image url, using placeholder");
                return MealImage::placeholder();
            }
        };

        let bytes = match self.fetcher.fetch(&url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, url = %url, "image fetch failed, using direct URL");
                return MealImage::ready(url, ImageOrigin::Remote);
            }
        };

        let max_dim = self.endpoint.size;
        let converted =
            tokio::task::spawn_blocking(move || crate::image_io::to_cacheable_data_uri(&bytes, max_dim))
                .await;
        let payload = match converted {
            Ok(Ok(payload)) => payload,
            Ok(Err(e)) => {
                warn!(error = %e, url = %url, "image conversion failed, using direct URL");
                return MealImage::ready(url, ImageOrigin::Remote);
            }
            Err(e) => {
                warn!(error = %e, "image conversion task failed, using direct URL");
                return MealImage::ready(url, ImageOrigin::Remote);
            }
        };

        match self.store.put(&key, &payload).await {
            Ok(()) => debug!(key = %key, bytes = payload.len(), "image cached"),
            Err(e @ StoreError::CapacityExceeded { .. }) => {
                warn!(error = %e, key = %key, "image cache full, skipping cache");
            }
            Err(e) => warn!(error = %e, key = %key, "image cache write failed"),
        }

        MealImage::ready(payload, ImageOrigin::Fetched)
    }

    pub async fn resolve_meal(&self, meal: &Meal) -> MealImage {
        self.resolve(&meal.name, meal.calories, Some(&meal.visual_prompt_en))
            .await
    }

    pub async fn peek_meal(&self, meal: &Meal) -> MealImage {
        self.peek(&meal.name, meal.calories, Some(&meal.visual_prompt_en))
            .await
    }
}

/// Resolves every meal of `plan` concurrently, keyed by [`cache_key`].
pub async fn resolve_plan_images(
    resolver: &Arc<MealImageResolver>,
    plan: &DietPlan,
) -> HashMap<String, MealImage> {
    let mut tasks = JoinSet::new();
    let mut seen = std::collections::HashSet::new();

    for meal in plan.meals() {
        let key = cache_key(&meal.name, meal.calories);
        if !seen.insert(key.clone()) {
            continue;
        }
        let resolver = Arc::clone(resolver);
        let meal = meal.clone();
        tasks.spawn(async move { (key, resolver.resolve_meal(&meal).await) });
    }

    let mut out = HashMap::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((key, image)) => {
                out.insert(key, image);
            }
            Err(e) => warn!(error = %e, "image task failed"),
        }
    }
    out
}

/// Cache-only lookup of every meal; misses come back as `loading`.
pub async fn peek_plan_images(
    resolver: &MealImageResolver,
    plan: &DietPlan,
) -> HashMap<String, MealImage> {
    let mut out = HashMap::new();
    for meal in plan.meals() {
        let key = cache_key(&meal.name, meal.calories);
        if out.contains_key(&key) {
            continue;
        }
        let image = resolver.peek_meal(meal).await;
        out.insert(key, image);
    }
    out
}

/// Relative URL of the raw-image route for `meal`, used by posters for
/// meals that are not cached yet.
#[must_use]
pub fn lazy_image_path(meal: &Meal) -> String {
    format!(
        "/meal-image/raw?name={}&calories={}&prompt={}",
        urlencoding::encode(&meal.name),
        plain_number(meal.calories),
        urlencoding::encode(&meal.visual_prompt_en)
    )
}
