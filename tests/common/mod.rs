#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use clap::Parser;
use serde_json::{Value, json};

use nutrigen::config::Config;
use nutrigen::image_cache::{ImageEndpoint, ImageFetcher, MealImageResolver};
use nutrigen::image_store::{ImageStore, MemoryStore};
use nutrigen::llm::{AiClient, GenerativeModel, ModelRequest};
use nutrigen::models::AppState;
use nutrigen::session::Workflow;

/// Answers every request with a canned reply and records what it saw.
#[derive(Default)]
pub struct StubModel {
    reply: Option<String>,
    fail: bool,
    calls: AtomicUsize,
    last: Mutex<Option<ModelRequest>>,
}

impl StubModel {
    pub fn replying(reply: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.into()),
            ..Self::default()
        })
    }

    pub fn silent() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ModelRequest> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerativeModel for StubModel {
    async fn submit(&self, _api_key: &str, request: &ModelRequest) -> anyhow::Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(request.clone());
        if self.fail {
            anyhow::bail!("connection reset by peer");
        }
        Ok(self.reply.clone())
    }
}

pub fn ai_with(model: &Arc<StubModel>, key: Option<&str>) -> AiClient {
    AiClient::new(model.clone(), key.map(str::to_string))
}

/// Serves fixed bytes (or an error) and counts requested URLs.
pub struct StubFetcher {
    body: Option<Vec<u8>>,
    urls: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn serving(body: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            body: Some(body),
            urls: Mutex::new(Vec::new()),
        })
    }

    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            body: None,
            urls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.urls.lock().unwrap().len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        self.urls.lock().unwrap().push(url.to_string());
        self.body
            .clone()
            .ok_or_else(|| anyhow::anyhow!("image host unreachable"))
    }
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([249, 115, 22]));
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

pub fn resolver(store: Arc<dyn ImageStore>, fetcher: Arc<StubFetcher>) -> Arc<MealImageResolver> {
    Arc::new(MealImageResolver::new(
        store,
        fetcher,
        ImageEndpoint::default(),
    ))
}

pub fn test_config() -> Config {
    Config::parse_from(["nutrigen", "--image-cache", "memory"])
}

pub fn test_state(
    model: &Arc<StubModel>,
    key: Option<&str>,
    fetcher: Arc<StubFetcher>,
) -> AppState {
    AppState {
        ai: ai_with(model, key),
        images: resolver(Arc::new(MemoryStore::default()), fetcher),
        plan_session: Arc::new(Workflow::new()),
        analysis_session: Arc::new(Workflow::new()),
        config: test_config(),
    }
}

fn meal(name: &str, calories: f64, prompt: &str) -> Value {
    json!({
        "name": name,
        "calories": calories,
        "protein": "20g",
        "carbs": "45g",
        "fat": "10g",
        "ingredients": [
            { "name": "燕麦", "amount": "50g" },
            { "name": "鸡蛋", "amount": "1个" }
        ],
        "recipe_steps": ["1. 燕麦加水煮开。", "2. 鸡蛋水煮8分钟。"],
        "visual_prompt_en": prompt
    })
}

pub fn sample_plan() -> Value {
    json!({
        "title": "28岁女性秋季减脂食谱",
        "summary": "控制总热量，优先优质蛋白与全谷物。",
        "days": [
            {
                "day": "周一",
                "breakfast": meal("燕麦鸡蛋早餐", 350.0, "Oatmeal with boiled egg"),
                "lunch": meal("清蒸鲈鱼配糙米", 520.0, "Steamed sea bass with brown rice"),
                "dinner": meal("番茄豆腐汤", 380.0, "Tomato tofu soup"),
                "snack": meal("苹果", 80.0, "Fresh apple"),
                "total_calories": 1330.0
            },
            {
                "day": "周二",
                "breakfast": meal("燕麦鸡蛋早餐", 350.0, "Oatmeal with boiled egg"),
                "lunch": meal("鸡胸肉沙拉", 450.0, "Chicken breast salad"),
                "dinner": meal("西兰花炒虾仁", 400.0, ""),
                "total_calories": 1200.0
            }
        ],
        "shopping_list": ["燕麦 500g", "鸡蛋 12个", "鲈鱼 1条"]
    })
}

pub fn sample_plan_text() -> String {
    sample_plan().to_string()
}

pub fn sample_analysis_text() -> String {
    json!({
        "food_name": "番茄炒蛋",
        "calories": 210,
        "protein": 12,
        "carbs": 8,
        "fat": 14,
        "health_score": 7.5,
        "advice": "少油烹饪，搭配一份粗粮。"
    })
    .to_string()
}
