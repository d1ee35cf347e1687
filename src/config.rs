use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::{net::SocketAddr, path::PathBuf};

use crate::image_cache::{DEFAULT_IMAGE_API_URL, DEFAULT_IMAGE_MODEL, DEFAULT_IMAGE_SIZE};
use crate::image_store::{DEFAULT_CAPACITY_BYTES, OverflowPolicy};
use crate::llm::{DEFAULT_API_URL, DEFAULT_MODEL};
use crate::models::{ActivityLevel, Gender, Goal, UserProfile};

#[derive(Parser, Debug)]
#[command(name = "nutrigen", version, about = "AI diet planner server and CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub config: Config,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the HTTP server (default)
    Serve,
    /// Generate one 7-day plan and print it as JSON
    Plan {
        #[command(flatten)]
        profile: ProfileArgs,
        /// Also write a printable poster with all meal images inlined
        #[arg(long)]
        poster: Option<PathBuf>,
    },
    /// Estimate calories of a food photo
    Analyze {
        /// Image file (JPEG, PNG, WebP...)
        image: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ProfileArgs {
    #[arg(long, value_enum, default_value_t = Gender::Female)]
    pub gender: Gender,
    #[arg(long, default_value_t = 28)]
    pub age: u32,
    /// Height in cm
    #[arg(long, default_value_t = 162.0)]
    pub height: f64,
    /// Weight in kg
    #[arg(long, default_value_t = 55.0)]
    pub weight: f64,
    #[arg(long, value_enum, default_value_t = ActivityLevel::Sedentary)]
    pub activity: ActivityLevel,
    #[arg(long, value_enum, default_value_t = Goal::LoseWeight)]
    pub goal: Goal,
    /// Ingredients to avoid, comma separated
    #[arg(long, default_value = "")]
    pub exclude: String,
    /// Free-text style preference ("清淡", "low carb"...)
    #[arg(long, default_value = "")]
    pub preference: String,
}

impl From<ProfileArgs> for UserProfile {
    fn from(a: ProfileArgs) -> Self {
        Self {
            gender: a.gender,
            age: a.age,
            height: a.height,
            weight: a.weight,
            activity: a.activity,
            goal: a.goal,
            excluded_ingredients: a.exclude,
            dietary_preference: a.preference,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Sqlite,
    Memory,
}

/// `NutriGen` configuration
#[derive(Parser, Debug, Clone)]
pub struct Config {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Decrease verbosity (-q, -qq, -qqq)
    #[arg(short = 'q', action = ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Address to bind the HTTP server to
    #[arg(long, env = "NUTRIGEN_BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,

    /// Database path (image cache)
    #[arg(long, env = "NUTRIGEN_DATABASE_PATH", default_value = "nutrigen.sqlite")]
    pub database_path: String,

    /// Log file path (logs are written to stdout + this file)
    #[arg(long, env = "NUTRIGEN_LOG_FILE", default_value = "nutrigen.logs")]
    pub log_file: PathBuf,

    /// Gemini API key. Without it every AI-backed call fails, the server still starts.
    #[arg(long, env = "NUTRIGEN_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Gemini model to use
    #[arg(long, env = "NUTRIGEN_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Gemini API base URL
    #[arg(long, env = "NUTRIGEN_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Timeout for every outbound HTTP request, in seconds
    #[arg(long, env = "NUTRIGEN_REQUEST_TIMEOUT_SECS", default_value_t = 90)]
    pub request_timeout_secs: u64,

    /// Image generation endpoint (prompt is appended as a path segment)
    #[arg(long, env = "NUTRIGEN_IMAGE_API_URL", default_value = DEFAULT_IMAGE_API_URL)]
    pub image_api_url: String,

    /// Image generation model selector
    #[arg(long, env = "NUTRIGEN_IMAGE_MODEL", default_value = DEFAULT_IMAGE_MODEL)]
    pub image_model: String,

    /// Width and height of generated meal images, in pixels
    #[arg(long, env = "NUTRIGEN_IMAGE_SIZE", default_value_t = DEFAULT_IMAGE_SIZE)]
    pub image_size: u32,

    /// Where encoded meal images are kept
    #[arg(long, env = "NUTRIGEN_IMAGE_CACHE", value_enum, default_value_t = CacheBackend::Sqlite)]
    pub image_cache: CacheBackend,

    /// Image cache capacity in bytes
    #[arg(long, env = "NUTRIGEN_IMAGE_CACHE_BYTES", default_value_t = DEFAULT_CAPACITY_BYTES)]
    pub image_cache_bytes: u64,

    /// What to do when the image cache is full
    #[arg(long, env = "NUTRIGEN_IMAGE_CACHE_OVERFLOW", value_enum, default_value_t = OverflowPolicy::Reject)]
    pub image_cache_overflow: OverflowPolicy,
}

impl Config {
    #[must_use]
    pub fn verbosity_delta(&self) -> i16 {
        i16::from(self.verbose) - i16::from(self.quiet)
    }
    #[must_use]
    pub fn log_filter(&self) -> &'static str {
        match self.verbosity_delta() {
            d if d <= -2 => "error",
            -1 => "warn",
            0 => "info,nutrigen=info,axum=info,tower_http=info",
            1 => "debug,nutrigen=debug,axum=info,tower_http=info,sqlx=warn,reqwest=info",
            2 => "trace,nutrigen=trace,axum=debug,tower_http=trace,sqlx=info,hyper=info",
            _ => "trace,nutrigen=trace,axum=trace,tower_http=trace,sqlx=debug,hyper=debug",
        }
    }

    #[must_use]
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_ref().is_some_and(|k| !k.trim().is_empty())
    }
}

#[must_use]
pub fn mask_key(k: Option<&str>) -> String {
    match k {
        None | Some("") => String::new(),
        Some(s) if s.len() <= 6 => "***".to_string(),
        Some(s) => {
            let end = s.get(s.len().saturating_sub(4)..).unwrap_or("");
            format!("***{end}")
        }
    }
}
