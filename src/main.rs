#![deny(
    warnings,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo
)]
#![allow(clippy::multiple_crate_versions)]

use std::path::Path;

use clap::Parser;
use tokio::net::TcpListener;

use nutrigen::{
    analysis::analyze_food_image,
    build_app, build_state,
    config::{Cli, Commands, Config, ProfileArgs, mask_key},
    html::render_poster,
    image_cache::resolve_plan_images,
    logging::init_logging,
    models::{GeneratedPlan, UserProfile},
    planner::generate_plan,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.config;

    // Keep guard alive so file logger flushes correctly
    let _log_guards = init_logging(&config);
    log_config(&config);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Plan { profile, poster } => plan(config, profile, poster.as_deref()).await,
        Commands::Analyze { image } => analyze(config, &image).await,
    }
}

fn log_config(config: &Config) {
    tracing::info!("=== Configuration ===");
    tracing::info!("Bind address: {}", config.bind);
    tracing::info!("Log file: {}", config.log_file.display());
    tracing::info!("API key: {}", mask_key(config.api_key.as_deref()));
    tracing::info!("Model: {}", config.model);
    tracing::info!("API URL: {}", config.api_url);
    tracing::info!("Request timeout: {}s", config.request_timeout_secs);
    tracing::info!("Image API URL: {}", config.image_api_url);
    tracing::info!("Image model: {} ({}px)", config.image_model, config.image_size);
    tracing::info!(
        "Image cache: {:?}, {} bytes, overflow {:?}",
        config.image_cache,
        config.image_cache_bytes,
        config.image_cache_overflow
    );
    tracing::info!("Database path: {}", config.database_path);
    tracing::info!("====================");

    if !config.has_api_key() {
        tracing::warn!(
            "No API key configured (NUTRIGEN_API_KEY); plan generation and food analysis will fail"
        );
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let bind = config.bind;
    let state = build_state(config).await?;
    let app = build_app(state);

    tracing::info!("listening on http://{bind}");
    let listener = TcpListener::bind(bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn plan(config: Config, args: ProfileArgs, poster: Option<&Path>) -> anyhow::Result<()> {
    let profile = UserProfile::from(args);
    profile.validate().map_err(anyhow::Error::msg)?;

    let state = build_state(config).await?;
    let plan = generate_plan(&state.ai, &profile).await?;
    let generated = GeneratedPlan::new(profile, plan);

    println!("{}", serde_json::to_string_pretty(&generated)?);

    if let Some(path) = poster {
        let images = resolve_plan_images(&state.images, &generated.plan).await;
        tokio::fs::write(path, render_poster(&generated, &images)).await?;
        tracing::info!("poster written to {}", path.display());
    }
    Ok(())
}

async fn analyze(config: Config, image: &Path) -> anyhow::Result<()> {
    use base64::Engine as _;

    let bytes = tokio::fs::read(image).await?;
    let mime = mime_guess::from_path(image)
        .first()
        .map(|m| m.essence_str().to_string())
        .filter(|m| m.starts_with("image/"))
        .unwrap_or_else(|| nutrigen::analysis::DEFAULT_IMAGE_MIME.to_string());
    let data_uri = format!(
        "data:{mime};base64,{}",
        base64::engine::general_purpose::STANDARD.encode(&bytes)
    );

    let state = build_state(config).await?;
    let analysis = analyze_food_image(&state.ai, &data_uri).await?;
    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(())
}
