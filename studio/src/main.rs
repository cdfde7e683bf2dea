use axum::http::{header, HeaderValue, Method};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};

use studio::api;
use studio::app_state::AppState;
use studio::config::Config;
use studio::generation::HttpQuestionGenerator;
use studio::store::SqliteSurveyStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Studio API server");

    // sqlite won't create intermediate directories on its own.
    if let Some(path) = config.database_url.strip_prefix("sqlite:") {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }

    let store = SqliteSurveyStore::connect(&config.database_url).await?;
    tracing::info!(database_url = %config.database_url, "Survey store ready");

    let generator = HttpQuestionGenerator::new(
        config.generation_endpoint.clone(),
        config.generation_timeout,
    )
    .map_err(|e| anyhow::anyhow!("failed to build generation client: {e}"))?;

    let app_state = AppState::new(
        Arc::new(store),
        Arc::new(generator),
        config.autosave_debounce,
        config.default_language.clone(),
    );

    let allowed_origins = config
        .cors_origins
        .iter()
        .map(|origin| HeaderValue::from_str(origin))
        .collect::<Result<Vec<_>, _>>()?;

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
        .max_age(std::time::Duration::from_secs(3600));

    let api_state = api::ApiState { app_state };
    let app = api::router().with_state(api_state).layer(cors);

    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!("Listening on http://0.0.0.0:{}", config.port);
    axum::serve(listener, app).await?;
    Ok(())
}
