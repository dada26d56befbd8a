use financial_collaboration_engine::{
    api::{start_server, ApiState},
    config::EngineConfig,
    llm::build_generator,
    memory::build_transcript_store,
    profile::{DataProvider, HttpDataProvider, StaticDataProvider},
    CollaborationEngine,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = EngineConfig::from_env();

    info!("🚀 Financial Collaboration Engine - API Server");
    info!("📍 Port: {}", config.port);

    let provider: Arc<dyn DataProvider> = match config.financial_api_base_url.as_deref() {
        Some(base_url) => Arc::new(HttpDataProvider::new(
            base_url,
            Duration::from_secs(config.provider_timeout_secs),
        )?),
        None => {
            warn!("FINANCIAL_API_BASE_URL not set, serving sample records");
            Arc::new(StaticDataProvider::sample())
        }
    };

    let generator = build_generator(config.gemini_api_key.as_deref());
    let engine = Arc::new(CollaborationEngine::from_config(&config, provider, generator));
    let transcripts = build_transcript_store(config.database_url.as_deref());

    info!(
        policy = config.resolution_policy.as_str(),
        max_iterations = config.max_iterations,
        transcripts = transcripts.backend(),
        "✅ Engine initialized"
    );

    start_server(ApiState { engine, transcripts }, config.port).await?;

    Ok(())
}
