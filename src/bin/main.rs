use financial_collaboration_engine::{
    llm::build_generator, profile::StaticDataProvider, CollaborationEngine, QueryRequest,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    dotenv::dotenv().ok();

    info!("Financial Collaboration Engine demo starting");

    let query = std::env::args()
        .skip(1)
        .collect::<Vec<_>>()
        .join(" ");
    let query = if query.trim().is_empty() {
        "How can I save more each month?".to_string()
    } else {
        query
    };

    // Sample records; Gemini phrasing only when a key is configured
    let api_key = std::env::var("GEMINI_API_KEY").ok();
    let engine = CollaborationEngine::new(
        Arc::new(StaticDataProvider::sample()),
        build_generator(api_key.as_deref()),
    );

    info!(query = %query, "Running collaboration");

    let response = engine
        .process_user_query(QueryRequest::new("demo-user", query))
        .await;

    println!("\n=== FINAL RECOMMENDATION ===");
    println!("{}", response.final_recommendation);
    println!("\n=== FULL RESPONSE ===");
    println!("{}", serde_json::to_string_pretty(&response)?);

    if response.success {
        Ok(())
    } else {
        Err(response
            .error
            .unwrap_or_else(|| "collaboration failed".to_string())
            .into())
    }
}
