use property_advisor::{
    agent::Orchestrator,
    api::start_server,
    config::AdvisorConfig,
    memory::{spawn_eviction_task, ContextManager, InMemorySessionStore, SessionStore},
    provider::OpenAiCompatProvider,
    tools::ToolDispatcher,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AdvisorConfig::from_env()?;

    info!("Property Advisor - API Server");
    info!(port = config.port, model = %config.provider.model, "Configuration loaded");
    if config.provider.api_key.is_empty() {
        warn!("LLM_API_KEY not set; chat turns will be rejected with 503");
    }

    // Create components
    let provider = Arc::new(OpenAiCompatProvider::new(config.provider.clone())?);
    let sessions: Arc<dyn SessionStore> = Arc::new(
        InMemorySessionStore::new(config.session_ttl).with_teardown_hook(Arc::new(|key: &str| {
            info!(session_key = %key, "Session released");
        })),
    );
    let _sweeper = spawn_eviction_task(sessions.clone(), config.session_sweep_interval);

    let orchestrator = Arc::new(Orchestrator::new(
        provider,
        sessions,
        ToolDispatcher::new(),
        ContextManager::with_window_size(config.context_window_size),
        config.streaming,
    ));

    info!(
        window = config.context_window_size,
        ttl_secs = config.session_ttl.as_secs(),
        "Orchestrator initialized"
    );

    start_server(orchestrator, config.port).await?;

    Ok(())
}
