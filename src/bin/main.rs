use futures::StreamExt;
use property_advisor::{
    agent::Orchestrator,
    config::AdvisorConfig,
    memory::{ContextManager, InMemorySessionStore},
    models::{ToolInvocation, TurnEvent, TurnRequest},
    provider::{
        ChatCompletion, ChatProvider, OpenAiCompatProvider, ScriptedProvider, ScriptedReply,
    },
    tools::ToolDispatcher,
};
use std::io::Write;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Offline script: one buy-vs-rent analysis, then a streamed explanation
fn demo_script() -> ScriptedProvider {
    ScriptedProvider::new([
        ScriptedReply::Completion(ChatCompletion::with_invocations(vec![ToolInvocation {
            id: "call_demo_1".to_string(),
            name: "analyze_buy_vs_rent".to_string(),
            arguments: r#"{"propertyPrice":1200000,"monthlyRent":8000,"stayDuration":7}"#
                .to_string(),
        }])),
        ScriptedReply::Stream(vec![
            "Over a 7-year stay, buying comes out ahead. ".to_string(),
            "The calculator puts the monthly instalment on the 960k loan at about AED 5,336, ".to_string(),
            "with roughly AED 324k needed upfront including transaction costs.".to_string(),
        ]),
    ])
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let config = AdvisorConfig::from_env()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (scenario, message) = match args.as_slice() {
        [scenario, rest @ ..] if !rest.is_empty() => (scenario.clone(), rest.join(" ")),
        _ => (
            "buy-vs-rent".to_string(),
            "The flat costs AED 1.2m, rent is 8k a month and I plan to stay 7 years. Buy or rent?"
                .to_string(),
        ),
    };

    let live = OpenAiCompatProvider::new(config.provider.clone())?;
    let provider: Arc<dyn ChatProvider> = if live.is_configured() {
        info!(model = %config.provider.model, "Using live provider");
        Arc::new(live)
    } else {
        println!("(LLM_API_KEY not set, using the offline demo script)\n");
        Arc::new(demo_script())
    };

    let orchestrator = Orchestrator::new(
        provider,
        Arc::new(InMemorySessionStore::new(config.session_ttl)),
        ToolDispatcher::new(),
        ContextManager::with_window_size(config.context_window_size),
        config.streaming,
    );

    println!("[{}] > {}\n", scenario, message);

    let mut turn = orchestrator
        .handle_turn(TurnRequest {
            session_key: "cli".to_string(),
            scenario,
            message,
        })
        .await?;

    let mut tools_used = Vec::new();
    while let Some(event) = turn.next().await {
        match event {
            TurnEvent::Fragment { text, tool_used } => {
                print!("{}", text);
                std::io::stdout().flush()?;
                if let Some(tool) = tool_used {
                    if !tools_used.contains(&tool) {
                        tools_used.push(tool);
                    }
                }
            }
            TurnEvent::Done => println!(),
        }
    }

    if !tools_used.is_empty() {
        println!("\nTools used: {}", tools_used.join(", "));
    }

    Ok(())
}
