//! persona-chat HTTP server binary.
//!
//! Starts an axum HTTP server that researches personalities and serves
//! per-subject conversations.
//!
//! # Environment Variables
//!
//! - `TAVILY_API_KEY` - Search/extraction API key (required)
//! - `OPENAI_API_KEY` - Completion API key (required)
//! - `PORT` - HTTP port (default: 8000)
//! - `RUST_LOG` - Tracing filter (default: "info,persona_chat=debug")
//!
//! See `AppConfig::from_env` for the remaining tuning variables.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin server
//! ```

use std::sync::Arc;

use anyhow::Context;
use persona_chat::chat::ChatOrchestrator;
use persona_chat::config::AppConfig;
use persona_chat::providers::{OpenAiChat, TavilyClient};
use persona_chat::research::{PersonalityResearcher, ResearchProviders};
use persona_chat::server::{app_router, AppState};

fn build_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let tavily = Arc::new(
        TavilyClient::new(
            config.research.tavily_api_key.clone(),
            config.research.extract_depth,
            config.provider_timeout_secs,
        )
        .context("Failed to build Tavily client")?
        .with_include_images(config.research.include_images),
    );

    let openai = |model: &str| -> anyhow::Result<OpenAiChat> {
        let client = OpenAiChat::new(
            model,
            Some(config.openai_api_key.clone()),
            config.provider_timeout_secs,
        )
        .context("Failed to build OpenAI client")?;
        Ok(match &config.openai_base_url {
            Some(base_url) => client.with_base_url(base_url.clone()),
            None => client,
        })
    };

    let extraction_model = openai(&config.research.extraction_model)?
        .with_temperature(config.research.extraction_temperature)
        .with_max_tokens(Some(config.research.extraction_max_tokens));
    let chat_model = openai(&config.chat.model)?
        .with_temperature(config.chat.temperature)
        .with_max_tokens(config.chat.max_tokens);

    let researcher = PersonalityResearcher::new(
        config.research.clone(),
        ResearchProviders {
            search: tavily.clone(),
            extractor: tavily,
            completion: Arc::new(extraction_model),
        },
    );
    let orchestrator =
        ChatOrchestrator::new(Arc::new(researcher), Arc::new(chat_model), config.chat.clone());

    Ok(AppState::new(Arc::new(orchestrator)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,persona_chat=debug".into()),
        )
        .init();

    let config = AppConfig::from_env().context("Invalid configuration")?;
    let bind_addr = format!("0.0.0.0:{}", config.port);

    let app = app_router(build_state(&config)?);

    tracing::info!("persona-chat server starting on {}", bind_addr);
    tracing::info!("Endpoints:");
    tracing::info!("  POST /initialize                  - prepare a personality");
    tracing::info!("  POST /chat                        - chat with a personality");
    tracing::info!("  GET  /conversation/:person_name   - conversation info");
    tracing::info!("  DEL  /conversation/:person_name   - clear conversation");
    tracing::info!("  POST /reinitialize/:person_name   - research again");

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server failed")?;

    Ok(())
}
