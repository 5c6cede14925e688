//! Main Entrypoint for the Voxbridge API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing the speech and reasoning service clients.
//! 3. Constructing the session lifecycle controller.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and draining sessions on shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use voxbridge_api::{
    config::Config,
    lifecycle::SessionLifecycle,
    pipeline::PipelineServices,
    router::create_router,
    services::{OpenAiSynthesizer, OpenAiTranscriber},
    state::AppState,
    tools::default_tool_bridge,
    transport::LoopbackFactory,
};
use voxbridge_core::reasoner::OpenAiReasoner;

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Shared Services ---
    let openai_config = OpenAIConfig::new()
        .with_api_key(&config.openai_api_key)
        .with_api_base(&config.openai_api_base);

    let tools = default_tool_bridge().context("Tool registration is inconsistent")?;
    let services = PipelineServices {
        transcriber: Arc::new(OpenAiTranscriber::new(
            openai_config.clone(),
            config.transcribe_model.clone(),
        )),
        synthesizer: Arc::new(OpenAiSynthesizer::new(
            openai_config.clone(),
            &config.speech_model,
            &config.speech_voice,
        )),
        reasoner: Arc::new(OpenAiReasoner::new(
            openai_config,
            config.chat_model.clone(),
        )),
        tools: Arc::new(tools),
        call_timeout: config.service_timeout,
    };

    // --- 4. Construct the Lifecycle Controller ---
    let factory = Arc::new(LoopbackFactory::new());
    let lifecycle = SessionLifecycle::new(
        factory,
        services,
        config.system_prompt.clone(),
        config.shutdown_timeout,
    );

    let app_state = Arc::new(AppState {
        lifecycle: lifecycle.clone(),
        config: Arc::new(config.clone()),
    });

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        model = %config.chat_model,
        voice = %config.speech_voice,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // --- 7. Drain Sessions ---
    lifecycle.shutdown().await;
    info!("Server has shut down.");
    Ok(())
}
