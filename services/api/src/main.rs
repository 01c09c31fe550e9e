mod config;
mod deepgram_adapter;
mod prompt_loader;
mod speech_adapter;
mod ws;

use crate::config::Config;
use crate::deepgram_adapter::DeepgramRecognizer;
use crate::speech_adapter::OpenAiSynthesizer;
use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{State, ws::WebSocketUpgrade},
    response::Response,
    routing::get,
};
use interview_core::{ChatGenerator, PromptSet, SessionDeps};
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Clone)]
struct AppState {
    deps: SessionDeps,
}

/// Accepts the upgrade and hands the socket to a fresh session.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    info!("WebSocket upgrade request received");
    ws.on_upgrade(move |socket| ws::handle_socket(socket, state.deps))
}

async fn health() -> &'static str {
    "ok"
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    info!("Configuration loaded successfully. Starting interview service...");

    // --- 3. Load Prompts and Questions ---
    let prompts = match prompt_loader::load_prompts(&config.prompts_dir) {
        Ok(prompts) => {
            info!("Loaded {} prompts successfully.", prompts.len());
            prompts
        }
        Err(e) => {
            tracing::warn!("{:#}; using built-in prompts", e);
            HashMap::new()
        }
    };
    let questions = prompt_loader::load_questions(&config.questions_path)
        .context("Failed to load interview questions")?;
    info!("Loaded {} interview questions.", questions.len());

    // --- 4. Initialize Provider Clients ---
    let generator = ChatGenerator::new(
        config.openai_api_key.expose_secret().to_string(),
        config.chat_model.clone(),
        PromptSet::from_map(&prompts),
    );
    let recognizer = DeepgramRecognizer::new(
        SecretString::from(config.deepgram_api_key.expose_secret().to_string()),
        config.deepgram_model.clone(),
    );
    let synthesizer = OpenAiSynthesizer::new(
        SecretString::from(config.openai_api_key.expose_secret().to_string()),
        config.tts_model.clone(),
        config.tts_voice.clone(),
    );

    let state = AppState {
        deps: SessionDeps {
            recognizer: Arc::new(recognizer),
            generator: Arc::new(generator),
            synthesizer: Arc::new(synthesizer),
            questions,
            config: config.turn.clone(),
            audio: config.audio.clone(),
        },
    };

    // --- 5. Serve ---
    // Permissive CORS so a separately hosted frontend can connect.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(cors)
        .with_state(state);

    info!("Starting WebSocket server, listening on {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
