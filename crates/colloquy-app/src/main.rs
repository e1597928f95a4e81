//! Colloquy application binary - composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Initialize tracing
//! 3. Load `.env`, then the API key (startup aborts without it)
//! 4. Build the chat, speech and vision services
//! 5. Start the session reaper and the axum server

mod cli;
mod dotenv;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use colloquy_api::state::AppState;
use colloquy_chat::{ChatOrchestrator, GeminiChatService};
use colloquy_core::config::ColloquyConfig;
use colloquy_core::credentials::ApiCredential;
use colloquy_core::error::ColloquyError;
use colloquy_speech::{GoogleSpeechRecognizer, VoiceInput};
use colloquy_vision::ImageAnalyzer;

use cli::CliArgs;
use dotenv::DotenvStatus;

/// How often idle sessions are swept.
const REAPER_INTERVAL: Duration = Duration::from_secs(60);

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

fn load_config(args: &CliArgs) -> Result<ColloquyConfig, ColloquyError> {
    let path = args.resolve_config_path();
    let mut config = if args.config_is_explicit() {
        ColloquyConfig::load(&path)?
    } else {
        ColloquyConfig::load_or_default(&path)
    };
    config.general.port = args.resolve_port(config.general.port);
    if let Some(level) = args.resolve_log_level() {
        config.general.log_level = level;
    }
    if args.no_speech {
        config.speech.enabled = false;
    }
    Ok(config)
}

/// Periodically drop sessions idle past the timeout.
async fn session_reaper(orchestrator: Arc<ChatOrchestrator>) {
    let mut interval = tokio::time::interval(REAPER_INTERVAL);
    loop {
        interval.tick().await;
        match orchestrator.purge_expired() {
            Ok(0) => {}
            Ok(removed) => tracing::debug!(removed, "Idle sessions reaped"),
            Err(e) => tracing::warn!(error = %e, "Session reaper failed"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&config.general.log_level);
    tracing::info!("Starting Colloquy v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        path = %args.resolve_config_path().display(),
        port = config.general.port,
        "Configuration loaded"
    );

    match dotenv::load() {
        DotenvStatus::Loaded(path) => tracing::info!(path = %path.display(), "Loaded .env"),
        DotenvStatus::NotFound => {}
        DotenvStatus::Failed(e) => tracing::warn!(error = %e, "Ignoring unreadable .env"),
    }

    let credential = match ApiCredential::from_env(&config.chat.api_key_env) {
        Ok(credential) => credential,
        Err(ColloquyError::MissingCredential(msg)) => {
            tracing::error!(var = %config.chat.api_key_env, "API key missing");
            eprintln!("{}", msg);
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };
    tracing::info!(source = credential.source(), "API key loaded");

    // Chat.
    let chat_service = GeminiChatService::new(&credential, &config.chat);
    tracing::info!(model = chat_service.model(), "Chat service ready");
    let orchestrator = ChatOrchestrator::new(config.chat.clone(), Arc::new(chat_service));

    // Speech.
    let voice = if config.speech.enabled {
        let source = colloquy_speech::source_from_config(&config.speech);
        let recognizer = GoogleSpeechRecognizer::new(&credential, &config.speech);
        tracing::info!(
            capture = ?config.speech.capture,
            language = %config.speech.language,
            "Speech input ready"
        );
        Some(VoiceInput::new(source, Arc::new(recognizer)))
    } else {
        tracing::info!("Speech input disabled");
        None
    };

    // Vision.
    let analyzer = ImageAnalyzer::new(&config.vision);
    tracing::info!(endpoint = analyzer.endpoint(), "Image analyzer ready");

    let state = AppState::new(config, orchestrator, voice, Arc::new(analyzer));

    let reaper_orchestrator = Arc::clone(&state.orchestrator);
    tokio::spawn(async move {
        session_reaper(reaper_orchestrator).await;
    });

    colloquy_api::start_server(state).await?;
    Ok(())
}
