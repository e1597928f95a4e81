//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use colloquy_chat::ChatOrchestrator;
use colloquy_core::config::ColloquyConfig;
use colloquy_speech::VoiceInput;
use colloquy_vision::ImageDescriber;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks. Per-session
/// mutable state lives inside the orchestrator.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration (read-only after startup).
    pub config: Arc<ColloquyConfig>,
    /// Session registry and chat pipeline.
    pub orchestrator: Arc<ChatOrchestrator>,
    /// Speech input, absent when disabled in config.
    pub voice: Option<Arc<VoiceInput>>,
    /// Image description adapter.
    pub vision: Arc<dyn ImageDescriber>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: ColloquyConfig,
        orchestrator: ChatOrchestrator,
        voice: Option<VoiceInput>,
        vision: Arc<dyn ImageDescriber>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            voice: voice.map(Arc::new),
            vision,
            start_time: Instant::now(),
        }
    }
}
