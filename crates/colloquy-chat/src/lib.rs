//! Conversational core for Colloquy.
//!
//! Provides the chat-service abstraction and its Gemini streaming client,
//! the response aggregator that turns a chunk stream into history turns,
//! and the session registry that owns per-session state.

pub mod aggregator;
pub mod context;
pub mod error;
pub mod gemini;
pub mod orchestrator;
pub mod service;

pub use aggregator::{AggregatedResponse, ResponseAggregator, ResponseSink, CHUNK_SEPARATOR};
pub use context::{ChatSession, ContextMessage, ConversationContext, Role, SessionManager};
pub use error::ChatError;
pub use gemini::GeminiChatService;
pub use orchestrator::{ChatOrchestrator, ChatSessionSummary, SharedSession};
pub use service::{ChatChunk, ChatService, ChunkStream, ScriptedChatService};
