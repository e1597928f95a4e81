//! Colloquy API crate - axum HTTP server, route handlers, SSE streaming.
//!
//! Serves the chat page and the JSON/SSE endpoints it calls: session
//! management, typed and spoken questions streamed back as server-sent
//! events, history, and image description.

pub mod error;
pub mod events;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
