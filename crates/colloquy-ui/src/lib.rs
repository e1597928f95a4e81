//! Colloquy UI crate - the embedded single-page chat interface.
//!
//! The page is a self-contained HTML file embedded at compile time via
//! `include_str!`. It talks to the API over `fetch`, reading chat progress
//! from `text/event-stream` responses.
//!
//! ```rust,ignore
//! use colloquy_ui::page::render_page;
//!
//! async fn ui_handler() -> axum::response::Html<String> {
//!     axum::response::Html(render_page("Personalized Chat Bot"))
//! }
//! ```

pub mod page;

pub use page::{render_page, CHAT_PAGE_HTML};
