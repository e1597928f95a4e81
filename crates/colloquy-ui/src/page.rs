//! Chat page HTML.
//!
//! One column holds the question box, the Ask and Speak buttons, the response
//! box and the image upload; a side column holds "Clear Chat History". The
//! chat history is rendered below both.

/// Raw page template. `__PAGE_TITLE__` marks where the title goes.
pub const CHAT_PAGE_HTML: &str = include_str!("../assets/chat.html");

const TITLE_PLACEHOLDER: &str = "__PAGE_TITLE__";

/// Fill in the page title, HTML-escaped.
pub fn render_page(title: &str) -> String {
    let escaped = escape_html(title);
    tracing::debug!(title = %escaped, "Rendering chat page");
    CHAT_PAGE_HTML.replace(TITLE_PLACEHOLDER, &escaped)
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
