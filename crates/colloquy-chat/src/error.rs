//! Error types for the chat engine.

use colloquy_core::error::ColloquyError;

/// Errors from the chat engine.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("query cannot be empty")]
    EmptyQuery,
    #[error("query exceeds maximum length of {0} characters")]
    QueryTooLong(usize),
    #[error("session not found: {0}")]
    SessionNotFound(uuid::Uuid),
    #[error("request failed: {0}")]
    Request(String),
    #[error("chat service returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("response blocked: {0}")]
    Blocked(String),
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("stream interrupted: {0}")]
    Stream(String),
    #[error("session registry error: {0}")]
    Registry(String),
}

impl From<ChatError> for ColloquyError {
    fn from(err: ChatError) -> Self {
        ColloquyError::Chat(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_chat_error_display() {
        assert_eq!(ChatError::EmptyQuery.to_string(), "query cannot be empty");
        assert_eq!(
            ChatError::QueryTooLong(8000).to_string(),
            "query exceeds maximum length of 8000 characters"
        );
        assert_eq!(
            ChatError::Request("connection refused".to_string()).to_string(),
            "request failed: connection refused"
        );
        assert_eq!(
            ChatError::Status {
                status: 403,
                message: "API key not valid".to_string()
            }
            .to_string(),
            "chat service returned 403: API key not valid"
        );
        assert_eq!(
            ChatError::Blocked("SAFETY".to_string()).to_string(),
            "response blocked: SAFETY"
        );
        assert_eq!(
            ChatError::Decode("expected value".to_string()).to_string(),
            "malformed response: expected value"
        );
        assert_eq!(
            ChatError::Stream("reset by peer".to_string()).to_string(),
            "stream interrupted: reset by peer"
        );
        assert_eq!(
            ChatError::Registry("lock poisoned".to_string()).to_string(),
            "session registry error: lock poisoned"
        );
    }

    #[test]
    fn test_session_not_found_preserves_uuid() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(
            ChatError::SessionNotFound(id).to_string(),
            "session not found: 550e8400-e29b-41d4-a716-446655440000"
        );
    }

    #[test]
    fn test_into_colloquy_error() {
        let err: ColloquyError = ChatError::EmptyQuery.into();
        assert!(matches!(err, ColloquyError::Chat(_)));
        assert!(err.to_string().contains("query cannot be empty"));
    }
}
