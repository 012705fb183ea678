use thiserror::Error;

/// Errors raised while talking to the chat endpoint or setting up the widget.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Connection refused, DNS failure, broken body stream, etc.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body was not valid JSON
    #[error("could not decode chat response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Valid JSON, but neither an `error` nor a `response` field
    #[error("malformed chat response: {0}")]
    MalformedReply(String),

    /// The background task running the request died before answering
    #[error("request task ended unexpectedly: {0}")]
    Interrupted(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ChatError>;
