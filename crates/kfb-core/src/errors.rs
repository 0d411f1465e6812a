use std::time::Duration;

/// Core error type for the bot.
///
/// Adapter crates map their transport errors into this type so the forward
/// executor can branch on failure class (throttle vs missing message vs
/// everything else) without knowing the transport.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The referenced message does not exist (deleted or never sent).
    #[error("message not found")]
    MessageMissing,

    /// Server-imposed throttle: wait this long before the next attempt.
    #[error("rate limited for {}s", .0.as_secs())]
    RateLimited(Duration),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
