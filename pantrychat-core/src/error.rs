use thiserror::Error;

/// Client-facing message for failures before any upstream data arrived.
pub const MSG_UPSTREAM_UNAVAILABLE: &str = "Ollama unavailable";
/// Client-facing message for failures after streaming started.
pub const MSG_STREAM_INTERRUPTED: &str = "Stream interrupted";
/// Client-facing message when the upstream stalls past the idle guard.
pub const MSG_IDLE_TIMEOUT: &str = "Upstream idle timeout";

/// Core error type for the chat relay.
/// Internally, modules can use `anyhow::Result<T>` for convenience,
/// but public boundaries should expose `CoreResult<T>` with this error.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("upstream unavailable: {reason}")]
    UpstreamUnavailable { reason: String },

    #[error("upstream returned {code}: {message}")]
    UpstreamStatus { code: String, message: String },

    #[error("upstream stream interrupted")]
    StreamInterrupted,

    #[error("upstream idle for {after_ms}ms")]
    IdleTimeout { after_ms: u64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RelayError {
    /// The fixed string a browser sees for this failure. Never carries upstream detail.
    pub fn client_message(&self) -> &'static str {
        match self {
            Self::StreamInterrupted => MSG_STREAM_INTERRUPTED,
            Self::IdleTimeout { .. } => MSG_IDLE_TIMEOUT,
            _ => MSG_UPSTREAM_UNAVAILABLE,
        }
    }

    /// Short label used in logs and telemetry.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::UpstreamUnavailable { .. } => "upstream_unavailable",
            Self::UpstreamStatus { .. } => "upstream_status",
            Self::StreamInterrupted => "stream_interrupted",
            Self::IdleTimeout { .. } => "idle_timeout",
            Self::Io(_) => "io",
            Self::Other(_) => "other",
        }
    }
}

pub type CoreResult<T> = std::result::Result<T, RelayError>;
