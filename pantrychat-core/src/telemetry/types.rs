use serde::Serialize;

/// How a relay session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    /// Terminal `done` frame sent.
    Done,
    /// Terminal `error` frame sent.
    Error,
    /// Client went away before a terminal frame was sent.
    Disconnected,
}

impl SessionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::Error => "error",
            Self::Disconnected => "disconnected",
        }
    }
}

/// Structured, per-session summary emitted once when a relay session ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionLog {
    pub provider: String,
    pub model: String,
    pub session_id: u64,
    pub outcome: SessionOutcome,

    pub chunks: u64,
    pub records: u64,
    pub malformed_lines: u64,
    pub text_events: u64,

    pub error_kind: Option<String>,
    pub error_message: Option<String>,

    /// Token counts as reported by the upstream's final record, if any.
    pub tokens_prompt: Option<u32>,
    pub tokens_completion: Option<u32>,

    pub latency_ms: u64,
}

impl SessionLog {
    pub fn new(provider: &str, model: &str, session_id: u64) -> Self {
        Self {
            provider: provider.to_string(),
            model: model.to_string(),
            session_id,
            outcome: SessionOutcome::Disconnected,
            chunks: 0,
            records: 0,
            malformed_lines: 0,
            text_events: 0,
            error_kind: None,
            error_message: None,
            tokens_prompt: None,
            tokens_completion: None,
            latency_ms: 0,
        }
    }

    pub fn error(mut self, kind: &str, message: &str) -> Self {
        self.error_kind = Some(kind.to_string());
        self.error_message = Some(message.to_string());
        self
    }

    pub fn tokens(mut self, prompt: Option<u32>, completion: Option<u32>) -> Self {
        self.tokens_prompt = prompt;
        self.tokens_completion = completion;
        self
    }
}
